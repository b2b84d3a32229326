//! The embedding surface (§6.6): reload a script from a string, `stdin`, or
//! a file, then execute it with host-supplied arguments. Modeled directly
//! on the original `Simple_Script::reload`/`execute` pair
//! (`original_source/asteria/src/simple_script.cpp`), translated from its
//! `reload`/`reload_string`/`reload_stdin`/`reload_file`/`execute` methods.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::sync::Arc;

use crate::avmc::{self, AvmcQueue};
use crate::compiler_options::CompilerOptions;
use crate::exception::RuntimeException;
use crate::hooks::{Hooks, NoopHooks};
use crate::interpreter::Interpreter;
use crate::lexer::TokenStream;
use crate::parser::parse_document;
use crate::parser_error::ParserError;
use crate::reference::Reference;
use crate::value::Value;

/// Everything that can go wrong loading a script, short of the script's own
/// runtime behavior (which surfaces as a `RuntimeException` from `execute`).
#[derive(Debug)]
pub enum RunnerError {
    Io(io::Error),
    Parser(ParserError),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Io(e) => write!(f, "{e}"),
            RunnerError::Parser(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<ParserError> for RunnerError {
    fn from(e: ParserError) -> Self {
        RunnerError::Parser(e)
    }
}

/// Tokenizes, parses, and lowers `text` straight through to a solidified
/// queue, the single compile pipeline entry point shared by every `reload*`
/// variant below.
pub fn compile_source(name: impl Into<Arc<str>>, starting_line: u32, text: &str, opts: &CompilerOptions) -> Result<AvmcQueue, ParserError> {
    let stream = TokenStream::tokenize(name, starting_line, text, opts)?;
    let stmts = parse_document(stream, opts)?;
    Ok(avmc::compile(&stmts, opts))
}

/// A reloadable, executable script bound to one interpreter (§6.6). Unlike
/// the original's `Simple_Script`, which owns the `Global_Context` and a
/// single pending function value, this keeps the interpreter (and thus the
/// collector, global scope, and hooks) separate from the currently loaded
/// program, so a fresh `reload` can replace the program without discarding
/// state a long-lived embedder has accumulated in globals.
pub struct Runner<H: Hooks = NoopHooks> {
    opts: CompilerOptions,
    interp: Interpreter<H>,
    queue: Option<AvmcQueue>,
}

impl<H: Hooks + Default> Runner<H> {
    pub fn new(opts: CompilerOptions) -> Self {
        Self { opts, interp: Interpreter::with_hooks(H::default()), queue: None }
    }
}

impl<H: Hooks + Default> Default for Runner<H> {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

impl<H: Hooks> Runner<H> {
    pub fn with_hooks(opts: CompilerOptions, hooks: H) -> Self {
        Self { opts, interp: Interpreter::with_hooks(hooks), queue: None }
    }

    pub fn interpreter(&self) -> &Interpreter<H> {
        &self.interp
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter<H> {
        &mut self.interp
    }

    /// Compiles `text` and makes it the script this `Runner` will execute,
    /// replacing whatever was previously loaded.
    pub fn reload(&mut self, name: impl Into<Arc<str>>, starting_line: u32, text: &str) -> Result<&mut Self, RunnerError> {
        self.queue = Some(compile_source(name, starting_line, text, &self.opts)?);
        Ok(self)
    }

    pub fn reload_string(&mut self, name: impl Into<Arc<str>>, code: &str) -> Result<&mut Self, RunnerError> {
        self.reload(name, 1, code)
    }

    pub fn reload_stdin(&mut self) -> Result<&mut Self, RunnerError> {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(RunnerError::Io)?;
        self.reload("[stdin]", 1, &buf)
    }

    pub fn reload_file(&mut self, path: &str) -> Result<&mut Self, RunnerError> {
        let text = fs::read_to_string(path).map_err(RunnerError::Io)?;
        self.reload(path.to_string(), 1, &text)
    }

    /// Runs the loaded script as a variadic top-level function (§6.6): each
    /// argument is pushed as a temporary in order and made visible inside
    /// the script as `__varg`, matching the original's "the executor pushes
    /// each arg ... invokes the top-level function whose sole parameter is
    /// `...`" convention.
    ///
    /// # Panics
    /// Panics if no script has been loaded via one of the `reload*` methods.
    pub fn execute(&mut self, args: Vec<Value>) -> Result<Reference, RuntimeException> {
        let queue = self.queue.as_ref().expect("Runner::execute called before reload").clone();
        self.interp.execute_with_args(&queue, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_then_execute_runs_the_loaded_script() {
        let mut runner: Runner = Runner::default();
        runner.reload_string("test", "return 1 + 2;").unwrap();
        let r = runner.execute(Vec::new()).unwrap();
        assert!(matches!(r.read().unwrap(), Value::Integer(3)));
    }

    #[test]
    fn execute_sees_arguments_through_varg() {
        let mut runner: Runner = Runner::default();
        runner.reload_string("test", "return __varg[0];").unwrap();
        let r = runner.execute(vec![Value::Integer(42)]).unwrap();
        assert!(matches!(r.read().unwrap(), Value::Integer(42)));
    }

    #[test]
    fn reload_reports_parser_errors() {
        let mut runner: Runner = Runner::default();
        assert!(runner.reload_string("test", "var = ;").is_err());
    }
}

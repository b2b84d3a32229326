//! Callable values (§3.6 `Value::Function`, §4.9 calling convention).

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::avmc::AvmcQueue;
use crate::context::ExecutiveContext;
use crate::exception::RuntimeException;
use crate::reference::Reference;
use crate::sloc::SourceLocation;

/// A function produced by lowering a `func` expression or top-level
/// function statement: its solidified body plus the lexical context it
/// closed over (§4.6 "functions capture their defining context by
/// reference").
pub struct ScriptFunction {
    pub name: Arc<str>,
    pub sloc: SourceLocation,
    pub params: Vec<Arc<str>>,
    pub variadic: bool,
    pub body: AvmcQueue,
    pub closure: Rc<ExecutiveContext>,
}

/// A function implemented directly in the embedding Rust program (§6.5/§6.6
/// "native functions can be exposed to scripts"). Not used by the language
/// core itself, which defines no builtins, but needed so the embedding API
/// can hand callable values to scripts.
pub struct NativeFunction {
    pub name: Arc<str>,
    /// `self_ref` is the receiver recovered from the call site (§4.9): for
    /// `obj.method(...)` it's a reference to `obj`; for a bare name it's an
    /// empty (`void`) reference. Script functions never see it (the
    /// language has no `self`/`this` keyword), but it lets embedders bind
    /// native functions as object methods.
    #[allow(clippy::type_complexity)]
    pub call: Box<dyn Fn(&Reference, &[Reference]) -> Result<Reference, RuntimeException>>,
}

pub enum Function {
    Script(ScriptFunction),
    Native(NativeFunction),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Script(f) => &f.name,
            Function::Native(f) => &f.name,
        }
    }

    pub fn params(&self) -> &[Arc<str>] {
        match self {
            Function::Script(f) => &f.params,
            Function::Native(_) => &[],
        }
    }

    pub fn is_variadic(&self) -> bool {
        match self {
            Function::Script(f) => f.variadic,
            Function::Native(_) => true,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}

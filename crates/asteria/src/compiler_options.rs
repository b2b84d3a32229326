//! Compiler option record threaded through the lexer, parser, and AIR passes.
//!
//! Modeled on the teacher's flat option/limit structs (e.g. `ResourceLimits`):
//! a `Copy` struct with a `Default` impl rather than a builder.

/// Options controlling lexing, parsing, and AIR optimization.
///
/// Every phase of the pipeline (§2) receives a shared, read-only copy of this
/// struct so that embedder-configured dialect choices are consistent from the
/// token stream down to the solidified queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Parse integer-shaped literals (no radix point, no exponent) as reals.
    pub integers_as_reals: bool,
    /// Allow escape sequences inside single-quoted string literals.
    pub escapable_single_quotes: bool,
    /// Disable the keyword table; identifiers are never reserved words.
    pub keywords_as_identifiers: bool,
    /// If a name can't be resolved in any enclosing analytic scope, assume it
    /// is a global resolved at run time instead of failing to compile.
    pub implicit_global_names: bool,
    /// Enable proper tail calls; when `false` every call is non-tail.
    pub proper_tail_calls: bool,
    /// Emit a `SingleStepTrap` node before every statement expression.
    pub verbose_single_step_traps: bool,
    /// Optimization level 0-3; gates AIR rebinding and other passes.
    pub optimization_level: u8,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            integers_as_reals: false,
            escapable_single_quotes: false,
            keywords_as_identifiers: false,
            implicit_global_names: false,
            proper_tail_calls: true,
            verbose_single_step_traps: false,
            optimization_level: 0,
        }
    }
}

impl CompilerOptions {
    /// Whether the rebind pass of the AIR optimizer should run at all.
    pub fn should_rebind(&self) -> bool {
        self.optimization_level >= 1
    }

    /// Whether dead-code/unreachable-node compression should run.
    pub fn should_compress(&self) -> bool {
        self.optimization_level >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_ptc_but_not_dialect_relaxations() {
        let opts = CompilerOptions::default();
        assert!(opts.proper_tail_calls);
        assert!(!opts.implicit_global_names);
        assert!(!opts.should_rebind());
    }
}

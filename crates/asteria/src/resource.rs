//! Recursion sentries shared by the parser (§4.2) and the interpreter
//! (§4.6, §5): both guard against unbounded recursion by comparing a
//! counter against a configurable limit rather than waiting for a real
//! stack overflow, mirroring the teacher's `resource.rs::ResourceTracker`
//! pattern of cheap, explicit limit checks on every hot-path entry.

use std::fmt;

/// Default nesting depth before the parser gives up on a pathological
/// expression/statement tree (`ParserStatus::TooManyElements`).
pub const DEFAULT_MAX_PARSER_DEPTH: usize = 512;

/// Default call-stack depth before the interpreter raises a recursion
/// error (§4.6 "crossing a configurable depth throws a runtime error").
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 2048;

/// A simple depth counter with a ceiling; `enter()` increments and returns
/// a guard that decrements on drop, so nested `?`-propagating recursive
/// calls can't forget to release their slot.
#[derive(Debug, Clone)]
pub struct RecursionSentry {
    depth: usize,
    limit: usize,
}

/// Error produced when a `RecursionSentry` is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursionExceeded {
    pub limit: usize,
}

impl fmt::Display for RecursionExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "maximum recursion depth ({}) exceeded", self.limit)
    }
}

impl std::error::Error for RecursionExceeded {}

impl RecursionSentry {
    pub fn new(limit: usize) -> Self {
        Self { depth: 0, limit }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enters one more level of nesting, or fails if the limit is reached.
    pub fn enter(&mut self) -> Result<RecursionGuard<'_>, RecursionExceeded> {
        if self.depth >= self.limit {
            return Err(RecursionExceeded { limit: self.limit });
        }
        self.depth += 1;
        Ok(RecursionGuard { sentry: self })
    }

    /// Guard-free equivalent of `enter`, for call sites that need to hold
    /// other mutable borrows of their owning struct across the nested work
    /// (the interpreter's call stack, where a `RecursionGuard<'_>` tied to
    /// `&mut Interpreter` would lock out every other field for the guard's
    /// whole lifetime). Pair with `leave()` on every exit path.
    pub fn try_enter(&mut self) -> Result<(), RecursionExceeded> {
        if self.depth >= self.limit {
            return Err(RecursionExceeded { limit: self.limit });
        }
        self.depth += 1;
        Ok(())
    }

    /// Releases one level of nesting entered via `try_enter`.
    pub fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// RAII guard that releases one level of `RecursionSentry` nesting on drop.
pub struct RecursionGuard<'a> {
    sentry: &'a mut RecursionSentry,
}

impl Drop for RecursionGuard<'_> {
    fn drop(&mut self) {
        self.sentry.depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_depth_on_drop() {
        let mut sentry = RecursionSentry::new(2);
        {
            let _g1 = sentry.enter().unwrap();
            assert_eq!(sentry.depth(), 1);
            let _g2 = sentry.enter().unwrap();
            assert_eq!(sentry.depth(), 2);
            assert!(sentry.enter().is_err());
        }
        assert_eq!(sentry.depth(), 0);
    }
}

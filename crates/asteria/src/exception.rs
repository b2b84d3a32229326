//! Structured exceptions and backtraces (§4.8, §6.4).

use std::fmt;

use crate::sloc::SourceLocation;
use crate::value::Value;

/// A plain-text interpreter error (type mismatch, out-of-bounds access,
/// division by zero, ...) raised internally before it is packaged into a
/// `RuntimeException` with a source location and backtrace at the point it
/// is actually thrown. Kept distinct from `RuntimeException` because most
/// call sites (operators, reference dereferencing) don't yet know the
/// `SourceLocation` of the operation that's failing; the interpreter's main
/// loop attaches that when it converts this into a thrown exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError(pub String);

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RuntimeError {}

/// One entry of the backtrace accumulated as a `RuntimeException` unwinds
/// through nested calls (§4.8: "every frame the exception crosses appends
/// one entry, including frames elided by proper tail calls").
#[derive(Debug, Clone, PartialEq)]
pub struct BacktraceFrame {
    pub sloc: SourceLocation,
    /// Set when this frame was skipped by the PTC trampoline rather than
    /// being a genuine nested call (§4.9, §9 Open Question on PTC/catch
    /// interaction, resolved below).
    pub is_ptc_elided: bool,
}

/// A thrown value together with the frames it has unwound through so far.
#[derive(Debug, Clone)]
pub struct RuntimeException {
    pub value: Value,
    pub backtrace: Vec<BacktraceFrame>,
}

impl RuntimeException {
    pub fn new(value: Value, sloc: SourceLocation) -> Self {
        Self {
            value,
            backtrace: vec![BacktraceFrame { sloc, is_ptc_elided: false }],
        }
    }

    /// Appends a frame as the exception propagates out of a call.
    pub fn push_frame(&mut self, sloc: SourceLocation, is_ptc_elided: bool) {
        self.backtrace.push(BacktraceFrame { sloc, is_ptc_elided });
    }
}

impl fmt::Display for RuntimeException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unhandled exception: {:?}", self.value)?;
        for frame in &self.backtrace {
            write!(f, "\n  at {}", frame.sloc)?;
            if frame.is_ptc_elided {
                write!(f, " (tail call)")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeException {}

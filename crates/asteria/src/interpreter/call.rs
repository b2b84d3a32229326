//! The calling convention (§4.9): binds arguments into a fresh scope,
//! dispatches to native or script functions, and runs the proper-tail-call
//! trampoline so a chain of tail calls replaces its own stack frame instead
//! of growing the Rust call stack.

use std::rc::Rc;
use std::sync::Arc;

use crate::context::ExecutiveContext;
use crate::exception::{RuntimeError, RuntimeException};
use crate::function::{Function, ScriptFunction};
use crate::hooks::Hooks;
use crate::opcode::PtcAware;
use crate::ptc::{CallOutcome, PtcArguments};
use crate::reference::Reference;
use crate::sloc::SourceLocation;
use crate::value::Value;

use super::{Interpreter, Signal};

/// Reserved local name bound to the overflow arguments of a variadic
/// function, collected as an array (§4.9 "a variadic parameter list
/// collects its trailing arguments").
const VARG_NAME: &str = "__varg";

/// Pops a finished call site's operands: `nargs` arguments already
/// marshalled onto `arg_stack` by `FinishArgument`, then the callee
/// reference underneath them on the main `stack`. The `self` receiver
/// (§4.9) is recovered from the callee's own modifier chain before it is
/// consumed, so `obj.method(...)` calls still expose `obj` to a native
/// target even though the callee reference itself is read down to a bare
/// function value.
pub(super) fn pop_call_operands<H: Hooks>(interp: &mut Interpreter<H>, nargs: u32) -> (Reference, Reference, Vec<Reference>) {
    let n = nargs as usize;
    let mut args = Vec::with_capacity(n);
    for _ in 0..n {
        args.push(interp.arg_stack.pop().expect("function call argument underflow"));
    }
    args.reverse();
    let callee = interp.stack.pop().expect("function call with empty stack");
    let self_ref = callee.self_reference();
    (callee, self_ref, args)
}

/// Dispatches an ordinary (non-tail) call site: reads the callee, runs it,
/// and if the call itself ends in tail position, drives the trampoline to
/// completion before returning.
pub(super) fn invoke<H: Hooks>(
    interp: &mut Interpreter<H>,
    callee: Reference,
    self_ref: Reference,
    args: Vec<Reference>,
    sloc: SourceLocation,
) -> Result<Reference, RuntimeException> {
    let callee_val = callee.read().map_err(|e| interp.err(e, sloc.clone()))?;
    let Value::Function(f) = callee_val else {
        return Err(interp.err(
            RuntimeError::new(format!("attempt to call a value of type `{}`", callee_val.type_name())),
            sloc,
        ));
    };
    match call_once(interp, f, self_ref, args, sloc, false)? {
        CallOutcome::Done(r) => Ok(r),
        CallOutcome::Tail(ptc) => run_trampoline(interp, ptc),
    }
}

/// Replays `call_once` until a call finally produces a value outright,
/// rather than ending in another tail position (§4.9).
pub(super) fn run_trampoline<H: Hooks>(interp: &mut Interpreter<H>, ptc: PtcArguments) -> Result<Reference, RuntimeException> {
    let PtcArguments { mut target, mut self_ref, mut args, mut aware, mut sloc } = ptc;
    loop {
        match call_once(interp, target, self_ref, args, sloc.clone(), true)? {
            CallOutcome::Done(r) => return finalize(aware, r).map_err(|e| interp.err(e, sloc)),
            CallOutcome::Tail(next) => {
                interp.hooks.on_proper_tail_call(next.target.name(), interp.sentry.depth());
                target = next.target;
                self_ref = next.self_ref;
                args = next.args;
                aware = next.aware;
                sloc = next.sloc;
            }
        }
    }
}

/// Applies a tail call's `PtcAware` mode to the value the trampoline
/// finally settles on: `ByVal` detaches it from whatever variable produced
/// it, `ByRef`/`None` keep the reference alive as-is, and `Void` discards
/// the result entirely.
fn finalize(aware: PtcAware, r: Reference) -> Result<Reference, RuntimeError> {
    match aware {
        PtcAware::ByVal => Ok(Reference::from_constant(r.read()?)),
        PtcAware::Void => Ok(Reference::void()),
        PtcAware::ByRef | PtcAware::None => Ok(r),
    }
}

/// One call, native or script, with no trampolining of its own: a script
/// body either returns outright or yields `CallOutcome::Tail` for its
/// caller to replay.
fn call_once<H: Hooks>(
    interp: &mut Interpreter<H>,
    target: Rc<Function>,
    self_ref: Reference,
    args: Vec<Reference>,
    sloc: SourceLocation,
    elided: bool,
) -> Result<CallOutcome, RuntimeException> {
    interp
        .sentry
        .try_enter()
        .map_err(|e| interp.err(RuntimeError::new(e.to_string()), sloc.clone()))?;
    let depth = interp.sentry.depth();
    let name = target.name().to_string();
    interp.hooks.on_function_call(&name, sloc.clone(), depth);

    let result = match target.as_ref() {
        Function::Native(nf) => (nf.call)(&self_ref, &args).map(CallOutcome::Done),
        Function::Script(sf) => call_script(interp, sf, args),
    };
    interp.sentry.leave();

    match result {
        Ok(outcome) => {
            if matches!(outcome, CallOutcome::Done(_)) {
                interp.hooks.on_function_return(&name, depth);
            }
            Ok(outcome)
        }
        Err(mut exc) => {
            exc.push_frame(sloc, elided);
            Err(exc)
        }
    }
}

/// Binds `args` into a fresh function-boundary child of the closure's
/// captured context, by value, then executes the body. Overflow arguments
/// to a variadic function are collected into a `__varg` array rather than
/// bound to a name, since params carries no trailing "rest" identifier of
/// its own (§4.9).
fn call_script<H: Hooks>(interp: &mut Interpreter<H>, sf: &ScriptFunction, args: Vec<Reference>) -> Result<CallOutcome, RuntimeException> {
    let ctx = ExecutiveContext::new_child(&sf.closure, true);
    for (i, pname) in sf.params.iter().enumerate() {
        let var = ctx.declare(&mut interp.gc, Arc::clone(pname), false);
        let value = match args.get(i) {
            Some(r) => r.read().map_err(|e| interp.err(e, sf.sloc.clone()))?,
            None => Value::Null,
        };
        var.initialize(value, false);
    }
    if sf.variadic && args.len() > sf.params.len() {
        let mut overflow = Vec::with_capacity(args.len() - sf.params.len());
        for r in &args[sf.params.len()..] {
            overflow.push(r.read().map_err(|e| interp.err(e, sf.sloc.clone()))?);
        }
        let varg = ctx.declare(&mut interp.gc, Arc::from(VARG_NAME), true);
        varg.initialize(Value::Array(Rc::new(overflow)), true);
    }

    let sig = interp.exec_block(sf.body.nodes(), &ctx)?;
    interp.run_deferred_on(&ctx)?;
    Ok(match sig {
        Signal::Return(r) => CallOutcome::Done(r),
        Signal::Tail(ptc) => CallOutcome::Tail(ptc),
        _ => CallOutcome::Done(Reference::void()),
    })
}

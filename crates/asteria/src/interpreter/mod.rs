//! The tree-walking interpreter (§4.6–§4.10): drives an [`AvmcQueue`] over a
//! shared operand stack, threading lexical scopes, the collector, proper
//! tail calls, and structured exceptions through every node.

mod call;
mod operators;

use std::rc::Rc;
use std::sync::Arc;

use ahash::RandomState;
use indexmap::IndexMap;

use crate::air::{AirNode, ReturnMode, SwitchClause};
use crate::avmc::AvmcQueue;
use crate::context::ExecutiveContext;
use crate::exception::{RuntimeError, RuntimeException};
use crate::function::Function;
use crate::gc::Gc;
use crate::hooks::{Hooks, NoopHooks};
use crate::opcode::PtcAware;
use crate::ptc::PtcArguments;
use crate::reference::{Modifier, Reference};
use crate::resource::{RecursionSentry, DEFAULT_MAX_RECURSION_DEPTH};
use crate::rng::ScriptRng;
use crate::sloc::SourceLocation;
use crate::value::Value;
use crate::variable::Variable;

/// What one AIR node, or a whole block of them, produced (§4.8).
enum Signal {
    Next,
    Return(Reference),
    NonLocal(crate::opcode::AirStatus),
    /// A `return` whose expression is a direct call in tail position; the
    /// call itself hasn't happened yet (§4.9, resolved by
    /// [`call::run_trampoline`] once control reaches a point that actually
    /// needs the result).
    Tail(PtcArguments),
}

type ImportHook = dyn FnMut(&str) -> Result<AvmcQueue, RuntimeError>;

/// Owns every piece of mutable execution state: the operand stack, the
/// collector, the recursion sentry, and the global scope. Generic over
/// [`Hooks`] so a production embedding that never installs hooks pays
/// nothing for the seam (`NoopHooks`'s methods are all `#[inline(always)]`
/// no-ops and disappear under monomorphization).
pub struct Interpreter<H: Hooks = NoopHooks> {
    stack: Vec<Reference>,
    /// Argument-marshalling stack fed by `FinishArgument` and drained by
    /// `FunctionCall`/`VariadicCall`/`ImportCall`; kept separate from `stack`
    /// so that evaluating one argument's sub-expression can freely push and
    /// pop `stack` without disturbing arguments already finished.
    arg_stack: Vec<Reference>,
    gc: Gc,
    sentry: RecursionSentry,
    hooks: H,
    global: Rc<ExecutiveContext>,
    rng: ScriptRng,
    /// Set by `DeclareVariable`/`DeclareReference`, consumed by the
    /// immediately following `InitializeVariable`/`InitializeReference`.
    pending_decl: Option<Rc<Variable>>,
    pending_ref_name: Option<Arc<str>>,
    import_hook: Option<Box<ImportHook>>,
}

impl<H: Hooks + Default> Interpreter<H> {
    pub fn new() -> Self {
        Self::with_hooks(H::default())
    }
}

impl<H: Hooks + Default> Default for Interpreter<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hooks> Interpreter<H> {
    pub fn with_hooks(hooks: H) -> Self {
        Self {
            stack: Vec::new(),
            arg_stack: Vec::new(),
            gc: Gc::new(),
            sentry: RecursionSentry::new(DEFAULT_MAX_RECURSION_DEPTH),
            hooks,
            global: ExecutiveContext::new_global(),
            rng: ScriptRng::new(),
            pending_decl: None,
            pending_ref_name: None,
            import_hook: None,
        }
    }

    pub fn global(&self) -> &Rc<ExecutiveContext> {
        &self.global
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Installs the callback used to resolve `import("path")` (§4.9, §6.6).
    /// Left unset by default: a freestanding interpreter has no filesystem
    /// opinion of its own, matching the embedding API's "you bring your own
    /// module loader" stance.
    pub fn set_import_hook(&mut self, hook: impl FnMut(&str) -> Result<AvmcQueue, RuntimeError> + 'static) {
        self.import_hook = Some(Box::new(hook));
    }

    /// Runs a solidified top-level body in a fresh child of the global
    /// scope, the entry point used by [`crate::runner`].
    pub fn execute(&mut self, queue: &AvmcQueue) -> Result<Reference, RuntimeException> {
        let ctx = ExecutiveContext::new_child(&self.global, true);
        let sig = self.exec_block(queue.nodes(), &ctx)?;
        self.run_deferred_on(&ctx)?;
        match sig {
            Signal::Return(r) => Ok(r),
            Signal::Tail(ptc) => call::run_trampoline(self, ptc),
            _ => Ok(Reference::void()),
        }
    }

    /// Runs a reloaded script as the top-level variadic function it is
    /// (§6.6): binds `args` under the reserved `__varg` name the same way a
    /// variadic function's overflow parameters are bound, then executes the
    /// body and drives the PTC trampoline if it ends in tail position.
    pub fn execute_with_args(&mut self, queue: &AvmcQueue, args: Vec<Value>) -> Result<Reference, RuntimeException> {
        let ctx = ExecutiveContext::new_child(&self.global, true);
        let varg = ctx.declare(&mut self.gc, Arc::from("__varg"), true);
        varg.initialize(Value::Array(Rc::new(args)), true);
        let sig = self.exec_block(queue.nodes(), &ctx)?;
        self.run_deferred_on(&ctx)?;
        match sig {
            Signal::Return(r) => Ok(r),
            Signal::Tail(ptc) => call::run_trampoline(self, ptc),
            _ => Ok(Reference::void()),
        }
    }

    fn err(&self, e: RuntimeError, sloc: SourceLocation) -> RuntimeException {
        RuntimeException::new(Value::String(Rc::from(e.0.as_bytes())), sloc)
    }

    fn maybe_collect(&mut self, ctx: &Rc<ExecutiveContext>) {
        if !self.gc.should_auto_collect() {
            return;
        }
        let mut roots = ctx.trace_roots();
        roots.extend(self.global.trace_roots());
        for r in self.stack.iter().chain(self.arg_stack.iter()) {
            if let Some(v) = r.root_variable() {
                roots.push(Rc::clone(v));
            }
        }
        self.gc.collect(roots.iter());
    }

    /// Evaluates a node list that is known to be a pure expression (no
    /// statement-level control flow), returning the one reference it leaves
    /// on the stack.
    fn eval_expr(&mut self, nodes: &[AirNode], ctx: &Rc<ExecutiveContext>) -> Result<Reference, RuntimeException> {
        let before = self.stack.len();
        self.exec_block(nodes, ctx)?;
        debug_assert_eq!(self.stack.len(), before + 1, "expression did not leave exactly one reference");
        Ok(self.stack.pop().expect("expression left no reference on the stack"))
    }

    fn run_deferred_on(&mut self, ctx: &Rc<ExecutiveContext>) -> Result<(), RuntimeException> {
        for q in ctx.take_deferred() {
            self.exec_block(q.nodes(), ctx)?;
        }
        Ok(())
    }

    /// Runs `body` in a fresh, non-function-boundary child of `parent`,
    /// running any `defer`red expressions registered in it before
    /// propagating the block's result (§4.6: defer runs on every exit path).
    fn exec_scoped(&mut self, body: &[AirNode], parent: &Rc<ExecutiveContext>) -> Result<Signal, RuntimeException> {
        let child = ExecutiveContext::new_child(parent, false);
        let result = self.exec_block(body, &child);
        self.run_deferred_on(&child)?;
        result
    }

    fn exec_block(&mut self, nodes: &[AirNode], ctx: &Rc<ExecutiveContext>) -> Result<Signal, RuntimeException> {
        for node in nodes {
            match self.exec_node(node, ctx)? {
                Signal::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Signal::Next)
    }

    fn exec_node(&mut self, node: &AirNode, ctx: &Rc<ExecutiveContext>) -> Result<Signal, RuntimeException> {
        match node {
            AirNode::ClearStack => {
                self.stack.pop();
                self.maybe_collect(ctx);
                Ok(Signal::Next)
            }

            AirNode::ExecuteBlock(body) => self.exec_scoped(body, ctx),

            AirNode::DeclareVariable { sloc, name, immutable } => {
                let var = ctx.declare(&mut self.gc, Arc::clone(name), *immutable);
                self.hooks.on_variable_declare(name, sloc.clone());
                self.pending_decl = Some(var);
                Ok(Signal::Next)
            }
            AirNode::InitializeVariable { sloc, immutable } => {
                let r = self.stack.pop().expect("InitializeVariable with empty stack");
                let value = r.read().map_err(|e| self.err(e, sloc.clone()))?;
                let var = self.pending_decl.take().expect("InitializeVariable without a pending declaration");
                var.initialize(value, *immutable);
                Ok(Signal::Next)
            }
            AirNode::DefineNullVariable { sloc, name, immutable } => {
                let var = ctx.declare(&mut self.gc, Arc::clone(name), *immutable);
                var.initialize(Value::Null, *immutable);
                self.hooks.on_variable_declare(name, sloc.clone());
                Ok(Signal::Next)
            }
            AirNode::DeclareReference { sloc, name } => {
                self.hooks.on_variable_declare(name, sloc.clone());
                self.pending_ref_name = Some(Arc::clone(name));
                Ok(Signal::Next)
            }
            AirNode::InitializeReference { sloc } => {
                let r = self.stack.pop().expect("InitializeReference with empty stack");
                let var = r
                    .root_variable()
                    .cloned()
                    .ok_or_else(|| self.err(RuntimeError::new("cannot bind a reference group to a non-variable expression"), sloc.clone()))?;
                let name = self.pending_ref_name.take().expect("InitializeReference without a pending declaration");
                ctx.bind_name(name, var);
                Ok(Signal::Next)
            }
            AirNode::UnpackStructArray { sloc, names, immutable } => {
                let r = self.stack.pop().expect("UnpackStructArray with empty stack");
                let value = r.read().map_err(|e| self.err(e, sloc.clone()))?;
                let Value::Array(arr) = value else {
                    return Err(self.err(RuntimeError::new(format!("cannot destructure a value of type `{}` as an array", value.type_name())), sloc.clone()));
                };
                for (i, name) in names.iter().enumerate() {
                    let v = arr.get(i).cloned().unwrap_or(Value::Null);
                    let var = ctx.declare(&mut self.gc, Arc::clone(name), *immutable);
                    var.initialize(v, *immutable);
                }
                Ok(Signal::Next)
            }
            AirNode::UnpackStructObject { sloc, names, immutable } => {
                let r = self.stack.pop().expect("UnpackStructObject with empty stack");
                let value = r.read().map_err(|e| self.err(e, sloc.clone()))?;
                let Value::Object(obj) = value else {
                    return Err(self.err(RuntimeError::new(format!("cannot destructure a value of type `{}` as an object", value.type_name())), sloc.clone()));
                };
                for name in names {
                    let v = obj.get(name.as_ref()).cloned().unwrap_or(Value::Null);
                    let var = ctx.declare(&mut self.gc, Arc::clone(name), *immutable);
                    var.initialize(v, *immutable);
                }
                Ok(Signal::Next)
            }

            AirNode::IfStmt { negative, cond, true_branch, false_branch } => {
                let c = self.eval_expr(cond, ctx)?.read().map_err(|e| self.err(e, first_sloc(cond)))?;
                let mut truthy = c.is_truthy();
                if *negative {
                    truthy = !truthy;
                }
                self.exec_scoped(if truthy { true_branch } else { false_branch }, ctx)
            }

            AirNode::SwitchStmt { ctrl, clauses } => self.exec_switch(ctrl, clauses, ctx),

            AirNode::DoWhileStmt { body, negative, cond } => loop {
                match self.exec_scoped(body, ctx)? {
                    Signal::Next => {}
                    Signal::NonLocal(s) if s.matches_while_break() => return Ok(Signal::Next),
                    Signal::NonLocal(s) if s.matches_while_continue() => {}
                    other => return Ok(other),
                }
                let c = self.eval_expr(cond, ctx)?.read().map_err(|e| self.err(e, first_sloc(cond)))?;
                let mut truthy = c.is_truthy();
                if *negative {
                    truthy = !truthy;
                }
                if !truthy {
                    return Ok(Signal::Next);
                }
            },

            AirNode::WhileStmt { negative, cond, body } => loop {
                let c = self.eval_expr(cond, ctx)?.read().map_err(|e| self.err(e, first_sloc(cond)))?;
                let mut truthy = c.is_truthy();
                if *negative {
                    truthy = !truthy;
                }
                if !truthy {
                    return Ok(Signal::Next);
                }
                match self.exec_scoped(body, ctx)? {
                    Signal::Next => {}
                    Signal::NonLocal(s) if s.matches_while_break() => return Ok(Signal::Next),
                    Signal::NonLocal(s) if s.matches_while_continue() => {}
                    other => return Ok(other),
                }
            },

            AirNode::ForEachStmt { key_name, mapped_name, range, body } => {
                let sloc = first_sloc(range);
                let range_val = self.eval_expr(range, ctx)?.read().map_err(|e| self.err(e, sloc))?;
                let pairs: Vec<(Value, Value)> = match &range_val {
                    Value::Array(a) => a.iter().enumerate().map(|(i, v)| (Value::Integer(i as i64), v.clone())).collect(),
                    Value::Object(o) => o.iter().map(|(k, v)| (Value::String(Rc::from(k.as_bytes())), v.clone())).collect(),
                    other => return Err(self.err(RuntimeError::new(format!("cannot iterate over a value of type `{}`", other.type_name())), sloc)),
                };
                for (k, v) in pairs {
                    let child = ExecutiveContext::new_child(ctx, false);
                    let kvar = child.declare(&mut self.gc, Arc::clone(key_name), true);
                    kvar.initialize(k, true);
                    let vvar = child.declare(&mut self.gc, Arc::clone(mapped_name), true);
                    vvar.initialize(v, true);
                    let sig = self.exec_block(body, &child)?;
                    self.run_deferred_on(&child)?;
                    match sig {
                        Signal::Next => {}
                        Signal::NonLocal(s) if s.matches_for_break() => break,
                        Signal::NonLocal(s) if s.matches_for_continue() => {}
                        other => return Ok(other),
                    }
                }
                Ok(Signal::Next)
            }

            AirNode::ForStmt { init, cond, step, body } => {
                let loop_ctx = ExecutiveContext::new_child(ctx, false);
                self.exec_block(init, &loop_ctx)?;
                loop {
                    if !cond.is_empty() {
                        let c = self.eval_expr(cond, &loop_ctx)?.read().map_err(|e| self.err(e, first_sloc(cond)))?;
                        if !c.is_truthy() {
                            break;
                        }
                    }
                    let iter_ctx = ExecutiveContext::new_child(&loop_ctx, false);
                    let sig = self.exec_block(body, &iter_ctx)?;
                    self.run_deferred_on(&iter_ctx)?;
                    match sig {
                        Signal::Next => {}
                        Signal::NonLocal(s) if s.matches_for_break() => break,
                        Signal::NonLocal(s) if s.matches_for_continue() => {}
                        other => return Ok(other),
                    }
                    if !step.is_empty() {
                        self.eval_expr(step, &loop_ctx)?;
                    }
                }
                Ok(Signal::Next)
            }

            AirNode::TryStmt { try_body, sloc_catch, except_name, catch_body } => match self.exec_scoped(try_body, ctx) {
                Ok(sig) => Ok(sig),
                Err(exc) => {
                    self.hooks.on_exception_unwind(sloc_catch.clone(), self.sentry.depth());
                    let child = ExecutiveContext::new_child(ctx, false);
                    let var = child.declare(&mut self.gc, Arc::clone(except_name), true);
                    var.initialize(exc.value, true);
                    let sig = self.exec_block(catch_body, &child)?;
                    self.run_deferred_on(&child)?;
                    Ok(sig)
                }
            },

            AirNode::Throw { sloc, expr } => {
                let v = self.eval_expr(expr, ctx)?.read().map_err(|e| self.err(e, sloc.clone()))?;
                Err(RuntimeException::new(v, sloc.clone()))
            }

            AirNode::SimpleStatus(status) => Ok(Signal::NonLocal(*status)),

            AirNode::ReturnStmt { sloc, mode, expr } => self.exec_return(sloc.clone(), *mode, expr, ctx),

            AirNode::Assert { sloc, expr, message } => {
                let v = self.eval_expr(expr, ctx)?.read().map_err(|e| self.err(e, sloc.clone()))?;
                if !v.is_truthy() {
                    let msg = message.as_deref().unwrap_or("assertion failed");
                    return Err(self.err(RuntimeError::new(msg.to_string()), sloc.clone()));
                }
                Ok(Signal::Next)
            }

            AirNode::CheckArgument { sloc } => {
                let is_void = self.stack.last().map_or(true, Reference::is_void);
                if is_void {
                    return Err(self.err(RuntimeError::new("missing required argument"), sloc.clone()));
                }
                Ok(Signal::Next)
            }

            AirNode::DeferExpression { sloc: _, expr } => {
                ctx.push_deferred(AvmcQueue::solidify(expr.clone()));
                Ok(Signal::Next)
            }

            AirNode::SingleStepTrap(sloc) => {
                self.hooks.on_single_step(sloc.clone());
                Ok(Signal::Next)
            }

            AirNode::PushGlobalReference { sloc, name } => {
                let var = self
                    .global
                    .get_named_reference(name)
                    .ok_or_else(|| self.err(RuntimeError::new(format!("undeclared global name `{name}`")), sloc.clone()))?;
                self.stack.push(Reference::from_variable(var));
                Ok(Signal::Next)
            }
            AirNode::PushLocalReference { sloc, name } => {
                let var = ctx
                    .get_named_reference(name)
                    .ok_or_else(|| self.err(RuntimeError::new(format!("undeclared name `{name}`")), sloc.clone()))?;
                self.stack.push(Reference::from_variable(var));
                Ok(Signal::Next)
            }
            AirNode::PushBoundReference(r) => {
                self.stack.push(r.clone());
                Ok(Signal::Next)
            }
            AirNode::PushTemporary(v) => {
                self.stack.push(Reference::from_constant(v.clone()));
                Ok(Signal::Next)
            }

            AirNode::DefineFunction { sloc, name, params, variadic, body } => {
                let sf = crate::function::ScriptFunction {
                    name: Arc::clone(name),
                    sloc: sloc.clone(),
                    params: params.clone(),
                    variadic: *variadic,
                    body: AvmcQueue::from_shared(Rc::clone(body)),
                    closure: Rc::clone(ctx),
                };
                self.stack.push(Reference::from_constant(Value::Function(Rc::new(Function::Script(sf)))));
                Ok(Signal::Next)
            }

            AirNode::BranchExpression { assign, true_branch, false_branch } => {
                let orig = self.stack.pop().expect("BranchExpression with empty stack");
                let sloc = if !true_branch.is_empty() { first_sloc(true_branch) } else { first_sloc(false_branch) };
                let truthy = orig.read().map_err(|e| self.err(e, sloc))?.is_truthy();
                let branch = if truthy { true_branch } else { false_branch };
                self.select_branch(orig, branch, *assign, ctx)
            }
            AirNode::Coalescence { assign, null_branch } => {
                let orig = self.stack.pop().expect("Coalescence with empty stack");
                let is_null = orig.read().map_err(|e| self.err(e, first_sloc(null_branch)))?.is_null();
                if !is_null {
                    self.stack.push(orig);
                    return Ok(Signal::Next);
                }
                self.select_branch(orig, null_branch, *assign, ctx)
            }

            AirNode::FinishArgument { sloc, by_ref } => {
                let r = self.stack.pop().expect("FinishArgument with empty stack");
                let arg = if *by_ref {
                    r
                } else {
                    Reference::from_constant(r.read().map_err(|e| self.err(e, sloc.clone()))?)
                };
                self.arg_stack.push(arg);
                Ok(Signal::Next)
            }
            AirNode::FunctionCall { sloc, nargs } => {
                let (callee, self_ref, args) = call::pop_call_operands(self, *nargs);
                let result = call::invoke(self, callee, self_ref, args, sloc.clone())?;
                self.stack.push(result);
                Ok(Signal::Next)
            }
            AirNode::VariadicCall { sloc } => {
                let gen_ref = self.stack.pop().expect("VariadicCall with empty stack");
                let callee_ref = self.stack.pop().expect("VariadicCall with empty stack");
                let self_ref = callee_ref.self_reference();
                let args = self.collect_variadic_args(gen_ref, sloc.clone())?;
                let result = call::invoke(self, callee_ref, self_ref, args, sloc.clone())?;
                self.stack.push(result);
                Ok(Signal::Next)
            }
            AirNode::ImportCall { sloc, nargs } => self.exec_import(sloc.clone(), *nargs),

            AirNode::MemberAccess { sloc: _, name } => {
                let mut r = self.stack.pop().expect("MemberAccess with empty stack");
                r.push_modifier(Modifier::ObjectKey(Arc::clone(name)));
                self.stack.push(r);
                Ok(Signal::Next)
            }
            AirNode::PushUnnamedArray { sloc, nelems } => {
                let n = *nelems as usize;
                let mut refs: Vec<Reference> = (0..n).map(|_| self.stack.pop().expect("PushUnnamedArray underflow")).collect();
                refs.reverse();
                let mut values = Vec::with_capacity(n);
                for r in refs.drain(..) {
                    values.push(r.read().map_err(|e| self.err(e, sloc.clone()))?);
                }
                self.stack.push(Reference::from_constant(Value::Array(Rc::new(values))));
                Ok(Signal::Next)
            }
            AirNode::PushUnnamedObject { sloc, keys } => {
                let n = keys.len();
                let mut refs: Vec<Reference> = (0..n).map(|_| self.stack.pop().expect("PushUnnamedObject underflow")).collect();
                refs.reverse();
                let mut map = IndexMap::with_hasher(RandomState::new());
                for (k, r) in keys.iter().zip(refs.drain(..)) {
                    map.insert(Arc::clone(k), r.read().map_err(|e| self.err(e, sloc.clone()))?);
                }
                self.stack.push(Reference::from_constant(Value::Object(Rc::new(map))));
                Ok(Signal::Next)
            }
            AirNode::ApplyOperator { sloc, xop, assign } => {
                operators::apply(*xop, *assign, &mut self.stack, &mut self.rng).map_err(|e| self.err(e, sloc.clone()))?;
                Ok(Signal::Next)
            }
            AirNode::CatchExpression { sloc: _, body } => {
                let before = self.stack.len();
                let result = self.exec_block(body, ctx);
                self.stack.truncate(before);
                match result {
                    Ok(_) => self.stack.push(Reference::from_constant(Value::Null)),
                    Err(exc) => self.stack.push(Reference::from_constant(exc.value)),
                }
                Ok(Signal::Next)
            }
        }
    }

    /// Shared tail of `BranchExpression`/`Coalescence` (§4.7 `&&`/`||`/`??`
    /// and their `=`-assigning forms): `orig` is the already-popped original
    /// reference; an empty `branch` means "leave the value unchanged", and a
    /// non-empty one is evaluated and either pushed as a fresh result or, if
    /// `assign`, written back through `orig`.
    fn select_branch(&mut self, orig: Reference, branch: &[AirNode], assign: bool, ctx: &Rc<ExecutiveContext>) -> Result<Signal, RuntimeException> {
        if branch.is_empty() {
            self.stack.push(orig);
            return Ok(Signal::Next);
        }
        let result_ref = self.eval_expr(branch, ctx)?;
        if assign {
            let v = result_ref.read().map_err(|e| self.err(e, first_sloc(branch)))?;
            orig.write(v).map_err(|e| self.err(e, first_sloc(branch)))?;
            self.stack.push(orig);
        } else {
            self.stack.push(result_ref);
        }
        Ok(Signal::Next)
    }

    fn exec_switch(&mut self, ctrl: &[AirNode], clauses: &[SwitchClause], ctx: &Rc<ExecutiveContext>) -> Result<Signal, RuntimeException> {
        let ctrl_val = self.eval_expr(ctrl, ctx)?.read().map_err(|e| self.err(e, first_sloc(ctrl)))?;
        let child = ExecutiveContext::new_child(ctx, false);
        let mut matched = None;
        for (i, c) in clauses.iter().enumerate() {
            if let Some(label_nodes) = &c.label {
                let label_val = self.eval_expr(label_nodes, &child)?.read().map_err(|e| self.err(e, first_sloc(label_nodes)))?;
                if label_val.equals(&ctrl_val) {
                    matched = Some(i);
                    break;
                }
            }
        }
        let start = matched.or_else(|| clauses.iter().position(|c| c.label.is_none()));
        let signal = if let Some(start) = start {
            let mut result = Signal::Next;
            for c in &clauses[start..] {
                match self.exec_block(&c.body, &child)? {
                    Signal::Next => continue,
                    Signal::NonLocal(s) if s.matches_switch_break() => {
                        result = Signal::Next;
                        break;
                    }
                    other => {
                        result = other;
                        break;
                    }
                }
            }
            result
        } else {
            Signal::Next
        };
        self.run_deferred_on(&child)?;
        Ok(signal)
    }

    fn exec_return(&mut self, sloc: SourceLocation, mode: ReturnMode, expr: &[AirNode], ctx: &Rc<ExecutiveContext>) -> Result<Signal, RuntimeException> {
        if matches!(mode, ReturnMode::ByValue | ReturnMode::ByRef) {
            if let Some(AirNode::FunctionCall { sloc: call_sloc, nargs }) = expr.last() {
                self.exec_block(&expr[..expr.len() - 1], ctx)?;
                let (callee, self_ref, args) = call::pop_call_operands(self, *nargs);
                let callee_val = callee.read().map_err(|e| self.err(e, call_sloc.clone()))?;
                let Value::Function(f) = callee_val else {
                    return Err(self.err(
                        RuntimeError::new(format!("attempt to call a value of type `{}`", callee_val.type_name())),
                        call_sloc.clone(),
                    ));
                };
                let aware = if matches!(mode, ReturnMode::ByRef) { PtcAware::ByRef } else { PtcAware::ByVal };
                return Ok(Signal::Tail(PtcArguments::new(f, self_ref, args, aware, call_sloc.clone())));
            }
        }
        match mode {
            ReturnMode::Void => Ok(Signal::Return(Reference::void())),
            ReturnMode::ByValue => {
                let r = self.eval_expr(expr, ctx)?;
                let v = r.read().map_err(|e| self.err(e, sloc))?;
                Ok(Signal::Return(Reference::from_constant(v)))
            }
            ReturnMode::ByRef => {
                let r = self.eval_expr(expr, ctx)?;
                Ok(Signal::Return(r))
            }
        }
    }

    /// Expands a `VariadicCall`'s generator operand into a concrete
    /// argument list (§4.9): an array spreads its elements; `null` spreads
    /// to no arguments; a function is first called with zero arguments to
    /// obtain an integer count, then called once per index `0..count` to
    /// produce each argument in turn.
    fn collect_variadic_args(&mut self, gen_ref: Reference, sloc: SourceLocation) -> Result<Vec<Reference>, RuntimeException> {
        let gen_val = gen_ref.read().map_err(|e| self.err(e, sloc.clone()))?;
        match gen_val {
            Value::Array(arr) => Ok(arr.iter().cloned().map(Reference::from_constant).collect()),
            Value::Null => Ok(Vec::new()),
            Value::Function(_) => {
                let count_ref = call::invoke(self, gen_ref.clone(), Reference::void(), Vec::new(), sloc.clone())?;
                let count_val = count_ref.read().map_err(|e| self.err(e, sloc.clone()))?;
                let Value::Integer(count) = count_val else {
                    return Err(self.err(
                        RuntimeError::new("a variadic generator function must return an integer count"),
                        sloc,
                    ));
                };
                if count < 0 {
                    return Err(self.err(RuntimeError::new("a variadic generator function returned a negative count"), sloc));
                }
                let mut args = Vec::with_capacity(count as usize);
                for i in 0..count {
                    let idx_arg = Reference::from_constant(Value::Integer(i));
                    let r = call::invoke(self, gen_ref.clone(), Reference::void(), vec![idx_arg], sloc.clone())?;
                    args.push(Reference::from_constant(r.read().map_err(|e| self.err(e, sloc.clone()))?));
                }
                Ok(args)
            }
            other => Err(self.err(
                RuntimeError::new(format!(
                    "a variadic call site requires an array, function, or null generator, got `{}`",
                    other.type_name()
                )),
                sloc,
            )),
        }
    }

    fn exec_import(&mut self, sloc: SourceLocation, nargs: u32) -> Result<Signal, RuntimeException> {
        let mut args = Vec::with_capacity(nargs as usize);
        for _ in 0..nargs {
            args.push(self.arg_stack.pop().expect("ImportCall argument underflow"));
        }
        args.reverse();
        let path_bytes = match args.first().map(Reference::read).transpose().map_err(|e| self.err(e, sloc.clone()))? {
            Some(Value::String(s)) => s,
            _ => return Err(self.err(RuntimeError::new("import requires a string path as its first argument"), sloc.clone())),
        };
        let path = std::str::from_utf8(&path_bytes)
            .map_err(|_| self.err(RuntimeError::new("import path is not valid UTF-8"), sloc.clone()))?;
        let queue = {
            let hook = self
                .import_hook
                .as_mut()
                .ok_or_else(|| RuntimeError::new("this interpreter has no import hook configured"))
                .map_err(|e| self.err(e, sloc.clone()))?;
            hook(path).map_err(|e| self.err(e, sloc))?
        };
        let module_ctx = ExecutiveContext::new_child(&self.global, true);
        let sig = self.exec_block(queue.nodes(), &module_ctx)?;
        self.run_deferred_on(&module_ctx)?;
        let result = match sig {
            Signal::Return(r) => r,
            _ => Reference::void(),
        };
        self.stack.push(result);
        Ok(Signal::Next)
    }
}

/// Finds the source location of the first node in an expression, falling
/// back to a synthetic one when the list is empty (the control expression
/// of a loop/branch is never actually empty in well-formed AIR, but this
/// keeps error reporting total rather than panicking).
fn first_sloc(nodes: &[AirNode]) -> SourceLocation {
    nodes.iter().find_map(node_sloc).unwrap_or_else(|| SourceLocation::synthetic("<generated>"))
}

fn node_sloc(node: &AirNode) -> Option<SourceLocation> {
    match node {
        AirNode::DeclareVariable { sloc, .. }
        | AirNode::InitializeVariable { sloc, .. }
        | AirNode::DefineNullVariable { sloc, .. }
        | AirNode::DeclareReference { sloc, .. }
        | AirNode::InitializeReference { sloc }
        | AirNode::UnpackStructArray { sloc, .. }
        | AirNode::UnpackStructObject { sloc, .. }
        | AirNode::Throw { sloc, .. }
        | AirNode::ReturnStmt { sloc, .. }
        | AirNode::Assert { sloc, .. }
        | AirNode::CheckArgument { sloc }
        | AirNode::DeferExpression { sloc, .. }
        | AirNode::PushGlobalReference { sloc, .. }
        | AirNode::PushLocalReference { sloc, .. }
        | AirNode::DefineFunction { sloc, .. }
        | AirNode::FinishArgument { sloc, .. }
        | AirNode::FunctionCall { sloc, .. }
        | AirNode::VariadicCall { sloc }
        | AirNode::ImportCall { sloc, .. }
        | AirNode::MemberAccess { sloc, .. }
        | AirNode::PushUnnamedArray { sloc, .. }
        | AirNode::PushUnnamedObject { sloc, .. }
        | AirNode::ApplyOperator { sloc, .. }
        | AirNode::CatchExpression { sloc, .. } => Some(sloc.clone()),
        AirNode::SingleStepTrap(sloc) => Some(sloc.clone()),
        _ => None,
    }
}

//! The runtime executive context (§3.9, §4.6): a chain of lexical scopes,
//! each holding a named-variable map, a deferred-expression list run LIFO on
//! scope exit, and a link to its lexically enclosing parent (which is how
//! closures keep their captured scope alive after the defining call
//! returns).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ahash::RandomState;
use indexmap::IndexMap;

use crate::avmc::AvmcQueue;
use crate::gc::Gc;
use crate::variable::Variable;

pub struct ExecutiveContext {
    parent: Option<Rc<ExecutiveContext>>,
    names: RefCell<IndexMap<Arc<str>, Rc<Variable>, RandomState>>,
    /// True at the top of a function call (as opposed to a plain nested
    /// block); closures stop walking past this boundary when deciding what
    /// counts as their "own" captured scope versus the caller's.
    is_function_boundary: bool,
    /// Expressions registered by `defer`, run in reverse order whenever
    /// this scope is left, including by exception, `return`, `break`, or
    /// `continue` (§4.6 "defer runs even on abnormal exit").
    deferred: RefCell<Vec<AvmcQueue>>,
}

impl ExecutiveContext {
    pub fn new_global() -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            names: RefCell::new(IndexMap::with_hasher(RandomState::new())),
            is_function_boundary: true,
            deferred: RefCell::new(Vec::new()),
        })
    }

    pub fn new_child(parent: &Rc<ExecutiveContext>, is_function_boundary: bool) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(Rc::clone(parent)),
            names: RefCell::new(IndexMap::with_hasher(RandomState::new())),
            is_function_boundary,
            deferred: RefCell::new(Vec::new()),
        })
    }

    pub fn parent(&self) -> Option<&Rc<ExecutiveContext>> {
        self.parent.as_ref()
    }

    pub fn is_function_boundary(&self) -> bool {
        self.is_function_boundary
    }

    /// Declares a fresh variable in this scope, shadowing any variable of
    /// the same name visible from an enclosing scope. Registers the cell
    /// with `gc` so the collector can trace and eventually reclaim it.
    pub fn declare(&self, gc: &mut Gc, name: Arc<str>, immutable: bool) -> Rc<Variable> {
        let var = Rc::new(Variable::uninitialized(immutable));
        gc.track(&var);
        self.names.borrow_mut().insert(name, Rc::clone(&var));
        var
    }

    /// Binds an already-allocated cell to `name` in this scope, aliasing its
    /// storage rather than copying its value. Used for `ref` group
    /// declarators and bound parameters, where the callee's local name must
    /// refer to the exact same `Variable` the caller's reference resolves
    /// to; the cell itself was registered with the GC whenever it was
    /// originally declared, so this does not touch `Gc` again.
    pub fn bind_name(&self, name: Arc<str>, var: Rc<Variable>) {
        self.names.borrow_mut().insert(name, var);
    }

    /// Resolves a name by walking this scope and its lexical ancestors.
    pub fn get_named_reference(&self, name: &str) -> Option<Rc<Variable>> {
        if let Some(var) = self.names.borrow().get(name) {
            return Some(Rc::clone(var));
        }
        self.parent.as_ref().and_then(|p| p.get_named_reference(name))
    }

    pub fn push_deferred(&self, queue: AvmcQueue) {
        self.deferred.borrow_mut().push(queue);
    }

    /// Drains this scope's deferred expressions in LIFO order, leaving the
    /// list empty (deferred expressions only ever run once).
    pub fn take_deferred(&self) -> Vec<AvmcQueue> {
        let mut list = std::mem::take(&mut *self.deferred.borrow_mut());
        list.reverse();
        list
    }

    /// All variables directly declared in this scope and every ancestor,
    /// used by the collector as GC roots for a context chain (either the
    /// live call stack, or a closure's captured scope, via
    /// `Function::Script::closure`).
    pub fn trace_roots(&self) -> Vec<Rc<Variable>> {
        let mut out: Vec<Rc<Variable>> = self.names.borrow().values().cloned().collect();
        if let Some(parent) = &self.parent {
            out.extend(parent.trace_roots());
        }
        out
    }
}

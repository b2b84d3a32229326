//! Generational mark-and-sweep collector (§4.10).
//!
//! Reference counting alone cannot reclaim a closure that captures the very
//! context that holds it (`var f = func() { return f; };`), so every
//! `Variable` is additionally registered here. Collection walks the live
//! root set (the interpreter's context chain) and clears the value of any
//! cell that didn't get marked, which severs the cycle and lets the
//! existing `Rc` refcounts finish the job normally.
//!
//! Three generations mirror the spec's tiering: newly allocated variables
//! start in generation 0 and are promoted each time they survive a
//! collection of their generation, up to generation 2. Younger generations
//! are swept far more often than older ones.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::function::Function;
use crate::value::Value;
use crate::variable::Variable;

pub const GENERATION_COUNT: usize = 3;

/// Default number of allocations between an automatic generation-0 sweep.
pub const DEFAULT_YOUNG_THRESHOLD: usize = 4096;

pub struct Gc {
    pools: [Vec<Weak<Variable>>; GENERATION_COUNT],
    allocations_since_sweep: Cell<usize>,
    young_threshold: usize,
}

impl Gc {
    pub fn new() -> Self {
        Self::with_young_threshold(DEFAULT_YOUNG_THRESHOLD)
    }

    pub fn with_young_threshold(young_threshold: usize) -> Self {
        Self {
            pools: Default::default(),
            allocations_since_sweep: Cell::new(0),
            young_threshold,
        }
    }

    /// Tracks a newly allocated variable in generation 0.
    pub fn track(&mut self, var: &Rc<Variable>) {
        var.generation.set(0);
        self.pools[0].push(Rc::downgrade(var));
        self.allocations_since_sweep.set(self.allocations_since_sweep.get() + 1);
    }

    /// Whether an automatic young-generation sweep is due (§4.10
    /// "generation 0 is collected opportunistically").
    pub fn should_auto_collect(&self) -> bool {
        self.allocations_since_sweep.get() >= self.young_threshold
    }

    /// Runs a full trace-and-sweep over all three generations, given the
    /// current root set. `roots` is called once and must yield every
    /// variable directly reachable from live execution state (globals, the
    /// active context chain, and any reference stack operands).
    pub fn collect<'a>(&mut self, roots: impl IntoIterator<Item = &'a Rc<Variable>>) -> GcStats {
        for pool in &self.pools {
            for weak in pool {
                if let Some(var) = weak.upgrade() {
                    var.marked.set(false);
                }
            }
        }

        for root in roots {
            mark(root);
        }

        let mut collected = 0usize;
        let mut survived = 0usize;
        for gen in 0..GENERATION_COUNT {
            let mut next_gen = Vec::new();
            for weak in self.pools[gen].drain(..) {
                let Some(var) = weak.upgrade() else {
                    continue;
                };
                if var.marked.get() {
                    survived += 1;
                    let promoted = (gen + 1).min(GENERATION_COUNT - 1);
                    var.generation.set(promoted as u8);
                    next_gen.push(Rc::downgrade(&var));
                } else {
                    *var.get_mut_for_gc() = Value::Null;
                    collected += 1;
                }
            }
            let target = (gen + 1).min(GENERATION_COUNT - 1);
            self.pools[target].append(&mut next_gen);
        }

        self.allocations_since_sweep.set(0);
        GcStats { collected, survived }
    }
}

impl Default for Gc {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub collected: usize,
    pub survived: usize,
}

/// Marks `var` and everything reachable from it. Both the `Variable`
/// worklist (for closures reachable through other closures) and the
/// `Value` worklist (for arrays/objects nested arbitrarily deep) are
/// explicit stacks rather than recursive calls, per §9's "graph traversal
/// must not recurse on the shape of the data" rule.
fn mark(root: &Rc<Variable>) {
    let mut var_stack: Vec<Rc<Variable>> = vec![root.clone()];
    let mut value_stack: Vec<Value> = Vec::new();

    while let Some(var) = var_stack.pop() {
        if var.marked.replace(true) {
            continue;
        }
        var.trace_children(|value| value_stack.push(value.clone()));

        while let Some(value) = value_stack.pop() {
            match value {
                Value::Array(a) => value_stack.extend(a.iter().cloned()),
                Value::Object(o) => value_stack.extend(o.values().cloned()),
                Value::Function(f) => {
                    if let Function::Script(script) = f.as_ref() {
                        var_stack.extend(script.closure.trace_roots());
                    }
                }
                _ => {}
            }
        }
    }
}

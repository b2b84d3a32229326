//! Compile-time name resolution scaffolding (§4.3). Unlike
//! [`crate::context::ExecutiveContext`] this tracks no values — only which
//! names are visible in which scope, so [`codegen`](super::codegen) can
//! reject duplicate declarator names within one binding and decide whether
//! a bare identifier crosses a function boundary (relevant to how a
//! closure's free variables get captured).

use std::collections::HashSet;
use std::sync::Arc;

/// One compile-time lexical scope, linked to its enclosing scope.
pub struct AnalyticContext<'p> {
    parent: Option<&'p AnalyticContext<'p>>,
    names: HashSet<Arc<str>>,
    is_function_boundary: bool,
}

impl<'p> AnalyticContext<'p> {
    pub fn new_global() -> Self {
        Self { parent: None, names: HashSet::new(), is_function_boundary: true }
    }

    pub fn new_child(parent: &'p AnalyticContext<'p>, is_function_boundary: bool) -> Self {
        Self { parent: Some(parent), names: HashSet::new(), is_function_boundary }
    }

    /// Registers `name` as declared in this scope. Returns `false` if the
    /// name was already declared directly in this scope (not an ancestor),
    /// which callers surface as a codegen-time collision.
    pub fn declare(&mut self, name: Arc<str>) -> bool {
        self.names.insert(name)
    }

    pub fn is_declared_here(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether `name` resolves somewhere in this scope or an ancestor.
    pub fn is_declared(&self, name: &str) -> bool {
        self.names.contains(name) || self.parent.is_some_and(|p| p.is_declared(name))
    }

    /// Whether resolving `name` would cross at least one function boundary
    /// before finding its declaration, i.e. whether it's a free variable a
    /// closure needs to capture rather than a same-frame local.
    pub fn crosses_function_boundary(&self, name: &str) -> bool {
        if self.names.contains(name) {
            return false;
        }
        match self.parent {
            Some(p) => self.is_function_boundary || p.crosses_function_boundary(name),
            None => false,
        }
    }

    pub fn is_function_boundary(&self) -> bool {
        self.is_function_boundary
    }
}

//! References (§3.8): addressable operands on the evaluation stack. A
//! reference is a root (a constant, a variable cell, or void) plus a
//! composable chain of modifiers describing how to drill into it
//! (`a.b[0]` is `Variable(a)` with modifiers `[Key("b"), Index(0)]`).

use std::rc::Rc;
use std::sync::Arc;

use crate::exception::RuntimeError;
use crate::value::Value;
use crate::variable::Variable;

/// One step of a reference's modifier chain (§4.11).
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    ArrayIndex(i64),
    ArrayHead,
    ArrayTail,
    /// `[?]`: a uniformly chosen random element (§4.7 `Xop::Random`).
    ArrayRandom(i64),
    ObjectKey(Arc<str>),
}

#[derive(Clone)]
enum RefRoot {
    Constant(Value),
    Variable(Rc<Variable>),
    Void,
}

/// An addressable operand: readable always, writable/unsettable only when
/// rooted in a variable.
#[derive(Clone)]
pub struct Reference {
    root: RefRoot,
    mods: Vec<Modifier>,
}

impl Reference {
    pub fn from_constant(value: Value) -> Self {
        Self { root: RefRoot::Constant(value), mods: Vec::new() }
    }

    pub fn from_variable(var: Rc<Variable>) -> Self {
        Self { root: RefRoot::Variable(var), mods: Vec::new() }
    }

    pub fn void() -> Self {
        Self { root: RefRoot::Void, mods: Vec::new() }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.root, RefRoot::Void)
    }

    pub fn push_modifier(&mut self, m: Modifier) {
        self.mods.push(m);
    }

    /// Recovers the call-site `self` receiver (§4.9): a call's callee
    /// reference is popped off the stack and read as a function value, but
    /// if it was reached through a modifier chain (`obj.method`), the
    /// object one step up that chain is the method's receiver. Popping one
    /// modifier off a copy of the callee's lvalue reproduces exactly that
    /// object; a bare name (no modifiers) has no receiver and yields an
    /// empty reference.
    pub fn self_reference(&self) -> Reference {
        if self.mods.is_empty() {
            return Reference::void();
        }
        let mut r = self.clone();
        r.mods.pop();
        r
    }

    /// The variable cell this reference is rooted in, if any (used by `ref`
    /// bindings and closures to alias storage rather than copy a value).
    pub fn root_variable(&self) -> Option<&Rc<Variable>> {
        match &self.root {
            RefRoot::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Reads the referenced value, applying every modifier (§4.11).
    pub fn read(&self) -> Result<Value, RuntimeError> {
        let base = match &self.root {
            RefRoot::Constant(v) => v.clone(),
            RefRoot::Variable(var) => {
                if !var.is_initialized() {
                    return Err(RuntimeError::new("attempt to use an uninitialized variable"));
                }
                var.get().clone()
            }
            RefRoot::Void => return Err(RuntimeError::new("attempt to read a void reference")),
        };
        apply_read(base, &self.mods)
    }

    /// Writes a new value through the full modifier chain. Fails if the
    /// reference isn't rooted in a variable, or the variable is `const`.
    pub fn write(&self, value: Value) -> Result<(), RuntimeError> {
        let RefRoot::Variable(var) = &self.root else {
            return Err(RuntimeError::new("attempt to assign to a non-variable reference"));
        };
        if self.mods.is_empty() {
            var.assign(value).map_err(|e| RuntimeError::new(e.to_string()))?;
            return Ok(());
        }
        if var.is_immutable() {
            return Err(RuntimeError::new("attempt to assign to a constant variable"));
        }
        let mut root = var.get().clone();
        apply_write(&mut root, &self.mods, value)?;
        var.assign(root).map_err(|e| RuntimeError::new(e.to_string()))?;
        Ok(())
    }

    /// `unset value` (`Xop::Unset`): removes the referenced element and
    /// returns its prior value.
    pub fn unset(&self) -> Result<Value, RuntimeError> {
        let RefRoot::Variable(var) = &self.root else {
            return Err(RuntimeError::new("attempt to unset a non-variable reference"));
        };
        if self.mods.is_empty() {
            let old = var.get().clone();
            var.assign(Value::Null).map_err(|e| RuntimeError::new(e.to_string()))?;
            return Ok(old);
        }
        let mut root = var.get().clone();
        let old = apply_unset(&mut root, &self.mods)?;
        var.assign(root).map_err(|e| RuntimeError::new(e.to_string()))?;
        Ok(old)
    }
}

fn resolve_array_index(len: usize, idx: i64) -> Option<usize> {
    if idx >= 0 {
        let i = idx as usize;
        (i < len).then_some(i)
    } else {
        let back = (-idx) as usize;
        (back <= len).then_some(len - back)
    }
}

fn apply_read(mut cur: Value, mods: &[Modifier]) -> Result<Value, RuntimeError> {
    for m in mods {
        cur = match (m, cur) {
            (Modifier::ArrayIndex(i), Value::Array(a)) => match resolve_array_index(a.len(), *i) {
                Some(idx) => a[idx].clone(),
                None => Value::Null,
            },
            (Modifier::ArrayHead, Value::Array(a)) => a.first().cloned().unwrap_or(Value::Null),
            (Modifier::ArrayTail, Value::Array(a)) => a.last().cloned().unwrap_or(Value::Null),
            (Modifier::ArrayRandom(seed), Value::Array(a)) => {
                if a.is_empty() {
                    Value::Null
                } else {
                    let idx = (*seed as u64 as usize) % a.len();
                    a[idx].clone()
                }
            }
            (Modifier::ObjectKey(k), Value::Object(o)) => o.get(k.as_ref()).cloned().unwrap_or(Value::Null),
            (_, Value::Null) => Value::Null,
            (m, other) => {
                return Err(RuntimeError::new(format!(
                    "cannot apply modifier {m:?} to a value of type `{}`",
                    other.type_name()
                )));
            }
        };
    }
    Ok(cur)
}

fn apply_write(root: &mut Value, mods: &[Modifier], value: Value) -> Result<(), RuntimeError> {
    let (head, rest) = mods.split_first().expect("non-empty modifier chain");
    if matches!(root, Value::Null) {
        *root = match head {
            Modifier::ObjectKey(_) => Value::Object(Rc::new(Default::default())),
            _ => Value::Array(Rc::new(Vec::new())),
        };
    }
    match (head, root) {
        (Modifier::ArrayIndex(i), Value::Array(a)) => {
            let arr = Rc::make_mut(a);
            let idx = if *i >= 0 {
                *i as usize
            } else {
                let back = (-*i) as usize;
                if back > arr.len() {
                    return Err(RuntimeError::new("negative array index out of range for assignment"));
                }
                arr.len() - back
            };
            if idx >= arr.len() {
                arr.resize(idx + 1, Value::Null);
            }
            if rest.is_empty() {
                arr[idx] = value;
                Ok(())
            } else {
                apply_write(&mut arr[idx], rest, value)
            }
        }
        (Modifier::ArrayHead, Value::Array(a)) => {
            let arr = Rc::make_mut(a);
            if arr.is_empty() {
                arr.push(Value::Null);
            }
            if rest.is_empty() {
                arr[0] = value;
                Ok(())
            } else {
                apply_write(&mut arr[0], rest, value)
            }
        }
        (Modifier::ArrayTail, Value::Array(a)) => {
            let arr = Rc::make_mut(a);
            if arr.is_empty() {
                arr.push(Value::Null);
            }
            let last = arr.len() - 1;
            if rest.is_empty() {
                arr[last] = value;
                Ok(())
            } else {
                apply_write(&mut arr[last], rest, value)
            }
        }
        (Modifier::ArrayRandom(seed), Value::Array(a)) => {
            let arr = Rc::make_mut(a);
            if arr.is_empty() {
                arr.push(Value::Null);
            }
            let idx = (*seed as u64 as usize) % arr.len();
            if rest.is_empty() {
                arr[idx] = value;
                Ok(())
            } else {
                apply_write(&mut arr[idx], rest, value)
            }
        }
        (Modifier::ObjectKey(k), Value::Object(o)) => {
            let obj = Rc::make_mut(o);
            if rest.is_empty() {
                obj.insert(k.clone(), value);
                Ok(())
            } else {
                let slot = obj.entry(k.clone()).or_insert(Value::Null);
                apply_write(slot, rest, value)
            }
        }
        (m, other) => Err(RuntimeError::new(format!(
            "cannot apply modifier {m:?} to a value of type `{}`",
            other.type_name()
        ))),
    }
}

fn apply_unset(root: &mut Value, mods: &[Modifier]) -> Result<Value, RuntimeError> {
    let (head, rest) = mods.split_first().expect("non-empty modifier chain");
    if !rest.is_empty() {
        let child = match (head, &mut *root) {
            (Modifier::ArrayIndex(i), Value::Array(a)) => {
                let arr = Rc::make_mut(a);
                let len = arr.len();
                let idx = resolve_array_index(len, *i)
                    .ok_or_else(|| RuntimeError::new("array index out of range"))?;
                &mut arr[idx]
            }
            (Modifier::ObjectKey(k), Value::Object(o)) => {
                let obj = Rc::make_mut(o);
                obj.get_mut(k.as_ref()).ok_or_else(|| RuntimeError::new("no such object member"))?
            }
            _ => return Err(RuntimeError::new("invalid modifier for unset")),
        };
        return apply_unset(child, rest);
    }
    match (head, root) {
        (Modifier::ArrayIndex(i), Value::Array(a)) => {
            let arr = Rc::make_mut(a);
            let idx = resolve_array_index(arr.len(), *i)
                .ok_or_else(|| RuntimeError::new("array index out of range"))?;
            Ok(arr.remove(idx))
        }
        (Modifier::ArrayHead, Value::Array(a)) => {
            let arr = Rc::make_mut(a);
            if arr.is_empty() {
                return Err(RuntimeError::new("cannot unset the head of an empty array"));
            }
            Ok(arr.remove(0))
        }
        (Modifier::ArrayTail, Value::Array(a)) => {
            let arr = Rc::make_mut(a);
            arr.pop().ok_or_else(|| RuntimeError::new("cannot unset the tail of an empty array"))
        }
        (Modifier::ArrayRandom(seed), Value::Array(a)) => {
            let arr = Rc::make_mut(a);
            if arr.is_empty() {
                return Err(RuntimeError::new("cannot unset an element of an empty array"));
            }
            let idx = (*seed as u64 as usize) % arr.len();
            Ok(arr.remove(idx))
        }
        (Modifier::ObjectKey(k), Value::Object(o)) => {
            let obj = Rc::make_mut(o);
            obj.shift_remove(k.as_ref()).ok_or_else(|| RuntimeError::new("no such object member"))
        }
        (m, other) => Err(RuntimeError::new(format!(
            "cannot apply modifier {m:?} to a value of type `{}`",
            other.type_name()
        ))),
    }
}

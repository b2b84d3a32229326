//! The dynamically typed value domain (§3.6).
//!
//! Arrays and objects are copy-on-write: cloning a `Value::Array` or
//! `Value::Object` only bumps an `Rc` refcount, and the first mutation
//! through a non-unique handle clones the backing storage before writing.

use std::cmp::Ordering as StdOrdering;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use ahash::RandomState;
use indexmap::IndexMap;

/// A foreign object bound into the script by the embedder. The interpreter
/// only needs to know its type name and that it can be compared by
/// identity; everything else is the embedder's concern (§1 "binding of
/// foreign objects" is an external collaborator).
pub trait OpaqueValue: fmt::Debug {
    fn type_name(&self) -> &str;
}

pub type RcArray = Rc<Vec<Value>>;
pub type RcObject = Rc<IndexMap<Arc<str>, Value, RandomState>>;
pub type RcOpaque = Rc<dyn OpaqueValue>;
/// Raw storage for `Value::String`: an immutable byte sequence (§3.6), not
/// necessarily valid UTF-8 — the byte-wise operators (`notb`, `andb`/`orb`/
/// `xorb`, `sll`/`srl`/`sla`/`sra`, §4.7) can all produce byte sequences a
/// `str` could not hold.
pub type RcBytes = Rc<[u8]>;

/// The tagged union at the heart of the runtime (§3.6).
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(RcBytes),
    Opaque(RcOpaque),
    Function(Rc<crate::function::Function>),
    Array(RcArray),
    Object(RcObject),
}

/// The result of comparing two values (§3.6). Distinct from `Ordering`
/// because Asteria's comparison can legitimately refuse to order two
/// values (objects, opaques, functions, or mismatched types).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrdering {
    Less,
    Equal,
    Greater,
    Unordered,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Opaque(_) => "opaque",
            Value::Function(_) => "function",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Truthiness rule (§4.7): `null`, `false`, `0`, `±0.0`, NaN, and the
    /// empty string are false; everything else, including empty arrays and
    /// objects, is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Real(r) => *r != 0.0 && !r.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Opaque(_) | Value::Function(_) | Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `countof` (§4.7): 0 for `null`, byte length for strings, element
    /// count for arrays, key count for objects; undefined (caller's
    /// responsibility to reject) for everything else.
    pub fn countof(&self) -> Option<i64> {
        match self {
            Value::Null => Some(0),
            Value::String(s) => Some(s.len() as i64),
            Value::Array(a) => Some(a.len() as i64),
            Value::Object(o) => Some(o.len() as i64),
            _ => None,
        }
    }

    /// Three-way comparison per the ordering contract in §3.6.
    pub fn compare(&self, other: &Value) -> ValueOrdering {
        match (self, other) {
            (Value::Null, Value::Null) => ValueOrdering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => from_std(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => from_std(a.cmp(b)),
            (Value::Real(a), Value::Real(b)) => from_partial(a.partial_cmp(b)),
            (Value::Integer(a), Value::Real(b)) => compare_int_real(*a, *b),
            (Value::Real(a), Value::Integer(b)) => compare_int_real(*b, *a).reverse(),
            (Value::String(a), Value::String(b)) => from_std(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => compare_arrays(a, b),
            _ => ValueOrdering::Unordered,
        }
    }

    /// Strict equality: two values of different representable types (not
    /// covered by `compare`'s numeric-tower rule) are simply unequal rather
    /// than unordered, matching how `==`/`!=` behave for opaques/functions.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b) || object_eq(a, b),
            _ => self.compare(other) == ValueOrdering::Equal,
        }
    }
}

impl ValueOrdering {
    pub fn reverse(self) -> Self {
        match self {
            ValueOrdering::Less => ValueOrdering::Greater,
            ValueOrdering::Greater => ValueOrdering::Less,
            other => other,
        }
    }

    /// The sentinel string used by `cmp_3way` when comparison is undefined.
    pub const UNORDERED_SENTINEL: &'static str = "[unordered]";
}

fn from_std(o: StdOrdering) -> ValueOrdering {
    match o {
        StdOrdering::Less => ValueOrdering::Less,
        StdOrdering::Equal => ValueOrdering::Equal,
        StdOrdering::Greater => ValueOrdering::Greater,
    }
}

fn from_partial(o: Option<StdOrdering>) -> ValueOrdering {
    o.map(from_std).unwrap_or(ValueOrdering::Unordered)
}

/// Mixed integer/real comparison (§3.6): the integer is converted to a real
/// with round-down semantics for ordering purposes, but exact equality
/// additionally requires the round trip to reproduce the original integer
/// (so `2^60` and its nearest `f64` approximation are ordered but not
/// reported equal).
fn compare_int_real(i: i64, r: f64) -> ValueOrdering {
    if r.is_nan() {
        return ValueOrdering::Unordered;
    }
    let fi = i as f64;
    match fi.partial_cmp(&r) {
        Some(StdOrdering::Equal) => {
            if fi as i64 == i {
                ValueOrdering::Equal
            } else {
                // `i as f64` rounded away from `i` but still landed on the
                // same double as `r`; since that rounding always produces
                // another integer-valued double, compare the exact i128
                // values to break the tie rather than re-comparing the
                // already-equal doubles.
                from_std((i as i128).cmp(&(r as i128)))
            }
        }
        Some(other) => from_std(other),
        None => ValueOrdering::Unordered,
    }
}

fn compare_arrays(a: &[Value], b: &[Value]) -> ValueOrdering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.compare(y) {
            ValueOrdering::Equal => continue,
            other => return other,
        }
    }
    from_std(a.len().cmp(&b.len()))
}

fn object_eq(a: &IndexMap<Arc<str>, Value, RandomState>, b: &IndexMap<Arc<str>, Value, RandomState>) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| v.equals(bv)))
}

/// Breaks recursive destruction of deeply nested arrays/objects (§9): the
/// default derived drop glue would recurse once per nesting level, so
/// instead we detach a uniquely-owned container's children onto an
/// explicit worklist and keep popping until it's empty. A container still
/// shared with another owner is left alone — dropping `self`'s handle just
/// decrements its `Rc` refcount, and whichever drop finally observes
/// uniqueness does the flattening.
impl Drop for Value {
    fn drop(&mut self) {
        let root = match self {
            Value::Array(_) | Value::Object(_) => std::mem::replace(self, Value::Null),
            _ => return,
        };

        let mut stack = vec![root];
        while let Some(value) = stack.pop() {
            match value {
                Value::Array(a) => {
                    if let Ok(mut vec) = Rc::try_unwrap(a) {
                        stack.extend(vec.drain(..));
                    }
                }
                Value::Object(o) => {
                    if let Ok(map) = Rc::try_unwrap(o) {
                        stack.extend(map.into_values());
                    }
                }
                _ => {}
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::String(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),
            Value::Opaque(o) => write!(f, "<opaque {}>", o.type_name()),
            Value::Function(fun) => write!(f, "<function {}>", fun.name()),
            Value::Array(a) => f.debug_list().entries(a.iter()).finish(),
            Value::Object(o) => f.debug_map().entries(o.iter().map(|(k, v)| (k.as_ref(), v))).finish(),
        }
    }
}

//! The operator table (§4.7): `ApplyOperator` nodes dispatch here. Binary
//! arithmetic/comparison ops read their operands as plain values; `Subscr`
//! and the unary `Head`/`Tail`/`Random` ops instead extend the *reference*
//! they're given with a new modifier, so the result stays assignable
//! (`arr[0] = 1`, `arr[^] += 1`).

use std::rc::Rc;
use std::sync::Arc;

use crate::exception::RuntimeError;
use crate::opcode::Xop;
use crate::reference::{Modifier, Reference};
use crate::rng::ScriptRng;
use crate::value::{Value, ValueOrdering};

/// Pops this operator's operands off `stack`, evaluates it, and pushes the
/// result reference back. `assign`, when set, additionally writes the
/// result back through the left operand's reference instead of producing a
/// detached temporary (`+=` vs `+`).
pub fn apply(xop: Xop, assign: bool, stack: &mut Vec<Reference>, rng: &mut ScriptRng) -> Result<(), RuntimeError> {
    match xop.arity() {
        1 => apply_unary(xop, assign, stack, rng),
        2 => apply_binary(xop, assign, stack),
        3 => apply_fma(assign, stack),
        n => unreachable!("operator {xop:?} has unsupported arity {n}"),
    }
}

fn pop(stack: &mut Vec<Reference>) -> Reference {
    stack.pop().expect("operator operand missing from stack")
}

fn apply_unary(xop: Xop, assign: bool, stack: &mut Vec<Reference>, rng: &mut ScriptRng) -> Result<(), RuntimeError> {
    let r = pop(stack);
    match xop {
        Xop::Subscr => unreachable!("Subscr has arity 2"),
        Xop::Head | Xop::Tail | Xop::Random => {
            let mut out = r.clone();
            let modifier = match xop {
                Xop::Head => Modifier::ArrayHead,
                Xop::Tail => Modifier::ArrayTail,
                Xop::Random => Modifier::ArrayRandom(rng.next_u64() as i64),
                _ => unreachable!(),
            };
            out.push_modifier(modifier);
            stack.push(out);
            Ok(())
        }
        Xop::Unset => {
            let old = r.unset()?;
            stack.push(Reference::from_constant(old));
            Ok(())
        }
        Xop::Countof => {
            let v = r.read()?;
            let n = v.countof().ok_or_else(|| type_err("countof", &v))?;
            stack.push(Reference::from_constant(Value::Integer(n)));
            Ok(())
        }
        Xop::Typeof => {
            let v = r.read()?;
            stack.push(Reference::from_constant(Value::String(Rc::from(v.type_name().as_bytes()))));
            Ok(())
        }
        Xop::IsVoid => {
            stack.push(Reference::from_constant(Value::Boolean(r.is_void())));
            Ok(())
        }
        Xop::NotL => {
            let v = r.read()?;
            write_or_push(assign, &r, Value::Boolean(!v.is_truthy()), stack)
        }
        Xop::IncPre | Xop::IncPost | Xop::DecPre | Xop::DecPost => {
            let v = r.read()?;
            let delta = if matches!(xop, Xop::IncPre | Xop::IncPost) { 1 } else { -1 };
            let updated = add_delta(&v, delta)?;
            r.write(updated.clone())?;
            let result = if matches!(xop, Xop::IncPost | Xop::DecPost) { v } else { updated };
            stack.push(Reference::from_constant(result));
            Ok(())
        }
        Xop::Pos => numeric_unary(assign, &r, stack, |i| Ok(Value::Integer(i)), |f| Ok(Value::Real(f))),
        Xop::Neg => numeric_unary(
            assign,
            &r,
            stack,
            |i| i.checked_neg().map(Value::Integer).ok_or_else(|| RuntimeError::new("integer overflow in negation")),
            |f| Ok(Value::Real(-f)),
        ),
        Xop::NotB => {
            let v = r.read()?;
            let result = match v {
                Value::Boolean(b) => Value::Boolean(!b),
                Value::Integer(i) => Value::Integer(!i),
                Value::String(s) => Value::String(Rc::from(s.iter().map(|b| !b).collect::<Vec<u8>>())),
                other => return Err(type_err("notb", &other)),
            };
            write_or_push(assign, &r, result, stack)
        }
        Xop::Abs => numeric_unary(
            assign,
            &r,
            stack,
            |i| i.checked_abs().map(Value::Integer).ok_or_else(|| RuntimeError::new("integer overflow in abs")),
            |f| Ok(Value::Real(f.abs())),
        ),
        Xop::Sign => numeric_unary(
            assign,
            &r,
            stack,
            |i| Ok(Value::Integer(i.signum())),
            |f| Ok(Value::Real(if f == 0.0 { 0.0 } else { f.signum() })),
        ),
        Xop::Sqrt => real_unary(assign, &r, stack, |f| f.sqrt()),
        Xop::Round => real_unary(assign, &r, stack, f64::round),
        Xop::Floor => real_unary(assign, &r, stack, f64::floor),
        Xop::Ceil => real_unary(assign, &r, stack, f64::ceil),
        Xop::Trunc => real_unary(assign, &r, stack, f64::trunc),
        Xop::IsNan => {
            let v = r.read()?;
            let b = matches!(v, Value::Real(f) if f.is_nan());
            stack.push(Reference::from_constant(Value::Boolean(b)));
            Ok(())
        }
        Xop::IsInf => {
            let v = r.read()?;
            let b = matches!(v, Value::Real(f) if f.is_infinite());
            stack.push(Reference::from_constant(Value::Boolean(b)));
            Ok(())
        }
        Xop::IRound => real_to_int_unary(assign, &r, stack, |f| f.round()),
        Xop::IFloor => real_to_int_unary(assign, &r, stack, f64::floor),
        Xop::ICeil => real_to_int_unary(assign, &r, stack, f64::ceil),
        Xop::ITrunc => real_to_int_unary(assign, &r, stack, f64::trunc),
        Xop::Lzcnt => int_unary(assign, &r, stack, |i| Ok(i.leading_zeros() as i64)),
        Xop::Tzcnt => int_unary(assign, &r, stack, |i| Ok(i.trailing_zeros() as i64)),
        Xop::Popcnt => int_unary(assign, &r, stack, |i| Ok(i.count_ones() as i64)),
        other => unreachable!("operator {other:?} is not unary"),
    }
}

fn apply_binary(xop: Xop, assign: bool, stack: &mut Vec<Reference>) -> Result<(), RuntimeError> {
    let rhs = pop(stack);
    let lhs = pop(stack);
    match xop {
        Xop::Subscr => {
            let idx = rhs.read()?;
            let mut out = lhs.clone();
            let modifier = match idx {
                Value::Integer(i) => Modifier::ArrayIndex(i),
                Value::String(s) => {
                    let key = std::str::from_utf8(&s)
                        .map_err(|_| RuntimeError::new("cannot subscript an object with a non-UTF-8 string"))?;
                    Modifier::ObjectKey(Arc::from(key))
                }
                other => return Err(RuntimeError::new(format!("cannot subscript with a value of type `{}`", other.type_name()))),
            };
            out.push_modifier(modifier);
            stack.push(out);
            Ok(())
        }
        Xop::Assign => {
            let v = rhs.read()?;
            lhs.write(v)?;
            stack.push(lhs);
            Ok(())
        }
        Xop::CmpEq | Xop::CmpNe | Xop::CmpLt | Xop::CmpGt | Xop::CmpLte | Xop::CmpGte | Xop::Cmp3way | Xop::CmpUn => {
            let a = lhs.read()?;
            let b = rhs.read()?;
            let ord = a.compare(&b);
            let result = match xop {
                Xop::CmpEq => Value::Boolean(a.equals(&b)),
                Xop::CmpNe => Value::Boolean(!a.equals(&b)),
                Xop::CmpLt => Value::Boolean(ord == ValueOrdering::Less),
                Xop::CmpGt => Value::Boolean(ord == ValueOrdering::Greater),
                Xop::CmpLte => Value::Boolean(matches!(ord, ValueOrdering::Less | ValueOrdering::Equal)),
                Xop::CmpGte => Value::Boolean(matches!(ord, ValueOrdering::Greater | ValueOrdering::Equal)),
                Xop::CmpUn => Value::Boolean(ord == ValueOrdering::Unordered),
                Xop::Cmp3way => Value::String(Rc::from(
                    match ord {
                        ValueOrdering::Less => "<",
                        ValueOrdering::Equal => "=",
                        ValueOrdering::Greater => ">",
                        ValueOrdering::Unordered => ValueOrdering::UNORDERED_SENTINEL,
                    }
                    .as_bytes(),
                )),
                _ => unreachable!(),
            };
            stack.push(Reference::from_constant(result));
            Ok(())
        }
        Xop::Add | Xop::Sub | Xop::Mul | Xop::Div | Xop::Mod | Xop::AddM | Xop::SubM | Xop::MulM | Xop::AddS | Xop::SubS | Xop::MulS => {
            let a = lhs.read()?;
            let b = rhs.read()?;
            let result = arith(xop, &a, &b)?;
            write_or_push(assign, &lhs, result, stack)
        }
        Xop::Sll | Xop::Srl | Xop::Sla | Xop::Sra | Xop::AndB | Xop::OrB | Xop::XorB => {
            let a = lhs.read()?;
            let b = rhs.read()?;
            let result = bitwise(xop, &a, &b)?;
            write_or_push(assign, &lhs, result, stack)
        }
        other => unreachable!("operator {other:?} is not binary"),
    }
}

fn apply_fma(assign: bool, stack: &mut Vec<Reference>) -> Result<(), RuntimeError> {
    let c = pop(stack);
    let b = pop(stack);
    let a = pop(stack);
    let (x, y, z) = (a.read()?, b.read()?, c.read()?);
    let result = match (&x, &y, &z) {
        (Value::Real(x), Value::Real(y), Value::Real(z)) => Value::Real(x.mul_add(*y, *z)),
        (Value::Integer(x), Value::Integer(y), Value::Integer(z)) => Value::Integer(
            x.checked_mul(*y).and_then(|p| p.checked_add(*z)).ok_or_else(|| RuntimeError::new("integer overflow in fma"))?,
        ),
        _ => {
            let xf = as_f64(&x).ok_or_else(|| type_err("fma", &x))?;
            let yf = as_f64(&y).ok_or_else(|| type_err("fma", &y))?;
            let zf = as_f64(&z).ok_or_else(|| type_err("fma", &z))?;
            Value::Real(xf.mul_add(yf, zf))
        }
    };
    write_or_push(assign, &a, result, stack)
}

fn write_or_push(assign: bool, lhs: &Reference, value: Value, stack: &mut Vec<Reference>) -> Result<(), RuntimeError> {
    if assign {
        lhs.write(value)?;
        stack.push(lhs.clone());
    } else {
        stack.push(Reference::from_constant(value));
    }
    Ok(())
}

fn type_err(op: &str, v: &Value) -> RuntimeError {
    RuntimeError::new(format!("`{op}` is not defined for a value of type `{}`", v.type_name()))
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(i) => Some(*i as f64),
        Value::Real(r) => Some(*r),
        _ => None,
    }
}

fn add_delta(v: &Value, delta: i64) -> Result<Value, RuntimeError> {
    match v {
        Value::Integer(i) => i.checked_add(delta).map(Value::Integer).ok_or_else(|| RuntimeError::new("integer overflow")),
        Value::Real(r) => Ok(Value::Real(r + delta as f64)),
        other => Err(type_err("++/--", other)),
    }
}

fn arith(xop: Xop, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    if let (Value::Boolean(x), Value::Boolean(y)) = (a, b) {
        return match xop {
            Xop::Add | Xop::AddM | Xop::AddS => Ok(Value::Boolean(x | y)),
            Xop::Sub | Xop::SubM | Xop::SubS => Ok(Value::Boolean(x ^ y)),
            Xop::Mul | Xop::MulM | Xop::MulS => Ok(Value::Boolean(x & y)),
            _ => Err(type_err("arithmetic", a)),
        };
    }
    if let (Value::String(x), Value::String(y)) = (a, b) {
        if xop == Xop::Add {
            let mut out = Vec::with_capacity(x.len() + y.len());
            out.extend_from_slice(x);
            out.extend_from_slice(y);
            return Ok(Value::String(Rc::from(out)));
        }
    }
    if let (Value::String(s), Value::Integer(n)) | (Value::Integer(n), Value::String(s)) = (a, b) {
        if matches!(xop, Xop::Mul | Xop::MulM | Xop::MulS) {
            return string_duplicate(s, *n);
        }
    }
    if let (Value::Array(x), Value::Array(y)) = (a, b) {
        if xop == Xop::Add {
            let mut out = (**x).clone();
            out.extend((**y).iter().cloned());
            return Ok(Value::Array(Rc::new(out)));
        }
    }
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        let wrap = matches!(xop, Xop::AddM | Xop::SubM | Xop::MulM);
        let saturate = matches!(xop, Xop::AddS | Xop::SubS | Xop::MulS);
        let op_kind = match xop {
            Xop::Add | Xop::AddM | Xop::AddS => 0,
            Xop::Sub | Xop::SubM | Xop::SubS => 1,
            Xop::Mul | Xop::MulM | Xop::MulS => 2,
            Xop::Div => 3,
            Xop::Mod => 4,
            _ => unreachable!(),
        };
        return int_arith(op_kind, *x, *y, wrap, saturate);
    }
    let xf = as_f64(a).ok_or_else(|| type_err("arithmetic", a))?;
    let yf = as_f64(b).ok_or_else(|| type_err("arithmetic", b))?;
    Ok(Value::Real(match xop {
        Xop::Add | Xop::AddM | Xop::AddS => xf + yf,
        Xop::Sub | Xop::SubM | Xop::SubS => xf - yf,
        Xop::Mul | Xop::MulM | Xop::MulS => xf * yf,
        Xop::Div => xf / yf,
        Xop::Mod => xf % yf,
        _ => unreachable!(),
    }))
}

/// String duplication for `mul(string, integer)` (§4.7): the string is
/// repeated `n` times, with a negative `n` rejected and the resulting
/// byte length checked against overflow before allocating.
fn string_duplicate(s: &[u8], n: i64) -> Result<Value, RuntimeError> {
    if n < 0 {
        return Err(RuntimeError::new(format!("negative string duplicate count (value was `{n}`)")));
    }
    if n == 0 || s.is_empty() {
        return Ok(Value::String(Rc::from(Vec::new())));
    }
    let count = n as usize;
    let total = s.len().checked_mul(count).ok_or_else(|| RuntimeError::new("string length overflow in string duplication"))?;
    let mut out = Vec::with_capacity(total);
    for _ in 0..count {
        out.extend_from_slice(s);
    }
    Ok(Value::String(Rc::from(out)))
}

fn int_arith(op_kind: u8, x: i64, y: i64, wrap: bool, saturate: bool) -> Result<Value, RuntimeError> {
    if wrap {
        return Ok(Value::Integer(match op_kind {
            0 => x.wrapping_add(y),
            1 => x.wrapping_sub(y),
            2 => x.wrapping_mul(y),
            _ => unreachable!(),
        }));
    }
    if saturate {
        return Ok(Value::Integer(match op_kind {
            0 => x.saturating_add(y),
            1 => x.saturating_sub(y),
            2 => x.saturating_mul(y),
            _ => unreachable!(),
        }));
    }
    let result = match op_kind {
        0 => x.checked_add(y),
        1 => x.checked_sub(y),
        2 => x.checked_mul(y),
        3 => {
            if y == 0 {
                return Err(RuntimeError::new("integer division by zero"));
            }
            x.checked_div(y)
        }
        4 => {
            if y == 0 {
                return Err(RuntimeError::new("integer modulo by zero"));
            }
            x.checked_rem(y)
        }
        _ => unreachable!(),
    };
    result.map(Value::Integer).ok_or_else(|| RuntimeError::new("integer overflow"))
}

fn bitwise(xop: Xop, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    if let (Value::Boolean(x), Value::Boolean(y)) = (a, b) {
        return Ok(Value::Boolean(match xop {
            Xop::AndB => x & y,
            Xop::OrB => x | y,
            Xop::XorB => x ^ y,
            _ => return Err(type_err("bitwise", a)),
        }));
    }
    if let Value::String(x) = a {
        return string_bitwise(xop, x, b);
    }
    let Value::Integer(x) = a else {
        return Err(type_err("bitwise", a));
    };
    match xop {
        Xop::AndB | Xop::OrB | Xop::XorB => {
            let Value::Integer(y) = b else {
                return Err(type_err("bitwise", b));
            };
            Ok(Value::Integer(match xop {
                Xop::AndB => x & y,
                Xop::OrB => x | y,
                Xop::XorB => x ^ y,
                _ => unreachable!(),
            }))
        }
        Xop::Sll | Xop::Srl | Xop::Sla | Xop::Sra => {
            let Value::Integer(n) = b else {
                return Err(RuntimeError::new(format!(
                    "shift count not valid (operand types were `{}` and `{}`)",
                    a.type_name(),
                    b.type_name()
                )));
            };
            if *n < 0 {
                return Err(RuntimeError::new(format!("negative shift count (value was `{n}`)")));
            }
            int_shift(xop, *x, *n)
        }
        _ => unreachable!(),
    }
}

/// Integer forms of `sll`/`srl`/`sla`/`sra` (§4.7/§8). `n` has already been
/// checked non-negative; shift counts of 64 or more are handled per-operator
/// rather than masked, since `1 << 64` must behave like "shifted clean off
/// the register", not like `1 << 0`.
fn int_shift(xop: Xop, x: i64, n: i64) -> Result<Value, RuntimeError> {
    let ux = x as u64;
    match xop {
        Xop::Sll => Ok(Value::Integer(if n >= 64 { 0 } else { (ux << n) as i64 })),
        Xop::Srl => Ok(Value::Integer(if n >= 64 { 0 } else { (ux >> n) as i64 })),
        Xop::Sra => Ok(Value::Integer(if n >= 64 { x >> 63 } else { x >> n })),
        Xop::Sla => {
            if n >= 64 {
                return Err(RuntimeError::new(format!("integer left shift overflow (`{x}` << `{n}`)")));
            }
            let bc = 63 - n;
            let out = (ux >> bc) << bc;
            let sgn = ((x >> 63) as u64) << bc;
            if out != sgn {
                return Err(RuntimeError::new(format!("integer left shift overflow (`{x}` << `{n}`)")));
            }
            Ok(Value::Integer((ux << n) as i64))
        }
        _ => unreachable!(),
    }
}

/// String forms of the bitwise/shift operators (§4.7): `andb`/`orb`/`xorb`
/// operate byte-wise against another string (missing bytes on the shorter
/// side are treated as zero for OR/XOR; AND truncates to the shorter
/// length), and the shift operators pad or truncate with ASCII spaces
/// while preserving the original byte length.
fn string_bitwise(xop: Xop, x: &[u8], b: &Value) -> Result<Value, RuntimeError> {
    match xop {
        Xop::AndB | Xop::OrB | Xop::XorB => {
            let Value::String(y) = b else {
                return Err(type_err("bitwise", b));
            };
            let n = x.len().min(y.len());
            let out = match xop {
                Xop::AndB => x[..n].iter().zip(&y[..n]).map(|(a, b)| a & b).collect::<Vec<u8>>(),
                Xop::OrB | Xop::XorB => {
                    let (longer, shorter) = if x.len() >= y.len() { (x, &y[..]) } else { (&y[..], x) };
                    longer
                        .iter()
                        .enumerate()
                        .map(|(i, byte)| {
                            let other = shorter.get(i).copied().unwrap_or(0);
                            if xop == Xop::OrB { byte | other } else { byte ^ other }
                        })
                        .collect::<Vec<u8>>()
                }
                _ => unreachable!(),
            };
            Ok(Value::String(Rc::from(out)))
        }
        Xop::Sll | Xop::Srl | Xop::Sla | Xop::Sra => {
            let Value::Integer(n) = b else {
                return Err(RuntimeError::new("shift count not valid for a string operand"));
            };
            if *n < 0 {
                return Err(RuntimeError::new(format!("negative shift count (value was `{n}`)")));
            }
            string_shift(xop, x, *n)
        }
        _ => unreachable!(),
    }
}

const SPACE: u8 = b' ';

fn string_shift(xop: Xop, x: &[u8], n: i64) -> Result<Value, RuntimeError> {
    let len = x.len();
    let out = match xop {
        Xop::Sll => {
            if n as usize >= len {
                vec![SPACE; len]
            } else {
                let n = n as usize;
                let mut out = Vec::with_capacity(len);
                out.extend_from_slice(&x[n..]);
                out.extend(std::iter::repeat(SPACE).take(n));
                out
            }
        }
        Xop::Srl => {
            if n as usize >= len {
                vec![SPACE; len]
            } else {
                let n = n as usize;
                let mut out = vec![SPACE; n];
                out.extend_from_slice(&x[..len - n]);
                out
            }
        }
        Xop::Sla => {
            let total = (len as i64).checked_add(n).ok_or_else(|| RuntimeError::new("string length overflow in left shift"))?;
            if total as u64 > isize::MAX as u64 {
                return Err(RuntimeError::new("string length overflow in left shift"));
            }
            let mut out = Vec::with_capacity(total as usize);
            out.extend_from_slice(x);
            out.extend(std::iter::repeat(SPACE).take(n as usize));
            out
        }
        Xop::Sra => {
            if n as usize >= len {
                Vec::new()
            } else {
                x[..len - n as usize].to_vec()
            }
        }
        _ => unreachable!(),
    };
    Ok(Value::String(Rc::from(out)))
}

fn numeric_unary(
    assign: bool,
    r: &Reference,
    stack: &mut Vec<Reference>,
    on_int: impl FnOnce(i64) -> Result<Value, RuntimeError>,
    on_real: impl FnOnce(f64) -> Result<Value, RuntimeError>,
) -> Result<(), RuntimeError> {
    let v = r.read()?;
    let result = match v {
        Value::Integer(i) => on_int(i)?,
        Value::Real(f) => on_real(f)?,
        other => return Err(type_err("arithmetic", &other)),
    };
    write_or_push(assign, r, result, stack)
}

fn int_unary(assign: bool, r: &Reference, stack: &mut Vec<Reference>, f: impl FnOnce(i64) -> Result<i64, RuntimeError>) -> Result<(), RuntimeError> {
    let v = r.read()?;
    let Value::Integer(i) = v else {
        return Err(type_err("bitwise", &v));
    };
    write_or_push(assign, r, Value::Integer(f(i)?), stack)
}

fn real_unary(assign: bool, r: &Reference, stack: &mut Vec<Reference>, f: impl FnOnce(f64) -> f64) -> Result<(), RuntimeError> {
    let v = r.read()?;
    let x = as_f64(&v).ok_or_else(|| type_err("math", &v))?;
    write_or_push(assign, r, Value::Real(f(x)), stack)
}

fn real_to_int_unary(assign: bool, r: &Reference, stack: &mut Vec<Reference>, f: impl FnOnce(f64) -> f64) -> Result<(), RuntimeError> {
    let v = r.read()?;
    let x = as_f64(&v).ok_or_else(|| type_err("math", &v))?;
    let rounded = f(x);
    if !rounded.is_finite() || rounded > i64::MAX as f64 || rounded < i64::MIN as f64 {
        return Err(RuntimeError::new("real-to-integer conversion out of range"));
    }
    write_or_push(assign, r, Value::Integer(rounded as i64), stack)
}

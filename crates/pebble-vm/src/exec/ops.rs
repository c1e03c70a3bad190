//! Arithmetic, comparison, and unary operators (spec §4.6 "Operational
//! semantics highlights", §8 boundary behaviors).

use pebble_heap::value::Value;
use pebble_heap::{Heap, LiteralTable};

/// A value coerced to its `f32` numeric form for mixed Int/Float math, or
/// `None` if it isn't numeric at all.
fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f as f64),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn is_int(v: &Value) -> bool {
    matches!(v, Value::Integer(_))
}

pub fn stringify(v: &Value, heap: &Heap, literals: &LiteralTable) -> String {
    match v {
        Value::None => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::StringLiteral(lit) => literals.get(*lit).unwrap_or("").to_string(),
        Value::String(h) => heap.string(*h).unwrap_or("").to_string(),
        Value::Id(_) => "undefined".to_string(),
        Value::Object(h) => match heap.object(*h) {
            Some(obj) if obj.as_mater().map_or(false, |m| m.is_array()) => {
                let m = obj.as_mater().unwrap();
                m.elements
                    .as_ref()
                    .unwrap()
                    .iter()
                    .map(|e| stringify(e, heap, literals))
                    .collect::<Vec<_>>()
                    .join(",")
            }
            _ => "[object Object]".to_string(),
        },
        Value::NativeObject(o) => o.type_name().to_string(),
        Value::NativeFunction(_) | Value::StaticObject(_) => "[native code]".to_string(),
    }
}

/// `ADD` (spec: Int+Int -> Int; Number+Number -> Float; otherwise string
/// concatenation of both operands' string forms, e.g. `"5" + 3 == "53"`).
pub fn add(a: &Value, b: &Value, heap: &mut Heap, literals: &mut LiteralTable) -> Value {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Value::Integer(x.wrapping_add(*y)),
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => Value::Float((x + y) as f32),
            _ => {
                let s = format!(
                    "{}{}",
                    stringify(a, heap, literals),
                    stringify(b, heap, literals)
                );
                let lit = literals.add(&s);
                Value::StringLiteral(lit)
            }
        },
    }
}

enum ArithOp {
    Sub,
    Mul,
    Div,
    Mod,
}

fn arith(op: ArithOp, a: &Value, b: &Value) -> Value {
    if is_int(a) && is_int(b) {
        let (Value::Integer(x), Value::Integer(y)) = (a, b) else { unreachable!() };
        return match op {
            ArithOp::Sub => Value::Integer(x.wrapping_sub(*y)),
            ArithOp::Mul => Value::Integer(x.wrapping_mul(*y)),
            ArithOp::Div => {
                if *y == 0 {
                    Value::Integer(0)
                } else {
                    Value::Integer(x.wrapping_div(*y))
                }
            }
            ArithOp::Mod => {
                if *y == 0 {
                    Value::Integer(0)
                } else {
                    Value::Integer(x.wrapping_rem(*y))
                }
            }
        };
    }
    let x = as_number(a).unwrap_or(0.0);
    let y = as_number(b).unwrap_or(0.0);
    let r = match op {
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => x / y,
        // `a - b*floor(a/b)`, matching the source's float-mod definition.
        ArithOp::Mod => x - y * (x / y).floor(),
    };
    Value::Float(r as f32)
}

pub fn sub(a: &Value, b: &Value) -> Value {
    arith(ArithOp::Sub, a, b)
}
pub fn mul(a: &Value, b: &Value) -> Value {
    arith(ArithOp::Mul, a, b)
}
pub fn div(a: &Value, b: &Value) -> Value {
    arith(ArithOp::Div, a, b)
}
pub fn modulo(a: &Value, b: &Value) -> Value {
    arith(ArithOp::Mod, a, b)
}

fn as_i32_bits(v: &Value) -> i32 {
    match v {
        Value::Integer(i) => *i,
        Value::Float(f) => *f as i32,
        Value::Bool(b) => *b as i32,
        _ => 0,
    }
}

pub fn bitor(a: &Value, b: &Value) -> Value {
    Value::Integer(as_i32_bits(a) | as_i32_bits(b))
}
pub fn bitand(a: &Value, b: &Value) -> Value {
    Value::Integer(as_i32_bits(a) & as_i32_bits(b))
}
pub fn bitxor(a: &Value, b: &Value) -> Value {
    Value::Integer(as_i32_bits(a) ^ as_i32_bits(b))
}
pub fn shl(a: &Value, b: &Value) -> Value {
    Value::Integer(as_i32_bits(a).wrapping_shl(as_i32_bits(b) as u32 & 31))
}
pub fn shr(a: &Value, b: &Value) -> Value {
    Value::Integer(((as_i32_bits(a) as u32) >> (as_i32_bits(b) as u32 & 31)) as i32)
}
pub fn sar(a: &Value, b: &Value) -> Value {
    Value::Integer(as_i32_bits(a).wrapping_shr(as_i32_bits(b) as u32 & 31))
}

pub fn lor(a: &Value, b: &Value) -> Value {
    Value::Bool(a.is_truthy() || b.is_truthy())
}
pub fn land(a: &Value, b: &Value) -> Value {
    Value::Bool(a.is_truthy() && b.is_truthy())
}

pub fn string_form<'a>(v: &'a Value, heap: &'a Heap, literals: &'a LiteralTable) -> Option<std::borrow::Cow<'a, str>> {
    match v {
        Value::StringLiteral(lit) => literals.get(*lit).map(std::borrow::Cow::Borrowed),
        Value::String(h) => heap.string(*h).map(std::borrow::Cow::Borrowed),
        _ => None,
    }
}

/// Total ordering used by `EQ/NE/LT/LE/GT/GE` (spec: "compare Null to Null
/// as equal, Int,Int by subtraction, equal string literals by identity
/// first, then strings by strcmp, then numbers by ordered float compare").
pub fn compare(a: &Value, b: &Value, heap: &Heap, literals: &LiteralTable) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::StringLiteral(x), Value::StringLiteral(y)) if x == y => Ordering::Equal,
        _ => {
            if let (Some(sa), Some(sb)) = (string_form(a, heap, literals), string_form(b, heap, literals)) {
                return sa.as_ref().cmp(sb.as_ref());
            }
            let na = as_number(a).unwrap_or(f64::NAN);
            let nb = as_number(b).unwrap_or(f64::NAN);
            na.partial_cmp(&nb).unwrap_or(Ordering::Equal)
        }
    }
}

pub fn values_equal(a: &Value, b: &Value, heap: &Heap, literals: &LiteralTable) -> bool {
    match (a, b) {
        (Value::None, Value::None) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        _ => compare(a, b, heap, literals) == std::cmp::Ordering::Equal,
    }
}

pub fn negate(v: &Value) -> Value {
    match v {
        Value::Integer(i) => Value::Integer(i.wrapping_neg()),
        _ => Value::Float(-as_number(v).unwrap_or(0.0) as f32),
    }
}

pub fn bitnot(v: &Value) -> Value {
    Value::Integer(!as_i32_bits(v))
}

pub fn not(v: &Value) -> Value {
    Value::Bool(!v.is_truthy())
}

/// `PREINC`/`PREDEC`/`POSTINC`/`POSTDEC` share this: compute the
/// incremented/decremented value. Whether the dst register gets the new or
/// old value is the caller's job (spec §4.6: the opcode also mutates the
/// source register in place, which is what makes these work through
/// property/element/upvalue l-values, not just plain locals).
pub fn increment(v: &Value) -> Value {
    match v {
        Value::Integer(i) => Value::Integer(i.wrapping_add(1)),
        _ => Value::Float(as_number(v).unwrap_or(0.0) as f32 + 1.0),
    }
}

pub fn decrement(v: &Value) -> Value {
    match v {
        Value::Integer(i) => Value::Integer(i.wrapping_sub(1)),
        _ => Value::Float(as_number(v).unwrap_or(0.0) as f32 - 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_add_wraps() {
        let r = add(&Value::Integer(i32::MAX), &Value::Integer(1), &mut Heap::new(4096), &mut LiteralTable::new());
        assert!(matches!(r, Value::Integer(i32::MIN)));
    }

    #[test]
    fn string_plus_int_concatenates() {
        let mut heap = Heap::new(4096);
        let mut literals = LiteralTable::new();
        let lit = literals.add("5");
        let r = add(&Value::StringLiteral(lit), &Value::Integer(3), &mut heap, &mut literals);
        match r {
            Value::StringLiteral(l) => assert_eq!(literals.get(l), Some("53")),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn float_add_promotes() {
        let r = add(&Value::Float(5.0), &Value::Integer(3), &mut Heap::new(4096), &mut LiteralTable::new());
        assert!(matches!(r, Value::Float(f) if f == 8.0));
    }

    #[test]
    fn mod_uses_floor_division_rule() {
        let r = modulo(&Value::Float(5.5), &Value::Float(2.0));
        assert!(matches!(r, Value::Float(f) if (f - 1.5).abs() < 1e-6));
    }
}

// dynlisp Operator Generic Functions
//
// Arithmetic, comparison and bit operators dispatch on the runtime types of
// both operands through a two-level table (first type, then second type).
// The selected method is cached per concrete type pair; adding a method
// clears the cache of that operator.

use crate::error::{DispatchError, Error, EvalResult, RuntimeError};
use crate::eval::Interpreter;
use crate::fastmap::HashMap;
use crate::types::{OperatorId, Value};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::cmp::Ordering;
use std::sync::Arc;

/// Operand type lattice. `Object` is the top; `Integer` and `Float` are
/// both `Number`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Object,
    Number,
    Integer,
    Float,
    String,
    Symbol,
    Boolean,
    Null,
    Cons,
    Vector,
    Function,
    Class,
    Instance,
    Native,
}

impl TypeTag {
    pub fn of(value: &Value) -> TypeTag {
        match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Int(_) | Value::BigInt(_) => TypeTag::Integer,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::String,
            Value::Symbol(_) => TypeTag::Symbol,
            Value::Cons(_) => TypeTag::Cons,
            Value::Vector(_) => TypeTag::Vector,
            Value::Closure(_)
            | Value::Macro(_)
            | Value::Primitive(_)
            | Value::Operator(_)
            | Value::NextMethod(_) => TypeTag::Function,
            Value::Class(_) => TypeTag::Class,
            Value::Instance(_) => TypeTag::Instance,
            Value::Native(_) => TypeTag::Native,
        }
    }

    pub fn parent(self) -> Option<TypeTag> {
        match self {
            TypeTag::Object => None,
            TypeTag::Integer | TypeTag::Float => Some(TypeTag::Number),
            _ => Some(TypeTag::Object),
        }
    }

    /// True when every value of `other` is also a `self`
    pub fn is_assignable_from(self, other: TypeTag) -> bool {
        let mut current = Some(other);
        while let Some(tag) = current {
            if tag == self {
                return true;
            }
            current = tag.parent();
        }
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Object => "object",
            TypeTag::Number => "number",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Symbol => "symbol",
            TypeTag::Boolean => "boolean",
            TypeTag::Null => "null",
            TypeTag::Cons => "cons",
            TypeTag::Vector => "vector",
            TypeTag::Function => "function",
            TypeTag::Class => "class",
            TypeTag::Instance => "instance",
            TypeTag::Native => "native",
        }
    }

    pub fn from_name(name: &str) -> Option<TypeTag> {
        const ALL: [TypeTag; 14] = [
            TypeTag::Object,
            TypeTag::Number,
            TypeTag::Integer,
            TypeTag::Float,
            TypeTag::String,
            TypeTag::Symbol,
            TypeTag::Boolean,
            TypeTag::Null,
            TypeTag::Cons,
            TypeTag::Vector,
            TypeTag::Function,
            TypeTag::Class,
            TypeTag::Instance,
            TypeTag::Native,
        ];
        ALL.into_iter().find(|t| t.name() == name)
    }
}

pub type NativeOperatorFn = fn(&Value, &Value) -> EvalResult<Value>;

#[derive(Debug, Clone)]
pub enum OperatorMethod {
    Native(NativeOperatorFn),
    /// A two-argument Lisp function
    Lisp(Value),
}

/// How an operator treats argument counts other than two
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Left fold. `empty` is the result for no arguments; a single argument
    /// is combined with `unary` when given, else returned as is.
    Fold {
        empty: Option<i64>,
        unary: Option<i64>,
    },
    /// Pairwise comparison of neighbours, true when all hold
    Chain,
    Binary,
}

#[derive(Debug)]
pub struct GenericOperator {
    pub name: Arc<str>,
    pub shape: Shape,
    table: Vec<(TypeTag, Vec<(TypeTag, OperatorMethod)>)>,
    cache: HashMap<(TypeTag, TypeTag), Option<(usize, usize)>>,
    /// Method table scans, i.e. cache misses
    pub scans: u64,
}

impl GenericOperator {
    fn new(name: &str, shape: Shape) -> Self {
        Self {
            name: Arc::from(name),
            shape,
            table: Vec::new(),
            cache: HashMap::default(),
            scans: 0,
        }
    }

    pub fn add_method(&mut self, first: TypeTag, second: TypeTag, method: OperatorMethod) {
        let row = match self.table.iter().position(|(t, _)| *t == first) {
            Some(i) => i,
            None => {
                self.table.push((first, Vec::new()));
                self.table.len() - 1
            }
        };
        let methods = &mut self.table[row].1;
        match methods.iter_mut().find(|(t, _)| *t == second) {
            Some(entry) => entry.1 = method,
            None => methods.push((second, method)),
        }
        self.cache.clear();
    }

    /// Most specific applicable method, leftmost argument first
    pub fn select(&mut self, a: TypeTag, b: TypeTag) -> Option<OperatorMethod> {
        let found = match self.cache.get(&(a, b)) {
            Some(hit) => *hit,
            None => {
                self.scans += 1;
                log::trace!("operator {} scanning for ({}, {})", self.name, a.name(), b.name());
                let best = self.scan(a, b);
                self.cache.insert((a, b), best);
                best
            }
        };
        found.map(|(row, col)| self.table[row].1[col].1.clone())
    }

    fn scan(&self, a: TypeTag, b: TypeTag) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize, TypeTag, TypeTag)> = None;
        for (row, (first, methods)) in self.table.iter().enumerate() {
            if !first.is_assignable_from(a) {
                continue;
            }
            for (col, (second, _)) in methods.iter().enumerate() {
                if !second.is_assignable_from(b) {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((_, _, bf, bs)) => more_specific((*first, *second), (bf, bs)),
                };
                if better {
                    best = Some((row, col, *first, *second));
                }
            }
        }
        best.map(|(row, col, _, _)| (row, col))
    }

    pub fn method_count(&self) -> usize {
        self.table.iter().map(|(_, m)| m.len()).sum()
    }
}

/// Strict subtype on the first position decides; ties fall to the second.
fn more_specific(candidate: (TypeTag, TypeTag), best: (TypeTag, TypeTag)) -> bool {
    if candidate.0 != best.0 {
        return best.0.is_assignable_from(candidate.0);
    }
    candidate.1 != best.1 && best.1.is_assignable_from(candidate.1)
}

/// All operator generic functions of an interpreter
#[derive(Debug, Default)]
pub struct OperatorTable {
    operators: Vec<GenericOperator>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, shape: Shape) -> OperatorId {
        self.operators.push(GenericOperator::new(name, shape));
        OperatorId(self.operators.len() as u32 - 1)
    }

    pub fn get(&self, id: OperatorId) -> Option<&GenericOperator> {
        self.operators.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: OperatorId) -> Option<&mut GenericOperator> {
        self.operators.get_mut(id.0 as usize)
    }

    pub fn name(&self, id: OperatorId) -> Option<&str> {
        self.get(id).map(|op| &*op.name)
    }

    pub fn find(&self, name: &str) -> Option<OperatorId> {
        self.operators
            .iter()
            .position(|op| &*op.name == name)
            .map(|i| OperatorId(i as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = (OperatorId, &GenericOperator)> {
        self.operators
            .iter()
            .enumerate()
            .map(|(i, op)| (OperatorId(i as u32), op))
    }

    /// The builtin operators and their native methods
    pub fn with_builtins() -> Self {
        use TypeTag::*;
        let mut table = Self::new();

        let fold = |empty, unary| Shape::Fold { empty, unary };
        let add = table.define("+", fold(Some(0), None));
        let sub = table.define("-", fold(None, Some(0)));
        let mul = table.define("*", fold(Some(1), None));
        let div = table.define("/", fold(None, Some(1)));
        let modulo = table.define("mod", Shape::Binary);
        for (id, int_fn, num_fn) in [
            (add, int_add as NativeOperatorFn, num_add as NativeOperatorFn),
            (sub, int_sub, num_sub),
            (mul, int_mul, num_mul),
            (div, int_div, num_div),
            (modulo, int_mod, num_mod),
        ] {
            if let Some(op) = table.get_mut(id) {
                op.add_method(Integer, Integer, OperatorMethod::Native(int_fn));
                op.add_method(Number, Number, OperatorMethod::Native(num_fn));
            }
        }
        if let Some(op) = table.get_mut(add) {
            op.add_method(String, String, OperatorMethod::Native(str_concat));
        }

        for (name, test) in [
            ("<", Ordering::is_lt as fn(Ordering) -> bool),
            (">", Ordering::is_gt),
            ("<=", Ordering::is_le),
            (">=", Ordering::is_ge),
        ] {
            let id = table.define(name, Shape::Chain);
            if let Some(op) = table.get_mut(id) {
                op.add_method(Number, Number, OperatorMethod::Native(numeric_compare(test)));
                op.add_method(String, String, OperatorMethod::Native(string_compare(test)));
            }
        }
        let eq = table.define("=", Shape::Chain);
        if let Some(op) = table.get_mut(eq) {
            op.add_method(Number, Number, OperatorMethod::Native(num_eq));
            op.add_method(Object, Object, OperatorMethod::Native(structural_eq));
        }

        for (name, func) in [
            ("bit-and", bit_and as NativeOperatorFn),
            ("bit-or", bit_or),
            ("bit-xor", bit_xor),
        ] {
            let id = table.define(name, fold(None, None));
            if let Some(op) = table.get_mut(id) {
                op.add_method(Integer, Integer, OperatorMethod::Native(func));
            }
        }
        for (name, func) in [("shl", shl as NativeOperatorFn), ("shr", shr)] {
            let id = table.define(name, Shape::Binary);
            if let Some(op) = table.get_mut(id) {
                op.add_method(Integer, Integer, OperatorMethod::Native(func));
            }
        }

        table
    }
}

impl Interpreter {
    /// Apply an operator to any number of arguments according to its shape
    pub fn apply_operator(&mut self, id: OperatorId, args: &[Value]) -> EvalResult<Value> {
        let (name, shape) = match self.operators.get(id) {
            Some(op) => (op.name.clone(), op.shape),
            None => return Err(RuntimeError::NotCallable(format!("operator {}", id.0)).into()),
        };
        let arity_error = |expected: &str| -> Error {
            RuntimeError::Arity {
                callable: name.to_string(),
                expected: expected.to_string(),
                found: args.len(),
            }
            .into()
        };
        match shape {
            Shape::Binary => match args {
                [a, b] => self.dispatch_operator(id, a, b),
                _ => Err(arity_error("2")),
            },
            Shape::Chain => {
                if args.is_empty() {
                    return Err(arity_error("at least 1"));
                }
                for pair in args.windows(2) {
                    if !self.dispatch_operator(id, &pair[0], &pair[1])?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Shape::Fold { empty, unary } => match args {
                [] => empty.map(Value::Int).ok_or_else(|| arity_error("at least 1")),
                [single] => match unary {
                    Some(identity) => self.dispatch_operator(id, &Value::Int(identity), single),
                    None => Ok(single.clone()),
                },
                [first, rest @ ..] => {
                    let mut acc = first.clone();
                    for arg in rest {
                        acc = self.dispatch_operator(id, &acc, arg)?;
                    }
                    Ok(acc)
                }
            },
        }
    }

    /// Binary dispatch on the runtime types of `a` and `b`
    pub fn dispatch_operator(&mut self, id: OperatorId, a: &Value, b: &Value) -> EvalResult<Value> {
        let (ta, tb) = (TypeTag::of(a), TypeTag::of(b));
        let Some(op) = self.operators.get_mut(id) else {
            return Err(RuntimeError::NotCallable(format!("operator {}", id.0)).into());
        };
        let scans = op.scans;
        let method = op.select(ta, tb);
        if op.scans == scans {
            self.counters.operator_cache_hits += 1;
        } else {
            self.counters.operator_scans += 1;
        }
        match method {
            Some(OperatorMethod::Native(func)) => func(a, b),
            Some(OperatorMethod::Lisp(func)) => self.apply_value(&func, &[a.clone(), b.clone()]),
            None => {
                let operator = self
                    .operators
                    .name(id)
                    .unwrap_or("?")
                    .to_string();
                Err(DispatchError::NoApplicableMethod {
                    operator,
                    args: self.print_args(&[a.clone(), b.clone()]),
                }
                .into())
            }
        }
    }
}

enum Num {
    Int(i64),
    Big(BigInt),
    Float(f64),
}

fn num(value: &Value) -> EvalResult<Num> {
    match value {
        Value::Int(n) => Ok(Num::Int(*n)),
        Value::BigInt(n) => Ok(Num::Big((**n).clone())),
        Value::Float(f) => Ok(Num::Float(*f)),
        other => Err(Error::type_error("number", other)),
    }
}

fn big(n: Num) -> BigInt {
    match n {
        Num::Int(i) => BigInt::from(i),
        Num::Big(b) => b,
        Num::Float(f) => BigInt::from(f as i64),
    }
}

fn float(n: &Num) -> f64 {
    match n {
        Num::Int(i) => *i as f64,
        Num::Big(b) => b.to_f64().unwrap_or(f64::NAN),
        Num::Float(f) => *f,
    }
}

/// Integer arithmetic on fixnums, promoting to bignums on overflow
fn int_arith(
    a: &Value,
    b: &Value,
    small: fn(i64, i64) -> Option<i64>,
    large: fn(BigInt, BigInt) -> BigInt,
) -> EvalResult<Value> {
    match (num(a)?, num(b)?) {
        (Num::Int(x), Num::Int(y)) => Ok(match small(x, y) {
            Some(n) => Value::Int(n),
            None => Value::from(large(BigInt::from(x), BigInt::from(y))),
        }),
        (x, y) => Ok(Value::from(large(big(x), big(y)))),
    }
}

fn int_add(a: &Value, b: &Value) -> EvalResult<Value> {
    int_arith(a, b, i64::checked_add, |x, y| x + y)
}

fn int_sub(a: &Value, b: &Value) -> EvalResult<Value> {
    int_arith(a, b, i64::checked_sub, |x, y| x - y)
}

fn int_mul(a: &Value, b: &Value) -> EvalResult<Value> {
    int_arith(a, b, i64::checked_mul, |x, y| x * y)
}

/// Exact quotients stay integers; others become floats
fn int_div(a: &Value, b: &Value) -> EvalResult<Value> {
    let (x, y) = (big(num(a)?), big(num(b)?));
    if y.is_zero() {
        return Err(RuntimeError::DivisionByZero.into());
    }
    if (&x % &y).is_zero() {
        Ok(Value::from(x / y))
    } else {
        Ok(Value::Float(
            x.to_f64().unwrap_or(f64::NAN) / y.to_f64().unwrap_or(f64::NAN),
        ))
    }
}

/// Result takes the sign of the divisor
fn int_mod(a: &Value, b: &Value) -> EvalResult<Value> {
    let (x, y) = (big(num(a)?), big(num(b)?));
    if y.is_zero() {
        return Err(RuntimeError::DivisionByZero.into());
    }
    let r = ((&x % &y) + &y) % &y;
    Ok(Value::from(r))
}

fn float_arith(a: &Value, b: &Value, op: fn(f64, f64) -> f64) -> EvalResult<Value> {
    Ok(Value::Float(op(float(&num(a)?), float(&num(b)?))))
}

fn num_add(a: &Value, b: &Value) -> EvalResult<Value> {
    float_arith(a, b, |x, y| x + y)
}

fn num_sub(a: &Value, b: &Value) -> EvalResult<Value> {
    float_arith(a, b, |x, y| x - y)
}

fn num_mul(a: &Value, b: &Value) -> EvalResult<Value> {
    float_arith(a, b, |x, y| x * y)
}

fn num_div(a: &Value, b: &Value) -> EvalResult<Value> {
    float_arith(a, b, |x, y| x / y)
}

fn num_mod(a: &Value, b: &Value) -> EvalResult<Value> {
    let y = float(&num(b)?);
    if y == 0.0 {
        return Err(RuntimeError::DivisionByZero.into());
    }
    let x = float(&num(a)?);
    Ok(Value::Float(((x % y) + y) % y))
}

fn str_concat(a: &Value, b: &Value) -> EvalResult<Value> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::string(&format!("{x}{y}"))),
        _ => Err(Error::type_error("string", if matches!(a, Value::Str(_)) { b } else { a })),
    }
}

/// `None` when either side is NaN
fn compare_numbers(a: &Value, b: &Value) -> EvalResult<Option<Ordering>> {
    match (num(a)?, num(b)?) {
        (Num::Int(x), Num::Int(y)) => Ok(Some(x.cmp(&y))),
        (x @ Num::Float(_), y) | (x, y @ Num::Float(_)) => Ok(float(&x).partial_cmp(&float(&y))),
        (x, y) => Ok(Some(big(x).cmp(&big(y)))),
    }
}

// Comparison methods are plain fn pointers, so each test gets its own item.
fn numeric_compare(test: fn(Ordering) -> bool) -> NativeOperatorFn {
    if test(Ordering::Less) && !test(Ordering::Equal) {
        |a, b| Ok(Value::Bool(compare_numbers(a, b)?.is_some_and(Ordering::is_lt)))
    } else if test(Ordering::Greater) && !test(Ordering::Equal) {
        |a, b| Ok(Value::Bool(compare_numbers(a, b)?.is_some_and(Ordering::is_gt)))
    } else if test(Ordering::Less) {
        |a, b| Ok(Value::Bool(compare_numbers(a, b)?.is_some_and(Ordering::is_le)))
    } else {
        |a, b| Ok(Value::Bool(compare_numbers(a, b)?.is_some_and(Ordering::is_ge)))
    }
}

fn compare_strings(a: &Value, b: &Value) -> EvalResult<Ordering> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Str(_), other) | (other, _) => Err(Error::type_error("string", other)),
    }
}

fn string_compare(test: fn(Ordering) -> bool) -> NativeOperatorFn {
    if test(Ordering::Less) && !test(Ordering::Equal) {
        |a, b| Ok(Value::Bool(compare_strings(a, b)?.is_lt()))
    } else if test(Ordering::Greater) && !test(Ordering::Equal) {
        |a, b| Ok(Value::Bool(compare_strings(a, b)?.is_gt()))
    } else if test(Ordering::Less) {
        |a, b| Ok(Value::Bool(compare_strings(a, b)?.is_le()))
    } else {
        |a, b| Ok(Value::Bool(compare_strings(a, b)?.is_ge()))
    }
}

fn num_eq(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(compare_numbers(a, b)? == Some(Ordering::Equal)))
}

fn structural_eq(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(a.structurally_equal(b)))
}

fn bit_and(a: &Value, b: &Value) -> EvalResult<Value> {
    match (num(a)?, num(b)?) {
        (Num::Int(x), Num::Int(y)) => Ok(Value::Int(x & y)),
        (x, y) => Ok(Value::from(big(x) & big(y))),
    }
}

fn bit_or(a: &Value, b: &Value) -> EvalResult<Value> {
    match (num(a)?, num(b)?) {
        (Num::Int(x), Num::Int(y)) => Ok(Value::Int(x | y)),
        (x, y) => Ok(Value::from(big(x) | big(y))),
    }
}

fn bit_xor(a: &Value, b: &Value) -> EvalResult<Value> {
    match (num(a)?, num(b)?) {
        (Num::Int(x), Num::Int(y)) => Ok(Value::Int(x ^ y)),
        (x, y) => Ok(Value::from(big(x) ^ big(y))),
    }
}

/// Largest shift accepted by `shl` and `shr`
const MAX_SHIFT: usize = 1 << 20;

fn shift_amount(value: &Value) -> EvalResult<usize> {
    match value {
        Value::Int(n) if *n >= 0 && *n as u64 <= MAX_SHIFT as u64 => Ok(*n as usize),
        Value::Int(n) if *n >= 0 => Err(RuntimeError::ShiftTooLarge {
            amount: *n,
            limit: MAX_SHIFT,
        }
        .into()),
        other => Err(Error::type_error("non-negative shift amount", other)),
    }
}

fn shl(a: &Value, b: &Value) -> EvalResult<Value> {
    let amount = shift_amount(b)?;
    Ok(Value::from(big(num(a)?) << amount))
}

fn shr(a: &Value, b: &Value) -> EvalResult<Value> {
    let amount = shift_amount(b)?;
    Ok(Value::from(big(num(a)?) >> amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(_: &Value, _: &Value) -> EvalResult<Value> {
        Ok(Value::Null)
    }

    #[test]
    fn test_type_lattice() {
        assert!(TypeTag::Number.is_assignable_from(TypeTag::Integer));
        assert!(TypeTag::Object.is_assignable_from(TypeTag::Float));
        assert!(!TypeTag::Integer.is_assignable_from(TypeTag::Number));
        assert!(!TypeTag::String.is_assignable_from(TypeTag::Integer));
        assert_eq!(TypeTag::from_name("cons"), Some(TypeTag::Cons));
    }

    #[test]
    fn test_most_specific_pair_selected_and_cached() {
        let mut op = GenericOperator::new("combine", Shape::Binary);
        op.add_method(TypeTag::Object, TypeTag::Object, OperatorMethod::Lisp(Value::Int(3)));
        op.add_method(TypeTag::Integer, TypeTag::Object, OperatorMethod::Lisp(Value::Int(2)));
        op.add_method(TypeTag::Integer, TypeTag::Integer, OperatorMethod::Lisp(Value::Int(1)));

        let pick = |op: &mut GenericOperator, a, b| match op.select(a, b) {
            Some(OperatorMethod::Lisp(Value::Int(n))) => n,
            other => panic!("unexpected selection {other:?}"),
        };
        assert_eq!(pick(&mut op, TypeTag::Integer, TypeTag::Integer), 1);
        assert_eq!(pick(&mut op, TypeTag::Integer, TypeTag::String), 2);
        assert_eq!(pick(&mut op, TypeTag::Instance, TypeTag::Instance), 3);
        assert_eq!(op.scans, 3);

        assert_eq!(pick(&mut op, TypeTag::Integer, TypeTag::Integer), 1);
        assert_eq!(op.scans, 3);

        op.add_method(TypeTag::Integer, TypeTag::Number, OperatorMethod::Native(marker));
        assert!(matches!(
            op.select(TypeTag::Integer, TypeTag::Float),
            Some(OperatorMethod::Native(_))
        ));
        assert_eq!(op.scans, 4);
    }

    #[test]
    fn test_no_applicable_method() {
        let mut op = GenericOperator::new("only-ints", Shape::Binary);
        op.add_method(TypeTag::Integer, TypeTag::Integer, OperatorMethod::Native(marker));
        assert!(op.select(TypeTag::String, TypeTag::Integer).is_none());
        assert!(op.select(TypeTag::String, TypeTag::Integer).is_none());
        assert_eq!(op.scans, 1);
    }

    #[test]
    fn test_integer_arithmetic_promotes() {
        let sum = int_add(&Value::Int(i64::MAX), &Value::Int(1)).unwrap();
        assert!(matches!(sum, Value::BigInt(_)));
        let back = int_sub(&sum, &Value::Int(1)).unwrap();
        assert!(matches!(back, Value::Int(i64::MAX)));
        assert!(matches!(int_div(&Value::Int(6), &Value::Int(3)).unwrap(), Value::Int(2)));
        assert!(matches!(int_div(&Value::Int(1), &Value::Int(2)).unwrap(), Value::Float(f) if f == 0.5));
        assert!(int_div(&Value::Int(1), &Value::Int(0)).is_err());
        assert!(matches!(int_mod(&Value::Int(-7), &Value::Int(3)).unwrap(), Value::Int(2)));
        assert!(matches!(shl(&Value::Int(1), &Value::Int(70)).unwrap(), Value::BigInt(_)));
        assert!(matches!(shr(&Value::Int(-8), &Value::Int(1)).unwrap(), Value::Int(-4)));
    }

    #[test]
    fn test_mixed_comparison() {
        assert_eq!(
            compare_numbers(&Value::Int(1), &Value::Float(1.5)).unwrap(),
            Some(Ordering::Less)
        );
        let lt = numeric_compare(Ordering::is_lt);
        assert!(lt(&Value::Int(1), &Value::Int(2)).unwrap().is_truthy());
        let ge = numeric_compare(Ordering::is_ge);
        assert!(ge(&Value::Int(2), &Value::Int(2)).unwrap().is_truthy());
    }

    #[test]
    fn test_nan_compares_false() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(compare_numbers(&nan, &Value::Int(1)).unwrap(), None);
        for test in [Ordering::is_lt, Ordering::is_gt, Ordering::is_le, Ordering::is_ge] {
            let cmp = numeric_compare(test);
            assert!(!cmp(&nan, &Value::Int(1)).unwrap().is_truthy());
            assert!(!cmp(&Value::Float(1.0), &nan).unwrap().is_truthy());
            assert!(!cmp(&nan, &nan).unwrap().is_truthy());
        }
        assert!(!num_eq(&nan, &nan).unwrap().is_truthy());
    }

    #[test]
    fn test_shift_amount_is_capped() {
        let limit = Value::Int(MAX_SHIFT as i64);
        assert!(matches!(shr(&Value::Int(1), &limit).unwrap(), Value::Int(0)));
        let err = shl(&Value::Int(1), &Value::Int(1 << 40)).unwrap_err();
        assert!(matches!(
            err.root(),
            Error::Runtime(RuntimeError::ShiftTooLarge { amount, limit }) if *amount == 1 << 40 && *limit == MAX_SHIFT
        ));
        assert!(shr(&Value::Int(1), &Value::Int(MAX_SHIFT as i64 + 1)).is_err());
        assert!(shl(&Value::Int(1), &Value::Int(-1)).is_err());
    }
}

// dynlisp value representation
//
// Immediate data is stored inline; heap data is reference counted. Frames and
// classes are not values of their own: they live in interpreter arenas and
// values refer to them by index.

use crate::behavior::NextMethod;
use crate::clos::Instance;
use crate::eval::Closure;
use crate::interop::NativeObject;
use crate::primitives::Primitive;
use crate::stack::ensure_sufficient_stack;
use num_bigint::BigInt;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub use crate::symbol::{PackageId, SymbolId};

/// Index of a lexical frame in the environment arena
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EnvId(pub u32);

/// Index of a class in the class arena
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ClassId(pub u32);

/// Index of a primitive operator generic function
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct OperatorId(pub u32);

/// A cons cell. Lists are immutable once built.
#[derive(Debug)]
pub struct Cons {
    pub car: Value,
    pub cdr: Value,
}

impl Drop for Cons {
    // Unlink the cdr spine iteratively; the default drop glue recurses once
    // per cell.
    fn drop(&mut self) {
        let mut next = std::mem::take(&mut self.cdr);
        while let Value::Cons(cell) = next {
            match Rc::try_unwrap(cell) {
                Ok(mut cell) => next = std::mem::take(&mut cell.cdr),
                Err(_) => break,
            }
        }
    }
}

#[derive(Clone)]
pub enum Value {
    /// The empty list and the null literal
    Null,
    Bool(bool),
    Int(i64),
    BigInt(Rc<BigInt>),
    Float(f64),
    Str(Rc<str>),
    Symbol(SymbolId),
    Cons(Rc<Cons>),
    Vector(Rc<RefCell<Vec<Value>>>),
    Closure(Rc<Closure>),
    Macro(Rc<Closure>),
    Primitive(Rc<Primitive>),
    Operator(OperatorId),
    /// Continuation handed to a behavior method for `call-next-method`
    NextMethod(Rc<NextMethod>),
    Class(ClassId),
    Instance(Rc<RefCell<Instance>>),
    Native(NativeObject),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `null` and `false` are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn string(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn cons(car: Value, cdr: Value) -> Self {
        Value::Cons(Rc::new(Cons { car, cdr }))
    }

    /// Build a proper list
    pub fn list(items: Vec<Value>) -> Self {
        Self::list_with_tail(items, Value::Null)
    }

    pub fn list_with_tail(items: Vec<Value>, tail: Value) -> Self {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    pub fn vector(items: Vec<Value>) -> Self {
        Value::Vector(Rc::new(RefCell::new(items)))
    }

    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_cons(&self) -> Option<&Rc<Cons>> {
        match self {
            Value::Cons(c) => Some(c),
            _ => None,
        }
    }

    pub fn car(&self) -> Option<&Value> {
        self.as_cons().map(|c| &c.car)
    }

    pub fn cdr(&self) -> Option<&Value> {
        self.as_cons().map(|c| &c.cdr)
    }

    /// Collect a proper list. Returns None for improper lists and non-lists.
    pub fn list_to_vec(&self) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut current = self;
        loop {
            match current {
                Value::Null => return Some(items),
                Value::Cons(c) => {
                    items.push(c.car.clone());
                    current = &c.cdr;
                }
                _ => return None,
            }
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::Null | Value::Cons(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Closure(_) | Value::Primitive(_) | Value::Operator(_)
        )
    }

    /// Identity comparison (`eq?`): immediates by value, heap data by pointer.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::BigInt(a), Value::BigInt(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Cons(a), Value::Cons(b)) => Rc::ptr_eq(a, b),
            (Value::Vector(a), Value::Vector(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) | (Value::Macro(a), Value::Macro(b)) => {
                Rc::ptr_eq(a, b)
            }
            (Value::Primitive(a), Value::Primitive(b)) => Rc::ptr_eq(a, b),
            (Value::Operator(a), Value::Operator(b)) => a == b,
            (Value::NextMethod(a), Value::NextMethod(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Structural comparison (`equal?`). Vectors that contain themselves
    /// compare equal when their cycles line up.
    pub fn structurally_equal(&self, other: &Value) -> bool {
        equal_with(self, other, &mut Vec::new())
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::BigInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Cons(_) => "cons",
            Value::Vector(_) => "vector",
            Value::Closure(_) => "closure",
            Value::Macro(_) => "macro",
            Value::Primitive(_) => "primitive",
            Value::Operator(_) => "operator",
            Value::NextMethod(_) => "next-method",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Native(_) => "native",
        }
    }
}

/// `active` holds the vector pairs being compared further up the stack.
fn equal_with(mut a: &Value, mut b: &Value, active: &mut Vec<(usize, usize)>) -> bool {
    loop {
        match (a, b) {
            (Value::Cons(x), Value::Cons(y)) => {
                if Rc::ptr_eq(x, y) {
                    return true;
                }
                if !ensure_sufficient_stack(|| equal_with(&x.car, &y.car, active)) {
                    return false;
                }
                a = &x.cdr;
                b = &y.cdr;
            }
            (Value::Vector(x), Value::Vector(y)) => {
                if Rc::ptr_eq(x, y) {
                    return true;
                }
                let key = (Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize);
                if active.contains(&key) {
                    return true;
                }
                active.push(key);
                let same = {
                    let (xs, ys) = (x.borrow(), y.borrow());
                    xs.len() == ys.len()
                        && xs
                            .iter()
                            .zip(ys.iter())
                            .all(|(p, q)| ensure_sufficient_stack(|| equal_with(p, q, active)))
                };
                active.pop();
                return same;
            }
            (Value::Str(x), Value::Str(y)) => return x == y,
            (Value::Int(x), Value::BigInt(y)) | (Value::BigInt(y), Value::Int(x)) => {
                return BigInt::from(*x) == **y;
            }
            (Value::Float(x), Value::Float(y)) => return x == y,
            _ => return a.identical(b),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<BigInt> for Value {
    /// Demote to a fixnum when it fits.
    fn from(n: BigInt) -> Self {
        use num_traits::ToPrimitive;
        match n.to_i64() {
            Some(small) => Value::Int(small),
            None => Value::BigInt(Rc::new(n)),
        }
    }
}

// Debug output avoids the symbol table, so symbols print as ids.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::BigInt(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Symbol(id) => write!(f, "#<symbol {}>", id.0),
            Value::Cons(c) => write!(f, "({:?} . {:?})", c.car, c.cdr),
            Value::Vector(v) => write!(f, "{:?}", v.borrow()),
            Value::Closure(_) => write!(f, "#<closure>"),
            Value::Macro(_) => write!(f, "#<macro>"),
            Value::Primitive(p) => write!(f, "#<primitive {}>", p.name),
            Value::Operator(id) => write!(f, "#<operator {}>", id.0),
            Value::NextMethod(_) => write!(f, "#<next-method>"),
            Value::Class(id) => write!(f, "#<class {}>", id.0),
            Value::Instance(_) => write!(f, "#<instance>"),
            Value::Native(n) => write!(f, "#<native {}>", n.type_name()),
        }
    }
}

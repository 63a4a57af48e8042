// Host interop
//
// Host objects enter the interpreter as `Native` values tagged with a type
// name. Member access on them is resolved through a host supplied
// `MemberResolver`; the interpreter never looks inside the object itself.

use crate::error::{EvalResult, RuntimeError};
use crate::types::Value;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// An opaque host object
#[derive(Clone)]
pub struct NativeObject {
    type_name: Rc<str>,
    inner: Rc<dyn Any>,
}

impl NativeObject {
    pub fn new<T: Any>(type_name: &str, value: T) -> Self {
        Self {
            type_name: Rc::from(type_name),
            inner: Rc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &NativeObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// How one member of a host type is read, written or called.
///
/// Every operation defaults to an error, so an accessor only implements
/// what the member supports.
pub trait Accessor {
    fn get(&self, target: &Value) -> EvalResult<Value> {
        let _ = target;
        Err(RuntimeError::Interop("member is not readable".to_string()).into())
    }

    fn set(&self, target: &Value, value: Value) -> EvalResult<()> {
        let _ = (target, value);
        Err(RuntimeError::Interop("member is not writable".to_string()).into())
    }

    fn invoke(&self, target: &Value, args: &[Value]) -> EvalResult<Value> {
        let _ = (target, args);
        Err(RuntimeError::Interop("member is not callable".to_string()).into())
    }
}

/// Host hook that finds accessors by type name and member name
pub trait MemberResolver {
    fn resolve_member(&self, type_name: &str, member: &str) -> Option<Rc<dyn Accessor>>;
}

/// Type name used for resolving members of any value
pub fn host_type_name(value: &Value) -> &str {
    match value {
        Value::Native(object) => object.type_name(),
        other => other.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;

    impl Accessor for Counter {
        fn get(&self, target: &Value) -> EvalResult<Value> {
            match target {
                Value::Native(obj) => Ok(Value::Int(*obj.downcast_ref::<i64>().unwrap_or(&-1))),
                _ => Ok(Value::Null),
            }
        }
    }

    #[test]
    fn test_native_identity_and_downcast() {
        let a = NativeObject::new("counter", 7i64);
        let b = a.clone();
        let c = NativeObject::new("counter", 7i64);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.downcast_ref::<i64>(), Some(&7));
        assert!(a.downcast_ref::<String>().is_none());
        assert_eq!(host_type_name(&Value::Native(a)), "counter");
        assert_eq!(host_type_name(&Value::Int(1)), "integer");
    }

    #[test]
    fn test_accessor_defaults() {
        let target = Value::Native(NativeObject::new("counter", 3i64));
        assert!(matches!(Counter.get(&target).unwrap(), Value::Int(3)));
        assert!(Counter.set(&target, Value::Null).is_err());
        assert!(Counter.invoke(&target, &[]).is_err());
    }
}

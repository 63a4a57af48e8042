// dynlisp Behavior Dispatch
//
// A behavior is a named method family dispatched on the class of its first
// argument. Each call walks an explicit method chain; the position in the
// chain travels with the call as a `NextMethod` value, bound to a hidden
// first parameter of every method.

use crate::error::{DispatchError, Error, EvalResult, SourceLoc};
use crate::eval::Interpreter;
use crate::types::{ClassId, Value};
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Primary,
    Before,
    After,
    Around,
}

/// The methods one class defines for one behavior name
#[derive(Debug, Clone, Default)]
pub struct MethodSet {
    pub primary: Option<Value>,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub around: Option<Value>,
}

impl MethodSet {
    /// Install a method, replacing any earlier one with the same qualifier
    pub fn set(&mut self, qualifier: Qualifier, method: Value) {
        let slot = match qualifier {
            Qualifier::Primary => &mut self.primary,
            Qualifier::Before => &mut self.before,
            Qualifier::After => &mut self.after,
            Qualifier::Around => &mut self.around,
        };
        *slot = Some(method);
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none()
            && self.before.is_none()
            && self.after.is_none()
            && self.around.is_none()
    }
}

/// Effective method for one (class, behavior) pair.
///
/// `entries` holds the around methods (most derived first) followed by the
/// primary methods (most derived first). Position `primary_start` is the
/// standard core: befores, first primary, afters.
#[derive(Debug)]
pub struct MethodChain {
    pub name: Arc<str>,
    entries: Vec<Value>,
    primary_start: usize,
    befores: Vec<Value>,
    /// Least derived first
    afters: Vec<Value>,
}

impl MethodChain {
    /// Combine method sets given in linearization order. Returns `None`
    /// when there is neither a primary nor an around method.
    pub fn build<'a>(name: Arc<str>, sets: impl Iterator<Item = &'a MethodSet>) -> Option<Self> {
        let mut arounds = Vec::new();
        let mut primaries = Vec::new();
        let mut befores = Vec::new();
        let mut afters = Vec::new();
        for set in sets {
            arounds.extend(set.around.clone());
            primaries.extend(set.primary.clone());
            befores.extend(set.before.clone());
            afters.extend(set.after.clone());
        }
        if arounds.is_empty() && primaries.is_empty() {
            return None;
        }
        afters.reverse();
        let primary_start = arounds.len();
        let mut entries = arounds;
        entries.extend(primaries);
        Some(Self {
            name,
            entries,
            primary_start,
            befores,
            afters,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_primary(&self) -> bool {
        self.primary_start < self.entries.len()
    }
}

/// Continuation handed to a method: the chain and where the next call lands
#[derive(Debug)]
pub struct NextMethod {
    pub chain: Rc<MethodChain>,
    pub cursor: usize,
    pub args: Rc<[Value]>,
}

impl NextMethod {
    /// Befores and afters get a continuation that is already exhausted.
    fn exhausted(chain: &Rc<MethodChain>, args: &Rc<[Value]>) -> Self {
        Self {
            chain: chain.clone(),
            cursor: usize::MAX,
            args: args.clone(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.cursor < self.chain.entries.len()
    }
}

impl Interpreter {
    /// Effective method chain of `name` for `class`, built on first use
    pub fn find_behavior(&mut self, class: ClassId, name: &str) -> Option<Rc<MethodChain>> {
        let (chain, built) = self.classes.chain(class, name);
        if built {
            self.counters.chain_builds += 1;
        }
        chain
    }

    /// Class whose behaviors apply to `receiver`
    pub fn dispatch_class(&self, receiver: &Value) -> Option<ClassId> {
        match receiver {
            Value::Instance(inst) => Some(inst.borrow().effective_class()),
            Value::Class(id) => Some(*id),
            _ => None,
        }
    }

    pub fn has_behavior(&mut self, receiver: &Value, name: &str) -> bool {
        match self.dispatch_class(receiver) {
            Some(class) => self.find_behavior(class, name).is_some(),
            None => false,
        }
    }

    /// Invoke behavior `name`; `args[0]` is the receiver.
    pub fn invoke_behavior(
        &mut self,
        name: &str,
        args: &[Value],
        loc: Option<&SourceLoc>,
    ) -> EvalResult<Value> {
        let receiver = args.first().cloned().unwrap_or_default();
        let chain = self
            .dispatch_class(&receiver)
            .and_then(|class| self.find_behavior(class, name));
        match chain {
            Some(chain) => self.run_chain(&chain, 0, Rc::from(args), loc),
            None => Err(self.no_behavior(name, &receiver, args)),
        }
    }

    fn no_behavior(&self, name: &str, receiver: &Value, args: &[Value]) -> Error {
        let class = match self.dispatch_class(receiver) {
            Some(id) => self.classes.class_name(id).to_string(),
            None => receiver.type_name().to_string(),
        };
        DispatchError::NoBehavior {
            name: name.to_string(),
            class,
            args: self.print_args(args),
        }
        .into()
    }

    pub(crate) fn run_chain(
        &mut self,
        chain: &Rc<MethodChain>,
        cursor: usize,
        args: Rc<[Value]>,
        loc: Option<&SourceLoc>,
    ) -> EvalResult<Value> {
        if cursor < chain.primary_start {
            let method = chain.entries[cursor].clone();
            return self.call_method(&method, chain, cursor + 1, args, loc);
        }
        if cursor == chain.primary_start {
            for before in &chain.befores {
                let next = NextMethod::exhausted(chain, &args);
                self.call_with_next(before, next, &args, loc)?;
            }
            let result = match chain.entries.get(cursor) {
                Some(primary) => {
                    let primary = primary.clone();
                    self.call_method(&primary, chain, cursor + 1, args.clone(), loc)?
                }
                None => Value::Null,
            };
            for after in &chain.afters {
                let next = NextMethod::exhausted(chain, &args);
                self.call_with_next(after, next, &args, loc)?;
            }
            return Ok(result);
        }
        match chain.entries.get(cursor) {
            Some(method) => {
                let method = method.clone();
                self.call_method(&method, chain, cursor + 1, args, loc)
            }
            // Past the least specific method: no-op
            None => Ok(Value::Null),
        }
    }

    fn call_method(
        &mut self,
        method: &Value,
        chain: &Rc<MethodChain>,
        next_cursor: usize,
        args: Rc<[Value]>,
        loc: Option<&SourceLoc>,
    ) -> EvalResult<Value> {
        let next = NextMethod {
            chain: chain.clone(),
            cursor: next_cursor,
            args: args.clone(),
        };
        self.call_with_next(method, next, &args, loc)
    }

    fn call_with_next(
        &mut self,
        method: &Value,
        next: NextMethod,
        args: &[Value],
        loc: Option<&SourceLoc>,
    ) -> EvalResult<Value> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(Value::NextMethod(Rc::new(next)));
        argv.extend_from_slice(args);
        self.apply_value_at(method, &argv, loc)
    }

    /// Advance a continuation. Without arguments the current ones are reused.
    pub fn call_next_method(
        &mut self,
        next: &NextMethod,
        args: Option<Vec<Value>>,
        loc: Option<&SourceLoc>,
    ) -> EvalResult<Value> {
        let args = match args {
            Some(args) => Rc::from(args),
            None => next.args.clone(),
        };
        self.run_chain(&next.chain, next.cursor, args, loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(primary: i64, before: Option<i64>) -> MethodSet {
        MethodSet {
            primary: Some(Value::Int(primary)),
            before: before.map(Value::Int),
            ..MethodSet::default()
        }
    }

    #[test]
    fn test_chain_layout() {
        let mut derived = set(1, Some(10));
        derived.set(Qualifier::Around, Value::Int(100));
        derived.set(Qualifier::After, Value::Int(20));
        let mut base = set(2, Some(11));
        base.set(Qualifier::After, Value::Int(21));

        let chain = MethodChain::build(Arc::from("f"), [&derived, &base].into_iter()).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.primary_start, 1);
        assert!(matches!(chain.entries[1], Value::Int(1)));
        assert!(matches!(chain.befores[0], Value::Int(10)));
        assert!(matches!(chain.afters[0], Value::Int(21)));
    }

    #[test]
    fn test_no_primary_no_around_is_not_a_chain() {
        let only_before = MethodSet {
            before: Some(Value::Int(1)),
            ..MethodSet::default()
        };
        assert!(MethodChain::build(Arc::from("f"), [&only_before].into_iter()).is_none());
        assert!(MethodSet::default().is_empty());
    }

    #[test]
    fn test_exhausted_continuation() {
        let chain = Rc::new(MethodChain::build(Arc::from("f"), [&set(1, None)].into_iter()).unwrap());
        let args: Rc<[Value]> = Rc::from(vec![Value::Null]);
        assert!(!NextMethod::exhausted(&chain, &args).has_next());
        let next = NextMethod {
            chain,
            cursor: 0,
            args,
        };
        assert!(next.has_next());
    }
}

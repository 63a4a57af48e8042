// dynlisp Object Model
//
// Classes live in an arena and refer to each other by index. Each class
// caches its linearization and its behavior chains; structural changes
// invalidate the class and every class that extends it, found through the
// extender registration table.

use crate::behavior::{MethodChain, MethodSet, Qualifier};
use crate::error::{Error, EvalResult, RuntimeError};
use crate::eval::Interpreter;
use crate::fastmap::{HashMap, HashSet};
use crate::types::{ClassId, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Where a slot's value comes from when an instance has none
#[derive(Debug, Clone)]
pub enum SlotDefault {
    Constant(Value),
    /// Zero-argument function, called once per instance
    Computed(Value),
}

/// A slot definition
#[derive(Debug, Clone)]
pub struct SlotDefinition {
    pub name: Arc<str>,
    /// Declaring class
    pub owner: ClassId,
    pub default: SlotDefault,
}

/// A class definition
#[derive(Debug)]
pub struct ClassDefinition {
    pub name: Arc<str>,
    /// Bumped each time a class of this name is redefined
    pub version: u32,
    /// Direct parents, in precedence order
    pub extensions: Vec<ClassId>,
    /// Own slots
    pub slots: Vec<SlotDefinition>,
    /// Per-instance subclass created by customization
    pub synthetic: bool,
    behaviors: HashMap<Arc<str>, MethodSet>,
    linearization: Option<Rc<[ClassId]>>,
    chains: HashMap<Arc<str>, Option<Rc<MethodChain>>>,
}

impl ClassDefinition {
    fn new(name: Arc<str>, version: u32, extensions: Vec<ClassId>, synthetic: bool) -> Self {
        Self {
            name,
            version,
            extensions,
            slots: Vec::new(),
            synthetic,
            behaviors: HashMap::default(),
            linearization: None,
            chains: HashMap::default(),
        }
    }

    pub fn behavior_names(&self) -> Vec<Arc<str>> {
        self.behaviors.keys().cloned().collect()
    }

    fn invalidate(&mut self) {
        self.linearization = None;
        self.chains.clear();
    }
}

/// Change notifications, delivered to registered listeners
#[derive(Debug, Clone, PartialEq)]
pub enum ClassEvent {
    Defined { class: ClassId, version: u32 },
    Extended { class: ClassId, parents: Vec<ClassId> },
    SlotAdded { class: ClassId, slot: Arc<str> },
    SlotRemoved { class: ClassId, slot: Arc<str> },
    BehaviorAdded { class: ClassId, name: Arc<str> },
    /// Cached linearization and chains were dropped
    Invalidated { class: ClassId },
}

pub type ClassListener = Box<dyn Fn(&ClassEvent)>;

/// A class instance: an open map from slot name to value
#[derive(Debug)]
pub struct Instance {
    /// Nominal class
    pub class: ClassId,
    /// Synthetic subclass holding per-instance slots and behaviors
    own_class: Option<ClassId>,
    pub slots: HashMap<Arc<str>, Value>,
}

impl Instance {
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            own_class: None,
            slots: HashMap::default(),
        }
    }

    /// Class used for slot and behavior resolution
    pub fn effective_class(&self) -> ClassId {
        self.own_class.unwrap_or(self.class)
    }

    pub fn is_customized(&self) -> bool {
        self.own_class.is_some()
    }
}

/// The class arena
pub struct ClassSpace {
    classes: Vec<ClassDefinition>,
    by_name: HashMap<Arc<str>, ClassId>,
    /// class -> classes that list it as a direct parent
    extenders: HashMap<ClassId, Vec<ClassId>>,
    listeners: Vec<ClassListener>,
    object: ClassId,
}

impl ClassSpace {
    pub fn new() -> Self {
        let root: Arc<str> = Arc::from("object");
        let mut by_name = HashMap::default();
        by_name.insert(root.clone(), ClassId(0));
        Self {
            classes: vec![ClassDefinition::new(root, 1, Vec::new(), false)],
            by_name,
            extenders: HashMap::default(),
            listeners: Vec::new(),
            object: ClassId(0),
        }
    }

    /// The root class every linearization ends with
    pub fn object(&self) -> ClassId {
        self.object
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassDefinition> {
        self.classes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: ClassId) -> Option<&mut ClassDefinition> {
        self.classes.get_mut(id.0 as usize)
    }

    pub fn class_name(&self, id: ClassId) -> &str {
        self.get(id).map(|c| &*c.name).unwrap_or("#<invalid-class>")
    }

    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Register a change listener
    pub fn watch(&mut self, listener: ClassListener) {
        self.listeners.push(listener);
    }

    fn notify(&self, event: ClassEvent) {
        log::debug!("class event: {event:?}");
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Define a class. Reusing a name creates a new class with a higher
    /// version; existing instances keep the old one.
    pub fn define(
        &mut self,
        name: &str,
        parents: &[ClassId],
        slots: Vec<(Arc<str>, SlotDefault)>,
    ) -> EvalResult<ClassId> {
        let name: Arc<str> = Arc::from(name);
        let version = match self.by_name.get(&name) {
            Some(old) => self.get(*old).map_or(1, |c| c.version + 1),
            None => 1,
        };
        if version > 1 {
            log::debug!("redefining class {name} as version {version}");
        }
        let id = self.push_class(ClassDefinition::new(name.clone(), version, Vec::new(), false));
        self.by_name.insert(name, id);
        if let Some(class) = self.get_mut(id) {
            class.slots = slots
                .into_iter()
                .map(|(name, default)| SlotDefinition {
                    name,
                    owner: id,
                    default,
                })
                .collect();
        }
        self.extend(id, parents)?;
        self.notify(ClassEvent::Defined { class: id, version });
        Ok(id)
    }

    fn push_class(&mut self, class: ClassDefinition) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(class);
        id
    }

    /// Insert new parents after the existing ones. Parents already present
    /// are skipped; a class may not extend itself or a class extending it.
    pub fn extend(&mut self, class: ClassId, parents: &[ClassId]) -> EvalResult<()> {
        let Some(existing) = self.get(class).map(|def| def.extensions.clone()) else {
            return Err(Error::user(format!("no class with index {}", class.0)));
        };
        let mut added: Vec<ClassId> = Vec::new();
        for &parent in parents {
            if parent == self.object || existing.contains(&parent) || added.contains(&parent) {
                continue;
            }
            if self.get(parent).is_none() {
                return Err(Error::user(format!("no class with index {}", parent.0)));
            }
            if parent == class || self.linearization(parent).contains(&class) {
                return Err(Error::user(format!(
                    "{} cannot extend {}: circular extension",
                    self.class_name(class),
                    self.class_name(parent)
                )));
            }
            added.push(parent);
        }
        if added.is_empty() {
            return Ok(());
        }
        // Appending keeps every new parent ahead of the class's own position.
        if let Some(def) = self.get_mut(class) {
            def.extensions.extend_from_slice(&added);
        }
        for &parent in &added {
            self.extenders.entry(parent).or_default().push(class);
        }
        self.invalidate(class);
        self.notify(ClassEvent::Extended {
            class,
            parents: added,
        });
        Ok(())
    }

    /// Drop cached data of `class` and of every class extending it
    pub fn invalidate(&mut self, class: ClassId) {
        let mut pending = vec![class];
        let mut seen = HashSet::default();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(def) = self.get_mut(id) {
                def.invalidate();
            }
            if let Some(children) = self.extenders.get(&id) {
                pending.extend(children.iter().copied());
            }
            self.notify(ClassEvent::Invalidated { class: id });
        }
    }

    /// Depth-first, first occurrence wins, `object` last
    pub fn linearization(&mut self, class: ClassId) -> Rc<[ClassId]> {
        if let Some(cached) = self.get(class).and_then(|c| c.linearization.clone()) {
            return cached;
        }
        let mut order = Vec::new();
        let mut visited = HashSet::default();
        self.collect_linearization(class, &mut order, &mut visited);
        if !order.contains(&self.object) {
            order.push(self.object);
        }
        let order: Rc<[ClassId]> = Rc::from(order);
        if let Some(def) = self.get_mut(class) {
            def.linearization = Some(order.clone());
        }
        order
    }

    fn collect_linearization(&self, class: ClassId, order: &mut Vec<ClassId>, visited: &mut HashSet<ClassId>) {
        if class == self.object || !visited.insert(class) {
            return;
        }
        order.push(class);
        if let Some(def) = self.get(class) {
            for &parent in &def.extensions {
                self.collect_linearization(parent, order, visited);
            }
        }
    }

    pub fn is_subclass(&mut self, class: ClassId, ancestor: ClassId) -> bool {
        self.linearization(class).contains(&ancestor)
    }

    pub fn add_slot(&mut self, class: ClassId, name: &str, default: SlotDefault) {
        let name: Arc<str> = Arc::from(name);
        let Some(def) = self.get_mut(class) else {
            return;
        };
        let slot = SlotDefinition {
            name: name.clone(),
            owner: class,
            default,
        };
        match def.slots.iter_mut().find(|s| s.name == name) {
            Some(existing) => *existing = slot,
            None => def.slots.push(slot),
        }
        self.notify(ClassEvent::SlotAdded { class, slot: name });
    }

    pub fn remove_slot(&mut self, class: ClassId, name: &str) -> bool {
        let Some(def) = self.get_mut(class) else {
            return false;
        };
        let before = def.slots.len();
        def.slots.retain(|s| &*s.name != name);
        let removed = def.slots.len() != before;
        if removed {
            self.notify(ClassEvent::SlotRemoved {
                class,
                slot: Arc::from(name),
            });
        }
        removed
    }

    /// Effective definition of a slot: the first one in the linearization
    pub fn effective_slot(&mut self, class: ClassId, name: &str) -> Option<SlotDefinition> {
        let order = self.linearization(class);
        order.iter().find_map(|id| {
            self.get(*id)
                .and_then(|c| c.slots.iter().find(|s| &*s.name == name))
                .cloned()
        })
    }

    /// Names of all slots reachable through the linearization
    pub fn slot_names(&mut self, class: ClassId) -> Vec<Arc<str>> {
        let order = self.linearization(class);
        let mut names: Vec<Arc<str>> = Vec::new();
        for id in order.iter() {
            if let Some(def) = self.get(*id) {
                for slot in &def.slots {
                    if !names.contains(&slot.name) {
                        names.push(slot.name.clone());
                    }
                }
            }
        }
        names
    }

    pub fn add_behavior(&mut self, class: ClassId, name: &str, qualifier: Qualifier, method: Value) {
        let name: Arc<str> = Arc::from(name);
        let Some(def) = self.get_mut(class) else {
            return;
        };
        def.behaviors.entry(name.clone()).or_default().set(qualifier, method);
        self.invalidate(class);
        self.notify(ClassEvent::BehaviorAdded { class, name });
    }

    /// Cached behavior chain. The flag reports whether it was just built.
    pub fn chain(&mut self, class: ClassId, name: &str) -> (Option<Rc<MethodChain>>, bool) {
        if let Some(cached) = self.get(class).and_then(|c| c.chains.get(name)) {
            return (cached.clone(), false);
        }
        let order = self.linearization(class);
        let chain = MethodChain::build(
            Arc::from(name),
            order
                .iter()
                .filter_map(|id| self.get(*id).and_then(|c| c.behaviors.get(name))),
        )
        .map(Rc::new);
        if let Some(def) = self.get_mut(class) {
            def.chains.insert(Arc::from(name), chain.clone());
        }
        (chain, true)
    }

    /// Give `instance` its own synthetic subclass, creating it on first use
    pub fn customize(&mut self, instance: &mut Instance) -> ClassId {
        if let Some(own) = instance.own_class {
            return own;
        }
        let base = instance.class;
        let name: Arc<str> = Arc::from(format!("{}*", self.class_name(base)));
        let id = self.push_class(ClassDefinition::new(name, 1, vec![base], true));
        self.extenders.entry(base).or_default().push(id);
        instance.own_class = Some(id);
        id
    }
}

impl Default for ClassSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create an instance from `:slot value` pairs, then run its
    /// `initialize` behavior if it has one.
    pub fn make_instance(&mut self, class: ClassId, initargs: &[Value]) -> EvalResult<Value> {
        if initargs.len() % 2 != 0 {
            return Err(RuntimeError::UnpairedKeyword(initargs.len()).into());
        }
        let mut instance = Instance::new(class);
        for pair in initargs.chunks(2) {
            let name = self.slot_name(&pair[0])?;
            instance.slots.insert(name, pair[1].clone());
        }
        let value = Value::Instance(Rc::new(RefCell::new(instance)));
        if self.find_behavior(class, "initialize").is_some() {
            self.invoke_behavior("initialize", std::slice::from_ref(&value), None)?;
        }
        Ok(value)
    }

    /// Slot names may be given as strings, symbols or keywords
    pub fn slot_name(&self, value: &Value) -> EvalResult<Arc<str>> {
        match value {
            Value::Str(s) => Ok(Arc::from(&**s)),
            Value::Symbol(sym) => Ok(Arc::from(&*self.symbols.symbol_name(*sym))),
            other => Err(Error::type_error("slot name", other)),
        }
    }

    fn as_instance<'v>(&self, value: &'v Value) -> EvalResult<&'v Rc<RefCell<Instance>>> {
        match value {
            Value::Instance(inst) => Ok(inst),
            other => Err(Error::type_error("instance", other)),
        }
    }

    /// Read a slot through its `get_<name>` accessor behavior if installed
    pub fn get_slot(&mut self, object: &Value, name: &str) -> EvalResult<Value> {
        let class = self.as_instance(object)?.borrow().effective_class();
        if let Some(chain) = self.find_behavior(class, &format!("get_{name}")) {
            return self.run_chain(&chain, 0, Rc::from(vec![object.clone()]), None);
        }
        self.slot_value(object, name)
    }

    /// Write a slot through its `set_<name>` accessor behavior if installed
    pub fn set_slot(&mut self, object: &Value, name: &str, value: Value) -> EvalResult<Value> {
        let class = self.as_instance(object)?.borrow().effective_class();
        if let Some(chain) = self.find_behavior(class, &format!("set_{name}")) {
            self.run_chain(&chain, 0, Rc::from(vec![object.clone(), value.clone()]), None)?;
            return Ok(value);
        }
        self.set_slot_value(object, name, value)
    }

    /// Raw slot read: storage, then the effective default (cached on first
    /// read), else an unknown-slot error.
    pub fn slot_value(&mut self, object: &Value, name: &str) -> EvalResult<Value> {
        let inst = self.as_instance(object)?;
        let class = {
            let inst = inst.borrow();
            if let Some(value) = inst.slots.get(name) {
                return Ok(value.clone());
            }
            inst.effective_class()
        };
        let Some(slot) = self.classes.effective_slot(class, name) else {
            return Err(RuntimeError::UnknownSlot {
                slot: name.to_string(),
                class: self.classes.class_name(class).to_string(),
            }
            .into());
        };
        let value = match slot.default {
            SlotDefault::Constant(value) => value,
            SlotDefault::Computed(thunk) => self.apply_value(&thunk, &[])?,
        };
        inst.borrow_mut().slots.insert(slot.name, value.clone());
        Ok(value)
    }

    /// Raw slot write. Instances are open: any name may be stored.
    pub fn set_slot_value(&mut self, object: &Value, name: &str, value: Value) -> EvalResult<Value> {
        let inst = self.as_instance(object)?;
        inst.borrow_mut().slots.insert(Arc::from(name), value.clone());
        Ok(value)
    }

    /// Nominal class of an instance, or the class itself for class values
    pub fn class_of(&self, value: &Value) -> Option<ClassId> {
        match value {
            Value::Instance(inst) => Some(inst.borrow().class),
            _ => None,
        }
    }

    pub fn instance_of(&mut self, value: &Value, class: ClassId) -> bool {
        match value {
            Value::Instance(inst) => {
                let own = inst.borrow().effective_class();
                self.classes.is_subclass(own, class)
            }
            _ => false,
        }
    }

    /// Class to change for per-instance customization or class-wide changes
    pub fn customization_target(&mut self, target: &Value) -> EvalResult<ClassId> {
        match target {
            Value::Class(id) => Ok(*id),
            Value::Instance(inst) => Ok(self.classes.customize(&mut inst.borrow_mut())),
            other => Err(Error::type_error("class or instance", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn slot(name: &str, value: i64) -> (Arc<str>, SlotDefault) {
        (Arc::from(name), SlotDefault::Constant(Value::Int(value)))
    }

    #[test]
    fn test_linearization_depth_first() {
        let mut space = ClassSpace::new();
        let a = space.define("A", &[], vec![]).unwrap();
        let b = space.define("B", &[a], vec![]).unwrap();
        let c = space.define("C", &[a], vec![]).unwrap();
        let d = space.define("D", &[b, c], vec![]).unwrap();
        let object = space.object();
        assert_eq!(&*space.linearization(d), &[d, b, a, c, object]);
        assert_eq!(&*space.linearization(object), &[object]);
    }

    #[test]
    fn test_extend_invalidates_extenders() {
        let mut space = ClassSpace::new();
        let a = space.define("A", &[], vec![]).unwrap();
        let b = space.define("B", &[a], vec![]).unwrap();
        let mixin = space.define("Mixin", &[], vec![]).unwrap();
        let object = space.object();
        assert_eq!(&*space.linearization(b), &[b, a, object]);

        space.extend(a, &[mixin]).unwrap();
        assert_eq!(&*space.linearization(b), &[b, a, mixin, object]);

        // already present: no change
        space.extend(a, &[mixin]).unwrap();
        assert_eq!(space.get(a).unwrap().extensions, vec![mixin]);
    }

    #[test]
    fn test_circular_extension_rejected() {
        let mut space = ClassSpace::new();
        let a = space.define("A", &[], vec![]).unwrap();
        let b = space.define("B", &[a], vec![]).unwrap();
        assert!(space.extend(a, &[b]).is_err());
        assert!(space.extend(a, &[a]).is_err());
    }

    #[test]
    fn test_extend_appends_and_fails_atomically() {
        let mut space = ClassSpace::new();
        let a = space.define("A", &[], vec![]).unwrap();
        let b = space.define("B", &[a], vec![]).unwrap();
        let m = space.define("M", &[], vec![]).unwrap();
        let n = space.define("N", &[], vec![]).unwrap();
        let object = space.object();

        space.extend(b, &[m, a, n, m]).unwrap();
        assert_eq!(space.get(b).unwrap().extensions, vec![a, m, n]);
        assert_eq!(&*space.linearization(b), &[b, a, m, n, object]);

        let c = space.define("C", &[], vec![]).unwrap();
        assert!(space.extend(a, &[c, b]).is_err());
        assert!(space.get(a).unwrap().extensions.is_empty());
        assert_eq!(&*space.linearization(a), &[a, object]);
    }

    #[test]
    fn test_most_specific_slot_wins() {
        let mut space = ClassSpace::new();
        let a = space.define("A", &[], vec![slot("x", 1)]).unwrap();
        let b = space.define("B", &[a], vec![slot("x", 2)]).unwrap();
        let late = space.define("Late", &[], vec![slot("x", 3)]).unwrap();
        space.extend(b, &[late]).unwrap();

        let found = space.effective_slot(b, "x").unwrap();
        assert_eq!(found.owner, b);
        assert!(space.effective_slot(b, "y").is_none());
        assert_eq!(space.slot_names(b).len(), 1);
    }

    #[test]
    fn test_redefinition_bumps_version() {
        let mut space = ClassSpace::new();
        let first = space.define("P", &[], vec![]).unwrap();
        let second = space.define("P", &[], vec![]).unwrap();
        assert_ne!(first, second);
        assert_eq!(space.get(second).unwrap().version, 2);
        assert_eq!(space.find("P"), Some(second));
    }

    #[test]
    fn test_listeners_see_events() {
        let mut space = ClassSpace::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        space.watch(Box::new(move |e| sink.borrow_mut().push(e.clone())));

        let a = space.define("A", &[], vec![]).unwrap();
        space.add_slot(a, "z", SlotDefault::Constant(Value::Null));
        assert!(space.remove_slot(a, "z"));
        assert!(!space.remove_slot(a, "z"));

        let events = events.borrow();
        assert!(events.contains(&ClassEvent::Defined { class: a, version: 1 }));
        assert!(events.contains(&ClassEvent::SlotAdded { class: a, slot: Arc::from("z") }));
        assert!(events.contains(&ClassEvent::SlotRemoved { class: a, slot: Arc::from("z") }));
    }

    #[test]
    fn test_customize_creates_one_synthetic_class() {
        let mut space = ClassSpace::new();
        let a = space.define("A", &[], vec![]).unwrap();
        let mut inst = Instance::new(a);
        let own = space.customize(&mut inst);
        assert_eq!(space.customize(&mut inst), own);
        assert!(space.get(own).unwrap().synthetic);
        assert_eq!(inst.class, a);
        assert!(space.is_subclass(own, a));
    }
}

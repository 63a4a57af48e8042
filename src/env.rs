// dynlisp Environments
//
// Lexical frames live in an arena owned by the interpreter and are addressed
// by index. Variables are resolved to (level, index) pairs during analysis, so
// runtime access walks `level` parents and indexes the slot array.

use crate::symbol::SymbolId;
use crate::types::{EnvId, Value};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;

/// Environment reference: `None` is the global (top-level) environment.
pub type EnvRef = Option<EnvId>;

#[derive(Debug, Default)]
struct Frame {
    slots: SmallVec<[Value; 4]>,
    parent: EnvRef,
    /// Closures holding this frame or one of its descendants
    pins: u32,
    /// A call or `let` is still evaluating in this frame
    active: bool,
    live: bool,
}

/// Arena of lexical frames.
///
/// A frame is recycled once it is neither active nor pinned. Closures pin
/// their defining frame chain through an [`EnvPin`]; dropping the pin queues
/// the frame, and the queue is drained on the next allocation or release.
#[derive(Debug, Default)]
pub struct EnvArena {
    frames: Vec<Frame>,
    free: Vec<u32>,
    unpinned: Rc<RefCell<Vec<EnvId>>>,
}

/// Keeps a captured frame and its ancestors out of the free list.
#[derive(Debug)]
pub struct EnvPin {
    env: EnvId,
    unpinned: Rc<RefCell<Vec<EnvId>>>,
}

impl EnvPin {
    pub fn env(&self) -> EnvId {
        self.env
    }
}

impl Drop for EnvPin {
    fn drop(&mut self) {
        self.unpinned.borrow_mut().push(self.env);
    }
}

impl EnvArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, slots: SmallVec<[Value; 4]>, parent: EnvRef) -> EnvId {
        self.collect();
        let frame = Frame {
            slots,
            parent,
            pins: 0,
            active: true,
            live: true,
        };
        if let Some(index) = self.free.pop() {
            self.frames[index as usize] = frame;
            EnvId(index)
        } else {
            self.frames.push(frame);
            EnvId(self.frames.len() as u32 - 1)
        }
    }

    fn frame_at(&self, env: EnvId, level: usize) -> Option<&Frame> {
        let mut frame = self.frames.get(env.0 as usize)?;
        for _ in 0..level {
            frame = self.frames.get(frame.parent?.0 as usize)?;
        }
        Some(frame)
    }

    fn frame_at_mut(&mut self, env: EnvId, level: usize) -> Option<&mut Frame> {
        let mut id = env;
        for _ in 0..level {
            id = self.frames.get(id.0 as usize)?.parent?;
        }
        self.frames.get_mut(id.0 as usize)
    }

    pub fn get(&self, env: EnvRef, level: usize, index: usize) -> Option<&Value> {
        self.frame_at(env?, level)?.slots.get(index)
    }

    pub fn set(&mut self, env: EnvRef, level: usize, index: usize, value: Value) -> bool {
        let Some(env) = env else {
            return false;
        };
        match self.frame_at_mut(env, level).and_then(|f| f.slots.get_mut(index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn parent(&self, env: EnvId) -> EnvRef {
        self.frames.get(env.0 as usize).and_then(|f| f.parent)
    }

    /// Pin a frame and its ancestors for as long as the returned pin lives.
    pub fn pin(&mut self, env: EnvRef) -> Option<EnvPin> {
        let env = env?;
        let mut current = Some(env);
        while let Some(id) = current {
            let Some(frame) = self.frames.get_mut(id.0 as usize) else {
                break;
            };
            frame.pins += 1;
            current = frame.parent;
        }
        Some(EnvPin {
            env,
            unpinned: self.unpinned.clone(),
        })
    }

    /// The evaluation using `env` is done; recycle it unless it is pinned.
    pub fn release(&mut self, env: EnvId) {
        if let Some(frame) = self.frames.get_mut(env.0 as usize) {
            frame.active = false;
        }
        self.free_if_unused(env);
        self.collect();
    }

    /// Unpin the frame chains of dropped closures.
    pub fn collect(&mut self) {
        loop {
            let pending = std::mem::take(&mut *self.unpinned.borrow_mut());
            if pending.is_empty() {
                return;
            }
            for env in pending {
                let mut current = Some(env);
                while let Some(id) = current {
                    let Some(frame) = self.frames.get_mut(id.0 as usize) else {
                        break;
                    };
                    frame.pins = frame.pins.saturating_sub(1);
                    current = frame.parent;
                    self.free_if_unused(id);
                }
            }
        }
    }

    fn free_if_unused(&mut self, env: EnvId) {
        let Some(frame) = self.frames.get_mut(env.0 as usize) else {
            return;
        };
        if !frame.live || frame.active || frame.pins > 0 {
            return;
        }
        // Dropping the slots may drop closures, which only queue their pins.
        let slots = std::mem::take(&mut frame.slots);
        frame.parent = None;
        frame.live = false;
        self.free.push(env.0);
        drop(slots);
    }

    /// Frames currently in use
    pub fn live_frames(&mut self) -> usize {
        self.collect();
        self.frames.len() - self.free.len()
    }
}

/// Dynamic binding stack. Bindings are pushed by `dynamic-let` and popped
/// back to a mark when the form exits, normally or through an error.
#[derive(Debug, Default)]
pub struct DynamicStack {
    bindings: Vec<(SymbolId, Value)>,
}

impl DynamicStack {
    pub fn mark(&self) -> usize {
        self.bindings.len()
    }

    pub fn push(&mut self, sym: SymbolId, value: Value) {
        self.bindings.push((sym, value));
    }

    pub fn unwind(&mut self, mark: usize) {
        self.bindings.truncate(mark);
    }

    /// Innermost binding of `sym`
    pub fn lookup(&self, sym: SymbolId) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(s, _)| *s == sym)
            .map(|(_, v)| v)
    }

    /// Assign the innermost binding. Returns false when `sym` is not bound.
    pub fn assign(&mut self, sym: SymbolId, value: Value) -> bool {
        match self.bindings.iter_mut().rev().find(|(s, _)| *s == sym) {
            Some(binding) => {
                binding.1 = value;
                true
            }
            None => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.bindings.len()
    }
}

/// Where a symbol resolves during analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRef {
    Local { level: usize, index: usize },
    Global,
}

/// Compile-time mirror of the runtime frame chain
#[derive(Debug, Default, Clone)]
pub struct Scope {
    frames: Vec<Vec<SymbolId>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, names: Vec<SymbolId>) {
        self.frames.push(names);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn is_top_level(&self) -> bool {
        self.frames.is_empty()
    }

    /// Walk the lexical chain counting levels; a miss is a global reference.
    /// Later duplicates in one frame shadow earlier ones.
    pub fn lookup(&self, sym: SymbolId) -> VarRef {
        for (level, names) in self.frames.iter().rev().enumerate() {
            if let Some(index) = names.iter().rposition(|s| *s == sym) {
                return VarRef::Local { level, index };
            }
        }
        VarRef::Global
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_get_walks_parents() {
        let mut arena = EnvArena::new();
        let outer = arena.alloc(smallvec![Value::Int(1), Value::Int(2)], None);
        let inner = arena.alloc(smallvec![Value::Int(3)], Some(outer));
        assert!(matches!(arena.get(Some(inner), 0, 0), Some(Value::Int(3))));
        assert!(matches!(arena.get(Some(inner), 1, 1), Some(Value::Int(2))));
        assert!(arena.get(None, 0, 0).is_none());

        assert!(arena.set(Some(inner), 1, 0, Value::Int(10)));
        assert!(matches!(arena.get(Some(outer), 0, 0), Some(Value::Int(10))));
    }

    #[test]
    fn test_release_recycles_uncaptured_frames() {
        let mut arena = EnvArena::new();
        let a = arena.alloc(smallvec![Value::Int(1)], None);
        arena.release(a);
        assert_eq!(arena.live_frames(), 0);
        let b = arena.alloc(smallvec![], None);
        assert_eq!(a, b);

        let c = arena.alloc(smallvec![], Some(b));
        let pin = arena.pin(Some(c));
        arena.release(c);
        arena.release(b);
        assert_eq!(arena.live_frames(), 2);

        drop(pin);
        assert_eq!(arena.live_frames(), 0);
    }

    #[test]
    fn test_pinned_parent_outlives_one_of_two_pins() {
        let mut arena = EnvArena::new();
        let outer = arena.alloc(smallvec![Value::Int(1)], None);
        let left = arena.alloc(smallvec![], Some(outer));
        let right = arena.alloc(smallvec![], Some(outer));
        let left_pin = arena.pin(Some(left));
        let right_pin = arena.pin(Some(right));
        for env in [left, right, outer] {
            arena.release(env);
        }
        assert_eq!(arena.live_frames(), 3);

        drop(left_pin);
        assert_eq!(arena.live_frames(), 2);
        assert!(matches!(arena.get(Some(right), 1, 0), Some(Value::Int(1))));

        drop(right_pin);
        assert_eq!(arena.live_frames(), 0);
        assert!(arena.pin(None).is_none());
    }

    #[test]
    fn test_dynamic_stack_shadows_and_unwinds() {
        let mut stack = DynamicStack::default();
        let sym = SymbolId(7);
        assert!(stack.lookup(sym).is_none());
        let mark = stack.mark();
        stack.push(sym, Value::Int(1));
        stack.push(sym, Value::Int(2));
        assert!(matches!(stack.lookup(sym), Some(Value::Int(2))));
        assert!(stack.assign(sym, Value::Int(5)));
        stack.unwind(mark + 1);
        assert!(matches!(stack.lookup(sym), Some(Value::Int(1))));
        stack.unwind(mark);
        assert!(!stack.assign(sym, Value::Null));
    }

    #[test]
    fn test_scope_resolution() {
        let mut scope = Scope::new();
        let (x, y) = (SymbolId(1), SymbolId(2));
        assert_eq!(scope.lookup(x), VarRef::Global);
        scope.push(vec![x, y]);
        scope.push(vec![y]);
        assert_eq!(scope.lookup(y), VarRef::Local { level: 0, index: 0 });
        assert_eq!(scope.lookup(x), VarRef::Local { level: 1, index: 0 });
        scope.pop();
        assert_eq!(scope.lookup(y), VarRef::Local { level: 0, index: 1 });
    }
}

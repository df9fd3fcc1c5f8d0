use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Handle returned by `subscribe`, used to unsubscribe.
    pub struct SubId;
}

type Subs<E> = SlotMap<SubId, Rc<dyn Fn(&E)>>;

/// Subscriber list. Callbacks may subscribe, unsubscribe or emit again while
/// being notified; a callback removed mid-dispatch is not called.
pub struct Emitter<E: 'static>(Rc<RefCell<Subs<E>>>);

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(SlotMap::with_key())))
    }

    pub fn subscribe(&self, f: impl Fn(&E) + 'static) -> SubId {
        self.0.borrow_mut().insert(Rc::new(f))
    }

    pub fn unsubscribe(&self, id: SubId) -> bool {
        self.0.borrow_mut().remove(id).is_some()
    }

    pub fn emit(&self, event: &E) {
        let snapshot: Vec<(SubId, Rc<dyn Fn(&E)>)> =
            self.0.borrow().iter().map(|(id, f)| (id, f.clone())).collect();
        for (id, f) in snapshot {
            if self.0.borrow().contains_key(id) {
                f(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Observable value. Subscribers run after the write, with no borrow held,
/// so they may read the signal back.
#[derive(Clone)]
pub struct Signal<T: 'static> {
    value: Rc<RefCell<T>>,
    changed: Emitter<T>,
}

impl<T: Clone> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
            changed: Emitter::new(),
        }
    }
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
    pub fn set(&self, v: T) {
        *self.value.borrow_mut() = v.clone();
        self.changed.emit(&v);
    }
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        let v = {
            let mut inner = self.value.borrow_mut();
            f(&mut inner);
            inner.clone()
        };
        self.changed.emit(&v);
    }
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubId {
        self.changed.subscribe(f)
    }
    pub fn unsubscribe(&self, id: SubId) -> bool {
        self.changed.unsubscribe(id)
    }
}

pub fn signal<T: Clone>(t: T) -> Signal<T> {
    Signal::new(t)
}

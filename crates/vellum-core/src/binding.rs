//! # Data binding
//!
//! Keeps a control (switch, slider, toggle, ...) and a model value in sync.
//!
//! - A [`Model`] is where the value lives: a getter/setter pair
//!   ([`Accessors`]), a [`Signal`], or a dotted path into a shared JSON
//!   document ([`PathModel`]).
//! - A [`BindingAdapter`] reads and writes the control. Controls that
//!   implement [`ValueControl`] get one for free ([`ControlAdapter`]).
//!
//! ```rust
//! use std::rc::Rc;
//! use vellum_core::*;
//!
//! let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
//! let volume = signal(0.25_f32);
//! let knob = signal(0.0_f32); // stands in for a slider
//!
//! let adapter = FnAdapter::new(
//!     |k: &Signal<f32>| k.get(),
//!     |k: &Signal<f32>, v| k.set(v),
//! );
//! let binding = Binding::bind(hub.clone(), knob.clone(), volume.clone(), adapter, BindOptions::default());
//! assert_eq!(knob.get(), 0.25);
//!
//! knob.set(0.75);
//! hub.step(|| {});
//! assert_eq!(volume.get(), 0.75);
//! binding.destroy();
//! ```
//!
//! Pushing a value one way never bounces it back the other way in the same
//! tick.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{Dispose, Error, FramePhase, Host, NodeId, Result, Signal, Stage};

/// Where a bound value lives.
pub trait Model<V> {
    /// `None` when the model has no value yet.
    fn get(&self) -> Option<V>;
    fn set(&self, value: V);
    /// Change notification. Models without one are polled every frame.
    fn subscribe(&self, _on_change: Rc<dyn Fn()>) -> Option<Dispose> {
        None
    }
}

/// Getter/setter closures.
pub struct Accessors<V> {
    get: Box<dyn Fn() -> Option<V>>,
    set: Box<dyn Fn(V)>,
}

impl<V> Accessors<V> {
    pub fn new(get: impl Fn() -> Option<V> + 'static, set: impl Fn(V) + 'static) -> Self {
        Self {
            get: Box::new(get),
            set: Box::new(set),
        }
    }
}

impl<V> Model<V> for Accessors<V> {
    fn get(&self) -> Option<V> {
        (self.get)()
    }
    fn set(&self, value: V) {
        (self.set)(value)
    }
}

impl<V: Clone + 'static> Model<V> for Signal<V> {
    fn get(&self) -> Option<V> {
        Some(Signal::get(self))
    }
    fn set(&self, value: V) {
        Signal::set(self, value)
    }
    fn subscribe(&self, on_change: Rc<dyn Fn()>) -> Option<Dispose> {
        let id = Signal::subscribe(self, move |_| on_change());
        let sig = self.clone();
        Some(Dispose::new(move || {
            sig.unsubscribe(id);
        }))
    }
}

/// A dotted path (`"audio.channels.0.gain"`) into a shared JSON document.
///
/// Numeric segments index arrays. `set` creates missing intermediate objects
/// and pads arrays with `null` up to the written index.
#[derive(Clone, Debug)]
pub struct PathModel {
    root: Rc<RefCell<Value>>,
    path: Vec<String>,
}

impl PathModel {
    pub fn new(root: Rc<RefCell<Value>>, path: &str) -> Result<Self> {
        let path: Vec<String> = path
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if path.is_empty() {
            return Err(Error::EmptyModelPath);
        }
        Ok(Self { root, path })
    }

    pub fn path(&self) -> String {
        self.path.join(".")
    }

    pub fn root(&self) -> &Rc<RefCell<Value>> {
        &self.root
    }

    /// Raw JSON at the path, if present.
    pub fn get_value(&self) -> Option<Value> {
        let root = self.root.borrow();
        let mut cur = &*root;
        for seg in &self.path {
            cur = match cur {
                Value::Object(m) => m.get(seg)?,
                Value::Array(a) => a.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur.clone())
    }

    pub fn set_value(&self, value: Value) {
        let mut root = self.root.borrow_mut();
        let (last, parents) = match self.path.split_last() {
            Some(split) => split,
            None => return,
        };
        let mut cur = &mut *root;
        for seg in parents {
            cur = child_slot(cur, seg);
            if !cur.is_object() && !cur.is_array() {
                *cur = Value::Object(Map::new());
            }
        }
        *child_slot(cur, last) = value;
    }

    pub fn try_get<V: DeserializeOwned>(&self) -> Result<Option<V>> {
        match self.get_value() {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v)
                .map(Some)
                .map_err(|e| self.conversion(e)),
        }
    }

    pub fn try_set<V: Serialize>(&self, value: &V) -> Result<()> {
        let v = serde_json::to_value(value).map_err(|e| self.conversion(e))?;
        self.set_value(v);
        Ok(())
    }

    fn conversion(&self, e: serde_json::Error) -> Error {
        Error::ModelConversion {
            path: self.path(),
            reason: e.to_string(),
        }
    }
}

/// Slot for `seg` under `v`, created when missing. Scalars are replaced by
/// an object.
fn child_slot<'a>(v: &'a mut Value, seg: &str) -> &'a mut Value {
    let index = seg.parse::<usize>().ok().filter(|_| v.is_array());
    if let (Some(i), Value::Array(a)) = (index, &mut *v) {
        if a.len() <= i {
            a.resize(i + 1, Value::Null);
        }
    } else if !v.is_object() {
        *v = Value::Object(Map::new());
    }
    match index {
        Some(i) => &mut v[i],
        None => &mut v[seg],
    }
}

impl<V: Serialize + DeserializeOwned> Model<V> for PathModel {
    fn get(&self) -> Option<V> {
        self.try_get().unwrap_or_else(|e| {
            log::debug!("{e}");
            None
        })
    }
    fn set(&self, value: V) {
        if let Err(e) = self.try_set(&value) {
            log::warn!("{e}");
        }
    }
}

/// A control whose value can be read, written and observed.
pub trait ValueControl {
    type Value: Clone + PartialEq + 'static;

    fn value(&self) -> Self::Value;
    fn set_value(&self, value: Self::Value);
    /// User-driven changes. Controls returning `None` are polled.
    fn on_value_changed(&self, _f: Rc<dyn Fn(&Self::Value)>) -> Option<Dispose> {
        None
    }
}

/// Reads and writes a control of type `C` as a `V`.
pub trait BindingAdapter<C, V> {
    fn read(&self, control: &C) -> V;
    fn write(&self, control: &C, value: V);
    fn subscribe(&self, _control: &C, _on_value: Rc<dyn Fn(V)>) -> Option<Dispose> {
        None
    }
}

/// Adapter for any [`ValueControl`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlAdapter;

impl<C: ValueControl> BindingAdapter<C, C::Value> for ControlAdapter {
    fn read(&self, control: &C) -> C::Value {
        control.value()
    }
    fn write(&self, control: &C, value: C::Value) {
        control.set_value(value)
    }
    fn subscribe(&self, control: &C, on_value: Rc<dyn Fn(C::Value)>) -> Option<Dispose> {
        control.on_value_changed(Rc::new(move |v: &C::Value| on_value(v.clone())))
    }
}

type SubscribeFn<C, V> = Box<dyn Fn(&C, Rc<dyn Fn(V)>) -> Dispose>;

/// Adapter built from closures.
pub struct FnAdapter<C, V> {
    read: Box<dyn Fn(&C) -> V>,
    write: Box<dyn Fn(&C, V)>,
    subscribe: Option<SubscribeFn<C, V>>,
}

impl<C, V> FnAdapter<C, V> {
    pub fn new(read: impl Fn(&C) -> V + 'static, write: impl Fn(&C, V) + 'static) -> Self {
        Self {
            read: Box::new(read),
            write: Box::new(write),
            subscribe: None,
        }
    }

    pub fn with_subscribe(
        mut self,
        subscribe: impl Fn(&C, Rc<dyn Fn(V)>) -> Dispose + 'static,
    ) -> Self {
        self.subscribe = Some(Box::new(subscribe));
        self
    }
}

impl<C, V> BindingAdapter<C, V> for FnAdapter<C, V> {
    fn read(&self, control: &C) -> V {
        (self.read)(control)
    }
    fn write(&self, control: &C, value: V) {
        (self.write)(control, value)
    }
    fn subscribe(&self, control: &C, on_value: Rc<dyn Fn(V)>) -> Option<Dispose> {
        self.subscribe.as_ref().map(|s| s(control, on_value))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BindMode {
    #[default]
    TwoWay,
    ModelToControl,
    ControlToModel,
}

impl BindMode {
    fn to_control(self) -> bool {
        matches!(self, BindMode::TwoWay | BindMode::ModelToControl)
    }
    fn to_model(self) -> bool {
        matches!(self, BindMode::TwoWay | BindMode::ControlToModel)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindOptions {
    pub mode: BindMode,
    /// Frame phase of the poll.
    pub phase: FramePhase,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            mode: BindMode::TwoWay,
            phase: FramePhase::PreUpdate,
        }
    }
}

impl BindOptions {
    pub fn mode(mut self, mode: BindMode) -> Self {
        self.mode = mode;
        self
    }
    pub fn phase(mut self, phase: FramePhase) -> Self {
        self.phase = phase;
        self
    }
}

struct Core {
    destroyed: Cell<bool>,
    cleanup: RefCell<Vec<Dispose>>,
}

impl Core {
    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        let cleanup = std::mem::take(&mut *self.cleanup.borrow_mut());
        for d in cleanup {
            d.run();
        }
        log::trace!("binding destroyed");
    }

    fn on_destroy(&self, d: Dispose) {
        if self.destroyed.get() {
            d.run();
        } else {
            self.cleanup.borrow_mut().push(d);
        }
    }
}

struct Link<C, V> {
    core: Rc<Core>,
    control: C,
    model: Box<dyn Model<V>>,
    adapter: Box<dyn BindingAdapter<C, V>>,
    mode: BindMode,
    last: RefCell<Option<V>>,
    syncing: Cell<bool>,
    control_subscribed: Cell<bool>,
}

/// Clears the syncing flag when the push ends.
struct SyncGuard<'a>(&'a Cell<bool>);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<C, V: Clone + PartialEq> Link<C, V> {
    fn live(&self) -> bool {
        !self.core.destroyed.get() && !self.syncing.get()
    }

    fn push_to_control(&self, v: V) {
        if !self.live() {
            return;
        }
        self.syncing.set(true);
        let _g = SyncGuard(&self.syncing);
        self.adapter.write(&self.control, v.clone());
        *self.last.borrow_mut() = Some(v);
    }

    fn push_to_model(&self, v: V) {
        if !self.live() {
            return;
        }
        self.syncing.set(true);
        let _g = SyncGuard(&self.syncing);
        self.model.set(v.clone());
        *self.last.borrow_mut() = Some(v);
    }

    fn differs(&self, v: &V) -> bool {
        self.last.borrow().as_ref() != Some(v)
    }

    fn model_changed(&self) {
        if !self.mode.to_control() || !self.live() {
            return;
        }
        if let Some(v) = self.model.get()
            && self.differs(&v)
        {
            self.push_to_control(v);
        }
    }

    fn control_changed(&self, v: V) {
        if self.mode.to_model() && self.differs(&v) {
            self.push_to_model(v);
        }
    }

    fn poll(&self) {
        self.model_changed();
        if self.mode.to_model() && !self.control_subscribed.get() && self.live() {
            let v = self.adapter.read(&self.control);
            self.control_changed(v);
        }
    }

    fn initial_sync(&self) {
        let model = if self.mode.to_control() {
            self.model.get()
        } else {
            None
        };
        match model {
            Some(v) => self.push_to_control(v),
            None if self.mode.to_model() => {
                let v = self.adapter.read(&self.control);
                self.push_to_model(v);
            }
            None => {}
        }
    }
}

/// A live control ↔ model link. Stays attached until `destroy()`, host
/// shutdown, or destruction of a node passed to [`Binding::destroy_with`].
#[derive(Clone)]
pub struct Binding {
    core: Rc<Core>,
    poll: Rc<dyn Fn()>,
}

impl Binding {
    pub fn bind<C, V, M, A>(
        host: Rc<dyn Host>,
        control: C,
        model: M,
        adapter: A,
        options: BindOptions,
    ) -> Binding
    where
        C: 'static,
        V: Clone + PartialEq + 'static,
        M: Model<V> + 'static,
        A: BindingAdapter<C, V> + 'static,
    {
        let core = Rc::new(Core {
            destroyed: Cell::new(false),
            cleanup: RefCell::new(Vec::new()),
        });
        let link = Rc::new(Link {
            core: core.clone(),
            control,
            model: Box::new(model),
            adapter: Box::new(adapter),
            mode: options.mode,
            last: RefCell::new(None),
            syncing: Cell::new(false),
            control_subscribed: Cell::new(false),
        });

        link.initial_sync();

        if options.mode.to_model() {
            let weak = Rc::downgrade(&link);
            let on_value: Rc<dyn Fn(V)> = Rc::new(move |v| {
                if let Some(l) = weak.upgrade() {
                    l.control_changed(v);
                }
            });
            if let Some(d) = link.adapter.subscribe(&link.control, on_value) {
                link.control_subscribed.set(true);
                core.on_destroy(d);
            }
        }
        if options.mode.to_control() {
            let weak = Rc::downgrade(&link);
            let on_change: Rc<dyn Fn()> = Rc::new(move || {
                if let Some(l) = weak.upgrade() {
                    l.model_changed();
                }
            });
            if let Some(d) = link.model.subscribe(on_change) {
                core.on_destroy(d);
            }
        }

        let poll: Rc<dyn Fn()> = {
            let link = link.clone();
            Rc::new(move || link.poll())
        };
        let frame = host.on_frame(options.phase, {
            let poll = poll.clone();
            Box::new(move || poll())
        });
        let shutdown = host.on_shutdown({
            let core = core.clone();
            Box::new(move || core.destroy())
        });
        core.on_destroy(Dispose::new(move || {
            host.off(frame);
            host.off(shutdown);
        }));

        Binding { core, poll }
    }

    /// Binds a [`ValueControl`] through [`ControlAdapter`].
    pub fn bind_control<C, M>(host: Rc<dyn Host>, control: C, model: M, options: BindOptions) -> Binding
    where
        C: ValueControl + 'static,
        M: Model<C::Value> + 'static,
    {
        Binding::bind(host, control, model, ControlAdapter, options)
    }

    /// Runs one poll now instead of waiting for the frame.
    pub fn sync(&self) -> &Self {
        if !self.core.destroyed.get() {
            (self.poll)();
        }
        self
    }

    /// Destroys the binding together with `node`.
    pub fn destroy_with(&self, stage: &Stage, node: NodeId) -> Result<&Self> {
        let weak = Rc::downgrade(&self.core);
        let hook = stage
            .on_destroy(node, move |_| {
                if let Some(c) = weak.upgrade() {
                    c.destroy();
                }
            })
            .ok_or(Error::NodeNotFound(node))?;
        let stage = stage.clone();
        self.core.on_destroy(Dispose::new(move || {
            stage.off_destroy(hook);
        }));
        Ok(self)
    }

    pub fn destroy(&self) {
        self.core.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.destroyed.get()
    }
}

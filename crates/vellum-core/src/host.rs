//! # Host interface
//!
//! Widgets never reach for a global event bus. Everything time- or
//! input-driven takes a `Rc<dyn Host>`:
//!
//! - `on_frame(phase, cb)`: once per frame, before (`PreUpdate`) or after
//!   (`PostUpdate`) the application's own update logic.
//! - `on_resize(cb)`: the logical viewport changed size.
//! - `on_wheel(cb)`: a normalized wheel event, carrying the objects currently
//!   under the pointer.
//! - `on_shutdown(cb)`: the host is going away; release everything.
//!
//! [`EventHub`] is the in-process implementation. A platform runner owns one,
//! forwards its window events into it and calls `begin_frame`/`end_frame`
//! around its update pass:
//!
//! ```rust
//! use std::rc::Rc;
//! use std::cell::Cell;
//! use vellum_core::*;
//!
//! let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
//! let frames = Rc::new(Cell::new(0));
//! let f = frames.clone();
//! hub.on_frame(FramePhase::PostUpdate, Box::new(move || f.set(f.get() + 1)));
//!
//! hub.step(|| { /* app update */ });
//! assert_eq!(frames.get(), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

use crate::stage::HitList;
use crate::{Insets, Size, Stage, Vec2};

new_key_type! {
    pub struct ListenerId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// Before the application's update logic runs this frame.
    PreUpdate,
    /// After the application's update logic ran this frame.
    PostUpdate,
}

/// Wheel input, already normalized by the platform layer.
///
/// `prevent_default` tells the platform not to apply its own behavior (page
/// scroll); `stop_propagation` keeps later listeners from seeing the event.
#[derive(Clone, Debug, Default)]
pub struct WheelEvent {
    /// Interactive nodes under the pointer, top-most first.
    pub over: HitList,
    pub position: Vec2,
    pub delta_x: f32,
    pub delta_y: f32,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl WheelEvent {
    pub fn new(over: HitList, position: Vec2, delta_x: f32, delta_y: f32) -> Self {
        Self {
            over,
            position,
            delta_x,
            delta_y,
            ..Default::default()
        }
    }

    /// Wheel event at `position`, with `over` filled by hit-testing.
    pub fn at(stage: &Stage, position: Vec2, delta_x: f32, delta_y: f32) -> Self {
        Self::new(stage.hit_test(position), position, delta_x, delta_y)
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

pub trait Host {
    fn on_frame(&self, phase: FramePhase, f: Box<dyn Fn()>) -> ListenerId;
    fn on_resize(&self, f: Box<dyn Fn(Size)>) -> ListenerId;
    fn on_wheel(&self, f: Box<dyn Fn(&WheelEvent)>) -> ListenerId;
    fn on_shutdown(&self, f: Box<dyn Fn()>) -> ListenerId;
    /// Unregisters any listener. Unknown ids are ignored.
    fn off(&self, id: ListenerId);

    /// Visible viewport in logical (layout) units.
    fn viewport_size(&self) -> Size;
    /// Size of the rendered surface in display pixels.
    fn render_size(&self) -> Size;
    /// Platform safe-area insets in display pixels, if the platform reports
    /// any.
    fn platform_insets(&self) -> Option<Insets>;
}

enum Listener {
    Frame(FramePhase, Rc<dyn Fn()>),
    Resize(Rc<dyn Fn(Size)>),
    Wheel(Rc<dyn Fn(&WheelEvent)>),
    Shutdown(Rc<dyn Fn()>),
}

struct Entry {
    seq: u64,
    listener: Listener,
}

pub struct EventHub {
    listeners: RefCell<SlotMap<ListenerId, Entry>>,
    next_seq: Cell<u64>,
    viewport: Cell<Size>,
    render_size: Cell<Size>,
    insets: Cell<Option<Insets>>,
    frame: Cell<u64>,
    shut_down: Cell<bool>,
}

impl EventHub {
    pub fn new(viewport: Size) -> Self {
        Self {
            listeners: RefCell::new(SlotMap::with_key()),
            next_seq: Cell::new(0),
            viewport: Cell::new(viewport),
            render_size: Cell::new(viewport),
            insets: Cell::new(None),
            frame: Cell::new(0),
            shut_down: Cell::new(false),
        }
    }

    fn register(&self, listener: Listener) -> ListenerId {
        if self.shut_down.get() {
            log::warn!("listener registered after shutdown; ignoring");
            return ListenerId::default();
        }
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.listeners.borrow_mut().insert(Entry { seq, listener })
    }

    /// Registered callbacks of one kind, in registration order.
    fn snapshot<T>(&self, pick: impl Fn(&Listener) -> Option<T>) -> Vec<(ListenerId, T)> {
        let ls = self.listeners.borrow();
        let mut v: Vec<(u64, ListenerId, T)> = ls
            .iter()
            .filter_map(|(id, e)| pick(&e.listener).map(|t| (e.seq, id, t)))
            .collect();
        v.sort_by_key(|(seq, _, _)| *seq);
        v.into_iter().map(|(_, id, t)| (id, t)).collect()
    }

    fn alive(&self, id: ListenerId) -> bool {
        self.listeners.borrow().contains_key(id)
    }

    fn emit_frame(&self, phase: FramePhase) {
        let cbs = self.snapshot(|l| match l {
            Listener::Frame(p, f) if *p == phase => Some(f.clone()),
            _ => None,
        });
        for (id, f) in cbs {
            if self.alive(id) {
                f();
            }
        }
    }

    /// Starts a frame: emits `PreUpdate`.
    pub fn begin_frame(&self) {
        self.frame.set(self.frame.get() + 1);
        log::trace!("frame {} begin", self.frame.get());
        self.emit_frame(FramePhase::PreUpdate);
    }

    /// Ends a frame: emits `PostUpdate`.
    pub fn end_frame(&self) {
        self.emit_frame(FramePhase::PostUpdate);
    }

    /// `begin_frame`, the application's update, `end_frame`.
    pub fn step(&self, update: impl FnOnce()) {
        self.begin_frame();
        update();
        self.end_frame();
    }

    pub fn frame_count(&self) -> u64 {
        self.frame.get()
    }

    /// Sets the logical viewport size and notifies resize listeners.
    pub fn resize(&self, size: Size) {
        self.viewport.set(size);
        let cbs = self.snapshot(|l| match l {
            Listener::Resize(f) => Some(f.clone()),
            _ => None,
        });
        for (id, f) in cbs {
            if self.alive(id) {
                f(size);
            }
        }
    }

    pub fn set_render_size(&self, size: Size) {
        self.render_size.set(size);
    }

    pub fn set_platform_insets(&self, insets: Option<Insets>) {
        self.insets.set(insets);
    }

    /// Delivers a wheel event, most recently registered listener first, until
    /// one stops propagation.
    pub fn dispatch_wheel(&self, event: &WheelEvent) {
        let mut cbs = self.snapshot(|l| match l {
            Listener::Wheel(f) => Some(f.clone()),
            _ => None,
        });
        cbs.reverse();
        for (id, f) in cbs {
            if event.propagation_stopped() {
                break;
            }
            if self.alive(id) {
                f(event);
            }
        }
    }

    /// Fires shutdown listeners once, then drops every listener.
    pub fn shutdown(&self) {
        if self.shut_down.replace(true) {
            return;
        }
        log::debug!("host shutdown");
        let cbs = self.snapshot(|l| match l {
            Listener::Shutdown(f) => Some(f.clone()),
            _ => None,
        });
        for (id, f) in cbs {
            if self.alive(id) {
                f();
            }
        }
        self.listeners.borrow_mut().clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.get()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl Host for EventHub {
    fn on_frame(&self, phase: FramePhase, f: Box<dyn Fn()>) -> ListenerId {
        self.register(Listener::Frame(phase, Rc::from(f)))
    }
    fn on_resize(&self, f: Box<dyn Fn(Size)>) -> ListenerId {
        self.register(Listener::Resize(Rc::from(f)))
    }
    fn on_wheel(&self, f: Box<dyn Fn(&WheelEvent)>) -> ListenerId {
        self.register(Listener::Wheel(Rc::from(f)))
    }
    fn on_shutdown(&self, f: Box<dyn Fn()>) -> ListenerId {
        self.register(Listener::Shutdown(Rc::from(f)))
    }
    fn off(&self, id: ListenerId) {
        self.listeners.borrow_mut().remove(id);
    }
    fn viewport_size(&self) -> Size {
        self.viewport.get()
    }
    fn render_size(&self) -> Size {
        self.render_size.get()
    }
    fn platform_insets(&self) -> Option<Insets> {
        self.insets.get()
    }
}

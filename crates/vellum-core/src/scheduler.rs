//! # Layout scheduler
//!
//! Containers re-position their children in `layout()`. Calling that on every
//! mutation wastes work when several mutations land in the same frame, so
//! callers mark targets dirty instead and the scheduler lays each one out
//! exactly once, at one point of the host frame:
//!
//! ```rust
//! use std::rc::Rc;
//! use vellum_core::*;
//!
//! # struct Panel(Rc<std::cell::Cell<u32>>);
//! # impl Clone for Panel { fn clone(&self) -> Self { Panel(self.0.clone()) } }
//! # impl LayoutTarget for Panel {
//! #     fn layout(&self) { self.0.set(self.0.get() + 1) }
//! #     fn layout_id(&self) -> LayoutId { LayoutId::of(&self.0) }
//! # }
//! let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
//! let scheduler = LayoutScheduler::new(hub.clone(), FramePhase::PostUpdate);
//!
//! let panel = Panel(Rc::new(std::cell::Cell::new(0)));
//! scheduler.mark_dirty(&panel);
//! scheduler.mark_dirty(&panel);
//! hub.step(|| {});
//! assert_eq!(panel.0.get(), 1);
//! ```
//!
//! The pending set is taken and cleared *before* the batch runs. A target
//! that marks something dirty from inside its own `layout()` therefore lands
//! in the next frame's batch instead of looping the current one.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::{FramePhase, Host, ListenerId};

/// Identity of a layout target. Handles that share one allocation share one
/// id, so clones of the same container dedupe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutId(usize);

impl LayoutId {
    pub fn of<T: ?Sized>(rc: &Rc<T>) -> Self {
        LayoutId(Rc::as_ptr(rc) as *const () as usize)
    }
}

pub trait LayoutTarget {
    fn layout(&self);
    fn layout_id(&self) -> LayoutId;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub laid_out: usize,
    /// Targets whose `layout()` panicked. They were logged and skipped.
    pub failed: usize,
}

struct SchedulerInner {
    host: Rc<dyn Host>,
    phase: FramePhase,
    dirty: RefCell<Vec<(LayoutId, Rc<dyn LayoutTarget>)>>,
    flushing: Cell<bool>,
    destroyed: Cell<bool>,
    frame_listener: Cell<Option<ListenerId>>,
    shutdown_listener: Cell<Option<ListenerId>>,
}

/// Resets the flushing flag however the batch ends.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}

impl SchedulerInner {
    fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();
        if self.destroyed.get() {
            return report;
        }
        if self.flushing.get() {
            log::trace!("layout flush requested mid-flush; ignored");
            return report;
        }
        let batch = std::mem::take(&mut *self.dirty.borrow_mut());
        if batch.is_empty() {
            return report;
        }
        self.flushing.set(true);
        let _guard = FlushGuard(&self.flushing);
        log::trace!("layout flush: {} targets", batch.len());
        for (_, target) in batch {
            if self.destroyed.get() {
                log::debug!("layout scheduler destroyed mid-flush; dropping rest of batch");
                break;
            }
            match catch_unwind(AssertUnwindSafe(|| target.layout())) {
                Ok(()) => report.laid_out += 1,
                Err(payload) => {
                    report.failed += 1;
                    log::error!("layout target panicked: {}", panic_message(payload.as_ref()));
                }
            }
        }
        report
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        for l in [&self.frame_listener, &self.shutdown_listener] {
            if let Some(id) = l.take() {
                self.host.off(id);
            }
        }
        self.dirty.borrow_mut().clear();
        log::debug!("layout scheduler destroyed");
    }
}

/// Frame-batched `layout()` calls. Cloning shares the same pending set.
///
/// Stays registered with the host until [`LayoutScheduler::destroy`] or host
/// shutdown; dropping every handle does not detach it.
#[derive(Clone)]
pub struct LayoutScheduler {
    inner: Rc<SchedulerInner>,
}

impl LayoutScheduler {
    /// Flushes once per frame at `phase`.
    pub fn new(host: Rc<dyn Host>, phase: FramePhase) -> Self {
        let inner = Rc::new(SchedulerInner {
            host: host.clone(),
            phase,
            dirty: RefCell::new(Vec::new()),
            flushing: Cell::new(false),
            destroyed: Cell::new(false),
            frame_listener: Cell::new(None),
            shutdown_listener: Cell::new(None),
        });
        // The listeners keep the scheduler alive until it is destroyed or
        // the host shuts down.
        let frame = host.on_frame(phase, {
            let inner = inner.clone();
            Box::new(move || {
                let pending = !inner.dirty.borrow().is_empty();
                if pending && !inner.flushing.get() {
                    inner.flush();
                }
            })
        });
        let shutdown = host.on_shutdown({
            let inner = inner.clone();
            Box::new(move || inner.destroy())
        });
        inner.frame_listener.set(Some(frame));
        inner.shutdown_listener.set(Some(shutdown));
        Self { inner }
    }

    pub fn phase(&self) -> FramePhase {
        self.inner.phase
    }

    /// Queues `target` for the next flush. Marking twice is a no-op.
    pub fn mark_dirty<T: LayoutTarget + Clone + 'static>(&self, target: &T) -> &Self {
        if self.inner.destroyed.get() {
            return self;
        }
        let id = target.layout_id();
        let mut dirty = self.inner.dirty.borrow_mut();
        if !dirty.iter().any(|(d, _)| *d == id) {
            let t: Rc<dyn LayoutTarget> = Rc::new(target.clone());
            dirty.push((id, t));
        }
        self
    }

    pub fn mark_dirty_many<'a, T: LayoutTarget + Clone + 'static>(
        &self,
        targets: impl IntoIterator<Item = &'a T>,
    ) -> &Self {
        for t in targets {
            self.mark_dirty(t);
        }
        self
    }

    /// Drops `target` from the pending set without laying it out.
    pub fn remove<T: LayoutTarget>(&self, target: &T) -> bool {
        let id = target.layout_id();
        let mut dirty = self.inner.dirty.borrow_mut();
        let before = dirty.len();
        dirty.retain(|(d, _)| *d != id);
        dirty.len() != before
    }

    pub fn is_dirty<T: LayoutTarget>(&self, target: &T) -> bool {
        let id = target.layout_id();
        self.inner.dirty.borrow().iter().any(|(d, _)| *d == id)
    }

    /// Drops every pending target without laying any out.
    pub fn clear(&self) {
        self.inner.dirty.borrow_mut().clear();
    }

    /// Lays out the pending set now. Ignored when called from inside a
    /// running flush.
    pub fn flush(&self) -> FlushReport {
        self.inner.flush()
    }

    pub fn dirty_count(&self) -> usize {
        self.inner.dirty.borrow().len()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    /// Detaches from the host and drops pending targets. Idempotent.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

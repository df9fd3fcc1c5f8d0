//! # Viewport anchoring
//!
//! Pins a node to one of nine named points of the visible viewport, inside
//! the platform safe area (notches, home indicators), and keeps it there when
//! the host resizes.
//!
//! ```rust
//! use std::rc::Rc;
//! use vellum_core::*;
//!
//! let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
//! let stage = Stage::new();
//! let hud = stage.spawn(Node::new().display_size(100.0, 50.0));
//!
//! let anchor = anchor_to_viewport(
//!     hub.clone(),
//!     &stage,
//!     hud,
//!     AnchorOptions::new(AnchorPoint::TopRight).offset(-10.0, 10.0),
//! )
//! .unwrap();
//! assert_eq!(stage.position(hud), Some(Vec2::new(740.0, 35.0)));
//!
//! hub.resize(Size::new(1024.0, 768.0));
//! assert_eq!(stage.position(hud), Some(Vec2::new(964.0, 35.0)));
//! anchor.destroy();
//! ```
//!
//! Size changes of the target are not observed; call `update()` after
//! resizing it.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::{Error, Host, HookId, Insets, ListenerId, NodeId, Result, Size, Stage, Vec2};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AnchorPoint {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    #[default]
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

#[derive(Clone, Copy)]
enum Edge {
    Start,
    Middle,
    End,
}

impl AnchorPoint {
    pub const ALL: [AnchorPoint; 9] = [
        AnchorPoint::TopLeft,
        AnchorPoint::TopCenter,
        AnchorPoint::TopRight,
        AnchorPoint::CenterLeft,
        AnchorPoint::Center,
        AnchorPoint::CenterRight,
        AnchorPoint::BottomLeft,
        AnchorPoint::BottomCenter,
        AnchorPoint::BottomRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnchorPoint::TopLeft => "top-left",
            AnchorPoint::TopCenter => "top-center",
            AnchorPoint::TopRight => "top-right",
            AnchorPoint::CenterLeft => "center-left",
            AnchorPoint::Center => "center",
            AnchorPoint::CenterRight => "center-right",
            AnchorPoint::BottomLeft => "bottom-left",
            AnchorPoint::BottomCenter => "bottom-center",
            AnchorPoint::BottomRight => "bottom-right",
        }
    }

    /// (horizontal, vertical)
    fn edges(self) -> (Edge, Edge) {
        use Edge::*;
        match self {
            AnchorPoint::TopLeft => (Start, Start),
            AnchorPoint::TopCenter => (Middle, Start),
            AnchorPoint::TopRight => (End, Start),
            AnchorPoint::CenterLeft => (Start, Middle),
            AnchorPoint::Center => (Middle, Middle),
            AnchorPoint::CenterRight => (End, Middle),
            AnchorPoint::BottomLeft => (Start, End),
            AnchorPoint::BottomCenter => (Middle, End),
            AnchorPoint::BottomRight => (End, End),
        }
    }
}

impl fmt::Display for AnchorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        AnchorPoint::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or(Error::UnknownAnchor(s))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafeAreaOptions {
    /// Include the platform-reported insets.
    pub use_platform: bool,
    /// Added on top, in logical units.
    pub extra: Insets,
}

impl Default for SafeAreaOptions {
    fn default() -> Self {
        Self {
            use_platform: true,
            extra: Insets::ZERO,
        }
    }
}

/// Resolves safe-area insets in the host's logical units.
///
/// Platform insets come in display pixels and are scaled by
/// `logical / rendered` per axis; a degenerate rendered surface scales 1:1.
/// Extra insets are added afterwards and every edge is clamped to `>= 0`.
pub fn safe_area_insets(host: &dyn Host, options: &SafeAreaOptions) -> Insets {
    let platform = if options.use_platform {
        host.platform_insets().unwrap_or_default()
    } else {
        Insets::ZERO
    };
    let logical = host.viewport_size();
    let rendered = host.render_size();
    let ratio = |l: f32, r: f32| {
        if r > 0.0 && l > 0.0 && (l / r).is_finite() {
            l / r
        } else {
            1.0
        }
    };
    let sx = ratio(logical.width, rendered.width);
    let sy = ratio(logical.height, rendered.height);
    let scaled = Insets::new(
        platform.top * sy,
        platform.right * sx,
        platform.bottom * sy,
        platform.left * sx,
    );
    (scaled + options.extra).max_zero()
}

/// Center position for a `target`-sized box anchored inside `viewport`
/// shrunk by `insets`.
pub fn anchored_position(
    anchor: AnchorPoint,
    viewport: Size,
    insets: Insets,
    target: Size,
    offset: Vec2,
) -> Vec2 {
    let left = insets.left;
    let top = insets.top;
    let right = viewport.width - insets.right;
    let bottom = viewport.height - insets.bottom;
    let half = target.half();
    let (h, v) = anchor.edges();
    let x = match h {
        Edge::Start => left + half.x,
        Edge::Middle => (left + right) * 0.5,
        Edge::End => right - half.x,
    };
    let y = match v {
        Edge::Start => top + half.y,
        Edge::Middle => (top + bottom) * 0.5,
        Edge::End => bottom - half.y,
    };
    Vec2::new(x + offset.x, y + offset.y)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorOptions {
    pub anchor: AnchorPoint,
    pub offset: Vec2,
    pub use_safe_area: bool,
    pub safe_area: SafeAreaOptions,
    /// Re-anchor on every host resize.
    pub auto_resize: bool,
}

impl Default for AnchorOptions {
    fn default() -> Self {
        Self {
            anchor: AnchorPoint::Center,
            offset: Vec2::ZERO,
            use_safe_area: true,
            safe_area: SafeAreaOptions::default(),
            auto_resize: true,
        }
    }
}

impl AnchorOptions {
    pub fn new(anchor: AnchorPoint) -> Self {
        Self {
            anchor,
            ..Default::default()
        }
    }
    pub fn offset(mut self, x: f32, y: f32) -> Self {
        self.offset = Vec2::new(x, y);
        self
    }
    pub fn use_safe_area(mut self, on: bool) -> Self {
        self.use_safe_area = on;
        self
    }
    pub fn extra_insets(mut self, extra: Insets) -> Self {
        self.safe_area.extra = extra;
        self
    }
    pub fn auto_resize(mut self, on: bool) -> Self {
        self.auto_resize = on;
        self
    }
}

struct AnchorInner {
    host: Rc<dyn Host>,
    stage: Stage,
    target: NodeId,
    options: Cell<AnchorOptions>,
    destroyed: Cell<bool>,
    resize_listener: Cell<Option<ListenerId>>,
    shutdown_listener: Cell<Option<ListenerId>>,
    destroy_hook: Cell<Option<HookId>>,
}

impl AnchorInner {
    fn insets(&self) -> Insets {
        let o = self.options.get();
        if o.use_safe_area {
            safe_area_insets(self.host.as_ref(), &o.safe_area)
        } else {
            Insets::ZERO
        }
    }

    fn update(&self) {
        if self.destroyed.get() {
            return;
        }
        if !self.stage.contains(self.target) {
            self.destroy();
            return;
        }
        let o = self.options.get();
        let p = anchored_position(
            o.anchor,
            self.host.viewport_size(),
            self.insets(),
            self.stage.measure(self.target),
            o.offset,
        );
        self.stage.set_position(self.target, p.x, p.y);
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        for l in [&self.resize_listener, &self.shutdown_listener] {
            if let Some(id) = l.take() {
                self.host.off(id);
            }
        }
        if let Some(hook) = self.destroy_hook.take() {
            self.stage.off_destroy(hook);
        }
        log::trace!("anchor for {:?} released", self.target);
    }
}

/// Live anchor binding. It stays attached (and alive) until `destroy()`, the
/// target node's destruction, or host shutdown.
#[derive(Clone)]
pub struct AnchorHandle {
    inner: Rc<AnchorInner>,
}

/// Places `target` now and, with `auto_resize`, on every host resize.
pub fn anchor_to_viewport(
    host: Rc<dyn Host>,
    stage: &Stage,
    target: NodeId,
    options: AnchorOptions,
) -> Result<AnchorHandle> {
    if !stage.contains(target) {
        return Err(Error::NodeNotFound(target));
    }
    let inner = Rc::new(AnchorInner {
        host: host.clone(),
        stage: stage.clone(),
        target,
        options: Cell::new(options),
        destroyed: Cell::new(false),
        resize_listener: Cell::new(None),
        shutdown_listener: Cell::new(None),
        destroy_hook: Cell::new(None),
    });
    if options.auto_resize {
        let i = inner.clone();
        let id = host.on_resize(Box::new(move |_| i.update()));
        inner.resize_listener.set(Some(id));
    }
    let i = inner.clone();
    let id = host.on_shutdown(Box::new(move || i.destroy()));
    inner.shutdown_listener.set(Some(id));

    let weak = Rc::downgrade(&inner);
    let hook = stage.on_destroy(target, move |_| {
        if let Some(i) = weak.upgrade() {
            i.destroy();
        }
    });
    inner.destroy_hook.set(hook);

    inner.update();
    Ok(AnchorHandle { inner })
}

impl AnchorHandle {
    /// Recomputes the position (e.g. after the target changed size).
    pub fn update(&self) -> &Self {
        self.inner.update();
        self
    }

    pub fn set_anchor(&self, anchor: AnchorPoint) -> &Self {
        let mut o = self.inner.options.get();
        o.anchor = anchor;
        self.inner.options.set(o);
        self.update()
    }

    pub fn set_offset(&self, x: f32, y: f32) -> &Self {
        let mut o = self.inner.options.get();
        o.offset = Vec2::new(x, y);
        self.inner.options.set(o);
        self.update()
    }

    pub fn options(&self) -> AnchorOptions {
        self.inner.options.get()
    }

    pub fn target(&self) -> NodeId {
        self.inner.target
    }

    /// Insets currently applied (zero when safe area is off).
    pub fn safe_area_insets(&self) -> Insets {
        self.inner.insets()
    }

    pub fn destroy(&self) {
        self.inner.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

//! # Scroll viewport
//!
//! A fixed-size window onto a taller list of arbitrary nodes. The viewport
//! owns four stage nodes under one root:
//!
//! - a mask whose clip is the inner (padded) rect, holding the content group,
//! - an invisible, interactive hit-zone covering the inner rect,
//! - a scrollbar node drawing the track and thumb.
//!
//! Content children are positioned by the caller, with x measured from the
//! inner left edge and y in any origin: `layout()` scans their vertical
//! extents and shifts the content group so the top-most item sits at the
//! inner top, minus the scroll offset.
//!
//! ```rust
//! use std::rc::Rc;
//! use vellum_core::*;
//! use vellum_ui::*;
//!
//! let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
//! let stage = Stage::new();
//! let list = ScrollViewport(hub.clone(), &stage, 200.0, 220.0);
//! for i in 0..10 {
//!     let row = stage.spawn(Node::new().at(100.0, 20.0 + i as f32 * 50.0).display_size(200.0, 40.0));
//!     list.add_item(row).unwrap();
//! }
//!
//! assert_eq!(list.content_height(), 490.0);
//! assert_eq!(list.max_scroll_y(), 270.0);
//! list.scroll_to_bottom();
//! assert_eq!(list.scroll_y(), 270.0);
//! ```
//!
//! Wheel events reach the viewport through [`Host::on_wheel`]. It reacts
//! when its hit-zone, or anything inside its content group, is under the
//! pointer, and it only consumes the event when the scroll offset actually
//! moved, so a nested list that is already at its end lets the enclosing
//! one scroll. An enclosing viewport also stands aside while a nested one
//! under the pointer can still move, whichever was built first.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use vellum_core::*;

/// Visual and input parameters of a [`ScrollViewport`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollStyle {
    pub size: Size,
    pub padding: Insets,
    /// Distance scrolled per wheel notch.
    pub wheel_step: f32,
    pub wheel_enabled: bool,
    pub scrollbar_visible: bool,
    pub scrollbar_width: f32,
    /// Gap between the scrollbar and the inner right and vertical edges.
    pub scrollbar_margin: f32,
    pub min_thumb_height: f32,
    pub track_color: Color,
    pub thumb_color: Color,
    pub background: Option<Color>,
    pub radius: f32,
}

impl Default for ScrollStyle {
    fn default() -> Self {
        let th = theme();
        Self {
            size: Size::ZERO,
            padding: Insets::ZERO,
            wheel_step: 40.0,
            wheel_enabled: true,
            scrollbar_visible: true,
            scrollbar_width: 6.0,
            scrollbar_margin: 2.0,
            min_thumb_height: 24.0,
            track_color: th.scrollbar_track,
            thumb_color: th.scrollbar_thumb,
            background: None,
            radius: 0.0,
        }
    }
}

impl ScrollStyle {
    /// Visible rect in root-local coordinates.
    pub fn inner_rect(&self) -> Rect {
        Rect::from_center(Vec2::ZERO, self.size).inset(self.padding)
    }
}

/// Payload of scroll notifications.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollChanged {
    pub scroll_y: f32,
    pub max_scroll_y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollbarGeometry {
    pub track: Rect,
    pub thumb: Rect,
}

/// Top and height of the vertical extent covered by `items`.
///
/// Each item spans `y ± height / 2`, height resolved through the stage's
/// measure order. Items with a non-finite extent are skipped; no usable item
/// gives `(0, 0)`.
pub fn content_extent(stage: &Stage, items: &[NodeId]) -> (f32, f32) {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for &id in items {
        let Some(p) = stage.position(id) else {
            continue;
        };
        let half = stage.measure(id).height * 0.5;
        let (top, bottom) = (p.y - half, p.y + half);
        if !top.is_finite() || !bottom.is_finite() {
            continue;
        }
        lo = lo.min(top);
        hi = hi.max(bottom);
    }
    if lo.is_finite() && hi.is_finite() {
        (lo, hi - lo)
    } else {
        (0.0, 0.0)
    }
}

pub fn max_scroll(content_height: f32, viewport_height: f32) -> f32 {
    (content_height - viewport_height).max(0.0)
}

/// Track and thumb for `inner`, or `None` when there is nothing to scroll.
pub fn scrollbar_geometry(
    inner: Rect,
    content_height: f32,
    scroll_y: f32,
    style: &ScrollStyle,
) -> Option<ScrollbarGeometry> {
    let vh = inner.h;
    let max = max_scroll(content_height, vh);
    if max <= 0.0 || vh <= 0.0 {
        return None;
    }
    let thumb_h = (vh * (vh / content_height)).max(style.min_thumb_height).min(vh);
    let thumb_y = inner.y + (scroll_y / max).clamp(0.0, 1.0) * (vh - thumb_h);
    let x = inner.right() - style.scrollbar_margin - style.scrollbar_width;
    Some(ScrollbarGeometry {
        track: Rect::new(x, inner.y, style.scrollbar_width, vh),
        thumb: Rect::new(x, thumb_y, style.scrollbar_width, thumb_h),
    })
}

thread_local! {
    /// Every viewport built on this thread, for nested wheel routing.
    static VIEWPORTS: RefCell<Vec<Weak<ScrollInner>>> = const { RefCell::new(Vec::new()) };
}

struct Nodes {
    root: NodeId,
    hit_zone: NodeId,
    mask: NodeId,
    content: NodeId,
    scrollbar: NodeId,
}

struct ScrollInner {
    host: Rc<dyn Host>,
    stage: Stage,
    nodes: Nodes,
    style: Cell<ScrollStyle>,
    items: RefCell<Vec<NodeId>>,
    scroll_y: Cell<f32>,
    content_min_y: Cell<f32>,
    content_height: Cell<f32>,
    changed: Emitter<ScrollChanged>,
    destroyed: Cell<bool>,
    wheel_listener: Cell<Option<ListenerId>>,
    shutdown_listener: Cell<Option<ListenerId>>,
    destroy_hook: Cell<Option<HookId>>,
}

impl ScrollInner {
    fn max_scroll_y(&self) -> f32 {
        max_scroll(self.content_height.get(), self.style.get().inner_rect().h)
    }

    fn place_content(&self) {
        let inner = self.style.get().inner_rect();
        let y = inner.y - self.content_min_y.get() - self.scroll_y.get();
        self.stage.set_position(self.nodes.content, inner.x, y);
    }

    fn redraw_scrollbar(&self) {
        let style = self.style.get();
        let geo = if style.scrollbar_visible {
            scrollbar_geometry(
                style.inner_rect(),
                self.content_height.get(),
                self.scroll_y.get(),
                &style,
            )
        } else {
            None
        };
        let g = match geo {
            Some(g) => {
                let r = style.scrollbar_width * 0.5;
                vec![
                    SceneNode::Rect {
                        rect: g.track,
                        color: style.track_color,
                        radius: r,
                    },
                    SceneNode::Rect {
                        rect: g.thumb,
                        color: style.thumb_color,
                        radius: r,
                    },
                ]
            }
            None => Vec::new(),
        };
        self.stage.set_graphics(self.nodes.scrollbar, g);
    }

    fn emit(&self) {
        self.changed.emit(&ScrollChanged {
            scroll_y: self.scroll_y.get(),
            max_scroll_y: self.max_scroll_y(),
        });
    }

    fn layout(&self) {
        if self.destroyed.get() {
            return;
        }
        let style = self.style.get();
        let inner = style.inner_rect();
        let st = &self.stage;
        let n = &self.nodes;

        st.update(n.root, |node| {
            node.display_size = Some(style.size);
            node.graphics = style
                .background
                .map(|color| SceneNode::Rect {
                    rect: Rect::from_center(Vec2::ZERO, style.size),
                    color,
                    radius: style.radius,
                })
                .into_iter()
                .collect();
        });
        st.set_clip(n.mask, Some(inner));
        st.update(n.hit_zone, |node| {
            node.position = inner.center();
            node.display_size = Some(inner.size());
        });

        let items = {
            let mut items = self.items.borrow_mut();
            items.retain(|&c| st.parent(c) == Some(n.content));
            items.clone()
        };
        let (min_y, height) = content_extent(st, &items);
        self.content_min_y.set(min_y);
        self.content_height.set(height);

        let before = self.scroll_y.get();
        let clamped = before.clamp(0.0, self.max_scroll_y());
        self.scroll_y.set(clamped);
        self.place_content();
        self.redraw_scrollbar();
        if clamped != before {
            self.emit();
        }
    }

    fn set_scroll_y(&self, value: f32) -> bool {
        if self.destroyed.get() || value.is_nan() {
            return false;
        }
        let v = value.clamp(0.0, self.max_scroll_y());
        if v == self.scroll_y.get() {
            return false;
        }
        self.scroll_y.set(v);
        self.place_content();
        self.redraw_scrollbar();
        self.emit();
        true
    }

    fn owns(&self, id: NodeId) -> bool {
        id == self.nodes.hit_zone || self.stage.is_descendant_of(id, self.nodes.content)
    }

    /// Whether the wheel can move the offset toward `dir` (sign of delta).
    fn can_scroll(&self, dir: f32) -> bool {
        if self.destroyed.get() || !self.style.get().wheel_enabled {
            return false;
        }
        let y = self.scroll_y.get();
        if dir > 0.0 { y < self.max_scroll_y() } else { y > 0.0 }
    }

    /// A viewport inside this one's content is under the pointer and can
    /// still move, so the event is its to take.
    fn nested_takes(&self, e: &WheelEvent) -> bool {
        let live: Vec<Rc<ScrollInner>> =
            VIEWPORTS.with_borrow(|v| v.iter().filter_map(Weak::upgrade).collect());
        live.iter().any(|v| {
            !std::ptr::eq(v.as_ref(), self)
                && v.stage.ptr_eq(&self.stage)
                && self.stage.is_descendant_of(v.nodes.root, self.nodes.content)
                && e.over.iter().any(|&id| v.owns(id))
                && v.can_scroll(e.delta_y)
        })
    }

    fn on_wheel(&self, e: &WheelEvent) {
        let style = self.style.get();
        if self.destroyed.get() || !style.wheel_enabled || e.delta_y == 0.0 {
            return;
        }
        if !e.over.iter().any(|&id| self.owns(id)) || self.nested_takes(e) {
            return;
        }
        let step = e.delta_y.signum() * style.wheel_step;
        if self.set_scroll_y(self.scroll_y.get() + step) {
            e.prevent_default();
            e.stop_propagation();
        }
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        for l in [&self.wheel_listener, &self.shutdown_listener] {
            if let Some(id) = l.take() {
                self.host.off(id);
            }
        }
        if let Some(hook) = self.destroy_hook.take() {
            self.stage.off_destroy(hook);
        }
        self.stage.set_clip(self.nodes.mask, None);
        self.stage.destroy(self.nodes.root);
        self.items.borrow_mut().clear();
        self.changed.clear();
        log::debug!("scroll viewport {:?} destroyed", self.nodes.root);
    }
}

/// Clipped, wheel-scrollable list. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ScrollViewport {
    inner: Rc<ScrollInner>,
}

/// Scroll viewport of `width × height` with the default style.
pub fn ScrollViewport(host: Rc<dyn Host>, stage: &Stage, width: f32, height: f32) -> ScrollViewport {
    ScrollViewport::with_style(
        host,
        stage,
        ScrollStyle {
            size: Size::new(width, height),
            ..ScrollStyle::default()
        },
    )
}

impl ScrollViewport {
    pub fn with_style(host: Rc<dyn Host>, stage: &Stage, style: ScrollStyle) -> ScrollViewport {
        let root = stage.spawn(Node::new().named("scroll"));
        // paint order: hit-zone, then clipped content, then scrollbar
        let hit_zone = stage.spawn_in(root, Node::new().named("scroll.hit-zone").interactive());
        let mask = stage.spawn_in(root, Node::new().named("scroll.mask"));
        let content = stage.spawn_in(mask, Node::new().named("scroll.content"));
        let scrollbar = stage.spawn_in(root, Node::new().named("scroll.bar"));

        let inner = Rc::new(ScrollInner {
            host: host.clone(),
            stage: stage.clone(),
            nodes: Nodes {
                root,
                hit_zone,
                mask,
                content,
                scrollbar,
            },
            style: Cell::new(style),
            items: RefCell::new(Vec::new()),
            scroll_y: Cell::new(0.0),
            content_min_y: Cell::new(0.0),
            content_height: Cell::new(0.0),
            changed: Emitter::new(),
            destroyed: Cell::new(false),
            wheel_listener: Cell::new(None),
            shutdown_listener: Cell::new(None),
            destroy_hook: Cell::new(None),
        });

        let i = inner.clone();
        let id = host.on_wheel(Box::new(move |e| i.on_wheel(e)));
        inner.wheel_listener.set(Some(id));
        let i = inner.clone();
        let id = host.on_shutdown(Box::new(move || i.destroy()));
        inner.shutdown_listener.set(Some(id));

        let weak = Rc::downgrade(&inner);
        let hook = stage.on_destroy(root, move |_| {
            if let Some(i) = weak.upgrade() {
                i.destroy();
            }
        });
        inner.destroy_hook.set(hook);
        VIEWPORTS.with_borrow_mut(|v| {
            v.retain(|w| w.strong_count() > 0);
            v.push(Rc::downgrade(&inner));
        });

        inner.layout();
        ScrollViewport { inner }
    }

    /// The root node; position it like any other widget.
    pub fn node(&self) -> NodeId {
        self.inner.nodes.root
    }

    /// Group holding the items.
    pub fn content(&self) -> NodeId {
        self.inner.nodes.content
    }

    pub fn hit_zone(&self) -> NodeId {
        self.inner.nodes.hit_zone
    }

    pub fn items(&self) -> Vec<NodeId> {
        self.inner.items.borrow().clone()
    }

    pub fn set_position(&self, x: f32, y: f32) -> &Self {
        self.inner.stage.set_position(self.node(), x, y);
        self
    }

    pub fn add_item(&self, child: NodeId) -> Result<&Self> {
        self.attach(child)?;
        self.layout();
        Ok(self)
    }

    pub fn add_items(&self, children: impl IntoIterator<Item = NodeId>) -> Result<&Self> {
        for c in children {
            self.attach(c)?;
        }
        self.layout();
        Ok(self)
    }

    fn attach(&self, child: NodeId) -> Result<()> {
        self.inner.stage.add_child(self.inner.nodes.content, child)?;
        let mut items = self.inner.items.borrow_mut();
        items.retain(|&c| c != child);
        items.push(child);
        Ok(())
    }

    /// Removes `child`; `destroy` tears it down, otherwise it is detached.
    pub fn remove_item(&self, child: NodeId, destroy: bool) -> &Self {
        let found = {
            let mut items = self.inner.items.borrow_mut();
            let before = items.len();
            items.retain(|&c| c != child);
            items.len() != before
        };
        if found {
            let st = &self.inner.stage;
            if destroy {
                st.destroy(child);
            } else {
                st.detach(child);
            }
            self.layout();
        }
        self
    }

    pub fn remove_all_items(&self, destroy: bool) -> &Self {
        let items = std::mem::take(&mut *self.inner.items.borrow_mut());
        let st = &self.inner.stage;
        for c in items {
            if destroy {
                st.destroy(c);
            } else {
                st.detach(c);
            }
        }
        self.layout();
        self
    }

    /// Recomputes clip, hit-zone, content extent, scroll clamp and
    /// scrollbar. Idempotent.
    pub fn layout(&self) {
        self.inner.layout();
    }

    pub fn scroll_y(&self) -> f32 {
        self.inner.scroll_y.get()
    }

    pub fn max_scroll_y(&self) -> f32 {
        self.inner.max_scroll_y()
    }

    pub fn content_height(&self) -> f32 {
        self.inner.content_height.get()
    }

    pub fn content_min_y(&self) -> f32 {
        self.inner.content_min_y.get()
    }

    /// Height of the visible (padded) rect.
    pub fn viewport_height(&self) -> f32 {
        self.inner.style.get().inner_rect().h
    }

    /// Current track and thumb, in root-local coordinates.
    pub fn scrollbar(&self) -> Option<ScrollbarGeometry> {
        let style = self.inner.style.get();
        if !style.scrollbar_visible {
            return None;
        }
        scrollbar_geometry(style.inner_rect(), self.content_height(), self.scroll_y(), &style)
    }

    /// Clamped into `0..=max_scroll_y`. Notifies only when the value moved.
    pub fn set_scroll_y(&self, value: f32) -> &Self {
        self.inner.set_scroll_y(value);
        self
    }

    pub fn scroll_by(&self, delta: f32) -> &Self {
        self.set_scroll_y(self.scroll_y() + delta)
    }

    pub fn scroll_to_top(&self) -> &Self {
        self.set_scroll_y(0.0)
    }

    pub fn scroll_to_bottom(&self) -> &Self {
        self.set_scroll_y(self.max_scroll_y())
    }

    pub fn on_scroll(&self, f: impl Fn(ScrollChanged) + 'static) -> SubId {
        self.inner.changed.subscribe(move |e| f(*e))
    }

    pub fn off_scroll(&self, id: SubId) -> bool {
        self.inner.changed.unsubscribe(id)
    }

    pub fn style(&self) -> ScrollStyle {
        self.inner.style.get()
    }

    fn restyle(&self, f: impl FnOnce(&mut ScrollStyle)) -> &Self {
        let mut s = self.inner.style.get();
        f(&mut s);
        self.inner.style.set(s);
        self.layout();
        self
    }

    pub fn set_style(&self, style: ScrollStyle) -> &Self {
        self.restyle(|s| *s = style)
    }

    pub fn set_size(&self, width: f32, height: f32) -> &Self {
        self.restyle(|s| s.size = Size::new(width.max(0.0), height.max(0.0)))
    }

    pub fn set_padding(&self, padding: Insets) -> &Self {
        self.restyle(|s| s.padding = padding.max_zero())
    }

    pub fn set_wheel_step(&self, step: f32) -> &Self {
        self.restyle(|s| s.wheel_step = step.max(0.0))
    }

    pub fn set_wheel_enabled(&self, on: bool) -> &Self {
        self.restyle(|s| s.wheel_enabled = on)
    }

    pub fn set_scrollbar_visible(&self, on: bool) -> &Self {
        self.restyle(|s| s.scrollbar_visible = on)
    }

    pub fn set_scrollbar_width(&self, width: f32) -> &Self {
        self.restyle(|s| s.scrollbar_width = width.max(0.0))
    }

    pub fn set_scrollbar_margin(&self, margin: f32) -> &Self {
        self.restyle(|s| s.scrollbar_margin = margin)
    }

    pub fn set_min_thumb_height(&self, height: f32) -> &Self {
        self.restyle(|s| s.min_thumb_height = height.max(0.0))
    }

    pub fn set_scrollbar_colors(&self, track: Color, thumb: Color) -> &Self {
        self.restyle(|s| {
            s.track_color = track;
            s.thumb_color = thumb;
        })
    }

    pub fn set_background(&self, color: Option<Color>) -> &Self {
        self.restyle(|s| s.background = color)
    }

    pub fn set_radius(&self, radius: f32) -> &Self {
        self.restyle(|s| s.radius = radius.max(0.0))
    }

    /// Detaches from the host, clears the clip and destroys every node,
    /// items included.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

impl LayoutTarget for ScrollViewport {
    fn layout(&self) {
        ScrollViewport::layout(self);
    }
    fn layout_id(&self) -> LayoutId {
        LayoutId::of(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Rc<EventHub>, Stage) {
        (Rc::new(EventHub::new(Size::new(800.0, 600.0))), Stage::new())
    }

    /// `n` rows of `h` stacked with `gap`, the first one's top at 0.
    fn rows(stage: &Stage, n: usize, h: f32, gap: f32) -> Vec<NodeId> {
        (0..n)
            .map(|i| {
                let y = h * 0.5 + i as f32 * (h + gap);
                stage.spawn(Node::new().at(50.0, y).display_size(100.0, h))
            })
            .collect()
    }

    #[test]
    fn test_ten_rows_scroll_end_to_end() {
        let (hub, stage) = setup();
        let list = ScrollViewport(hub, &stage, 200.0, 220.0);
        list.add_items(rows(&stage, 10, 40.0, 10.0)).unwrap();

        assert_eq!(list.content_height(), 490.0);
        assert_eq!(list.max_scroll_y(), 270.0);
        list.scroll_to_bottom();
        assert_eq!(list.scroll_y(), 270.0);
        list.scroll_by(-1000.0);
        assert_eq!(list.scroll_y(), 0.0);
    }

    #[test]
    fn test_layout_is_idempotent() {
        let (hub, stage) = setup();
        let list = ScrollViewport(hub, &stage, 200.0, 100.0);
        list.add_items(rows(&stage, 5, 30.0, 5.0)).unwrap();
        list.scroll_by(42.0);

        let snap = |l: &ScrollViewport| {
            (
                l.scroll_y(),
                l.content_min_y(),
                l.content_height(),
                l.scrollbar(),
                stage.position(l.content()),
            )
        };
        list.layout();
        let a = snap(&list);
        list.layout();
        assert_eq!(a, snap(&list));
        assert_eq!(stage.render().nodes, {
            list.layout();
            stage.render().nodes
        });
    }

    #[test]
    fn test_set_scroll_y_clamps_and_skips_noop_events() {
        let (hub, stage) = setup();
        let list = ScrollViewport(hub, &stage, 200.0, 100.0);
        list.add_items(rows(&stage, 4, 50.0, 0.0)).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = events.clone();
        list.on_scroll(move |c| e.borrow_mut().push(c));

        list.set_scroll_y(-5.0);
        assert!(events.borrow().is_empty());
        list.set_scroll_y(1e6);
        assert_eq!(list.scroll_y(), 100.0);
        list.set_scroll_y(500.0);
        list.set_scroll_y(f32::NAN);
        assert_eq!(
            *events.borrow(),
            vec![ScrollChanged {
                scroll_y: 100.0,
                max_scroll_y: 100.0
            }]
        );
    }

    #[test]
    fn test_round_trips() {
        let (hub, stage) = setup();
        let list = ScrollViewport(hub, &stage, 200.0, 120.0);
        list.add_items(rows(&stage, 7, 25.0, 5.0)).unwrap();
        let max = list.max_scroll_y();
        assert!(max > 0.0);

        list.scroll_to_bottom().scroll_by(-max);
        assert_eq!(list.scroll_y(), 0.0);
        list.scroll_to_top().scroll_by(max);
        assert_eq!(list.scroll_y(), max);
    }

    #[test]
    fn test_removal_reclamps_and_notifies() {
        let (hub, stage) = setup();
        let list = ScrollViewport(hub, &stage, 200.0, 100.0);
        let items = rows(&stage, 4, 50.0, 0.0);
        list.add_items(items.clone()).unwrap();
        list.scroll_to_bottom();
        let last = Rc::new(Cell::new(None));
        let l = last.clone();
        list.on_scroll(move |c| l.set(Some(c)));

        list.remove_item(items[3], true);
        assert!(!stage.contains(items[3]));
        assert_eq!(list.scroll_y(), 50.0);
        assert_eq!(last.get().map(|c| c.max_scroll_y), Some(50.0));

        // destroyed behind the viewport's back: pruned on the next layout
        stage.destroy(items[2]);
        list.layout();
        assert_eq!(list.items(), items[..2].to_vec());
        assert_eq!(list.max_scroll_y(), 0.0);

        list.remove_all_items(false);
        assert!(stage.contains(items[0]));
        assert_eq!((list.content_min_y(), list.content_height()), (0.0, 0.0));
    }

    #[test]
    fn test_content_aligns_top_item_to_padding() {
        let (hub, stage) = setup();
        let list = ScrollViewport(hub, &stage, 200.0, 100.0);
        list.set_padding(Insets::new(10.0, 0.0, 10.0, 20.0));
        let row = stage.spawn(Node::new().at(0.0, -300.0).display_size(10.0, 200.0));
        list.add_item(row).unwrap();

        // inner rect is (-80, -40, 180, 80)
        assert_eq!(list.content_min_y(), -400.0);
        assert_eq!(list.max_scroll_y(), 120.0);
        assert_eq!(stage.position(list.content()), Some(Vec2::new(-80.0, 360.0)));
        list.scroll_by(20.0);
        assert_eq!(stage.position(list.content()), Some(Vec2::new(-80.0, 340.0)));
        assert_eq!(stage.with_node(list.hit_zone(), |n| n.display_size), Some(Some(Size::new(180.0, 80.0))));
    }

    #[test]
    fn test_scrollbar_geometry() {
        let style = ScrollStyle::default();
        let inner = Rect::new(0.0, 0.0, 100.0, 200.0);
        assert_eq!(scrollbar_geometry(inner, 150.0, 0.0, &style), None);

        let g = scrollbar_geometry(inner, 400.0, 100.0, &style).unwrap();
        assert_eq!(g.track, Rect::new(92.0, 0.0, 6.0, 200.0));
        assert_eq!(g.thumb, Rect::new(92.0, 50.0, 6.0, 100.0));

        // long content hits the minimum thumb height
        let g = scrollbar_geometry(inner, 10_000.0, 9_800.0, &style).unwrap();
        assert_eq!(g.thumb.h, 24.0);
        assert_eq!(g.thumb.bottom(), 200.0);
    }

    #[test]
    fn test_scrollbar_node_draws_only_when_scrollable() {
        let (hub, stage) = setup();
        let list = ScrollViewport(hub, &stage, 100.0, 200.0);
        let bar = list.inner.nodes.scrollbar;
        let drawn = || stage.with_node(bar, |n| n.graphics.clone()).unwrap();

        list.add_items(rows(&stage, 3, 40.0, 10.0)).unwrap();
        assert_eq!(list.max_scroll_y(), 0.0);
        assert!(drawn().is_empty());

        let tall = stage.spawn(Node::new().at(50.0, 300.0).display_size(100.0, 200.0));
        list.add_item(tall).unwrap();
        assert_eq!(list.content_height(), 400.0);
        let g = drawn();
        assert_eq!(g.len(), 2);
        assert!(matches!(g[0], SceneNode::Rect { rect, .. } if rect == Rect::new(42.0, -100.0, 6.0, 200.0)));
        assert!(matches!(g[1], SceneNode::Rect { rect, .. } if rect == Rect::new(42.0, -100.0, 6.0, 100.0)));

        list.set_scrollbar_visible(false);
        assert!(drawn().is_empty());
        assert_eq!(list.scrollbar(), None);

        list.set_scrollbar_visible(true);
        assert_eq!(drawn().len(), 2);
    }

    #[test]
    fn test_wheel_scrolls_over_content_only() {
        let (hub, stage) = setup();
        let list = ScrollViewport(hub.clone(), &stage, 200.0, 100.0);
        list.set_position(100.0, 50.0);
        list.add_items(rows(&stage, 4, 50.0, 0.0)).unwrap();

        let ev = WheelEvent::at(&stage, Vec2::new(100.0, 50.0), 0.0, 3.0);
        hub.dispatch_wheel(&ev);
        assert_eq!(list.scroll_y(), 40.0);
        assert!(ev.default_prevented() && ev.propagation_stopped());

        let outside = WheelEvent::at(&stage, Vec2::new(400.0, 50.0), 0.0, 3.0);
        hub.dispatch_wheel(&outside);
        assert_eq!(list.scroll_y(), 40.0);

        list.set_wheel_enabled(false);
        hub.dispatch_wheel(&WheelEvent::at(&stage, Vec2::new(100.0, 50.0), 0.0, 3.0));
        assert_eq!(list.scroll_y(), 40.0);
    }

    #[test]
    fn test_nested_viewport_lets_wheel_bubble_at_its_end() {
        let (hub, stage) = setup();
        let outer = ScrollViewport(hub.clone(), &stage, 200.0, 100.0);
        outer.set_position(100.0, 50.0);
        let inner = ScrollViewport(hub.clone(), &stage, 180.0, 80.0);
        inner.add_items(rows(&stage, 3, 40.0, 10.0)).unwrap();
        assert_eq!(inner.max_scroll_y(), 60.0);

        stage.set_position(inner.node(), 100.0, 40.0);
        let filler = stage.spawn(Node::new().at(100.0, 190.0).display_size(200.0, 200.0));
        outer.add_items([inner.node(), filler]).unwrap();
        assert_eq!(outer.max_scroll_y(), 190.0);

        let wheel = || {
            let e = WheelEvent::at(&stage, Vec2::new(100.0, 40.0), 0.0, 1.0);
            hub.dispatch_wheel(&e);
            e
        };
        assert!(wheel().propagation_stopped());
        assert!(wheel().propagation_stopped());
        assert_eq!((inner.scroll_y(), outer.scroll_y()), (60.0, 0.0));

        let e = wheel();
        assert_eq!((inner.scroll_y(), outer.scroll_y()), (60.0, 40.0));
        assert!(e.default_prevented());
    }

    #[test]
    fn test_nested_viewport_built_first_still_scrolls_first() {
        let (hub, stage) = setup();
        let inner = ScrollViewport(hub.clone(), &stage, 180.0, 80.0);
        inner.add_items(rows(&stage, 3, 40.0, 10.0)).unwrap();
        assert_eq!(inner.max_scroll_y(), 60.0);

        let outer = ScrollViewport(hub.clone(), &stage, 200.0, 100.0);
        outer.set_position(100.0, 50.0);
        stage.set_position(inner.node(), 100.0, 40.0);
        let filler = stage.spawn(Node::new().at(100.0, 190.0).display_size(200.0, 200.0));
        outer.add_items([inner.node(), filler]).unwrap();

        // y = 20 stays over the visible part of the inner list at either
        // outer offset
        let wheel = |dy: f32| {
            let e = WheelEvent::at(&stage, Vec2::new(100.0, 20.0), 0.0, dy);
            assert_eq!(e.over.len(), 2);
            hub.dispatch_wheel(&e);
            e
        };
        assert!(wheel(1.0).propagation_stopped());
        assert_eq!((inner.scroll_y(), outer.scroll_y()), (40.0, 0.0));
        wheel(1.0);
        assert_eq!((inner.scroll_y(), outer.scroll_y()), (60.0, 0.0));

        // inner at its end: the outer list takes over
        wheel(1.0);
        assert_eq!((inner.scroll_y(), outer.scroll_y()), (60.0, 40.0));

        // scrolling back up moves the inner list again first
        wheel(-1.0);
        assert_eq!((inner.scroll_y(), outer.scroll_y()), (20.0, 40.0));

        inner.set_wheel_enabled(false);
        wheel(-1.0);
        assert_eq!((inner.scroll_y(), outer.scroll_y()), (20.0, 0.0));
    }

    #[test]
    fn test_destroy_releases_host_and_nodes() {
        let (hub, stage) = setup();
        let before = hub.listener_count();
        let list = ScrollViewport(hub.clone(), &stage, 200.0, 100.0);
        list.add_items(rows(&stage, 4, 50.0, 0.0)).unwrap();
        assert_eq!(hub.listener_count(), before + 2);

        list.destroy();
        list.destroy();
        assert!(list.is_destroyed());
        assert_eq!(hub.listener_count(), before);
        assert!(stage.is_empty());
        list.scroll_by(10.0);
        assert_eq!(list.scroll_y(), 0.0);

        // root destroyed from outside
        let other = ScrollViewport(hub.clone(), &stage, 50.0, 50.0);
        stage.destroy(other.node());
        assert!(other.is_destroyed());
        assert_eq!(hub.listener_count(), before);

        let third = ScrollViewport(hub.clone(), &stage, 50.0, 50.0);
        hub.shutdown();
        assert!(third.is_destroyed());
    }

    #[test]
    fn test_scheduled_viewport_lays_out_on_frame() {
        let (hub, stage) = setup();
        let sched = LayoutScheduler::new(hub.clone(), FramePhase::PostUpdate);
        let list = ScrollViewport(hub.clone(), &stage, 200.0, 100.0);
        let items = rows(&stage, 4, 50.0, 0.0);
        list.add_items(items.clone()).unwrap();

        stage.update(items[3], |n| n.display_size = Some(Size::new(100.0, 150.0)));
        sched.mark_dirty(&list);
        assert_eq!(list.max_scroll_y(), 100.0);
        hub.step(|| {});
        assert_eq!(list.max_scroll_y(), 150.0);
    }
}

//! Leaf widgets: panel, label, badge, button, progress bar, cycling switch,
//! toggle and slider.
//!
//! Each widget owns one interactive (or decorative) stage node and redraws
//! that node's display list whenever its state changes. Colors come from the
//! current [`Theme`] unless overridden per widget.
//!
//! Pointer input arrives already hit-tested: the embedding runner maps
//! `Stage::hit_test` results back to widgets and calls the [`Pointer`]
//! methods. Only user-driven changes (a click, a drag) notify value
//! listeners; programmatic `set_value` does not.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bitflags::bitflags;
use vellum_core::*;

bitflags! {
    /// Visual state of an interactive widget.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct WidgetState: u8 {
        const HOVERED = 1;
        const PRESSED = 1 << 1;
        const DISABLED = 1 << 2;
        /// Toggles that are on.
        const CHECKED = 1 << 3;
        const FOCUSED = 1 << 4;
    }
}

/// Pointer input, in the widget's local coordinates.
pub trait Pointer {
    fn node(&self) -> NodeId;
    fn pointer_enter(&self);
    fn pointer_leave(&self);
    fn pointer_down(&self, local: Vec2);
    fn pointer_up(&self, local: Vec2);
    fn pointer_move(&self, _local: Vec2) {}
}

struct Core {
    stage: Stage,
    node: NodeId,
    state: Cell<WidgetState>,
    /// Text scale in effect when the widget was built.
    text_scale: f32,
}

impl Core {
    fn new(stage: &Stage, node: Node) -> Self {
        Self {
            stage: stage.clone(),
            node: stage.spawn(node),
            state: Cell::new(WidgetState::empty()),
            text_scale: text_scale().0,
        }
    }

    /// Returns whether the flag actually flipped.
    fn set(&self, flag: WidgetState, on: bool) -> bool {
        let before = self.state.get();
        let mut after = before;
        after.set(flag, on);
        self.state.set(after);
        before != after
    }

    fn has(&self, flag: WidgetState) -> bool {
        self.state.get().contains(flag)
    }

    fn enabled(&self) -> bool {
        !self.has(WidgetState::DISABLED)
    }

    fn draw(&self, size: Size, graphics: Vec<SceneNode>) {
        self.stage.update(self.node, |n| {
            n.display_size = Some(size);
            n.graphics = graphics;
        });
    }
}

fn text_cmd(text: &str, font_size: f32, color: Color) -> (Size, SceneNode) {
    let size = estimate_text_size(text, font_size);
    let cmd = SceneNode::Text {
        rect: Rect::from_center(Vec2::ZERO, size),
        text: text.to_string(),
        color,
        size: font_size,
    };
    (size, cmd)
}

fn fill(size: Size, color: Color, radius: f32) -> SceneNode {
    SceneNode::Rect {
        rect: Rect::from_center(Vec2::ZERO, size),
        color,
        radius,
    }
}

macro_rules! widget_common {
    ($ty:ident) => {
        impl $ty {
            pub fn node(&self) -> NodeId {
                self.inner.core.node
            }

            pub fn state(&self) -> WidgetState {
                self.inner.core.state.get()
            }

            pub fn set_position(&self, x: f32, y: f32) -> &Self {
                self.inner.core.stage.set_position(self.node(), x, y);
                self
            }

            pub fn set_enabled(&self, enabled: bool) -> &Self {
                if self.inner.core.set(WidgetState::DISABLED, !enabled) {
                    if !enabled {
                        self.inner.core.set(WidgetState::HOVERED | WidgetState::PRESSED, false);
                    }
                    self.redraw();
                }
                self
            }

            pub fn is_enabled(&self) -> bool {
                self.inner.core.enabled()
            }

            /// Destroys the widget's node.
            pub fn destroy(&self) {
                self.inner.core.stage.destroy(self.node());
            }
        }
    };
}

// Panel

struct PanelInner {
    core: Core,
    size: Cell<Size>,
    fill: Cell<Option<Color>>,
    outline: Cell<Option<Color>>,
    radius: Cell<f32>,
}

/// Flat rounded background with an outline.
#[derive(Clone)]
pub struct Panel {
    inner: Rc<PanelInner>,
}

pub fn Panel(stage: &Stage, width: f32, height: f32) -> Panel {
    let p = Panel {
        inner: Rc::new(PanelInner {
            core: Core::new(stage, Node::new().named("panel")),
            size: Cell::new(Size::new(width, height)),
            fill: Cell::new(None),
            outline: Cell::new(None),
            radius: Cell::new(6.0),
        }),
    };
    p.redraw();
    p
}

impl Panel {
    pub fn set_size(&self, width: f32, height: f32) -> &Self {
        self.inner.size.set(Size::new(width, height));
        self.redraw();
        self
    }

    pub fn set_fill(&self, color: Color) -> &Self {
        self.inner.fill.set(Some(color));
        self.redraw();
        self
    }

    /// `None` falls back to the theme outline.
    pub fn set_outline(&self, color: Option<Color>) -> &Self {
        self.inner.outline.set(color);
        self.redraw();
        self
    }

    pub fn set_radius(&self, radius: f32) -> &Self {
        self.inner.radius.set(radius.max(0.0));
        self.redraw();
        self
    }

    pub fn redraw(&self) {
        let th = theme();
        let i = &self.inner;
        let size = i.size.get();
        let r = i.radius.get();
        i.core.draw(
            size,
            vec![
                fill(size, i.fill.get().unwrap_or(th.surface), r),
                SceneNode::Border {
                    rect: Rect::from_center(Vec2::ZERO, size),
                    color: i.outline.get().unwrap_or(th.outline),
                    width: 1.0,
                    radius: r,
                },
            ],
        );
    }
}

widget_common!(Panel);

// Label

struct LabelInner {
    core: Core,
    text: RefCell<String>,
    font_size: Cell<f32>,
    color: Cell<Option<Color>>,
}

#[derive(Clone)]
pub struct Label {
    inner: Rc<LabelInner>,
}

pub fn Label(stage: &Stage, text: impl Into<String>) -> Label {
    let l = Label {
        inner: Rc::new(LabelInner {
            core: Core::new(stage, Node::new().named("label")),
            text: RefCell::new(text.into()),
            font_size: Cell::new(14.0),
            color: Cell::new(None),
        }),
    };
    l.redraw();
    l
}

impl Label {
    pub fn text(&self) -> String {
        self.inner.text.borrow().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) -> &Self {
        let text = text.into();
        if *self.inner.text.borrow() != text {
            *self.inner.text.borrow_mut() = text;
            self.redraw();
        }
        self
    }

    pub fn set_font_size(&self, size: f32) -> &Self {
        self.inner.font_size.set(size.max(1.0));
        self.redraw();
        self
    }

    pub fn set_color(&self, color: Color) -> &Self {
        self.inner.color.set(Some(color));
        self.redraw();
        self
    }

    pub fn redraw(&self) {
        let th = theme();
        let i = &self.inner;
        let color = if i.core.enabled() {
            i.color.get().unwrap_or(th.text)
        } else {
            th.text_disabled
        };
        let (size, cmd) = text_cmd(&i.text.borrow(), i.font_size.get() * i.core.text_scale, color);
        i.core.draw(size, vec![cmd]);
    }
}

widget_common!(Label);

impl ValueControl for Label {
    type Value = String;
    fn value(&self) -> String {
        self.text()
    }
    fn set_value(&self, value: String) {
        self.set_text(value);
    }
}

// Badge

const BADGE_PAD: Vec2 = Vec2 { x: 8.0, y: 3.0 };

struct BadgeInner {
    core: Core,
    text: RefCell<String>,
    font_size: Cell<f32>,
    color: Cell<Option<Color>>,
}

/// Small pill with a short text, for counts and tags.
#[derive(Clone)]
pub struct Badge {
    inner: Rc<BadgeInner>,
}

pub fn Badge(stage: &Stage, text: impl Into<String>) -> Badge {
    let b = Badge {
        inner: Rc::new(BadgeInner {
            core: Core::new(stage, Node::new().named("badge")),
            text: RefCell::new(text.into()),
            font_size: Cell::new(12.0),
            color: Cell::new(None),
        }),
    };
    b.redraw();
    b
}

impl Badge {
    pub fn text(&self) -> String {
        self.inner.text.borrow().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) -> &Self {
        *self.inner.text.borrow_mut() = text.into();
        self.redraw();
        self
    }

    pub fn set_color(&self, color: Color) -> &Self {
        self.inner.color.set(Some(color));
        self.redraw();
        self
    }

    pub fn redraw(&self) {
        let th = theme();
        let i = &self.inner;
        let (ts, text) = text_cmd(&i.text.borrow(), i.font_size.get() * i.core.text_scale, th.on_accent);
        let size = Size::new(ts.width + BADGE_PAD.x * 2.0, ts.height + BADGE_PAD.y * 2.0);
        let bg = i.color.get().unwrap_or(th.badge_bg);
        i.core.draw(size, vec![fill(size, bg, size.height * 0.5), text]);
    }
}

widget_common!(Badge);

// Button

const BUTTON_PAD: Vec2 = Vec2 { x: 12.0, y: 6.0 };

struct ButtonInner {
    core: Core,
    text: RefCell<String>,
    fixed: Cell<Option<Size>>,
    clicked: Emitter<()>,
}

#[derive(Clone)]
pub struct Button {
    inner: Rc<ButtonInner>,
}

pub fn Button(stage: &Stage, text: impl Into<String>) -> Button {
    let b = Button {
        inner: Rc::new(ButtonInner {
            core: Core::new(stage, Node::new().named("button").interactive()),
            text: RefCell::new(text.into()),
            fixed: Cell::new(None),
            clicked: Emitter::new(),
        }),
    };
    b.redraw();
    b
}

/// Background color for a button-like widget in `state`.
pub fn button_color(th: &Theme, state: WidgetState) -> Color {
    if state.contains(WidgetState::DISABLED) {
        th.button_bg_disabled
    } else if state.contains(WidgetState::PRESSED) {
        th.button_bg_pressed
    } else if state.contains(WidgetState::HOVERED) {
        th.button_bg_hover
    } else {
        th.button_bg
    }
}

fn label_color(th: &Theme, state: WidgetState) -> Color {
    if state.contains(WidgetState::DISABLED) {
        th.text_disabled
    } else {
        th.text
    }
}

impl Button {
    pub fn on_click(&self, f: impl Fn() + 'static) -> SubId {
        self.inner.clicked.subscribe(move |_| f())
    }

    pub fn off_click(&self, id: SubId) -> bool {
        self.inner.clicked.unsubscribe(id)
    }

    /// Fires click listeners unless disabled.
    pub fn click(&self) {
        if self.inner.core.enabled() {
            self.inner.clicked.emit(&());
        }
    }

    pub fn set_text(&self, text: impl Into<String>) -> &Self {
        *self.inner.text.borrow_mut() = text.into();
        self.redraw();
        self
    }

    /// `None` sizes the button to its text.
    pub fn set_size(&self, size: Option<Size>) -> &Self {
        self.inner.fixed.set(size);
        self.redraw();
        self
    }

    pub fn redraw(&self) {
        let th = theme();
        let i = &self.inner;
        let state = i.core.state.get();
        let (ts, text) = text_cmd(&i.text.borrow(), 14.0 * i.core.text_scale, label_color(&th, state));
        let size = i.fixed.get().unwrap_or(Size::new(
            ts.width + BUTTON_PAD.x * 2.0,
            ts.height + BUTTON_PAD.y * 2.0,
        ));
        i.core.draw(size, vec![fill(size, button_color(&th, state), 4.0), text]);
    }
}

widget_common!(Button);

impl Pointer for Button {
    fn node(&self) -> NodeId {
        self.inner.core.node
    }
    fn pointer_enter(&self) {
        if self.inner.core.enabled() && self.inner.core.set(WidgetState::HOVERED, true) {
            self.redraw();
        }
    }
    fn pointer_leave(&self) {
        if self.inner.core.set(WidgetState::HOVERED | WidgetState::PRESSED, false) {
            self.redraw();
        }
    }
    fn pointer_down(&self, _local: Vec2) {
        if self.inner.core.enabled() && self.inner.core.set(WidgetState::PRESSED, true) {
            self.redraw();
        }
    }
    fn pointer_up(&self, _local: Vec2) {
        if self.inner.core.set(WidgetState::PRESSED, false) {
            self.redraw();
            self.click();
        }
    }
}

// ProgressBar

struct ProgressInner {
    core: Core,
    size: Cell<Size>,
    value: Cell<f32>,
    show_label: Cell<bool>,
}

/// Horizontal bar filled left to right, value in `0.0..=1.0`.
#[derive(Clone)]
pub struct ProgressBar {
    inner: Rc<ProgressInner>,
}

pub fn ProgressBar(stage: &Stage, width: f32, height: f32) -> ProgressBar {
    let p = ProgressBar {
        inner: Rc::new(ProgressInner {
            core: Core::new(stage, Node::new().named("progress")),
            size: Cell::new(Size::new(width, height)),
            value: Cell::new(0.0),
            show_label: Cell::new(false),
        }),
    };
    p.redraw();
    p
}

impl ProgressBar {
    pub fn value(&self) -> f32 {
        self.inner.value.get()
    }

    /// Clamped into `0.0..=1.0`; NaN counts as zero.
    pub fn set_value(&self, value: f32) -> &Self {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        if v != self.inner.value.get() {
            self.inner.value.set(v);
            self.redraw();
        }
        self
    }

    /// Draws the percentage on top of the bar.
    pub fn show_label(&self, on: bool) -> &Self {
        self.inner.show_label.set(on);
        self.redraw();
        self
    }

    pub fn redraw(&self) {
        let th = theme();
        let i = &self.inner;
        let size = i.size.get();
        let r = size.height * 0.5;
        let v = i.value.get();
        let mut g = vec![fill(size, th.track, r)];
        if v > 0.0 {
            let w = size.width * v;
            g.push(SceneNode::Rect {
                rect: Rect::new(-size.width * 0.5, -size.height * 0.5, w, size.height),
                color: if i.core.enabled() { th.accent } else { th.text_disabled },
                radius: r.min(w * 0.5),
            });
        }
        if i.show_label.get() {
            let pct = format!("{}%", (v * 100.0).round() as i32);
            g.push(text_cmd(&pct, (size.height * 0.7).max(8.0), th.on_accent).1);
        }
        i.core.draw(size, g);
    }
}

widget_common!(ProgressBar);

impl ValueControl for ProgressBar {
    type Value = f32;
    fn value(&self) -> f32 {
        ProgressBar::value(self)
    }
    fn set_value(&self, value: f32) {
        ProgressBar::set_value(self, value);
    }
}

// Switch

struct SwitchInner {
    core: Core,
    options: RefCell<Vec<String>>,
    index: Cell<usize>,
    width: Cell<f32>,
    changed: Emitter<usize>,
}

/// Cycles through a list of text options on click.
#[derive(Clone)]
pub struct Switch {
    inner: Rc<SwitchInner>,
}

pub fn Switch<S: Into<String>>(stage: &Stage, options: impl IntoIterator<Item = S>) -> Switch {
    let s = Switch {
        inner: Rc::new(SwitchInner {
            core: Core::new(stage, Node::new().named("switch").interactive()),
            options: RefCell::new(options.into_iter().map(Into::into).collect()),
            index: Cell::new(0),
            width: Cell::new(120.0),
            changed: Emitter::new(),
        }),
    };
    s.redraw();
    s
}

impl Switch {
    pub fn options(&self) -> Vec<String> {
        self.inner.options.borrow().clone()
    }

    pub fn selected(&self) -> usize {
        self.inner.index.get()
    }

    pub fn selected_label(&self) -> Option<String> {
        self.inner.options.borrow().get(self.inner.index.get()).cloned()
    }

    /// Replaces the options, keeping the index when it is still valid.
    pub fn set_options<S: Into<String>>(&self, options: impl IntoIterator<Item = S>) -> &Self {
        *self.inner.options.borrow_mut() = options.into_iter().map(Into::into).collect();
        let len = self.inner.options.borrow().len();
        if self.inner.index.get() >= len {
            self.inner.index.set(0);
        }
        self.redraw();
        self
    }

    /// Programmatic selection; out-of-range indices are ignored.
    pub fn select(&self, index: usize) -> &Self {
        if index < self.inner.options.borrow().len() && index != self.inner.index.get() {
            self.inner.index.set(index);
            self.redraw();
        }
        self
    }

    pub fn set_width(&self, width: f32) -> &Self {
        self.inner.width.set(width.max(0.0));
        self.redraw();
        self
    }

    fn step(&self, forward: bool) {
        let len = self.inner.options.borrow().len();
        if len < 2 || !self.inner.core.enabled() {
            return;
        }
        let i = self.inner.index.get();
        let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
        self.inner.index.set(next);
        self.redraw();
        self.inner.changed.emit(&next);
    }

    /// User-driven: advances and notifies.
    pub fn next(&self) {
        self.step(true);
    }

    pub fn prev(&self) {
        self.step(false);
    }

    pub fn on_change(&self, f: impl Fn(usize) + 'static) -> SubId {
        self.inner.changed.subscribe(move |i| f(*i))
    }

    pub fn off_change(&self, id: SubId) -> bool {
        self.inner.changed.unsubscribe(id)
    }

    pub fn redraw(&self) {
        let th = theme();
        let i = &self.inner;
        let state = i.core.state.get();
        let label = self.selected_label().unwrap_or_default();
        let (ts, text) = text_cmd(&label, 14.0 * i.core.text_scale, label_color(&th, state));
        let size = Size::new(i.width.get().max(ts.width + 40.0), ts.height + BUTTON_PAD.y * 2.0);
        let (hw, hh) = (size.width * 0.5, size.height * 0.25);
        let fg = label_color(&th, state);
        let chevron = |x: f32, dir: f32| {
            [
                SceneNode::Line {
                    from: Vec2::new(x, -hh),
                    to: Vec2::new(x + dir * hh, 0.0),
                    color: fg,
                    width: 1.5,
                },
                SceneNode::Line {
                    from: Vec2::new(x + dir * hh, 0.0),
                    to: Vec2::new(x, hh),
                    color: fg,
                    width: 1.5,
                },
            ]
        };
        let mut g = vec![fill(size, button_color(&th, state), 4.0), text];
        g.extend(chevron(-hw + 12.0, -1.0));
        g.extend(chevron(hw - 12.0, 1.0));
        i.core.draw(size, g);
    }
}

widget_common!(Switch);

impl Pointer for Switch {
    fn node(&self) -> NodeId {
        self.inner.core.node
    }
    fn pointer_enter(&self) {
        if self.inner.core.enabled() && self.inner.core.set(WidgetState::HOVERED, true) {
            self.redraw();
        }
    }
    fn pointer_leave(&self) {
        if self.inner.core.set(WidgetState::HOVERED | WidgetState::PRESSED, false) {
            self.redraw();
        }
    }
    fn pointer_down(&self, _local: Vec2) {
        if self.inner.core.enabled() && self.inner.core.set(WidgetState::PRESSED, true) {
            self.redraw();
        }
    }
    /// The left third steps back, the rest steps forward.
    fn pointer_up(&self, local: Vec2) {
        if self.inner.core.set(WidgetState::PRESSED, false) {
            let w = self.inner.core.stage.measure(self.inner.core.node).width;
            self.step(local.x >= -w / 6.0);
        }
    }
}

impl ValueControl for Switch {
    type Value = usize;
    fn value(&self) -> usize {
        self.selected()
    }
    fn set_value(&self, value: usize) {
        self.select(value);
    }
    fn on_value_changed(&self, f: Rc<dyn Fn(&usize)>) -> Option<Dispose> {
        let id = self.inner.changed.subscribe(move |v| f(v));
        let e = self.inner.changed.clone();
        Some(Dispose::new(move || {
            e.unsubscribe(id);
        }))
    }
}

// Toggle

const TOGGLE_SIZE: Size = Size {
    width: 36.0,
    height: 20.0,
};

struct ToggleInner {
    core: Core,
    changed: Emitter<bool>,
}

/// On/off pill with a sliding knob.
#[derive(Clone)]
pub struct Toggle {
    inner: Rc<ToggleInner>,
}

pub fn Toggle(stage: &Stage, on: bool) -> Toggle {
    let t = Toggle {
        inner: Rc::new(ToggleInner {
            core: Core::new(stage, Node::new().named("toggle").interactive()),
            changed: Emitter::new(),
        }),
    };
    t.inner.core.set(WidgetState::CHECKED, on);
    t.redraw();
    t
}

impl Toggle {
    pub fn is_on(&self) -> bool {
        self.inner.core.has(WidgetState::CHECKED)
    }

    /// Programmatic; does not notify.
    pub fn set_on(&self, on: bool) -> &Self {
        if self.inner.core.set(WidgetState::CHECKED, on) {
            self.redraw();
        }
        self
    }

    /// User-driven flip; notifies.
    pub fn toggle(&self) {
        if !self.inner.core.enabled() {
            return;
        }
        let on = !self.is_on();
        self.set_on(on);
        self.inner.changed.emit(&on);
    }

    pub fn on_change(&self, f: impl Fn(bool) + 'static) -> SubId {
        self.inner.changed.subscribe(move |v| f(*v))
    }

    pub fn off_change(&self, id: SubId) -> bool {
        self.inner.changed.unsubscribe(id)
    }

    pub fn redraw(&self) {
        let th = theme();
        let i = &self.inner;
        let state = i.core.state.get();
        let s = TOGGLE_SIZE;
        let on = state.contains(WidgetState::CHECKED);
        let track = match (state.contains(WidgetState::DISABLED), on) {
            (true, _) => th.button_bg_disabled,
            (false, true) => th.accent,
            (false, false) if state.contains(WidgetState::PRESSED) => th.button_bg_pressed,
            (false, false) if state.contains(WidgetState::HOVERED) => th.button_bg_hover,
            (false, false) => th.track,
        };
        let d = s.height - 4.0;
        let x = if on { s.width * 0.5 - 2.0 - d * 0.5 } else { -s.width * 0.5 + 2.0 + d * 0.5 };
        let knob = SceneNode::Rect {
            rect: Rect::from_center(Vec2::new(x, 0.0), Size::new(d, d)),
            color: if on { th.on_accent } else { label_color(&th, state) },
            radius: d * 0.5,
        };
        i.core.draw(s, vec![fill(s, track, s.height * 0.5), knob]);
    }
}

widget_common!(Toggle);

impl Pointer for Toggle {
    fn node(&self) -> NodeId {
        self.inner.core.node
    }
    fn pointer_enter(&self) {
        if self.inner.core.enabled() && self.inner.core.set(WidgetState::HOVERED, true) {
            self.redraw();
        }
    }
    fn pointer_leave(&self) {
        if self.inner.core.set(WidgetState::HOVERED | WidgetState::PRESSED, false) {
            self.redraw();
        }
    }
    fn pointer_down(&self, _local: Vec2) {
        if self.inner.core.enabled() && self.inner.core.set(WidgetState::PRESSED, true) {
            self.redraw();
        }
    }
    fn pointer_up(&self, _local: Vec2) {
        if self.inner.core.set(WidgetState::PRESSED, false) {
            self.toggle();
        }
    }
}

impl ValueControl for Toggle {
    type Value = bool;
    fn value(&self) -> bool {
        self.is_on()
    }
    fn set_value(&self, value: bool) {
        self.set_on(value);
    }
    fn on_value_changed(&self, f: Rc<dyn Fn(&bool)>) -> Option<Dispose> {
        let id = self.inner.changed.subscribe(move |v| f(v));
        let e = self.inner.changed.clone();
        Some(Dispose::new(move || {
            e.unsubscribe(id);
        }))
    }
}

// Slider

struct SliderInner {
    core: Core,
    width: Cell<f32>,
    min: f32,
    max: f32,
    step: Option<f32>,
    value: Cell<f32>,
    changed: Emitter<f32>,
}

/// Horizontal slider over `min..=max`, optionally snapped to `step`.
#[derive(Clone)]
pub struct Slider {
    inner: Rc<SliderInner>,
}

pub fn Slider(stage: &Stage, width: f32, range: (f32, f32), step: Option<f32>) -> Slider {
    let (min, max) = if range.0 <= range.1 { range } else { (range.1, range.0) };
    let s = Slider {
        inner: Rc::new(SliderInner {
            core: Core::new(stage, Node::new().named("slider").interactive()),
            width: Cell::new(width.max(1.0)),
            min,
            max,
            step: step.filter(|s| *s > 0.0),
            value: Cell::new(min),
            changed: Emitter::new(),
        }),
    };
    s.redraw();
    s
}

const SLIDER_HEIGHT: f32 = 16.0;

impl Slider {
    pub fn value(&self) -> f32 {
        self.inner.value.get()
    }

    pub fn range(&self) -> (f32, f32) {
        (self.inner.min, self.inner.max)
    }

    fn normalize(&self, v: f32) -> f32 {
        let i = &self.inner;
        if v.is_nan() {
            return i.min;
        }
        let mut v = v.clamp(i.min, i.max);
        if let Some(step) = i.step {
            v = (i.min + ((v - i.min) / step).round() * step).min(i.max);
        }
        v
    }

    /// Programmatic; clamps and snaps, does not notify.
    pub fn set_value(&self, value: f32) -> &Self {
        let v = self.normalize(value);
        if v != self.inner.value.get() {
            self.inner.value.set(v);
            self.redraw();
        }
        self
    }

    /// User drag to a local x coordinate; notifies when the value moved.
    pub fn drag_to(&self, local_x: f32) {
        let i = &self.inner;
        if !i.core.enabled() {
            return;
        }
        let w = i.width.get();
        let t = ((local_x + w * 0.5) / w).clamp(0.0, 1.0);
        let v = self.normalize(i.min + t * (i.max - i.min));
        if v != i.value.get() {
            i.value.set(v);
            self.redraw();
            i.changed.emit(&v);
        }
    }

    pub fn on_change(&self, f: impl Fn(f32) + 'static) -> SubId {
        self.inner.changed.subscribe(move |v| f(*v))
    }

    pub fn off_change(&self, id: SubId) -> bool {
        self.inner.changed.unsubscribe(id)
    }

    pub fn redraw(&self) {
        let th = theme();
        let i = &self.inner;
        let state = i.core.state.get();
        let w = i.width.get();
        let span = i.max - i.min;
        let t = if span > 0.0 { (i.value.get() - i.min) / span } else { 0.0 };
        let track_h = 4.0;
        let x = -w * 0.5 + t * w;
        let accent = if state.contains(WidgetState::DISABLED) { th.text_disabled } else { th.accent };
        let thumb_d = if state.intersects(WidgetState::HOVERED | WidgetState::PRESSED) {
            SLIDER_HEIGHT
        } else {
            SLIDER_HEIGHT - 4.0
        };
        let g = vec![
            fill(Size::new(w, track_h), th.track, track_h * 0.5),
            SceneNode::Rect {
                rect: Rect::new(-w * 0.5, -track_h * 0.5, t * w, track_h),
                color: accent,
                radius: track_h * 0.5,
            },
            SceneNode::Rect {
                rect: Rect::from_center(Vec2::new(x, 0.0), Size::new(thumb_d, thumb_d)),
                color: accent,
                radius: thumb_d * 0.5,
            },
        ];
        i.core.draw(Size::new(w, SLIDER_HEIGHT), g);
    }
}

widget_common!(Slider);

impl Pointer for Slider {
    fn node(&self) -> NodeId {
        self.inner.core.node
    }
    fn pointer_enter(&self) {
        if self.inner.core.enabled() && self.inner.core.set(WidgetState::HOVERED, true) {
            self.redraw();
        }
    }
    fn pointer_leave(&self) {
        if self.inner.core.set(WidgetState::HOVERED, false) {
            self.redraw();
        }
    }
    fn pointer_down(&self, local: Vec2) {
        if self.inner.core.enabled() {
            self.inner.core.set(WidgetState::PRESSED, true);
            self.drag_to(local.x);
            self.redraw();
        }
    }
    fn pointer_move(&self, local: Vec2) {
        if self.inner.core.has(WidgetState::PRESSED) {
            self.drag_to(local.x);
        }
    }
    fn pointer_up(&self, _local: Vec2) {
        if self.inner.core.set(WidgetState::PRESSED, false) {
            self.redraw();
        }
    }
}

impl ValueControl for Slider {
    type Value = f32;
    fn value(&self) -> f32 {
        Slider::value(self)
    }
    fn set_value(&self, value: f32) {
        Slider::set_value(self, value);
    }
    fn on_value_changed(&self, f: Rc<dyn Fn(&f32)>) -> Option<Dispose> {
        let id = self.inner.changed.subscribe(move |v| f(v));
        let e = self.inner.changed.clone();
        Some(Dispose::new(move || {
            e.unsubscribe(id);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    fn hex(c: Color) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", c.0, c.1, c.2, c.3)
    }

    /// One line per draw command.
    fn describe(scene: &Scene) -> String {
        let mut out = String::new();
        for n in &scene.nodes {
            match n {
                SceneNode::Rect { rect, color, radius } => writeln!(
                    out,
                    "rect {:.1},{:.1} {:.1}x{:.1} {} r{:.1}",
                    rect.x,
                    rect.y,
                    rect.w,
                    rect.h,
                    hex(*color),
                    radius
                ),
                SceneNode::Text { rect, text, color, size } => writeln!(
                    out,
                    "text {:.1},{:.1} {:.1}x{:.1} {text:?} {} {:.1}",
                    rect.x,
                    rect.y,
                    rect.w,
                    rect.h,
                    hex(*color),
                    size
                ),
                other => writeln!(out, "{other:?}"),
            }
            .ok();
        }
        out.trim_end().to_string()
    }

    #[test]
    fn test_badge_scene() {
        let stage = Stage::new();
        let b = Badge(&stage, "OK");
        b.set_position(100.0, 50.0);
        insta::assert_snapshot!(describe(&stage.render()), @r#"
        rect 84.8,39.5 30.4x21.0 #0061A4FF r10.5
        text 92.8,42.5 14.4x15.0 "OK" #FFFFFFFF 12.0
        "#);
    }

    #[test]
    fn test_button_states_map_to_theme() {
        let stage = Stage::new();
        let th = theme();
        let b = Button(&stage, "Run");
        let bg = || match stage.with_node(b.node(), |n| n.graphics[0].clone()) {
            Some(SceneNode::Rect { color, .. }) => color,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(bg(), th.button_bg);
        b.pointer_enter();
        assert_eq!(bg(), th.button_bg_hover);
        b.pointer_down(Vec2::ZERO);
        assert_eq!(bg(), th.button_bg_pressed);
        assert_eq!(b.state(), WidgetState::HOVERED | WidgetState::PRESSED);

        let clicks = Rc::new(Cell::new(0));
        let c = clicks.clone();
        b.on_click(move || c.set(c.get() + 1));
        b.pointer_up(Vec2::ZERO);
        assert_eq!(clicks.get(), 1);

        b.set_enabled(false);
        assert_eq!(bg(), th.button_bg_disabled);
        b.pointer_down(Vec2::ZERO);
        b.pointer_up(Vec2::ZERO);
        b.click();
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn test_switch_cycles_and_notifies() {
        let stage = Stage::new();
        let s = Switch(&stage, ["low", "mid", "high"]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let v = seen.clone();
        s.on_change(move |i| v.borrow_mut().push(i));

        s.next();
        s.next();
        s.next();
        s.prev();
        assert_eq!(*seen.borrow(), vec![1, 2, 0, 2]);
        assert_eq!(s.selected_label().as_deref(), Some("high"));

        // programmatic selection is silent
        s.select(0);
        s.select(7);
        assert_eq!(s.selected(), 0);
        assert_eq!(seen.borrow().len(), 4);
    }

    #[test]
    fn test_slider_snaps_and_clamps() {
        let stage = Stage::new();
        let s = Slider(&stage, 100.0, (0.0, 10.0), Some(2.5));
        s.set_value(3.9);
        assert_eq!(s.value(), 5.0);
        s.set_value(42.0);
        assert_eq!(s.value(), 10.0);

        let last = Rc::new(Cell::new(f32::NAN));
        let l = last.clone();
        s.on_change(move |v| l.set(v));
        s.drag_to(-50.0);
        assert_eq!(last.get(), 0.0);
        s.drag_to(-20.0);
        assert_eq!(s.value(), 2.5);
        assert_eq!(stage.measure(s.node()), Size::new(100.0, 16.0));
    }

    #[test]
    fn test_progress_clamps() {
        let stage = Stage::new();
        let p = ProgressBar(&stage, 200.0, 10.0);
        p.set_value(1.5);
        assert_eq!(p.value(), 1.0);
        p.set_value(f32::NAN);
        assert_eq!(p.value(), 0.0);
        // only the track at zero
        assert_eq!(stage.with_node(p.node(), |n| n.graphics.len()), Some(1));
    }

    #[test]
    fn test_toggle_binds_to_signal() {
        let stage = Stage::new();
        let hub = Rc::new(EventHub::new(Size::new(100.0, 100.0)));
        let muted = signal(true);
        let t = Toggle(&stage, false);
        let _b = Binding::bind_control(hub.clone(), t.clone(), muted.clone(), BindOptions::default());
        assert!(t.is_on());

        t.toggle();
        assert!(!muted.get());
        muted.set(true);
        assert!(t.is_on());
    }

    #[test]
    fn test_label_follows_text_scale() {
        let stage = Stage::new();
        let l = with_text_scale(TextScale(2.0), || Label(&stage, "abc"));
        let s = stage.measure(l.node());
        assert_eq!(s.height, 35.0);

        // the scale sticks after the scope ends
        l.set_value("abcdef".to_string());
        assert_eq!(l.value(), "abcdef");
        assert_eq!(stage.measure(l.node()).height, 35.0);
        let b = with_text_scale(TextScale(2.0), || Badge(&stage, "x"));
        let before = stage.measure(b.node()).height;
        b.set_text("y");
        assert_eq!(stage.measure(b.node()).height, before);
    }

    #[test]
    fn test_toggle_press_redraws() {
        let stage = Stage::new();
        let t = Toggle(&stage, false);
        let track = || {
            stage
                .with_node(t.node(), |n| match n.graphics.first() {
                    Some(SceneNode::Rect { color, .. }) => *color,
                    _ => Color::TRANSPARENT,
                })
                .unwrap()
        };
        let th = theme();
        assert_eq!(track(), th.track);

        t.pointer_down(Vec2::ZERO);
        assert!(t.state().contains(WidgetState::PRESSED));
        assert_eq!(track(), th.button_bg_pressed);

        t.pointer_up(Vec2::ZERO);
        assert!(t.is_on());
        assert_eq!(track(), th.accent);
    }
}

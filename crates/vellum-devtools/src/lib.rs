//! Frame-stats HUD for debug overlays.
//!
//! [`Hud`] is a panel pinned to a viewport corner that shows the frame
//! counter, a smoothed FPS estimate and whatever [`Metrics`] the application
//! feeds it. It ticks on the host's post-update phase, so it counts exactly
//! the frames the host runs. With the inspector on, [`Hud::inspect`]
//! outlines the top-most interactive node under a point.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use web_time::Instant;

use vellum_core::*;
use vellum_ui::{Label, Panel};

const PAD: f32 = 6.0;
const EMA: f32 = 0.2;

/// Frame counter with an exponential moving average of the frame rate.
#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    frame_count: u64,
    last_frame: Option<Instant>,
    fps_smooth: f32,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, now: Instant) {
        self.frame_count += 1;
        if let Some(prev) = self.last_frame.replace(now) {
            let dt = now.saturating_duration_since(prev).as_secs_f32();
            if dt > 0.0 {
                let fps = 1.0 / dt;
                self.fps_smooth = if self.fps_smooth == 0.0 {
                    fps
                } else {
                    (1.0 - EMA) * self.fps_smooth + EMA * fps
                };
            }
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fps(&self) -> f32 {
        self.fps_smooth
    }

    /// Time per frame at the smoothed rate.
    pub fn frame_time(&self) -> Option<Duration> {
        (self.fps_smooth > 0.0).then(|| Duration::from_secs_f32(1.0 / self.fps_smooth))
    }
}

/// Application-side numbers shown under the frame stats.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Metrics {
    pub stage_nodes: usize,
    pub scene_commands: usize,
    pub last_flush: FlushReport,
}

impl Metrics {
    /// Node and draw-command counts of `stage`.
    pub fn of(stage: &Stage) -> Self {
        Self {
            stage_nodes: stage.len(),
            scene_commands: stage.render().nodes.len(),
            last_flush: FlushReport::default(),
        }
    }

    pub fn with_flush(mut self, report: FlushReport) -> Self {
        self.last_flush = report;
        self
    }
}

struct HudInner {
    host: Rc<dyn Host>,
    stage: Stage,
    panel: Panel,
    label: Label,
    highlight: NodeId,
    anchor: RefCell<Option<AnchorHandle>>,
    stats: RefCell<FrameStats>,
    metrics: Cell<Option<Metrics>>,
    inspector: Cell<bool>,
    listeners: RefCell<Vec<ListenerId>>,
    destroyed: Cell<bool>,
}

impl HudInner {
    fn lines(&self) -> String {
        let stats = self.stats.borrow();
        let mut lines = vec![
            format!("frame: {}", stats.frame_count()),
            format!("fps: {:.1}", stats.fps()),
        ];
        if let Some(m) = self.metrics.get() {
            lines.push(format!("nodes: {}  cmds: {}", m.stage_nodes, m.scene_commands));
            if m.last_flush.failed > 0 {
                lines.push(format!(
                    "layout: {} ok, {} failed",
                    m.last_flush.laid_out, m.last_flush.failed
                ));
            } else {
                lines.push(format!("layout: {}", m.last_flush.laid_out));
            }
        }
        lines.join("\n")
    }

    fn refresh(&self) {
        if self.destroyed.get() {
            return;
        }
        self.label.set_text(self.lines());
        let s = self.stage.measure(self.label.node());
        self.panel.set_size(s.width + PAD * 2.0, s.height + PAD * 2.0);
        if let Some(a) = self.anchor.borrow().as_ref() {
            a.update();
        }
    }

    fn tick(&self, now: Instant) {
        if self.destroyed.get() {
            return;
        }
        self.stats.borrow_mut().tick(now);
        self.refresh();
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        for id in self.listeners.borrow_mut().drain(..) {
            self.host.off(id);
        }
        if let Some(a) = self.anchor.borrow_mut().take() {
            a.destroy();
        }
        self.panel.destroy();
        self.stage.destroy(self.highlight);
        log::debug!("hud destroyed");
    }
}

/// Stats panel anchored to a viewport corner.
#[derive(Clone)]
pub struct Hud {
    inner: Rc<HudInner>,
}

impl Hud {
    /// Builds the panel and pins it at `corner`, 8 units in from the safe
    /// area edges.
    pub fn new(host: Rc<dyn Host>, stage: &Stage, corner: AnchorPoint) -> Result<Hud> {
        let panel = Panel(stage, 0.0, 0.0);
        panel.set_fill(Color::from_hex("#000000B0"));
        let label = Label(stage, "");
        label.set_font_size(12.0).set_color(Color::from_hex("#AAAAAA"));
        stage.add_child(panel.node(), label.node())?;
        let highlight = stage.spawn(Node::new().named("hud.highlight"));

        let inner = Rc::new(HudInner {
            host: host.clone(),
            stage: stage.clone(),
            panel,
            label,
            highlight,
            anchor: RefCell::new(None),
            stats: RefCell::new(FrameStats::new()),
            metrics: Cell::new(None),
            inspector: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
            destroyed: Cell::new(false),
        });
        inner.refresh();

        let (dx, dy) = inward_offset(corner, 8.0);
        let anchor = anchor_to_viewport(
            host.clone(),
            stage,
            inner.panel.node(),
            AnchorOptions::new(corner).offset(dx, dy),
        )?;
        *inner.anchor.borrow_mut() = Some(anchor);

        let i = inner.clone();
        let frame = host.on_frame(FramePhase::PostUpdate, Box::new(move || i.tick(Instant::now())));
        let i = inner.clone();
        let shutdown = host.on_shutdown(Box::new(move || i.destroy()));
        inner.listeners.borrow_mut().extend([frame, shutdown]);

        Ok(Hud { inner })
    }

    pub fn node(&self) -> NodeId {
        self.inner.panel.node()
    }

    pub fn stats(&self) -> FrameStats {
        self.inner.stats.borrow().clone()
    }

    /// Text currently shown.
    pub fn text(&self) -> String {
        self.inner.label.text()
    }

    /// Counts a frame at `now` without waiting for the host.
    pub fn tick_at(&self, now: Instant) {
        self.inner.tick(now);
    }

    pub fn set_metrics(&self, metrics: Metrics) -> &Self {
        self.inner.metrics.set(Some(metrics));
        self.inner.refresh();
        self
    }

    pub fn set_corner(&self, corner: AnchorPoint) -> &Self {
        let (dx, dy) = inward_offset(corner, 8.0);
        if let Some(a) = self.inner.anchor.borrow().as_ref() {
            a.set_anchor(corner).set_offset(dx, dy);
        }
        self
    }

    pub fn toggle_inspector(&self) -> bool {
        let on = !self.inner.inspector.get();
        self.inner.inspector.set(on);
        if !on {
            self.inner.stage.set_graphics(self.inner.highlight, Vec::new());
        }
        on
    }

    /// Outlines the top-most interactive node under `point` and returns it.
    /// Does nothing while the inspector is off.
    pub fn inspect(&self, point: Vec2) -> Option<NodeId> {
        let i = &self.inner;
        if !i.inspector.get() || i.destroyed.get() {
            return None;
        }
        let hit = i.stage.hit_test(point).first().copied();
        let g = hit
            .and_then(|id| {
                let center = i.stage.world_position(id)?;
                Some(vec![SceneNode::Border {
                    rect: Rect::from_center(center, i.stage.measure(id)),
                    color: Color::from_hex("#44AAFF"),
                    width: 2.0,
                    radius: 0.0,
                }])
            })
            .unwrap_or_default();
        i.stage.set_graphics(i.highlight, g);
        hit
    }

    pub fn destroy(&self) {
        self.inner.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

/// Offset that moves a corner-anchored box `by` units toward the center.
fn inward_offset(corner: AnchorPoint, by: f32) -> (f32, f32) {
    use AnchorPoint::*;
    let dx = match corner {
        TopLeft | CenterLeft | BottomLeft => by,
        TopRight | CenterRight | BottomRight => -by,
        _ => 0.0,
    };
    let dy = match corner {
        TopLeft | TopCenter | TopRight => by,
        BottomLeft | BottomCenter | BottomRight => -by,
        _ => 0.0,
    };
    (dx, dy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_smoothing() {
        let t0 = Instant::now();
        let mut s = FrameStats::new();
        s.tick(t0);
        assert_eq!(s.fps(), 0.0);
        s.tick(t0 + Duration::from_millis(10));
        assert!((s.fps() - 100.0).abs() < 0.5);
        s.tick(t0 + Duration::from_millis(30));
        // 0.8 * 100 + 0.2 * 50
        assert!((s.fps() - 90.0).abs() < 0.5);
        assert_eq!(s.frame_count(), 3);
        assert!(s.frame_time().is_some());
    }

    #[test]
    fn test_hud_ticks_with_host_frames() {
        let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
        let stage = Stage::new();
        let hud = Hud::new(hub.clone(), &stage, AnchorPoint::TopRight).unwrap();
        hub.step(|| {});
        hub.step(|| {});
        assert_eq!(hud.stats().frame_count(), 2);
        assert!(hud.text().starts_with("frame: 2\nfps: "));

        hud.set_metrics(Metrics::of(&stage).with_flush(FlushReport {
            laid_out: 3,
            failed: 1,
        }));
        assert!(hud.text().ends_with("layout: 3 ok, 1 failed"));
    }

    #[test]
    fn test_hud_stays_in_corner() {
        let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
        let stage = Stage::new();
        let hud = Hud::new(hub.clone(), &stage, AnchorPoint::TopRight).unwrap();
        let size = stage.measure(hud.node());
        let p = stage.position(hud.node()).unwrap();
        let close = |a: f32, b: f32| (a - b).abs() < 1e-3;
        assert!(close(p.x + size.width * 0.5, 792.0));
        assert!(close(p.y - size.height * 0.5, 8.0));

        hub.resize(Size::new(400.0, 300.0));
        hud.set_corner(AnchorPoint::BottomLeft);
        let p = stage.position(hud.node()).unwrap();
        assert!(close(p.x - size.width * 0.5, 8.0));
        assert!(close(p.y + size.height * 0.5, 292.0));
    }

    #[test]
    fn test_inspector_outlines_hit() {
        let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
        let stage = Stage::new();
        let hud = Hud::new(hub.clone(), &stage, AnchorPoint::BottomRight).unwrap();
        let target = stage.spawn(Node::new().at(100.0, 100.0).display_size(40.0, 20.0).interactive());

        assert_eq!(hud.inspect(Vec2::new(100.0, 100.0)), None);
        assert!(hud.toggle_inspector());
        assert_eq!(hud.inspect(Vec2::new(100.0, 100.0)), Some(target));
        let outlined = stage.render().nodes.iter().any(|n| {
            matches!(n, SceneNode::Border { rect, width, .. }
                if *rect == Rect::new(80.0, 90.0, 40.0, 20.0) && *width == 2.0)
        });
        assert!(outlined);
    }

    #[test]
    fn test_shutdown_releases_hud() {
        let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
        let stage = Stage::new();
        let hud = Hud::new(hub.clone(), &stage, AnchorPoint::TopLeft).unwrap();
        hub.shutdown();
        assert!(hud.is_destroyed());
        assert!(stage.is_empty());
    }
}

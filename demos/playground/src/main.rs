use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use anyhow::{Context, bail};
use serde_json::{Value, json};
use vellum_core::*;
use vellum_devtools::{Hud, Metrics};
use vellum_ui::*;

/// Panel dimensions for one screen class.
#[derive(Clone, Copy, Debug)]
struct Layout {
    viewport: Size,
    /// Size the simulated window is dragged to halfway through.
    resized: Size,
    list: Size,
    badge_columns: usize,
    row_height: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Preset {
    Compact,
    Wide,
}

impl Preset {
    fn layout(self) -> Layout {
        match self {
            Preset::Compact => Layout {
                viewport: Size::new(480.0, 320.0),
                resized: Size::new(360.0, 640.0),
                list: Size::new(180.0, 120.0),
                badge_columns: 2,
                row_height: 18.0,
            },
            Preset::Wide => Layout {
                viewport: Size::new(1280.0, 720.0),
                resized: Size::new(1920.0, 1080.0),
                list: Size::new(320.0, 220.0),
                badge_columns: 3,
                row_height: 24.0,
            },
        }
    }
}

impl FromStr for Preset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Preset::Compact),
            "wide" => Ok(Preset::Wide),
            other => bail!("unknown preset {other:?} (expected compact or wide)"),
        }
    }
}

/// Render backend that logs a one-line summary per frame.
#[derive(Default)]
struct TextBackend {
    surface: (u32, u32),
    frames: u64,
}

impl RenderBackend for TextBackend {
    fn configure_surface(&mut self, width: u32, height: u32) {
        self.surface = (width, height);
        log::info!("surface {width}x{height}");
    }

    fn frame(&mut self, scene: &Scene) {
        self.frames += 1;
        let (mut shapes, mut texts, mut clips) = (0, 0, 0);
        for n in &scene.nodes {
            match n {
                SceneNode::Text { .. } => texts += 1,
                SceneNode::PushClip { .. } => clips += 1,
                SceneNode::PopClip => {}
                _ => shapes += 1,
            }
        }
        log::trace!(
            "frame {} @{}x{}: {shapes} shapes, {texts} texts, {clips} clips",
            self.frames,
            self.surface.0,
            self.surface.1
        );
    }
}

/// Widgets the simulation keeps poking at.
struct Overlay {
    list: ScrollViewport,
    progress: ProgressBar,
    quality: Switch,
    _bindings: Vec<Binding>,
    _anchors: Vec<AnchorHandle>,
}

fn log_row(stage: &Stage, list: &ScrollViewport, row_height: f32, text: &str) -> Result<()> {
    let label = Label(stage, text);
    label.set_font_size(12.0);
    let half_w = stage.measure(label.node()).width * 0.5;
    let y = list.items().len() as f32 * row_height + row_height * 0.5;
    label.set_position(half_w + 4.0, y);
    list.add_item(label.node())?;
    Ok(())
}

fn build_overlay(
    hub: &Rc<EventHub>,
    stage: &Stage,
    scheduler: &LayoutScheduler,
    settings: &Rc<RefCell<Value>>,
    layout: Layout,
) -> anyhow::Result<Overlay> {
    let host: Rc<dyn Host> = hub.clone();
    let mut bindings = Vec::new();

    let quality = Switch(stage, ["low", "medium", "high"]);
    bindings.push(Binding::bind_control(
        host.clone(),
        quality.clone(),
        PathModel::new(settings.clone(), "render.quality")?,
        BindOptions::default(),
    ));
    let vsync = Toggle(stage, false);
    bindings.push(Binding::bind_control(
        host.clone(),
        vsync.clone(),
        PathModel::new(settings.clone(), "render.vsync")?,
        BindOptions::default(),
    ));
    let scale = Slider(stage, 140.0, (0.5, 2.0), Some(0.25));
    bindings.push(Binding::bind_control(
        host.clone(),
        scale.clone(),
        PathModel::new(settings.clone(), "render.scale")?,
        BindOptions::default(),
    ));
    let progress = ProgressBar(stage, 140.0, 8.0);

    let badges = Grid(stage, layout.badge_columns).gaps(4.0, 4.0);
    for tag in ["cpu", "gpu", "net", "io", "ui", "log"] {
        badges.add(Badge(stage, tag).node())?;
    }
    badges.layout();

    let list = ScrollViewport(host.clone(), stage, layout.list.width, layout.list.height);
    list.set_background(Some(theme().surface)).set_radius(4.0);
    for i in 0..12 {
        log_row(stage, &list, layout.row_height, &format!("event #{i}"))?;
    }

    let clear = Button(stage, "clear log");
    {
        let list = list.clone();
        clear.on_click(move || {
            list.remove_all_items(true);
            log::info!("log cleared");
        });
    }

    let settings_col = Column(stage).gap(6.0).align(Align::Start);
    settings_col.add_many([
        Label(stage, "settings").node(),
        quality.node(),
        vsync.node(),
        scale.node(),
        progress.node(),
        badges.node(),
        clear.node(),
    ])?;
    settings_col.layout();
    settings_col.schedule_with(scheduler);

    let anchors = vec![
        anchor_to_viewport(
            host.clone(),
            stage,
            settings_col.node(),
            AnchorOptions::new(AnchorPoint::TopLeft).offset(8.0, 8.0),
        )?,
        anchor_to_viewport(
            host,
            stage,
            list.node(),
            AnchorOptions::new(AnchorPoint::BottomCenter).offset(0.0, -8.0),
        )?,
    ];

    Ok(Overlay {
        list,
        progress,
        quality,
        _bindings: bindings,
        _anchors: anchors,
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let preset: Preset = args.next().as_deref().unwrap_or("compact").parse()?;
    let frames: u32 = match args.next() {
        Some(s) => s.parse().with_context(|| format!("frame count {s:?}"))?,
        None => 90,
    };
    let layout = preset.layout();
    log::info!("preset {preset:?}, {frames} frames");

    let hub = Rc::new(EventHub::new(layout.viewport));
    let stage = Stage::new();
    let scheduler = LayoutScheduler::new(hub.clone(), FramePhase::PostUpdate);
    let settings = Rc::new(RefCell::new(json!({
        "render": { "quality": 1, "vsync": true, "scale": 1.0 }
    })));

    let overlay = build_overlay(&hub, &stage, &scheduler, &settings, layout)?;
    let hud = Hud::new(hub.clone(), &stage, AnchorPoint::TopRight)?;
    let scroll_log = overlay.list.on_scroll(|e| {
        log::debug!("log scrolled to {:.0}/{:.0}", e.scroll_y, e.max_scroll_y);
    });

    let mut backend = TextBackend::default();
    backend.configure_surface(layout.viewport.width as u32, layout.viewport.height as u32);

    for frame in 0..frames {
        if frame == frames / 2 {
            hub.resize(layout.resized);
            backend.configure_surface(layout.resized.width as u32, layout.resized.height as u32);
        }
        if frame % 6 == 0
            && let Some(p) = stage.world_position(overlay.list.node())
        {
            let dy = if frame < frames / 2 { 1.0 } else { -1.0 };
            let ev = WheelEvent::at(&stage, p, 0.0, dy);
            hub.dispatch_wheel(&ev);
            if !ev.default_prevented() {
                log::debug!("wheel at frame {frame} left the list in place");
            }
        }

        hub.step(|| {
            overlay.progress.set_value(frame as f32 / frames.max(1) as f32);
            if frame % 30 == 29 {
                overlay.quality.next();
            }
            if frame == frames.saturating_sub(10) {
                if let Err(e) = log_row(&stage, &overlay.list, layout.row_height, "late event") {
                    log::warn!("{e}");
                }
                scheduler.mark_dirty(&overlay.list);
            }
        });

        hud.set_metrics(Metrics::of(&stage));
        backend.frame(&stage.render());
    }

    overlay.list.off_scroll(scroll_log);
    log::info!(
        "done: {} frames rendered, log at {:.0}/{:.0}",
        backend.frames,
        overlay.list.scroll_y(),
        overlay.list.max_scroll_y()
    );
    println!("{}", serde_json::to_string_pretty(&*settings.borrow())?);
    println!("{}", hud.text());

    hub.shutdown();
    Ok(())
}

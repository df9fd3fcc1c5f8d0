#![allow(non_snake_case)]
//! # Widgets, containers and the scroll viewport
//!
//! Everything here is built from [`vellum_core::Stage`] nodes and plain
//! vector commands. Constructors are capitalized functions, so building an
//! overlay reads like a tree:
//!
//! ```rust
//! use std::rc::Rc;
//! use vellum_core::*;
//! use vellum_ui::*;
//!
//! let hub = Rc::new(EventHub::new(Size::new(800.0, 600.0)));
//! let stage = Stage::new();
//!
//! let stats = Column(&stage).gap(4.0).align(Align::Start);
//! stats.add(Label(&stage, "fps 60").node()).unwrap();
//! stats.add(Badge(&stage, "debug").node()).unwrap();
//! stats.layout();
//!
//! let list = ScrollViewport(hub.clone(), &stage, 160.0, 120.0);
//! list.add_item(stats.node()).unwrap();
//! assert_eq!(list.max_scroll_y(), 0.0);
//! ```
//!
//! Widgets pick their colors from [`vellum_core::theme`] when they redraw;
//! wrap construction in `with_theme` to restyle a subtree.

pub mod layout;
pub mod scroll;
pub mod widgets;

pub use layout::*;
pub use scroll::*;
pub use widgets::*;

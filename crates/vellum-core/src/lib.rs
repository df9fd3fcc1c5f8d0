//! # Stage, Host, and the layout core
//!
//! Vellum draws debug overlays out of vector shapes and text. The core crate
//! holds everything that is not a concrete widget:
//!
//! - [`Stage`]: a node arena. Every widget is one or more nodes with a
//!   position (the box center, relative to its parent), an optional size,
//!   an optional clip, and a list of [`SceneNode`] graphics.
//! - [`Host`]: what the embedding application provides. Frame callbacks,
//!   resize, wheel input and shutdown. [`EventHub`] is the in-process one.
//! - [`LayoutScheduler`]: batches `layout()` calls to once per frame.
//! - [`anchor_to_viewport`]: pins a node to a corner or edge of the viewport,
//!   inside the safe area.
//! - [`Binding`]: keeps a control and a model value in sync.
//!
//! ## Nodes
//!
//! ```rust
//! use vellum_core::*;
//!
//! let stage = Stage::new();
//! let panel = stage.spawn(Node::new().at(100.0, 50.0).display_size(120.0, 40.0));
//! let dot = stage.spawn_child(panel, Node::new().at(10.0, 0.0)).unwrap();
//!
//! assert_eq!(stage.world_position(dot), Some(Vec2::new(110.0, 50.0)));
//! assert_eq!(stage.measure(panel), Size::new(120.0, 40.0));
//!
//! stage.destroy(panel);
//! assert!(!stage.contains(dot));
//! ```
//!
//! ## Measuring
//!
//! Anything that can report a size implements [`Measurable`]. The probe order
//! is: displayed size, then intrinsic size, then bounding box, then zero.
//!
//! ## Errors
//!
//! Configuration mistakes (a stale node id, an empty model path, an unknown
//! anchor name) come back as [`Error`]. Runtime no-ops (scrolling an empty
//! list, a zero-area viewport) never error; they fall back to a safe default.

pub mod anchor;
pub mod binding;
pub mod color;
pub mod effects;
pub mod error;
pub mod geometry;
pub mod host;
pub mod locals;
pub mod measure;
pub mod render_api;
pub mod scheduler;
pub mod signal;
pub mod stage;
pub mod view;

#[cfg(test)]
mod tests;

pub use anchor::*;
pub use binding::*;
pub use color::*;
pub use effects::*;
pub use error::{Error, Result};
pub use geometry::*;
pub use host::*;
pub use locals::*;
pub use measure::*;
pub use render_api::*;
pub use scheduler::*;
pub use signal::*;
pub use stage::*;
pub use view::*;

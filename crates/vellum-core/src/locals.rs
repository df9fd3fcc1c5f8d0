//! # Theming and locals
//!
//! Widget colors come from a flat [`Theme`] held in thread-local
//! "composition locals". Widgets read `theme()` when they are created and when
//! they redraw, so a subtree built inside `with_theme` picks up the override:
//!
//! ```rust
//! use vellum_core::*;
//!
//! let amber = Theme {
//!     accent: Color::from_hex("#FFB300"),
//!     ..Theme::default()
//! };
//!
//! with_theme(amber, || {
//!     assert_eq!(theme().accent, Color::from_hex("#FFB300"));
//! });
//! assert_ne!(theme().accent, Color::from_hex("#FFB300"));
//! ```
//!
//! `TextScale` multiplies every label's font size, for hi-dpi debug overlays.
//! Widgets read it once, when they are built.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::Color;

thread_local! {
    static LOCALS_STACK: RefCell<Vec<HashMap<TypeId, Box<dyn Any>>>> = RefCell::new(Vec::new());
}

/// Flat color parameters shared by every widget.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Theme {
    /// Panel and viewport background.
    pub surface: Color,
    /// Panel outline.
    pub outline: Color,
    /// Default label color.
    pub text: Color,
    /// Labels on disabled widgets.
    pub text_disabled: Color,

    /// Accent for progress fills, active toggles, slider thumbs.
    pub accent: Color,
    /// Foreground on top of `accent`.
    pub on_accent: Color,

    pub button_bg: Color,
    pub button_bg_hover: Color,
    pub button_bg_pressed: Color,
    pub button_bg_disabled: Color,

    /// Unfilled part of progress bars, sliders and toggles.
    pub track: Color,

    pub scrollbar_track: Color,
    pub scrollbar_thumb: Color,

    pub badge_bg: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface: Color::from_hex("#1E1E1ECC"),
            outline: Color::from_hex("#555555"),
            text: Color::from_hex("#DDDDDD"),
            text_disabled: Color::from_hex("#777777"),
            accent: Color::from_hex("#34AF82"),
            on_accent: Color::WHITE,
            button_bg: Color::from_hex("#2D2D2D"),
            button_bg_hover: Color::from_hex("#3A3A3A"),
            button_bg_pressed: Color::from_hex("#1F7556"),
            button_bg_disabled: Color::from_hex("#262626"),
            track: Color::from_hex("#3A3A3A"),
            scrollbar_track: Color(0xDD, 0xDD, 0xDD, 32),
            scrollbar_thumb: Color(0xDD, 0xDD, 0xDD, 140),
            badge_bg: Color::from_hex("#0061A4"),
            error: Color::from_hex("#AE3636"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextScale(pub f32);
impl Default for TextScale {
    fn default() -> Self {
        Self(1.0)
    }
}

fn with_locals_frame<R>(f: impl FnOnce() -> R) -> R {
    // pops on unwind too
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            LOCALS_STACK.with(|st| {
                st.borrow_mut().pop();
            });
        }
    }
    LOCALS_STACK.with(|st| st.borrow_mut().push(HashMap::new()));
    let _guard = Guard;
    f()
}

fn set_local<T: 'static>(v: T) {
    LOCALS_STACK.with(|st| {
        let mut st = st.borrow_mut();
        if let Some(top) = st.last_mut() {
            top.insert(TypeId::of::<T>(), Box::new(v));
        }
    });
}

fn local<T: Copy + Default + 'static>() -> T {
    LOCALS_STACK.with(|st| {
        for frame in st.borrow().iter().rev() {
            if let Some(v) = frame.get(&TypeId::of::<T>())
                && let Some(t) = v.downcast_ref::<T>()
            {
                return *t;
            }
        }
        T::default()
    })
}

pub fn with_theme<R>(theme: Theme, f: impl FnOnce() -> R) -> R {
    with_locals_frame(|| {
        set_local(theme);
        f()
    })
}

pub fn with_text_scale<R>(ts: TextScale, f: impl FnOnce() -> R) -> R {
    with_locals_frame(|| {
        set_local(ts);
        f()
    })
}

pub fn theme() -> Theme {
    local::<Theme>()
}

pub fn text_scale() -> TextScale {
    local::<TextScale>()
}

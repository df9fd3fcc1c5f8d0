use std::str::FromStr;

use crate::Error;

/// 8-bit sRGB color with straight alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color(pub u8, pub u8, pub u8, pub u8);

/// Color with every channel normalized into `0.0..=1.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color(0, 0, 0, 0);
    pub const BLACK: Color = Color(0, 0, 0, 255);
    pub const WHITE: Color = Color(255, 255, 255, 255);

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Color(r, g, b, 255)
    }
    pub fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color(r, g, b, a)
    }

    /// Parses `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa` (the `#` and a `0x`
    /// prefix are optional).
    pub fn parse_hex(hex: &str) -> Result<Self, Error> {
        let s = hex.trim();
        let s = s
            .strip_prefix('#')
            .or_else(|| s.strip_prefix("0x"))
            .unwrap_or(s);
        let invalid = || Error::InvalidColor(hex.to_string());
        if !s.is_ascii() {
            return Err(invalid());
        }
        let digit = |c: &str| u8::from_str_radix(c, 16).map_err(|_| invalid());
        // shorthand digits are doubled: "f" -> "ff"
        let short = |c: &str| digit(c).map(|v| v * 17);
        match s.len() {
            3 => Ok(Color(short(&s[0..1])?, short(&s[1..2])?, short(&s[2..3])?, 255)),
            4 => Ok(Color(
                short(&s[0..1])?,
                short(&s[1..2])?,
                short(&s[2..3])?,
                short(&s[3..4])?,
            )),
            6 => Ok(Color(digit(&s[0..2])?, digit(&s[2..4])?, digit(&s[4..6])?, 255)),
            8 => Ok(Color(
                digit(&s[0..2])?,
                digit(&s[2..4])?,
                digit(&s[4..6])?,
                digit(&s[6..8])?,
            )),
            _ => Err(invalid()),
        }
    }

    /// Lenient variant for literals in themes: malformed input logs and yields
    /// opaque black.
    pub fn from_hex(hex: &str) -> Self {
        Self::parse_hex(hex).unwrap_or_else(|e| {
            log::warn!("{e}; falling back to black");
            Color::BLACK
        })
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Color(self.0, self.1, self.2, a)
    }

    /// Scales alpha by `f` (clamped).
    pub fn mul_alpha(self, f: f32) -> Self {
        let a = ((self.3 as f32) * f).clamp(0.0, 255.0) as u8;
        self.with_alpha(a)
    }

    pub fn normalized(self) -> Rgba {
        Rgba {
            r: self.0 as f32 / 255.0,
            g: self.1 as f32 / 255.0,
            b: self.2 as f32 / 255.0,
            a: self.3 as f32 / 255.0,
        }
    }

    /// Packed `0xRRGGBB`, the form most 2D hosts take for fill colors.
    pub fn to_rgb_u32(self) -> u32 {
        ((self.0 as u32) << 16) | ((self.1 as u32) << 8) | self.2 as u32
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse_hex(s)
    }
}

impl From<Color> for Rgba {
    fn from(c: Color) -> Self {
        c.normalized()
    }
}

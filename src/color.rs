use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{PixelportError, PixelportResult};

/// Straight-alpha RGB color. The wire form is a `#RRGGBB` hex string, matching
/// what the canvas server stores and broadcasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(s: &str) -> PixelportResult<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PixelportError::protocol(format!(
                "invalid color literal '{s}' (expected #RRGGBB)"
            )));
        }
        let byte = |range: std::ops::Range<usize>| -> u8 {
            u8::from_str_radix(&hex[range], 16).unwrap_or(0)
        };
        Ok(Self {
            r: byte(0..2),
            g: byte(2..4),
            b: byte(4..6),
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Visual effect a pixel can carry through the renderer's effect pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelEffect {
    Glow,
    Spark,
}

/// The one color-to-effect lookup shared by every ingestion path (region merge,
/// single update, batch update). An explicit wire tag always wins over this
/// inference; see [`resolve_effect`].
pub fn effect_for_color(color: Color) -> Option<PixelEffect> {
    const GOLD: Color = Color::new(0xFF, 0xD7, 0x00);
    const WHITE_HOT: Color = Color::new(0xFF, 0xFF, 0xFF);
    match color {
        c if c == GOLD => Some(PixelEffect::Glow),
        c if c == WHITE_HOT => Some(PixelEffect::Spark),
        _ => None,
    }
}

/// Effect resolution for an incoming pixel: explicit tag first, inference second.
pub fn resolve_effect(explicit: Option<PixelEffect>, color: Color) -> Option<PixelEffect> {
    explicit.or_else(|| effect_for_color(color))
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Opaque RGB stroke color, written as a `#rrggbb` hex string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };
    pub const RED: Color = Color { r: 255, g: 0, b: 0 };
    pub const YELLOW: Color = Color { r: 255, g: 255, b: 0 };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components scaled to `0.0..=1.0`.
    pub fn to_normalized(&self) -> (f32, f32, f32) {
        (self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidColor(value.to_owned());
        let digits = value.trim().strip_prefix('#').ok_or_else(invalid)?;

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |hex: &str| u8::from_str_radix(hex, 16).map_err(|_| invalid());

        match digits.len() {
            6 => Ok(Self {
                r: channel(&digits[0..2])?,
                g: channel(&digits[2..4])?,
                b: channel(&digits[4..6])?,
            }),
            // #rgb shorthand expands each nibble: #f80 == #ff8800
            3 => {
                let nibble = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
                Ok(Self { r: nibble(0)?, g: nibble(1)?, b: nibble(2)? })
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!("#FF8800".parse::<Color>().unwrap(), Color::rgb(255, 136, 0));
        assert_eq!("#f80".parse::<Color>().unwrap(), Color::rgb(255, 136, 0));
    }

    #[test]
    fn rejects_malformed_hex() {
        for bad in ["ff8800", "#ff88", "#gg0000", "", "#"] {
            assert!(bad.parse::<Color>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn serializes_as_lowercase_hex() {
        let json = serde_json::to_string(&Color::rgb(171, 205, 239)).unwrap();
        assert_eq!(json, "\"#abcdef\"");
    }

    #[test]
    fn normalized_components() {
        assert_eq!(Color::RED.to_normalized(), (1.0, 0.0, 0.0));
    }
}

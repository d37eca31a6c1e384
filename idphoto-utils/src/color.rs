//! Basic color utilities shared across the core and CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Simple RGBA color stored in 8-bit channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RgbaColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl RgbaColor {
    /// Plain white, the default backdrop for ID photos and print sheets.
    pub const WHITE: Self = Self::opaque(255, 255, 255);

    /// Constructs an opaque RGB color.
    pub const fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 255,
        }
    }

    /// Returns the color channels as an `image::Rgb` pixel (alpha is dropped).
    pub const fn to_rgb(self) -> image::Rgb<u8> {
        image::Rgb([self.red, self.green, self.blue])
    }

    /// Returns the color as an `image::Rgba` pixel.
    pub const fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.red, self.green, self.blue, self.alpha])
    }

    /// Formats the color as `#RRGGBB`.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

impl Default for RgbaColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for RgbaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Parse a six-digit hexadecimal color, with or without a leading `#`.
///
/// Shorthand (`#FFF`) and alpha (`#RRGGBBAA`) forms are rejected: background and sheet
/// colors are always opaque and always spelled out.
pub fn parse_hex_color(input: &str) -> Option<RgbaColor> {
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(RgbaColor::opaque(
        parse_byte(hex.get(0..2)?)?,
        parse_byte(hex.get(2..4)?)?,
        parse_byte(hex.get(4..6)?)?,
    ))
}

fn parse_byte(slice: &str) -> Option<u8> {
    u8::from_str_radix(slice, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_hash() {
        assert_eq!(parse_hex_color("#FFFFFF"), Some(RgbaColor::WHITE));
        assert_eq!(
            parse_hex_color("1a2B3c"),
            Some(RgbaColor::opaque(0x1a, 0x2b, 0x3c))
        );
        assert_eq!(
            parse_hex_color("  #0000ff "),
            Some(RgbaColor::opaque(0, 0, 255))
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "#", "#FFF", "#FFFFFFFF", "GGGGGG", "#12345", "##FFFFFF", "+12345"] {
            assert!(parse_hex_color(bad).is_none(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn hex_formatting_round_trips() {
        let color = RgbaColor::opaque(12, 200, 7);
        assert_eq!(color.to_hex(), "#0CC807");
        assert_eq!(parse_hex_color(&color.to_hex()), Some(color));
    }
}

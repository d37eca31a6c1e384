//! Named photo and sheet sizes.
//!
//! Photo sizes are pixel dimensions at 300 DPI: passport is 35x45 mm, stamp is 20x25 mm.

use crate::{cropper::TargetSize, error::PhotoError, sheet::SheetSize};

/// A named output size preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizePreset {
    /// Display name for `--list-presets`.
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    /// Short description for `--list-presets`.
    pub description: &'static str,
}

impl SizePreset {
    pub const fn new(
        name: &'static str,
        width: u32,
        height: u32,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            width,
            height,
            description,
        }
    }

    /// The preset as a crop target.
    pub fn target(&self) -> Result<TargetSize, PhotoError> {
        TargetSize::new(self.width, self.height)
    }

    /// The preset as a sheet canvas.
    pub fn sheet(&self) -> SheetSize {
        SheetSize {
            width: self.width,
            height: self.height,
        }
    }
}

pub const PASSPORT: SizePreset =
    SizePreset::new("Passport", 413, 531, "Passport photo, 35x45 mm at 300 DPI");
pub const STAMP: SizePreset =
    SizePreset::new("Stamp", 236, 295, "Stamp-size photo, 20x25 mm at 300 DPI");
pub const A4_300DPI: SizePreset =
    SizePreset::new("A4 300dpi", 2480, 3508, "A4 print sheet at 300 DPI");

static PHOTO_PRESETS: [SizePreset; 2] = [PASSPORT, STAMP];
static SHEET_PRESETS: [SizePreset; 1] = [A4_300DPI];

pub fn photo_presets() -> &'static [SizePreset] {
    &PHOTO_PRESETS
}

pub fn sheet_presets() -> &'static [SizePreset] {
    &SHEET_PRESETS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_output_contract() {
        assert_eq!((PASSPORT.width, PASSPORT.height), (413, 531));
        assert_eq!((STAMP.width, STAMP.height), (236, 295));
        assert_eq!(A4_300DPI.sheet(), SheetSize::A4_300DPI);
    }

    #[test]
    fn photo_presets_are_valid_targets() {
        for p in photo_presets() {
            assert!(p.target().is_ok(), "{} should be a valid target", p.name);
        }
    }
}

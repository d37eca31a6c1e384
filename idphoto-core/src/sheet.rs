//! Print sheet tiling.
//!
//! Copies of one already-sized photo are placed row-major on a fixed canvas. The first copy
//! sits at `(margin, margin)`; the leftover space in each direction is split evenly between
//! the gaps, so the outermost copies touch the margins on a full row or column. A short
//! last row stays left-aligned.
//!
//! Spacing uses floor division and may be negative when the copies do not fit; they then
//! overlap, and anything past the canvas edge is clipped. That is treated as valid geometry.

use image::{RgbImage, imageops};
use log::debug;

use crate::error::PhotoError;
use idphoto_utils::{RgbaColor, timing_guard};

/// Canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetSize {
    pub width: u32,
    pub height: u32,
}

impl SheetSize {
    /// A4 at 300 DPI.
    pub const A4_300DPI: Self = Self {
        width: 2480,
        height: 3508,
    };
}

/// How many copies to place, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSpec {
    pub copies: u32,
    pub columns: u32,
    pub sheet: SheetSize,
    pub margin: u32,
    pub fill: RgbaColor,
}

impl LayoutSpec {
    /// `copies` at `columns` per row on a white A4 sheet with a 100 px margin.
    pub fn a4(copies: u32, columns: u32) -> Self {
        Self {
            copies,
            columns,
            sheet: SheetSize::A4_300DPI,
            margin: 100,
            fill: RgbaColor::WHITE,
        }
    }
}

/// Resolved grid: spacing and the top-left corner of every placement, in placement order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetGrid {
    pub rows: u32,
    pub columns: u32,
    pub spacing_x: i64,
    pub spacing_y: i64,
    pub placements: Vec<(i64, i64)>,
}

/// Compute the grid for an `image_w` x `image_h` photo.
///
/// ```rust
/// # use idphoto_core::sheet::{compute_grid, LayoutSpec};
/// let grid = compute_grid(413, 531, &LayoutSpec::a4(6, 3)).unwrap();
/// assert_eq!((grid.rows, grid.spacing_x, grid.spacing_y), (2, 520, 2246));
/// assert_eq!(grid.placements[4], (1033, 2877));
/// ```
pub fn compute_grid(image_w: u32, image_h: u32, spec: &LayoutSpec) -> Result<SheetGrid, PhotoError> {
    if spec.copies == 0 {
        return Err(PhotoError::InvalidLayout("copies must be at least 1".into()));
    }
    if spec.columns == 0 {
        return Err(PhotoError::InvalidLayout("columns must be at least 1".into()));
    }

    let columns = spec.columns;
    let rows = spec.copies.div_ceil(columns);
    let margin = i64::from(spec.margin);
    let (img_w, img_h) = (i64::from(image_w), i64::from(image_h));

    let spacing_x = even_gap(i64::from(spec.sheet.width), margin, columns, img_w);
    let spacing_y = even_gap(i64::from(spec.sheet.height), margin, rows, img_h);

    let placements = (0..spec.copies)
        .map(|i| {
            let (row, col) = (i64::from(i / columns), i64::from(i % columns));
            (
                margin + col * (img_w + spacing_x),
                margin + row * (img_h + spacing_y),
            )
        })
        .collect();

    Ok(SheetGrid {
        rows,
        columns,
        spacing_x,
        spacing_y,
        placements,
    })
}

/// Gap between `count` items of `item` px spread across `extent` minus two margins.
fn even_gap(extent: i64, margin: i64, count: u32, item: i64) -> i64 {
    if count <= 1 {
        return 0;
    }
    let count = i64::from(count);
    (extent - 2 * margin - count * item).div_euclid(count - 1)
}

/// Render `image` onto a new sheet according to `spec`.
pub fn layout(image: &RgbImage, spec: &LayoutSpec) -> Result<RgbImage, PhotoError> {
    let _guard = timing_guard("idphoto_core::layout", log::Level::Debug);
    let grid = compute_grid(image.width(), image.height(), spec)?;
    debug!(
        "Sheet {}x{}: {} copies on {}x{} grid, spacing ({}, {})",
        spec.sheet.width,
        spec.sheet.height,
        spec.copies,
        grid.rows,
        grid.columns,
        grid.spacing_x,
        grid.spacing_y
    );

    let mut canvas = RgbImage::from_pixel(spec.sheet.width, spec.sheet.height, spec.fill.to_rgb());
    for &(x, y) in &grid.placements {
        imageops::replace(&mut canvas, image, x, y);
    }
    Ok(canvas)
}

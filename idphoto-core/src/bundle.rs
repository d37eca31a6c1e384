//! Export bundling: JPEG assets, the printable PDF, and the zip archive around them.

use std::{
    fs,
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use image::{DynamicImage, RgbImage};
use indexmap::IndexMap;
use log::{debug, info};
use lopdf::{
    Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::error::PhotoError;
use idphoto_utils::{encode_jpeg, timing_guard, write_bytes};

/// JPEG quality used for every raster asset unless overridden.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

pub const PASSPORT_ASSET: &str = "passport_single.jpg";
pub const STAMP_ASSET: &str = "stamp_single.jpg";
pub const ARCHIVE_NAME: &str = "processed_photos.zip";

/// File name of the JPEG sheet holding `copies` photos.
pub fn sheet_asset_name(copies: u32) -> String {
    format!("layout_{copies}.jpg")
}

/// File name of the printable PDF for the sheet holding `copies` photos.
pub fn pdf_asset_name(copies: u32) -> String {
    format!("a4_layout{copies}.pdf")
}

/// Ordered, uniquely named set of encoded assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportBundle {
    assets: IndexMap<String, Vec<u8>>,
}

impl ExportBundle {
    fn insert(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), PhotoError> {
        if self.assets.contains_key(name) {
            return Err(PhotoError::encoding(
                name,
                anyhow::anyhow!("duplicate asset name"),
            ));
        }
        self.assets.insert(name.to_string(), bytes);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.assets.get(name).map(Vec::as_slice)
    }

    /// Asset names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.assets
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Total encoded size in bytes.
    pub fn total_bytes(&self) -> usize {
        self.assets.values().map(Vec::len).sum()
    }

    /// Package every asset into an uncompressed zip, in insertion order.
    pub fn to_zip(&self) -> Result<Vec<u8>, PhotoError> {
        let _guard = timing_guard("idphoto_core::bundle_zip", log::Level::Debug);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, bytes) in &self.assets {
            writer
                .start_file(name.as_str(), options)
                .map_err(|err| PhotoError::encoding(name.as_str(), err))?;
            writer
                .write_all(bytes)
                .map_err(|err| PhotoError::encoding(name.as_str(), err))?;
        }
        let cursor = writer
            .finish()
            .map_err(|err| PhotoError::encoding(ARCHIVE_NAME, err))?;
        Ok(cursor.into_inner())
    }

    /// Write every asset as a loose file under `dir`, returning the written paths.
    pub fn write_to_dir(&self, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        let mut written = Vec::with_capacity(self.assets.len());
        for (name, bytes) in &self.assets {
            let path = dir.join(name);
            write_bytes(&path, bytes)?;
            written.push(path);
        }
        info!("Wrote {} assets to {}", written.len(), dir.display());
        Ok(written)
    }
}

/// Encode named rasters as JPEG at [`DEFAULT_JPEG_QUALITY`], plus an optional sheet
/// rendered as a one-page PDF.
///
/// Names must be unique across images and the document; a collision is reported as
/// [`PhotoError::AssetEncodingFailed`] and nothing is returned.
pub fn bundle(
    named_images: &[(&str, &RgbImage)],
    document: Option<(&str, &RgbImage)>,
) -> Result<ExportBundle, PhotoError> {
    bundle_with_quality(named_images, document, DEFAULT_JPEG_QUALITY)
}

/// [`bundle`] with an explicit JPEG quality (clamped to `1..=100`).
pub fn bundle_with_quality(
    named_images: &[(&str, &RgbImage)],
    document: Option<(&str, &RgbImage)>,
    quality: u8,
) -> Result<ExportBundle, PhotoError> {
    let _guard = timing_guard("idphoto_core::bundle", log::Level::Debug);
    let mut bundle = ExportBundle::default();

    for &(name, image) in named_images {
        let jpeg = encode_rgb_jpeg(name, image, quality)?;
        bundle.insert(name, jpeg)?;
    }

    if let Some((name, sheet)) = document {
        let jpeg = encode_rgb_jpeg(name, sheet, quality)?;
        let pdf = encode_single_page_pdf(&jpeg, sheet.width(), sheet.height())
            .map_err(|err| PhotoError::encoding(name, err))?;
        bundle.insert(name, pdf)?;
    }

    debug!(
        "Bundled {} assets ({} bytes)",
        bundle.len(),
        bundle.total_bytes()
    );
    Ok(bundle)
}

fn encode_rgb_jpeg(name: &str, image: &RgbImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
    encode_jpeg(&DynamicImage::ImageRgb8(image.clone()), quality)
        .map_err(|err| PhotoError::encoding(name, err))
}

/// Single-page PDF whose MediaBox is `width` x `height` points with `jpeg` drawn full-page.
///
/// One pixel maps to one point, so a 2480x3508 sheet yields a 2480x3508 pt page; the print
/// dialog's fit-to-page scales it onto A4.
pub fn encode_single_page_pdf(jpeg: &[u8], width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
    anyhow::ensure!(width > 0 && height > 0, "PDF page must have a non-zero size");
    let (w, h) = (i64::from(width), i64::from(height));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w,
            "Height" => h,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(h),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().context("failed to encode PDF content stream")?,
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(w),
            Object::Integer(h),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .context("failed to serialize PDF document")?;
    Ok(buffer)
}

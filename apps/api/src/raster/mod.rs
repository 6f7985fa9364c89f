//! Document rasterizer — renders the first page of a PDF to a PNG preview.
//!
//! pdfium is not safe to drive from async worker threads, so the render runs
//! on the blocking pool.

use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use pdfium_render::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::storage::UploadedFile;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("pdfium library unavailable: {0}")]
    Library(String),

    #[error("not a PDF document")]
    NotPdf,

    #[error("document could not be loaded: {0}")]
    Load(String),

    #[error("document has no pages")]
    NoPages,

    #[error("page render failed: {0}")]
    Render(String),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("render task failed: {0}")]
    Task(String),

    #[error("preview edge of {0} px is out of range")]
    Size(u32),
}

/// A rendered preview, ready to upload.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub file: UploadedFile,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn convert(&self, document: &UploadedFile) -> Result<RasterImage, RasterizeError>;
}

/// True when the bytes start with the PDF header.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// `resume.pdf` → `resume.png`; names without an extension get `.png` appended.
pub fn preview_file_name(document_name: &str) -> String {
    let stem = match document_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => document_name,
    };
    format!("{stem}.png")
}

/// Encodes a rendered page as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Converts the configured edge length to the `i32` pdfium expects.
fn render_edge(max_pixels: u32) -> Result<i32, RasterizeError> {
    match i32::try_from(max_pixels) {
        Ok(edge) if edge > 0 => Ok(edge),
        _ => Err(RasterizeError::Size(max_pixels)),
    }
}

/// pdfium-backed rasterizer.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>, max_pixels: u32) -> Self {
        Self {
            library_dir,
            max_pixels,
        }
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn convert(&self, document: &UploadedFile) -> Result<RasterImage, RasterizeError> {
        if !looks_like_pdf(&document.bytes) {
            return Err(RasterizeError::NotPdf);
        }

        let edge = render_edge(self.max_pixels)?;
        let bytes = document.bytes.clone();
        let library_dir = self.library_dir.clone();

        let image = tokio::task::spawn_blocking(move || {
            render_first_page(&bytes, library_dir.as_ref(), edge)
        })
        .await
        .map_err(|e| RasterizeError::Task(e.to_string()))??;

        let png = encode_png(&image)?;
        debug!(
            "Rendered preview {}x{} px ({} bytes PNG)",
            image.width(),
            image.height(),
            png.len()
        );

        Ok(RasterImage {
            file: UploadedFile::new(
                preview_file_name(&document.file_name),
                "image/png",
                Bytes::from(png),
            ),
            width: image.width(),
            height: image.height(),
        })
    }
}

fn render_first_page(
    bytes: &[u8],
    library_dir: Option<&PathBuf>,
    edge: i32,
) -> Result<DynamicImage, RasterizeError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| RasterizeError::Library(format!("{:?}", e)))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| RasterizeError::Load(format!("{:?}", e)))?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(RasterizeError::NoPages);
    }
    let page = pages
        .first()
        .map_err(|e| RasterizeError::Render(format!("{:?}", e)))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(edge)
        .set_maximum_height(edge);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| RasterizeError::Render(format!("{:?}", e)))?;

    Ok(bitmap.as_image())
}

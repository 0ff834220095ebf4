//! Image copying and compaction.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat, ImageReader};
use rayon::prelude::*;

use crate::output::{read_source, write_output};
use crate::traits::{AdapterError, BuildMode, SourceFile, TransformAdapter, TransformReport};

/// Image adapter.
///
/// Debug builds copy images verbatim. Optimized builds re-encode PNG
/// (lossless, best compression) and JPEG (lossy, at `jpeg_quality`) and keep
/// whichever of the original and re-encoded bytes is smaller.
#[derive(Debug, Clone)]
pub struct ImagesAdapter {
    mode: BuildMode,
    jpeg_quality: u8,
}

impl ImagesAdapter {
    /// Create an image adapter.
    pub fn new(mode: BuildMode, jpeg_quality: u8) -> Self {
        Self {
            mode,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Produce the bytes to write for one image.
    pub fn compact(&self, path: &Path, original: Vec<u8>) -> Result<Vec<u8>, AdapterError> {
        if !self.mode.is_optimized() {
            return Ok(original);
        }

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension);

        let encoded = match format {
            Some(ImageFormat::Png) => {
                let img = decode(path, &original)?;
                let mut out = Vec::new();
                let encoder = PngEncoder::new_with_quality(
                    &mut out,
                    CompressionType::Best,
                    FilterType::Adaptive,
                );
                img.write_with_encoder(encoder)
                    .map_err(|e| AdapterError::malformed(path, e))?;
                out
            }
            Some(ImageFormat::Jpeg) => {
                let img = DynamicImage::ImageRgb8(decode(path, &original)?.to_rgb8());
                let mut out = Vec::new();
                let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
                img.write_with_encoder(encoder)
                    .map_err(|e| AdapterError::malformed(path, e))?;
                out
            }
            _ => return Ok(original),
        };

        if encoded.len() < original.len() {
            tracing::debug!(
                "Compacted {}: {} -> {} bytes",
                path.display(),
                original.len(),
                encoded.len()
            );
            Ok(encoded)
        } else {
            Ok(original)
        }
    }

    fn process(&self, source: &SourceFile, dest: &Path) -> Result<PathBuf, AdapterError> {
        let original = read_source(&source.path)?;
        let bytes = self.compact(&source.path, original)?;
        write_output(dest, &source.relative, bytes)
    }
}

fn decode(path: &Path, bytes: &[u8]) -> Result<DynamicImage, AdapterError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AdapterError::io(path, e))?
        .decode()
        .map_err(|e| AdapterError::malformed(path, e))
}

impl TransformAdapter for ImagesAdapter {
    fn name(&self) -> &'static str {
        "images"
    }

    fn transform(
        &self,
        sources: &[SourceFile],
        dest: &Path,
    ) -> Result<TransformReport, AdapterError> {
        let written: Vec<Result<PathBuf, AdapterError>> = sources
            .par_iter()
            .map(|source| self.process(source, dest))
            .collect();

        let mut report = TransformReport::default();
        for path in written {
            report.wrote(path?);
        }
        Ok(report)
    }
}

//! crates/pdf_assistant_core/src/pdf.rs
//!
//! PDF utilities: shrinking a document to fit an upload budget and extracting
//! per-page text and embedded images.

use std::borrow::Cow;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, ObjectId};
use tracing::{debug, info, warn};

use crate::domain::ExtractedImage;

/// Largest payload the generation backend accepts inline.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A truncated document never contains more than this many leading pages.
pub const MAX_FITTED_PAGES: usize = 10;

//=========================================================================================
// Size Fitting
//=========================================================================================

/// Returns `bytes` unchanged when they fit in `max_size`, otherwise a copy of the
/// document reduced to its leading pages.
///
/// Pages are added one at a time (at most [`MAX_FITTED_PAGES`]); the first page
/// whose addition pushes the serialized size over budget is dropped again, unless
/// it is the very first page, which is always kept. Any processing error yields
/// the original bytes, so the result is a best-effort reduction only.
pub fn fit_for_transmission(bytes: &[u8], max_size: usize) -> Cow<'_, [u8]> {
    if bytes.len() <= max_size {
        return Cow::Borrowed(bytes);
    }

    info!(
        size_mb = bytes.len() as f64 / 1024.0 / 1024.0,
        "PDF is too large for the API, truncating"
    );
    match truncate_to_budget(bytes, max_size) {
        Ok(truncated) => {
            info!(
                size_mb = truncated.len() as f64 / 1024.0 / 1024.0,
                "PDF truncated"
            );
            Cow::Owned(truncated)
        }
        Err(e) => {
            warn!("PDF truncation error, sending the original: {}", e);
            Cow::Borrowed(bytes)
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum FitError {
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
    #[error("document has no pages")]
    NoPages,
}

fn truncate_to_budget(bytes: &[u8], max_size: usize) -> Result<Vec<u8>, FitError> {
    let source = Document::load_mem(bytes)?;
    let page_numbers: Vec<u32> = source.get_pages().keys().copied().collect();
    let limit = page_numbers.len().min(MAX_FITTED_PAGES);

    let mut kept: Option<Vec<u8>> = None;
    for count in 1..=limit {
        let candidate = serialize_leading_pages(&source, &page_numbers, count)?;
        debug!(pages = count, size = candidate.len(), "candidate serialized");
        if candidate.len() > max_size {
            if kept.is_none() {
                kept = Some(candidate);
            }
            break;
        }
        kept = Some(candidate);
    }

    kept.ok_or(FitError::NoPages)
}

/// Serializes a copy of `source` that keeps only its first `count` pages.
fn serialize_leading_pages(
    source: &Document,
    page_numbers: &[u32],
    count: usize,
) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = source.clone();
    let dropped = &page_numbers[count..];
    if !dropped.is_empty() {
        doc.delete_pages(dropped);
    }
    doc.prune_objects();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

//=========================================================================================
// Content Extraction
//=========================================================================================

/// Text and images derived from a document's raw bytes.
#[derive(Debug, Default)]
pub struct ParsedPdf {
    pub full_text: String,
    pub page_texts: Vec<String>,
    pub page_images: Vec<Vec<ExtractedImage>>,
}

/// Parses `bytes` and extracts text for every page plus the decodable embedded images.
///
/// Failing to parse the document is an error; images that cannot be decoded are skipped.
pub fn parse_pdf(bytes: &[u8]) -> Result<ParsedPdf, lopdf::Error> {
    let doc = Document::load_mem(bytes)?;
    let pages = doc.get_pages();

    let mut parsed = ParsedPdf::default();
    for (index, (page_number, page_id)) in pages.iter().enumerate() {
        let text = doc.extract_text(&[*page_number]).unwrap_or_default();
        parsed
            .full_text
            .push_str(&format!("\n--- Page {} ---\n{}\n", index + 1, text));
        parsed.page_texts.push(text);
        parsed.page_images.push(extract_page_images(&doc, index, *page_id));
    }

    debug!(
        pages = parsed.page_texts.len(),
        images = parsed.page_images.iter().map(Vec::len).sum::<usize>(),
        "PDF parsed"
    );
    Ok(parsed)
}

fn extract_page_images(doc: &Document, page_index: usize, page_id: ObjectId) -> Vec<ExtractedImage> {
    let images = match doc.get_page_images(page_id) {
        Ok(images) => images,
        Err(e) => {
            warn!(page = page_index + 1, "Image extraction error: {}", e);
            return Vec::new();
        }
    };

    images
        .iter()
        .enumerate()
        .filter_map(|(image_index, pdf_image)| {
            let decoded = decode_image(doc, pdf_image);
            if decoded.is_none() {
                debug!(
                    page = page_index + 1,
                    image = image_index,
                    filters = ?pdf_image.filters,
                    "skipping image with unsupported encoding"
                );
            }
            decoded.map(|image| ExtractedImage {
                page_index,
                image_index,
                image,
            })
        })
        .collect()
}

fn decode_image(doc: &Document, pdf_image: &lopdf::xobject::PdfImage<'_>) -> Option<DynamicImage> {
    let filters = pdf_image.filters.as_deref().unwrap_or(&[]);
    if filters.iter().any(|f| f == "DCTDecode") {
        return image::load_from_memory_with_format(pdf_image.content, ImageFormat::Jpeg).ok();
    }

    if pdf_image.bits_per_component != Some(8) {
        return None;
    }
    let width = u32::try_from(pdf_image.width).ok()?;
    let height = u32::try_from(pdf_image.height).ok()?;
    let samples = if filters.is_empty() {
        pdf_image.content.to_vec()
    } else {
        doc.get_object(pdf_image.id)
            .and_then(|object| object.as_stream())
            .and_then(|stream| stream.decompressed_content())
            .ok()?
    };

    match pdf_image.color_space.as_deref() {
        Some("DeviceRGB") => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        Some("DeviceGray") => {
            GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8)
        }
        _ => None,
    }
}

//=========================================================================================
// Test Fixtures
//=========================================================================================

/// In-memory PDF builders shared by the unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Builds a PDF with `pages` pages, each padded with `padding` bytes of
    /// incompressible comment text inside its content stream.
    pub fn pdf_with_pages(pages: usize, padding: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        let mut seed: u32 = 0x2545_F491;
        for i in 0..pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let mut bytes = content.encode().unwrap();
            bytes.extend_from_slice(b"\n%");
            for _ in 0..padding {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                bytes.push(b'a' + (seed % 26) as u8);
            }
            bytes.push(b'\n');

            let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    /// Builds a one-page PDF that embeds a raw 2x2 RGB image.
    pub fn pdf_with_rgb_image() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let pixels = vec![
            255, 0, 0, 0, 255, 0, //
            0, 0, 255, 255, 255, 255,
        ];
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            pixels,
        ));
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![100.into(), 0.into(), 0.into(), 100.into(), 72.into(), 600.into()],
                ),
                Operation::new("Do", vec!["Im1".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im1" => image_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    pub fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }
}

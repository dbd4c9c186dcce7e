use std::io::{Cursor, Read};

use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use quick_xml::{Reader as XmlReader, events::Event};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::ExtractionError;

const PAGE_WIDTH_INCHES: f32 = 8.5;
const PAGE_HEIGHT_INCHES: f32 = 14.0;

/// Declared media kind of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Docx,
    PlainText,
    Image,
}

impl MediaKind {
    /// Maps an already-lowercased file extension onto a media kind.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "pdf" => Some(MediaKind::Pdf),
            "docx" => Some(MediaKind::Docx),
            "txt" => Some(MediaKind::PlainText),
            "png" | "jpg" | "jpeg" => Some(MediaKind::Image),
            _ => None,
        }
    }
}

/// One page image, encoded and ready for inline upload to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Canonical representation of an uploaded document: either machine text or
/// an ordered sequence of page images.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedContent {
    Text(String),
    Images(Vec<PageImage>),
}

/// Converts uploaded files into [`ExtractedContent`].
///
/// The text-length threshold is the only signal separating digital PDFs from
/// scanned or handwritten ones, and is applied identically to reference
/// material and homework submissions.
pub struct DocumentExtractor {
    min_text_chars: usize,
    render_dpi: u32,
}

impl DocumentExtractor {
    pub fn new(min_text_chars: usize, render_dpi: u32) -> Self {
        Self {
            min_text_chars,
            render_dpi,
        }
    }

    pub fn extract(
        &self,
        bytes: &[u8],
        kind: MediaKind,
    ) -> Result<ExtractedContent, ExtractionError> {
        match kind {
            MediaKind::Pdf => self.extract_pdf(bytes),
            MediaKind::Docx => extract_docx(bytes),
            MediaKind::PlainText => Ok(ExtractedContent::Text(String::from_utf8(bytes.to_vec())?)),
            MediaKind::Image => extract_image(bytes),
        }
    }

    /// PDF path: machine-text pass first, raster fallback for scanned pages.
    fn extract_pdf(&self, bytes: &[u8]) -> Result<ExtractedContent, ExtractionError> {
        let text = match pdf_extract::extract_text_from_mem(bytes) {
            Ok(text) => text,
            Err(err) => {
                debug!(%err, "PDF text pass failed, treating document as scanned");
                String::new()
            }
        };

        if has_machine_text(&text, self.min_text_chars) {
            return Ok(ExtractedContent::Text(text));
        }

        let pages = self.rasterize_pdf(bytes)?;
        info!(pages = pages.len(), "PDF classified as scanned, rasterized");
        Ok(ExtractedContent::Images(pages))
    }

    fn rasterize_pdf(&self, bytes: &[u8]) -> Result<Vec<PageImage>, ExtractionError> {
        let bindings = Pdfium::bind_to_system_library()
            .map_err(|err| ExtractionError::Pdf(format!("pdfium library unavailable: {err}")))?;
        let pdfium = Pdfium::new(bindings);

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|err| ExtractionError::Pdf(format!("could not open document: {err:?}")))?;

        let total_pages = document.pages().len();
        if total_pages == 0 {
            return Err(ExtractionError::Pdf("document has no pages".to_string()));
        }

        let dpi = self.render_dpi as f32;
        let render_config = PdfRenderConfig::new()
            .set_target_width((dpi * PAGE_WIDTH_INCHES) as i32)
            .set_maximum_height((dpi * PAGE_HEIGHT_INCHES) as i32);

        let mut pages = Vec::with_capacity(total_pages as usize);

        for page_idx in 0..total_pages {
            let page = document.pages().get(page_idx).map_err(|err| {
                ExtractionError::Pdf(format!("could not load page {}: {err:?}", page_idx + 1))
            })?;

            let bitmap = page.render_with_config(&render_config).map_err(|err| {
                ExtractionError::Pdf(format!("could not render page {}: {err:?}", page_idx + 1))
            })?;

            let rgb_image = bitmap.as_image().to_rgb8();
            let mut jpeg_buffer = Cursor::new(Vec::new());
            rgb_image
                .write_to(&mut jpeg_buffer, image::ImageFormat::Jpeg)
                .map_err(|err| {
                    ExtractionError::Pdf(format!("could not encode page {}: {err}", page_idx + 1))
                })?;

            pages.push(PageImage {
                mime: "image/jpeg",
                bytes: jpeg_buffer.into_inner(),
            });
        }

        Ok(pages)
    }
}

/// The core classification policy: a PDF counts as machine text only when
/// its trimmed extracted text exceeds the threshold.
pub fn has_machine_text(text: &str, min_text_chars: usize) -> bool {
    text.trim().chars().count() > min_text_chars
}

/// DOCX path: paragraph text from `word/document.xml`, newline separated.
fn extract_docx(bytes: &[u8]) -> Result<ExtractedContent, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| ExtractionError::Docx(format!("could not open container: {err}")))?;

    let mut document = archive
        .by_name("word/document.xml")
        .map_err(|err| ExtractionError::Docx(format!("missing word/document.xml: {err}")))?;

    let mut xml = String::new();
    document
        .read_to_string(&mut xml)
        .map_err(|err| ExtractionError::Docx(format!("could not read document XML: {err}")))?;

    let mut reader = XmlReader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();
    let mut output = String::new();
    let mut in_text_node = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_node = true,
                b"w:tab" => output.push('\t'),
                b"w:br" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_node {
                    let value = e
                        .unescape()
                        .map_err(|err| ExtractionError::Docx(err.to_string()))?;
                    output.push_str(&value);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_node = false,
                b"w:p" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ExtractionError::Docx(format!(
                    "could not parse document XML: {err}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(ExtractedContent::Text(output.trim().to_string()))
}

/// Image path: validate the decode, keep the original bytes.
fn extract_image(bytes: &[u8]) -> Result<ExtractedContent, ExtractionError> {
    image::load_from_memory(bytes)?;

    Ok(ExtractedContent::Images(vec![PageImage {
        mime: detect_image_mime(bytes),
        bytes: bytes.to_vec(),
    }]))
}

pub fn detect_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(b"\x89PNG") {
        "image/png"
    } else if data.starts_with(b"\xFF\xD8\xFF") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::{ZipWriter, write::SimpleFileOptions};

    use super::*;

    fn extractor() -> DocumentExtractor {
        DocumentExtractor::new(50, 200)
    }

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2))
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn media_kind_from_extension() {
        assert_eq!(MediaKind::from_extension("pdf"), Some(MediaKind::Pdf));
        assert_eq!(MediaKind::from_extension("docx"), Some(MediaKind::Docx));
        assert_eq!(MediaKind::from_extension("txt"), Some(MediaKind::PlainText));
        assert_eq!(MediaKind::from_extension("jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_extension("xlsx"), None);
    }

    #[test]
    fn machine_text_threshold_is_exclusive() {
        let exactly_fifty = "a".repeat(50);
        assert!(!has_machine_text(&exactly_fifty, 50));
        assert!(has_machine_text(&format!("{exactly_fifty}b"), 50));
    }

    #[test]
    fn machine_text_ignores_surrounding_whitespace() {
        let padded = format!("   \n\n{}\n  ", "x".repeat(10));
        assert!(!has_machine_text(&padded, 50));
        assert!(has_machine_text(&padded, 9));
    }

    #[test]
    fn plain_text_decodes_utf8() {
        let content = extractor()
            .extract("שלום עולם".as_bytes(), MediaKind::PlainText)
            .unwrap();
        assert_eq!(content, ExtractedContent::Text("שלום עולם".to_string()));
    }

    #[test]
    fn plain_text_rejects_invalid_utf8() {
        let err = extractor()
            .extract(&[0xff, 0xfe, 0x80], MediaKind::PlainText)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Utf8(_)));
    }

    #[test]
    fn docx_paragraphs_joined_with_newlines() {
        let xml = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>First paragraph</w:t></w:r></w:p>
                <w:p><w:r><w:t>Second</w:t></w:r><w:r><w:t> paragraph</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let content = extractor()
            .extract(&docx_bytes(xml), MediaKind::Docx)
            .unwrap();
        assert_eq!(
            content,
            ExtractedContent::Text("First paragraph\nSecond paragraph".to_string())
        );
    }

    #[test]
    fn corrupted_docx_yields_error_with_message() {
        let err = extractor()
            .extract(b"this is not a zip archive", MediaKind::Docx)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Docx(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn docx_without_document_xml_is_rejected() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("unrelated.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"nothing here").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extractor().extract(&bytes, MediaKind::Docx).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn image_upload_keeps_original_bytes() {
        let bytes = png_bytes();
        let content = extractor().extract(&bytes, MediaKind::Image).unwrap();
        match content {
            ExtractedContent::Images(pages) => {
                assert_eq!(pages.len(), 1);
                assert_eq!(pages[0].mime, "image/png");
                assert_eq!(pages[0].bytes, bytes);
            }
            other => panic!("expected images, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_image_yields_error() {
        let err = extractor()
            .extract(b"\x89PNG but truncated garbage", MediaKind::Image)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Image(_)));
    }

    #[test]
    fn image_mime_sniffing() {
        assert_eq!(detect_image_mime(&png_bytes()), "image/png");
        assert_eq!(detect_image_mime(b"\xFF\xD8\xFF\xE0rest"), "image/jpeg");
        assert_eq!(detect_image_mime(b"plain"), "application/octet-stream");
    }
}

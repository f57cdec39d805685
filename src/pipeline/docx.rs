//! Plain-text extraction from OOXML payloads.
//!
//! The court's ".rtf" downloads are, in practice, zip-packaged OOXML.
//! Extraction opens the archive in memory, pulls `word/document.xml`,
//! and streams its events: text nodes accumulate, paragraph ends become
//! newlines, explicit breaks and tabs are preserved. Styling and
//! everything else is dropped.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::PipelineError;

/// Extract the document's plain text from OOXML bytes.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, PipelineError> {
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| PipelineError::ExtractionFailed(format!("not a zip archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| PipelineError::ExtractionFailed(format!("word/document.xml missing: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| PipelineError::ExtractionFailed(format!("document.xml unreadable: {e}")))?;

    document_xml_to_text(&xml)
}

/// Flatten WordprocessingML into newline-separated plain text.
fn document_xml_to_text(xml: &str) -> Result<String, PipelineError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(t)) => {
                let fragment = t
                    .unescape()
                    .map_err(|e| PipelineError::ExtractionFailed(format!("bad text node: {e}")))?;
                text.push_str(&fragment);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => text.push('\n'),
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:br" => text.push('\n'),
                b"w:tab" => text.push('\t'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(PipelineError::ExtractionFailed(format!(
                    "XML parse error at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    Ok(text)
}

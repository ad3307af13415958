//! Redaction stamp in the document info dictionary

use chrono::Local;
use lopdf::{Dictionary, Document, Object, StringFormat};

use crate::error::PdfError;

pub(crate) const TOOL: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

fn literal(value: &str) -> Object {
    Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
}

/// Record the producing tool and the redaction time, creating the info
/// dictionary when the document has none.
pub(crate) fn stamp_redaction(doc: &mut Document) -> Result<(), PdfError> {
    let info_id = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => *id,
        _ => {
            let id = doc.add_object(Object::Dictionary(Dictionary::new()));
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
    };

    let date = format!("D:{}", Local::now().format("%Y%m%d%H%M%S%z"));
    let info = doc
        .get_dictionary_mut(info_id)
        .map_err(|e| PdfError::Write(format!("info dictionary: {}", e)))?;

    info.set("Producer", literal(TOOL));
    info.set("ModDate", literal(&date));
    info.set("Redacted", literal("true"));
    info.set("RedactedBy", literal(TOOL));
    info.set("RedactedAt", literal(&date));

    log::debug!("[Metadata] stamped {} at {}", TOOL, date);
    Ok(())
}

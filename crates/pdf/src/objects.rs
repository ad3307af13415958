//! lopdf object helpers

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::engine::normalize_rotation;
use crate::error::PdfError;
use crate::geometry::Rect;

pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Follow one level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// `dict[key]`, with a reference resolved.
pub(crate) fn entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

/// `dict[key]` as a dictionary, with a reference resolved.
pub(crate) fn entry_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    match entry(doc, dict, key) {
        Some(Object::Dictionary(d)) => Some(d),
        _ => None,
    }
}

fn box_values(arr: &[Object]) -> Option<[f32; 4]> {
    let values: Vec<f32> = arr.iter().filter_map(get_number).collect();
    match values.as_slice() {
        [a, b, c, d] => Some([a.min(*c), b.min(*d), a.max(*c), b.max(*d)]),
        _ => None,
    }
}

/// Look `key` up on the page, then along the `Parent` chain.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok();
    let mut depth = 0;
    while let Some(dict) = current {
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
        }
        depth += 1;
        if depth > 32 {
            break;
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
            _ => None,
        };
    }
    None
}

/// Visible page box in user space as `(llx, lly, urx, ury)`: CropBox, then
/// MediaBox, then US Letter.
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> Rect {
    let values = [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .iter()
        .find_map(|key| match inherited(doc, page_id, key) {
            Some(Object::Array(arr)) => box_values(arr),
            _ => None,
        });

    let [llx, lly, urx, ury] = values.unwrap_or_else(|| {
        log::warn!("[Objects] page {:?} has no usable box, assuming Letter", page_id);
        [0.0, 0.0, 612.0, 792.0]
    });
    Rect::new(llx as f64, lly as f64, urx as f64, ury as f64)
}

pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> u16 {
    match inherited(doc, page_id, b"Rotate") {
        Some(Object::Integer(r)) => normalize_rotation(*r),
        _ => 0,
    }
}

/// The page's resource dictionary, inherited and resolved; empty when the
/// page has none.
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// Give the page its own copy of `resources`.
pub(crate) fn set_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    resources: Dictionary,
) -> Result<(), PdfError> {
    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| PdfError::Content(e.to_string()))?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

pub(crate) fn stream_content(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Concatenated, decoded content streams of a page.
pub(crate) fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>, PdfError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| PdfError::Content(e.to_string()))?;

    let streams: Vec<&Stream> = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Stream(stream)) => vec![stream],
            Ok(Object::Array(arr)) => resolve_streams(doc, arr),
            _ => Vec::new(),
        },
        Ok(Object::Array(arr)) => resolve_streams(doc, arr),
        Ok(Object::Stream(stream)) => vec![stream],
        _ => Vec::new(),
    };

    let mut content = Vec::new();
    for stream in streams {
        content.extend(stream_content(stream));
        content.push(b'\n');
    }
    Ok(content)
}

fn resolve_streams<'a>(doc: &'a Document, arr: &'a [Object]) -> Vec<&'a Stream> {
    arr.iter()
        .filter_map(|item| match item {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(Object::Stream(stream)) => Some(stream),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Point the page at a single new content stream.
pub(crate) fn replace_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), PdfError> {
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), content));
    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| PdfError::Content(e.to_string()))?;
    page.set("Contents", Object::Reference(stream_id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_page_box_inherits_from_parent() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Rotate" => 450,
            }),
        );

        assert_eq!(page_box(&doc, page_id), Rect::new(0.0, 0.0, 595.0, 842.0));
        assert_eq!(page_rotation(&doc, page_id), 90);
    }

    #[test]
    fn test_crop_box_wins() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "CropBox" => vec![10.into(), 20.into(), 600.into(), 780.into()],
        });
        assert_eq!(page_box(&doc, page_id), Rect::new(10.0, 20.0, 600.0, 780.0));
    }

    #[test]
    fn test_replace_and_read_content() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        replace_content(&mut doc, page_id, b"0 0 10 10 re f".to_vec()).unwrap();
        let content = page_content(&doc, page_id).unwrap();
        assert!(content.starts_with(b"0 0 10 10 re f"));
    }

    #[test]
    fn test_resources_resolve_through_references() {
        let mut doc = Document::with_version("1.5");
        let fonts_id = doc.add_object(dictionary! { "F1" => dictionary! { "Subtype" => "Type1" } });
        let resources_id = doc.add_object(dictionary! { "Font" => fonts_id });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Resources" => resources_id,
            "Rotate" => 45,
        });

        let resources = page_resources(&doc, page_id);
        let fonts = entry_dict(&doc, &resources, b"Font").unwrap();
        assert!(fonts.has(b"F1"));
        assert_eq!(page_rotation(&doc, page_id), 0);

        set_page_resources(&mut doc, page_id, Dictionary::new()).unwrap();
        assert!(entry_dict(&doc, &page_resources(&doc, page_id), b"Font").is_none());
    }
}

//! Font metrics for content rewriting
//!
//! Glyph advances are read from the font dictionaries named in a resource
//! dictionary: `/FirstChar` + `/Widths` for simple fonts, `/DW` + `/W` of
//! the descendant for Type0 fonts. Standard 14 fonts that carry no widths
//! use the Helvetica, Times or Courier tables.

use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

use crate::matrix::matrix_from;
use crate::objects::{entry, entry_dict, get_number, resolve};

/// Helvetica advances for codes 32..=126, in 1/1000 em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Times-Roman advances for codes 32..=126, in 1/1000 em.
const TIMES: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, 921, 722, 667, 667, 722, 611,
    556, 722, 722, 333, 389, 722, 611, 889, 722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722,
    722, 611, 333, 278, 333, 469, 500, 333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500,
    278, 778, 500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

const COURIER: f32 = 600.0;

/// `/DW` when a CID font does not give one.
const CID_DEFAULT_WIDTH: f32 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
enum CidRun {
    /// `c [w1 w2 ...]`
    List { first: u32, widths: Vec<f32> },
    /// `c_first c_last w`
    Range { first: u32, last: u32, width: f32 },
}

#[derive(Debug, Clone, PartialEq)]
enum Widths {
    Table {
        first: u32,
        widths: Vec<f32>,
        missing: f32,
    },
    Cid {
        default: f32,
        runs: Vec<CidRun>,
    },
}

/// Code length and advances of one font.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FontMetrics {
    /// Bytes per character code
    code_len: usize,
    widths: Widths,
    /// Glyph space units per 1/1000 text space unit; only Type3 fonts
    /// differ from one.
    scale: f32,
}

impl FontMetrics {
    fn standard(table: &[u16; 95]) -> Self {
        Self {
            code_len: 1,
            widths: Widths::Table {
                first: 32,
                widths: table.iter().map(|w| *w as f32).collect(),
                missing: 556.0,
            },
            scale: 1.0,
        }
    }

    fn monospace(width: f32) -> Self {
        Self {
            code_len: 1,
            widths: Widths::Table {
                first: 0,
                widths: Vec::new(),
                missing: width,
            },
            scale: 1.0,
        }
    }

    /// Metrics for a font that cannot be resolved.
    pub fn fallback() -> Self {
        Self::standard(&HELVETICA)
    }

    /// Pick a built-in table by the font's base name.
    fn by_name(base: &[u8]) -> Self {
        let name = String::from_utf8_lossy(base).to_ascii_lowercase();
        if name.contains("courier") || name.contains("mono") {
            Self::monospace(COURIER)
        } else if name.contains("times") || (name.contains("serif") && !name.contains("sans")) {
            Self::standard(&TIMES)
        } else {
            Self::standard(&HELVETICA)
        }
    }

    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let base: &[u8] = match entry(doc, font, b"BaseFont") {
            Some(Object::Name(name)) => name.as_slice(),
            _ => b"",
        };
        match entry(doc, font, b"Subtype") {
            Some(Object::Name(subtype)) if subtype == b"Type0" => Self::composite(doc, font, base),
            Some(Object::Name(subtype)) if subtype == b"Type3" => {
                let scale = matrix_from(entry(doc, font, b"FontMatrix"))[0] * 1000.0;
                let mut metrics = Self::simple(doc, font).unwrap_or_else(|| Self::monospace(0.0));
                metrics.scale = scale;
                metrics
            }
            _ => Self::simple(doc, font).unwrap_or_else(|| Self::by_name(base)),
        }
    }

    fn simple(doc: &Document, font: &Dictionary) -> Option<Self> {
        let first = entry(doc, font, b"FirstChar").and_then(get_number)?;
        let Some(Object::Array(items)) = entry(doc, font, b"Widths") else {
            return None;
        };
        let widths = items
            .iter()
            .map(|w| get_number(resolve(doc, w)).unwrap_or(0.0))
            .collect();
        let missing = entry_dict(doc, font, b"FontDescriptor")
            .and_then(|d| entry(doc, d, b"MissingWidth"))
            .and_then(get_number)
            .unwrap_or(0.0);
        Some(Self {
            code_len: 1,
            widths: Widths::Table {
                first: first.max(0.0) as u32,
                widths,
                missing,
            },
            scale: 1.0,
        })
    }

    fn composite(doc: &Document, font: &Dictionary, base: &[u8]) -> Self {
        match entry(doc, font, b"Encoding") {
            Some(Object::Name(name)) if name.starts_with(b"Identity") => {}
            _ => log::debug!(
                "[Fonts] {} uses a non-identity CMap, reading codes as two-byte CIDs",
                String::from_utf8_lossy(base)
            ),
        }

        let descendant = match entry(doc, font, b"DescendantFonts") {
            Some(Object::Array(items)) => items.first().map(|d| resolve(doc, d)),
            _ => None,
        };
        let (default, runs) = match descendant {
            Some(Object::Dictionary(cid_font)) => {
                let default = entry(doc, cid_font, b"DW")
                    .and_then(get_number)
                    .unwrap_or(CID_DEFAULT_WIDTH);
                let runs = match entry(doc, cid_font, b"W") {
                    Some(Object::Array(items)) => cid_runs(doc, items),
                    _ => Vec::new(),
                };
                (default, runs)
            }
            _ => (CID_DEFAULT_WIDTH, Vec::new()),
        };

        Self {
            code_len: 2,
            widths: Widths::Cid { default, runs },
            scale: 1.0,
        }
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }

    /// Advance of `code` in text space at a font size of one.
    pub fn advance(&self, code: u32) -> f32 {
        let width = match &self.widths {
            Widths::Table {
                first,
                widths,
                missing,
            } => code
                .checked_sub(*first)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .unwrap_or(*missing),
            Widths::Cid { default, runs } => runs
                .iter()
                .find_map(|run| match run {
                    CidRun::List { first, widths } => code
                        .checked_sub(*first)
                        .and_then(|i| widths.get(i as usize))
                        .copied(),
                    CidRun::Range { first, last, width } => {
                        (*first..=*last).contains(&code).then_some(*width)
                    }
                })
                .unwrap_or(*default),
        };
        width / 1000.0 * self.scale
    }
}

/// Parse a `/W` array.
fn cid_runs(doc: &Document, items: &[Object]) -> Vec<CidRun> {
    let items: Vec<&Object> = items.iter().map(|o| resolve(doc, o)).collect();
    let mut runs = Vec::new();
    let mut i = 0;
    while let Some(first) = items.get(i).copied().and_then(get_number) {
        match items.get(i + 1).copied() {
            Some(Object::Array(widths)) => {
                runs.push(CidRun::List {
                    first: first as u32,
                    widths: widths
                        .iter()
                        .map(|w| get_number(resolve(doc, w)).unwrap_or(0.0))
                        .collect(),
                });
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) =
                    (get_number(last), items.get(i + 2).copied().and_then(get_number))
                else {
                    break;
                };
                runs.push(CidRun::Range {
                    first: first as u32,
                    last: last as u32,
                    width,
                });
                i += 3;
            }
            None => break,
        }
    }
    runs
}

/// Fonts of one resource dictionary, by resource name.
#[derive(Debug, Clone)]
pub(crate) struct FontSet {
    fonts: HashMap<Vec<u8>, FontMetrics>,
    fallback: FontMetrics,
}

impl FontSet {
    pub fn from_resources(doc: &Document, resources: &Dictionary) -> Self {
        let mut fonts = HashMap::new();
        if let Some(dict) = entry_dict(doc, resources, b"Font") {
            for (name, font) in dict.iter() {
                if let Object::Dictionary(font) = resolve(doc, font) {
                    fonts.insert(name.clone(), FontMetrics::from_dict(doc, font));
                }
            }
        }
        Self {
            fonts,
            fallback: FontMetrics::fallback(),
        }
    }

    pub fn get(&self, name: &[u8]) -> &FontMetrics {
        self.fonts.get(name).unwrap_or_else(|| {
            log::debug!(
                "[Fonts] /{} not in resources, estimating advances",
                String::from_utf8_lossy(name)
            );
            &self.fallback
        })
    }

    pub fn fallback(&self) -> &FontMetrics {
        &self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_simple_font_widths() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Subtype" => "TrueType",
            "FirstChar" => 32,
            "Widths" => vec![250.into(), 500.into()],
            "FontDescriptor" => dictionary! { "MissingWidth" => 300 },
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.code_len(), 1);
        assert_eq!(metrics.advance(32), 0.25);
        assert_eq!(metrics.advance(33), 0.5);
        assert_eq!(metrics.advance(90), 0.3);
        assert_eq!(metrics.advance(10), 0.3);
    }

    #[test]
    fn test_standard_fonts_without_widths() {
        let doc = Document::with_version("1.5");
        let helvetica = FontMetrics::from_dict(&doc, &dictionary! { "BaseFont" => "Helvetica" });
        assert_eq!(helvetica.advance(b'i' as u32), 0.222);
        assert_eq!(helvetica.advance(b'7' as u32), 0.556);

        let times = FontMetrics::from_dict(&doc, &dictionary! { "BaseFont" => "Times-Bold" });
        assert_eq!(times.advance(b'i' as u32), 0.278);

        let courier = FontMetrics::from_dict(&doc, &dictionary! { "BaseFont" => "Courier" });
        assert_eq!(courier.advance(b'i' as u32), 0.6);
    }

    #[test]
    fn test_cid_font_widths() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Subtype" => "Type0",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "DW" => 800,
                "W" => vec![
                    20.into(), Object::Array(vec![500.into(), 600.into()]),
                    30.into(), 40.into(), 250.into(),
                ],
            })],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.code_len(), 2);
        assert_eq!(metrics.advance(20), 0.5);
        assert_eq!(metrics.advance(21), 0.6);
        assert_eq!(metrics.advance(35), 0.25);
        assert_eq!(metrics.advance(22), 0.8);
    }

    #[test]
    fn test_type3_font_matrix() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Subtype" => "Type3",
            "FontMatrix" => vec![0.01.into(), 0.into(), 0.into(), 0.01.into(), 0.into(), 0.into()],
            "FirstChar" => 65,
            "Widths" => vec![50.into()],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert!((metrics.advance(65) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_font_set_resolves_references() {
        let mut doc = Document::with_version("1.5");
        let font_id = doc.add_object(dictionary! {
            "Subtype" => "Type1",
            "FirstChar" => 48,
            "Widths" => vec![700.into()],
        });
        let resources = dictionary! { "Font" => dictionary! { "F1" => font_id } };
        let fonts = FontSet::from_resources(&doc, &resources);
        assert_eq!(fonts.get(b"F1").advance(48), 0.7);
        assert_eq!(fonts.get(b"F9"), fonts.fallback());
    }
}

//! Positioned text
//!
//! A page's text layer as a sequence of glyphs, each with an optional
//! rectangle. Text extraction, word segmentation and regex search all read
//! from the same layout so their coordinates always agree.

use regex::Regex;

use crate::engine::{SearchOutcome, TextHit, Word};
use crate::geometry::Rect;

#[derive(Debug, Clone, PartialEq)]
struct Glyph {
    /// Byte offset into `TextLayout::text`
    offset: usize,
    ch: char,
    rect: Option<Rect>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayout {
    text: String,
    glyphs: Vec<Glyph>,
}

impl TextLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a glyph. Glyphs without geometry (generated spaces, line
    /// breaks) take part in the text but never in a rectangle.
    pub fn push(&mut self, ch: char, rect: Option<Rect>) {
        self.glyphs.push(Glyph {
            offset: self.text.len(),
            ch,
            rect: rect.filter(|r| !r.is_empty()),
        });
        self.text.push(ch);
    }

    pub fn push_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.push(ch, None);
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn words(&self) -> Vec<Word> {
        let mut words = Vec::new();
        let mut text = String::new();
        let mut rect: Option<Rect> = None;

        let mut flush = |text: &mut String, rect: &mut Option<Rect>| {
            if let Some(r) = rect.take() {
                if !text.is_empty() {
                    words.push(Word {
                        text: std::mem::take(text),
                        rect: r,
                    });
                }
            }
            text.clear();
        };

        for glyph in &self.glyphs {
            match glyph.rect {
                Some(r) if !glyph.ch.is_whitespace() => {
                    if let Some(current) = rect {
                        if !same_line(&current, &r) {
                            flush(&mut text, &mut rect);
                        }
                    }
                    text.push(glyph.ch);
                    rect = Some(rect.map_or(r, |c| c.union(&r)));
                }
                _ => flush(&mut text, &mut rect),
            }
        }
        flush(&mut text, &mut rect);

        words
    }

    /// Search with the engine's regex dialect (the `regex` crate, which has
    /// no lookaround and no backreferences).
    pub fn search(&self, pattern: &str) -> SearchOutcome {
        let regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                return SearchOutcome::PatternUnsupported {
                    reason: e.to_string(),
                }
            }
        };

        let hits = regex
            .find_iter(&self.text)
            .filter(|m| !m.is_empty())
            .flat_map(|m| self.hits_for_range(m.start(), m.end()))
            .collect();
        SearchOutcome::Hits(hits)
    }

    /// One hit per line covered by the byte range `start..end`.
    pub fn hits_for_range(&self, start: usize, end: usize) -> Vec<TextHit> {
        let first = self.glyphs.partition_point(|g| g.offset < start);
        let last = self.glyphs.partition_point(|g| g.offset < end);

        let mut hits: Vec<TextHit> = Vec::new();
        for glyph in &self.glyphs[first..last] {
            let Some(r) = glyph.rect else { continue };
            match hits.last_mut() {
                Some(hit) if same_line(&hit.rect, &r) => {
                    hit.rect = hit.rect.union(&r);
                    hit.text.push(glyph.ch);
                }
                _ => hits.push(TextHit {
                    rect: r,
                    text: glyph.ch.to_string(),
                }),
            }
        }
        hits
    }
}

fn same_line(a: &Rect, b: &Rect) -> bool {
    let tolerance = a.height().min(b.height()) / 2.0;
    (a.center_y() - b.center_y()).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Monospaced line: each glyph 6pt wide, 12pt tall.
    fn line(layout: &mut TextLayout, x: f64, y: f64, text: &str) {
        for (i, ch) in text.chars().enumerate() {
            let x0 = x + i as f64 * 6.0;
            layout.push(ch, Some(Rect::new(x0, y, x0 + 6.0, y + 12.0)));
        }
        layout.push('\n', None);
    }

    #[test]
    fn test_search_returns_rect_of_match_only() {
        let mut layout = TextLayout::new();
        line(&mut layout, 50.0, 100.0, "Account Number: 123456789 Details");

        let SearchOutcome::Hits(hits) = layout.search(r"\b\d{8,17}\b") else {
            panic!("pattern should be supported");
        };
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rect, Rect::new(146.0, 100.0, 200.0, 112.0));
        assert_eq!(hits[0].text, "123456789");
    }

    #[test]
    fn test_search_splits_across_lines() {
        let mut layout = TextLayout::new();
        line(&mut layout, 0.0, 0.0, "acct 1234");
        line(&mut layout, 0.0, 20.0, "5678 end");

        let SearchOutcome::Hits(hits) = layout.search(r"1234\s5678") else {
            panic!("pattern should be supported");
        };
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rect, Rect::new(30.0, 0.0, 54.0, 12.0));
        assert_eq!(hits[1].rect, Rect::new(0.0, 20.0, 24.0, 32.0));
        assert_eq!(hits[1].text, "5678");
    }

    #[test]
    fn test_lookaround_is_unsupported() {
        let mut layout = TextLayout::new();
        line(&mut layout, 0.0, 0.0, "x");
        assert!(matches!(
            layout.search(r"(?<=#)\d+"),
            SearchOutcome::PatternUnsupported { .. }
        ));
        assert!(matches!(
            layout.search(r"(\d)\1"),
            SearchOutcome::PatternUnsupported { .. }
        ));
    }

    #[test]
    fn test_words() {
        let mut layout = TextLayout::new();
        line(&mut layout, 10.0, 0.0, "Acct: 42");
        line(&mut layout, 10.0, 20.0, "next");

        let words = layout.words();
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Acct:", "42", "next"]);
        assert_eq!(words[1].rect, Rect::new(46.0, 0.0, 58.0, 12.0));
    }

    #[test]
    fn test_glyphs_without_geometry_split_words() {
        let mut layout = TextLayout::new();
        layout.push('a', Some(Rect::new(0.0, 0.0, 5.0, 10.0)));
        layout.push_str("\r\n");
        layout.push('b', Some(Rect::new(0.0, 0.0, 5.0, 10.0)));
        assert_eq!(layout.words().len(), 2);
        assert_eq!(layout.text(), "a\r\nb");
    }
}

//! Region resolution
//!
//! Candidates are accepted one at a time against the regions accepted so
//! far. Native-text candidates (direct, fallback-token) are dropped when an
//! accepted region contains them; OCR candidates are dropped when they
//! overlap any accepted region at all. A candidate that contains earlier
//! regions replaces them, so no accepted region ever contains another.

use crate::model::{Match, Provenance, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accepted,
    /// Accepted, replacing this many regions it contains.
    Absorbed(usize),
    /// Already covered by an accepted region.
    Covered,
    /// Zero-area rectangle.
    Degenerate,
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Acceptance::Accepted | Acceptance::Absorbed(_))
    }
}

#[derive(Debug, Default)]
pub struct RegionResolver {
    regions: Vec<Region>,
}

impl RegionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, candidate: Match) -> Acceptance {
        let rect = candidate.rect;
        if rect.is_empty() {
            return Acceptance::Degenerate;
        }

        let covered = match candidate.provenance {
            Provenance::Direct | Provenance::FallbackToken => {
                self.regions.iter().any(|r| r.rect.contains(&rect))
            }
            Provenance::Ocr => self.regions.iter().any(|r| r.rect.intersects(&rect)),
        };
        if covered {
            return Acceptance::Covered;
        }

        let before = self.regions.len();
        self.regions.retain(|r| !rect.contains(&r.rect));
        let absorbed = before - self.regions.len();
        self.regions.push(candidate.into());

        if absorbed > 0 {
            log::debug!("[Resolver] region absorbed {} smaller region(s)", absorbed);
            Acceptance::Absorbed(absorbed)
        } else {
            Acceptance::Accepted
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn into_regions(self) -> Vec<Region> {
        self.regions
    }

    /// Resolve a batch: direct first, then fallback-token, then OCR, each
    /// group in arrival order.
    pub fn resolve(matches: impl IntoIterator<Item = Match>) -> Vec<Region> {
        let mut matches: Vec<Match> = matches.into_iter().collect();
        matches.sort_by_key(|m| m.provenance);

        let mut resolver = Self::new();
        for m in matches {
            resolver.offer(m);
        }
        resolver.into_regions()
    }
}

//! Page coordinate space
//!
//! Units are PDF points, origin at the top-left corner of the visible page
//! box, y growing downward.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// `other` lies entirely inside `self`; shared edges count as inside.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }

    /// The two rectangles share a region of positive area.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        );
        (!r.is_empty()).then_some(r)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    pub fn center_y(&self) -> f64 {
        (self.y0 + self.y1) / 2.0
    }

    /// Page space to PDF user space, given the visible page box in user
    /// space.
    pub(crate) fn to_user_space(&self, page_box: &Rect) -> Rect {
        Rect::new(
            page_box.x0 + self.x0,
            page_box.y1 - self.y1,
            page_box.x0 + self.x1,
            page_box.y1 - self.y0,
        )
    }

    /// Inverse of [`Rect::to_user_space`].
    pub(crate) fn from_user_space(user: &Rect, page_box: &Rect) -> Rect {
        Rect::new(
            user.x0 - page_box.x0,
            page_box.y1 - user.y1,
            user.x1 - page_box.x0,
            page_box.y1 - user.y0,
        )
    }
}

/// Page extent in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }
}

/// Opaque fill colour of a redaction mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    /// Components scaled to the 0..1 range used by PDF colour operators.
    pub fn unit(&self) -> [f32; 3] {
        self.0.map(|c| c as f32 / 255.0)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_inclusive() {
        let outer = Rect::new(10.0, 10.0, 50.0, 30.0);
        assert!(outer.contains(&outer));
        assert!(outer.contains(&Rect::new(10.0, 12.0, 40.0, 30.0)));
        assert!(!outer.contains(&Rect::new(9.0, 12.0, 40.0, 30.0)));
    }

    #[test]
    fn test_touching_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(9.5, 9.5, 12.0, 12.0)));
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn test_union_and_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 15.0, 12.0);
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 15.0, 12.0));
        assert_eq!(a.intersection(&b), Some(Rect::new(5.0, 5.0, 10.0, 10.0)));
    }

    #[test]
    fn test_unit_colour() {
        assert_eq!(Rgb([255, 0, 51]).unit(), [1.0, 0.0, 0.2]);
    }

    #[test]
    fn test_user_space_uses_crop_box_origin() {
        let crop = Rect::new(10.0, 20.0, 600.0, 780.0);
        // 100pt from the left and 50pt from the top of the visible box
        let page = Rect::new(100.0, 50.0, 160.0, 62.0);
        let user = page.to_user_space(&crop);
        assert_eq!(user, Rect::new(110.0, 718.0, 170.0, 730.0));
        assert_eq!(Rect::from_user_space(&user, &crop), page);
    }

    #[test]
    fn test_user_space_at_zero_origin() {
        let media = Rect::new(0.0, 0.0, 612.0, 792.0);
        let page = Rect::new(0.0, 0.0, 612.0, 10.0);
        assert_eq!(page.to_user_space(&media), Rect::new(0.0, 782.0, 612.0, 792.0));
    }
}

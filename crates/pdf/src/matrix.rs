//! Affine matrices in PDF row-vector form `[a b c d e f]`

use lopdf::Object;

use crate::geometry::Rect;
use crate::objects::get_number;

pub(crate) type Matrix = [f32; 6];

pub(crate) const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m` applied first, then `n`.
pub(crate) fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

pub(crate) fn invert(m: &Matrix) -> Option<Matrix> {
    let det = m[0] * m[3] - m[1] * m[2];
    if det.abs() < f32::EPSILON {
        return None;
    }
    let a = m[3] / det;
    let b = -m[1] / det;
    let c = -m[2] / det;
    let d = m[0] / det;
    Some([a, b, c, d, -(m[4] * a + m[5] * c), -(m[4] * b + m[5] * d)])
}

pub(crate) fn transform(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
}

/// Bounding box of the rectangle `(x0, y0)..(x1, y1)` after `m`.
pub(crate) fn transform_rect(m: &Matrix, x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
    let mut bounds = Bounds::default();
    for (x, y) in [(x0, y0), (x1, y0), (x0, y1), (x1, y1)] {
        let (tx, ty) = transform(m, x, y);
        bounds.add(tx, ty);
    }
    bounds.rect().unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0))
}

/// Running bounding box of a set of points.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Bounds {
    extent: Option<(f32, f32, f32, f32)>,
}

impl Bounds {
    pub fn add(&mut self, x: f32, y: f32) {
        self.extent = Some(match self.extent {
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            None => (x, y, x, y),
        });
    }

    pub fn rect(&self) -> Option<Rect> {
        self.extent
            .map(|(x0, y0, x1, y1)| Rect::new(x0 as f64, y0 as f64, x1 as f64, y1 as f64))
    }
}

/// The first `N` operands as numbers.
pub(crate) fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(operands) {
        *slot = get_number(obj)?;
    }
    (operands.len() >= N).then_some(out)
}

/// A `/Matrix` style array, identity when absent or malformed.
pub(crate) fn matrix_from(obj: Option<&Object>) -> Matrix {
    match obj {
        Some(Object::Array(items)) => numbers::<6>(items).unwrap_or(IDENTITY),
        _ => IDENTITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_order() {
        let scale = [2.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        let shift = [1.0, 0.0, 0.0, 1.0, 10.0, 0.0];
        // scale, then shift
        assert_eq!(transform(&multiply(&scale, &shift), 1.0, 1.0), (12.0, 2.0));
        // shift, then scale
        assert_eq!(transform(&multiply(&shift, &scale), 1.0, 1.0), (22.0, 2.0));
    }

    #[test]
    fn test_invert_round_trips_a_point() {
        let m = [0.0, 2.0, -3.0, 0.0, 100.0, 50.0];
        let inv = invert(&m).unwrap();
        let (x, y) = transform(&m, 4.0, 5.0);
        let (bx, by) = transform(&inv, x, y);
        assert!((bx - 4.0).abs() < 1e-4 && (by - 5.0).abs() < 1e-4);
        assert!(invert(&[0.0; 6]).is_none());
    }

    #[test]
    fn test_rotated_rect_bounds() {
        let quarter_turn = [0.0, 1.0, -1.0, 0.0, 0.0, 0.0];
        assert_eq!(
            transform_rect(&quarter_turn, 0.0, 0.0, 10.0, 5.0),
            Rect::new(-5.0, 0.0, 0.0, 10.0)
        );
    }
}

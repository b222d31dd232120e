use std::cmp::Ordering;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

pub use geo::Coordinate;

/// An input vertex: an identifier together with its position.
///
/// Identity is the pair of id and position; two points are equal iff
/// both match. Positions are immutable once constructed, so the manual
/// `Eq` and `Hash` impls below are consistent. The coordinates must be
/// finite.
#[derive(Debug, Clone, Copy)]
pub struct Point {
    id: i64,
    pos: Coordinate<f64>,
}

impl Point {
    pub fn new(id: i64, x: f64, y: f64) -> Self {
        assert!(x.is_finite(), "point requires a finite x-coordinate");
        assert!(y.is_finite(), "point requires a finite y-coordinate");
        Point {
            id,
            pos: Coordinate { x, y },
        }
    }

    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[inline]
    pub fn pos(&self) -> Coordinate<f64> {
        self.pos
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.pos.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.pos.y
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.pos.x == other.pos.x && self.pos.y == other.pos.y
    }
}

/// Total equality holds as coordinates are finite.
impl Eq for Point {}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.pos.x.to_bits().hash(state);
        self.pos.y.to_bits().hash(state);
    }
}

/// A directed line segment between two coordinates.
///
/// Orientation predicates treat the segment as the infinite line
/// through `v1` and `v2`, directed from `v1` to `v2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    v1: Coordinate<f64>,
    v2: Coordinate<f64>,
}

impl Edge {
    pub fn new(v1: Coordinate<f64>, v2: Coordinate<f64>) -> Self {
        Edge { v1, v2 }
    }

    pub fn from_points(p1: &Point, p2: &Point) -> Self {
        Edge {
            v1: p1.pos(),
            v2: p2.pos(),
        }
    }

    #[inline]
    pub fn v1(&self) -> Coordinate<f64> {
        self.v1
    }

    #[inline]
    pub fn v2(&self) -> Coordinate<f64> {
        self.v2
    }

    /// The same line, directed the other way.
    #[inline]
    pub fn reversed(&self) -> Edge {
        Edge {
            v1: self.v2,
            v2: self.v1,
        }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        let dx = self.v2.x - self.v1.x;
        let dy = self.v2.y - self.v1.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Signed area test of `p` against the directed line `v1 → v2`.
    ///
    /// Returns `< 0` if `p` lies to the left of the line, `> 0` if it
    /// lies to the right, and exactly `0` if the three points are
    /// collinear. Callers that cannot proceed on `0` must surface a
    /// degeneracy error rather than guess.
    #[inline]
    pub fn rel_orientation(&self, p: Coordinate<f64>) -> f64 {
        (self.v1.x - self.v2.x) * (p.y - self.v2.y) - (p.x - self.v2.x) * (self.v1.y - self.v2.y)
    }

    /// [`rel_orientation`](Edge::rel_orientation) collapsed to -1/0/1.
    #[inline]
    pub fn rel_orientation_rounded(&self, p: Coordinate<f64>) -> i32 {
        match self.rel_orientation(p).partial_cmp(&0.0) {
            Some(Ordering::Less) => -1,
            Some(Ordering::Greater) => 1,
            _ => 0,
        }
    }

    /// Whether this segment intersects `other`, including touching and
    /// collinear overlap.
    pub fn intersects(&self, other: &Edge) -> bool {
        let o1 = self.rel_orientation_rounded(other.v1);
        let o2 = self.rel_orientation_rounded(other.v2);
        let o3 = other.rel_orientation_rounded(self.v1);
        let o4 = other.rel_orientation_rounded(self.v2);
        if o1 != o2 && o3 != o4 {
            return true;
        }
        o1 == 0
            && o2 == 0
            && o3 == 0
            && o4 == 0
            && self.v1.x.min(self.v2.x) <= other.v1.x.max(other.v2.x)
            && self.v1.x.max(self.v2.x) >= other.v1.x.min(other.v2.x)
            && self.v1.y.min(self.v2.y) <= other.v1.y.max(other.v2.y)
            && self.v1.y.max(self.v2.y) >= other.v1.y.min(other.v2.y)
    }
}

/// The clockwise angle at `b` between the rays `b → a` and `b → c`,
/// normalized to `[0, 2π)`.
pub fn angle_between(a: Coordinate<f64>, b: Coordinate<f64>, c: Coordinate<f64>) -> f64 {
    let angle_a = (a.y - b.y).atan2(a.x - b.x);
    let angle_c = (c.y - b.y).atan2(c.x - b.x);
    let mut result = angle_a - angle_c;
    if result < 0.0 {
        result += 2.0 * PI;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> Coordinate<f64> {
        Coordinate { x, y }
    }

    #[test]
    fn test_rel_orientation() {
        let e = Edge::new(c(0., 0.), c(1., 1.));
        assert!(e.rel_orientation(c(0., 1.)) < 0.);
        assert!(e.rel_orientation(c(1., 0.)) > 0.);
        assert_eq!(e.rel_orientation(c(2., 2.)), 0.);
        assert_eq!(e.rel_orientation_rounded(c(0., 1.)), -1);
        assert_eq!(e.rel_orientation_rounded(c(1., 0.)), 1);
        assert_eq!(e.rel_orientation_rounded(c(0.5, 0.5)), 0);
    }

    #[test]
    fn test_intersects() {
        let e1 = Edge::new(c(0., 0.), c(2., 2.));
        let e2 = Edge::new(c(0., 2.), c(2., 0.));
        let e3 = Edge::new(c(3., 0.), c(3., 2.));
        assert!(e1.intersects(&e2));
        assert!(e2.intersects(&e1));
        assert!(!e1.intersects(&e3));

        // Collinear with overlap, and collinear without.
        let e4 = Edge::new(c(1., 1.), c(3., 3.));
        let e5 = Edge::new(c(3., 3.), c(4., 4.));
        assert!(e1.intersects(&e4));
        assert!(!e1.intersects(&e5));
    }

    #[test]
    fn test_angle_between() {
        // Right angle turning clockwise from north to east.
        assert_relative_eq!(
            angle_between(c(0., 1.), c(0., 0.), c(1., 0.)),
            PI / 2.,
            epsilon = 1e-12
        );
        // The same rays in the other order give the reflex angle.
        assert_relative_eq!(
            angle_between(c(1., 0.), c(0., 0.), c(0., 1.)),
            3. * PI / 2.,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            angle_between(c(1., 0.), c(0., 0.), c(1., 0.)),
            0.,
            epsilon = 1e-12
        );
    }
}

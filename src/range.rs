//! Pluggable 2D range search over the remaining point set.
//!
//! The peeling solver only needs rectangular queries that are
//! unbounded on two adjacent sides. A query method is named after its
//! *bounded* corner: `range_up_right` keeps the constraints of the
//! upper-right corner (`x <= x_max`, `y <= y_max`) and is unbounded
//! towards the lower left. The y-range is always evaluated with both
//! bounds; points beyond an unbounded y-side are simply never
//! requested by the solver.

use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::Point;

mod prior_tree;
pub use prior_tree::PriorityTree;

/// Rectangular range reporting with one unbounded quadrant.
pub trait RangeSearch2d {
    fn build(points: Vec<Point>) -> Self
    where
        Self: Sized;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, p: &Point) -> bool;

    fn remove(&mut self, p: &Point) -> bool;

    /// Bounded at the upper-right corner, unbounded to the lower left.
    fn range_up_right(&self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point>;

    /// Bounded at the upper-left corner, unbounded to the lower right.
    fn range_up_left(&self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point>;

    /// Bounded at the lower-right corner, unbounded to the upper left.
    fn range_down_right(&self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point>;

    /// Bounded at the lower-left corner, unbounded to the upper right.
    fn range_down_left(&self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point>;

    /// Dispatches on which sides of the box are unbounded.
    fn range(
        &self,
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
        unbounded_left: bool,
        unbounded_bottom: bool,
    ) -> Vec<Point> {
        match (unbounded_left, unbounded_bottom) {
            (true, true) => self.range_up_right(x_min, x_max, y_min, y_max),
            (true, false) => self.range_down_right(x_min, x_max, y_min, y_max),
            (false, true) => self.range_up_left(x_min, x_max, y_min, y_max),
            (false, false) => self.range_down_left(x_min, x_max, y_min, y_max),
        }
    }
}

/// The default backend: a pair of [`PriorityTree`]s, the second built
/// over x-negated points so both x-directions have an unbounded-side
/// query.
pub struct PrioritySearch {
    plain: PriorityTree,
    inverted: PriorityTree,
}

fn invert(p: &Point) -> Point {
    Point::new(p.id(), -p.x(), p.y())
}

impl RangeSearch2d for PrioritySearch {
    fn build(points: Vec<Point>) -> Self {
        let inverted = PriorityTree::build(points.iter().map(invert).collect());
        PrioritySearch {
            plain: PriorityTree::build(points),
            inverted,
        }
    }

    fn len(&self) -> usize {
        self.plain.len()
    }

    fn contains(&self, p: &Point) -> bool {
        self.plain.contains(p)
    }

    fn remove(&mut self, p: &Point) -> bool {
        let plain = self.plain.remove(p);
        let inverted = self.inverted.remove(&invert(p));
        debug_assert_eq!(plain, inverted);
        plain
    }

    fn range_up_right(&self, _x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        self.plain.query_unbounded(x_max, y_min, y_max)
    }

    fn range_up_left(&self, x_min: f64, _x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        self.inverted
            .query_unbounded(-x_min, y_min, y_max)
            .iter()
            .map(invert)
            .collect()
    }

    fn range_down_right(&self, _x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        self.plain.query_unbounded(x_max, y_min, y_max)
    }

    fn range_down_left(&self, x_min: f64, _x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        self.inverted
            .query_unbounded(-x_min, y_min, y_max)
            .iter()
            .map(invert)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedPoint(Point);

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.0.x(), self.0.y()])
    }
}

/// Alternative backend over an [`RTree`]; same query contract as
/// [`PrioritySearch`].
pub struct RStarSearch {
    tree: RTree<IndexedPoint>,
    len: usize,
}

impl RStarSearch {
    fn locate(&self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        let envelope = AABB::from_corners([x_min, y_min], [x_max, y_max]);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|ip| ip.0)
            .collect()
    }
}

impl RangeSearch2d for RStarSearch {
    fn build(points: Vec<Point>) -> Self {
        let len = points.len();
        RStarSearch {
            tree: RTree::bulk_load(points.into_iter().map(IndexedPoint).collect()),
            len,
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn contains(&self, p: &Point) -> bool {
        let at = AABB::from_point([p.x(), p.y()]);
        self.tree
            .locate_in_envelope(&at)
            .any(|ip| ip.0 == *p)
    }

    fn remove(&mut self, p: &Point) -> bool {
        let removed = self.tree.remove(&IndexedPoint(*p)).is_some();
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn range_up_right(&self, _x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        self.locate(f64::MIN, x_max, y_min, y_max)
    }

    fn range_up_left(&self, x_min: f64, _x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        self.locate(x_min, f64::MAX, y_min, y_max)
    }

    fn range_down_right(&self, _x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        self.locate(f64::MIN, x_max, y_min, y_max)
    }

    fn range_down_left(&self, x_min: f64, _x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        self.locate(x_min, f64::MAX, y_min, y_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn grid(n: i64) -> Vec<Point> {
        let mut points = Vec::new();
        let mut id = 0;
        for x in 0..n {
            for y in 0..n {
                points.push(Point::new(id, x as f64, y as f64));
                id += 1;
            }
        }
        points
    }

    #[test]
    fn test_origin_only_on_grid() {
        // The bounded corner at the origin reports exactly the origin.
        let search = PrioritySearch::build(grid(50));
        let got = search.range_up_right(0.0, 0.0, 0.0, 0.0);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0], Point::new(0, 0.0, 0.0));

        let via_dispatch = search.range(0.0, 0.0, 0.0, 0.0, true, true);
        assert_eq!(via_dispatch, got);
    }

    #[test]
    fn test_bounded_side_constraints_hold() {
        let points = grid(20);
        let search = PrioritySearch::build(points.clone());

        let up_right = search.range_up_right(0.0, 7.0, 2.0, 5.0);
        assert!(up_right.iter().all(|p| p.x() <= 7.0));
        assert!(up_right.iter().all(|p| (2.0..=5.0).contains(&p.y())));
        assert_eq!(up_right.len(), 8 * 4);

        let down_left = search.range_down_left(13.0, 20.0, 2.0, 5.0);
        assert!(down_left.iter().all(|p| p.x() >= 13.0));
        assert_eq!(down_left.len(), 7 * 4);
    }

    #[test]
    fn test_backends_agree() {
        let points = grid(15);
        let mut priority = PrioritySearch::build(points.clone());
        let mut rstar = RStarSearch::build(points.clone());

        let queries = [
            (0.0, 4.0, 0.0, 4.0),
            (2.5, 9.0, 3.5, 10.0),
            (0.0, 14.0, 0.0, 14.0),
        ];
        for (x_min, x_max, y_min, y_max) in queries {
            for (ul, ub) in [(true, true), (true, false), (false, true), (false, false)] {
                let a: HashSet<Point> = priority
                    .range(x_min, x_max, y_min, y_max, ul, ub)
                    .into_iter()
                    .collect();
                let b: HashSet<Point> = rstar
                    .range(x_min, x_max, y_min, y_max, ul, ub)
                    .into_iter()
                    .collect();
                assert_eq!(a, b, "query {:?} ({}, {})", (x_min, x_max, y_min, y_max), ul, ub);
            }
        }

        let victim = points[77];
        assert!(priority.remove(&victim));
        assert!(rstar.remove(&victim));
        assert_eq!(priority.len(), rstar.len());
        assert!(!priority.contains(&victim));
        assert!(!rstar.contains(&victim));
    }
}

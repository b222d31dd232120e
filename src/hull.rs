//! Dynamic convex hull over two y-monotone chains.
//!
//! The hull boundary is kept as a left and a right chain glued at the
//! top (maximum-y) and bottom (minimum-y) vertices, each chain stored
//! in a [`LinkedTree`] ordered by y. Walking the left chain upwards and
//! then the right chain downwards traverses the boundary in clockwise
//! order. On top of O(log n) insertion and removal the structure
//! answers near-intersection queries: for an infinite line crossing
//! the boundary exactly twice, the four vertices bracketing the two
//! crossings.

use std::cell::Cell;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashSet;

use log::trace;
use smallvec::SmallVec;

use crate::error::Error;
use crate::geometry::{Edge, Point};
use crate::linked_tree::{Compare, LinkedTree, NodeId};
use crate::problem::OutputEdge;

mod near;
pub use near::{NearIntersection, Orientation, ProbeEdge};

/// Which chain of the hull a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Handle to a live hull vertex.
///
/// Invalidated when the vertex is removed from the hull (or migrates
/// between chains); resolve the point before mutating the hull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef {
    side: Side,
    id: NodeId,
}

impl NodeRef {
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }
}

/// Chain ordering: y ascending, ties resolved by x relative to the
/// chain's split abscissa (the hull's minX for the left chain, maxX
/// for the right) so that equal-y runs follow the boundary direction.
/// A final (x, id) refinement makes the order strict.
#[derive(Debug)]
pub struct ChainOrder {
    side: Side,
    split_x: Cell<f64>,
}

impl ChainOrder {
    fn new(side: Side) -> Self {
        ChainOrder {
            side,
            split_x: Cell::new(f64::NAN),
        }
    }

    fn set_split(&self, x: f64) {
        self.split_x.set(x);
    }
}

impl Compare<Point> for ChainOrder {
    fn compare(&self, a: &Point, b: &Point) -> CmpOrdering {
        match a.y().partial_cmp(&b.y()).expect("finite coordinates") {
            CmpOrdering::Equal => {}
            ord => return ord,
        }
        let split = self.split_x.get();
        if split.is_finite() && a.x() != b.x() {
            let is_left = self.side == Side::Left;
            if (a.x() < split) == is_left {
                return if a.x() < b.x() {
                    CmpOrdering::Greater
                } else {
                    CmpOrdering::Less
                };
            } else if (a.x() > split) == is_left {
                return if a.x() < b.x() {
                    CmpOrdering::Less
                } else {
                    CmpOrdering::Greater
                };
            }
        }
        a.x()
            .partial_cmp(&b.x())
            .expect("finite coordinates")
            .then_with(|| a.id().cmp(&b.id()))
    }
}

type Chain = LinkedTree<Point, ChainOrder>;

#[derive(Clone, Copy)]
enum NewBound {
    Top,
    Bottom,
}

/// The convex hull of the currently active vertex set.
pub struct ConvexHull {
    left: Chain,
    right: Chain,
    top: Option<NodeRef>,
    bottom: Option<NodeRef>,
    min_x: Option<NodeRef>,
    max_x: Option<NodeRef>,
}

impl ConvexHull {
    /// Builds the hull of `points`. O(n log n).
    ///
    /// The input is split by the line through the extreme-y points into
    /// the two chain subsets (ties go to both sides, deduplicated from
    /// the larger one afterwards), each subset is sorted by the chain
    /// order and reduced with a monotone stack scan.
    pub fn build<I: IntoIterator<Item = Point>>(points: I) -> ConvexHull {
        let points: Vec<Point> = points.into_iter().collect();
        match points.len() {
            0 => return Self::from_chain_vecs(vec![], vec![]),
            1 => return Self::from_chain_vecs(points, vec![]),
            2 => {
                let mut it = points.into_iter();
                let first = it.next().expect("two points");
                let second = it.next().expect("two points");
                return Self::from_chain_vecs(vec![first], vec![second]);
            }
            _ => {}
        }

        let mut min_x = points[0];
        let mut max_x = points[0];
        let mut min_y = points[0];
        let mut max_y = points[0];
        for p in &points[1..] {
            if p.x() < min_x.x() {
                min_x = *p;
            }
            if p.x() > max_x.x() {
                max_x = *p;
            }
            if p.y() < min_y.y() {
                min_y = *p;
            }
            if p.y() > max_y.y() {
                max_y = *p;
            }
        }

        // Split into the chain subsets along the bottom-top line.
        let split_edge = Edge::from_points(&min_y, &max_y);
        let mut left = Vec::new();
        let mut right = Vec::new();
        for p in points {
            let ori = split_edge.rel_orientation(p.pos());
            if ori < 0.0 {
                left.push(p);
            } else if ori > 0.0 {
                right.push(p);
            } else {
                left.push(p);
                right.push(p);
            }
        }

        let left_order = ChainOrder::new(Side::Left);
        left_order.set_split(min_x.x());
        let right_order = ChainOrder::new(Side::Right);
        right_order.set_split(max_x.x());
        left.sort_by(|a, b| left_order.compare(a, b));
        right.sort_by(|a, b| right_order.compare(a, b));

        let mut left = half_hull(left, true);
        let mut right = half_hull(right, false);

        // The extreme-y points were assigned to both subsets; drop the
        // duplicates from the larger chain.
        {
            let (big, small) = if left.len() > right.len() {
                (&mut left, &mut right)
            } else {
                (&mut right, &mut left)
            };
            for extreme in [min_y, max_y].iter() {
                if big.contains(extreme) && small.contains(extreme) {
                    big.retain(|p| p != extreme);
                }
            }
        }

        Self::from_chain_vecs(left, right)
    }

    fn from_chain_vecs(left: Vec<Point>, right: Vec<Point>) -> ConvexHull {
        let mut hull = ConvexHull {
            left: LinkedTree::with_capacity(ChainOrder::new(Side::Left), left.len()),
            right: LinkedTree::with_capacity(ChainOrder::new(Side::Right), right.len()),
            top: None,
            bottom: None,
            min_x: None,
            max_x: None,
        };
        if let Some(p) = left.iter().chain(right.iter()).next() {
            // Provisional splits; corrected by update_min_max_x below.
            let min = left
                .iter()
                .chain(right.iter())
                .fold(p.x(), |m, q| m.min(q.x()));
            let max = left
                .iter()
                .chain(right.iter())
                .fold(p.x(), |m, q| m.max(q.x()));
            hull.left.comparator().set_split(min);
            hull.right.comparator().set_split(max);
        }
        for p in left {
            hull.left.insert(p);
        }
        for p in right {
            hull.right.insert(p);
        }
        // Construction ties: the top prefers the right chain, the
        // bottom the left chain.
        hull.top = match (hull.left.last(), hull.right.last()) {
            (Some(l), Some(r)) => {
                if hull.left.key(l).y() > hull.right.key(r).y() {
                    Some(NodeRef {
                        side: Side::Left,
                        id: l,
                    })
                } else {
                    Some(NodeRef {
                        side: Side::Right,
                        id: r,
                    })
                }
            }
            (Some(l), None) => Some(NodeRef {
                side: Side::Left,
                id: l,
            }),
            (None, Some(r)) => Some(NodeRef {
                side: Side::Right,
                id: r,
            }),
            (None, None) => None,
        };
        hull.bottom = match (hull.left.first(), hull.right.first()) {
            (Some(l), Some(r)) => {
                if hull.left.key(l).y() > hull.right.key(r).y() {
                    Some(NodeRef {
                        side: Side::Right,
                        id: r,
                    })
                } else {
                    Some(NodeRef {
                        side: Side::Left,
                        id: l,
                    })
                }
            }
            (Some(l), None) => Some(NodeRef {
                side: Side::Left,
                id: l,
            }),
            (None, Some(r)) => Some(NodeRef {
                side: Side::Right,
                id: r,
            }),
            (None, None) => None,
        };
        hull.update_min_max_x();
        hull
    }

    #[inline]
    fn chain(&self, side: Side) -> &Chain {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    #[inline]
    fn chain_mut(&mut self, side: Side) -> &mut Chain {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The point behind a live handle.
    #[inline]
    pub fn point(&self, r: NodeRef) -> Point {
        *self.chain(r.side).key(r.id)
    }

    #[inline]
    fn contains_ref(&self, r: NodeRef) -> bool {
        self.chain(r.side).contains_id(r.id)
    }

    pub fn top(&self) -> Option<Point> {
        self.top.map(|r| self.point(r))
    }

    pub fn bottom(&self) -> Option<Point> {
        self.bottom.map(|r| self.point(r))
    }

    pub fn min_x(&self) -> Option<Point> {
        self.min_x.map(|r| self.point(r))
    }

    pub fn max_x(&self) -> Option<Point> {
        self.max_x.map(|r| self.point(r))
    }

    /// The directed edge from the bottom to the top vertex.
    pub fn bottom_top_edge(&self) -> Edge {
        let bottom = self.bottom.expect("non-empty hull");
        let top = self.top.expect("non-empty hull");
        Edge::new(self.point(bottom).pos(), self.point(top).pos())
    }

    /// Boundary points in clockwise order: left chain ascending, right
    /// chain descending.
    pub fn iter_points(&self) -> impl Iterator<Item = Point> + '_ {
        let right_rev = RevChain {
            tree: &self.right,
            cur: self.right.last(),
        };
        self.left.iter().copied().chain(right_rev)
    }

    /// The i-th boundary vertex in clockwise iteration order.
    pub fn node_at(&self, index: usize) -> Option<NodeRef> {
        if index < self.left.len() {
            self.left.get(index).map(|id| NodeRef {
                side: Side::Left,
                id,
            })
        } else {
            let right_index = self
                .right
                .len()
                .checked_sub(index - self.left.len() + 1)?;
            self.right.get(right_index).map(|id| NodeRef {
                side: Side::Right,
                id,
            })
        }
    }

    /// The i-th boundary point in clockwise iteration order.
    pub fn get(&self, index: usize) -> Option<Point> {
        self.node_at(index).map(|r| self.point(r))
    }

    /// The boundary edge starting at the i-th vertex.
    pub fn edge_at(&self, index: usize) -> Result<ProbeEdge, Error> {
        let a = self.node_at(index).ok_or_else(|| {
            Error::InvariantViolation(format!("edge index {} out of bounds", index))
        })?;
        let b = self.clockwise(a)?;
        Ok(ProbeEdge { a, b })
    }

    /// The geometric edge of a probe edge of this hull.
    pub fn probe_edge_geometry(&self, probe: &ProbeEdge) -> Edge {
        Edge::new(self.point(probe.a).pos(), self.point(probe.b).pos())
    }

    /// Successor in chain order; wraps to the other chain's maximum at
    /// the chain end, or returns the node itself if there is no other
    /// node. O(1).
    pub fn next(&self, r: NodeRef) -> NodeRef {
        if let Some(id) = self.chain(r.side).next(r.id) {
            return NodeRef { side: r.side, id };
        }
        if r.side == Side::Left {
            match self.right.last() {
                Some(id) => NodeRef {
                    side: Side::Right,
                    id,
                },
                None => r,
            }
        } else {
            match self.left.last() {
                Some(id) => NodeRef {
                    side: Side::Left,
                    id,
                },
                None => r,
            }
        }
    }

    /// Predecessor in chain order; wraps to the other chain's minimum
    /// at the chain start. O(1).
    pub fn prev(&self, r: NodeRef) -> NodeRef {
        if let Some(id) = self.chain(r.side).prev(r.id) {
            return NodeRef { side: r.side, id };
        }
        if r.side == Side::Left {
            match self.right.first() {
                Some(id) => NodeRef {
                    side: Side::Right,
                    id,
                },
                None => r,
            }
        } else {
            match self.left.first() {
                Some(id) => NodeRef {
                    side: Side::Left,
                    id,
                },
                None => r,
            }
        }
    }

    /// Next boundary vertex in geometric clockwise order. O(1).
    pub fn clockwise(&self, r: NodeRef) -> Result<NodeRef, Error> {
        if !self.contains_ref(r) {
            return Err(Error::NotMember);
        }
        Ok(match r.side {
            Side::Left => match self.left.next(r.id) {
                Some(id) => NodeRef {
                    side: Side::Left,
                    id,
                },
                None => {
                    if self.right.is_empty() {
                        NodeRef {
                            side: Side::Left,
                            id: self.left.first().expect("node side is non-empty"),
                        }
                    } else {
                        NodeRef {
                            side: Side::Right,
                            id: self.right.last().expect("chain checked non-empty"),
                        }
                    }
                }
            },
            Side::Right => match self.right.prev(r.id) {
                Some(id) => NodeRef {
                    side: Side::Right,
                    id,
                },
                None => {
                    if self.left.is_empty() {
                        NodeRef {
                            side: Side::Right,
                            id: self.right.last().expect("node side is non-empty"),
                        }
                    } else {
                        NodeRef {
                            side: Side::Left,
                            id: self.left.first().expect("chain checked non-empty"),
                        }
                    }
                }
            },
        })
    }

    /// Next boundary vertex in geometric counter-clockwise order. O(1).
    pub fn counter_clockwise(&self, r: NodeRef) -> Result<NodeRef, Error> {
        if !self.contains_ref(r) {
            return Err(Error::NotMember);
        }
        Ok(match r.side {
            Side::Left => match self.left.prev(r.id) {
                Some(id) => NodeRef {
                    side: Side::Left,
                    id,
                },
                None => {
                    if self.right.is_empty() {
                        NodeRef {
                            side: Side::Left,
                            id: self.left.last().expect("node side is non-empty"),
                        }
                    } else {
                        NodeRef {
                            side: Side::Right,
                            id: self.right.first().expect("chain checked non-empty"),
                        }
                    }
                }
            },
            Side::Right => match self.right.next(r.id) {
                Some(id) => NodeRef {
                    side: Side::Right,
                    id,
                },
                None => {
                    if self.left.is_empty() {
                        NodeRef {
                            side: Side::Right,
                            id: self.right.first().expect("node side is non-empty"),
                        }
                    } else {
                        NodeRef {
                            side: Side::Left,
                            id: self.left.last().expect("chain checked non-empty"),
                        }
                    }
                }
            },
        })
    }

    /// Inserts a vertex. O(log n). Returns false if already present.
    pub fn insert(&mut self, p: Point) -> bool {
        self.insert_ref(p).is_some()
    }

    fn insert_ref(&mut self, p: Point) -> Option<NodeRef> {
        if self.is_empty() {
            self.left.comparator().set_split(p.x());
            self.right.comparator().set_split(p.x());
            let id = self.left.insert(p)?;
            let r = NodeRef {
                side: Side::Left,
                id,
            };
            self.top = Some(r);
            self.bottom = Some(r);
            self.min_x = Some(r);
            self.max_x = Some(r);
            return Some(r);
        }

        let top_r = self.top.expect("non-empty hull");
        let bottom_r = self.bottom.expect("non-empty hull");
        let top_p = self.point(top_r);
        let bottom_p = self.point(bottom_r);

        // A new extreme-y vertex moves the bottom-top line; the old
        // extreme may end up on the other side of it and then has to
        // switch chains.
        let mut new_bound = None;
        if p.y() > top_p.y() {
            let e = Edge::new(bottom_p.pos(), p.pos());
            let ori = e.rel_orientation(top_p.pos());
            if top_r.side == Side::Left {
                if ori > 0.0 {
                    self.migrate(top_r, Side::Right);
                }
            } else if ori < 0.0 {
                self.migrate(top_r, Side::Left);
            }
            new_bound = Some(NewBound::Top);
        } else if p.y() < bottom_p.y() {
            let e = Edge::new(p.pos(), top_p.pos());
            let ori = e.rel_orientation(bottom_p.pos());
            if bottom_r.side == Side::Left {
                if ori > 0.0 {
                    self.migrate(bottom_r, Side::Right);
                }
            } else if ori < 0.0 {
                self.migrate(bottom_r, Side::Left);
            }
            new_bound = Some(NewBound::Bottom);
        }

        let side = match new_bound {
            // The new vertex glues the chains; balance the trees.
            Some(_) => {
                if self.left.len() > self.right.len() {
                    Side::Right
                } else {
                    Side::Left
                }
            }
            None => {
                let e = self.bottom_top_edge();
                if e.rel_orientation(p.pos()) < 0.0 {
                    Side::Left
                } else {
                    Side::Right
                }
            }
        };

        // Update the split abscissas before the tree descent compares
        // against them.
        let is_new_max = p.x() > self.point(self.max_x.expect("non-empty hull")).x();
        let is_new_min = !is_new_max && p.x() < self.point(self.min_x.expect("non-empty hull")).x();
        if is_new_max {
            self.right.comparator().set_split(p.x());
        }
        if is_new_min {
            self.left.comparator().set_split(p.x());
        }

        let id = self.chain_mut(side).insert(p)?;
        let r = NodeRef { side, id };
        match new_bound {
            Some(NewBound::Top) => self.top = Some(r),
            Some(NewBound::Bottom) => self.bottom = Some(r),
            None => {}
        }
        if is_new_max {
            self.max_x = Some(r);
        }
        if is_new_min {
            self.min_x = Some(r);
        }
        Some(r)
    }

    /// Moves a node to the other chain, fixing every cached handle.
    fn migrate(&mut self, r: NodeRef, to: Side) -> NodeRef {
        let p = self.chain_mut(r.side).remove_node(r.id);
        let id = self
            .chain_mut(to)
            .insert(p)
            .expect("migrated vertex is unique in its new chain");
        let new_r = NodeRef { side: to, id };
        if self.top == Some(r) {
            self.top = Some(new_r);
        }
        if self.bottom == Some(r) {
            self.bottom = Some(new_r);
        }
        if self.min_x == Some(r) {
            self.min_x = Some(new_r);
        }
        if self.max_x == Some(r) {
            self.max_x = Some(new_r);
        }
        new_r
    }

    /// Removes a vertex by value. O(log n).
    pub fn remove(&mut self, p: &Point) -> bool {
        if self.is_empty() {
            return false;
        }
        let r = if let Some(id) = self.left.find(p) {
            NodeRef {
                side: Side::Left,
                id,
            }
        } else if let Some(id) = self.right.find(p) {
            NodeRef {
                side: Side::Right,
                id,
            }
        } else {
            return false;
        };
        self.remove_ref(r);
        true
    }

    fn remove_ref(&mut self, r: NodeRef) -> Point {
        // The neighbors survive the removal and replace the extreme
        // caches where needed.
        let next_r = self.next(r);
        let prev_r = self.prev(r);
        let next_p = self.point(next_r);
        let prev_p = self.point(prev_r);
        let was_min = self.min_x == Some(r);
        let was_max = self.max_x == Some(r);

        let p = self.chain_mut(r.side).remove_node(r.id);

        if self.is_empty() {
            self.top = None;
            self.bottom = None;
            self.min_x = None;
            self.max_x = None;
            return p;
        }

        self.reset_vertical_bounds();

        if was_min {
            let r2 = if next_p.x() < prev_p.x() { next_r } else { prev_r };
            self.min_x = Some(r2);
            self.left.comparator().set_split(self.point(r2).x());
        }
        if was_max {
            let r2 = if next_p.x() > prev_p.x() { next_r } else { prev_r };
            self.max_x = Some(r2);
            self.right.comparator().set_split(self.point(r2).x());
        }
        p
    }

    /// Recomputes `top`/`bottom` from the chain extremes.
    fn reset_vertical_bounds(&mut self) {
        self.top = match (self.left.last(), self.right.last()) {
            (Some(l), Some(r)) => {
                if self.left.key(l).y() > self.right.key(r).y() {
                    Some(NodeRef {
                        side: Side::Left,
                        id: l,
                    })
                } else {
                    Some(NodeRef {
                        side: Side::Right,
                        id: r,
                    })
                }
            }
            (Some(l), None) => Some(NodeRef {
                side: Side::Left,
                id: l,
            }),
            (None, Some(r)) => Some(NodeRef {
                side: Side::Right,
                id: r,
            }),
            (None, None) => None,
        };
        self.bottom = match (self.left.first(), self.right.first()) {
            (Some(l), Some(r)) => {
                if self.left.key(l).y() < self.right.key(r).y() {
                    Some(NodeRef {
                        side: Side::Left,
                        id: l,
                    })
                } else {
                    Some(NodeRef {
                        side: Side::Right,
                        id: r,
                    })
                }
            }
            (Some(l), None) => Some(NodeRef {
                side: Side::Left,
                id: l,
            }),
            (None, Some(r)) => Some(NodeRef {
                side: Side::Right,
                id: r,
            }),
            (None, None) => None,
        };
    }

    /// Rebuilds the `min_x`/`max_x` caches with a ridge descent over
    /// each chain. O(log n).
    fn update_min_max_x(&mut self) {
        self.min_x = None;
        self.max_x = None;
        if self.is_empty() {
            return;
        }
        let top = self.top.expect("non-empty hull");
        let bottom = self.bottom.expect("non-empty hull");

        let mut min_r = if self.point(top).x() < self.point(bottom).x() {
            top
        } else {
            bottom
        };
        if let Some(root) = self.left.root() {
            let mut node = Some(root);
            let mut last = root;
            while let Some(n) = node {
                last = n;
                let r = NodeRef {
                    side: Side::Left,
                    id: n,
                };
                let x = self.point(r).x();
                let d_next = x - self.point(self.next(r)).x();
                let d_prev = x - self.point(self.prev(r)).x();
                if (d_next < 0.0 && d_prev < 0.0) || d_next == 0.0 || d_prev == 0.0 {
                    break;
                } else if d_next < 0.0 {
                    node = self.left.left(n);
                } else if d_prev < 0.0 {
                    node = self.left.right(n);
                } else {
                    break;
                }
            }
            let last_r = NodeRef {
                side: Side::Left,
                id: last,
            };
            if self.point(last_r).x() < self.point(min_r).x() {
                min_r = last_r;
            }
        }
        self.min_x = Some(min_r);
        self.left.comparator().set_split(self.point(min_r).x());

        let mut max_r = if self.point(top).x() > self.point(bottom).x() {
            top
        } else {
            bottom
        };
        if let Some(root) = self.right.root() {
            let mut node = Some(root);
            let mut last = root;
            while let Some(n) = node {
                last = n;
                let r = NodeRef {
                    side: Side::Right,
                    id: n,
                };
                let x = self.point(r).x();
                let d_next = x - self.point(self.next(r)).x();
                let d_prev = x - self.point(self.prev(r)).x();
                if (d_next > 0.0 && d_prev > 0.0) || d_next == 0.0 || d_prev == 0.0 {
                    break;
                } else if d_next > 0.0 {
                    node = self.right.left(n);
                } else if d_prev > 0.0 {
                    node = self.right.right(n);
                } else {
                    break;
                }
            }
            let last_r = NodeRef {
                side: Side::Right,
                id: last,
            };
            if self.point(last_r).x() > self.point(max_r).x() {
                max_r = last_r;
            }
        }
        self.max_x = Some(max_r);
        self.right.comparator().set_split(self.point(max_r).x());
    }

    /// Finds the four vertices bracketing the two crossings of the
    /// extended `edge` with the hull boundary. O(log n).
    ///
    /// `hull_on_left` states on which side of the directed edge the
    /// probing hull (whose edge this is) lies. A line through the top
    /// or bottom vertex is degenerate input.
    pub fn points_near_line(
        &self,
        edge: &Edge,
        hull_on_left: bool,
    ) -> Result<NearIntersection, Error> {
        if self.is_empty() {
            return Err(Error::InvariantViolation(
                "near-line query on an empty hull".into(),
            ));
        }
        let top_p = self.point(self.top.expect("non-empty hull"));
        let bottom_p = self.point(self.bottom.expect("non-empty hull"));

        let mut e = *edge;
        let mut hull_on_left = hull_on_left;

        let rel_top = e.rel_orientation(top_p.pos());
        let rel_bottom = e.rel_orientation(bottom_p.pos());
        if rel_top == 0.0 {
            return Err(Error::DegenerateGeometry(format!(
                "query line passes through the hull top {:?}",
                top_p.pos()
            )));
        }
        if rel_bottom == 0.0 {
            return Err(Error::DegenerateGeometry(format!(
                "query line passes through the hull bottom {:?}",
                bottom_p.pos()
            )));
        }

        let (outer1, inner1, inner2, outer2, ori);
        if rel_top * rel_bottom < 0.0 {
            // The line crosses both chains. Direct it to the right
            // relative to the bottom-top line.
            let bt = self.bottom_top_edge();
            if bt.rel_orientation(e.v1()) > bt.rel_orientation(e.v2()) {
                e = e.reversed();
                hull_on_left = !hull_on_left;
            }
            trace!("near-line: crosses both chains, hull_on_left={}", hull_on_left);
            let pair1 = self.cross_both(Side::Left, &e)?;
            let pair2 = self.cross_both(Side::Right, &e)?;
            if hull_on_left {
                outer1 = pair1.0;
                inner1 = pair1.1;
                inner2 = pair2.1;
                outer2 = pair2.0;
                ori = Orientation::Bottom;
            } else {
                outer1 = pair1.1;
                inner1 = pair1.0;
                inner2 = pair2.0;
                outer2 = pair2.1;
                ori = Orientation::Top;
            }
        } else {
            // Both crossings are on one chain; the probe end points lie
            // on the same side of the bottom-top line.
            let bt = self.bottom_top_edge();
            if bt.rel_orientation(e.v1()) < 0.0 {
                // Left chain; direct the line upwards.
                if e.v1().y > e.v2().y {
                    e = e.reversed();
                    hull_on_left = !hull_on_left;
                }
                trace!("near-line: crosses left chain, hull_on_left={}", hull_on_left);
                let pair1 = self.cross_one(Side::Left, &e, true)?;
                let pair2 = self.cross_one(Side::Left, &e, false)?;
                if hull_on_left {
                    outer1 = pair1.1;
                    inner1 = pair1.0;
                    inner2 = pair2.1;
                    outer2 = pair2.0;
                    ori = Orientation::Right;
                } else {
                    outer1 = pair1.0;
                    inner1 = pair1.1;
                    inner2 = pair2.0;
                    outer2 = pair2.1;
                    ori = Orientation::Left;
                }
            } else {
                // Right chain; direct the line downwards.
                if e.v1().y < e.v2().y {
                    e = e.reversed();
                    hull_on_left = !hull_on_left;
                }
                trace!("near-line: crosses right chain, hull_on_left={}", hull_on_left);
                let pair1 = self.cross_one(Side::Right, &e, true)?;
                let pair2 = self.cross_one(Side::Right, &e, false)?;
                if hull_on_left {
                    outer1 = pair1.1;
                    inner1 = pair1.0;
                    inner2 = pair2.1;
                    outer2 = pair2.0;
                    ori = Orientation::Left;
                } else {
                    outer1 = pair1.0;
                    inner1 = pair1.1;
                    inner2 = pair2.0;
                    outer2 = pair2.1;
                    ori = Orientation::Right;
                }
            }
        }
        Ok(NearIntersection {
            outer1,
            inner1,
            inner2,
            outer2,
            ori,
        })
    }

    /// Binary descent for a line crossing both chains (directed to the
    /// right of the bottom-top line). Returns the bracketing pair of
    /// one chain, the above-line node first.
    fn cross_both(&self, side: Side, e: &Edge) -> Result<(NodeRef, NodeRef), Error> {
        let tree = self.chain(side);
        let mut node = tree.root().ok_or_else(|| {
            Error::InvariantViolation("line reported crossing an empty chain".into())
        })?;
        loop {
            let r = NodeRef { side, id: node };
            let ori = e.rel_orientation(self.point(r).pos());
            if ori < 0.0 {
                let prev = self.prev(r);
                if tree.left(node).is_none()
                    || e.rel_orientation(self.point(prev).pos()) >= 0.0
                {
                    return Ok((r, prev));
                }
                node = tree.left(node).expect("descent checked the child");
            } else if ori > 0.0 {
                let next = self.next(r);
                if tree.right(node).is_none()
                    || e.rel_orientation(self.point(next).pos()) <= 0.0
                {
                    return Ok((next, r));
                }
                node = tree.right(node).expect("descent checked the child");
            } else {
                return Ok((self.next(r), r));
            }
        }
    }

    /// Binary descent for a line crossing one chain twice. `up` selects
    /// the crossing above the probe segment (the line must be directed
    /// upwards for the left chain, downwards for the right). Returns
    /// the bracketing pair, the higher node first.
    fn cross_one(&self, side: Side, e: &Edge, up: bool) -> Result<(NodeRef, NodeRef), Error> {
        let tree = self.chain(side);
        let mut node = tree.root().ok_or_else(|| {
            Error::InvariantViolation("line reported crossing an empty chain".into())
        })?;
        let target = if up {
            e.v1().y.max(e.v2().y)
        } else {
            e.v1().y.min(e.v2().y)
        };
        loop {
            let r = NodeRef { side, id: node };
            let pos = self.point(r).pos();
            if up && pos.y < target {
                match tree.right(node) {
                    Some(n) => {
                        node = n;
                        continue;
                    }
                    None => return Ok((self.next(r), r)),
                }
            }
            if !up && pos.y > target {
                match tree.left(node) {
                    Some(n) => {
                        node = n;
                        continue;
                    }
                    None => return Ok((r, self.prev(r))),
                }
            }

            let ori = e.rel_orientation(pos);
            if (up && ori < 0.0) || (!up && ori > 0.0) {
                let next = self.next(r);
                if tree.right(node).is_none()
                    || e.rel_orientation(self.point(next).pos()) * ori < 0.0
                {
                    return Ok((next, r));
                }
                node = tree.right(node).expect("descent checked the child");
            } else if (up && ori > 0.0) || (!up && ori < 0.0) {
                let prev = self.prev(r);
                if tree.left(node).is_none()
                    || e.rel_orientation(self.point(prev).pos()) * ori <= 0.0
                {
                    return Ok((r, prev));
                }
                node = tree.left(node).expect("descent checked the child");
            } else if up {
                return Ok((self.next(r), r));
            } else {
                return Ok((r, self.prev(r)));
            }
        }
    }

    /// Removes the cap of vertices between the two crossings,
    /// `inner1` through `inner2` inclusive.
    pub fn remove_middle_nodes(&mut self, ni: &NearIntersection) -> Result<(), Error> {
        let clockwise = ni.ori.cap_clockwise();
        let mut budget = self.len();
        let mut node = ni.inner1;
        while node != ni.inner2 {
            if budget == 0 {
                return Err(Error::InvariantViolation(
                    "cap walk did not reach the far crossing".into(),
                ));
            }
            budget -= 1;
            let doomed = node;
            node = if clockwise {
                self.clockwise(node)?
            } else {
                self.counter_clockwise(node)?
            };
            self.remove_ref(doomed);
        }
        self.remove_ref(ni.inner2);
        Ok(())
    }

    /// Splits a probe edge of this hull into the anchor paired with the
    /// `outer1`/`inner1` crossing ("first") and the other one.
    ///
    /// For `Left`/`Right` caps the first anchor is the higher end
    /// point; for `Top`/`Bottom` caps it is the end point further to
    /// the left of `rel_edge` (the probed hull's bottom-top edge).
    pub fn probe_anchor(
        &self,
        probe: &ProbeEdge,
        ori: Orientation,
        rel_edge: &Edge,
    ) -> (NodeRef, NodeRef) {
        let pa = self.point(probe.a);
        let pb = self.point(probe.b);
        let a_first = match ori {
            Orientation::Left | Orientation::Right => pa.y() > pb.y(),
            Orientation::Top | Orientation::Bottom => {
                rel_edge.rel_orientation(pa.pos()) < rel_edge.rel_orientation(pb.pos())
            }
        };
        if a_first {
            (probe.a, probe.b)
        } else {
            (probe.b, probe.a)
        }
    }

    /// Inserts a point and repairs the hull.
    ///
    /// A point strictly inside the hull is removed again immediately
    /// and returned as the sole element; otherwise the clockwise and
    /// counter-clockwise neighbors of the insertion are evicted while
    /// they break convexity, and all evicted points are returned.
    /// O(log n + k) with k evictions.
    pub fn add_and_update(&mut self, p: Point) -> SmallVec<[Point; 4]> {
        let mut removed = SmallVec::new();
        let r = match self.insert_ref(p) {
            Some(r) => r,
            None => {
                removed.push(p);
                return removed;
            }
        };
        if self.len() <= 3 {
            return removed;
        }
        {
            let prev = self
                .counter_clockwise(r)
                .expect("freshly inserted node is a member");
            let next = self.clockwise(r).expect("freshly inserted node is a member");
            let e = Edge::new(self.point(prev).pos(), self.point(next).pos());
            if e.rel_orientation(p.pos()) > 0.0 {
                self.remove_ref(r);
                removed.push(p);
                return removed;
            }
        }

        // Evict clockwise neighbors that the new vertex makes reflex.
        while self.len() > 3 {
            let cur = self.clockwise(r).expect("anchor stays a member");
            let next = self.clockwise(cur).expect("walk stays within the hull");
            let e = Edge::new(p.pos(), self.point(next).pos());
            if e.rel_orientation(self.point(cur).pos()) <= 0.0 {
                break;
            }
            removed.push(self.point(cur));
            self.remove_ref(cur);
        }

        // And symmetrically counter-clockwise.
        while self.len() > 3 {
            let cur = self.counter_clockwise(r).expect("anchor stays a member");
            let prev = self
                .counter_clockwise(cur)
                .expect("walk stays within the hull");
            let e = Edge::new(self.point(prev).pos(), p.pos());
            if e.rel_orientation(self.point(cur).pos()) <= 0.0 {
                break;
            }
            removed.push(self.point(cur));
            self.remove_ref(cur);
        }

        removed
    }

    /// Edges connecting a point strictly inside this hull to two
    /// (occasionally three) boundary vertices such that every incident
    /// angle stays convex. One clockwise scan, O(n).
    pub fn inner_point_connections(&self, center: &Point) -> Result<HashSet<OutputEdge>, Error> {
        if self.is_empty() {
            return Err(Error::InvariantViolation(
                "inner-point connection on an empty hull".into(),
            ));
        }
        let mut out = HashSet::new();

        let last = self.get(self.len() - 1).expect("non-empty hull");
        out.insert(OutputEdge::new(*center, last));
        let mut e = Edge::from_points(center, &last);

        let mut prev: Option<Point> = None;
        for p in self.iter_points() {
            let ori = e.rel_orientation(p.pos());
            if ori <= 0.0 {
                let anchor = prev.ok_or_else(|| {
                    Error::InvariantViolation("connection center lies outside the hull".into())
                })?;
                out.insert(OutputEdge::new(*center, anchor));
                e = Edge::from_points(center, &anchor);
            }
            prev = Some(p);
        }

        if e.rel_orientation(last.pos()) <= 0.0 {
            let anchor = prev.ok_or_else(|| {
                Error::InvariantViolation("connection center lies outside the hull".into())
            })?;
            out.insert(OutputEdge::new(*center, anchor));
        }

        Ok(out)
    }
}

/// Monotone stack scan over one pre-sorted chain subset.
fn half_hull(input: Vec<Point>, inverse: bool) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(input.len());
    for iv in input {
        if out.len() < 2 {
            out.push(iv);
            continue;
        }
        let mut last;
        let mut ori;
        loop {
            last = out.pop().expect("stack holds at least two entries");
            let sec_last = *out.last().expect("stack holds at least one entry");
            let e = if inverse {
                Edge::from_points(&last, &sec_last)
            } else {
                Edge::from_points(&sec_last, &last)
            };
            ori = e.rel_orientation(iv.pos());
            if !(ori > 0.0 && out.len() >= 2) {
                break;
            }
        }
        if ori <= 0.0 {
            out.push(last);
        }
        out.push(iv);
    }
    out
}

struct RevChain<'a> {
    tree: &'a Chain,
    cur: Option<NodeId>,
}

impl<'a> Iterator for RevChain<'a> {
    type Item = Point;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = self.tree.prev(id);
        Some(*self.tree.key(id))
    }
}

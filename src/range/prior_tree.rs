use log::trace;

use crate::geometry::Point;

#[derive(Debug)]
struct Node {
    data: Point,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    /// y-coordinate this node's subtree splits on.
    y_split: f64,
    /// Tie-break abscissa when a query sits exactly on `y_split`.
    x_split: f64,
}

/// A static priority search tree.
///
/// Each node stores the minimum-x point of its range (x acts as the
/// heap priority, giving every subtree an x lower bound to prune on)
/// and routes on the range's y-median, ties going left for x up to the
/// median's. Built once in O(n log n); three-sided range reports run
/// in O(log n + k). There is no insertion; the structure is rebuilt
/// when its content changes wholesale, and supports point removal by
/// pulling the smaller-x child up the vacated path.
pub struct PriorityTree {
    nodes: Vec<Node>,
    root: Option<usize>,
    len: usize,
}

impl PriorityTree {
    pub fn build(points: Vec<Point>) -> PriorityTree {
        let mut tree = PriorityTree {
            nodes: Vec::with_capacity(points.len()),
            root: None,
            len: points.len(),
        };
        if points.is_empty() {
            return tree;
        }
        let mut x_arr = points;
        x_arr.sort_by(|a, b| a.x().partial_cmp(&b.x()).expect("finite coordinates"));
        let mut y_arr = x_arr.clone();
        y_arr.sort_by(|a, b| a.y().partial_cmp(&b.y()).expect("finite coordinates"));
        tree.root = tree.build_range(&x_arr, &y_arr, None);
        tree
    }

    fn build_range(&mut self, x_arr: &[Point], y_arr: &[Point], parent: Option<usize>) -> Option<usize> {
        let first = *x_arr.first()?;
        let median = y_arr[(y_arr.len() - 1) / 2];

        let idx = self.nodes.len();
        self.nodes.push(Node {
            data: first,
            parent,
            left: None,
            right: None,
            y_split: median.y(),
            x_split: median.x(),
        });

        // Partition everything except the extracted minimum around the
        // median, keeping both sort orders.
        let goes_left = |p: &Point| {
            p.y() < median.y() || (p.y() == median.y() && p.x() <= median.x())
        };
        let mut left_y = Vec::new();
        let mut right_y = Vec::new();
        let mut skipped = false;
        for p in y_arr {
            if !skipped && *p == first {
                skipped = true;
                continue;
            }
            if goes_left(p) {
                left_y.push(*p);
            } else {
                right_y.push(*p);
            }
        }
        let mut left_x = Vec::new();
        let mut right_x = Vec::new();
        for p in &x_arr[1..] {
            if goes_left(p) {
                left_x.push(*p);
            } else {
                right_x.push(*p);
            }
        }

        let left = self.build_range(&left_x, &left_y, Some(idx));
        self.nodes[idx].left = left;
        let right = self.build_range(&right_x, &right_y, Some(idx));
        self.nodes[idx].right = right;
        Some(idx)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn find(&self, p: &Point) -> Option<usize> {
        let mut node = self.root?;
        loop {
            let n = &self.nodes[node];
            if p.x() < n.data.x() {
                return None;
            }
            if n.data == *p {
                return Some(node);
            }
            let next = if p.y() < n.y_split || (p.y() == n.y_split && p.x() <= n.x_split) {
                n.left
            } else {
                n.right
            };
            node = next?;
        }
    }

    pub fn contains(&self, p: &Point) -> bool {
        self.find(p).is_some()
    }

    /// Removes a point by pulling up the smaller-x child along the
    /// vacated path, preserving the heap order on x.
    pub fn remove(&mut self, p: &Point) -> bool {
        let mut node = match self.find(p) {
            Some(n) => n,
            None => return false,
        };
        self.len -= 1;

        loop {
            let target = match (self.nodes[node].left, self.nodes[node].right) {
                (None, None) => None,
                (Some(l), None) => Some(l),
                (None, Some(r)) => Some(r),
                (Some(l), Some(r)) => {
                    let lp = self.nodes[l].data;
                    let rp = self.nodes[r].data;
                    if lp.x() < rp.x() || (lp.x() == rp.x() && lp.y() <= rp.y()) {
                        Some(l)
                    } else {
                        Some(r)
                    }
                }
            };
            match target {
                Some(t) => {
                    self.nodes[node].data = self.nodes[t].data;
                    node = t;
                }
                None => {
                    match self.nodes[node].parent {
                        Some(parent) => {
                            if self.nodes[parent].left == Some(node) {
                                self.nodes[parent].left = None;
                            } else {
                                self.nodes[parent].right = None;
                            }
                            self.nodes[node].parent = None;
                        }
                        None => self.root = None,
                    }
                    break;
                }
            }
        }
        true
    }

    /// Reports all points with `x <= x_max` and `y_min <= y <= y_max`.
    /// O(log n + k).
    pub fn query_unbounded(&self, x_max: f64, y_min: f64, y_max: f64) -> Vec<Point> {
        assert!(y_min <= y_max, "invalid query range {}..{}", y_min, y_max);
        trace!("priority query: x <= {}, y in [{}, {}]", x_max, y_min, y_max);
        let mut out = Vec::new();

        // Descend to the node whose split range straddles [y_min,
        // y_max].
        let mut node = self.root;
        let split = loop {
            let i = match node {
                Some(i) => i,
                None => return out,
            };
            let n = &self.nodes[i];
            if n.data.x() > x_max {
                return out;
            }
            if y_min <= n.data.y() && n.data.y() <= y_max {
                out.push(n.data);
            }
            if n.y_split < y_min {
                node = n.right;
            } else if y_max < n.y_split || (n.y_split == y_max && n.x_split >= x_max) {
                node = n.left;
            } else {
                break i;
            }
        };

        let (left, right) = (self.nodes[split].left, self.nodes[split].right);
        self.report_half(&mut out, left, x_max, y_min, y_max, true);
        self.report_half(&mut out, right, x_max, y_min, y_max, false);
        out
    }

    /// Follows one boundary of the query range below the split node,
    /// reporting fully-contained subtrees on the inner side.
    fn report_half(
        &self,
        out: &mut Vec<Point>,
        start: Option<usize>,
        x_max: f64,
        y_min: f64,
        y_max: f64,
        left_branch: bool,
    ) {
        let mut to_process: Vec<usize> = start.into_iter().collect();
        while let Some(i) = to_process.pop() {
            let n = &self.nodes[i];
            if n.data.x() > x_max {
                continue;
            }
            if y_min <= n.data.y() && n.data.y() <= y_max {
                out.push(n.data);
            }

            if n.y_split < y_min {
                if let Some(r) = n.right {
                    to_process.push(r);
                }
            } else if n.y_split > y_max || (n.y_split == y_max && n.x_split >= x_max) {
                if let Some(l) = n.left {
                    to_process.push(l);
                }
            } else if left_branch {
                self.report_all(out, n.right, x_max);
                if let Some(l) = n.left {
                    to_process.push(l);
                }
            } else {
                if let Some(r) = n.right {
                    to_process.push(r);
                }
                self.report_all(out, n.left, x_max);
            }
        }
    }

    /// Reports a whole subtree, pruning on the x heap order.
    fn report_all(&self, out: &mut Vec<Point>, start: Option<usize>, x_max: f64) {
        let mut stack: Vec<usize> = start.into_iter().collect();
        while let Some(i) = stack.pop() {
            let n = &self.nodes[i];
            if n.data.x() > x_max {
                continue;
            }
            out.push(n.data);
            if let Some(r) = n.right {
                stack.push(r);
            }
            if let Some(l) = n.left {
                stack.push(l);
            }
        }
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

    fn naive(points: &[Point], x_max: f64, y_min: f64, y_max: f64) -> HashSet<Point> {
        points
            .iter()
            .filter(|p| p.x() <= x_max && y_min <= p.y() && p.y() <= y_max)
            .copied()
            .collect()
    }

    #[test]
    fn test_query_matches_naive_on_grid() {
        let points = grid(12);
        let tree = PriorityTree::build(points.clone());
        for (x_max, y_min, y_max) in
            [(0.0, 0.0, 0.0), (3.0, 1.0, 4.0), (11.0, 0.0, 11.0), (5.5, 2.5, 2.5)]
        {
            let got: HashSet<Point> =
                tree.query_unbounded(x_max, y_min, y_max).into_iter().collect();
            assert_eq!(got, naive(&points, x_max, y_min, y_max));
        }
    }

    #[test]
    fn test_query_no_duplicates() {
        let tree = PriorityTree::build(grid(8));
        let reported = tree.query_unbounded(6.0, 1.0, 5.0);
        let unique: HashSet<Point> = reported.iter().copied().collect();
        assert_eq!(unique.len(), reported.len());
    }

    #[test]
    fn test_contains_and_remove() {
        let points = grid(6);
        let mut tree = PriorityTree::build(points.clone());
        assert_eq!(tree.len(), 36);
        for p in &points {
            assert!(tree.contains(p));
        }

        let victim = points[14];
        assert!(tree.remove(&victim));
        assert!(!tree.remove(&victim));
        assert!(!tree.contains(&victim));
        assert_eq!(tree.len(), 35);

        let got: HashSet<Point> = tree.query_unbounded(5.0, 0.0, 5.0).into_iter().collect();
        let mut expected = naive(&points, 5.0, 0.0, 5.0);
        expected.remove(&victim);
        assert_eq!(got, expected);
    }

    #[test]
    fn test_remove_everything() {
        let points = grid(4);
        let mut tree = PriorityTree::build(points.clone());
        for p in &points {
            assert!(tree.remove(p));
        }
        assert!(tree.is_empty());
        assert!(tree.query_unbounded(10.0, -1.0, 10.0).is_empty());
    }
}

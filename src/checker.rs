//! Solution validation collaborators.
//!
//! Checkers consume a problem and a candidate edge set and report the
//! offending points/edges; the solver does not depend on any concrete
//! implementation.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::fmt;

use itertools::Itertools;
use log::debug;

use crate::geometry::{angle_between, Coordinate, Edge, Point};
use crate::hull::ConvexHull;
use crate::problem::{OutputEdge, Problem};

/// Offenders found by a [`Checker`].
#[derive(Debug, Default)]
pub struct CheckerError {
    points: HashSet<Point>,
    edges: HashSet<OutputEdge>,
}

impl CheckerError {
    pub fn has_errors(&self) -> bool {
        !self.points.is_empty() || !self.edges.is_empty()
    }

    pub fn points(&self) -> &HashSet<Point> {
        &self.points
    }

    pub fn edges(&self) -> &HashSet<OutputEdge> {
        &self.edges
    }

    pub fn add_point(&mut self, p: Point) {
        self.points.insert(p);
    }

    pub fn add_edge(&mut self, e: OutputEdge) {
        self.edges.insert(e);
    }

    pub fn merge(&mut self, other: CheckerError) {
        self.points.extend(other.points);
        self.edges.extend(other.edges);
    }
}

impl fmt::Display for CheckerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_errors() {
            return write!(f, "no errors were found");
        }
        writeln!(f, "{} error edges:", self.edges.len())?;
        for e in &self.edges {
            writeln!(f, "  ({}, {})", e.a().id(), e.b().id())?;
        }
        writeln!(f, "{} error points:", self.points.len())?;
        for p in &self.points {
            writeln!(f, "  {} @ ({}, {})", p.id(), p.x(), p.y())?;
        }
        Ok(())
    }
}

/// Checks whether a solution to a problem is valid.
pub trait Checker {
    fn check(&self, problem: &Problem, solution: &HashSet<OutputEdge>) -> CheckerError;
}

/// Verifies local convexity.
///
/// At every input point the incident solution edges, sorted by
/// clockwise bearing, must leave no angular gap larger than π. The
/// exception is a point on the input's convex hull, which owns one
/// reflex gap facing away from the hull (the unbounded face). Every
/// point needs at least two incident edges.
#[derive(Debug, Default)]
pub struct ConvexChecker;

impl Checker for ConvexChecker {
    fn check(&self, problem: &Problem, solution: &HashSet<OutputEdge>) -> CheckerError {
        let mut err = CheckerError::default();
        if problem.points().is_empty() {
            return err;
        }

        let boundary: HashSet<Point> = ConvexHull::build(problem.points().to_vec())
            .iter_points()
            .collect();
        let centroid = {
            let n = problem.points().len() as f64;
            Coordinate {
                x: problem.points().iter().map(Point::x).sum::<f64>() / n,
                y: problem.points().iter().map(Point::y).sum::<f64>() / n,
            }
        };

        let mut incident: HashMap<Point, Vec<(Point, OutputEdge)>> = problem
            .points()
            .iter()
            .map(|p| (*p, Vec::new()))
            .collect();
        for e in solution {
            if let Some(list) = incident.get_mut(&e.a()) {
                list.push((e.b(), *e));
            }
            if let Some(list) = incident.get_mut(&e.b()) {
                list.push((e.a(), *e));
            }
        }

        for (center, mut neighbors) in incident {
            if neighbors.len() < 2 {
                debug!("point {} has {} incident edges", center.id(), neighbors.len());
                err.add_point(center);
                for (_, e) in &neighbors {
                    err.add_edge(*e);
                }
                continue;
            }

            let north = Coordinate {
                x: center.x(),
                y: center.y() + 100.0,
            };
            let bearing = |other: &Point| angle_between(north, center.pos(), other.pos());
            neighbors.sort_by(|(a, _), (b, _)| {
                bearing(a).partial_cmp(&bearing(b)).expect("finite angles")
            });

            for ((a, e1), (b, e2)) in neighbors.iter().tuple_windows() {
                if a == b {
                    err.add_point(center);
                    err.add_edge(*e1);
                    err.add_edge(*e2);
                }
            }

            // At most one gap can exceed π (they sum to 2π); find it.
            let n = neighbors.len();
            let mut reflex = None;
            for i in 0..n {
                let b1 = bearing(&neighbors[i].0);
                let b2 = bearing(&neighbors[(i + 1) % n].0);
                let gap = if i + 1 == n {
                    2.0 * PI - (b1 - b2)
                } else {
                    b2 - b1
                };
                if gap > PI {
                    reflex = Some((i, b1, gap));
                }
            }

            if let Some((i, from, gap)) = reflex {
                // A hull point owns the gap facing the unbounded face.
                let outward_ok = boundary.contains(&center) && {
                    let away = Coordinate {
                        x: 2.0 * center.x() - centroid.x,
                        y: 2.0 * center.y() - centroid.y,
                    };
                    let outward = angle_between(north, center.pos(), away);
                    let offset = (outward - from).rem_euclid(2.0 * PI);
                    offset <= gap
                };
                if !outward_ok {
                    debug!(
                        "point {} has a reflex gap of {:.3} rad",
                        center.id(),
                        gap
                    );
                    err.add_point(center);
                    err.add_edge(neighbors[i].1);
                    err.add_edge(neighbors[(i + 1) % n].1);
                }
            }
        }
        err
    }
}

/// Quadratic pairwise edge crossing test; edges sharing an end point
/// are allowed to touch there.
#[derive(Debug, Default)]
pub struct EdgeIntersectionChecker;

impl Checker for EdgeIntersectionChecker {
    fn check(&self, _problem: &Problem, solution: &HashSet<OutputEdge>) -> CheckerError {
        let mut err = CheckerError::default();
        for (e1, e2) in solution.iter().tuple_combinations() {
            if e1.common_point(e2).is_some() {
                continue;
            }
            let g1 = Edge::from_points(&e1.a(), &e1.b());
            let g2 = Edge::from_points(&e2.a(), &e2.b());
            if g1.intersects(&g2) {
                debug!(
                    "edges ({},{}) and ({},{}) cross",
                    e1.a().id(),
                    e1.b().id(),
                    e2.a().id(),
                    e2.b().id()
                );
                err.add_edge(*e1);
                err.add_edge(*e2);
            }
        }
        err
    }
}

/// Runs several checkers, merging their reports.
pub struct MultiChecker {
    checkers: Vec<Box<dyn Checker>>,
}

impl MultiChecker {
    pub fn new(checkers: Vec<Box<dyn Checker>>) -> Self {
        MultiChecker { checkers }
    }
}

impl Checker for MultiChecker {
    fn check(&self, problem: &Problem, solution: &HashSet<OutputEdge>) -> CheckerError {
        let mut err = CheckerError::default();
        for checker in &self.checkers {
            err.merge(checker.check(problem, solution));
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: i64, x: f64, y: f64) -> Point {
        Point::new(id, x, y)
    }

    fn triangle() -> (Problem, HashSet<OutputEdge>) {
        let a = p(0, 0.0, 0.0);
        let b = p(1, 2.0, 0.5);
        let c = p(2, 1.0, 2.0);
        let problem = Problem::new("triangle", vec![a, b, c]);
        let solution = [
            OutputEdge::new(a, b),
            OutputEdge::new(b, c),
            OutputEdge::new(c, a),
        ]
        .iter()
        .copied()
        .collect();
        (problem, solution)
    }

    #[test]
    fn test_triangle_is_valid() {
        let (problem, solution) = triangle();
        let checker = MultiChecker::new(vec![
            Box::new(ConvexChecker::default()),
            Box::new(EdgeIntersectionChecker::default()),
        ]);
        let err = checker.check(&problem, &solution);
        assert!(!err.has_errors(), "{}", err);
    }

    #[test]
    fn test_missing_edge_breaks_degree() {
        let (problem, mut solution) = triangle();
        let victim = *solution.iter().next().unwrap();
        solution.remove(&victim);
        let err = ConvexChecker::default().check(&problem, &solution);
        assert!(err.has_errors());
        // Both end points of the removed edge are left with a single
        // incident edge.
        assert_eq!(err.points().len(), 2);
    }

    #[test]
    fn test_crossing_edges_detected() {
        let a = p(0, 0.0, 0.0);
        let b = p(1, 2.0, 2.0);
        let c = p(2, 0.0, 2.0);
        let d = p(3, 2.0, 0.0);
        let problem = Problem::new("cross", vec![a, b, c, d]);
        let solution: HashSet<OutputEdge> =
            [OutputEdge::new(a, b), OutputEdge::new(c, d)].iter().copied().collect();
        let err = EdgeIntersectionChecker::default().check(&problem, &solution);
        assert!(err.has_errors());
        assert_eq!(err.edges().len(), 2);
    }

    #[test]
    fn test_interior_reflex_vertex_detected() {
        // An interior point connected to only two boundary vertices
        // has a reflex gap that faces into a bounded face.
        let a = p(0, 0.0, 0.0);
        let b = p(1, 4.0, 0.0);
        let c = p(2, 2.0, 3.0);
        let inner = p(3, 2.0, 1.0);
        let problem = Problem::new("dart", vec![a, b, c, inner]);
        let solution: HashSet<OutputEdge> = [
            OutputEdge::new(a, b),
            OutputEdge::new(b, c),
            OutputEdge::new(c, a),
            OutputEdge::new(a, inner),
            OutputEdge::new(b, inner),
        ]
        .iter()
        .copied()
        .collect();
        let err = ConvexChecker::default().check(&problem, &solution);
        assert!(err.has_errors());
        assert!(err.points().contains(&inner));
        // The triangle corners only own their outward gaps.
        assert_eq!(err.points().len(), 1);
    }

    #[test]
    fn test_interior_point_fully_connected_is_valid() {
        let a = p(0, 0.0, 0.0);
        let b = p(1, 4.0, 0.0);
        let c = p(2, 2.0, 3.0);
        let inner = p(3, 2.0, 1.0);
        let problem = Problem::new("fan", vec![a, b, c, inner]);
        let solution: HashSet<OutputEdge> = [
            OutputEdge::new(a, b),
            OutputEdge::new(b, c),
            OutputEdge::new(c, a),
            OutputEdge::new(a, inner),
            OutputEdge::new(b, inner),
            OutputEdge::new(c, inner),
        ]
        .iter()
        .copied()
        .collect();
        let err = ConvexChecker::default().check(&problem, &solution);
        assert!(!err.has_errors(), "{}", err);
    }
}

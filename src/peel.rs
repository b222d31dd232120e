//! The peeling solver.
//!
//! Maintains an outer hull, an inner hull and a range-searchable set
//! of remaining points. Each round probes the outer hull with an
//! extended inner-hull edge, removes the cap of outer vertices cut off
//! by it, promotes inner-hull vertices along the cut into the outer
//! hull while convexity allows, and then re-absorbs remaining points
//! that the shrunken inner hull no longer covers. Every edge laid down
//! on the way is part of the final convex partition.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Error;
use crate::geometry::{Coordinate, Edge, Point};
use crate::hull::{ConvexHull, NodeRef, Orientation};
use crate::problem::{OutputEdge, Problem};
use crate::range::{PrioritySearch, RangeSearch2d};
use crate::visual::{NullVisual, Visual};

/// The rectangle to re-absorb remaining points from after a peel
/// round, grown by every vertex the round touched. Two adjacent sides
/// are unbounded, facing the region the inner hull retreated from.
struct SearchBox {
    unbounded_left: bool,
    unbounded_bottom: bool,
    range: Option<(f64, f64, f64, f64)>,
}

impl SearchBox {
    fn new(unbounded_left: bool, unbounded_bottom: bool) -> Self {
        SearchBox {
            unbounded_left,
            unbounded_bottom,
            range: None,
        }
    }

    fn apply(&mut self, c: Coordinate<f64>) {
        self.range = Some(match self.range {
            None => (c.x, c.x, c.y, c.y),
            Some((min_x, max_x, min_y, max_y)) => (
                min_x.min(c.x),
                max_x.max(c.x),
                min_y.min(c.y),
                max_y.max(c.y),
            ),
        });
    }
}

/// Convex partition solver with a pluggable range-search backend.
pub struct Peeler<S: RangeSearch2d = PrioritySearch> {
    rng: StdRng,
    _search: PhantomData<S>,
}

impl Peeler {
    pub fn new() -> Peeler {
        Self::from_rng(StdRng::from_entropy())
    }

    /// A solver with a deterministic probe-edge sequence and the
    /// default range-search backend.
    pub fn with_seed(seed: u64) -> Peeler {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for Peeler {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RangeSearch2d> Peeler<S> {
    /// A deterministic solver over an explicitly chosen backend.
    pub fn with_backend(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Peeler {
            rng,
            _search: PhantomData,
        }
    }

    pub fn solve(&mut self, problem: &Problem) -> Result<HashSet<OutputEdge>, Error> {
        self.solve_with(problem, &mut NullVisual)
    }

    /// Solves `problem`, invoking `vis` at the algorithm checkpoints.
    pub fn solve_with(
        &mut self,
        problem: &Problem,
        vis: &mut dyn Visual,
    ) -> Result<HashSet<OutputEdge>, Error> {
        info!(
            "solving {} with {} points",
            problem.name(),
            problem.points().len()
        );
        let mut sol: HashSet<OutputEdge> = HashSet::new();

        let mut remaining: HashSet<Point> = problem.points().iter().copied().collect();
        let mut outer = ConvexHull::build(remaining.iter().copied());
        for p in outer.iter_points() {
            remaining.remove(&p);
        }
        let mut inner = ConvexHull::build(remaining.iter().copied());
        for p in inner.iter_points() {
            remaining.remove(&p);
        }
        let mut search = S::build(remaining.into_iter().collect());
        // Points the repair phase pushed back off the inner hull in an
        // earlier round; they rejoin the candidates every round so
        // none of them is ever dropped from the partition.
        let mut displaced: Vec<Point> = Vec::new();

        vis.clear();
        vis.set_data(problem.points());

        add_hull_to_sol(&outer, &mut sol);
        vis.redraw();

        while !inner.is_empty() {
            debug!(
                "peel round: outer={}, inner={}, remaining={}, displaced={}",
                outer.len(),
                inner.len(),
                search.len(),
                displaced.len()
            );
            if inner.len() == 1 {
                if !displaced.is_empty() {
                    // Fold the strays back in before finishing up.
                    for p in std::mem::take(&mut displaced) {
                        for q in inner.add_and_update(p) {
                            displaced.push(q);
                        }
                    }
                    continue;
                }
                let iv = inner.get(0).expect("inner hull holds one point");
                sol.extend(outer.inner_point_connections(&iv)?);
                vis.redraw();
                break;
            }

            // Probe with an arbitrary inner-hull edge, extended to a
            // line.
            let probe = inner.edge_at(self.rng.gen_range(0..inner.len()))?;
            let e = inner.probe_edge_geometry(&probe);
            let has_left = {
                // Any off-line vertex of the inner hull tells on which
                // side its bulk lies.
                let mut ori = 0.0;
                for q in inner.iter_points() {
                    ori = e.rel_orientation(q.pos());
                    if ori != 0.0 {
                        break;
                    }
                }
                ori < 0.0
            };

            let ni = outer.points_near_line(&e, has_left)?;
            let orientation = ni.orientation();
            let outer1_p = outer.point(ni.outer1());
            let inner1_p = outer.point(ni.inner1());
            let inner2_p = outer.point(ni.inner2());
            let outer2_p = outer.point(ni.outer2());
            debug!(
                "near intersection {:?}: outer {}/{}, inner {}/{}",
                orientation,
                outer1_p.id(),
                outer2_p.id(),
                inner1_p.id(),
                inner2_p.id()
            );
            vis.add_data(&[outer1_p, inner1_p, inner2_p, outer2_p]);
            vis.redraw();

            let rel_edge = outer.bottom_top_edge();
            let (first, second) = inner.probe_anchor(&probe, orientation, &rel_edge);
            let first_p = inner.point(first);
            let second_p = inner.point(second);
            let chord = OutputEdge::new(first_p, second_p);
            sol.insert(chord);
            vis.add_edge(&chord);
            vis.redraw();

            // Search box for the repair phase: unbounded towards the
            // side the peel eats into.
            let mut sbox = {
                let bt = inner.bottom_top_edge();
                let unbounded_left = bt.rel_orientation(first_p.pos()) <= 0.0;
                let we = Edge::new(
                    inner.min_x().expect("inner hull is non-empty").pos(),
                    inner.max_x().expect("inner hull is non-empty").pos(),
                );
                let unbounded_bottom = we.rel_orientation(first_p.pos()) >= 0.0;
                SearchBox::new(unbounded_left, unbounded_bottom)
            };
            sbox.apply(first_p.pos());
            sbox.apply(second_p.pos());

            outer.remove_middle_nodes(&ni)?;
            vis.redraw();

            let dir = matches!(orientation, Orientation::Bottom | Orientation::Left);
            fix_outer_hull(
                &mut inner, &mut outer, &mut sol, first, outer1_p, inner1_p, dir, &mut sbox, vis,
            )?;
            fix_outer_hull(
                &mut inner, &mut outer, &mut sol, second, outer2_p, inner2_p, !dir, &mut sbox,
                vis,
            )?;

            if !search.is_empty() || !displaced.is_empty() {
                fix_inner_hull(&mut inner, &mut search, &sbox, &mut displaced, vis);
            }
            vis.redraw();
        }

        info!("solved {}: {} edges", problem.name(), sol.len());
        vis.set_edges(&sol.iter().copied().collect::<Vec<_>>());
        vis.redraw();
        Ok(sol)
    }
}

/// Adds the boundary edges of `hull` to the solution.
fn add_hull_to_sol(hull: &ConvexHull, sol: &mut HashSet<OutputEdge>) {
    let mut first: Option<Point> = None;
    let mut prev: Option<Point> = None;
    for p in hull.iter_points() {
        if let Some(q) = prev {
            sol.insert(OutputEdge::new(q, p));
        } else {
            first = Some(p);
        }
        prev = Some(p);
    }
    if let (Some(f), Some(q)) = (first, prev) {
        if f != q {
            sol.insert(OutputEdge::new(q, f));
        }
    }
}

/// Promotes inner-hull vertices into the outer hull along one side of
/// the cut, starting from the probe anchor paired with the crossing
/// bracketed by `outer_p`/`inner_p`.
///
/// Every promoted vertex is chained to its predecessor and connected
/// to `inner_p`; the last one is connected to `outer_p`. The walk
/// stops when the next vertex would break convexity against the line
/// to `outer_p`, or when the inner hull runs out.
#[allow(clippy::too_many_arguments)]
fn fix_outer_hull(
    inner: &mut ConvexHull,
    outer: &mut ConvexHull,
    sol: &mut HashSet<OutputEdge>,
    begin: NodeRef,
    outer_p: Point,
    inner_p: Point,
    clockwise: bool,
    sbox: &mut SearchBox,
    vis: &mut dyn Visual,
) -> Result<(), Error> {
    if inner.is_empty() {
        return Ok(());
    }
    let mut cur = begin;
    let mut prev_p: Option<Point> = None;
    loop {
        let cur_p = inner.point(cur);
        if let Some(q) = prev_p {
            sol.insert(OutputEdge::new(q, cur_p));
        }
        let next = if clockwise {
            inner.clockwise(cur)?
        } else {
            inner.counter_clockwise(cur)?
        };
        let exhausted = next == cur;
        let next_p = inner.point(next);
        let e = if clockwise {
            Edge::new(cur_p.pos(), outer_p.pos())
        } else {
            Edge::new(outer_p.pos(), cur_p.pos())
        };

        inner.remove(&cur_p);
        outer.insert(cur_p);
        sol.insert(OutputEdge::new(cur_p, inner_p));
        sbox.apply(next_p.pos());
        vis.redraw();

        prev_p = Some(cur_p);
        if exhausted || e.rel_orientation(next_p.pos()) > 0.0 || inner.is_empty() {
            break;
        }
        cur = next;
    }
    sol.insert(OutputEdge::new(
        prev_p.expect("walk promoted at least one vertex"),
        outer_p,
    ));
    vis.redraw();
    Ok(())
}

/// Re-absorbs remaining points the shrunken inner hull no longer
/// covers. Points the hull keeps out (still strictly inside) stay in
/// the search structure; hull vertices from earlier rounds that an
/// absorption pushes back inside land in `displaced` and are retried
/// next round.
fn fix_inner_hull<S: RangeSearch2d>(
    inner: &mut ConvexHull,
    search: &mut S,
    sbox: &SearchBox,
    displaced: &mut Vec<Point>,
    vis: &mut dyn Visual,
) {
    let (min_x, max_x, min_y, max_y) = match sbox.range {
        Some(range) => range,
        None => return,
    };
    let mut candidates: Vec<(Point, bool)> = search
        .range(
            min_x,
            max_x,
            min_y,
            max_y,
            sbox.unbounded_left,
            sbox.unbounded_bottom,
        )
        .into_iter()
        .map(|p| (p, true))
        .collect();
    candidates.extend(displaced.drain(..).map(|p| (p, false)));
    debug!("inner repair considers {} candidates", candidates.len());

    let origin: HashMap<Point, bool> = candidates.iter().copied().collect();
    // Search-origin points currently absorbed into the hull.
    let mut to_remove: HashSet<Point> = HashSet::new();
    // Points in neither the hull nor the search structure.
    let mut outside: HashSet<Point> = HashSet::new();

    for (iv, from_search) in candidates {
        if from_search {
            to_remove.insert(iv);
        } else {
            outside.insert(iv);
        }
        let evicted = inner.add_and_update(iv);
        for p in &evicted {
            if *p == iv {
                // Still strictly inside; it stays remaining.
                if from_search {
                    to_remove.remove(p);
                }
            } else {
                match origin.get(p) {
                    Some(true) => {
                        to_remove.remove(p);
                    }
                    _ => {
                        outside.insert(*p);
                    }
                }
            }
        }
        if !evicted.iter().any(|p| p == &iv) {
            outside.remove(&iv);
        }
        if evicted.len() != 1 || evicted[0] != iv {
            vis.redraw();
        }
    }

    for p in &to_remove {
        search.remove(p);
    }
    displaced.extend(outside);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{Checker, ConvexChecker, EdgeIntersectionChecker, MultiChecker};
    use crate::range::RStarSearch;
    use rand::Rng;

    fn p(id: i64, x: f64, y: f64) -> Point {
        Point::new(id, x, y)
    }

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn checker() -> MultiChecker {
        MultiChecker::new(vec![
            Box::new(ConvexChecker::default()),
            Box::new(EdgeIntersectionChecker::default()),
        ])
    }

    fn degrees(solution: &HashSet<OutputEdge>) -> std::collections::HashMap<i64, usize> {
        let mut map = std::collections::HashMap::new();
        for e in solution {
            *map.entry(e.a().id()).or_insert(0) += 1;
            *map.entry(e.b().id()).or_insert(0) += 1;
        }
        map
    }

    #[test]
    fn test_unit_square() {
        init_log();
        let points = vec![
            p(0, 0.0, 0.0),
            p(1, 1.0, 0.0),
            p(2, 1.0, 1.0),
            p(3, 0.0, 1.0),
        ];
        let problem = Problem::new("square", points.clone());
        let sol = Peeler::with_seed(7).solve(&problem).unwrap();

        // The four boundary edges and nothing else.
        assert_eq!(sol.len(), 4);
        assert!(sol.contains(&OutputEdge::new(points[0], points[1])));
        assert!(sol.contains(&OutputEdge::new(points[1], points[2])));
        assert!(sol.contains(&OutputEdge::new(points[2], points[3])));
        assert!(sol.contains(&OutputEdge::new(points[3], points[0])));
    }

    #[test]
    fn test_nested_squares() {
        init_log();
        let points = vec![
            p(0, 2.0, 2.0),
            p(1, 2.0, -2.0),
            p(2, -2.0, -2.0),
            p(3, -2.0, 2.0),
            p(4, 1.0, 1.0),
            p(5, 1.0, -1.0),
            p(6, -1.0, -1.0),
            p(7, -1.0, 1.0),
        ];
        let problem = Problem::new("nested", points.clone());
        let sol = Peeler::with_seed(3).solve(&problem).unwrap();

        // The outer boundary survives into the solution.
        for (i, j) in [(0, 1), (1, 2), (2, 3), (3, 0)] {
            assert!(sol.contains(&OutputEdge::new(points[i], points[j])));
        }
        // Every point takes part in the partition.
        let deg = degrees(&sol);
        for pt in &points {
            assert!(deg[&pt.id()] >= 2, "point {} under-connected", pt.id());
        }
        let err = checker().check(&problem, &sol);
        assert!(!err.has_errors(), "{}", err);
    }

    #[test]
    fn test_single_interior_point() {
        init_log();
        let points = vec![
            p(0, 0.0, 0.0),
            p(1, 4.0, 0.2),
            p(2, 4.2, 4.0),
            p(3, -0.2, 3.8),
            p(4, 2.0, 1.9),
        ];
        let problem = Problem::new("interior", points.clone());
        let sol = Peeler::with_seed(1).solve(&problem).unwrap();

        // One clockwise scan connects the interior point to the few
        // vertices needed for convexity, never the full fan.
        let deg = degrees(&sol);
        assert!(deg[&4] >= 2 && deg[&4] < 4, "degree {}", deg[&4]);
        let err = checker().check(&problem, &sol);
        assert!(!err.has_errors(), "{}", err);
    }

    #[test]
    fn test_tiny_inputs() {
        init_log();
        for n in 0..3 {
            let points: Vec<Point> = (0..n)
                .map(|i| p(i, i as f64 * 1.5, (i * i) as f64 * 0.5 + 0.1))
                .collect();
            let problem = Problem::new("tiny", points);
            let sol = Peeler::with_seed(5).solve(&problem).unwrap();
            let expected = if n == 2 { 1 } else { 0 };
            assert_eq!(sol.len(), expected, "n = {}", n);
        }
    }

    #[test]
    fn test_random_instances_are_valid() {
        init_log();
        let mut rng = rand::rngs::StdRng::seed_from_u64(99);
        for round in 0..6 {
            let n = 20 + round * 15;
            let points: Vec<Point> = (0..n)
                .map(|i| {
                    p(
                        i as i64,
                        rng.gen_range(0.0..1000.0),
                        rng.gen_range(0.0..1000.0),
                    )
                })
                .collect();
            let problem = Problem::new(format!("random-{}", round), points);
            let sol = Peeler::with_seed(round as u64).solve(&problem).unwrap();
            let err = checker().check(&problem, &sol);
            assert!(!err.has_errors(), "round {}: {}", round, err);
        }
    }

    #[test]
    fn test_rstar_backend_matches() {
        init_log();
        let mut rng = rand::rngs::StdRng::seed_from_u64(4);
        let points: Vec<Point> = (0..60)
            .map(|i| {
                p(
                    i as i64,
                    rng.gen_range(0.0..100.0),
                    rng.gen_range(0.0..100.0),
                )
            })
            .collect();
        let problem = Problem::new("backend", points);

        let sol_a = Peeler::<PrioritySearch>::with_backend(11)
            .solve(&problem)
            .unwrap();
        let sol_b = Peeler::<RStarSearch>::with_backend(11)
            .solve(&problem)
            .unwrap();
        assert_eq!(sol_a, sol_b);

        let err = checker().check(&problem, &sol_a);
        assert!(!err.has_errors(), "{}", err);
    }
}

use crate::geometry::Point;
use crate::problem::OutputEdge;

/// Rendering hooks called by the solver at its checkpoints.
///
/// Rendering itself is out of scope for this crate; the solver only
/// guarantees to invoke these hooks, and [`NullVisual`] is always a
/// valid substitute with no effect on the algorithm.
pub trait Visual {
    fn set_data(&mut self, points: &[Point]);
    fn add_data(&mut self, points: &[Point]);
    fn set_edges(&mut self, edges: &[OutputEdge]);
    fn add_edge(&mut self, edge: &OutputEdge);
    fn redraw(&mut self);
    fn clear(&mut self);
}

/// The no-op implementation.
#[derive(Debug, Default)]
pub struct NullVisual;

impl Visual for NullVisual {
    fn set_data(&mut self, _points: &[Point]) {}
    fn add_data(&mut self, _points: &[Point]) {}
    fn set_edges(&mut self, _edges: &[OutputEdge]) {}
    fn add_edge(&mut self, _edge: &OutputEdge) {}
    fn redraw(&mut self) {}
    fn clear(&mut self) {}
}

//! Convex partitions of planar point sets by hull peeling.
//!
//! 1. [Peeling](#peeling)
//! 1. [Building blocks](#building-blocks)
//!
//! # Peeling
//!
//! A convex partition connects the points of a problem instance with
//! non-crossing straight edges such that every bounded face of the
//! resulting subdivision is a convex polygon. [`Peeler`] computes one
//! heuristically: it keeps a convex hull of the processed outside and
//! a hull of the unprocessed inside, and repeatedly cuts the inner
//! hull open along one of its edges, promoting vertices to the
//! outside and recording the partition edges on the way.
//!
//! ## Usage
//!
//! ```rust
//! use convex_layers::{Peeler, Point, Problem};
//!
//! let problem = Problem::new(
//!     "square",
//!     vec![
//!         Point::new(0, 0., 0.),
//!         Point::new(1, 1., 0.),
//!         Point::new(2, 1., 1.),
//!         Point::new(3, 0., 1.),
//!     ],
//! );
//! let solution = Peeler::with_seed(0).solve(&problem).unwrap();
//! // The unit square needs exactly its boundary.
//! assert_eq!(solution.len(), 4);
//! ```
//!
//! Problem and solution files use the JSON formats of [`io`].
//!
//! # Building blocks
//!
//! The solver is built on two independently usable structures: a
//! dynamic [`ConvexHull`] over two chain trees with logarithmic
//! updates and near-intersection line queries, and the static
//! [`PriorityTree`] answering three-sided range reports over the
//! not-yet-absorbed points. Both are exposed, as are the [`checker`]
//! collaborators that validate a finished partition.
//!
//! The input must be in general position: no three collinear points.
//! Violations surface as [`Error::DegenerateGeometry`], never as a
//! silently wrong partition.

pub mod checker;
mod error;
pub mod geometry;
pub mod hull;
pub mod io;
pub mod linked_tree;
pub mod peel;
pub mod problem;
pub mod range;
pub mod visual;

pub use error::Error;
pub use geometry::{Edge, Point};
pub use hull::ConvexHull;
pub use io::{read_problem, write_solution};
pub use peel::Peeler;
pub use problem::{OutputEdge, Problem};
pub use range::{PrioritySearch, PriorityTree, RStarSearch, RangeSearch2d};
pub use visual::{NullVisual, Visual};

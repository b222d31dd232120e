use std::fmt;
use std::path::PathBuf;

/// Errors surfaced by the solver and its data structures.
///
/// Geometry and invariant errors indicate a precondition violation
/// (input not in general position) and abort the current solve; they
/// are not recoverable locally and must never be downgraded to a
/// partial solution.
#[derive(Debug)]
pub enum Error {
    /// A collinear triple, or a query line passing exactly through a
    /// hull vertex.
    DegenerateGeometry(String),
    /// An internal consistency check failed, e.g. a line crossing the
    /// hull boundary more or fewer than twice.
    InvariantViolation(String),
    /// A traversal was invoked with a node that does not belong to the
    /// hull instance.
    NotMember,
    /// The input file is missing or has missing/invalid fields.
    MalformedInput { path: PathBuf, detail: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DegenerateGeometry(detail) => {
                write!(f, "degenerate geometry: {}", detail)
            }
            Error::InvariantViolation(detail) => {
                write!(f, "invariant violation: {}", detail)
            }
            Error::NotMember => write!(f, "node is not part of this hull"),
            Error::MalformedInput { path, detail } => {
                write!(f, "malformed input {}: {}", path.display(), detail)
            }
        }
    }
}

impl std::error::Error for Error {}

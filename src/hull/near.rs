use super::NodeRef;

/// Which side of the hull the removed cap of a near-intersection lies
/// on.
///
/// `Bottom`/`Top`: the probing line crosses both chains and the cap
/// contains the bottom resp. top vertex. `Left`/`Right`: the cap is
/// centered on that chain; this includes the wrap-around case where
/// the line crosses a single chain twice but the hull being probed
/// hugs that chain, so the cap spans the rest of the boundary.
///
/// The tag alone fixes every traversal direction downstream: the cap
/// is walked clockwise iff the tag is `Top` or `Right`, and the first
/// promotion walk of the peeling loop is clockwise iff the tag is
/// `Bottom` or `Left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Left,
    Right,
    Top,
    Bottom,
}

impl Orientation {
    /// Direction of the cap walk from `inner1` to `inner2`.
    #[inline]
    pub(crate) fn cap_clockwise(&self) -> bool {
        matches!(self, Orientation::Top | Orientation::Right)
    }
}

/// The four hull vertices bracketing the two crossings of an extended
/// line with the hull boundary.
///
/// `outer1`/`inner1` bracket one crossing and `inner2`/`outer2` the
/// other; walking from `inner1` in the cap direction of [`Orientation`]
/// reaches `inner2` through exactly the vertices cut off by the line,
/// while `outer1` and `outer2` survive on the remaining boundary.
///
/// The handles are live at creation; resolving their points must
/// happen before the hull is mutated.
#[derive(Debug, Clone, Copy)]
pub struct NearIntersection {
    pub(crate) outer1: NodeRef,
    pub(crate) inner1: NodeRef,
    pub(crate) inner2: NodeRef,
    pub(crate) outer2: NodeRef,
    pub(crate) ori: Orientation,
}

impl NearIntersection {
    #[inline]
    pub fn outer1(&self) -> NodeRef {
        self.outer1
    }

    #[inline]
    pub fn inner1(&self) -> NodeRef {
        self.inner1
    }

    #[inline]
    pub fn inner2(&self) -> NodeRef {
        self.inner2
    }

    #[inline]
    pub fn outer2(&self) -> NodeRef {
        self.outer2
    }

    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.ori
    }
}

/// A boundary edge of a hull, kept as the two node handles.
#[derive(Debug, Clone, Copy)]
pub struct ProbeEdge {
    pub(crate) a: NodeRef,
    pub(crate) b: NodeRef,
}

impl ProbeEdge {
    #[inline]
    pub fn a(&self) -> NodeRef {
        self.a
    }

    #[inline]
    pub fn b(&self) -> NodeRef {
        self.b
    }
}

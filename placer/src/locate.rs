// locate.rs — Insertion-point search for loop-nest structured programs
//
// Given an existing operation and the loop nest a new operation must live in,
// walks program order from that operation until it reaches the first boundary
// where the new operation can be inserted without splitting a loop body and
// without jumping over a data dependency.
//
// Preconditions: `program` satisfies the `verify` obligations (topological
//                order, contiguous loops, consistent nests).
// Postconditions: a returned point keeps those obligations when an operation
//                 nested in exactly `target_nest[..depth]`, reading only the
//                 request's operands and read only by the request's users,
//                 is inserted there.
// Failure modes: `PlacementError`; never recovered internally.
// Side effects: none (the program is only inspected).

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::builder::OpBuilder;
use crate::ast::Span;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::id::{LoopId, OpId};
use crate::ir::{NestDisplay, Program};
use crate::loops::{boundary_admits, is_prefix};

// ── Public types ────────────────────────────────────────────────────────────

/// Side of the anchor an operation is inserted on. Also the search direction:
/// `Before` walks toward the start of the program, `After` toward its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Before,
    After,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Before => Direction::After,
            Direction::After => Direction::Before,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Before => write!(f, "before"),
            Direction::After => write!(f, "after"),
        }
    }
}

/// Where to insert an operation: immediately `direction` of `anchor`, nested
/// in `loop_nest`. Valid until the next structural change to the program; a
/// stale anchor is rejected when the point is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPoint {
    pub anchor: OpId,
    pub direction: Direction,
    pub loop_nest: Vec<LoopId>,
}

impl InsertionPoint {
    /// Point `builder` at this location.
    pub fn set(&self, builder: &mut OpBuilder) {
        builder.set_insertion_point(self.anchor, self.direction, self.loop_nest.clone());
    }

    pub fn display<'a>(&'a self, program: &'a Program) -> PointDisplay<'a> {
        PointDisplay {
            point: self,
            program,
        }
    }
}

/// Renders a point as `after %b in [i]`.
pub struct PointDisplay<'a> {
    point: &'a InsertionPoint,
    program: &'a Program,
}

impl fmt::Display for PointDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let anchor = self.program.result_name(self.point.anchor).unwrap_or("?");
        write!(f, "{} %{}", self.point.direction, anchor)?;
        if !self.point.loop_nest.is_empty() {
            write!(f, " in {}", NestDisplay(self.program, &self.point.loop_nest))?;
        }
        Ok(())
    }
}

/// A placement query with explicit dependencies for the operation to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementRequest {
    pub start: OpId,
    /// Candidate nest; only the first `depth` loops constrain the search.
    pub target_nest: Vec<LoopId>,
    pub depth: usize,
    pub direction: Direction,
    /// Producers the new operation reads; they must end up before it.
    pub operands: Vec<OpId>,
    /// Existing operations that will read the new one; they must end up after it.
    pub users: Vec<OpId>,
}

impl PlacementRequest {
    /// A request with no dependencies.
    pub fn new(start: OpId, target_nest: &[LoopId], depth: usize, direction: Direction) -> Self {
        Self {
            start,
            target_nest: target_nest.to_vec(),
            depth,
            direction,
            operands: Vec::new(),
            users: Vec::new(),
        }
    }

    /// A request whose dependencies are tied to `start`. Placed before
    /// `start`, the new operation feeds it and may read any of its producers;
    /// placed after, it reads `start` and feeds `start`'s users.
    pub fn anchored(
        program: &Program,
        start: OpId,
        target_nest: &[LoopId],
        depth: usize,
        direction: Direction,
    ) -> Self {
        let request = Self::new(start, target_nest, depth, direction);
        match direction {
            Direction::Before => request
                .with_operands(program.producers(start))
                .with_users([start]),
            Direction::After => request
                .with_operands([start])
                .with_users(program.users(start).iter().copied()),
        }
    }

    pub fn with_operands(mut self, ops: impl IntoIterator<Item = OpId>) -> Self {
        self.operands.extend(ops);
        self
    }

    pub fn with_users(mut self, ops: impl IntoIterator<Item = OpId>) -> Self {
        self.users.extend(ops);
        self
    }

    /// The loops the new operation will be nested in.
    pub fn required_nest(&self) -> &[LoopId] {
        &self.target_nest[..self.depth.min(self.target_nest.len())]
    }
}

/// Failure to find a legal insertion point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("depth {depth} exceeds the {available} loop(s) of the target nest")]
    DepthOutOfRange { depth: usize, available: usize },
    #[error("operation {0} is not live in this program")]
    StaleOperation(OpId),
    #[error("placing relative to {start} would cross dependency {blocker}")]
    DependencyViolated { start: OpId, blocker: OpId },
    #[error("search from {start} left the required loop nest at {exit}")]
    LeftLoopNest { start: OpId, exit: OpId },
    #[error("no legal position {direction} {start}")]
    NoPosition { start: OpId, direction: Direction },
}

impl PlacementError {
    pub fn code(&self) -> DiagCode {
        match self {
            PlacementError::DepthOutOfRange { .. } => codes::E0300,
            PlacementError::StaleOperation(_) => codes::E0301,
            PlacementError::DependencyViolated { .. } => codes::E0302,
            PlacementError::LeftLoopNest { .. } => codes::E0303,
            PlacementError::NoPosition { .. } => codes::E0304,
        }
    }

    /// Message naming operations by their result values.
    pub fn describe(&self, program: &Program) -> String {
        let name = |id: &OpId| {
            program
                .result_name(*id)
                .map(|n| format!("%{n}"))
                .unwrap_or_else(|| id.to_string())
        };
        match self {
            PlacementError::DepthOutOfRange { .. } | PlacementError::StaleOperation(_) => {
                self.to_string()
            }
            PlacementError::DependencyViolated { start, blocker } => format!(
                "cannot place relative to {} without crossing {}, which must stay on the other side",
                name(start),
                name(blocker)
            ),
            PlacementError::LeftLoopNest { start, exit } => format!(
                "search from {} reached {} outside the required loop nest before dependencies were met",
                name(start),
                name(exit)
            ),
            PlacementError::NoPosition { start, direction } => format!(
                "no position {} {} is nested in the required loops",
                direction,
                name(start)
            ),
        }
    }

    /// Report this failure at `span`, usually the span of the start operation.
    pub fn to_diagnostic(&self, program: &Program, span: Span) -> Diagnostic {
        let diag = Diagnostic::error(span, self.describe(program)).with_code(self.code());
        match self {
            PlacementError::DependencyViolated { .. } => {
                diag.with_hint("try the other direction or a shallower depth")
            }
            PlacementError::LeftLoopNest { .. } | PlacementError::NoPosition { .. } => {
                diag.with_hint("the requested loops must enclose a point reachable from the start")
            }
            _ => diag,
        }
    }
}

// ── Public entry points ─────────────────────────────────────────────────────

/// Find the first point, walking from `start` in `direction`, where an
/// operation nested in exactly `target_nest[..depth]` can be inserted.
/// Dependencies of the new operation are tied to `start` as described on
/// [`PlacementRequest::anchored`].
pub fn find_insertion_point(
    program: &Program,
    start: OpId,
    target_nest: &[LoopId],
    depth: usize,
    direction: Direction,
) -> Result<InsertionPoint, PlacementError> {
    if !program.contains(start) {
        return Err(PlacementError::StaleOperation(start));
    }
    let request = PlacementRequest::anchored(program, start, target_nest, depth, direction);
    find_insertion_point_with(program, &request)
}

/// General form of [`find_insertion_point`] with explicit dependencies.
pub fn find_insertion_point_with(
    program: &Program,
    request: &PlacementRequest,
) -> Result<InsertionPoint, PlacementError> {
    let start = request.start;
    let direction = request.direction;
    if request.depth > request.target_nest.len() {
        return Err(PlacementError::DepthOutOfRange {
            depth: request.depth,
            available: request.target_nest.len(),
        });
    }
    let start_pos = program
        .position(start)
        .ok_or(PlacementError::StaleOperation(start))?;
    let target = request.required_nest();
    let mut sweep = DependencySweep::new(program, request, start_pos)?;

    let order = program.order();
    let nest_at = |pos: usize| program.loop_nest(order[pos]).unwrap_or(&[]);

    log::debug!(
        "locate: {} {} at depth {} ({} pending)",
        direction,
        start,
        request.depth,
        sweep.pending.len()
    );

    let mut anchor_pos = start_pos;
    let mut entered = false;
    loop {
        let anchor = order[anchor_pos];
        let anchor_nest = nest_at(anchor_pos);

        if is_prefix(target, anchor_nest) {
            entered = true;
        } else if entered {
            // Loop bodies are contiguous: once the walk leaves the target
            // nest it can never re-enter it.
            return Err(PlacementError::LeftLoopNest { start, exit: anchor });
        }

        let boundary = match direction {
            Direction::Before => anchor_pos,
            Direction::After => anchor_pos + 1,
        };
        let prev = boundary.checked_sub(1).map(nest_at);
        let next = (boundary < order.len()).then(|| nest_at(boundary));
        let nested = boundary_admits(prev, next, anchor_nest, target);

        log::trace!(
            "locate: {} {} nested={} pending={}",
            direction,
            anchor,
            nested,
            sweep.pending.len()
        );

        if nested && sweep.satisfied() {
            log::debug!(
                "locate: placed {} {} after {} step(s)",
                direction,
                anchor,
                anchor_pos.abs_diff(start_pos)
            );
            return Ok(InsertionPoint {
                anchor,
                direction,
                loop_nest: target.to_vec(),
            });
        }

        let crossed_pos = match direction {
            Direction::Before => anchor_pos.checked_sub(1),
            Direction::After => Some(anchor_pos + 1).filter(|&p| p < order.len()),
        };
        let Some(crossed_pos) = crossed_pos else {
            return Err(PlacementError::NoPosition { start, direction });
        };
        sweep.cross(order[crossed_pos])?;
        anchor_pos = crossed_pos;
    }
}

// ── Dependency sweep ────────────────────────────────────────────────────────

/// Dependency state of the walk, updated once per crossed operation.
struct DependencySweep {
    start: OpId,
    /// Operations the walk may not cross.
    barriers: HashSet<OpId>,
    /// Operations that must still be crossed before a boundary is safe.
    pending: HashSet<OpId>,
}

impl DependencySweep {
    fn new(
        program: &Program,
        request: &PlacementRequest,
        start_pos: usize,
    ) -> Result<Self, PlacementError> {
        let start = request.start;
        // Walking `After`, users block and operands ahead are pending; walking
        // `Before` the roles swap.
        let (blocking, awaited) = match request.direction {
            Direction::After => (&request.users, &request.operands),
            Direction::Before => (&request.operands, &request.users),
        };
        // An operation is on the near side if the initial boundary does not
        // separate it from the direction of travel.
        let ahead = |pos: usize| match request.direction {
            Direction::After => pos > start_pos,
            Direction::Before => pos < start_pos,
        };

        let mut barriers = HashSet::new();
        for &op in blocking {
            let pos = program
                .position(op)
                .ok_or(PlacementError::StaleOperation(op))?;
            if !ahead(pos) {
                return Err(PlacementError::DependencyViolated { start, blocker: op });
            }
            barriers.insert(op);
        }

        let mut pending = HashSet::new();
        for &op in awaited {
            let pos = program
                .position(op)
                .ok_or(PlacementError::StaleOperation(op))?;
            if ahead(pos) {
                pending.insert(op);
            }
        }

        Ok(Self {
            start,
            barriers,
            pending,
        })
    }

    fn cross(&mut self, op: OpId) -> Result<(), PlacementError> {
        if self.barriers.contains(&op) {
            return Err(PlacementError::DependencyViolated {
                start: self.start,
                blocker: op,
            });
        }
        self.pending.remove(&op);
        Ok(())
    }

    fn satisfied(&self) -> bool {
        self.pending.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

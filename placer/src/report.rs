// report.rs — Serializable summary of a placement
//
// Names operations by their result values and loops by their source names
// so the report is stable across runs and readable without the arena.

use serde::Serialize;

use crate::id::OpId;
use crate::ir::Program;
use crate::locate::{Direction, InsertionPoint};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointReport {
    pub start: String,
    pub anchor: String,
    pub direction: Direction,
    pub loop_nest: Vec<String>,
    /// Number of operations between `start` and `anchor` in program order.
    pub distance: usize,
}

impl PointReport {
    pub fn new(program: &Program, start: OpId, point: &InsertionPoint) -> Self {
        let name = |id: OpId| {
            program
                .result_name(id)
                .map(|n| format!("%{n}"))
                .unwrap_or_else(|| id.to_string())
        };
        let distance = match (program.position(start), program.position(point.anchor)) {
            (Some(s), Some(a)) => s.abs_diff(a),
            _ => 0,
        };
        Self {
            start: name(start),
            anchor: name(point.anchor),
            direction: point.direction,
            loop_nest: point.loop_nest.iter().map(|&l| program.loop_name(l)).collect(),
            distance,
        }
    }
}

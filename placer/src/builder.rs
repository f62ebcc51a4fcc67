// builder.rs — Cursor for creating operations at an insertion point
//
// An `OpBuilder` remembers where the next operation goes: immediately before
// or after an anchor, nested in a given loop nest. Inserting after the anchor
// moves the cursor onto the new operation; inserting before leaves it in
// place. Either way a run of `create` calls keeps program order.
//
// Preconditions: the cursor anchor is live in the program passed to `create`.
// Postconditions: the created operation carries the cursor's loop nest.
// Failure modes: `IrError::NoInsertionPoint` without a cursor,
//                `IrError::StaleOperation` when the anchor was erased.
// Side effects: mutates the program through `Program::insert`.

use crate::id::{LoopId, OpId};
use crate::ir::{IrError, OpSpec, Program};
use crate::locate::{Direction, InsertionPoint};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cursor {
    anchor: OpId,
    direction: Direction,
    loop_nest: Vec<LoopId>,
}

#[derive(Debug, Clone, Default)]
pub struct OpBuilder {
    cursor: Option<Cursor>,
}

impl OpBuilder {
    /// A builder with no insertion point yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder positioned at `point`.
    pub fn at(point: &InsertionPoint) -> Self {
        let mut builder = Self::new();
        point.set(&mut builder);
        builder
    }

    pub fn set_insertion_point(
        &mut self,
        anchor: OpId,
        direction: Direction,
        loop_nest: Vec<LoopId>,
    ) {
        self.cursor = Some(Cursor {
            anchor,
            direction,
            loop_nest,
        });
    }

    pub fn clear_insertion_point(&mut self) {
        self.cursor = None;
    }

    /// The current cursor, as an insertion point.
    pub fn insertion_point(&self) -> Option<InsertionPoint> {
        self.cursor.as_ref().map(|c| InsertionPoint {
            anchor: c.anchor,
            direction: c.direction,
            loop_nest: c.loop_nest.clone(),
        })
    }

    /// Create an operation at the cursor.
    pub fn create(&mut self, program: &mut Program, spec: OpSpec) -> Result<OpId, IrError> {
        let cursor = self.cursor.as_mut().ok_or(IrError::NoInsertionPoint)?;
        let id = program.insert(
            cursor.anchor,
            cursor.direction,
            spec,
            cursor.loop_nest.clone(),
        )?;
        if cursor.direction == Direction::After {
            cursor.anchor = id;
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> (Program, OpId, OpId) {
        let mut p = Program::new();
        let i = p.intern_loop("i");
        let a = p.push(OpSpec::new("load").result("a"), vec![i]).unwrap();
        let b = p.push(OpSpec::new("store").result("b"), vec![i]).unwrap();
        (p, a, b)
    }

    fn names(p: &Program) -> Vec<&str> {
        p.ops().filter_map(|id| p.result_name(id)).collect()
    }

    #[test]
    fn create_without_cursor_fails() {
        let (mut p, _, _) = program();
        let mut builder = OpBuilder::new();
        assert_eq!(
            builder.create(&mut p, OpSpec::new("x")),
            Err(IrError::NoInsertionPoint)
        );
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn consecutive_after_inserts_keep_order() {
        let (mut p, a, _) = program();
        let nest = p.loop_nest(a).unwrap().to_vec();
        let mut builder = OpBuilder::new();
        builder.set_insertion_point(a, Direction::After, nest.clone());
        let x = builder.create(&mut p, OpSpec::new("x").result("x")).unwrap();
        builder.create(&mut p, OpSpec::new("y").result("y")).unwrap();
        assert_eq!(names(&p), vec!["a", "x", "y", "b"]);
        assert_eq!(p.loop_nest(x).unwrap(), nest.as_slice());
    }

    #[test]
    fn consecutive_before_inserts_keep_order() {
        let (mut p, _, b) = program();
        let mut builder = OpBuilder::new();
        builder.set_insertion_point(b, Direction::Before, vec![]);
        builder.create(&mut p, OpSpec::new("x").result("x")).unwrap();
        builder.create(&mut p, OpSpec::new("y").result("y")).unwrap();
        assert_eq!(names(&p), vec!["a", "x", "y", "b"]);
        assert_eq!(builder.insertion_point().unwrap().anchor, b);
    }

    #[test]
    fn insertion_point_sets_builder() {
        let (mut p, a, _) = program();
        let point = InsertionPoint {
            anchor: a,
            direction: Direction::Before,
            loop_nest: vec![],
        };
        let mut builder = OpBuilder::at(&point);
        assert_eq!(builder.insertion_point(), Some(point));
        let x = builder.create(&mut p, OpSpec::new("x")).unwrap();
        assert_eq!(p.position(x), Some(0));
        assert!(p.loop_nest(x).unwrap().is_empty());
    }

    #[test]
    fn stale_anchor_is_rejected() {
        let (mut p, _, b) = program();
        p.erase(b).unwrap();
        let mut builder = OpBuilder::new();
        builder.set_insertion_point(b, Direction::After, vec![]);
        assert_eq!(
            builder.create(&mut p, OpSpec::new("x")),
            Err(IrError::StaleOperation(b))
        );
        builder.clear_insertion_point();
        assert!(builder.insertion_point().is_none());
    }
}

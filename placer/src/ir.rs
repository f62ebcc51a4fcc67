// ir.rs — Loop-nest program arena
//
// Owns every operation of a program in a generational slot arena together
// with the explicit program-order sequence. Each operation records its
// operands (producer handles), its loop nest (outermost first) and a sorted
// attribute dictionary. Use lists are maintained eagerly so producer and
// consumer queries are both O(degree); positions are cached per slot so
// program-order comparisons are O(1).
//
// Preconditions: none.
// Postconditions: `order` lists every live slot exactly once; each live slot's
//                 cached position matches its index in `order`.
// Failure modes: stale handles, duplicate value names and erasing a value
//                that is still used produce `IrError`.
// Side effects: none.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use thiserror::Error;

use crate::id::{LoopId, LoopTable, OpId};
use crate::locate::Direction;

// ── Attributes ──────────────────────────────────────────────────────────────

/// A named piece of descriptive metadata attached to an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Presence-only flag, printed as a bare key.
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Attribute>),
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Unit => write!(f, "unit"),
            Attribute::Bool(b) => write!(f, "{b}"),
            Attribute::Int(n) => write!(f, "{n}"),
            Attribute::Float(x) => write!(f, "{x:?}"),
            Attribute::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        _ => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Attribute::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

pub type Attributes = BTreeMap<String, Attribute>;

// ── Operations ──────────────────────────────────────────────────────────────

/// A live operation. Mutate it only through `Program` so use lists stay
/// consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    /// Name of the value this operation defines, without the `%` sigil.
    pub result: String,
    pub operands: Vec<OpId>,
    pub loop_nest: Vec<LoopId>,
    pub attrs: Attributes,
}

/// Description of an operation that has not been placed yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpSpec {
    pub name: String,
    /// Result name; a fresh `%tN` is chosen when absent.
    pub result: Option<String>,
    pub operands: Vec<OpId>,
    pub attrs: Attributes,
}

impl OpSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn operand(mut self, op: OpId) -> Self {
        self.operands.push(op);
        self
    }

    pub fn operands(mut self, ops: impl IntoIterator<Item = OpId>) -> Self {
        self.operands.extend(ops);
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: Attribute) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("operation {0} is not live in this program")]
    StaleOperation(OpId),
    #[error("value %{0} is already defined")]
    DuplicateValue(String),
    #[error("cannot erase %{name}: it still has {users} user(s)")]
    StillUsed { name: String, users: usize },
    #[error("builder has no insertion point")]
    NoInsertionPoint,
}

// ── Program ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    position: u32,
    op: Option<Operation>,
    users: Vec<OpId>,
}

/// An ordered, loop-nest annotated program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<OpId>,
    values: HashMap<String, OpId>,
    loops: LoopTable,
    next_temp: u32,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loops(&self) -> &LoopTable {
        &self.loops
    }

    pub fn intern_loop(&mut self, name: &str) -> LoopId {
        self.loops.intern(name)
    }

    /// Map loop names to ids, failing on the first unknown name.
    pub fn loop_ids<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<LoopId>, String> {
        names
            .into_iter()
            .map(|n| self.loops.lookup(n).ok_or_else(|| n.to_string()))
            .collect()
    }

    pub fn loop_name(&self, id: LoopId) -> String {
        self.loops
            .name(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    // ── Navigation ──

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Operations in program order.
    pub fn order(&self) -> &[OpId] {
        &self.order
    }

    pub fn ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.order.iter().copied()
    }

    pub fn contains(&self, id: OpId) -> bool {
        self.slot(id).is_some()
    }

    pub fn op(&self, id: OpId) -> Option<&Operation> {
        self.slot(id).and_then(|s| s.op.as_ref())
    }

    pub fn get(&self, id: OpId) -> Result<&Operation, IrError> {
        self.op(id).ok_or(IrError::StaleOperation(id))
    }

    pub fn position(&self, id: OpId) -> Option<usize> {
        self.slot(id).map(|s| s.position as usize)
    }

    pub fn at(&self, position: usize) -> Option<OpId> {
        self.order.get(position).copied()
    }

    pub fn prev(&self, id: OpId) -> Option<OpId> {
        let pos = self.position(id)?;
        pos.checked_sub(1).and_then(|p| self.at(p))
    }

    pub fn next(&self, id: OpId) -> Option<OpId> {
        self.position(id).and_then(|p| self.at(p + 1))
    }

    pub fn loop_nest(&self, id: OpId) -> Option<&[LoopId]> {
        self.op(id).map(|op| op.loop_nest.as_slice())
    }

    /// Distinct producers of `id`'s operands, in operand order.
    pub fn producers(&self, id: OpId) -> Vec<OpId> {
        let mut out: Vec<OpId> = Vec::new();
        if let Some(op) = self.op(id) {
            for &operand in &op.operands {
                if !out.contains(&operand) {
                    out.push(operand);
                }
            }
        }
        out
    }

    /// Distinct consumers of `id`'s result.
    pub fn users(&self, id: OpId) -> &[OpId] {
        self.slot(id).map(|s| s.users.as_slice()).unwrap_or(&[])
    }

    pub fn value(&self, name: &str) -> Option<OpId> {
        self.values
            .get(name.strip_prefix('%').unwrap_or(name))
            .copied()
    }

    pub fn result_name(&self, id: OpId) -> Option<&str> {
        self.op(id).map(|op| op.result.as_str())
    }

    // ── Attributes ──

    pub fn attrs(&self, id: OpId) -> Option<&Attributes> {
        self.op(id).map(|op| &op.attrs)
    }

    pub fn has_attr(&self, id: OpId, name: &str) -> bool {
        self.attrs(id).is_some_and(|a| a.contains_key(name))
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attr(
        &mut self,
        id: OpId,
        name: impl Into<String>,
        value: Attribute,
    ) -> Result<Option<Attribute>, IrError> {
        let op = self.op_mut(id)?;
        Ok(op.attrs.insert(name.into(), value))
    }

    pub fn remove_attr(&mut self, id: OpId, name: &str) -> Result<Option<Attribute>, IrError> {
        let op = self.op_mut(id)?;
        Ok(op.attrs.remove(name))
    }

    // ── Mutation ──

    /// Append an operation at the end of the program.
    pub fn push(&mut self, spec: OpSpec, loop_nest: Vec<LoopId>) -> Result<OpId, IrError> {
        let position = self.order.len();
        self.allocate(spec, loop_nest, position)
    }

    /// Insert an operation immediately before or after `anchor`.
    pub fn insert(
        &mut self,
        anchor: OpId,
        direction: Direction,
        spec: OpSpec,
        loop_nest: Vec<LoopId>,
    ) -> Result<OpId, IrError> {
        let anchor_pos = self
            .position(anchor)
            .ok_or(IrError::StaleOperation(anchor))?;
        let position = match direction {
            Direction::Before => anchor_pos,
            Direction::After => anchor_pos + 1,
        };
        self.allocate(spec, loop_nest, position)
    }

    /// Remove an operation that has no remaining users. Its slot is recycled
    /// under a new generation, so outstanding handles become stale.
    pub fn erase(&mut self, id: OpId) -> Result<Operation, IrError> {
        let slot = self.slot(id).ok_or(IrError::StaleOperation(id))?;
        if !slot.users.is_empty() {
            return Err(IrError::StillUsed {
                name: self.result_name(id).unwrap_or_default().to_string(),
                users: slot.users.len(),
            });
        }
        let position = slot.position as usize;

        for producer in self.producers(id) {
            if let Some(s) = self.slot_mut(producer) {
                s.users.retain(|&u| u != id);
            }
        }

        self.order.remove(position);
        self.renumber(position);

        let slot = &mut self.slots[id.index as usize];
        slot.generation += 1;
        slot.users.clear();
        let op = slot.op.take().ok_or(IrError::StaleOperation(id))?;
        self.free.push(id.index);
        self.values.remove(&op.result);
        Ok(op)
    }

    /// Redirect every use of `old` to `new`. Uses held by `new` itself are
    /// left in place. Returns the number of redirected users.
    pub fn replace_all_uses(&mut self, old: OpId, new: OpId) -> Result<usize, IrError> {
        self.check(old)?;
        self.check(new)?;
        if old == new {
            return Ok(0);
        }
        let users = std::mem::take(&mut self.slot_mut_checked(old)?.users);
        let mut redirected = 0;
        let mut kept = Vec::new();
        for user in users {
            if user == new {
                kept.push(user);
                continue;
            }
            let op = self.op_mut(user)?;
            for operand in op.operands.iter_mut() {
                if *operand == old {
                    *operand = new;
                }
            }
            let new_users = &mut self.slot_mut_checked(new)?.users;
            if !new_users.contains(&user) {
                new_users.push(user);
            }
            redirected += 1;
        }
        self.slot_mut_checked(old)?.users = kept;
        Ok(redirected)
    }

    /// Render one operation in the textual program format.
    pub fn display_op(&self, id: OpId) -> OpDisplay<'_> {
        OpDisplay { program: self, id }
    }

    // ── Internals ──

    fn slot(&self, id: OpId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation && s.op.is_some())
    }

    fn slot_mut(&mut self, id: OpId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation && s.op.is_some())
    }

    fn slot_mut_checked(&mut self, id: OpId) -> Result<&mut Slot, IrError> {
        self.slot_mut(id).ok_or(IrError::StaleOperation(id))
    }

    fn op_mut(&mut self, id: OpId) -> Result<&mut Operation, IrError> {
        self.slot_mut(id)
            .and_then(|s| s.op.as_mut())
            .ok_or(IrError::StaleOperation(id))
    }

    fn check(&self, id: OpId) -> Result<(), IrError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(IrError::StaleOperation(id))
        }
    }

    fn fresh_value_name(&mut self) -> String {
        loop {
            let name = format!("t{}", self.next_temp);
            self.next_temp += 1;
            if !self.values.contains_key(&name) {
                return name;
            }
        }
    }

    fn allocate(
        &mut self,
        spec: OpSpec,
        loop_nest: Vec<LoopId>,
        position: usize,
    ) -> Result<OpId, IrError> {
        for &operand in &spec.operands {
            self.check(operand)?;
        }
        let result = match spec.result {
            Some(name) => {
                if self.values.contains_key(&name) {
                    return Err(IrError::DuplicateValue(name));
                }
                name
            }
            None => self.fresh_value_name(),
        };

        let op = Operation {
            name: spec.name,
            result: result.clone(),
            operands: spec.operands,
            loop_nest,
            attrs: spec.attrs,
        };

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.op = Some(op);
                OpId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    position: 0,
                    op: Some(op),
                    users: Vec::new(),
                });
                OpId::new(index, 0)
            }
        };

        for producer in self.producers(id) {
            if let Some(s) = self.slot_mut(producer) {
                s.users.push(id);
            }
        }

        self.values.insert(result, id);
        self.order.insert(position, id);
        self.renumber(position);
        Ok(id)
    }

    fn renumber(&mut self, from: usize) {
        for pos in from..self.order.len() {
            let index = self.order[pos].index as usize;
            self.slots[index].position = pos as u32;
        }
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

/// Display adapter for a single operation.
pub struct OpDisplay<'a> {
    program: &'a Program,
    id: OpId,
}

impl fmt::Display for OpDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(op) = self.program.op(self.id) else {
            return write!(f, "<stale {}>", self.id);
        };
        write!(f, "%{} = {}(", op.result, op.name)?;
        for (i, &operand) in op.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.program.result_name(operand) {
                Some(name) => write!(f, "%{name}")?,
                None => write!(f, "<stale {operand}>")?,
            }
        }
        write!(f, ")")?;
        if !op.loop_nest.is_empty() {
            write!(f, " in {}", NestDisplay(self.program, &op.loop_nest))?;
        }
        if !op.attrs.is_empty() {
            write!(f, " {{")?;
            for (i, (name, value)) in op.attrs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match value {
                    Attribute::Unit => write!(f, "{name}")?,
                    _ => write!(f, "{name} = {value}")?,
                }
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

/// Renders a loop nest as `[i, j]`.
pub struct NestDisplay<'a>(pub &'a Program, pub &'a [LoopId]);

impl fmt::Display for NestDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, &l) in self.1.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.0.loop_name(l))?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.ops() {
            writeln!(f, "{}", self.display_op(id))?;
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

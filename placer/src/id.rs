// id.rs — Stable handles for operations and loops
//
// Operations live in a slot arena owned by `Program`. An `OpId` names a slot
// together with the generation the slot had when the handle was issued, so a
// handle that outlives an erase is detected instead of silently aliasing the
// slot's next occupant.

use std::fmt;

/// Generational handle to an operation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl OpId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the owning arena.
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}v{}", self.index, self.generation)
    }
}

/// Identifier of a loop. Two operations are co-nested in a loop only when
/// they carry the same `LoopId` at the same depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(pub u32);

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop{}", self.0)
    }
}

/// Interns loop names to `LoopId`s in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct LoopTable {
    names: Vec<String>,
}

impl LoopTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, allocating one if the name is new.
    pub fn intern(&mut self, name: &str) -> LoopId {
        if let Some(id) = self.lookup(name) {
            return id;
        }
        let id = LoopId(self.names.len() as u32);
        self.names.push(name.to_string());
        id
    }

    pub fn lookup(&self, name: &str) -> Option<LoopId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| LoopId(i as u32))
    }

    pub fn name(&self, id: LoopId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable() {
        let mut table = LoopTable::new();
        let i = table.intern("i");
        let j = table.intern("j");
        assert_eq!(table.intern("i"), i);
        assert_ne!(i, j);
        assert_eq!(table.name(j), Some("j"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn lookup_unknown_loop() {
        let table = LoopTable::new();
        assert!(table.lookup("k").is_none());
        assert!(table.name(LoopId(3)).is_none());
    }
}

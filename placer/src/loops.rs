// loops.rs — Loop-nest prefix arithmetic
//
// A loop nest is read outermost first. Two nests share a loop at depth d only
// if every identifier up to and including d is identical.

use crate::id::LoopId;

/// Number of leading loops `a` and `b` have in common.
pub fn common_prefix_len(a: &[LoopId], b: &[LoopId]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

pub fn is_prefix(prefix: &[LoopId], nest: &[LoopId]) -> bool {
    nest.starts_with(prefix)
}

/// Whether an operation nested in exactly `target` may sit at the boundary
/// between `prev` and `next` (either side may be the program edge), placed
/// relative to the operation whose nest is `anchor`.
///
/// The anchor must be nested in every loop of `target`, and no loop outside
/// `target` may be open on both sides of the boundary; otherwise the new
/// operation would split that loop's body.
pub fn boundary_admits(
    prev: Option<&[LoopId]>,
    next: Option<&[LoopId]>,
    anchor: &[LoopId],
    target: &[LoopId],
) -> bool {
    if !is_prefix(target, anchor) {
        return false;
    }
    let open_across = match (prev, next) {
        (Some(p), Some(n)) => common_prefix_len(p, n),
        _ => 0,
    };
    open_across <= target.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const I: LoopId = LoopId(0);
    const J: LoopId = LoopId(1);
    const K: LoopId = LoopId(2);

    fn side(nest: &[LoopId]) -> Option<&[LoopId]> {
        Some(nest)
    }

    #[test]
    fn common_prefix_requires_identical_ids() {
        assert_eq!(common_prefix_len(&[I, J], &[I, J, K]), 2);
        assert_eq!(common_prefix_len(&[I, J], &[I, K]), 1);
        assert_eq!(common_prefix_len(&[J, I], &[I, J]), 0);
        assert_eq!(common_prefix_len(&[], &[I]), 0);
    }

    #[test]
    fn prefix_check() {
        assert!(is_prefix(&[], &[I]));
        assert!(is_prefix(&[I], &[I, J]));
        assert!(!is_prefix(&[J], &[I, J]));
        assert!(!is_prefix(&[I, J], &[I]));
    }

    #[test]
    fn boundary_inside_deeper_loop_is_rejected() {
        // Between two ops of loop j: inserting at depth 1 would split j.
        assert!(!boundary_admits(
            side(&[I, J]),
            side(&[I, J]),
            &[I, J],
            &[I]
        ));
        assert!(boundary_admits(side(&[I, J]), side(&[I, J]), &[I, J], &[I, J]));
    }

    #[test]
    fn boundary_at_loop_edge() {
        // End of j, start of a sibling op in i.
        assert!(boundary_admits(side(&[I, J]), side(&[I]), &[I, J], &[I]));
        assert!(boundary_admits(side(&[I, J]), side(&[I]), &[I], &[I]));
        // Anchor outside the target loop.
        assert!(!boundary_admits(side(&[]), side(&[I]), &[], &[I]));
    }

    #[test]
    fn program_edges_never_split_loops() {
        assert!(boundary_admits(None, side(&[I, J]), &[I, J], &[]));
        assert!(boundary_admits(side(&[I]), None, &[I], &[]));
    }
}

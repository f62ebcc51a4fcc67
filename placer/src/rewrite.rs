// rewrite.rs — Replace an operation with a newly placed one
//
// Composes the locator, the builder and the attribute forwarder into the
// usual rewrite: find a point near `old` nested in the requested loops,
// create the replacement there, inherit `old`'s attributes, redirect every
// use of `old` and erase it.
//
// Preconditions: `program` satisfies the `verify` obligations.
// Postconditions: on success `old` is gone, its former users read the
//                 replacement and the program still satisfies `verify`.
// Failure modes: `RewriteError`. Placement failures are detected before the
//                program is touched.
// Side effects: mutates the program.

use thiserror::Error;

use crate::builder::OpBuilder;
use crate::forward::forward_attributes;
use crate::id::{LoopId, OpId};
use crate::ir::{IrError, OpSpec, Program};
use crate::locate::{find_insertion_point_with, Direction, PlacementError, PlacementRequest};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Ir(#[from] IrError),
    #[error("replacement for {0} reads the operation it replaces")]
    ReadsReplaced(OpId),
}

/// Options for [`replace_with`].
#[derive(Debug, Clone, Copy)]
pub struct Replacement<'a> {
    pub target_nest: &'a [LoopId],
    pub depth: usize,
    pub direction: Direction,
    /// Attribute names not inherited from the replaced operation.
    pub ignore: &'a [&'a str],
}

/// Replace `old` by a new operation built from `spec`, returning its handle.
///
/// The replacement may read `old`'s producers and any operand listed in
/// `spec`; it is read by every former user of `old`.
pub fn replace_with(
    program: &mut Program,
    old: OpId,
    spec: OpSpec,
    options: Replacement<'_>,
) -> Result<OpId, RewriteError> {
    if !program.contains(old) {
        return Err(PlacementError::StaleOperation(old).into());
    }
    if spec.operands.contains(&old) {
        return Err(RewriteError::ReadsReplaced(old));
    }

    let mut operands = program.producers(old);
    for &operand in &spec.operands {
        if !operands.contains(&operand) {
            operands.push(operand);
        }
    }
    let request = PlacementRequest::new(old, options.target_nest, options.depth, options.direction)
        .with_operands(operands)
        .with_users(program.users(old).iter().copied());
    let point = find_insertion_point_with(program, &request)?;

    let mut builder = OpBuilder::at(&point);
    let new = builder.create(program, spec)?;
    forward_attributes(program, old, new, options.ignore);
    let redirected = program.replace_all_uses(old, new)?;
    program.erase(old)?;
    log::debug!("rewrite: replaced {old} with {new} ({redirected} use(s))");
    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Attribute;
    use crate::resolve::load_program;
    use crate::verify::{verify_program, StageCert};

    const SOURCE: &str = "\
%a = load() in [i]
%b = mul(%a, %a) in [i, j] {unroll = 4, fast}
%c = add(%b) in [i, j]
%d = store(%c) in [i]
";

    fn options<'a>(nest: &'a [LoopId], depth: usize, ignore: &'a [&'a str]) -> Replacement<'a> {
        Replacement {
            target_nest: nest,
            depth,
            direction: Direction::Before,
            ignore,
        }
    }

    #[test]
    fn hoists_replacement_out_of_inner_loop() {
        let mut p = load_program(SOURCE).unwrap();
        let a = p.value("a").unwrap();
        let b = p.value("b").unwrap();
        let nest = p.loop_nest(b).unwrap().to_vec();
        let spec = OpSpec::new("square").result("sq").operand(a);
        let new = replace_with(&mut p, b, spec, options(&nest, 1, &["fast"])).unwrap();

        assert!(p.value("b").is_none());
        assert_eq!(
            p.to_string(),
            "%a = load() in [i]\n\
             %sq = square(%a) in [i] {unroll = 4}\n\
             %c = add(%sq) in [i, j]\n\
             %d = store(%c) in [i]\n"
        );
        assert_eq!(p.users(new), &[p.value("c").unwrap()]);
        assert!(verify_program(&p).all_pass());
    }

    #[test]
    fn placement_failure_leaves_program_untouched() {
        let mut p = load_program(SOURCE).unwrap();
        let c = p.value("c").unwrap();
        let before = p.to_string();
        let nest = p.loop_nest(c).unwrap().to_vec();
        let err = replace_with(&mut p, c, OpSpec::new("x"), options(&nest, 1, &[])).unwrap_err();
        // Leaving j backward would cross %b, which %c reads.
        assert!(matches!(
            err,
            RewriteError::Placement(PlacementError::DependencyViolated { .. })
        ));
        assert_eq!(p.to_string(), before);
    }

    #[test]
    fn replacement_reading_old_is_rejected() {
        let mut p = load_program(SOURCE).unwrap();
        let b = p.value("b").unwrap();
        let spec = OpSpec::new("x").operand(b);
        assert_eq!(
            replace_with(&mut p, b, spec, options(&[], 0, &[])),
            Err(RewriteError::ReadsReplaced(b))
        );
    }

    #[test]
    fn in_place_replacement_keeps_new_attributes() {
        let mut p = load_program(SOURCE).unwrap();
        let b = p.value("b").unwrap();
        let a = p.value("a").unwrap();
        let nest = p.loop_nest(b).unwrap().to_vec();
        let spec = OpSpec::new("mul2")
            .result("b2")
            .operands([a, a])
            .attr("unroll", Attribute::Int(2));
        let new = replace_with(&mut p, b, spec, options(&nest, 2, &[])).unwrap();
        assert_eq!(p.position(new), Some(1));
        let attrs = p.attrs(new).unwrap();
        assert_eq!(attrs.get("unroll"), Some(&Attribute::Int(2)));
        assert_eq!(attrs.get("fast"), Some(&Attribute::Unit));
    }

    #[test]
    fn stale_old_is_reported() {
        let mut p = load_program(SOURCE).unwrap();
        let d = p.value("d").unwrap();
        p.erase(d).unwrap();
        assert_eq!(
            replace_with(&mut p, d, OpSpec::new("x"), options(&[], 0, &[])),
            Err(RewriteError::Placement(PlacementError::StaleOperation(d)))
        );
    }
}

// verify.rs — Structural obligations of a loop-nest program
//
// V1: program order is a topological order of the producer → consumer relation.
// V2: the operations nested in any loop form one contiguous range.
// V3: a loop always sits at the same depth under the same parent loop, and
//     never appears twice in one nest.
//
// Together V2 and V3 mean loop bodies never partially overlap.
//
// Preconditions: none.
// Postconditions: returns a `ProgramCert` plus every violation found.
// Failure modes: none (violations are data).
// Side effects: none.

use std::collections::{HashMap, HashSet};

use crate::ast::Span;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::id::{LoopId, OpId};
use crate::ir::Program;

/// Machine-checkable evidence that a stage's postconditions hold.
pub trait StageCert {
    fn all_pass(&self) -> bool;
    fn obligations(&self) -> Vec<(&'static str, bool)>;
}

/// One broken obligation, attributed to the operation where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub code: DiagCode,
    pub op: OpId,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ProgramCert {
    pub v1_topological: bool,
    pub v2_loops_contiguous: bool,
    pub v3_nests_consistent: bool,
    pub violations: Vec<Violation>,
}

impl StageCert for ProgramCert {
    fn all_pass(&self) -> bool {
        self.v1_topological && self.v2_loops_contiguous && self.v3_nests_consistent
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("V1_topological_order", self.v1_topological),
            ("V2_loops_contiguous", self.v2_loops_contiguous),
            ("V3_nests_consistent", self.v3_nests_consistent),
        ]
    }
}

pub fn verify_program(program: &Program) -> ProgramCert {
    let mut violations = Vec::new();
    let v1 = verify_v1_topological(program, &mut violations);
    let v2 = verify_v2_contiguous(program, &mut violations);
    let v3 = verify_v3_nesting(program, &mut violations);
    ProgramCert {
        v1_topological: v1,
        v2_loops_contiguous: v2,
        v3_nests_consistent: v3,
        violations,
    }
}

/// Verify `program` and report each violation at the span of its operation.
/// Operations without a recorded span are reported at the start of the input.
pub fn verify_diagnostics(program: &Program, spans: &HashMap<OpId, Span>) -> Vec<Diagnostic> {
    verify_program(program)
        .violations
        .into_iter()
        .map(|v| {
            let span = spans.get(&v.op).copied().unwrap_or_else(|| (0..0).into());
            Diagnostic::error(span, v.message).with_code(v.code)
        })
        .collect()
}

fn name(program: &Program, id: OpId) -> String {
    format!("%{}", program.result_name(id).unwrap_or("?"))
}

fn verify_v1_topological(program: &Program, violations: &mut Vec<Violation>) -> bool {
    let mut ok = true;
    for (pos, id) in program.ops().enumerate() {
        for producer in program.producers(id) {
            let defined_before = program.position(producer).is_some_and(|p| p < pos);
            if !defined_before {
                ok = false;
                violations.push(Violation {
                    code: codes::E0201,
                    op: id,
                    message: format!(
                        "{} reads {}, which is not defined before it",
                        name(program, id),
                        name(program, producer)
                    ),
                });
            }
        }
    }
    ok
}

fn verify_v2_contiguous(program: &Program, violations: &mut Vec<Violation>) -> bool {
    // loop → position of the last operation seen in it
    let mut last_seen: HashMap<LoopId, usize> = HashMap::new();
    let mut closed: HashSet<LoopId> = HashSet::new();
    let mut ok = true;
    for (pos, id) in program.ops().enumerate() {
        let nest = program.loop_nest(id).unwrap_or(&[]);
        for &l in nest {
            if closed.contains(&l) {
                ok = false;
                violations.push(Violation {
                    code: codes::E0202,
                    op: id,
                    message: format!(
                        "{} reopens loop {} after its body ended",
                        name(program, id),
                        program.loop_name(l)
                    ),
                });
                closed.remove(&l);
            }
            last_seen.insert(l, pos);
        }
        // Any loop seen before but absent here is now closed.
        last_seen.retain(|l, _| {
            if nest.contains(l) {
                true
            } else {
                closed.insert(*l);
                false
            }
        });
    }
    ok
}

fn verify_v3_nesting(program: &Program, violations: &mut Vec<Violation>) -> bool {
    // loop → (depth, parent)
    let mut placement: HashMap<LoopId, (usize, Option<LoopId>)> = HashMap::new();
    let mut ok = true;
    for id in program.ops() {
        let nest = program.loop_nest(id).unwrap_or(&[]);
        let mut seen = HashSet::new();
        for (depth, &l) in nest.iter().enumerate() {
            if !seen.insert(l) {
                ok = false;
                violations.push(Violation {
                    code: codes::E0203,
                    op: id,
                    message: format!(
                        "{} lists loop {} twice",
                        name(program, id),
                        program.loop_name(l)
                    ),
                });
                continue;
            }
            let parent = depth.checked_sub(1).map(|d| nest[d]);
            let expected = *placement.entry(l).or_insert((depth, parent));
            if expected != (depth, parent) {
                ok = false;
                violations.push(Violation {
                    code: codes::E0203,
                    op: id,
                    message: format!(
                        "{} nests loop {} inconsistently with earlier operations",
                        name(program, id),
                        program.loop_name(l)
                    ),
                });
            }
        }
    }
    ok
}

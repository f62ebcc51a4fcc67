// forward.rs — Carry descriptive attributes from a replaced operation
//
// Copies every attribute of `old` onto `new` unless the name is ignored or
// `new` already defines it. The new operation's own attributes always win.
//
// Preconditions: none.
// Postconditions: `old` is unchanged; `new` gains only names that `old`
//                 carries and that it lacked; calling twice is a no-op the
//                 second time.
// Failure modes: none. A stale handle on either side copies nothing.
// Side effects: mutates the attributes of `new`.

use crate::id::OpId;
use crate::ir::{Attribute, Program};

pub fn forward_attributes(program: &mut Program, old: OpId, new: OpId, ignore: &[&str]) {
    let Some(source) = program.attrs(old) else {
        log::debug!("forward: {old} is not live, nothing to copy");
        return;
    };
    if !program.contains(new) {
        log::debug!("forward: {new} is not live, nothing to copy");
        return;
    }

    let copies: Vec<(String, Attribute)> = source
        .iter()
        .filter(|(name, _)| !ignore.contains(&name.as_str()) && !program.has_attr(new, name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    log::trace!("forward: {} attribute(s) {old} -> {new}", copies.len());
    for (name, value) in copies {
        // `new` was checked live above and nothing in between erases it.
        let _ = program.set_attr(new, name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Attributes, OpSpec};

    fn pair(old_attrs: &[(&str, Attribute)], new_attrs: &[(&str, Attribute)]) -> (Program, OpId, OpId) {
        let mut p = Program::new();
        let mut old = OpSpec::new("old").result("old");
        for (k, v) in old_attrs {
            old = old.attr(*k, v.clone());
        }
        let mut new = OpSpec::new("new").result("new");
        for (k, v) in new_attrs {
            new = new.attr(*k, v.clone());
        }
        let o = p.push(old, vec![]).unwrap();
        let n = p.push(new, vec![]).unwrap();
        (p, o, n)
    }

    fn attrs(p: &Program, id: OpId) -> Attributes {
        p.attrs(id).cloned().unwrap_or_default()
    }

    #[test]
    fn copies_missing_attributes() {
        let (mut p, o, n) = pair(&[("unroll", Attribute::Int(4)), ("fast", Attribute::Unit)], &[]);
        forward_attributes(&mut p, o, n, &[]);
        assert_eq!(attrs(&p, n), attrs(&p, o));
    }

    #[test]
    fn existing_values_win() {
        let (mut p, o, n) = pair(
            &[("unroll", Attribute::Int(4)), ("tag", Attribute::Str("old".into()))],
            &[("unroll", Attribute::Int(8))],
        );
        forward_attributes(&mut p, o, n, &[]);
        let a = attrs(&p, n);
        assert_eq!(a.get("unroll"), Some(&Attribute::Int(8)));
        assert_eq!(a.get("tag"), Some(&Attribute::Str("old".into())));
        assert_eq!(attrs(&p, o).get("unroll"), Some(&Attribute::Int(4)));
    }

    #[test]
    fn ignored_names_are_skipped() {
        let (mut p, o, n) = pair(
            &[("storage", Attribute::Unit), ("tag", Attribute::Bool(true))],
            &[],
        );
        forward_attributes(&mut p, o, n, &["storage"]);
        assert!(!p.has_attr(n, "storage"));
        assert!(p.has_attr(n, "tag"));
    }

    #[test]
    fn ignore_does_not_remove_existing() {
        let (mut p, o, n) = pair(&[("storage", Attribute::Int(1))], &[("storage", Attribute::Int(2))]);
        forward_attributes(&mut p, o, n, &["storage"]);
        assert_eq!(attrs(&p, n).get("storage"), Some(&Attribute::Int(2)));
    }

    #[test]
    fn second_call_changes_nothing() {
        let (mut p, o, n) = pair(&[("a", Attribute::Float(0.5))], &[("b", Attribute::Unit)]);
        forward_attributes(&mut p, o, n, &[]);
        let once = attrs(&p, n);
        forward_attributes(&mut p, o, n, &[]);
        assert_eq!(attrs(&p, n), once);
    }

    #[test]
    fn empty_and_stale_inputs_are_no_ops() {
        let (mut p, o, n) = pair(&[], &[("b", Attribute::Unit)]);
        forward_attributes(&mut p, o, n, &[]);
        assert_eq!(attrs(&p, n).len(), 1);

        p.erase(o).unwrap();
        forward_attributes(&mut p, o, n, &[]);
        assert_eq!(attrs(&p, n).len(), 1);
    }
}

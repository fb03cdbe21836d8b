//! Property-based tests for the universally-quantified invariants (P1-P3,
//! P7) over random branch stacks and whiteout placements.

use std::fs;

use proptest::prelude::*;

use ulakefs::core::branch::BranchTable;
use ulakefs::core::errors::UfsError;
use ulakefs::core::pathbuilder::build_path;
use ulakefs::core::readdir::{merged_readdir, HideMeta};
use ulakefs::core::resolver::find_rorw_branch;
use ulakefs::core::whiteout::whiteout_tag;

const NAME: &str = "x";

/// One present/whiteout decision per branch in the stack: whether branch `i`
/// physically has `NAME`, and whether branch `i` carries a whiteout for it.
fn arb_branch_layout(max_branches: usize) -> impl Strategy<Value = Vec<(bool, bool)>> {
    prop::collection::vec((any::<bool>(), any::<bool>()), 1..=max_branches)
}

/// Materialize `layout` as a real branch stack, with `NAME` written into
/// every branch whose `present` flag is set, and a whiteout tag for `NAME`
/// in every branch whose `whiteout` flag is set.
fn build_from_layout(layout: &[(bool, bool)]) -> (Vec<tempfile::TempDir>, BranchTable) {
    let mut tmp = Vec::new();
    let mut specs = Vec::new();
    for (present, whiteout) in layout {
        let dir = tempfile::tempdir().unwrap();
        if *present {
            fs::write(dir.path().join(NAME), b"").unwrap();
        }
        if *whiteout {
            let meta = dir.path().join(".ulakefs");
            fs::create_dir_all(&meta).unwrap();
            fs::write(meta.join(whiteout_tag(NAME)), b"").unwrap();
        }
        specs.push(format!("{}=RW", dir.path().display()));
        tmp.push(dir);
    }
    let table = BranchTable::new(&specs).unwrap();
    (tmp, table)
}

/// The branch index a correct, naive reference resolver would pick: first
/// `present` branch not preceded by a `whiteout` branch.
fn expected_branch(layout: &[(bool, bool)]) -> Option<usize> {
    for (i, (present, _)) in layout.iter().enumerate() {
        if layout[..i].iter().any(|(_, w)| *w) {
            return None;
        }
        if *present {
            return Some(i);
        }
    }
    None
}

proptest! {
    /// P1: resolve(P, B) returns either the first branch containing P that
    /// is not whited out above it, or NotFound.
    #[test]
    fn p1_resolver_matches_reference_model(layout in arb_branch_layout(5)) {
        let (_tmp, table) = build_from_layout(&layout);
        let logical = format!("/{NAME}");

        let result = find_rorw_branch(&table, &logical);
        match expected_branch(&layout) {
            Some(expected_i) => prop_assert_eq!(result.ok(), Some(expected_i)),
            None => prop_assert!(matches!(result, Err(UfsError::NotFound { .. }))),
        }
    }

    /// P2/P3: readdir yields the name at most once, matches the expected
    /// presence/whiteout union, and is stable across repeated calls with no
    /// intervening mutation.
    #[test]
    fn p2_p3_readdir_matches_union_and_is_deterministic(layout in arb_branch_layout(5)) {
        let (_tmp, table) = build_from_layout(&layout);
        let hide = HideMeta { enabled: false };

        let collect = || {
            let mut names = Vec::new();
            merged_readdir(&table, true, hide, "/", &mut |n: &str, _k| {
                names.push(n.to_string());
                false
            })
            .unwrap();
            names
        };

        let first = collect();
        let second = collect();
        prop_assert_eq!(&first, &second, "readdir must be deterministic across calls");

        let occurrences = first.iter().filter(|n| n.as_str() == NAME).count();
        let expected_present = expected_branch(&layout).is_some();
        prop_assert_eq!(occurrences, usize::from(expected_present));
    }
}

/// P7: `build_path` slash-normalization literals from spec.md §8.
#[test]
fn p7_build_path_literals() {
    assert_eq!(build_path(["a/", "/b", "c/"]).unwrap(), "a/b/c/");
    assert_eq!(build_path(["a", "b"]).unwrap(), "a/b");
}

//! Pure sequence algorithms over name-unique, creation-ordered chains.
//!
//! Chains are compared by name only. The projections handed to the head and tail
//! queries come from an aligned merge, so they may carry absent placeholders at either
//! end; anything absent in the middle is rejected.

use std::collections::{BTreeMap, HashSet};

use crate::comparison::ComparisonItem;
use crate::error::AlignmentError;

/// Anything that is identified by a name within its chain.
pub trait Named {
    fn name(&self) -> &str;
}

/// Pair two chains by name position, padding the later-starting and the shorter chain
/// with absent placeholders.
pub fn align<'a, T: Named>(
    items_a: &[&'a T],
    items_b: &[&'a T],
) -> Result<Vec<ComparisonItem<'a, T>>, AlignmentError> {
    check_unique(items_a)?;
    check_unique(items_b)?;

    let (first_a, first_b) = match (items_a.first(), items_b.first()) {
        (None, None) => return Ok(Vec::new()),
        (None, Some(_)) => return Ok(items_b.iter().map(|b| ComparisonItem::B(*b)).collect()),
        (Some(_), None) => return Ok(items_a.iter().map(|a| ComparisonItem::A(*a)).collect()),
        (Some(a), Some(b)) => (*a, *b),
    };

    let start_b = find_name(items_a, first_b.name());
    let start_a = find_name(items_b, first_a.name());
    if start_a.is_none() && start_b.is_none() {
        return Err(AlignmentError::NoOverlap {
            a: first_a.name().to_owned(),
            b: first_b.name().to_owned(),
        });
    }

    let mut padded_a = pad_front(items_a, start_a.unwrap_or(0));
    let mut padded_b = pad_front(items_b, start_b.unwrap_or(0));
    let len = padded_a.len().max(padded_b.len());
    padded_a.resize(len, None);
    padded_b.resize(len, None);

    check_single_run(&padded_a)?;
    check_single_run(&padded_b)?;

    let mut merged = Vec::with_capacity(len);
    for (a, b) in padded_a.into_iter().zip(padded_b) {
        match ComparisonItem::from_pair(a, b) {
            Some(ComparisonItem::Both(a, b)) if a.name() != b.name() => {
                return Err(AlignmentError::NameMismatch {
                    a: a.name().to_owned(),
                    b: b.name().to_owned(),
                });
            }
            Some(item) => merged.push(item),
            None => return Err(AlignmentError::NotConsecutive),
        }
    }
    Ok(merged)
}

/// At most one block of present items, i.e. no more than two present/absent transitions.
pub fn check_single_run<T: Named>(items: &[Option<&T>]) -> Result<(), AlignmentError> {
    let mut transitions = 0;
    let mut present = false;
    let mut last_name = "";

    for item in items {
        if item.is_some() != present {
            transitions += 1;
            present = item.is_some();
            if transitions > 2 {
                return Err(AlignmentError::Gap {
                    after: last_name.to_owned(),
                });
            }
        }
        if let Some(item) = item {
            last_name = item.name();
        }
    }
    Ok(())
}

/// Elements of `source` newer than everything in `target`.
///
/// If `target` is empty all of `source` is new. Otherwise the last element of `target`
/// must be found in `source`, and everything up to it must line up exactly with the end
/// of `target` (or all of `target` with the part of `source` leading up to it).
pub fn disjoint_head<'a, T: Named>(
    source: &[Option<&'a T>],
    target: &[Option<&'a T>],
) -> Result<Vec<&'a T>, AlignmentError> {
    let source = consecutive(source)?;
    let target = consecutive(target)?;
    check_unique(&source)?;
    check_unique(&target)?;

    let Some(anchor) = target.last() else {
        return Ok(source);
    };
    if source.is_empty() {
        return Ok(source);
    }
    let source_index =
        find_name(&source, anchor.name()).ok_or_else(|| AlignmentError::MissingAnchor {
            name: anchor.name().to_owned(),
        })?;

    let old_source = source.get(..=source_index).unwrap_or_default();
    let (left, right) = if old_source.len() <= target.len() {
        (target.get(target.len() - old_source.len()..), Some(old_source))
    } else {
        (Some(target.as_slice()), source.get(source_index + 1 - target.len()..=source_index))
    };
    match (left, right) {
        (Some(left), Some(right)) if same_names(left, right) => {}
        _ => {
            return Err(AlignmentError::HeadMismatch {
                name: anchor.name().to_owned(),
            })
        }
    }

    Ok(source.get(source_index + 1..).unwrap_or_default().to_vec())
}

/// Elements of `source` older than everything in `target`: the head of both reversed.
pub fn disjoint_tail<'a, T: Named>(
    source: &[Option<&'a T>],
    target: &[Option<&'a T>],
) -> Result<Vec<&'a T>, AlignmentError> {
    let source: Vec<_> = source.iter().rev().copied().collect();
    let target: Vec<_> = target.iter().rev().copied().collect();
    let mut tail = disjoint_head(&source, &target)?;
    tail.reverse();
    Ok(tail)
}

/// The leading run of `source` whose names also occur in `target`, which must appear there
/// as one contiguous, identically ordered block.
pub fn overlap_tail<'a, T: Named>(
    source: &[Option<&'a T>],
    target: &[Option<&'a T>],
) -> Result<Vec<&'a T>, AlignmentError> {
    let source = consecutive(source)?;
    let target = consecutive(target)?;
    if source.is_empty() || target.is_empty() {
        return Ok(Vec::new());
    }
    check_unique(&source)?;
    check_unique(&target)?;

    let target_names: HashSet<&str> = target.iter().map(|item| item.name()).collect();
    let overlap: Vec<&'a T> = source
        .iter()
        .take_while(|item| target_names.contains(item.name()))
        .copied()
        .collect();
    let Some(first) = overlap.first() else {
        return Ok(overlap);
    };

    let matched = find_name(&target, first.name())
        .and_then(|index| target.get(index..index + overlap.len()))
        .is_some_and(|block| same_names(block, &overlap));
    if !matched {
        return Err(AlignmentError::OverlapMismatch {
            name: first.name().to_owned(),
        });
    }
    Ok(overlap)
}

/// A chain with the unmarked elements folded away.
#[derive(Debug)]
pub struct Squashed<'a, T> {
    /// Marked elements, in order.
    pub kept: Vec<&'a T>,
    /// Unmarked elements absorbed by the next marked one, keyed by its name.
    pub intermediates: BTreeMap<String, Vec<&'a T>>,
    /// Unmarked elements after the last marked one.
    pub trailing: Vec<&'a T>,
}

/// Fold every element not satisfying `is_marked` into the next element that does.
pub fn squash<'a, T: Named>(items: &[&'a T], is_marked: impl Fn(&T) -> bool) -> Squashed<'a, T> {
    let mut squashed = Squashed {
        kept: Vec::new(),
        intermediates: BTreeMap::new(),
        trailing: Vec::new(),
    };
    for item in items {
        if is_marked(item) {
            let absorbed = std::mem::take(&mut squashed.trailing);
            if !absorbed.is_empty() {
                squashed.intermediates.insert(item.name().to_owned(), absorbed);
            }
            squashed.kept.push(*item);
        } else {
            squashed.trailing.push(*item);
        }
    }
    squashed
}

fn find_name<T: Named>(items: &[&T], name: &str) -> Option<usize> {
    items.iter().position(|item| item.name() == name)
}

fn same_names<T: Named>(left: &[&T], right: &[&T]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l.name() == r.name())
}

fn pad_front<'a, T>(items: &[&'a T], padding: usize) -> Vec<Option<&'a T>> {
    std::iter::repeat(None)
        .take(padding)
        .chain(items.iter().map(|item| Some(*item)))
        .collect()
}

/// Strip absent placeholders from both ends; anything absent in between is an error.
fn consecutive<'a, T>(items: &[Option<&'a T>]) -> Result<Vec<&'a T>, AlignmentError> {
    let start = items.iter().position(Option::is_some).unwrap_or(items.len());
    let end = items.iter().rposition(Option::is_some).map_or(start, |i| i + 1);
    items
        .get(start..end)
        .unwrap_or_default()
        .iter()
        .map(|item| item.ok_or(AlignmentError::NotConsecutive))
        .collect()
}

fn check_unique<T: Named>(items: &[&T]) -> Result<(), AlignmentError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.name()) {
            return Err(AlignmentError::DuplicateName {
                name: item.name().to_owned(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct S(&'static str, bool);
    impl Named for S {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn chain(names: &[&'static str]) -> Vec<S> {
        names.iter().map(|n| S(n, true)).collect()
    }
    fn refs(items: &[S]) -> Vec<&S> {
        items.iter().collect()
    }
    fn present(items: &[S]) -> Vec<Option<&S>> {
        items.iter().map(Some).collect()
    }
    fn names(items: &[&S]) -> Vec<&'static str> {
        items.iter().map(|s| s.0).collect()
    }

    #[test]
    fn align_empty_and_one_sided() {
        let a = chain(&["s1", "s2"]);

        assert!(align::<S>(&[], &[]).unwrap().is_empty());
        let merged = align(&refs(&a), &[]).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|item| item.b().is_none()));
        let merged = align(&[], &refs(&a)).unwrap();
        assert!(merged.iter().all(|item| item.a().is_none()));
    }

    #[test]
    fn align_pads_both_ends() {
        let a = chain(&["s1", "s2", "s3"]);
        let b = chain(&["s2", "s3", "s4", "s5"]);
        let merged = align(&refs(&a), &refs(&b)).unwrap();

        assert_eq!(merged.len(), 5);
        assert!(merged[0].a().is_some() && merged[0].b().is_none());
        assert!(merged[1].complete() && merged[2].complete());
        assert!(merged[3].a().is_none() && merged[4].a().is_none());
        for item in merged.iter().filter(|item| item.complete()) {
            assert_eq!(item.a().map(|s| s.0), item.b().map(|s| s.0));
        }
    }

    #[test]
    fn align_rejects_disjoint_chains() {
        let a = chain(&["s1", "s2"]);
        let b = chain(&["s3", "s4"]);

        assert!(matches!(
            align(&refs(&a), &refs(&b)),
            Err(AlignmentError::NoOverlap { .. })
        ));
    }

    #[test]
    fn align_rejects_missing_middle_element() {
        let a = chain(&["s1", "s2", "s3"]);
        let b = chain(&["s1", "s3"]);

        assert!(matches!(
            align(&refs(&a), &refs(&b)),
            Err(AlignmentError::NameMismatch { .. })
        ));
    }

    #[test]
    fn align_rejects_duplicates() {
        let a = chain(&["s1", "s1"]);
        let b = chain(&["s1"]);

        assert!(matches!(
            align(&refs(&a), &refs(&b)),
            Err(AlignmentError::DuplicateName { .. })
        ));
    }

    #[test]
    fn single_run_check_detects_gaps() {
        let s = chain(&["s1", "s2", "s3"]);
        let ok = [None, Some(&s[0]), Some(&s[1]), None];
        let gapped = [Some(&s[0]), None, Some(&s[1]), None, Some(&s[2])];

        assert!(check_single_run(&ok).is_ok());
        assert_eq!(
            check_single_run(&gapped),
            Err(AlignmentError::Gap {
                after: "s1".to_owned()
            })
        );
    }

    #[test]
    fn disjoint_head_of_longer_source() {
        let a = chain(&["s1", "s2", "s3"]);
        let b = chain(&["s1"]);

        let head = disjoint_head(&present(&a), &present(&b)).unwrap();
        assert_eq!(names(&head), vec!["s2", "s3"]);
    }

    #[test]
    fn disjoint_head_against_empty_target_is_everything() {
        let a = chain(&["s1", "s2"]);

        let head = disjoint_head(&present(&a), &[]).unwrap();
        assert_eq!(names(&head), vec!["s1", "s2"]);
    }

    #[test]
    fn disjoint_head_ignores_padding() {
        let a = chain(&["s1", "s2", "s3"]);
        let b = chain(&["s0", "s1", "s2"]);
        let source = [None, Some(&a[0]), Some(&a[1]), Some(&a[2])];
        let target = [Some(&b[0]), Some(&b[1]), Some(&b[2]), None];

        let head = disjoint_head(&source, &target).unwrap();
        assert_eq!(names(&head), vec!["s3"]);
    }

    #[test]
    fn disjoint_head_requires_anchor() {
        let a = chain(&["s1", "s2"]);
        let b = chain(&["s9"]);

        assert!(matches!(
            disjoint_head(&present(&a), &present(&b)),
            Err(AlignmentError::MissingAnchor { .. })
        ));
    }

    #[test]
    fn disjoint_head_rejects_unclean_match() {
        let a = chain(&["s1", "s2", "s3"]);
        let b = chain(&["s2", "s1", "s3"]);

        assert!(matches!(
            disjoint_head(&present(&a), &present(&b)),
            Err(AlignmentError::HeadMismatch { .. })
        ));
    }

    #[test]
    fn disjoint_head_rejects_inner_gap() {
        let a = chain(&["s1", "s2", "s3"]);
        let source = [Some(&a[0]), None, Some(&a[2])];

        assert_eq!(
            disjoint_head(&source, &[]),
            Err(AlignmentError::NotConsecutive)
        );
    }

    #[test]
    fn disjoint_tail_is_backlog() {
        let target = chain(&["s1", "s2", "s3", "s4", "s5"]);
        let source = chain(&["s4", "s5", "s6"]);

        let tail = disjoint_tail(&present(&target), &present(&source)).unwrap();
        assert_eq!(names(&tail), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn overlap_tail_of_shorter_source() {
        let a = chain(&["s1", "s2"]);
        let b = chain(&["s1", "s2", "s3"]);

        let overlap = overlap_tail(&present(&a), &present(&b)).unwrap();
        assert_eq!(names(&overlap), vec!["s1", "s2"]);
    }

    #[test]
    fn overlap_tail_stops_at_first_unknown() {
        let a = chain(&["s4", "s5", "s6"]);
        let b = chain(&["s1", "s2", "s3", "s4", "s5"]);

        let overlap = overlap_tail(&present(&a), &present(&b)).unwrap();
        assert_eq!(names(&overlap), vec!["s4", "s5"]);
    }

    #[test]
    fn overlap_tail_requires_contiguous_block() {
        let a = chain(&["s1", "s3"]);
        let b = chain(&["s1", "s2", "s3"]);

        assert!(matches!(
            overlap_tail(&present(&a), &present(&b)),
            Err(AlignmentError::OverlapMismatch { .. })
        ));
    }

    #[test]
    fn overlap_tail_is_empty_without_common_start() {
        let a = chain(&["s0", "s1"]);
        let b = chain(&["s1"]);

        assert!(overlap_tail(&present(&a), &present(&b)).unwrap().is_empty());
        assert!(overlap_tail(&present(&a), &[]).unwrap().is_empty());
    }

    #[test]
    fn squash_folds_unmarked_into_next_marked() {
        let items = vec![
            S("auto1", false),
            S("b1", true),
            S("auto2", false),
            S("auto3", false),
            S("b2", true),
            S("auto4", false),
        ];
        let squashed = squash(&refs(&items), |s| s.1);

        assert_eq!(names(&squashed.kept), vec!["b1", "b2"]);
        assert_eq!(names(&squashed.intermediates["b1"]), vec!["auto1"]);
        assert_eq!(names(&squashed.intermediates["b2"]), vec!["auto2", "auto3"]);
        assert_eq!(names(&squashed.trailing), vec!["auto4"]);
    }
}

//! Diff computation between the authoritative contests and the mirror.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::{ContestId, ContestSet, Entry, EntryId};

/// Add/remove operations that bring the mirror in line with the source.
///
/// Comparison is by key existence only. A contest or entry present on both
/// sides is left alone even if its fields differ.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffPlan {
    /// Contests missing from the mirror, written whole.
    pub contests_to_add: ContestSet,
    /// Mirrored contests the source no longer has.
    pub contests_to_remove: BTreeSet<ContestId>,
    /// New entries of contests present on both sides, in entry-id order.
    pub entries_to_add: BTreeMap<ContestId, Vec<Entry>>,
    /// Mirrored entries the source no longer has, in entry-id order.
    pub entries_to_remove: BTreeMap<ContestId, Vec<EntryId>>,
}

/// Operation counts of a [`DiffPlan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub contests_added: usize,
    pub contests_removed: usize,
    pub entries_added: usize,
    pub entries_removed: usize,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.contests_added + self.contests_removed + self.entries_added + self.entries_removed
    }
}

impl DiffPlan {
    pub fn is_empty(&self) -> bool {
        self.contests_to_add.is_empty()
            && self.contests_to_remove.is_empty()
            && self.entries_to_add.is_empty()
            && self.entries_to_remove.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            contests_added: self.contests_to_add.len(),
            contests_removed: self.contests_to_remove.len(),
            entries_added: self.entries_to_add.values().map(Vec::len).sum(),
            entries_removed: self.entries_to_remove.values().map(Vec::len).sum(),
        }
    }

    /// Number of mirror writes applying this plan takes.
    pub fn operation_count(&self) -> usize {
        self.summary().total()
    }
}

/// Compute the plan that makes `mirrored` match `authoritative`.
///
/// Pure and deterministic: both inputs are key-ordered maps, so the result
/// does not depend on how either set was built.
pub fn reconcile(authoritative: &ContestSet, mirrored: &ContestSet) -> DiffPlan {
    let mut plan = DiffPlan::default();

    for (contest_id, contest) in authoritative {
        let Some(mirrored_contest) = mirrored.get(contest_id) else {
            plan.contests_to_add.insert(contest_id.clone(), contest.clone());
            continue;
        };

        let new_entries: Vec<Entry> = contest
            .entries
            .iter()
            .filter(|(entry_id, _)| !mirrored_contest.entries.contains_key(*entry_id))
            .map(|(_, entry)| entry.clone())
            .collect();
        if !new_entries.is_empty() {
            plan.entries_to_add.insert(contest_id.clone(), new_entries);
        }
    }

    for (contest_id, mirrored_contest) in mirrored {
        let Some(contest) = authoritative.get(contest_id) else {
            plan.contests_to_remove.insert(contest_id.clone());
            continue;
        };

        let stale: Vec<EntryId> = mirrored_contest
            .entries
            .keys()
            .filter(|entry_id| !contest.entries.contains_key(*entry_id))
            .cloned()
            .collect();
        if !stale.is_empty() {
            plan.entries_to_remove.insert(contest_id.clone(), stale);
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Contest;

    fn contest(id: &str, entries: &[&str]) -> (ContestId, Contest) {
        let contest = entries
            .iter()
            .fold(Contest::new(id, format!("Contest {id}")), |c, e| {
                c.with_entry(Entry::new(*e))
            });
        (ContestId::from(id), contest)
    }

    fn set(contests: &[(&str, &[&str])]) -> ContestSet {
        contests.iter().map(|(id, entries)| contest(id, entries)).collect()
    }

    #[test]
    fn new_contest_is_added_whole() {
        let a = set(&[("c1", &["e1", "e2"])]);
        let plan = reconcile(&a, &ContestSet::new());

        assert_eq!(plan.contests_to_add, a);
        assert!(plan.contests_to_remove.is_empty());
        assert!(plan.entries_to_add.is_empty());
        assert!(plan.entries_to_remove.is_empty());
    }

    #[test]
    fn stale_entry_is_removed() {
        let a = set(&[("c1", &["e1"])]);
        let m = set(&[("c1", &["e1", "e2"])]);
        let plan = reconcile(&a, &m);

        assert_eq!(
            plan.entries_to_remove,
            BTreeMap::from([(ContestId::from("c1"), vec![EntryId::from("e2")])])
        );
        assert!(plan.contests_to_add.is_empty());
        assert!(plan.contests_to_remove.is_empty());
        assert!(plan.entries_to_add.is_empty());
    }

    #[test]
    fn mixed_changes() {
        let a = set(&[("c1", &["e1", "e3"]), ("c3", &[])]);
        let m = set(&[("c1", &["e1", "e2"]), ("c2", &["x"])]);
        let plan = reconcile(&a, &m);

        assert_eq!(
            plan.contests_to_add.keys().cloned().collect::<Vec<_>>(),
            vec![ContestId::from("c3")]
        );
        assert_eq!(plan.contests_to_remove, BTreeSet::from([ContestId::from("c2")]));
        let added: Vec<_> = plan.entries_to_add[&ContestId::from("c1")]
            .iter()
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(added, vec![EntryId::from("e3")]);
        assert_eq!(
            plan.entries_to_remove[&ContestId::from("c1")],
            vec![EntryId::from("e2")]
        );
        assert_eq!(
            plan.summary(),
            PlanSummary {
                contests_added: 1,
                contests_removed: 1,
                entries_added: 1,
                entries_removed: 1,
            }
        );
        assert_eq!(plan.operation_count(), 4);
    }

    #[test]
    fn changed_fields_are_not_detected() {
        let a = set(&[("c1", &["e1"])]);
        let mut m = a.clone();
        if let Some(c) = m.get_mut(&ContestId::from("c1")) {
            c.name = "Renamed upstream".into();
            c.entries
                .get_mut(&EntryId::from("e1"))
                .unwrap()
                .scores
                .rubric
                .number_of_judges = 4;
        }
        assert!(reconcile(&a, &m).is_empty());
    }

    #[test]
    fn plan_serializes_with_camel_case_groups() {
        let plan = reconcile(&set(&[("c1", &[])]), &set(&[("c2", &[])]));
        let value = serde_json::to_value(&plan).unwrap();
        assert!(value["contestsToAdd"]["c1"].is_object());
        assert_eq!(value["contestsToRemove"], serde_json::json!(["c2"]));
    }
}

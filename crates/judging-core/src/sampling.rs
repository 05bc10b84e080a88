//! Random entry sampling for judging sessions.

use judging_state::MirrorStore;
use rand::seq::IteratorRandom;
use rand::Rng;

use crate::domain::{Contest, ContestId, Entry};
use crate::mirror::{load_contest, paths, MirrorError};

/// Pick `min(n, entries)` distinct entries of `contest` uniformly at random.
pub fn sample_entries<R: Rng + ?Sized>(contest: &Contest, n: usize, rng: &mut R) -> Vec<Entry> {
    contest
        .entries
        .values()
        .choose_multiple(rng, n)
        .into_iter()
        .cloned()
        .collect()
}

/// Load a mirrored contest and sample `n` of its entries.
pub async fn sample_entries_from_store(
    store: &dyn MirrorStore,
    contest: &ContestId,
    n: usize,
) -> Result<Vec<Entry>, MirrorError> {
    let loaded = load_contest(store, contest)
        .await?
        .ok_or_else(|| MirrorError::NotFound {
            path: paths::contest(contest)
                .map(|p| p.to_string())
                .unwrap_or_else(|_| contest.to_string()),
        })?;
    Ok(sample_entries(&loaded, n, &mut rand::thread_rng()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryId;
    use judging_state::fakes::MemoryMirrorStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn contest_with(n: usize) -> Contest {
        (0..n).fold(Contest::new("c1", "Sample"), |c, i| {
            c.with_entry(Entry::new(format!("e{i}")))
        })
    }

    #[test]
    fn picks_distinct_entries() {
        let contest = contest_with(10);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let picked = sample_entries(&contest, 4, &mut rng);
            let ids: BTreeSet<EntryId> = picked.iter().map(|e| e.id.clone()).collect();
            assert_eq!(picked.len(), 4);
            assert_eq!(ids.len(), 4);
            assert!(ids.iter().all(|id| contest.entries.contains_key(id)));
        }
    }

    #[test]
    fn asking_for_more_than_exist_returns_all() {
        let contest = contest_with(3);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_entries(&contest, 10, &mut rng).len(), 3);
        assert!(sample_entries(&contest, 0, &mut rng).is_empty());
    }

    #[test]
    fn every_entry_can_be_picked() {
        let contest = contest_with(5);
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = BTreeSet::new();
        for _ in 0..200 {
            for entry in sample_entries(&contest, 1, &mut rng) {
                seen.insert(entry.id);
            }
        }
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn samples_from_mirror() {
        let store = MemoryMirrorStore::with_tree(json!({
            "contests": {"c1": {"entries": {"a": {}, "b": {}, "c": {}}}}
        }));

        let picked = sample_entries_from_store(&store, &ContestId::from("c1"), 2)
            .await
            .unwrap();
        assert_eq!(picked.len(), 2);

        let missing = sample_entries_from_store(&store, &ContestId::from("nope"), 2).await;
        assert_eq!(
            missing.unwrap_err(),
            MirrorError::NotFound {
                path: "contests/nope".into()
            }
        );
    }
}

//! Contest and entry snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{ContestId, EntryId};
use super::rubric::RubricScore;

/// All contests keyed by id.
pub type ContestSet = BTreeMap<ContestId, Contest>;

/// A contest as held by the upstream source and the mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    #[serde(default)]
    pub name: String,
    /// Thumbnail path on the upstream site.
    #[serde(rename = "img", default)]
    pub image_ref: String,
    #[serde(default)]
    pub entries: BTreeMap<EntryId, Entry>,
}

/// One submission to a contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    #[serde(default)]
    pub scores: EntryScores,
    /// Upstream fields the judging core does not interpret (name, author, ...).
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Container for the `scores` object of an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryScores {
    #[serde(default)]
    pub rubric: RubricScore,
}

impl Contest {
    pub fn new(id: impl Into<ContestId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_ref: String::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Add (or replace) an entry keyed by its id.
    pub fn with_entry(mut self, entry: Entry) -> Self {
        self.entries.insert(entry.id.clone(), entry);
        self
    }
}

impl Entry {
    pub fn new(id: impl Into<EntryId>) -> Self {
        Self {
            id: id.into(),
            scores: EntryScores::default(),
            details: Map::new(),
        }
    }
}

/// Decode a stored contest, filling in `id` fields from tree keys when the
/// stored object omits them.
pub fn contest_from_tree(key: &str, mut value: Value) -> serde_json::Result<Contest> {
    if let Value::Object(contest) = &mut value {
        contest
            .entry("id")
            .or_insert_with(|| Value::String(key.to_string()));
        if let Some(Value::Object(entries)) = contest.get_mut("entries") {
            for (entry_key, entry) in entries.iter_mut() {
                if let Value::Object(entry) = entry {
                    entry
                        .entry("id")
                        .or_insert_with(|| Value::String(entry_key.clone()));
                }
            }
        }
    }
    serde_json::from_value(value)
}

/// Decode a stored entry, filling in `id` from the tree key when absent.
pub fn entry_from_tree(key: &str, mut value: Value) -> serde_json::Result<Entry> {
    if let Value::Object(entry) = &mut value {
        entry
            .entry("id")
            .or_insert_with(|| Value::String(key.to_string()));
    }
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upstream_contest_parses_with_defaults() {
        let contest: Contest = serde_json::from_value(json!({
            "id": 5829785948389376u64,
            "name": "Contest: Emoji Maker",
            "img": "/computer-programming/contest-emoji-maker/5829785948389376/5668600916475904.png",
            "entries": {"101": {"id": 101, "name": "Smiley", "author": "kaid_1"}}
        }))
        .unwrap();

        assert_eq!(contest.id.as_str(), "5829785948389376");
        let entry = &contest.entries[&EntryId::from("101")];
        assert_eq!(entry.scores.rubric, RubricScore::default());
        assert_eq!(entry.details["author"], json!("kaid_1"));
    }

    #[test]
    fn entry_details_survive_round_trip() {
        let raw = json!({"id": "e1", "name": "Smiley", "scores": {"rubric": {"NumberOfJudges": 0}}});
        let entry: Entry = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["name"], json!("Smiley"));
        assert_eq!(back["scores"]["rubric"]["NumberOfJudges"], json!(0));
    }

    #[test]
    fn tree_decoding_fills_missing_ids() {
        let contest = contest_from_tree("c1", json!({"entries": {"e1": {}}})).unwrap();
        assert_eq!(contest.id.as_str(), "c1");
        assert_eq!(contest.entries[&EntryId::from("e1")].id.as_str(), "e1");

        let entry = entry_from_tree("e7", json!({"name": "x"})).unwrap();
        assert_eq!(entry.id.as_str(), "e7");
    }
}

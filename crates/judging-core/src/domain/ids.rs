//! Identifier newtypes.
//!
//! The upstream contest API emits numeric ids while the mirror keys
//! everything by string, so each id deserializes from either form.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Unsigned(n) => n.to_string(),
            RawId::Signed(n) => n.to_string(),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }
    };
}

string_id!(
    /// Identifier of a contest (upstream program id).
    ContestId
);
string_id!(
    /// Identifier of a contest entry.
    EntryId
);
string_id!(
    /// Identity-provider user id of a judge.
    JudgeId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn numeric_and_string_ids_agree() {
        let a: ContestId = serde_json::from_str("4955067011694592").unwrap();
        let b: ContestId = serde_json::from_str("\"4955067011694592\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"4955067011694592\"");
    }

    #[test]
    fn ids_work_as_map_keys() {
        let map: BTreeMap<EntryId, u32> = serde_json::from_str(r#"{"e2": 2, "e1": 1}"#).unwrap();
        let keys: Vec<&str> = map.keys().map(EntryId::as_str).collect();
        assert_eq!(keys, vec!["e1", "e2"]);
    }
}

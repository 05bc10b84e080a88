//! Rubric scoring model.
//!
//! The stored shape mirrors the realtime tree exactly:
//!
//! ```json
//! {
//!   "Level":      {"rough": 10, "avg": 5},
//!   "Clean_Code": {"rough": 7,  "avg": 3.5},
//!   "Creativity": {"rough": 9,  "avg": 4.5},
//!   "Overall":    {"rough": 8,  "avg": 4},
//!   "NumberOfJudges": 2,
//!   "judgesWhoVoted": ["u1", "u2"]
//! }
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use super::ids::JudgeId;

/// The four fixed rubric criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Criterion {
    Level,
    CleanCode,
    Creativity,
    Overall,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::Level,
        Criterion::CleanCode,
        Criterion::Creativity,
        Criterion::Overall,
    ];

    /// Key used in the stored rubric object.
    pub fn name(self) -> &'static str {
        match self {
            Criterion::Level => "Level",
            Criterion::CleanCode => "Clean_Code",
            Criterion::Creativity => "Creativity",
            Criterion::Overall => "Overall",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Average of `rough` over `judges`.
    ///
    /// NOTE: only `Level` is rounded to an integer (JavaScript `Math.round`,
    /// half rounds up); the other three criteria keep the fractional mean.
    /// Stored data already depends on this asymmetry, so it is kept as is.
    pub fn average(self, rough: i64, judges: u32) -> f64 {
        if judges == 0 {
            return 0.0;
        }
        let mean = rough as f64 / f64::from(judges);
        match self {
            Criterion::Level => (mean + 0.5).floor(),
            Criterion::CleanCode | Criterion::Creativity | Criterion::Overall => mean,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running total and average for one criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    /// Sum of every submitted value.
    #[serde(default)]
    pub rough: i64,
    /// `rough / NumberOfJudges` (see [`Criterion::average`]).
    #[serde(default, serialize_with = "serialize_avg")]
    pub avg: f64,
}

/// Whole averages are stored as integers (`5`, not `5.0`).
fn serialize_avg<S: Serializer>(avg: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if avg.fract() == 0.0 && avg.abs() <= MAX_EXACT {
        serializer.serialize_i64(*avg as i64)
    } else {
        serializer.serialize_f64(*avg)
    }
}

/// Aggregate rubric for one entry (`scores.rubric`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricScore {
    #[serde(rename = "Level", default)]
    pub level: RubricCriterion,
    #[serde(rename = "Clean_Code", default)]
    pub clean_code: RubricCriterion,
    #[serde(rename = "Creativity", default)]
    pub creativity: RubricCriterion,
    #[serde(rename = "Overall", default)]
    pub overall: RubricCriterion,
    #[serde(rename = "NumberOfJudges", default)]
    pub number_of_judges: u32,
    #[serde(rename = "judgesWhoVoted", default)]
    pub judges_who_voted: BTreeSet<JudgeId>,
}

/// One judge's submission. Unknown criteria are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncomingScores {
    #[serde(rename = "Level")]
    pub level: i64,
    #[serde(rename = "Clean_Code")]
    pub clean_code: i64,
    #[serde(rename = "Creativity")]
    pub creativity: i64,
    #[serde(rename = "Overall")]
    pub overall: i64,
}

impl IncomingScores {
    pub fn get(&self, criterion: Criterion) -> i64 {
        match criterion {
            Criterion::Level => self.level,
            Criterion::CleanCode => self.clean_code,
            Criterion::Creativity => self.creativity,
            Criterion::Overall => self.overall,
        }
    }
}

/// Bounds for one criterion, stored under `rubrics/<criterion>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl RubricDefinition {
    /// Describe why `value` is out of bounds, or `None` if it is accepted.
    pub fn violation(&self, value: i64) -> Option<String> {
        if let Some(min) = self.min {
            if value < min {
                return Some(format!("below minimum {min}"));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Some(format!("above maximum {max}"));
            }
        }
        None
    }
}

/// Why a vote could not be folded into a rubric.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FoldError {
    #[error("judge has already voted")]
    AlreadyVoted,

    #[error("{criterion} total overflowed")]
    Overflow { criterion: Criterion },
}

impl RubricScore {
    pub fn criterion(&self, criterion: Criterion) -> &RubricCriterion {
        match criterion {
            Criterion::Level => &self.level,
            Criterion::CleanCode => &self.clean_code,
            Criterion::Creativity => &self.creativity,
            Criterion::Overall => &self.overall,
        }
    }

    fn criterion_mut(&mut self, criterion: Criterion) -> &mut RubricCriterion {
        match criterion {
            Criterion::Level => &mut self.level,
            Criterion::CleanCode => &mut self.clean_code,
            Criterion::Creativity => &mut self.creativity,
            Criterion::Overall => &mut self.overall,
        }
    }

    pub fn has_voted(&self, judge: &JudgeId) -> bool {
        self.judges_who_voted.contains(judge)
    }

    /// `NumberOfJudges == |judgesWhoVoted|`.
    pub fn is_consistent(&self) -> bool {
        usize::try_from(self.number_of_judges).ok() == Some(self.judges_who_voted.len())
    }

    /// Fold one judge's scores into a new rubric. `self` is left untouched.
    pub fn with_vote(
        &self,
        judge: &JudgeId,
        incoming: &IncomingScores,
    ) -> Result<RubricScore, FoldError> {
        if self.has_voted(judge) {
            return Err(FoldError::AlreadyVoted);
        }

        let judges = self
            .number_of_judges
            .checked_add(1)
            .ok_or(FoldError::Overflow {
                criterion: Criterion::Level,
            })?;

        let mut next = self.clone();
        next.number_of_judges = judges;
        for criterion in Criterion::ALL {
            let slot = next.criterion_mut(criterion);
            slot.rough = slot
                .rough
                .checked_add(incoming.get(criterion))
                .ok_or(FoldError::Overflow { criterion })?;
            slot.avg = criterion.average(slot.rough, judges);
        }

        next.judges_who_voted.insert(judge.clone());
        Ok(next)
    }
}

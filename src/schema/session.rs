use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::content::{BlockId, CategoryId};
use super::sport::{Goal, Sport};

/// What the caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub training_type: Sport,
    pub goal: Goal,
    /// Minutes to aim for instead of the configured target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<f64>,
}

impl GenerationRequest {
    pub fn new(training_type: Sport, goal: Goal) -> Self {
        Self {
            training_type,
            goal,
            target_duration: None,
        }
    }

    pub fn with_target(mut self, minutes: f64) -> Self {
        self.target_duration = Some(minutes);
        self
    }
}

/// How close the final duration landed to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeClass {
    Perfect,
    Acceptable,
    TooShort,
    TooLong,
}

impl TimeClass {
    pub fn is_within_tolerance(&self) -> bool {
        matches!(self, Self::Perfect | Self::Acceptable)
    }
}

/// Classification plus the signed delta from the target, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeStatus {
    pub classification: TimeClass,
    pub delta: f64,
}

impl fmt::Display for TimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.classification {
            TimeClass::Perfect => "Perfect",
            TimeClass::Acceptable => "Acceptable",
            TimeClass::TooShort => "Too short",
            TimeClass::TooLong => "Too long",
        };
        write!(f, "{label} ({:+.1}min)", self.delta)
    }
}

/// Counts of what the sport strategy inserted or changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SportAdditions {
    pub surprise_rounds_added: u32,
    pub vinyasa_transitions_added: u32,
    pub max_challenge_added: bool,
    pub max_challenge_moved_last: bool,
    pub difficulty_reordered: bool,
}

impl SportAdditions {
    /// One-line human summary, e.g. for logs and tool output.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.surprise_rounds_added > 0 {
            parts.push(format!("{} surprise rounds added", self.surprise_rounds_added));
        }
        if self.vinyasa_transitions_added > 0 {
            parts.push(format!(
                "{} vinyasa transitions added",
                self.vinyasa_transitions_added
            ));
        }
        if self.max_challenge_added {
            parts.push("MAX challenge added at end".to_string());
        }
        if self.max_challenge_moved_last {
            parts.push("MAX challenge placed at end".to_string());
        }
        if self.difficulty_reordered {
            parts.push("difficulty progression applied".to_string());
        }
        if parts.is_empty() {
            "standard generation".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Kind of a fatal error or non-fatal notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TemplateNotFound,
    InsufficientContent,
    PoolExhausted,
    TimingUnresolved,
    RepositoryUnavailable,
    Configuration,
    InvalidRequest,
}

/// A non-fatal condition recorded on a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: ErrorKind,
    pub detail: String,
}

/// Summary of one entry in the compiled script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub block_id: BlockId,
    pub title: String,
    /// Template position of the section the entry was compiled under.
    pub section: u32,
    pub category_id: CategoryId,
    pub category: String,
    pub duration: f64,
    pub is_sport_addition: bool,
}

/// The engine's output for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub title: String,
    pub training_type: Sport,
    pub goal: Goal,
    pub total_duration: f64,
    pub time_status: TimeStatus,
    pub sport_specific_additions: SportAdditions,
    pub compiled_script: String,
    pub used_block_ids: Vec<BlockId>,
    pub pool_exhausted: bool,
    pub entries: Vec<ScriptEntry>,
    #[serde(default)]
    pub notices: Vec<Notice>,
}

impl GenerationResult {
    pub fn has_notice(&self, kind: ErrorKind) -> bool {
        self.notices.iter().any(|n| n.kind == kind)
    }
}

/// Newtype wrapper for session IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Append-only record of one successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSession {
    pub id: SessionId,
    pub request: GenerationRequest,
    pub result: GenerationResult,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn additions_summary() {
        assert_eq!(SportAdditions::default().summary(), "standard generation");
        let additions = SportAdditions {
            surprise_rounds_added: 2,
            difficulty_reordered: true,
            ..SportAdditions::default()
        };
        assert_eq!(
            additions.summary(),
            "2 surprise rounds added; difficulty progression applied"
        );
    }

    #[test]
    fn time_status_display() {
        let status = TimeStatus {
            classification: TimeClass::TooShort,
            delta: -7.3,
        };
        assert_eq!(status.to_string(), "Too short (-7.3min)");
        assert!(!status.classification.is_within_tolerance());
    }

    #[test]
    fn request_serializes_with_wire_names() {
        let json =
            serde_json::to_string(&GenerationRequest::new(Sport::PowerYoga, Goal::Allround))
                .unwrap();
        assert_eq!(json, r#"{"training_type":"power_yoga","goal":"allround"}"#);

        let custom: GenerationRequest = serde_json::from_str(
            r#"{"training_type":"kickboxing","goal":"endurance","target_duration":45.0}"#,
        )
        .unwrap();
        assert_eq!(
            custom,
            GenerationRequest::new(Sport::Kickboxing, Goal::Endurance).with_target(45.0)
        );
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}

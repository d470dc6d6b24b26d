//! Data models for Horizons
//!
//! Defines the synchronized [`Document`] and the [`Task`] records it carries.
//!
//! Field names follow the camelCase wire format shared with every storage
//! provider. Unknown fields are preserved in `extra` so a document written by
//! a newer client survives a round trip through an older one.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

/// Version string written into every saved document (informational only)
pub const DOCUMENT_VERSION: &str = "2.1.0";

/// Current wall-clock time as an ISO-8601 stamp (`2024-05-01T10:00:00.000Z`)
pub fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 stamp, returning `None` for anything unparseable
pub fn parse_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(stamp.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// Tasks arrive from other clients and older versions, so decoding them never
// fails: a field of the wrong shape falls back to its default.

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

fn lenient_repeat<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_else(default_repeat))
}

/// Task list; entries that are not objects are dropped
fn lenient_tasks<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Task>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| {
            if !item.is_object() {
                warn!("Dropping task entry that is not an object: {}", item);
                return None;
            }
            serde_json::from_value(item).ok()
        })
        .collect())
}

/// Display bucket for a task
///
/// Values this client does not know are kept as [`Horizon::Other`] and
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Horizon {
    Hours,
    #[default]
    Days,
    Weeks,
    Months,
    Years,
    Life,
    Other(String),
}

impl Horizon {
    pub const ALL: [Horizon; 6] = [
        Horizon::Hours,
        Horizon::Days,
        Horizon::Weeks,
        Horizon::Months,
        Horizon::Years,
        Horizon::Life,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Horizon::Hours => "hours",
            Horizon::Days => "days",
            Horizon::Weeks => "weeks",
            Horizon::Months => "months",
            Horizon::Years => "years",
            Horizon::Life => "life",
            Horizon::Other(other) => other,
        }
    }

    fn known(s: &str) -> Option<Horizon> {
        Horizon::ALL
            .into_iter()
            .find(|h| h.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Horizon::known(s).ok_or_else(|| {
            format!(
                "Unknown horizon '{}'. Valid: hours, days, weeks, months, years, life",
                s
            )
        })
    }
}

impl Serialize for Horizon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Horizon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Horizon::known(&s).unwrap_or(Horizon::Other(s)),
            _ => Horizon::default(),
        })
    }
}

/// Task priority, with unknown values kept as [`Priority::Other`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Other(String),
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Other(other) => other,
        }
    }

    fn known(s: &str) -> Option<Priority> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::known(s)
            .ok_or_else(|| format!("Unknown priority '{}'. Valid: low, medium, high", s))
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Priority::known(&s).unwrap_or(Priority::Other(s)),
            _ => Priority::default(),
        })
    }
}

/// Time-of-day / repeat settings attached to a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeSettings {
    /// Calendar date (`YYYY-MM-DD`)
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub end_time: Option<String>,
    /// Repeat rule (`none`, `daily`, `weekly`, ...)
    #[serde(default = "default_repeat", deserialize_with = "lenient_repeat")]
    pub repeat: String,
    #[serde(default, deserialize_with = "lenient")]
    pub weekdays: Vec<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_repeat() -> String {
    "none".to_string()
}

/// A task on one of the horizons
///
/// The sync layer never looks inside tasks; only the enclosing document's
/// `lastSaved` matters for conflict resolution. Any JSON object decodes as
/// a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque unique identifier, stable for the task's lifetime
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default)]
    pub horizon: Horizon,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "lenient")]
    pub completed: bool,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub completed_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub last_modified: Option<String>,
    /// Horizons this task also appears in (presentation only)
    #[serde(default, deserialize_with = "lenient")]
    pub cascades_to: Vec<Horizon>,
    #[serde(default, deserialize_with = "lenient")]
    pub time_settings: Option<TimeSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Create a new task with a fresh id
    pub fn new(title: impl Into<String>, horizon: Horizon) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, horizon)
    }

    /// Create a task with a specific id
    pub fn with_id(id: impl Into<String>, title: impl Into<String>, horizon: Horizon) -> Self {
        let now = now_stamp();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            horizon,
            priority: Priority::default(),
            completed: false,
            completed_at: None,
            created_at: Some(now.clone()),
            last_modified: Some(now),
            cascades_to: Vec::new(),
            time_settings: None,
            extra: Map::new(),
        }
    }

    /// Mark the task completed
    pub fn complete(&mut self) {
        let now = now_stamp();
        self.completed = true;
        self.completed_at = Some(now.clone());
        self.last_modified = Some(now);
    }

    /// Mark the task not completed
    pub fn reopen(&mut self) {
        self.completed = false;
        self.completed_at = None;
        self.touch();
    }

    /// Refresh `lastModified`
    pub fn touch(&mut self) {
        self.last_modified = Some(now_stamp());
    }

    /// Whether the task shows up under `horizon`, directly or by cascade
    pub fn appears_in(&self, horizon: &Horizon) -> bool {
        self.horizon == *horizon || self.cascades_to.contains(horizon)
    }
}

/// The unit of synchronization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, deserialize_with = "lenient_text")]
    pub version: String,
    #[serde(default, deserialize_with = "lenient_tasks")]
    pub tasks: Vec<Task>,
    /// Change-stamp; the only conflict-resolution signal
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_saved: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// A freshly stamped document with no tasks
    pub fn empty() -> Self {
        let now = now_stamp();
        Self {
            version: DOCUMENT_VERSION.to_string(),
            tasks: Vec::new(),
            last_saved: Some(now.clone()),
            created_at: Some(now),
            extra: Map::new(),
        }
    }

    /// A document with no change-stamp at all (never saved)
    pub fn unsaved() -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            tasks: Vec::new(),
            last_saved: None,
            created_at: None,
            extra: Map::new(),
        }
    }

    /// The change-stamp, treating an empty string as absent
    pub fn stamp(&self) -> Option<&str> {
        self.last_saved.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// The change-stamp parsed as a timestamp
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.stamp().and_then(parse_stamp)
    }

    /// Refresh `lastSaved` (and `version`) to the current time
    pub fn touch(&mut self) {
        self.last_saved = Some(now_stamp());
        self.version = DOCUMENT_VERSION.to_string();
    }

    /// Parse a document from an arbitrary JSON value
    ///
    /// Returns `None` for anything that is not a document-shaped object:
    /// it must be an object carrying `tasks` or `lastSaved`. The contents of
    /// individual tasks never make a document malformed.
    pub fn from_value(value: Value) -> Option<Self> {
        let obj = value.as_object()?;
        if !obj.contains_key("tasks") && !obj.contains_key("lastSaved") {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Parse a document from JSON text, `None` when malformed
    pub fn from_json_text(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        serde_json::from_str::<Value>(trimmed)
            .ok()
            .and_then(Self::from_value)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{EffortScore, EffortStatus};

/// Stamped into every blob this writer produces. Blobs written before
/// versioning deserialize with version 0.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Typed view of one `(user, module)` state blob. Field names stay camelCase
/// on the wire because other features read and write the same rows; keys this
/// writer does not own ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffortState {
    pub effort: u8,
    pub emoji: String,
    pub status: EffortStatus,
    pub last_calculated: DateTime<Utc>,
    pub needs_reminder: bool,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn parse_state(raw: &str) -> anyhow::Result<EffortState> {
    serde_json::from_str(raw).context("stored state blob is not a valid effort state")
}

/// Merge a freshly computed score into an existing blob, last-write-wins per
/// top-level key. Keys owned by other writers are preserved verbatim.
pub fn merge_blob(
    existing: Option<&str>,
    score: &EffortScore,
    now: DateTime<Utc>,
) -> anyhow::Result<(String, EffortState)> {
    let mut map = match existing {
        Some(raw) => serde_json::from_str::<Map<String, Value>>(raw)
            .context("existing state blob is not a JSON object")?,
        None => Map::new(),
    };

    map.insert("effort".to_string(), Value::from(score.score));
    map.insert("emoji".to_string(), Value::from(score.status.emoji()));
    map.insert(
        "status".to_string(),
        serde_json::to_value(score.status).context("failed to encode status")?,
    );
    map.insert(
        "lastCalculated".to_string(),
        serde_json::to_value(now).context("failed to encode timestamp")?,
    );
    map.insert(
        "needsReminder".to_string(),
        Value::from(score.status.needs_reminder()),
    );
    map.insert(
        "schemaVersion".to_string(),
        Value::from(STATE_SCHEMA_VERSION),
    );

    let blob = serde_json::to_string(&map).context("failed to encode state blob")?;
    let state = serde_json::from_value(Value::Object(map))
        .context("merged state blob does not parse as an effort state")?;
    Ok((blob, state))
}

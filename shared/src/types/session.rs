use serde::{Deserialize, Deserializer, Serialize};

/// Values persisted for one browser session.
///
/// Email and password are deliberately not stored. `id` is optional on the
/// read side: a record whose `id` is missing or not a string is treated as
/// "no session" rather than as a storage fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default, deserialize_with = "string_or_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub admin: bool,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub created_at: i64,
    /// Unix timestamp (seconds). The record is dead once `now >= expires_at`.
    #[serde(default)]
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One stored bot-state blob plus its concurrency tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotData {
    pub data: Value,
    #[serde(rename = "eTag", default)]
    pub e_tag: String,
}

impl BotData {
    fn empty() -> Self {
        Self {
            data: Value::Null,
            e_tag: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotStateError {
    /// Caller supplied an ETag that no longer matches the stored entry.
    PreconditionFailed,
}

/// In-memory store backing the deprecated `/v3/botstate` surface. Keys are
/// scoped by channel, conversation and user.
pub struct BotStateStore {
    state: DashMap<String, BotData>,
}

impl BotStateStore {
    pub fn new() -> Self {
        Self {
            state: DashMap::new(),
        }
    }

    fn key(channel_id: &str, conversation_id: Option<&str>, user_id: Option<&str>) -> String {
        format!(
            "{}!{}!{}",
            channel_id,
            conversation_id.unwrap_or("*"),
            user_id.unwrap_or("*")
        )
    }

    pub fn get(
        &self,
        channel_id: &str,
        conversation_id: Option<&str>,
        user_id: Option<&str>,
    ) -> BotData {
        self.state
            .get(&Self::key(channel_id, conversation_id, user_id))
            .map(|entry| entry.value().clone())
            .unwrap_or_else(BotData::empty)
    }

    pub fn set(
        &self,
        channel_id: &str,
        conversation_id: Option<&str>,
        user_id: Option<&str>,
        incoming: BotData,
    ) -> Result<BotData, BotStateError> {
        let key = Self::key(channel_id, conversation_id, user_id);

        if let Some(existing) = self.state.get(&key) {
            let stored_tag = &existing.e_tag;
            if stored_tag != "*" && !incoming.e_tag.is_empty() && incoming.e_tag != "*" {
                if incoming.e_tag != *stored_tag {
                    return Err(BotStateError::PreconditionFailed);
                }
            }
        }

        let saved = BotData {
            data: incoming.data,
            e_tag: Uuid::new_v4().to_string(),
        };
        self.state.insert(key, saved.clone());
        Ok(saved)
    }

    /// Remove every entry scoped to the user on the channel, returning the
    /// removed keys.
    pub fn delete_user_data(&self, channel_id: &str, user_id: &str) -> Vec<String> {
        let suffix = format!("!{}", user_id);
        let prefix = format!("{}!", channel_id);
        let doomed: Vec<String> = self
            .state
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix) && entry.key().ends_with(&suffix))
            .map(|entry| entry.key().clone())
            .collect();

        for key in &doomed {
            self.state.remove(key);
        }
        doomed
    }
}

impl Default for BotStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_entries_read_as_null_with_wildcard_tag() {
        let store = BotStateStore::new();
        let data = store.get("emulator", None, Some("user-1"));
        assert!(data.data.is_null());
        assert_eq!(data.e_tag, "*");
    }

    #[test]
    fn etag_precondition_rejects_stale_writes() {
        let store = BotStateStore::new();

        let first = store
            .set(
                "emulator",
                None,
                Some("user-1"),
                BotData {
                    data: json!({"count": 1}),
                    e_tag: "*".into(),
                },
            )
            .unwrap();
        assert_ne!(first.e_tag, "*");

        // Stale tag fails
        let err = store
            .set(
                "emulator",
                None,
                Some("user-1"),
                BotData {
                    data: json!({"count": 2}),
                    e_tag: "not-the-tag".into(),
                },
            )
            .unwrap_err();
        assert_eq!(err, BotStateError::PreconditionFailed);

        // Matching tag succeeds and rotates
        let second = store
            .set(
                "emulator",
                None,
                Some("user-1"),
                BotData {
                    data: json!({"count": 2}),
                    e_tag: first.e_tag.clone(),
                },
            )
            .unwrap();
        assert_ne!(second.e_tag, first.e_tag);
    }

    #[test]
    fn delete_user_data_is_scoped_to_the_user() {
        let store = BotStateStore::new();
        let write = |conv: Option<&str>, user: Option<&str>| {
            store
                .set(
                    "emulator",
                    conv,
                    user,
                    BotData {
                        data: json!({}),
                        e_tag: "*".into(),
                    },
                )
                .unwrap();
        };
        write(None, Some("user-1"));
        write(Some("conv-1"), Some("user-1"));
        write(Some("conv-1"), None);
        write(None, Some("user-2"));

        let removed = store.delete_user_data("emulator", "user-1");
        assert_eq!(removed.len(), 2);
        assert!(store.get("emulator", None, Some("user-1")).data.is_null());
        assert!(!store.get("emulator", None, Some("user-2")).data.is_null());
        assert!(!store.get("emulator", Some("conv-1"), None).data.is_null());
    }
}

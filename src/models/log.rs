use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured per-conversation log entry, streamed to the gateway so an
/// inspector client can render it. Mirrors the tagged-union wire shape the
/// inspector panel expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum LogItem {
    Text { level: LogLevel, text: String },
    ExternalLink { text: String, hyperlink: String },
    OpenAppSettings { text: String },
    InspectableObject { text: String, obj: Value },
    Exception { err: String },
}

impl LogItem {
    pub fn text(level: LogLevel, text: impl Into<String>) -> Self {
        LogItem::Text {
            level,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::text(LogLevel::Error, text)
    }

    pub fn external_link(text: impl Into<String>, hyperlink: impl Into<String>) -> Self {
        LogItem::ExternalLink {
            text: text.into(),
            hyperlink: hyperlink.into(),
        }
    }

    pub fn app_settings(text: impl Into<String>) -> Self {
        LogItem::OpenAppSettings { text: text.into() }
    }
}

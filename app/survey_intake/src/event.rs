use chrono::DateTime;
use chrono::FixedOffset;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::Level;

pub type EventData = Map<String, Value>;

/// One line of the action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<FixedOffset>,
    pub code: String,
    pub description: String,
    pub origin: String,
    #[serde(default)]
    pub data: EventData,
}

impl Event {
    pub fn new(timestamp: DateTime<FixedOffset>, code: &str, description: &str, origin: &str, data: Value) -> Self {
        Self {
            timestamp,
            code: code.to_owned(),
            description: description.to_owned(),
            origin: origin.to_owned(),
            data: into_event_data(data),
        }
    }

    pub fn console_level(&self) -> Level {
        if self.code.starts_with("ERR_") {
            Level::ERROR
        } else if self.code.starts_with("WARN_") {
            Level::WARN
        } else {
            Level::INFO
        }
    }

    /// First non-empty value among `fields`, numbers are rendered as text.
    pub fn user_id(&self, fields: &[String]) -> Option<String> {
        fields.iter().find_map(|field| match self.data.get(field) {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value.trim().to_owned()),
            Some(Value::Number(value)) => Some(value.to_string()),
            _ => None,
        })
    }
}

fn into_event_data(data: Value) -> EventData {
    match data {
        Value::Object(map) => map,
        Value::Null => EventData::new(),
        other => {
            let mut map = EventData::new();
            map.insert("value".to_owned(), other);
            map
        }
    }
}

//! Event data structures and line normalization

use crate::session::Session;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SESSION_ATTRIBUTE: &str = "@session";
pub const NAME_ATTRIBUTE: &str = "@name";

/// One observed line
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub timestamp: String,
    pub attributes: HashMap<String, String>,
    #[serde(rename = "rawstring")]
    pub raw_string: String,
}

/// Events shipped together in one ingest request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventList {
    pub tags: HashMap<String, String>,
    pub events: Vec<Event>,
}

impl Event {
    pub fn new(raw_string: String, attributes: HashMap<String, String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            attributes,
            raw_string,
        }
    }
}

impl EventList {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            tags: HashMap::new(),
            events,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Turn a raw line into an event stamped with the session's identity
pub fn normalize(line: &str, session: &Session) -> Event {
    let attributes = HashMap::from([
        (SESSION_ATTRIBUTE.to_string(), session.id.clone()),
        (NAME_ATTRIBUTE.to_string(), session.name.clone()),
    ]);

    Event::new(line.to_string(), attributes)
}

/// Current UTC time as RFC3339 with second precision
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn session() -> Session {
        Session {
            id: "s1".to_string(),
            name: "demo".to_string(),
            server_url: "http://localhost/".to_string(),
            dataspace_id: "scratch".to_string(),
            auth_token: "token".to_string(),
        }
    }

    #[test]
    fn test_normalize_keeps_line_and_session() {
        let event = normalize("GET /index.html 200", &session());

        assert_eq!(event.raw_string, "GET /index.html 200");
        assert_eq!(event.attributes.len(), 2);
        assert_eq!(event.attributes[SESSION_ATTRIBUTE], "s1");
        assert_eq!(event.attributes[NAME_ATTRIBUTE], "demo");
    }

    #[test]
    fn test_normalize_empty_line() {
        let event = normalize("", &session());

        assert_eq!(event.raw_string, "");
        assert_eq!(event.attributes[SESSION_ATTRIBUTE], "s1");
    }

    #[test]
    fn test_normalize_is_idempotent_apart_from_timestamp() {
        let a = normalize("  padded\tline ", &session());
        let b = normalize("  padded\tline ", &session());

        assert_eq!(a.attributes, b.attributes);
        assert_eq!(a.raw_string, b.raw_string);
    }

    #[test]
    fn test_timestamp_is_rfc3339_utc() {
        let event = normalize("x", &session());

        assert!(event.timestamp.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
    }

    #[test]
    fn test_event_list_wire_format() {
        let event = Event {
            timestamp: "2024-01-02T03:04:05Z".to_string(),
            attributes: HashMap::from([("@session".to_string(), "s1".to_string())]),
            raw_string: "hello".to_string(),
        };

        let json = serde_json::to_value([EventList::new(vec![event])]).unwrap();

        assert_eq!(
            json,
            serde_json::json!([{
                "tags": {},
                "events": [{
                    "timestamp": "2024-01-02T03:04:05Z",
                    "attributes": {"@session": "s1"},
                    "rawstring": "hello"
                }]
            }])
        );
    }
}

use serde::{Deserialize, Serialize};

use crate::state::StatusView;

/// Registry transition kind as it appears on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DfAction {
    #[serde(rename = "REGISTER")]
    Register,
    #[serde(rename = "RENEWED")]
    Renewed,
    #[serde(rename = "DEREGISTER")]
    Deregister,
}

/// One registry transition: registration, liveness renewal, or removal.
/// GC-evicted agents produce the same notice as an explicit deregistration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfNotice {
    #[serde(rename = "type")]
    pub action: DfAction,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub when: i64,
}

/// Envelope pushed to dashboard subscribers. Serializes as
/// `{"kind": ..., "payload": ...}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum MonitorEvent {
    /// Full state, sent once to each new subscriber.
    Snapshot(StatusView),
    /// Edge-triggered liveness transition of the main platform endpoint.
    Heartbeat { up: bool, ts: i64 },
    /// Registry transition.
    Df(DfNotice),
}

impl MonitorEvent {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Df(_) => "df",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_envelope_shape() {
        let ev = MonitorEvent::Heartbeat { up: true, ts: 123 };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "heartbeat");
        assert_eq!(json["payload"]["up"], true);
        assert_eq!(json["payload"]["ts"], 123);
    }

    #[test]
    fn df_envelope_shape() {
        let ev = MonitorEvent::Df(DfNotice {
            action: DfAction::Renewed,
            name: "parser".into(),
            class: Some("agents.Parser".into()),
            when: 99,
        });
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "df");
        assert_eq!(json["payload"]["type"], "RENEWED");
        assert_eq!(json["payload"]["name"], "parser");
        assert_eq!(json["payload"]["class"], "agents.Parser");
        assert_eq!(json["payload"]["when"], 99);
    }

    #[test]
    fn df_omits_missing_class() {
        let ev = MonitorEvent::Df(DfNotice {
            action: DfAction::Deregister,
            name: "gone".into(),
            class: None,
            when: 5,
        });
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["payload"]["type"], "DEREGISTER");
        assert!(json["payload"].get("class").is_none());
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let ev = MonitorEvent::Heartbeat { up: false, ts: 0 };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], ev.kind());
    }
}

use serde::{Deserialize, Serialize};

/// A registered platform agent, keyed by its unique name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub name: String,
    pub class: String,
    /// First registration time (ms epoch).
    pub since: i64,
    /// Last liveness signal (ms epoch). Never decreases for a given name.
    #[serde(skip_serializing, default)]
    pub last_seen: i64,
}

/// Read-only projection of the platform state, served on the status
/// endpoint and as the first frame to every new subscriber. Always a
/// copy; the live state stays with the coordinator task.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub hostname: String,
    pub main_host: String,
    pub rmi_port: u16,
    pub http_port: u16,
    pub up: bool,
    pub last_update: Option<i64>,
    /// Sorted by name.
    pub agents: Vec<AgentRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_view_wire_shape() {
        let view = StatusView {
            hostname: "box".into(),
            main_host: "jade-main".into(),
            rmi_port: 1099,
            http_port: 7778,
            up: true,
            last_update: Some(42),
            agents: vec![AgentRecord {
                name: "a1".into(),
                class: "agents.Parser".into(),
                since: 7,
                last_seen: 9,
            }],
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["mainHost"], "jade-main");
        assert_eq!(json["rmiPort"], 1099);
        assert_eq!(json["httpPort"], 7778);
        assert_eq!(json["up"], true);
        assert_eq!(json["lastUpdate"], 42);
        assert_eq!(json["agents"][0]["name"], "a1");
        assert_eq!(json["agents"][0]["since"], 7);
        // last_seen is internal bookkeeping, never on the wire
        assert!(json["agents"][0].get("last_seen").is_none());
        assert!(json["agents"][0].get("lastSeen").is_none());
    }

    #[test]
    fn agent_record_deserializes_without_last_seen() {
        let rec: AgentRecord =
            serde_json::from_str(r#"{"name":"a","class":"?","since":1}"#).unwrap();
        assert_eq!(rec.last_seen, 0);
    }
}

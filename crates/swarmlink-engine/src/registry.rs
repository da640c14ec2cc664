use std::collections::HashMap;

use swarmlink_core::AgentRecord;

/// Outcome of a registration event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterResult {
    /// First time this name was seen.
    Registered,
    /// Known name; treated as a liveness renewal.
    Renewed,
}

/// Registry of known platform agents. Pure data structure: no I/O, no
/// clock of its own. Every mutation is reported back so the coordinator
/// can publish the matching notice.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentRecord>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or renew an agent. `when` is the remote-reported event
    /// time used for `since` on first sight; `now` drives `last_seen`.
    pub fn register(
        &mut self,
        name: &str,
        class: Option<&str>,
        when: Option<i64>,
        now: i64,
    ) -> RegisterResult {
        let class = class.filter(|c| !c.is_empty());
        match self.agents.get_mut(name) {
            Some(record) => {
                if let Some(class) = class {
                    record.class = class.to_string();
                }
                // last_seen is monotonically non-decreasing
                record.last_seen = record.last_seen.max(now);
                RegisterResult::Renewed
            }
            None => {
                self.agents.insert(
                    name.to_string(),
                    AgentRecord {
                        name: name.to_string(),
                        class: class.unwrap_or("?").to_string(),
                        since: when.unwrap_or(now),
                        last_seen: now,
                    },
                );
                RegisterResult::Registered
            }
        }
    }

    /// Remove an agent; returns whether it existed.
    pub fn deregister(&mut self, name: &str) -> bool {
        self.agents.remove(name).is_some()
    }

    /// Evict agents silent for longer than `ttl_ms` and return their
    /// names, sorted. Driven by the coordinator's sweep timer.
    pub fn sweep(&mut self, now: i64, ttl_ms: i64) -> Vec<String> {
        let mut evicted: Vec<String> = self
            .agents
            .values()
            .filter(|a| now - a.last_seen > ttl_ms)
            .map(|a| a.name.clone())
            .collect();
        evicted.sort();
        for name in &evicted {
            self.agents.remove(name);
        }
        evicted
    }

    pub fn get(&self, name: &str) -> Option<&AgentRecord> {
        self.agents.get(name)
    }

    pub fn count(&self) -> usize {
        self.agents.len()
    }

    /// Copies of all records, sorted by name.
    pub fn sorted_records(&self) -> Vec<AgentRecord> {
        let mut records: Vec<AgentRecord> = self.agents.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

//! Health reporting (spec.md §4.5 `health`, §7 "user-visible behavior").

use std::collections::HashMap;

use serde::Serialize;

/// Status of a single collaborator, as assembled by the health loop.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub healthy: bool,
    pub counters: HashMap<String, u64>,
}

impl ComponentHealth {
    pub fn ok() -> Self {
        Self {
            healthy: true,
            counters: HashMap::new(),
        }
    }

    pub fn with_counter(mut self, name: &str, value: u64) -> Self {
        self.counters.insert(name.to_string(), value);
        self
    }

    pub fn degraded_if(mut self, condition: bool) -> Self {
        if condition {
            self.healthy = false;
        }
        self
    }
}

/// A full health snapshot: one entry per collaborator.
#[derive(Debug, Clone, Serialize, Default)]
pub struct HealthReport {
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, health: ComponentHealth) {
        self.components.insert(name.to_string(), health);
    }

    pub fn is_healthy(&self) -> bool {
        self.components.values().all(|c| c.healthy)
    }
}

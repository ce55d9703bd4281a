use crate::observability::AgentMetrics;
use crate::services::ChatAgent;
use std::sync::Arc;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Chat agent owning the turn controller and thread histories
    pub agent: Arc<ChatAgent>,
    /// Agent and HTTP counters
    pub metrics: Arc<AgentMetrics>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("agent", &"Arc<ChatAgent>")
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(agent: ChatAgent, metrics: Arc<AgentMetrics>) -> Self {
        Self {
            agent: Arc::new(agent),
            metrics,
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::connection::TraversalConfig;

/// Configuration for the session controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// STUN/TURN servers handed to every connection attempt
    pub traversal: TraversalConfig,

    /// How many fresh ids a host tries after the first one is rejected
    /// Default: 3
    pub registration_retries: u32,

    /// Consecutive engine restarts without a result before captioning gives up
    /// Default: 5
    pub max_consecutive_restarts: u32,

    /// Capacity of the command queue
    pub command_buffer: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            traversal: TraversalConfig::default(),
            registration_retries: 3,
            max_consecutive_restarts: 5,
            command_buffer: 32,
        }
    }
}

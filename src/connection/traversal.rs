use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// One STUN or TURN endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(url: impl Into<String>, username: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    pub fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|u| u.starts_with("turn:") || u.starts_with("turns:"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportPolicy {
    All,
    RelayOnly,
}

/// Traversal servers handed to the signaling layer when a link is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalConfig {
    #[serde(default = "default_ice_servers", alias = "iceServers")]
    pub ice_servers: Vec<IceServer>,

    #[serde(default = "default_transport_policy", alias = "transportPolicy")]
    pub transport_policy: TransportPolicy,

    #[serde(default, alias = "candidatePoolSize")]
    pub candidate_pool_size: u8,
}

fn default_ice_servers() -> Vec<IceServer> {
    vec![
        IceServer::stun("stun:stun.l.google.com:19302"),
        IceServer::stun("stun:stun1.l.google.com:19302"),
    ]
}

fn default_transport_policy() -> TransportPolicy {
    TransportPolicy::All
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            transport_policy: default_transport_policy(),
            candidate_pool_size: 0,
        }
    }
}

impl TraversalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ice_servers.is_empty() {
            return Err(SessionError::Config("at least one ICE server is required".to_string()));
        }

        for server in &self.ice_servers {
            if server.urls.is_empty() {
                return Err(SessionError::Config("ICE server without urls".to_string()));
            }
            if server.is_turn() && (server.username.is_none() || server.credential.is_none()) {
                return Err(SessionError::Config(format!(
                    "TURN server {} requires username and credential",
                    server.urls[0]
                )));
            }
        }

        if self.transport_policy == TransportPolicy::RelayOnly
            && !self.ice_servers.iter().any(IceServer::is_turn)
        {
            return Err(SessionError::Config(
                "relay-only transport policy needs a TURN server".to_string(),
            ));
        }

        Ok(())
    }

    pub fn turn_count(&self) -> usize {
        self.ice_servers.iter().filter(|s| s.is_turn()).count()
    }
}

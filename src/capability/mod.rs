//! Microphone capability gate
//!
//! The gate is the permission broker that must grant microphone access before
//! any session attempt. A granted request yields an [`AudioSourceHandle`], the
//! exclusive handle to the local audio source for the rest of the session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a permission query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Prompt,
    Unknown,
}

/// Handle to the local audio source.
///
/// Clones share state, so whoever holds a clone observes mute toggles and the
/// final release.
#[derive(Debug, Clone)]
pub struct AudioSourceHandle {
    label: String,
    enabled: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl AudioSourceHandle {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            enabled: Arc::new(AtomicBool::new(true)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip the enabled state of the audio tracks and return the new value.
    pub fn toggle_enabled(&self) -> bool {
        let previous = self.enabled.fetch_xor(true, Ordering::SeqCst);
        !previous
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Stop all tracks. Returns false if they were already stopped.
    pub fn release(&self) -> bool {
        let was_released = self.released.swap(true, Ordering::SeqCst);
        if !was_released {
            info!("Released audio source {}", self.label);
        }
        !was_released
    }
}

/// Result of `request_microphone_access`
#[derive(Debug, Clone)]
pub struct CapabilityGrant {
    pub status: PermissionStatus,
    pub handle: Option<AudioSourceHandle>,
}

impl CapabilityGrant {
    pub fn granted(handle: AudioSourceHandle) -> Self {
        Self {
            status: PermissionStatus::Granted,
            handle: Some(handle),
        }
    }

    pub fn denied() -> Self {
        Self {
            status: PermissionStatus::Denied,
            handle: None,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.status == PermissionStatus::Granted && self.handle.is_some()
    }
}

/// Permission broker for microphone access
#[async_trait]
pub trait CapabilityGate: Send + Sync {
    /// Query the current permission without prompting
    async fn check_microphone(&self) -> PermissionStatus;

    /// Prompt for access and, if granted, open the local audio source
    async fn request_microphone_access(&self) -> CapabilityGrant;
}

/// Gate whose answer is fixed by configuration.
///
/// Real capture lives outside this crate; the gate only decides whether the
/// session may proceed and hands out the source handle.
pub struct ConfiguredCapabilityGate {
    policy: PermissionStatus,
    label: String,
}

impl ConfiguredCapabilityGate {
    pub fn new(policy: PermissionStatus, label: impl Into<String>) -> Self {
        Self {
            policy,
            label: label.into(),
        }
    }
}

#[async_trait]
impl CapabilityGate for ConfiguredCapabilityGate {
    async fn check_microphone(&self) -> PermissionStatus {
        self.policy
    }

    async fn request_microphone_access(&self) -> CapabilityGrant {
        match self.policy {
            PermissionStatus::Granted | PermissionStatus::Prompt => {
                CapabilityGrant::granted(AudioSourceHandle::new(self.label.clone()))
            }
            status => {
                warn!("Microphone permission request failed: {:?}", status);
                CapabilityGrant::denied()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_is_its_own_inverse() {
        let handle = AudioSourceHandle::new("mic");
        let original = handle.is_enabled();

        assert_eq!(handle.toggle_enabled(), !original);
        assert_eq!(handle.toggle_enabled(), original);
        assert_eq!(handle.is_enabled(), original);
    }

    #[test]
    fn test_release_is_idempotent() {
        let handle = AudioSourceHandle::new("mic");
        let observer = handle.clone();

        assert!(handle.release());
        assert!(!handle.release());
        assert!(observer.is_released());
    }

    #[tokio::test]
    async fn test_configured_gate_denied() {
        let gate = ConfiguredCapabilityGate::new(PermissionStatus::Denied, "mic");
        let grant = gate.request_microphone_access().await;

        assert!(!grant.is_granted());
        assert!(grant.handle.is_none());
        assert_eq!(gate.check_microphone().await, PermissionStatus::Denied);
    }

    #[tokio::test]
    async fn test_configured_gate_granted() {
        let gate = ConfiguredCapabilityGate::new(PermissionStatus::Granted, "default-mic");
        let grant = gate.request_microphone_access().await;

        assert!(grant.is_granted());
        assert_eq!(grant.handle.unwrap().label(), "default-mic");
    }
}

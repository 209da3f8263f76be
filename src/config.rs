use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::capability::PermissionStatus;
use crate::connection::TraversalConfig;
use crate::session::ControllerConfig;

/// Default config file, without extension
pub const DEFAULT_CONFIG_PATH: &str = "config/echolink";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub signaling: SignalingConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub capability: CapabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalingConfig {
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "default_presence_timeout_ms")]
    pub presence_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Fresh host ids tried after a rejected registration
    #[serde(default = "default_registration_retries")]
    pub registration_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// Set to false to run without captioning
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_stt_subject")]
    pub stt_subject: String,
    #[serde(default = "default_max_consecutive_restarts")]
    pub max_consecutive_restarts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityConfig {
    #[serde(default = "default_microphone")]
    pub microphone: PermissionStatus,
}

fn default_service_name() -> String {
    "echolink".to_string()
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3030
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_subject_prefix() -> String {
    "echolink".to_string()
}

fn default_presence_timeout_ms() -> u64 {
    1500
}

fn default_registration_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_stt_subject() -> String {
    "stt.text.>".to_string()
}

fn default_max_consecutive_restarts() -> u32 {
    5
}

fn default_microphone() -> PermissionStatus {
    PermissionStatus::Granted
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            subject_prefix: default_subject_prefix(),
            presence_timeout_ms: default_presence_timeout_ms(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            registration_retries: default_registration_retries(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_subject: default_stt_subject(),
            max_consecutive_restarts: default_max_consecutive_restarts(),
        }
    }
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            microphone: default_microphone(),
        }
    }
}

impl SignalingConfig {
    pub fn presence_timeout(&self) -> Duration {
        Duration::from_millis(self.presence_timeout_ms)
    }
}

impl Config {
    /// Load `path` (any format the config crate knows, extension optional),
    /// then apply `ECHOLINK__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ECHOLINK").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        let cfg: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;
        cfg.traversal.validate()?;

        Ok(cfg)
    }

    /// Settings handed to the session controller
    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            traversal: self.traversal.clone(),
            registration_retries: self.session.registration_retries,
            max_consecutive_restarts: self.speech.max_consecutive_restarts,
            ..ControllerConfig::default()
        }
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}

use anyhow::Result;
use echolink::capability::PermissionStatus;
use echolink::connection::TransportPolicy;
use echolink::Config;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> Result<String> {
    let path = dir.path().join("echolink.toml");
    fs::write(&path, body)?;
    Ok(path.to_string_lossy().into_owned())
}

#[test]
fn test_load_full_config() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        r#"
[service]
name = "echolink-test"

[service.http]
bind = "0.0.0.0"
port = 4040

[signaling]
nats_url = "nats://nats.internal:4222"
presence_timeout_ms = 250

[traversal]
transport_policy = "relay-only"
candidate_pool_size = 4

[[traversal.ice_servers]]
urls = ["stun:stun.example.org:3478"]

[[traversal.ice_servers]]
urls = ["turn:turn.example.org:3478"]
username = "echo"
credential = "secret"

[session]
registration_retries = 1

[speech]
enabled = false
max_consecutive_restarts = 2

[capability]
microphone = "denied"
"#,
    )?;

    let cfg = Config::load(&path)?;

    assert_eq!(cfg.service.name, "echolink-test");
    assert_eq!(cfg.http_addr(), "0.0.0.0:4040");
    assert_eq!(cfg.signaling.nats_url, "nats://nats.internal:4222");
    assert_eq!(cfg.signaling.presence_timeout().as_millis(), 250);
    assert_eq!(cfg.traversal.transport_policy, TransportPolicy::RelayOnly);
    assert_eq!(cfg.traversal.candidate_pool_size, 4);
    assert_eq!(cfg.traversal.turn_count(), 1);
    assert!(!cfg.speech.enabled);
    assert_eq!(cfg.capability.microphone, PermissionStatus::Denied);

    let controller = cfg.controller();
    assert_eq!(controller.registration_retries, 1);
    assert_eq!(controller.max_consecutive_restarts, 2);
    assert_eq!(controller.traversal, cfg.traversal);

    Ok(())
}

#[test]
fn test_missing_sections_use_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(&dir, "[service]\nname = \"bare\"\n")?;

    let cfg = Config::load(&path)?;

    assert_eq!(cfg.service.name, "bare");
    assert_eq!(cfg.service.http.port, 3030);
    assert_eq!(cfg.traversal.ice_servers.len(), 2);
    assert_eq!(cfg.traversal.transport_policy, TransportPolicy::All);
    assert_eq!(cfg.session.registration_retries, 3);
    assert_eq!(cfg.speech.stt_subject, "stt.text.>");
    assert_eq!(cfg.capability.microphone, PermissionStatus::Granted);

    Ok(())
}

#[test]
fn test_relay_only_without_turn_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(&dir, "[traversal]\ntransport_policy = \"relay-only\"\n")?;

    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("relay"), "unexpected error: {err}");

    Ok(())
}

#[test]
fn test_turn_without_credentials_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        "[[traversal.ice_servers]]\nurls = [\"turn:turn.example.org:3478\"]\n",
    )?;

    assert!(Config::load(&path).is_err());

    Ok(())
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(&dir, "[signaling]\nsubject_prefix = \"from-file\"\n")?;

    std::env::set_var("ECHOLINK__SIGNALING__SUBJECT_PREFIX", "from-env");
    let cfg = Config::load(&path);
    std::env::remove_var("ECHOLINK__SIGNALING__SUBJECT_PREFIX");

    assert_eq!(cfg?.signaling.subject_prefix, "from-env");

    Ok(())
}

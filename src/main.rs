use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use echolink::config::DEFAULT_CONFIG_PATH;
use echolink::session::ControllerConfig;
use echolink::speech::UnsupportedSpeechEngine;
use echolink::{
    create_router, AppState, CapabilityGate, Config, ConfiguredCapabilityGate, LifecycleState,
    NatsClient, NatsSpeechFactory, NatsTransport, SessionController, SessionHandle,
    SpeechEngineFactory,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "echolink")]
#[command(version)]
#[command(about = "Two-party voice sessions with a shared live transcript", long_about = None)]
struct Cli {
    /// Config file, extension optional
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control API (default)
    Serve,
    /// Open a channel and wait for a guest
    Host,
    /// Join an existing channel
    Join { session_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("EchoLink v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let nats = NatsClient::connect(&cfg.signaling.nats_url).await?;
    let transport = Arc::new(NatsTransport::new(
        nats.clone(),
        cfg.signaling.subject_prefix.clone(),
        cfg.signaling.presence_timeout(),
    ));
    let gate: Arc<dyn CapabilityGate> =
        Arc::new(ConfiguredCapabilityGate::new(cfg.capability.microphone, "default-microphone"));
    let speech: Arc<dyn SpeechEngineFactory> = if cfg.speech.enabled {
        Arc::new(NatsSpeechFactory::new(nats, cfg.speech.stt_subject.clone()))
    } else {
        info!("Captioning disabled by config");
        Arc::new(UnsupportedSpeechEngine)
    };

    let controller_config: ControllerConfig = cfg.controller();
    let (controller, handle) = SessionController::new(controller_config, gate, transport, speech);
    let controller_task = controller.spawn();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cfg, handle).await?,
        Commands::Host => {
            let snapshot = handle.host().await?;
            info!("Status: {}", snapshot.status_message);
            run_headless(handle).await?;
        }
        Commands::Join { session_id } => {
            handle.join(session_id).await?;
            run_headless(handle).await?;
        }
    }

    controller_task.await.context("Session controller panicked")?;
    Ok(())
}

async fn serve(cfg: &Config, handle: SessionHandle) -> Result<()> {
    let addr = cfg.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    let router = create_router(AppState::new(handle.clone()));
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server failed")?;

    handle.abort().await?;
    Ok(())
}

/// Log status and final transcript lines until the call ends or Ctrl-C.
async fn run_headless(handle: SessionHandle) -> Result<()> {
    let mut updates = handle.subscribe();
    let mut last_status = String::new();
    let mut logged_final = 0usize;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();

                if snapshot.status_message != last_status {
                    info!("Status: {}", snapshot.status_message);
                    last_status = snapshot.status_message.clone();
                }
                let finals: Vec<_> = snapshot.transcript.iter().filter(|i| i.is_final).collect();
                for item in finals.iter().skip(logged_final) {
                    info!("[{:?}] {}", item.sender, item.text);
                }
                logged_final = logged_final.max(finals.len());

                match snapshot.lifecycle {
                    LifecycleState::Summarizing => {
                        if let Some(summary) = &snapshot.summary {
                            info!("Call lasted {:.1}s", summary.duration_secs);
                        }
                        handle.acknowledge().await?;
                        break;
                    }
                    LifecycleState::Idle => {
                        if let Some(notice) = &snapshot.notice {
                            warn!("{}", notice);
                        }
                        break;
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, ending session");
                if handle.snapshot().lifecycle == LifecycleState::Active {
                    handle.hangup().await?;
                }
                handle.abort().await?;
                break;
            }
        }
    }

    Ok(())
}

use anyhow::Context;
use speechlink::audio::CpalDevice;
use speechlink::transport::WsConnector;
use speechlink::{Config, LiveSession, Transport, TransportEvent, WireMessage};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    }
    .with_env_overrides();
    config.validate()?;

    let connector = WsConnector::new(config.transport.url.clone());
    tracing::info!("Streaming to {}", connector.url());

    // Named device if configured, otherwise whatever the host picks.
    let device = match &config.capture.device {
        Some(name) => CpalDevice::named(name.clone()),
        None => CpalDevice::new(),
    };
    let (transport, mut events, task) = Transport::spawn(connector, &config.transport);
    let mut session = LiveSession::new(config, transport.clone());

    session
        .start(&device)
        .await
        .context("failed to start streaming")?;
    tracing::info!("Recording. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, stopping");
                break;
            }
            event = events.recv() => match event {
                Some(TransportEvent::Message(WireMessage::Results { recognition, translation })) => {
                    println!("[partial] {} | {}", recognition, translation);
                }
                Some(TransportEvent::Message(WireMessage::FinalResults { recognition, translation })) => {
                    println!("[final]   {} | {}", recognition, translation);
                }
                Some(TransportEvent::Message(WireMessage::Error { message })) => {
                    tracing::warn!("Service error: {}", message);
                }
                Some(TransportEvent::Message(other)) => {
                    tracing::debug!("Inbound {}", other.kind());
                }
                Some(TransportEvent::StatusChanged(state)) => {
                    println!("[status]  {}", state);
                }
                Some(TransportEvent::Fatal(e)) => {
                    tracing::error!("Streaming cannot continue: {}", e);
                    break;
                }
                None => break,
            },
        }
    }

    if let Err(e) = session.stop().await {
        tracing::warn!("Stop signal not delivered: {}", e);
    }
    if let Ok(snapshot) = transport.snapshot().await {
        tracing::info!(
            "Sent {} frames ({} bytes), dropped {}",
            snapshot.frames_sent,
            snapshot.bytes_sent,
            snapshot.frames_dropped
        );
    }
    transport.close().await?;
    drop(session);
    drop(transport);
    task.await.context("transport task panicked")?;

    Ok(())
}

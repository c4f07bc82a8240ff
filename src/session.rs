use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::{AudioDevice, CaptureSession, CaptureState};
use crate::config::Config;
use crate::error::{Result, StreamError};
use crate::transport::{ConnectionState, TransportHandle, WireMessage};

/// One user-facing streaming session: microphone in, transcripts out.
pub struct LiveSession {
    id: Uuid,
    config: Config,
    capture: CaptureSession,
    transport: TransportHandle,
}

impl LiveSession {
    pub fn new(config: Config, transport: TransportHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            capture: CaptureSession::new(),
            transport,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_recording(&self) -> bool {
        self.capture.state() == CaptureState::Recording
    }

    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    /// Connects if needed, sends the language pair, then opens the device.
    pub async fn start(&mut self, device: &dyn AudioDevice) -> Result<()> {
        if self.is_recording() {
            return Err(StreamError::AlreadyActive);
        }

        if self.transport.state() != ConnectionState::Connected {
            self.transport.connect().await?;
            self.transport
                .wait_connected(self.config.transport.connect_timeout())
                .await?;
        }

        self.transport
            .send_control(WireMessage::Config {
                from: self.config.language.from.clone(),
                to: self.config.language.to.clone(),
            })
            .await?;

        let sink = Arc::new(self.transport.clone());
        self.capture.start(device, &self.config.capture, sink).await?;

        info!(
            "Session {} streaming {} -> {}",
            self.id, self.config.language.from, self.config.language.to
        );
        Ok(())
    }

    /// Stops capture and sends the end-of-stream pair.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_recording() {
            return Ok(());
        }

        let result = self.capture.stop().await;
        match &result {
            Ok(()) => info!("Session {} stopped", self.id),
            Err(e) => warn!("Session {} stopped without stop signal: {}", self.id, e),
        }
        result
    }
}

use serde::{Deserialize, Serialize};

use crate::audio::pcm::{bytes_from_base64, bytes_to_base64};
use crate::audio::PcmFrame;
use crate::error::Result;

/// One unit exchanged with the remote endpoint, one per transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Little-endian 16-bit PCM. An empty payload carries no audio and, with
    /// `is_last`, marks the end of the stream.
    Audio { payload: Vec<u8>, is_last: bool },
    Stop,
    /// Requested language pair for recognition and translation.
    Config { from: String, to: String },
    Results { recognition: String, translation: String },
    FinalResults { recognition: String, translation: String },
    Error { message: String },
    ConnectionStatus { status: String, client_id: Option<String> },
    ConfigUpdated { from: String, to: String },
}

impl WireMessage {
    pub fn audio(frame: &PcmFrame) -> Self {
        WireMessage::Audio {
            payload: frame.to_le_bytes(),
            is_last: false,
        }
    }

    pub fn end_of_stream() -> Self {
        WireMessage::Audio {
            payload: Vec::new(),
            is_last: true,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, WireMessage::Audio { .. })
    }

    /// The envelope `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Audio { .. } => "audio",
            WireMessage::Stop => "stop",
            WireMessage::Config { .. } => "config",
            WireMessage::Results { .. } => "results",
            WireMessage::FinalResults { .. } => "final_results",
            WireMessage::Error { .. } => "error",
            WireMessage::ConnectionStatus { .. } => "connection",
            WireMessage::ConfigUpdated { .. } => "config_updated",
        }
    }

    /// JSON text for one transport frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&Envelope::from(self))?)
    }

    /// Parses one inbound frame. Anything that does not match a known
    /// envelope is a `MalformedMessage`.
    pub fn decode(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;
        envelope.try_into()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Transcript {
    recognition: Option<String>,
    translation: Option<String>,
}

impl Transcript {
    fn new(recognition: &str, translation: &str) -> Self {
        Self {
            recognition: Some(recognition.to_string()),
            translation: Some(translation.to_string()),
        }
    }

    /// Missing or null text reads as empty.
    fn into_parts(self) -> (String, String) {
        (
            self.recognition.unwrap_or_default(),
            self.translation.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagePair {
    from: String,
    to: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    // `data` may be missing or null on inbound frames; both read as empty.
    Audio {
        #[serde(default)]
        data: Option<String>,
        #[serde(rename = "isLast", alias = "is_last", default)]
        is_last: bool,
    },
    Stop,
    Config {
        data: LanguagePair,
    },
    Results {
        #[serde(default)]
        data: Option<Transcript>,
    },
    FinalResults {
        #[serde(default)]
        data: Option<Transcript>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    Connection {
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
    ConfigUpdated {
        data: LanguagePair,
    },
}

impl From<&WireMessage> for Envelope {
    fn from(message: &WireMessage) -> Self {
        match message {
            WireMessage::Audio { payload, is_last } => Envelope::Audio {
                data: Some(bytes_to_base64(payload)),
                is_last: *is_last,
            },
            WireMessage::Stop => Envelope::Stop,
            WireMessage::Config { from, to } => Envelope::Config {
                data: LanguagePair {
                    from: from.clone(),
                    to: to.clone(),
                },
            },
            WireMessage::Results {
                recognition,
                translation,
            } => Envelope::Results {
                data: Some(Transcript::new(recognition, translation)),
            },
            WireMessage::FinalResults {
                recognition,
                translation,
            } => Envelope::FinalResults {
                data: Some(Transcript::new(recognition, translation)),
            },
            WireMessage::Error { message } => Envelope::Error {
                message: message.clone(),
            },
            WireMessage::ConnectionStatus { status, client_id } => Envelope::Connection {
                status: status.clone(),
                client_id: client_id.clone(),
            },
            WireMessage::ConfigUpdated { from, to } => Envelope::ConfigUpdated {
                data: LanguagePair {
                    from: from.clone(),
                    to: to.clone(),
                },
            },
        }
    }
}

impl TryFrom<Envelope> for WireMessage {
    type Error = crate::error::StreamError;

    fn try_from(envelope: Envelope) -> Result<Self> {
        let message = match envelope {
            Envelope::Audio { data, is_last } => WireMessage::Audio {
                payload: bytes_from_base64(data.as_deref().unwrap_or_default())?,
                is_last,
            },
            Envelope::Stop => WireMessage::Stop,
            Envelope::Config { data } => WireMessage::Config {
                from: data.from,
                to: data.to,
            },
            Envelope::Results { data } => {
                let (recognition, translation) = data.unwrap_or_default().into_parts();
                WireMessage::Results {
                    recognition,
                    translation,
                }
            }
            Envelope::FinalResults { data } => {
                let (recognition, translation) = data.unwrap_or_default().into_parts();
                WireMessage::FinalResults {
                    recognition,
                    translation,
                }
            }
            Envelope::Error { message } => WireMessage::Error { message },
            Envelope::Connection { status, client_id } => {
                WireMessage::ConnectionStatus { status, client_id }
            }
            Envelope::ConfigUpdated { data } => WireMessage::ConfigUpdated {
                from: data.from,
                to: data.to,
            },
        };
        Ok(message)
    }
}

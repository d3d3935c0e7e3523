use serde::{Deserialize, Serialize};

use crate::errors::RelayError;

/// Envelope shared by every frame on the wire: `{"event": ..., "data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SetUsernamePayload {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Inbound frames. Decoded exactly once, at the transport boundary; the
/// fields stay `Option` so that presence checks are a validation concern,
/// not a parse failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientFrame {
    SetUsername { username: Option<String> },
    Message { to: Option<String>, text: Option<String> },
    Ping,
}

impl ClientFrame {
    /// Decode one raw text frame. A syntactically invalid frame or a
    /// non-object payload is `MalformedFrame`; an event name outside the
    /// vocabulary is `UnknownEvent`.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let envelope: Envelope =
            serde_json::from_str(raw).map_err(|_| RelayError::MalformedFrame)?;
        match envelope.event.as_str() {
            "set_username" => {
                let payload: SetUsernamePayload = serde_json::from_value(envelope.data)
                    .map_err(|_| RelayError::MalformedFrame)?;
                Ok(Self::SetUsername {
                    username: payload.username,
                })
            }
            "message" => {
                let payload: MessagePayload = serde_json::from_value(envelope.data)
                    .map_err(|_| RelayError::MalformedFrame)?;
                Ok(Self::Message {
                    to: payload.to,
                    text: payload.text,
                })
            }
            "ping" => Ok(Self::Ping),
            _ => Err(RelayError::UnknownEvent),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SetUsername { .. } => "set_username",
            Self::Message { .. } => "message",
            Self::Ping => "ping",
        }
    }
}

/// Outbound frames. Serialized as `{"event": ..., "data": {...}}` with
/// exactly the field sets the wire contract names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    UserList {
        users: Vec<String>,
    },
    PrivateMessage {
        text: String,
        timestamp: String,
        from: String,
        to: String,
    },
    Error {
        message: String,
    },
    Pong {
        timestamp: String,
    },
}

impl ServerFrame {
    pub fn error(err: &RelayError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::UserList { .. } => "user_list",
            Self::PrivateMessage { .. } => "private_message",
            Self::Error { .. } => "error",
            Self::Pong { .. } => "pong",
        }
    }
}

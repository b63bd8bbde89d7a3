//! Wire messages
//!
//! Every WebSocket text frame carries one JSON envelope:
//!
//! ```json
//! {"event": "request-stream", "data": {"computerId": "..."}}
//! ```
//!
//! Event names are kebab-case, payload fields camelCase.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{ConnectionId, SourceId};

/// Events sent by sources and viewers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// A source announces itself
    #[serde(rename_all = "camelCase")]
    RegisterComputer {
        #[serde(default)]
        name: String,
        #[serde(default)]
        capabilities: HashMap<String, bool>,
        #[serde(default)]
        connection_code: Option<String>,
    },

    /// A viewer resolves a pairing code
    #[serde(rename_all = "camelCase")]
    PairComputer { connection_code: String },

    /// A viewer asks for a source's frames
    #[serde(rename_all = "camelCase")]
    RequestStream { computer_id: SourceId },

    /// Sent by a viewer with `computerId`, or by a source with `viewerId`
    #[serde(rename_all = "camelCase")]
    StopStream {
        #[serde(default)]
        computer_id: Option<SourceId>,
        #[serde(default)]
        viewer_id: Option<ConnectionId>,
    },

    /// A captured frame addressed to one viewer
    #[serde(rename_all = "camelCase")]
    WebcamFrame {
        viewer_id: ConnectionId,
        #[serde(with = "utf8_bytes")]
        frame: Bytes,
        /// Passed through as sent: epoch millis, fractional millis or ISO text
        #[serde(default)]
        timestamp: Value,
        #[serde(default, deserialize_with = "lenient_sequence::deserialize")]
        frame_number: u64,
    },

    /// Liveness ping from a source
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        #[serde(default)]
        computer_name: Option<String>,
        /// Informational only; clients send either epoch millis or ISO text
        #[serde(default)]
        timestamp: Option<Value>,
        #[serde(default)]
        active_streams: u32,
    },
}

impl ClientEvent {
    /// Decode a JSON envelope
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::RegisterComputer { .. } => "register-computer",
            ClientEvent::PairComputer { .. } => "pair-computer",
            ClientEvent::RequestStream { .. } => "request-stream",
            ClientEvent::StopStream { .. } => "stop-stream",
            ClientEvent::WebcamFrame { .. } => "webcam-frame",
            ClientEvent::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Events sent by the server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Acknowledges `register-computer` with the identity now in use
    #[serde(rename_all = "camelCase")]
    Registered { computer_id: SourceId, name: String },

    /// The registry listing changed
    ComputersUpdated,

    #[serde(rename_all = "camelCase")]
    ComputerPaired { computer_id: SourceId },

    PairError { message: String },

    #[serde(rename_all = "camelCase")]
    StreamReady { computer_name: String },

    StreamError { message: String },

    /// Tells a source to start capturing for a viewer
    #[serde(rename_all = "camelCase")]
    StartStream { viewer_id: ConnectionId },

    /// To a source: stop for `viewerId`. To a viewer: `computerId` stopped.
    #[serde(rename_all = "camelCase")]
    StopStream {
        #[serde(skip_serializing_if = "Option::is_none")]
        computer_id: Option<SourceId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        viewer_id: Option<ConnectionId>,
    },

    /// A relayed frame
    #[serde(rename_all = "camelCase")]
    WebcamFrame {
        computer_id: SourceId,
        #[serde(with = "utf8_bytes")]
        frame: Bytes,
        #[serde(skip_serializing_if = "Value::is_null")]
        timestamp: Value,
        frame_number: u64,
    },
}

impl ServerEvent {
    /// Encode as a JSON envelope
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn stop_for_viewer(viewer: ConnectionId) -> Self {
        ServerEvent::StopStream {
            computer_id: None,
            viewer_id: Some(viewer),
        }
    }

    pub fn stopped_source(source: SourceId) -> Self {
        ServerEvent::StopStream {
            computer_id: Some(source),
            viewer_id: None,
        }
    }
}

/// Frame payloads travel as text (Base64 images) but are held as `Bytes`
/// so fan-out never copies them.
mod utf8_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        let text = std::str::from_utf8(bytes).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        String::deserialize(deserializer).map(Bytes::from)
    }
}

/// Frame numbers as integers, floats or numeric text; anything else reads as 0
mod lenient_sequence {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let sequence = match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Value::String(text) => text.trim().parse().unwrap_or(0),
            _ => 0,
        };
        Ok(sequence)
    }
}

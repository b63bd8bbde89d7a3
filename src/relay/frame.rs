//! Relayed frame type
//!
//! Frames are forwarded verbatim. The payload is never decoded; `Bytes`
//! keeps it reference-counted from the source's message to the viewer's.

use bytes::Bytes;
use serde_json::Value;

use crate::gateway::message::ServerEvent;
use crate::registry::{ConnectionId, SourceId};

/// A frame on its way from a source to one viewer
#[derive(Debug, Clone)]
pub struct RelayFrame {
    /// Identity of the producing source
    pub source: SourceId,
    /// Connection the frame arrived on
    pub origin: ConnectionId,
    /// Viewer the source addressed the frame to
    pub viewer: ConnectionId,
    /// Opaque image payload (Base64 text)
    pub payload: Bytes,
    /// Capture timestamp as reported by the source, forwarded untouched
    pub timestamp: Value,
    /// Source-assigned sequence number
    pub sequence: u64,
}

impl RelayFrame {
    pub fn new(
        source: SourceId,
        origin: ConnectionId,
        viewer: ConnectionId,
        payload: Bytes,
        timestamp: Value,
        sequence: u64,
    ) -> Self {
        Self {
            source,
            origin,
            viewer,
            payload,
            timestamp,
            sequence,
        }
    }

    /// Wire event delivered to the viewer
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::WebcamFrame {
            computer_id: self.source.clone(),
            frame: self.payload.clone(),
            timestamp: self.timestamp.clone(),
            frame_number: self.sequence,
        }
    }
}

/// What happened to a frame handed to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Queued on the viewer's connection
    Delivered,
    /// No open session for the (source, viewer) pair
    NoSession,
    /// Session open, but the viewer is gone or not keeping up
    Dropped,
}

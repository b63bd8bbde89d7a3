//! Per-(source, viewer) relay session state
//!
//! A relay session exists from a viewer's stream request until either side
//! stops it or disconnects. Its state decides whether a frame is forwarded.

use std::time::Instant;

use crate::registry::{ConnectionId, SourceId};

/// Relay session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Created, nothing requested yet
    Idle,
    /// Source told to start, no frame seen yet
    Requested,
    /// At least one frame relayed
    Streaming,
    /// Stopped by either side or by a disconnect
    Stopped,
}

/// Key of a relay session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub source: SourceId,
    pub viewer: ConnectionId,
}

impl SessionKey {
    pub fn new(source: SourceId, viewer: ConnectionId) -> Self {
        Self { source, viewer }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.source, self.viewer)
    }
}

/// State of one relay session
#[derive(Debug, Clone)]
pub struct RelaySession {
    pub key: SessionKey,

    /// Connection that served the source when the stream was requested;
    /// only frames and teardown from this connection touch the session
    pub source_connection: ConnectionId,

    pub state: RelayState,

    /// When the viewer asked for the stream
    pub requested_at: Option<Instant>,

    /// When the first frame was relayed
    pub streaming_since: Option<Instant>,

    /// Frames forwarded to the viewer
    pub frames_relayed: u64,

    /// Sequence number of the last forwarded frame
    pub last_sequence: Option<u64>,
}

impl RelaySession {
    pub fn new(key: SessionKey, source_connection: ConnectionId) -> Self {
        Self {
            key,
            source_connection,
            state: RelayState::Idle,
            requested_at: None,
            streaming_since: None,
            frames_relayed: 0,
            last_sequence: None,
        }
    }

    /// Idle → Requested
    ///
    /// Returns false if the session was already requested or streaming.
    pub fn request(&mut self) -> bool {
        match self.state {
            RelayState::Idle | RelayState::Stopped => {
                self.state = RelayState::Requested;
                self.requested_at = Some(Instant::now());
                true
            }
            RelayState::Requested | RelayState::Streaming => false,
        }
    }

    /// Whether frames for this session should be forwarded
    pub fn accepts_frames(&self) -> bool {
        matches!(self.state, RelayState::Requested | RelayState::Streaming)
    }

    /// Record a frame; the first one moves Requested → Streaming
    ///
    /// Returns false (and records nothing) if the session does not accept frames.
    pub fn on_frame(&mut self, sequence: u64) -> bool {
        if !self.accepts_frames() {
            return false;
        }

        if self.state == RelayState::Requested {
            self.state = RelayState::Streaming;
            self.streaming_since = Some(Instant::now());
        }

        self.frames_relayed += 1;
        self.last_sequence = Some(sequence);
        true
    }

    /// Any state → Stopped
    pub fn stop(&mut self) {
        self.state = RelayState::Stopped;
    }

    /// Time spent streaming
    pub fn duration(&self) -> Option<std::time::Duration> {
        self.streaming_since.map(|t| t.elapsed())
    }
}

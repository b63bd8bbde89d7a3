//! Relay hub implementation
//!
//! Owns the outbound channel of every connection and the table of relay
//! sessions, and forwards frames from sources to viewers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::gateway::message::ServerEvent;
use crate::registry::{ConnectionId, ConnectionRegistry, SourceId};
use crate::session::{RelaySession, RelayState, SessionKey};
use crate::stats::RelayStats;

use super::error::RelayError;
use super::frame::{FrameOutcome, RelayFrame};

/// Who gets told when a session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopNotice {
    Source,
    Viewer,
}

/// Routes stream control and frames between connections
///
/// Outbound delivery is fire-and-forget: `try_send` on a bounded channel,
/// a full or closed channel drops the event.
pub struct RelayHub {
    registry: Arc<ConnectionRegistry>,

    /// Outbound channel per attached connection
    peers: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,

    /// Open sessions; a stopped session is removed
    sessions: RwLock<HashMap<SessionKey, RelaySession>>,

    stats: Arc<RelayStats>,
}

impl RelayHub {
    pub fn new(registry: Arc<ConnectionRegistry>, stats: Arc<RelayStats>) -> Self {
        Self {
            registry,
            peers: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            stats,
        }
    }

    /// Attach a connection; returns the receiving end of its outbound channel
    pub async fn attach(
        &self,
        connection: &ConnectionId,
        capacity: usize,
    ) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.peers.write().await.insert(connection.clone(), tx);
        rx
    }

    /// Detach a connection and end every session it is viewing
    ///
    /// Returns the number of sessions ended.
    pub async fn detach(&self, connection: &ConnectionId) -> usize {
        self.peers.write().await.remove(connection);

        let ended = self
            .end_sessions(|session| &session.key.viewer == connection, StopNotice::Source)
            .await;

        if ended > 0 {
            tracing::debug!(
                connection = %connection,
                sessions = ended,
                "Viewer detached, sessions ended"
            );
        }

        ended
    }

    /// Queue an event on a connection's outbound channel
    pub async fn send(&self, connection: &ConnectionId, event: ServerEvent) -> bool {
        let peers = self.peers.read().await;

        match peers.get(connection) {
            Some(tx) => match tx.try_send(event) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(connection = %connection, "Outbound channel full, event dropped");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
            None => false,
        }
    }

    /// Ask `source` to start streaming to `viewer`
    ///
    /// The session is tied to the connection serving the source right now.
    /// Returns the source's display name for the viewer's acknowledgement.
    pub async fn request_stream(
        &self,
        viewer: &ConnectionId,
        source: &SourceId,
    ) -> Result<String, RelayError> {
        let live = self
            .registry
            .live_source(source)
            .await
            .ok_or_else(|| RelayError::SourceUnavailable(source.clone()))?;

        let key = SessionKey::new(source.clone(), viewer.clone());
        let opened = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .entry(key.clone())
                .or_insert_with(|| RelaySession::new(key.clone(), live.connection.clone()));
            if session.source_connection != live.connection {
                // Left behind by a connection that no longer serves the source
                *session = RelaySession::new(key.clone(), live.connection.clone());
            }
            session.request()
        };

        // The source may have left while the session was being opened
        if !self.registry.is_served_by(source, &live.connection).await {
            let mut sessions = self.sessions.write().await;
            if sessions
                .get(&key)
                .is_some_and(|session| session.source_connection == live.connection)
            {
                sessions.remove(&key);
            }
            tracing::debug!(session = %key, "Source left during stream request");
            return Err(RelayError::SourceUnavailable(source.clone()));
        }

        if opened {
            self.stats.session_started();
            tracing::info!(session = %key, source_connection = %live.connection, "Stream requested");
        } else {
            tracing::debug!(session = %key, "Stream re-requested");
        }

        self.send(
            &live.connection,
            ServerEvent::StartStream {
                viewer_id: viewer.clone(),
            },
        )
        .await;

        Ok(live.display_name)
    }

    /// Forward a frame to the viewer it is addressed to
    ///
    /// Frames outside an open session, or from a connection other than the
    /// one the session was opened against, are ignored.
    pub async fn frame(&self, frame: RelayFrame) -> FrameOutcome {
        let key = SessionKey::new(frame.source.clone(), frame.viewer.clone());

        let accepted = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(&key) {
                Some(session) if session.source_connection == frame.origin => {
                    let was_requested = session.state == RelayState::Requested;
                    let accepted = session.on_frame(frame.sequence);
                    if accepted && was_requested {
                        tracing::info!(session = %key, "Streaming started");
                    }
                    accepted
                }
                _ => false,
            }
        };

        if !accepted {
            tracing::trace!(session = %key, sequence = frame.sequence, "Frame without session ignored");
            return FrameOutcome::NoSession;
        }

        if self.send(&frame.viewer, frame.to_event()).await {
            self.stats.frame_relayed();
            FrameOutcome::Delivered
        } else {
            self.stats.frame_dropped();
            FrameOutcome::Dropped
        }
    }

    /// Viewer-initiated stop; tells the source to stop for this viewer
    ///
    /// Stopping a session that does not exist is a no-op.
    pub async fn stop_stream(&self, viewer: &ConnectionId, source: &SourceId) -> bool {
        let key = SessionKey::new(source.clone(), viewer.clone());
        self.end_sessions(|session| session.key == key, StopNotice::Source)
            .await
            > 0
    }

    /// Source-initiated stop from `connection`; tells the viewer the stream ended
    pub async fn source_stopped(
        &self,
        source: &SourceId,
        connection: &ConnectionId,
        viewer: &ConnectionId,
    ) -> bool {
        let key = SessionKey::new(source.clone(), viewer.clone());
        self.end_sessions(
            |session| session.key == key && &session.source_connection == connection,
            StopNotice::Viewer,
        )
        .await
            > 0
    }

    /// End every session `connection` was serving for `source`
    ///
    /// Sessions opened against a newer connection for the same identity are
    /// left alone.
    pub async fn end_source(&self, source: &SourceId, connection: &ConnectionId) -> usize {
        let ended = self
            .end_sessions(
                |session| &session.key.source == source && &session.source_connection == connection,
                StopNotice::Viewer,
            )
            .await;

        if ended > 0 {
            tracing::debug!(
                source = %source,
                connection = %connection,
                sessions = ended,
                "Source gone, sessions ended"
            );
        }

        ended
    }

    /// State of a session, if open
    pub async fn session_state(&self, source: &SourceId, viewer: &ConnectionId) -> Option<RelayState> {
        let key = SessionKey::new(source.clone(), viewer.clone());
        self.sessions.read().await.get(&key).map(|s| s.state)
    }

    /// Number of open sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of attached connections
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    async fn end_sessions<F>(&self, predicate: F, notice: StopNotice) -> usize
    where
        F: Fn(&RelaySession) -> bool,
    {
        let ended: Vec<RelaySession> = {
            let mut sessions = self.sessions.write().await;
            let keys: Vec<SessionKey> = sessions
                .iter()
                .filter(|(_, session)| predicate(session))
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter()
                .filter_map(|key| sessions.remove(key))
                .map(|mut session| {
                    session.stop();
                    session
                })
                .collect()
        };

        for session in &ended {
            tracing::info!(
                session = %session.key,
                frames = session.frames_relayed,
                "Stream stopped"
            );

            match notice {
                StopNotice::Source => {
                    self.send(
                        &session.source_connection,
                        ServerEvent::stop_for_viewer(session.key.viewer.clone()),
                    )
                    .await;
                }
                StopNotice::Viewer => {
                    self.send(
                        &session.key.viewer,
                        ServerEvent::stopped_source(session.key.source.clone()),
                    )
                    .await;
                }
            }
        }

        self.stats.sessions_stopped(ended.len());
        ended.len()
    }
}

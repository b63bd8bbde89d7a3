//! Event dispatch
//!
//! Binds decoded client events to the registry and the relay hub, and turns
//! their results into server events. No state lives here.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::registry::{ConnectionRegistry, Departure, EvictionHandler, RegistryError, SourceId};
use crate::relay::{RelayFrame, RelayHub};
use crate::session::ConnectionContext;
use crate::stats::RelayStats;

use super::message::{ClientEvent, ServerEvent};

/// Name used when a source registers without one
const UNNAMED_SOURCE: &str = "Unnamed computer";

/// Default per-connection outbound queue length
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Protocol front door shared by every connection
pub struct Gateway {
    registry: Arc<ConnectionRegistry>,
    relay: Arc<RelayHub>,
    stats: Arc<RelayStats>,
    outbound_capacity: usize,
}

impl Gateway {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_capacity(registry, DEFAULT_OUTBOUND_CAPACITY)
    }

    pub fn with_capacity(registry: Arc<ConnectionRegistry>, outbound_capacity: usize) -> Self {
        let stats = Arc::new(RelayStats::new());
        let relay = Arc::new(RelayHub::new(Arc::clone(&registry), Arc::clone(&stats)));

        Self {
            registry,
            relay,
            stats,
            outbound_capacity,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn relay(&self) -> &Arc<RelayHub> {
        &self.relay
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Attach a new connection; returns its outbound event queue
    pub async fn connect(&self, ctx: &ConnectionContext) -> mpsc::Receiver<ServerEvent> {
        self.stats.connection_opened();
        tracing::debug!(connection = %ctx.connection, peer = ?ctx.peer_addr, "Connection opened");

        self.relay.attach(&ctx.connection, self.outbound_capacity).await
    }

    /// Clean up after a closed connection
    ///
    /// Ends the sessions it viewed and, if it was serving a source, that
    /// source's sessions and live registration.
    pub async fn disconnect(&self, ctx: &ConnectionContext) {
        let viewed = self.relay.detach(&ctx.connection).await;

        let served = match self.registry.remove(&ctx.connection).await {
            Some(departure) => {
                self.relay
                    .end_source(&departure.identity, &departure.connection)
                    .await
            }
            None => 0,
        };

        self.stats.connection_closed();
        tracing::debug!(
            connection = %ctx.connection,
            duration_secs = ctx.duration().as_secs(),
            viewed_sessions = viewed,
            served_sessions = served,
            "Connection closed"
        );
    }

    /// Decode and dispatch one text message; malformed input is logged and dropped
    pub async fn handle_text(&self, ctx: &ConnectionContext, text: &str) {
        match ClientEvent::from_json(text) {
            Ok(event) => self.handle(ctx, event).await,
            Err(e) => {
                tracing::warn!(connection = %ctx.connection, error = %e, "Malformed message ignored");
            }
        }
    }

    /// Dispatch one client event
    pub async fn handle(&self, ctx: &ConnectionContext, event: ClientEvent) {
        tracing::trace!(connection = %ctx.connection, event = event.name(), "Event received");

        match event {
            ClientEvent::RegisterComputer {
                name,
                capabilities,
                connection_code,
            } => {
                let name = match name.trim() {
                    "" => UNNAMED_SOURCE,
                    trimmed => trimmed,
                };
                let code = connection_code
                    .as_deref()
                    .map(str::trim)
                    .filter(|code| !code.is_empty());

                let registration = self
                    .registry
                    .register(&ctx.connection, ctx.peer_addr, name, capabilities, code)
                    .await;

                // Viewers of an identity this connection gave up must ask again
                if let Some(previous) = registration
                    .previous_identity
                    .as_ref()
                    .filter(|previous| **previous != registration.identity)
                {
                    self.relay.end_source(previous, &ctx.connection).await;
                }
                // Likewise for viewers of a connection this one replaced
                if let Some(ref old) = registration.superseded {
                    self.relay.end_source(&registration.identity, old).await;
                }

                self.reply(
                    ctx,
                    ServerEvent::Registered {
                        computer_id: registration.identity,
                        name: registration.display_name,
                    },
                )
                .await;
            }

            ClientEvent::PairComputer { connection_code } => {
                let reply = match self.registry.pair(&connection_code).await {
                    Ok(computer_id) => {
                        tracing::info!(connection = %ctx.connection, source = %computer_id, "Viewer paired");
                        ServerEvent::ComputerPaired { computer_id }
                    }
                    Err(e) => {
                        tracing::debug!(connection = %ctx.connection, error = %e, "Pairing failed");
                        ServerEvent::PairError {
                            message: e.to_string(),
                        }
                    }
                };
                self.reply(ctx, reply).await;
            }

            ClientEvent::RequestStream { computer_id } => {
                let reply = match self.relay.request_stream(&ctx.connection, &computer_id).await {
                    Ok(computer_name) => ServerEvent::StreamReady { computer_name },
                    Err(e) => {
                        tracing::debug!(
                            connection = %ctx.connection,
                            source = %computer_id,
                            error = %e,
                            "Stream request refused"
                        );
                        ServerEvent::StreamError {
                            message: e.to_string(),
                        }
                    }
                };
                self.reply(ctx, reply).await;
            }

            ClientEvent::StopStream {
                computer_id,
                viewer_id,
            } => {
                if let Some(source) = computer_id {
                    self.relay.stop_stream(&ctx.connection, &source).await;
                }
                if let Some(viewer) = viewer_id {
                    if let Some(source) = self.registry.identity_of(&ctx.connection).await {
                        self.relay
                            .source_stopped(&source, &ctx.connection, &viewer)
                            .await;
                    }
                }
            }

            ClientEvent::WebcamFrame {
                viewer_id,
                frame,
                timestamp,
                frame_number,
            } => {
                self.stats.frame_received();

                let Some(source) = self.registry.identity_of(&ctx.connection).await else {
                    tracing::trace!(connection = %ctx.connection, "Frame from unregistered connection");
                    return;
                };

                self.registry.touch(&source).await;
                self.relay
                    .frame(RelayFrame::new(
                        source,
                        ctx.connection.clone(),
                        viewer_id,
                        frame,
                        timestamp,
                        frame_number,
                    ))
                    .await;
            }

            ClientEvent::Heartbeat {
                computer_name,
                active_streams,
                ..
            } => {
                if let Some(source) = self.registry.identity_of(&ctx.connection).await {
                    self.registry.touch(&source).await;
                    tracing::trace!(
                        source = %source,
                        name = ?computer_name,
                        active_streams = active_streams,
                        "Heartbeat"
                    );
                }
            }
        }
    }

    /// Durable registration, as served by the HTTP API
    pub async fn register_durable(
        &self,
        name: &str,
        pairing_code: &str,
    ) -> Result<SourceId, RegistryError> {
        self.registry.register_durable(name, pairing_code).await
    }

    async fn reply(&self, ctx: &ConnectionContext, event: ServerEvent) {
        self.relay.send(&ctx.connection, event).await;
    }
}

impl EvictionHandler for Gateway {
    /// Ends the evicted connections' sessions and closes their outbound
    /// channels, which drops the socket and lets the client reconnect.
    async fn on_evicted(&self, departures: Vec<Departure>) {
        self.stats.sources_evicted(departures.len());

        for departure in departures {
            self.relay
                .end_source(&departure.identity, &departure.connection)
                .await;
            self.relay.detach(&departure.connection).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use bytes::Bytes;
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;

    use crate::registry::{SourceStatus, StaleConnectionReaper};
    use crate::session::RelayState;

    use super::*;

    fn gateway() -> Arc<Gateway> {
        Arc::new(Gateway::new(Arc::new(ConnectionRegistry::new())))
    }

    async fn open(gateway: &Gateway) -> (ConnectionContext, mpsc::Receiver<ServerEvent>) {
        let ctx = ConnectionContext::new(Some("10.1.2.3:40000".parse().unwrap()));
        let rx = gateway.connect(&ctx).await;
        (ctx, rx)
    }

    fn register(name: &str, code: Option<&str>) -> ClientEvent {
        ClientEvent::RegisterComputer {
            name: name.into(),
            capabilities: [("webcam".to_string(), true)].into_iter().collect(),
            connection_code: code.map(Into::into),
        }
    }

    fn frame(viewer: &ConnectionContext, n: u64) -> ClientEvent {
        ClientEvent::WebcamFrame {
            viewer_id: viewer.connection.clone(),
            frame: Bytes::from(format!("frame-{n}")),
            timestamp: json!(1_700_000_000_000 + n),
            frame_number: n,
        }
    }

    fn request(source: &SourceId) -> ClientEvent {
        ClientEvent::RequestStream {
            computer_id: source.clone(),
        }
    }

    #[tokio::test]
    async fn test_lab_pc_scenario() {
        let gateway = gateway();

        // Durable registration shows up offline
        let durable = gateway.register_durable("Lab-PC", "ABC123").await.unwrap();
        let listing = gateway.registry().list_all().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].status, SourceStatus::Offline);

        // Source connects and reclaims the durable identity
        let (source, mut source_rx) = open(&gateway).await;
        gateway.handle(&source, register("lab-machine", Some("ABC123"))).await;
        assert_eq!(
            source_rx.recv().await.unwrap(),
            ServerEvent::Registered {
                computer_id: durable.clone(),
                name: "Lab-PC".into()
            }
        );
        let listing = gateway.registry().list_all().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].status, SourceStatus::Online);
        assert_eq!(listing[0].name, "Lab-PC");

        // Viewer pairs
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway
            .handle(
                &viewer,
                ClientEvent::PairComputer {
                    connection_code: "ABC123".into(),
                },
            )
            .await;
        assert_eq!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::ComputerPaired {
                computer_id: durable.clone()
            }
        );

        // Viewer requests the stream
        gateway
            .handle(
                &viewer,
                ClientEvent::RequestStream {
                    computer_id: durable.clone(),
                },
            )
            .await;
        assert_eq!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::StreamReady {
                computer_name: "Lab-PC".into()
            }
        );
        assert_eq!(
            source_rx.recv().await.unwrap(),
            ServerEvent::StartStream {
                viewer_id: viewer.connection.clone()
            }
        );

        // Frame #1 reaches the viewer
        gateway.handle(&source, frame(&viewer, 1)).await;
        match viewer_rx.recv().await.unwrap() {
            ServerEvent::WebcamFrame {
                computer_id,
                frame_number,
                ..
            } => {
                assert_eq!(computer_id, durable);
                assert_eq!(frame_number, 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // Viewer stops; later frames are dropped silently
        gateway
            .handle(
                &viewer,
                ClientEvent::StopStream {
                    computer_id: Some(durable.clone()),
                    viewer_id: None,
                },
            )
            .await;
        assert_eq!(
            source_rx.recv().await.unwrap(),
            ServerEvent::stop_for_viewer(viewer.connection.clone())
        );

        gateway.handle(&source, frame(&viewer, 2)).await;
        assert!(viewer_rx.try_recv().is_err());
        assert_eq!(gateway.relay().session_state(&durable, &viewer.connection).await, None);
    }

    #[tokio::test]
    async fn test_stream_request_for_unknown_identity() {
        let gateway = gateway();
        let (viewer, mut viewer_rx) = open(&gateway).await;

        gateway
            .handle(
                &viewer,
                ClientEvent::RequestStream {
                    computer_id: SourceId::new("never-registered"),
                },
            )
            .await;

        assert_eq!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::StreamError {
                message: "Computer is not connected".into()
            }
        );
    }

    #[tokio::test]
    async fn test_pair_unknown_code_replies_error() {
        let gateway = gateway();
        let (viewer, mut viewer_rx) = open(&gateway).await;

        gateway
            .handle(
                &viewer,
                ClientEvent::PairComputer {
                    connection_code: "NOPE".into(),
                },
            )
            .await;

        assert!(matches!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::PairError { .. }
        ));
    }

    #[tokio::test]
    async fn test_frame_for_viewer_without_session_is_dropped() {
        let gateway = gateway();
        let (source, _source_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&source, register("Desk", None)).await;

        gateway.handle(&source, frame(&viewer, 1)).await;

        assert!(viewer_rx.try_recv().is_err());
        assert_eq!(gateway.stats().snapshot().frames_received, 1);
        assert_eq!(gateway.stats().snapshot().frames_relayed, 0);
    }

    #[tokio::test]
    async fn test_source_disconnect_ends_sessions() {
        let gateway = gateway();
        gateway.register_durable("Lab-PC", "ABC123").await.unwrap();
        let (source, _source_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&source, register("Lab-PC", Some("ABC123"))).await;
        let durable = gateway.registry().pair("ABC123").await.unwrap();
        gateway
            .handle(
                &viewer,
                ClientEvent::RequestStream {
                    computer_id: durable.clone(),
                },
            )
            .await;
        viewer_rx.recv().await.unwrap();

        gateway.disconnect(&source).await;

        assert_eq!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::stopped_source(durable.clone())
        );
        assert_eq!(gateway.relay().session_count().await, 0);
        let listing = gateway.registry().list_all().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].status, SourceStatus::Offline);
    }

    #[tokio::test]
    async fn test_reconnect_supersedes_and_ends_old_sessions() {
        let gateway = gateway();
        let durable = gateway.register_durable("Lab-PC", "ABC123").await.unwrap();
        let (old, _old_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&old, register("Lab-PC", Some("ABC123"))).await;
        gateway
            .handle(
                &viewer,
                ClientEvent::RequestStream {
                    computer_id: durable.clone(),
                },
            )
            .await;
        viewer_rx.recv().await.unwrap();

        let (new, mut new_rx) = open(&gateway).await;
        gateway.handle(&new, register("Lab-PC", Some("ABC123"))).await;

        assert!(matches!(
            new_rx.recv().await.unwrap(),
            ServerEvent::Registered { .. }
        ));
        assert_eq!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::stopped_source(durable.clone())
        );
        assert_eq!(gateway.registry().registered_count().await, 1);

        // The stale connection closing leaves the new one registered
        gateway.disconnect(&old).await;
        assert_eq!(gateway.registry().identity_of(&new.connection).await, Some(durable));
    }

    #[tokio::test]
    async fn test_source_initiated_stop() {
        let gateway = gateway();
        let (source, _source_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&source, register("Desk", None)).await;
        let identity = SourceId::from(&source.connection);
        gateway
            .handle(
                &viewer,
                ClientEvent::RequestStream {
                    computer_id: identity.clone(),
                },
            )
            .await;
        viewer_rx.recv().await.unwrap();

        gateway
            .handle(
                &source,
                ClientEvent::StopStream {
                    computer_id: None,
                    viewer_id: Some(viewer.connection.clone()),
                },
            )
            .await;

        assert_eq!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::stopped_source(identity)
        );
    }

    #[tokio::test]
    async fn test_heartbeat_and_frames_refresh_liveness() {
        let gateway = gateway();
        let (source, _source_rx) = open(&gateway).await;
        gateway.handle(&source, register("Desk", None)).await;
        let identity = SourceId::from(&source.connection);
        let before = gateway.registry().live_source(&identity).await.unwrap().last_seen;

        tokio::time::sleep(Duration::from_millis(5)).await;
        gateway
            .handle(
                &source,
                ClientEvent::Heartbeat {
                    computer_name: Some("Desk".into()),
                    timestamp: None,
                    active_streams: 0,
                },
            )
            .await;

        let after = gateway.registry().live_source(&identity).await.unwrap().last_seen;
        assert!(after > before);
    }

    #[tokio::test]
    async fn test_reaper_eviction_ends_sessions() {
        let gateway = gateway();
        let durable = gateway.register_durable("Lab-PC", "ABC123").await.unwrap();
        let (source, _source_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&source, register("Lab-PC", Some("ABC123"))).await;
        gateway
            .handle(
                &viewer,
                ClientEvent::RequestStream {
                    computer_id: durable.clone(),
                },
            )
            .await;
        viewer_rx.recv().await.unwrap();

        let reaper =
            StaleConnectionReaper::new(Arc::clone(gateway.registry()), Arc::clone(&gateway));
        let evicted = reaper
            .sweep_at(Instant::now() + Duration::from_secs(61))
            .await;

        assert_eq!(evicted, 1);
        assert_eq!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::stopped_source(durable.clone())
        );
        assert_eq!(
            gateway
                .registry()
                .registered_source(&durable)
                .await
                .unwrap()
                .status,
            SourceStatus::Offline
        );
        assert_eq!(gateway.stats().snapshot().sources_evicted, 1);

        // Frames from the evicted connection go nowhere
        gateway.handle(&source, frame(&viewer, 9)).await;
        assert!(viewer_rx.try_recv().is_err());
        assert_eq!(
            gateway.relay().session_state(&durable, &viewer.connection).await,
            None::<RelayState>
        );
    }

    #[tokio::test]
    async fn test_eviction_closes_outbound_channel() {
        let gateway = gateway();
        let (source, mut source_rx) = open(&gateway).await;
        gateway.handle(&source, register("Desk", None)).await;

        let reaper =
            StaleConnectionReaper::new(Arc::clone(gateway.registry()), Arc::clone(&gateway));
        reaper
            .sweep_at(Instant::now() + Duration::from_secs(61))
            .await;

        // Queued events drain, then the channel reports closed
        assert!(matches!(
            source_rx.recv().await.unwrap(),
            ServerEvent::Registered { .. }
        ));
        assert_eq!(source_rx.try_recv(), Err(TryRecvError::Disconnected));
        assert_eq!(gateway.relay().peer_count().await, 0);

        // The socket task then runs the usual cleanup without side effects
        gateway.disconnect(&source).await;
        assert_eq!(gateway.stats().snapshot().active_connections, 0);
    }

    #[tokio::test]
    async fn test_reregister_with_code_ends_sessions_of_previous_identity() {
        let gateway = gateway();
        let durable = gateway.register_durable("Lab-PC", "ABC123").await.unwrap();
        let (source, mut source_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&source, register("Desk", None)).await;
        let ephemeral = SourceId::from(&source.connection);
        gateway.handle(&viewer, request(&ephemeral)).await;
        viewer_rx.recv().await.unwrap();

        gateway.handle(&source, register("Desk", Some("ABC123"))).await;

        assert_eq!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::stopped_source(ephemeral.clone())
        );
        assert_eq!(
            gateway.relay().session_state(&ephemeral, &viewer.connection).await,
            None
        );
        assert_eq!(gateway.relay().session_count().await, 0);

        // Acknowledged twice, the second time under the durable identity
        assert!(matches!(source_rx.recv().await.unwrap(), ServerEvent::Registered { .. }));
        source_rx.recv().await.unwrap(); // start-stream
        assert_eq!(
            source_rx.recv().await.unwrap(),
            ServerEvent::Registered {
                computer_id: durable,
                name: "Lab-PC".into()
            }
        );
    }

    #[tokio::test]
    async fn test_reregister_same_identity_keeps_sessions() {
        let gateway = gateway();
        let durable = gateway.register_durable("Lab-PC", "ABC123").await.unwrap();
        let (source, _source_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&source, register("Lab-PC", Some("ABC123"))).await;
        gateway.handle(&viewer, request(&durable)).await;
        viewer_rx.recv().await.unwrap();

        gateway.handle(&source, register("Lab-PC", Some("ABC123"))).await;

        assert_eq!(
            gateway.relay().session_state(&durable, &viewer.connection).await,
            Some(RelayState::Requested)
        );
        assert!(viewer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_disconnect_teardown_spares_reconnected_source() {
        let gateway = gateway();
        let durable = gateway.register_durable("Lab-PC", "ABC123").await.unwrap();
        let (old, _old_rx) = open(&gateway).await;
        gateway.handle(&old, register("Lab-PC", Some("ABC123"))).await;

        // Registry removal happens, but session teardown is still pending
        let departure = gateway.registry().remove(&old.connection).await.unwrap();

        let (new, _new_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&new, register("Lab-PC", Some("ABC123"))).await;
        gateway.handle(&viewer, request(&durable)).await;
        assert!(matches!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::StreamReady { .. }
        ));

        gateway
            .relay()
            .end_source(&departure.identity, &departure.connection)
            .await;

        assert_eq!(
            gateway.relay().session_state(&durable, &viewer.connection).await,
            Some(RelayState::Requested)
        );
        assert!(viewer_rx.try_recv().is_err());

        gateway.handle(&new, frame(&viewer, 1)).await;
        assert!(matches!(
            viewer_rx.recv().await.unwrap(),
            ServerEvent::WebcamFrame { frame_number: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_late_eviction_teardown_spares_reconnected_source() {
        let gateway = gateway();
        let durable = gateway.register_durable("Lab-PC", "ABC123").await.unwrap();
        let (old, _old_rx) = open(&gateway).await;
        gateway.handle(&old, register("Lab-PC", Some("ABC123"))).await;

        // Sweep detaches the stale connection; eviction handling comes later
        let departures = gateway
            .registry()
            .sweep_at(Instant::now() + Duration::from_secs(61))
            .await;
        assert_eq!(departures.len(), 1);

        let (new, _new_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&new, register("Lab-PC", Some("ABC123"))).await;
        gateway.handle(&viewer, request(&durable)).await;
        viewer_rx.recv().await.unwrap();

        gateway.on_evicted(departures).await;

        assert_eq!(
            gateway.relay().session_state(&durable, &viewer.connection).await,
            Some(RelayState::Requested)
        );
        assert!(viewer_rx.try_recv().is_err());
        assert_eq!(
            gateway.registry().identity_of(&new.connection).await,
            Some(durable)
        );
    }

    #[tokio::test]
    async fn test_frame_with_text_timestamp_is_relayed() {
        let gateway = gateway();
        let (source, _source_rx) = open(&gateway).await;
        let (viewer, mut viewer_rx) = open(&gateway).await;
        gateway.handle(&source, register("Desk", None)).await;
        let identity = SourceId::from(&source.connection);
        gateway.handle(&viewer, request(&identity)).await;
        viewer_rx.recv().await.unwrap();

        let text = json!({
            "event": "webcam-frame",
            "data": {
                "viewerId": viewer.connection,
                "frame": "AAAA",
                "timestamp": "2024-05-01T10:00:00Z",
                "frameNumber": 1
            }
        })
        .to_string();
        gateway.handle_text(&source, &text).await;

        match viewer_rx.recv().await.unwrap() {
            ServerEvent::WebcamFrame { timestamp, .. } => {
                assert_eq!(timestamp, json!("2024-05-01T10:00:00Z"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(gateway.stats().snapshot().frames_received, 1);
        assert_eq!(gateway.stats().snapshot().frames_relayed, 1);
    }

    #[tokio::test]
    async fn test_malformed_text_is_ignored() {
        let gateway = gateway();
        let (ctx, mut rx) = open(&gateway).await;

        gateway.handle_text(&ctx, "{not json").await;
        gateway
            .handle_text(&ctx, r#"{"event":"pair-computer","data":{"connectionCode":"X"}}"#)
            .await;

        assert!(matches!(rx.recv().await.unwrap(), ServerEvent::PairError { .. }));
    }
}

//! The keepalive loop.

use std::sync::Arc;
use std::time::Instant;

use fennec_packet::Packet;
use fennec_protocol::OpcodePair;
use tokio::time::MissedTickBehavior;

use crate::client::ClientInner;
use crate::notice::Notice;

/// Runs until the main connection goes away.
///
/// Every interval: two keepalives on the main connection (the server
/// expects the doubled frame), one on the room-data connection if open,
/// then a [`Notice::Heartbeat`] carrying the wall time of the send
/// sequence.
pub(crate) async fn run(inner: Arc<ClientInner>) {
    let mut interval = tokio::time::interval(inner.config.heartbeat_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the handshake reply already
    // counts as traffic, so skip it.
    interval.tick().await;

    loop {
        interval.tick().await;

        let Some(main) = inner.main_connection() else {
            break;
        };
        if !main.is_open() {
            break;
        }

        let started = Instant::now();
        let keepalive = Packet::new(OpcodePair::KEEPALIVE.0, OpcodePair::KEEPALIVE.1);
        if main.send(&keepalive).await.is_err() || main.send(&keepalive).await.is_err() {
            break;
        }

        if let Some(room) = inner.room_connection() {
            if room.is_open() {
                if let Err(error) = room.send(&keepalive).await {
                    tracing::debug!(%error, "room-data keepalive failed");
                }
            }
        }

        inner.bus.dispatch(Notice::Heartbeat {
            latency: started.elapsed(),
        });
    }

    tracing::debug!("heartbeat loop stopped");
}

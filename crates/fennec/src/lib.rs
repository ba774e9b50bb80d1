//! An async client for a binary, opcode-multiplexed game protocol.
//!
//! The client speaks to the server over up to two TCP connections: the
//! long-lived *main* connection (authentication, whispers, channels) and
//! a per-room *room-data* connection that the server can order replaced
//! at any time. Frames are length-prefixed and identified by a two-byte
//! opcode pair; a dispatcher turns them into typed events, the session
//! state applies them, and applications observe the result as [`Notice`]s
//! on an event bus — persistent handlers for ongoing reactions, one-shot
//! waiters for request/response flows.
//!
//! ```no_run
//! use fennec::{Client, ClientConfig, Keys, NoticeKind};
//!
//! # async fn run(keys: Keys) -> Result<(), fennec::ClientError> {
//! let client = Client::new(ClientConfig::default(), keys);
//!
//! let ready = client.notices().wait_for(NoticeKind::LoginReady).begin();
//! client.connect().await?;
//! ready.wait().await?;
//!
//! client.login("Botty", "<password hash>", "en-1").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod heartbeat;
mod inventory;
mod notice;
mod room;
mod state;
mod trade;

pub use client::Client;
pub use config::{ClientConfig, Keys, TradeErrorScope};
pub use error::{ClientError, LoginFailure};
pub use inventory::Inventory;
pub use notice::{Notice, NoticeKind};
pub use room::{Player, Room};
pub use state::SessionState;
pub use trade::{Trade, TradeRegistry, TradeState};

pub use fennec_events::{EventBus, HandlerError, WaitError, Waiter};
pub use fennec_net::{ConnectionKind, NetError};
pub use fennec_packet::{Packet, PacketError, XorCipher};
pub use fennec_protocol::{Dispatcher, Event, OpcodePair, ProtocolError};

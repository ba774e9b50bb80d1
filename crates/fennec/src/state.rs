//! Session state and frame application.
//!
//! One mutable struct holds everything the server has told us; only the
//! frame task writes to it. [`SessionState::apply`] is a pure-ish state
//! transition: it mutates the struct, then returns the notices to
//! dispatch and the I/O effects to perform — both happen *after* the
//! state lock is released, so notices always observe updated state and
//! no lock is ever held across an `.await`.

use fennec_net::ConnectionKind;
use fennec_packet::Packet;
use fennec_protocol::{Event, OpcodePair, PlatformEvent};

use crate::config::{ClientConfig, TradeErrorScope};
use crate::error::LoginFailure;
use crate::inventory::Inventory;
use crate::notice::Notice;
use crate::room::{Player, Room};
use crate::trade::TradeRegistry;

/// Platform string reported in the handshake reply.
const PLATFORM_OS: &str = "Linux";
/// Runtime version string reported in the handshake reply.
const PLATFORM_RUNTIME: &str = "LNX 29,0,0,140";
/// Language reported in the handshake reply.
const PLATFORM_LANGUAGE: &str = "en";

/// An I/O action requested by frame application, performed by the frame
/// task once the state lock is released.
#[derive(Debug)]
pub(crate) enum Effect {
    /// Store a server-issued fingerprint on one connection.
    SetFingerprint {
        kind: ConnectionKind,
        fingerprint: u8,
    },
    /// Send a frame on the main connection.
    SendMain(Packet),
    /// Start the keepalive loop (idempotent).
    StartHeartbeat,
    /// Close both connections after the login-failure grace period.
    ScheduleDisconnect,
    /// Replace the room-data connection.
    SwitchRoomServer { server_id: u32, host: String },
}

/// What one frame produced: notices to dispatch, effects to perform.
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub notices: Vec<Notice>,
    pub effects: Vec<Effect>,
}

impl Outcome {
    fn notice(notice: Notice) -> Self {
        Self {
            notices: vec![notice],
            effects: Vec::new(),
        }
    }
}

/// Everything the server has told us about this session.
#[derive(Debug, Default)]
pub struct SessionState {
    /// The room we currently occupy, if any.
    pub room: Option<Room>,
    /// Item quantities.
    pub inventory: Inventory,
    /// Channels we are currently in.
    pub channels: Vec<String>,
    /// Username confirmed by the server at login.
    pub username: Option<String>,
    /// Server-issued auth token, XORed into the login frame.
    pub auth_token: u32,
    /// Sequence counter for platform requests.
    pub platform_sequence: u32,
    /// All trades, live and finished.
    pub trades: TradeRegistry,
}

impl SessionState {
    /// Applies one decoded frame received on `source`.
    pub(crate) fn apply(
        &mut self,
        source: ConnectionKind,
        event: Event,
        config: &ClientConfig,
    ) -> Outcome {
        match event {
            Event::RoomJoined { private, name } => {
                self.room = Some(Room::new(name.clone(), private));
                Outcome::notice(Notice::RoomJoined { name, private })
            }

            Event::RoomMessage {
                session_id,
                sender,
                community,
                content,
            } => Outcome::notice(Notice::RoomMessage {
                session_id,
                sender,
                community,
                content,
            }),

            Event::ServerMessage { console, key, args } => {
                Outcome::notice(Notice::ServerMessage { console, key, args })
            }

            Event::LoggedIn {
                session_id,
                username,
                played_time,
                community,
                player_id,
            } => {
                self.username = Some(username.clone());
                Outcome::notice(Notice::LoggedIn {
                    session_id,
                    username,
                    played_time,
                    community,
                    player_id,
                })
            }

            Event::HandshakeAck {
                online_players,
                fingerprint,
                community,
                country,
                auth_token,
            } => {
                self.auth_token = auth_token;

                let mut capability =
                    Packet::new(OpcodePair::CAPABILITY.0, OpcodePair::CAPABILITY.1);
                capability.write_u8(config.community).write_u8(0);

                let mut platform_info =
                    Packet::new(OpcodePair::PLATFORM_INFO.0, OpcodePair::PLATFORM_INFO.1);
                platform_info
                    .write_utf(PLATFORM_LANGUAGE)
                    .write_utf(PLATFORM_OS)
                    .write_utf(PLATFORM_RUNTIME)
                    .write_u8(0);

                Outcome {
                    notices: vec![Notice::LoginReady {
                        online_players,
                        community,
                        country,
                    }],
                    // Reply order is part of the handshake contract.
                    effects: vec![
                        Effect::SetFingerprint {
                            kind: source,
                            fingerprint,
                        },
                        Effect::SendMain(capability),
                        Effect::SendMain(platform_info),
                        Effect::StartHeartbeat,
                    ],
                }
            }

            Event::LoginResult { code, message_key, message } => {
                let failure = LoginFailure::from_code(code);
                tracing::warn!(code, %message_key, %message, "login refused");
                Outcome {
                    notices: vec![Notice::LoginFailed { failure }],
                    effects: vec![Effect::ScheduleDisconnect],
                }
            }

            Event::Ping => Outcome::notice(Notice::Ping),

            Event::InventorySnapshot { entries } => {
                self.inventory.replace(&entries);
                Outcome::notice(Notice::InventoryRefreshed {
                    items: self.inventory.len(),
                })
            }

            Event::InventoryDelta { item_id, quantity } => {
                match self.inventory.set(item_id, quantity) {
                    Some(previous) => Outcome::notice(Notice::ItemUpdated {
                        item_id,
                        previous,
                        quantity,
                    }),
                    None => Outcome::notice(Notice::NewItem {
                        slot: None,
                        item_id,
                        quantity,
                    }),
                }
            }

            Event::NewItem {
                slot,
                item_id,
                quantity,
            } => {
                self.inventory.add(item_id, quantity);
                Outcome::notice(Notice::NewItem {
                    slot,
                    item_id,
                    quantity,
                })
            }

            Event::TradeInvite { session_id } => Outcome {
                notices: self.trades.invite(session_id).into_iter().collect(),
                effects: Vec::new(),
            },

            Event::TradeStart { session_id } => Outcome {
                notices: self.trades.start(session_id),
                effects: Vec::new(),
            },

            Event::TradeItemDelta {
                own_side,
                item_id,
                adding,
                quantity,
            } => Outcome {
                notices: self
                    .trades
                    .item_delta(own_side, item_id, adding, quantity)
                    .into_iter()
                    .collect(),
                effects: Vec::new(),
            },

            Event::TradeLock { own_side, locked } => Outcome {
                notices: self.trades.lock(own_side, locked).into_iter().collect(),
                effects: Vec::new(),
            },

            Event::TradeComplete => Outcome {
                notices: self.trades.complete().into_iter().collect(),
                effects: Vec::new(),
            },

            Event::TradeError { name, code } => Outcome {
                notices: self.apply_trade_error(&name, code, config),
                effects: Vec::new(),
            },

            Event::RoomServerSwitch { server_id, host } => Outcome {
                notices: Vec::new(),
                effects: vec![Effect::SwitchRoomServer { server_id, host }],
            },

            Event::FingerprintUpdate { fingerprint } => Outcome {
                notices: Vec::new(),
                effects: vec![Effect::SetFingerprint {
                    kind: source,
                    fingerprint,
                }],
            },

            Event::Platform(platform) => Outcome {
                notices: self.apply_platform(platform).into_iter().collect(),
                effects: Vec::new(),
            },

            Event::RosterReplace { players } => {
                let players: Vec<Player> = players.into_iter().map(into_player).collect();
                if let Some(room) = &mut self.room {
                    room.players = players.clone();
                }

                let mut notices = self
                    .trades
                    .roster_sync(|id| players.iter().any(|p| p.session_id == id));
                notices.push(Notice::RosterReplaced { players });
                Outcome {
                    notices,
                    effects: Vec::new(),
                }
            }

            Event::PlayerJoined { player } => {
                let player = into_player(player);
                let Some(room) = &mut self.room else {
                    tracing::debug!(name = %player.name, "player joined while not in a room");
                    return Outcome::default();
                };

                let existing = room
                    .players
                    .iter_mut()
                    .find(|p| p.session_id == player.session_id);
                match existing {
                    Some(slot) => {
                        let before = slot.clone();
                        *slot = player.clone();
                        Outcome::notice(Notice::PlayerUpdated {
                            before,
                            after: player,
                        })
                    }
                    None => {
                        room.players.push(player.clone());
                        Outcome::notice(Notice::PlayerJoined { player })
                    }
                }
            }

            Event::PlayerRemoved { session_id } => {
                if let Some(room) = &mut self.room {
                    room.players.retain(|p| p.session_id != session_id);
                }

                let mut notices: Vec<Notice> =
                    self.trades.force_close(session_id).into_iter().collect();
                notices.push(Notice::PlayerRemoved { session_id });
                Outcome {
                    notices,
                    effects: Vec::new(),
                }
            }

            Event::Unhandled { opcode, payload } => {
                tracing::debug!(%opcode, len = payload.len(), "unhandled frame");
                Outcome::notice(Notice::Unhandled { opcode, payload })
            }
        }
    }

    /// Maps a platform event to its notice, maintaining the channel list.
    fn apply_platform(&mut self, platform: PlatformEvent) -> Option<Notice> {
        match platform {
            PlatformEvent::Connected => Some(Notice::PlatformConnected),
            PlatformEvent::ChannelJoinResult { result } => {
                Some(Notice::ChannelJoinResult { result })
            }
            PlatformEvent::ChannelLeaveResult { result } => {
                Some(Notice::ChannelLeaveResult { result })
            }
            PlatformEvent::ChannelWho { sequence, players } => {
                Some(Notice::ChannelWho { sequence, players })
            }
            PlatformEvent::ChannelJoined { name } => {
                if !self.channels.contains(&name) {
                    self.channels.push(name.clone());
                }
                Some(Notice::ChannelJoined { name })
            }
            PlatformEvent::ChannelLeft { name } => {
                self.channels.retain(|c| c != &name);
                Some(Notice::ChannelLeft { name })
            }
            PlatformEvent::ChannelMessage {
                author,
                community,
                channel,
                content,
            } => Some(Notice::ChannelMessage {
                author,
                community,
                channel,
                content,
            }),
            PlatformEvent::TribeMessage { author, content } => {
                Some(Notice::TribeMessage { author, content })
            }
            PlatformEvent::Whisper {
                author,
                community,
                receiver,
                content,
            } => Some(Notice::Whisper {
                author,
                community,
                receiver,
                content,
            }),
            PlatformEvent::MemberConnected { name } => Some(Notice::MemberConnected { name }),
            PlatformEvent::MemberDisconnected { name } => {
                Some(Notice::MemberDisconnected { name })
            }
            PlatformEvent::Unhandled { code, payload } => {
                tracing::debug!(code, len = payload.len(), "unhandled platform event");
                None
            }
        }
    }

    /// Resolves a trade-error frame to a counterparty and applies it.
    ///
    /// The name is matched against the roster; an empty name follows the
    /// configured scope rule instead of guessing.
    fn apply_trade_error(&mut self, name: &str, code: u8, config: &ClientConfig) -> Vec<Notice> {
        let session_id = if name.is_empty() {
            match config.trade_error_scope {
                TradeErrorScope::CurrentTrade => self.trades.current().map(|t| t.counterparty),
                TradeErrorScope::Ignore => None,
            }
        } else {
            self.room
                .as_ref()
                .and_then(|room| room.player_by_name(name))
                .map(|p| p.session_id)
        };

        match session_id {
            Some(id) => self.trades.error(id, code),
            None => {
                tracing::debug!(%name, code, "trade error with no matching trade");
                Vec::new()
            }
        }
    }
}

fn into_player(profile: fennec_protocol::PlayerProfile) -> Player {
    Player {
        session_id: profile.session_id,
        player_id: profile.player_id,
        name: profile.name,
    }
}

// =========================================================================
// Tests
// =========================================================================

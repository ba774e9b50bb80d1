//! The opcode table: one decode function per known frame type.
//!
//! The dispatcher is a pure translation layer. Given a frame it reads the
//! opcode pair, selects the registered layout, and extracts fields in wire
//! order — no retries, no skipped bytes, no state. Session effects happen
//! in the client, *after* decoding, so each opcode handler is unit-testable
//! in isolation.

use std::collections::HashMap;

use fennec_packet::Packet;

use crate::{Event, InventoryEntry, OpcodePair, PlatformEvent, PlayerProfile, ProtocolError};

/// Decodes one frame body (cursor positioned after the opcode pair).
pub type DecodeFn = fn(&mut Packet) -> Result<Event, ProtocolError>;

/// Decodes one legacy frame from its sentinel-separated segments.
pub type LegacyDecodeFn = fn(&[Vec<u8>]) -> Result<Event, ProtocolError>;

/// Byte separating fields inside a legacy-protocol payload.
const LEGACY_SEPARATOR: u8 = 0x01;

/// Maps opcode pairs to decode functions.
///
/// [`Dispatcher::new`] installs the built-in catalogue; additional opcodes
/// can be registered at runtime for forward compatibility. Frames whose
/// pair has no entry decode to [`Event::Unhandled`] — reported, never
/// silently dropped, never an error.
pub struct Dispatcher {
    table: HashMap<OpcodePair, DecodeFn>,
    legacy: HashMap<OpcodePair, LegacyDecodeFn>,
}

impl Dispatcher {
    /// Creates a dispatcher with the built-in opcode catalogue.
    pub fn new() -> Self {
        let mut dispatcher = Self {
            table: HashMap::new(),
            legacy: HashMap::new(),
        };

        dispatcher.register(OpcodePair::ROOM_JOINED, decode_room_joined);
        dispatcher.register(OpcodePair::ROOM_MESSAGE, decode_room_message);
        dispatcher.register(OpcodePair::SERVER_MESSAGE, decode_server_message);
        dispatcher.register(OpcodePair::LOGGED_IN, decode_logged_in);
        dispatcher.register(OpcodePair::HANDSHAKE_ACK, decode_handshake_ack);
        dispatcher.register(OpcodePair::LOGIN_RESULT, decode_login_result);
        dispatcher.register(OpcodePair::PING, |_| Ok(Event::Ping));
        dispatcher.register(OpcodePair::INVENTORY_SNAPSHOT, decode_inventory_snapshot);
        dispatcher.register(OpcodePair::INVENTORY_DELTA, decode_inventory_delta);
        dispatcher.register(OpcodePair::NEW_ITEM, decode_new_item);
        dispatcher.register(OpcodePair::TRADE_INVITE, decode_trade_invite);
        dispatcher.register(OpcodePair::TRADE_ERROR, decode_trade_error);
        dispatcher.register(OpcodePair::TRADE_START, decode_trade_start);
        dispatcher.register(OpcodePair::TRADE_ITEM, decode_trade_item);
        dispatcher.register(OpcodePair::TRADE_LOCK, decode_trade_lock);
        dispatcher.register(OpcodePair::TRADE_COMPLETE, |_| Ok(Event::TradeComplete));
        dispatcher.register(OpcodePair::ROOM_SERVER_SWITCH, decode_room_server_switch);
        dispatcher.register(OpcodePair::FINGERPRINT, decode_fingerprint);
        dispatcher.register(OpcodePair::PLATFORM, decode_platform);
        dispatcher.register(OpcodePair::ROSTER_REPLACE, decode_roster_replace);
        dispatcher.register(OpcodePair::PLAYER_JOINED, decode_player_joined);

        dispatcher.register_legacy(OpcodePair::LEGACY_PLAYER_REMOVED, decode_legacy_player_removed);

        dispatcher
    }

    /// Registers (or replaces) the decoder for an opcode pair.
    pub fn register(&mut self, opcode: OpcodePair, decode: DecodeFn) {
        self.table.insert(opcode, decode);
    }

    /// Registers (or replaces) the decoder for a legacy inner opcode pair.
    pub fn register_legacy(&mut self, opcode: OpcodePair, decode: LegacyDecodeFn) {
        self.legacy.insert(opcode, decode);
    }

    /// Decodes one frame into its [`Event`].
    ///
    /// # Errors
    /// Returns [`ProtocolError`] only for frames whose opcode is known but
    /// whose payload does not match the declared layout. Unknown opcodes
    /// yield `Ok(Event::Unhandled { .. })`.
    pub fn decode(&self, packet: &mut Packet) -> Result<Event, ProtocolError> {
        let opcode = OpcodePair::from(packet.read_code()?);

        if opcode == OpcodePair::LEGACY {
            return self.decode_legacy(packet);
        }

        match self.table.get(&opcode) {
            Some(decode) => decode(packet),
            None => {
                tracing::debug!(%opcode, "no decoder registered for opcode");
                Ok(Event::Unhandled {
                    opcode,
                    payload: packet.take_remaining(),
                })
            }
        }
    }

    /// Decodes a legacy envelope: a string payload whose fields are
    /// separated by a sentinel byte and whose first segment opens with the
    /// inner opcode pair.
    fn decode_legacy(&self, packet: &mut Packet) -> Result<Event, ProtocolError> {
        let data = packet.read_string()?;
        let mut segments = data.split(|&b| b == LEGACY_SEPARATOR);

        let head = segments.next().unwrap_or_default();
        if head.len() < 2 {
            return Err(ProtocolError::Malformed {
                opcode: OpcodePair::LEGACY,
                reason: "legacy payload shorter than its inner opcode pair".into(),
            });
        }
        let inner = OpcodePair(head[0], head[1]);
        let args: Vec<Vec<u8>> = segments.map(<[u8]>::to_vec).collect();

        match self.legacy.get(&inner) {
            Some(decode) => decode(&args),
            None => {
                tracing::debug!(opcode = %inner, "no decoder registered for legacy opcode");
                Ok(Event::Unhandled {
                    opcode: inner,
                    payload: data,
                })
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Built-in decoders — field order mirrors the wire exactly
// ---------------------------------------------------------------------------

fn decode_room_joined(p: &mut Packet) -> Result<Event, ProtocolError> {
    // The wire carries a *public* flag.
    let public = p.read_bool()?;
    Ok(Event::RoomJoined {
        private: !public,
        name: p.read_utf()?,
    })
}

fn decode_room_message(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::RoomMessage {
        session_id: p.read_u32()?,
        sender: p.read_utf()?,
        community: p.read_u8()?,
        content: p.read_utf()?,
    })
}

fn decode_server_message(p: &mut Packet) -> Result<Event, ProtocolError> {
    let console = !p.read_bool()?;
    let key = p.read_utf()?;
    let count = p.read_u8()?;
    let mut args = Vec::with_capacity(count as usize);
    for _ in 0..count {
        args.push(p.read_utf()?);
    }
    Ok(Event::ServerMessage { console, key, args })
}

fn decode_logged_in(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::LoggedIn {
        session_id: p.read_u32()?,
        username: p.read_utf()?,
        played_time: p.read_u32()?,
        community: p.read_u8()?,
        player_id: p.read_u32()?,
    })
}

fn decode_handshake_ack(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::HandshakeAck {
        online_players: p.read_u32()?,
        fingerprint: p.read_u8()?,
        community: p.read_utf()?,
        country: p.read_utf()?,
        auth_token: p.read_u32()?,
    })
}

fn decode_login_result(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::LoginResult {
        code: p.read_u8()?,
        message_key: p.read_utf()?,
        message: p.read_utf()?,
    })
}

fn decode_inventory_snapshot(p: &mut Packet) -> Result<Event, ProtocolError> {
    let count = p.read_u16()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        entries.push(InventoryEntry {
            item_id: p.read_u16()?,
            quantity: p.read_u8()?,
        });
    }
    Ok(Event::InventorySnapshot { entries })
}

fn decode_inventory_delta(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::InventoryDelta {
        item_id: p.read_u16()?,
        quantity: p.read_u8()?,
    })
}

fn decode_new_item(p: &mut Packet) -> Result<Event, ProtocolError> {
    let slot = p.read_u8()?;
    Ok(Event::NewItem {
        slot: (slot != 0).then_some(slot),
        item_id: p.read_u16()?,
        quantity: p.read_u8()?,
    })
}

fn decode_trade_invite(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::TradeInvite {
        session_id: p.read_u32()?,
    })
}

fn decode_trade_error(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::TradeError {
        name: p.read_utf()?,
        code: p.read_u8()?,
    })
}

fn decode_trade_start(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::TradeStart {
        session_id: p.read_u32()?,
    })
}

fn decode_trade_item(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::TradeItemDelta {
        own_side: p.read_bool()?,
        item_id: p.read_u16()?,
        adding: p.read_bool()?,
        quantity: p.read_u8()?,
    })
}

fn decode_trade_lock(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::TradeLock {
        own_side: p.read_bool()?,
        locked: p.read_bool()?,
    })
}

fn decode_room_server_switch(p: &mut Packet) -> Result<Event, ProtocolError> {
    let server_id = p.read_u32()?;
    let host = String::from_utf8(p.read_string()?).map_err(|_| ProtocolError::Malformed {
        opcode: OpcodePair::ROOM_SERVER_SWITCH,
        reason: "host is not valid utf-8".into(),
    })?;
    Ok(Event::RoomServerSwitch { server_id, host })
}

fn decode_fingerprint(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::FingerprintUpdate {
        fingerprint: p.read_u8()?,
    })
}

fn decode_platform(p: &mut Packet) -> Result<Event, ProtocolError> {
    let code = p.read_u16()?;
    let event = match code {
        3 => PlatformEvent::Connected,
        55 => PlatformEvent::ChannelJoinResult {
            result: p.read_u8()?,
        },
        57 => PlatformEvent::ChannelLeaveResult {
            result: p.read_u8()?,
        },
        59 => {
            let sequence = p.read_u32()?;
            let _result = p.read_u8()?;
            let count = p.read_u16()?;
            let mut players = Vec::with_capacity(count as usize);
            for _ in 0..count {
                players.push(p.read_utf()?);
            }
            PlatformEvent::ChannelWho { sequence, players }
        }
        62 => PlatformEvent::ChannelJoined {
            name: p.read_utf()?,
        },
        63 => PlatformEvent::ChannelLeft {
            name: p.read_utf()?,
        },
        64 => PlatformEvent::ChannelMessage {
            author: p.read_utf()?,
            community: p.read_u32()?,
            channel: p.read_utf()?,
            content: p.read_utf()?,
        },
        65 => PlatformEvent::TribeMessage {
            author: p.read_utf()?,
            content: p.read_utf()?,
        },
        66 => PlatformEvent::Whisper {
            author: p.read_utf()?,
            community: p.read_u32()?,
            receiver: p.read_utf()?,
            content: p.read_utf()?,
        },
        88 => PlatformEvent::MemberConnected {
            name: p.read_utf()?,
        },
        90 => PlatformEvent::MemberDisconnected {
            name: p.read_utf()?,
        },
        _ => PlatformEvent::Unhandled {
            code,
            payload: p.take_remaining(),
        },
    };
    Ok(Event::Platform(event))
}

fn decode_roster_replace(p: &mut Packet) -> Result<Event, ProtocolError> {
    let count = p.read_u16()?;
    let mut players = Vec::with_capacity(count as usize);
    for _ in 0..count {
        players.push(PlayerProfile::decode(p)?);
    }
    Ok(Event::RosterReplace { players })
}

fn decode_player_joined(p: &mut Packet) -> Result<Event, ProtocolError> {
    Ok(Event::PlayerJoined {
        player: PlayerProfile::decode(p)?,
    })
}

fn decode_legacy_player_removed(args: &[Vec<u8>]) -> Result<Event, ProtocolError> {
    let raw = args.first().ok_or_else(|| ProtocolError::Malformed {
        opcode: OpcodePair::LEGACY_PLAYER_REMOVED,
        reason: "missing session id segment".into(),
    })?;
    let session_id = std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ProtocolError::Malformed {
            opcode: OpcodePair::LEGACY_PLAYER_REMOVED,
            reason: "session id segment is not a decimal integer".into(),
        })?;
    Ok(Event::PlayerRemoved { session_id })
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_roster;

    fn decode(packet: &mut Packet) -> Event {
        Dispatcher::new().decode(packet).expect("should decode")
    }

    // =====================================================================
    // Session frames
    // =====================================================================

    #[test]
    fn test_decode_handshake_ack_field_order() {
        let mut p = Packet::new(26, 3);
        p.write_u32(500)
            .write_u8(7)
            .write_utf("en")
            .write_utf("be")
            .write_u32(0xCAFE);

        assert_eq!(
            decode(&mut p),
            Event::HandshakeAck {
                online_players: 500,
                fingerprint: 7,
                community: "en".into(),
                country: "be".into(),
                auth_token: 0xCAFE,
            }
        );
    }

    #[test]
    fn test_decode_logged_in() {
        let mut p = Packet::new(26, 2);
        p.write_u32(42)
            .write_utf("Botty")
            .write_u32(123_456)
            .write_u8(0)
            .write_u32(9_001);

        assert_eq!(
            decode(&mut p),
            Event::LoggedIn {
                session_id: 42,
                username: "Botty".into(),
                played_time: 123_456,
                community: 0,
                player_id: 9_001,
            }
        );
    }

    #[test]
    fn test_decode_login_result() {
        let mut p = Packet::new(26, 12);
        p.write_u8(2).write_utf("login.wrong").write_utf("Wrong password");

        assert_eq!(
            decode(&mut p),
            Event::LoginResult {
                code: 2,
                message_key: "login.wrong".into(),
                message: "Wrong password".into(),
            }
        );
    }

    #[test]
    fn test_decode_ping_has_no_fields() {
        assert_eq!(decode(&mut Packet::new(26, 25)), Event::Ping);
    }

    // =====================================================================
    // Room and chat frames
    // =====================================================================

    #[test]
    fn test_decode_room_joined_inverts_public_flag() {
        let mut p = Packet::new(5, 21);
        p.write_bool(true).write_utf("en-1");
        assert_eq!(
            decode(&mut p),
            Event::RoomJoined {
                private: false,
                name: "en-1".into(),
            }
        );

        let mut p = Packet::new(5, 21);
        p.write_bool(false).write_utf("*secret");
        assert_eq!(
            decode(&mut p),
            Event::RoomJoined {
                private: true,
                name: "*secret".into(),
            }
        );
    }

    #[test]
    fn test_decode_room_message() {
        let mut p = Packet::new(6, 6);
        p.write_u32(77).write_utf("Alice").write_u8(1).write_utf("hey");

        assert_eq!(
            decode(&mut p),
            Event::RoomMessage {
                session_id: 77,
                sender: "Alice".into(),
                community: 1,
                content: "hey".into(),
            }
        );
    }

    #[test]
    fn test_decode_server_message_reads_all_args() {
        let mut p = Packet::new(6, 20);
        p.write_bool(true)
            .write_utf("shop.bought")
            .write_u8(2)
            .write_utf("hat")
            .write_utf("50");

        assert_eq!(
            decode(&mut p),
            Event::ServerMessage {
                console: false,
                key: "shop.bought".into(),
                args: vec!["hat".into(), "50".into()],
            }
        );
    }

    // =====================================================================
    // Inventory and trade frames
    // =====================================================================

    #[test]
    fn test_decode_inventory_snapshot() {
        let mut p = Packet::new(31, 1);
        p.write_u16(2)
            .write_u16(800)
            .write_u8(3)
            .write_u16(2_253)
            .write_u8(1);

        assert_eq!(
            decode(&mut p),
            Event::InventorySnapshot {
                entries: vec![
                    InventoryEntry {
                        item_id: 800,
                        quantity: 3
                    },
                    InventoryEntry {
                        item_id: 2_253,
                        quantity: 1
                    },
                ],
            }
        );
    }

    #[test]
    fn test_decode_new_item_slot_zero_means_none() {
        let mut p = Packet::new(100, 67);
        p.write_u8(0).write_u16(10).write_u8(4);
        assert_eq!(
            decode(&mut p),
            Event::NewItem {
                slot: None,
                item_id: 10,
                quantity: 4,
            }
        );

        let mut p = Packet::new(100, 67);
        p.write_u8(2).write_u16(10).write_u8(4);
        assert!(matches!(decode(&mut p), Event::NewItem { slot: Some(2), .. }));
    }

    #[test]
    fn test_decode_trade_item_delta() {
        let mut p = Packet::new(31, 8);
        p.write_bool(true).write_u16(10).write_bool(false).write_u8(3);

        assert_eq!(
            decode(&mut p),
            Event::TradeItemDelta {
                own_side: true,
                item_id: 10,
                adding: false,
                quantity: 3,
            }
        );
    }

    #[test]
    fn test_decode_trade_lock() {
        let mut p = Packet::new(31, 9);
        p.write_bool(false).write_bool(true);
        assert_eq!(
            decode(&mut p),
            Event::TradeLock {
                own_side: false,
                locked: true,
            }
        );
    }

    // =====================================================================
    // Connection management
    // =====================================================================

    #[test]
    fn test_decode_room_server_switch() {
        let mut p = Packet::new(44, 1);
        p.write_u32(1_234).write_string(b"51.75.130.180");

        assert_eq!(
            decode(&mut p),
            Event::RoomServerSwitch {
                server_id: 1_234,
                host: "51.75.130.180".into(),
            }
        );
    }

    #[test]
    fn test_decode_fingerprint_update() {
        let mut p = Packet::new(44, 22);
        p.write_u8(93);
        assert_eq!(decode(&mut p), Event::FingerprintUpdate { fingerprint: 93 });
    }

    // =====================================================================
    // Community platform
    // =====================================================================

    #[test]
    fn test_decode_platform_whisper() {
        let mut p = Packet::new(60, 3);
        p.write_u16(66)
            .write_utf("Alice")
            .write_u32(0)
            .write_utf("Botty")
            .write_utf("psst");

        assert_eq!(
            decode(&mut p),
            Event::Platform(PlatformEvent::Whisper {
                author: "Alice".into(),
                community: 0,
                receiver: "Botty".into(),
                content: "psst".into(),
            })
        );
    }

    #[test]
    fn test_decode_platform_channel_who() {
        let mut p = Packet::new(60, 3);
        p.write_u16(59)
            .write_u32(4)
            .write_u8(1)
            .write_u16(2)
            .write_utf("Alice")
            .write_utf("Bob");

        assert_eq!(
            decode(&mut p),
            Event::Platform(PlatformEvent::ChannelWho {
                sequence: 4,
                players: vec!["Alice".into(), "Bob".into()],
            })
        );
    }

    #[test]
    fn test_decode_platform_unknown_subcode_is_reported() {
        let mut p = Packet::new(60, 3);
        p.write_u16(999).write_u8(5);

        assert_eq!(
            decode(&mut p),
            Event::Platform(PlatformEvent::Unhandled {
                code: 999,
                payload: vec![5],
            })
        );
    }

    // =====================================================================
    // Roster
    // =====================================================================

    #[test]
    fn test_roster_round_trip_preserves_order_and_identity() {
        let players: Vec<PlayerProfile> = (0..5)
            .map(|i| PlayerProfile {
                name: format!("player-{i}"),
                session_id: 100 + i,
                player_id: 9_000 + i,
            })
            .collect();

        let mut frame = encode_roster(&players);
        assert_eq!(
            decode(&mut frame),
            Event::RosterReplace {
                players: players.clone()
            }
        );
    }

    // =====================================================================
    // Legacy protocol
    // =====================================================================

    /// Builds a legacy envelope: inner opcode pair, then sentinel-joined
    /// decimal segments.
    fn legacy_frame(inner: (u8, u8), args: &[&[u8]]) -> Packet {
        let mut data = vec![inner.0, inner.1];
        for arg in args {
            data.push(0x01);
            data.extend_from_slice(arg);
        }
        let mut p = Packet::new(1, 1);
        p.write_string(&data);
        p
    }

    #[test]
    fn test_decode_legacy_player_removed() {
        let mut p = legacy_frame((8, 7), &[b"1234"]);
        assert_eq!(decode(&mut p), Event::PlayerRemoved { session_id: 1234 });
    }

    #[test]
    fn test_decode_legacy_unknown_inner_opcode_is_reported() {
        let mut p = legacy_frame((4, 4), &[b"x"]);
        assert!(matches!(
            decode(&mut p),
            Event::Unhandled {
                opcode: OpcodePair(4, 4),
                ..
            }
        ));
    }

    #[test]
    fn test_decode_legacy_garbage_session_id_is_malformed() {
        let mut p = legacy_frame((8, 7), &[b"not-a-number"]);
        let err = Dispatcher::new().decode(&mut p).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));
    }

    #[test]
    fn test_decode_legacy_short_head_is_malformed() {
        let mut p = Packet::new(1, 1);
        p.write_string(&[8]);
        let err = Dispatcher::new().decode(&mut p).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));
    }

    // =====================================================================
    // Unknown opcodes and extension
    // =====================================================================

    #[test]
    fn test_decode_unknown_opcode_reports_unhandled() {
        let mut p = Packet::new(200, 200);
        p.write_u32(0xABCD);

        assert_eq!(
            decode(&mut p),
            Event::Unhandled {
                opcode: OpcodePair(200, 200),
                payload: vec![0, 0, 0xAB, 0xCD],
            }
        );
    }

    #[test]
    fn test_register_adds_decoder_at_runtime() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(OpcodePair(200, 200), |p| {
            Ok(Event::ServerMessage {
                console: false,
                key: p.read_utf()?,
                args: Vec::new(),
            })
        });

        let mut p = Packet::new(200, 200);
        p.write_utf("extension");
        assert_eq!(
            dispatcher.decode(&mut p).unwrap(),
            Event::ServerMessage {
                console: false,
                key: "extension".into(),
                args: Vec::new(),
            }
        );
    }

    #[test]
    fn test_decode_truncated_frame_is_typed_error() {
        // Handshake-ack with only the online count present.
        let mut p = Packet::new(26, 3);
        p.write_u32(500);
        let err = Dispatcher::new().decode(&mut p).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated(_)));
    }
}

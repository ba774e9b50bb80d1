//! Decoded domain events and their payload types.

use fennec_packet::{Packet, PacketError};

use crate::OpcodePair;

/// A player's wire identity, as carried in roster frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    /// Display name.
    pub name: String,
    /// Per-login session id; changes on every reconnect.
    pub session_id: u32,
    /// Persistent account id.
    pub player_id: u32,
}

impl PlayerProfile {
    /// Reads one profile, fields in wire order.
    pub fn decode(packet: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            name: packet.read_utf()?,
            session_id: packet.read_u32()?,
            player_id: packet.read_u32()?,
        })
    }

    /// Appends this profile in wire order.
    pub fn encode(&self, packet: &mut Packet) {
        packet
            .write_utf(&self.name)
            .write_u32(self.session_id)
            .write_u32(self.player_id);
    }
}

/// One item line of an inventory snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryEntry {
    /// Item id.
    pub item_id: u16,
    /// Absolute quantity held.
    pub quantity: u8,
}

/// Events multiplexed under the community-platform opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The community platform accepted the session.
    Connected,
    /// Result code for a channel-join request.
    ChannelJoinResult {
        /// Server result code (0 = ok).
        result: u8,
    },
    /// Result code for a channel-leave request.
    ChannelLeaveResult {
        /// Server result code (0 = ok).
        result: u8,
    },
    /// Reply to a channel `/who` request.
    ChannelWho {
        /// The request sequence this answers.
        sequence: u32,
        /// Names of the channel's members.
        players: Vec<String>,
    },
    /// The client entered a channel.
    ChannelJoined {
        /// Channel name.
        name: String,
    },
    /// The client left a channel.
    ChannelLeft {
        /// Channel name.
        name: String,
    },
    /// Chat in a joined channel.
    ChannelMessage {
        /// Sender name.
        author: String,
        /// Sender community id.
        community: u32,
        /// Channel name.
        channel: String,
        /// Message text.
        content: String,
    },
    /// Chat on the tribe channel.
    TribeMessage {
        /// Sender name.
        author: String,
        /// Message text.
        content: String,
    },
    /// A private message.
    Whisper {
        /// Sender name.
        author: String,
        /// Sender community id.
        community: u32,
        /// Recipient name.
        receiver: String,
        /// Message text.
        content: String,
    },
    /// A tribe member came online.
    MemberConnected {
        /// Member name.
        name: String,
    },
    /// A tribe member went offline.
    MemberDisconnected {
        /// Member name.
        name: String,
    },
    /// A platform sub-code with no registered layout.
    Unhandled {
        /// The unrecognized sub-code.
        code: u16,
        /// Raw bytes after the sub-code.
        payload: Vec<u8>,
    },
}

/// A frame decoded into its semantic meaning.
///
/// One variant per opcode family; each carries the fields extracted in
/// wire order. Unknown opcode pairs become [`Event::Unhandled`] rather
/// than an error, so forward-compatible callers can log and continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The client entered a room.
    RoomJoined {
        /// Whether the room is private.
        private: bool,
        /// Raw room name, sentinels included.
        name: String,
    },
    /// Chat in the current room.
    RoomMessage {
        /// Sender session id.
        session_id: u32,
        /// Sender name.
        sender: String,
        /// Sender community id.
        community: u8,
        /// Message text.
        content: String,
    },
    /// A translated server announcement.
    ServerMessage {
        /// Whether the message targets the server console channel.
        console: bool,
        /// Translation key.
        key: String,
        /// Translation arguments.
        args: Vec<String>,
    },
    /// Login succeeded.
    LoggedIn {
        /// Per-login session id.
        session_id: u32,
        /// Confirmed username.
        username: String,
        /// Total played time.
        played_time: u32,
        /// Community id.
        community: u8,
        /// Persistent account id.
        player_id: u32,
    },
    /// The server acknowledged the identification frame.
    HandshakeAck {
        /// Players currently online.
        online_players: u32,
        /// Initial rolling fingerprint for this connection.
        fingerprint: u8,
        /// Community code, e.g. `"en"`.
        community: String,
        /// Country code, e.g. `"be"`.
        country: String,
        /// Server-issued auth token, XORed into the login frame.
        auth_token: u32,
    },
    /// Login failed.
    LoginResult {
        /// Numeric failure code.
        code: u8,
        /// Translation key for the failure text.
        message_key: String,
        /// Pre-rendered failure text.
        message: String,
    },
    /// Server-initiated ping.
    Ping,
    /// Full inventory snapshot.
    InventorySnapshot {
        /// Every held item.
        entries: Vec<InventoryEntry>,
    },
    /// New absolute quantity for one inventory item.
    InventoryDelta {
        /// Item id.
        item_id: u16,
        /// New quantity.
        quantity: u8,
    },
    /// A newly acquired item.
    NewItem {
        /// Hotbar slot, if assigned.
        slot: Option<u8>,
        /// Item id.
        item_id: u16,
        /// Quantity acquired.
        quantity: u8,
    },
    /// A trade invitation from another player.
    TradeInvite {
        /// Counterparty session id.
        session_id: u32,
    },
    /// The server aborted a trade.
    TradeError {
        /// Counterparty name; may be empty (see the client's matching rule).
        name: String,
        /// Numeric reason code.
        code: u8,
    },
    /// Both parties accepted; the trade is live.
    TradeStart {
        /// Counterparty session id.
        session_id: u32,
    },
    /// An item moved in or out of the current trade.
    TradeItemDelta {
        /// `true` if the local player's side changed.
        own_side: bool,
        /// Item id.
        item_id: u16,
        /// `true` for add, `false` for remove.
        adding: bool,
        /// Quantity moved.
        quantity: u8,
    },
    /// A lock flag changed on the current trade.
    TradeLock {
        /// `true` if the local player's flag changed.
        own_side: bool,
        /// New flag value.
        locked: bool,
    },
    /// The current trade completed.
    TradeComplete,
    /// The room-data connection must be replaced.
    RoomServerSwitch {
        /// Id to acknowledge on the new connection.
        server_id: u32,
        /// Host of the new room-data server.
        host: String,
    },
    /// The server rotated this connection's fingerprint.
    FingerprintUpdate {
        /// New fingerprint byte.
        fingerprint: u8,
    },
    /// A community-platform event.
    Platform(PlatformEvent),
    /// Full roster replacement for the current room.
    RosterReplace {
        /// The new player list, in server order.
        players: Vec<PlayerProfile>,
    },
    /// A player entered the room (or was updated in place).
    PlayerJoined {
        /// The new or updated profile.
        player: PlayerProfile,
    },
    /// A player left the room (legacy protocol).
    PlayerRemoved {
        /// Session id of the departed player.
        session_id: u32,
    },
    /// A frame with no registered decoder.
    Unhandled {
        /// The unrecognized opcode pair.
        opcode: OpcodePair,
        /// Raw payload after the opcode pair.
        payload: Vec<u8>,
    },
}

/// Builds a full roster-replacement frame from profiles.
///
/// The inverse of the [`Event::RosterReplace`] decoder; used by tests and
/// tooling that script a server.
pub fn encode_roster(players: &[PlayerProfile]) -> Packet {
    let mut packet = Packet::new(OpcodePair::ROSTER_REPLACE.0, OpcodePair::ROSTER_REPLACE.1);
    packet.write_u16(players.len() as u16);
    for player in players {
        player.encode(&mut packet);
    }
    packet
}

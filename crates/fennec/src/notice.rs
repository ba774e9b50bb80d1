//! Notices: the client-level events applications subscribe to.
//!
//! A notice is dispatched *after* the session state mutation it describes,
//! so a handler or waiter awoken by one always observes state at least as
//! new as the notice.

use std::time::Duration;

use fennec_events::Notify;
use fennec_net::ConnectionKind;
use fennec_protocol::OpcodePair;

use crate::error::LoginFailure;
use crate::room::Player;

/// Everything the client reports to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    // -- Session ----------------------------------------------------------
    /// Handshake acknowledged; the client may log in.
    LoginReady {
        /// Players currently online.
        online_players: u32,
        /// Server community code.
        community: String,
        /// Server country code.
        country: String,
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
    /// Login refused. Both connections close after the configured grace.
    LoginFailed {
        /// The mapped refusal.
        failure: LoginFailure,
    },
    /// Server-initiated ping.
    Ping,
    /// One keepalive round completed.
    Heartbeat {
        /// Wall time of the send sequence.
        latency: Duration,
    },

    // -- Room -------------------------------------------------------------
    /// The client entered a room.
    RoomJoined {
        /// Raw room name.
        name: String,
        /// Whether the room is private.
        private: bool,
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
    /// Translated server announcement.
    ServerMessage {
        /// Whether the message targets the console channel.
        console: bool,
        /// Translation key.
        key: String,
        /// Translation arguments.
        args: Vec<String>,
    },
    /// The roster was replaced wholesale.
    RosterReplaced {
        /// The new roster, in server order.
        players: Vec<Player>,
    },
    /// A player entered the room.
    PlayerJoined {
        /// The new profile.
        player: Player,
    },
    /// A present player's profile was refreshed in place.
    PlayerUpdated {
        /// Profile before the refresh.
        before: Player,
        /// Profile after the refresh.
        after: Player,
    },
    /// A player left the room.
    PlayerRemoved {
        /// Session id of the departed player.
        session_id: u32,
    },

    // -- Inventory --------------------------------------------------------
    /// A full inventory snapshot was applied.
    InventoryRefreshed {
        /// Number of distinct items after the snapshot.
        items: usize,
    },
    /// A known item's quantity changed.
    ItemUpdated {
        /// Item id.
        item_id: u16,
        /// Quantity before the change.
        previous: u8,
        /// Quantity after the change.
        quantity: u8,
    },
    /// A previously unseen item was acquired.
    NewItem {
        /// Hotbar slot, if assigned.
        slot: Option<u8>,
        /// Item id.
        item_id: u16,
        /// Quantity acquired.
        quantity: u8,
    },

    // -- Trade ------------------------------------------------------------
    /// A trade invitation arrived.
    TradeInvited {
        /// Counterparty session id.
        session_id: u32,
    },
    /// A trade went live.
    TradeStarted {
        /// Counterparty session id.
        session_id: u32,
    },
    /// An item moved on one side of the current trade.
    TradeItemChanged {
        /// Counterparty session id.
        session_id: u32,
        /// `true` if the local player's side changed.
        own_side: bool,
        /// Item id.
        item_id: u16,
        /// Net quantity of this item on that side after the change.
        quantity: i32,
    },
    /// A lock flag changed on the current trade.
    TradeLockChanged {
        /// Counterparty session id.
        session_id: u32,
        /// `true` if the local player's flag changed.
        own_side: bool,
        /// New flag value.
        locked: bool,
    },
    /// The current trade completed.
    TradeCompleted {
        /// Counterparty session id.
        session_id: u32,
    },
    /// The server aborted a trade.
    TradeErrored {
        /// Counterparty session id.
        session_id: u32,
        /// Numeric reason code.
        code: u8,
    },
    /// A trade ended without completing. Fired exactly once per trade.
    TradeClosed {
        /// Counterparty session id.
        session_id: u32,
    },

    // -- Community platform -----------------------------------------------
    /// The community platform accepted the session.
    PlatformConnected,
    /// A private message arrived.
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

    // -- Infrastructure ---------------------------------------------------
    /// A connection closed (peer-initiated or after an I/O error).
    ConnectionClosed {
        /// Which connection closed.
        kind: ConnectionKind,
    },
    /// A frame with no registered decoder.
    Unhandled {
        /// The unrecognized opcode pair.
        opcode: OpcodePair,
        /// Raw payload after the opcode pair.
        payload: Vec<u8>,
    },
    /// A persistent handler returned an error.
    HandlerFailed {
        /// Kind of the notice the handler was processing.
        source: NoticeKind,
        /// The handler's error, rendered.
        message: String,
    },
}

/// Discriminant of [`Notice`]; what handlers and waiters subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    LoginReady,
    LoggedIn,
    LoginFailed,
    Ping,
    Heartbeat,
    RoomJoined,
    RoomMessage,
    ServerMessage,
    RosterReplaced,
    PlayerJoined,
    PlayerUpdated,
    PlayerRemoved,
    InventoryRefreshed,
    ItemUpdated,
    NewItem,
    TradeInvited,
    TradeStarted,
    TradeItemChanged,
    TradeLockChanged,
    TradeCompleted,
    TradeErrored,
    TradeClosed,
    PlatformConnected,
    Whisper,
    ChannelMessage,
    TribeMessage,
    ChannelWho,
    ChannelJoined,
    ChannelLeft,
    ChannelJoinResult,
    ChannelLeaveResult,
    MemberConnected,
    MemberDisconnected,
    ConnectionClosed,
    Unhandled,
    HandlerFailed,
}

impl Notify for Notice {
    type Kind = NoticeKind;

    fn kind(&self) -> NoticeKind {
        match self {
            Notice::LoginReady { .. } => NoticeKind::LoginReady,
            Notice::LoggedIn { .. } => NoticeKind::LoggedIn,
            Notice::LoginFailed { .. } => NoticeKind::LoginFailed,
            Notice::Ping => NoticeKind::Ping,
            Notice::Heartbeat { .. } => NoticeKind::Heartbeat,
            Notice::RoomJoined { .. } => NoticeKind::RoomJoined,
            Notice::RoomMessage { .. } => NoticeKind::RoomMessage,
            Notice::ServerMessage { .. } => NoticeKind::ServerMessage,
            Notice::RosterReplaced { .. } => NoticeKind::RosterReplaced,
            Notice::PlayerJoined { .. } => NoticeKind::PlayerJoined,
            Notice::PlayerUpdated { .. } => NoticeKind::PlayerUpdated,
            Notice::PlayerRemoved { .. } => NoticeKind::PlayerRemoved,
            Notice::InventoryRefreshed { .. } => NoticeKind::InventoryRefreshed,
            Notice::ItemUpdated { .. } => NoticeKind::ItemUpdated,
            Notice::NewItem { .. } => NoticeKind::NewItem,
            Notice::TradeInvited { .. } => NoticeKind::TradeInvited,
            Notice::TradeStarted { .. } => NoticeKind::TradeStarted,
            Notice::TradeItemChanged { .. } => NoticeKind::TradeItemChanged,
            Notice::TradeLockChanged { .. } => NoticeKind::TradeLockChanged,
            Notice::TradeCompleted { .. } => NoticeKind::TradeCompleted,
            Notice::TradeErrored { .. } => NoticeKind::TradeErrored,
            Notice::TradeClosed { .. } => NoticeKind::TradeClosed,
            Notice::PlatformConnected => NoticeKind::PlatformConnected,
            Notice::Whisper { .. } => NoticeKind::Whisper,
            Notice::ChannelMessage { .. } => NoticeKind::ChannelMessage,
            Notice::TribeMessage { .. } => NoticeKind::TribeMessage,
            Notice::ChannelWho { .. } => NoticeKind::ChannelWho,
            Notice::ChannelJoined { .. } => NoticeKind::ChannelJoined,
            Notice::ChannelLeft { .. } => NoticeKind::ChannelLeft,
            Notice::ChannelJoinResult { .. } => NoticeKind::ChannelJoinResult,
            Notice::ChannelLeaveResult { .. } => NoticeKind::ChannelLeaveResult,
            Notice::MemberConnected { .. } => NoticeKind::MemberConnected,
            Notice::MemberDisconnected { .. } => NoticeKind::MemberDisconnected,
            Notice::ConnectionClosed { .. } => NoticeKind::ConnectionClosed,
            Notice::Unhandled { .. } => NoticeKind::Unhandled,
            Notice::HandlerFailed { .. } => NoticeKind::HandlerFailed,
        }
    }
}

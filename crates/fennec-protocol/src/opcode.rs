//! Opcode pairs: the 2-byte frame type identifiers.

use std::fmt;

/// The two small integers that identify a frame's semantic type.
///
/// Every frame opens with this pair; there are no field tags after it, so
/// the pair selects the entire field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodePair(pub u8, pub u8);

impl OpcodePair {
    // -- Frame envelope ----------------------------------------------------

    /// Legacy-protocol envelope; the payload carries its own inner opcode
    /// pair and sentinel-separated fields.
    pub const LEGACY: Self = Self(1, 1);

    // -- Rooms and chat ----------------------------------------------------

    /// Room-join acknowledgement.
    pub const ROOM_JOINED: Self = Self(5, 21);
    /// Join-room request (outbound).
    pub const JOIN_ROOM: Self = Self(5, 38);
    /// Chat message in the current room (both directions).
    pub const ROOM_MESSAGE: Self = Self(6, 6);
    /// Translated server announcement.
    pub const SERVER_MESSAGE: Self = Self(6, 20);
    /// Raw text command (outbound).
    pub const COMMAND: Self = Self(6, 26);

    // -- Gameplay ----------------------------------------------------------

    /// Play an emote (outbound).
    pub const EMOTE: Self = Self(8, 1);
    /// Capability selection reply to the handshake (outbound).
    pub const CAPABILITY: Self = Self(8, 2);
    /// Show a smiley (outbound).
    pub const SMILEY: Self = Self(8, 5);
    /// Request the shop list (outbound).
    pub const SHOP_LIST: Self = Self(8, 20);

    // -- Tribe -------------------------------------------------------------

    /// Enter the own tribe house (outbound).
    pub const TRIBE_HOUSE: Self = Self(16, 1);
    /// Join another player's tribe house after an invite (outbound).
    pub const TRIBE_HOUSE_INVITE: Self = Self(16, 2);

    // -- Session -----------------------------------------------------------

    /// Login success.
    pub const LOGGED_IN: Self = Self(26, 2);
    /// Handshake acknowledged.
    pub const HANDSHAKE_ACK: Self = Self(26, 3);
    /// Login request (outbound).
    pub const LOGIN: Self = Self(26, 8);
    /// Login failure result.
    pub const LOGIN_RESULT: Self = Self(26, 12);
    /// Server-initiated ping.
    pub const PING: Self = Self(26, 25);
    /// Keepalive (outbound).
    pub const KEEPALIVE: Self = Self(26, 26);

    // -- Handshake and platform info ----------------------------------------

    /// Client identification, the first frame sent (outbound).
    pub const IDENTIFICATION: Self = Self(28, 1);
    /// OS/platform information reply to the handshake (outbound).
    pub const PLATFORM_INFO: Self = Self(28, 17);

    /// Load a scripted payload into the room (outbound).
    pub const LOAD_SCRIPT: Self = Self(29, 1);

    // -- Inventory and trade -------------------------------------------------

    /// Full inventory snapshot (also the outbound request).
    pub const INVENTORY_SNAPSHOT: Self = Self(31, 1);
    /// Quantity change for a known inventory item.
    pub const INVENTORY_DELTA: Self = Self(31, 2);
    /// Trade invitation (also the outbound invite/accept).
    pub const TRADE_INVITE: Self = Self(31, 5);
    /// Trade error / explicit close.
    pub const TRADE_ERROR: Self = Self(31, 6);
    /// Trade started.
    pub const TRADE_START: Self = Self(31, 7);
    /// Item added to or removed from a trade.
    pub const TRADE_ITEM: Self = Self(31, 8);
    /// Lock flag change (also the outbound lock).
    pub const TRADE_LOCK: Self = Self(31, 9);
    /// Trade completed.
    pub const TRADE_COMPLETE: Self = Self(31, 10);

    // -- Connection management ----------------------------------------------

    /// Room-data server reassignment.
    pub const ROOM_SERVER_SWITCH: Self = Self(44, 1);
    /// Rolling fingerprint update.
    pub const FINGERPRINT: Self = Self(44, 22);

    // -- Community platform ---------------------------------------------------

    /// Community-platform envelope (sub-code multiplexed).
    pub const PLATFORM: Self = Self(60, 3);

    /// Newly acquired inventory item.
    pub const NEW_ITEM: Self = Self(100, 67);

    // -- Roster ---------------------------------------------------------------

    /// Full player-list replacement.
    pub const ROSTER_REPLACE: Self = Self(144, 1);
    /// Single player added or updated.
    pub const PLAYER_JOINED: Self = Self(144, 2);

    // -- Legacy inner opcodes -------------------------------------------------

    /// Player removed from the room (legacy protocol only).
    pub const LEGACY_PLAYER_REMOVED: Self = Self(8, 7);
}

impl fmt::Display for OpcodePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

impl From<(u8, u8)> for OpcodePair {
    fn from((c, cc): (u8, u8)) -> Self {
        Self(c, cc)
    }
}

//! The current room and its roster.

/// A player in the current room. Plain data; relations (such as a live
/// trade with this player) are indexed by session id elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Per-login session id; changes on every reconnect.
    pub session_id: u32,
    /// Persistent account id.
    pub player_id: u32,
    /// Display name.
    pub name: String,
}

/// The room the client currently occupies.
///
/// `name` is kept exactly as the wire carries it, sentinel bytes
/// included; the derived accessors interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Raw room name.
    pub name: String,
    /// Whether the room is private.
    pub private: bool,
    /// Current roster, in server order.
    pub players: Vec<Player>,
}

/// Prefix marking rooms outside the public namespace.
const PRIVATE_SENTINEL: char = '*';
/// Byte following `*` in tribe-house room names.
const TRIBE_SENTINEL: char = '\x03';

impl Room {
    /// Creates a room with an empty roster.
    pub fn new(name: impl Into<String>, private: bool) -> Self {
        Self {
            name: name.into(),
            private,
            players: Vec::new(),
        }
    }

    /// Community prefix of the room name; sentinel-prefixed rooms have no
    /// community and report `"xx"`.
    pub fn community(&self) -> &str {
        if self.name.starts_with(PRIVATE_SENTINEL) {
            return "xx";
        }
        match self.name.split_once('-') {
            Some((community, _)) => community,
            None => "xx",
        }
    }

    /// Whether this room is a tribe house.
    pub fn is_tribe_house(&self) -> bool {
        let mut chars = self.name.chars();
        chars.next() == Some(PRIVATE_SENTINEL) && chars.next() == Some(TRIBE_SENTINEL)
    }

    /// Room name with routing sentinels and community prefix stripped.
    pub fn display_name(&self) -> &str {
        if let Some(rest) = self.name.strip_prefix(PRIVATE_SENTINEL) {
            return rest.trim_start_matches(TRIBE_SENTINEL);
        }
        match self.name.split_once('-') {
            Some((_, rest)) => rest,
            None => &self.name,
        }
    }

    /// Looks up a player by session id.
    pub fn player_by_session(&self, session_id: u32) -> Option<&Player> {
        self.players.iter().find(|p| p.session_id == session_id)
    }

    /// Looks up a player by exact name.
    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_community_is_name_prefix() {
        assert_eq!(Room::new("en-1", false).community(), "en");
        assert_eq!(Room::new("fr-salon", false).community(), "fr");
    }

    #[test]
    fn test_community_of_sentinel_room_is_xx() {
        assert_eq!(Room::new("*secret", true).community(), "xx");
        assert_eq!(Room::new("lobby", false).community(), "xx");
    }

    #[test]
    fn test_is_tribe_house_requires_both_sentinels() {
        assert!(Room::new("*\x03MyTribe", true).is_tribe_house());
        assert!(!Room::new("*secret", true).is_tribe_house());
        assert!(!Room::new("en-1", false).is_tribe_house());
    }

    #[test]
    fn test_display_name_strips_sentinels_and_community() {
        assert_eq!(Room::new("*\x03MyTribe", true).display_name(), "MyTribe");
        assert_eq!(Room::new("*secret", true).display_name(), "secret");
        assert_eq!(Room::new("en-1", false).display_name(), "1");
        assert_eq!(Room::new("lobby", false).display_name(), "lobby");
    }

    #[test]
    fn test_player_lookups() {
        let mut room = Room::new("en-1", false);
        room.players.push(Player {
            session_id: 7,
            player_id: 100,
            name: "Alice".into(),
        });

        assert_eq!(room.player_by_session(7).map(|p| p.name.as_str()), Some("Alice"));
        assert_eq!(room.player_by_name("Alice").map(|p| p.session_id), Some(7));
        assert!(room.player_by_session(8).is_none());
        assert!(room.player_by_name("Bob").is_none());
    }
}

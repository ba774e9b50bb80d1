//! The client: connections, frame task, and the outbound command surface.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fennec_events::EventBus;
use fennec_net::{Connection, ConnectionKind, NetEvent};
use fennec_packet::{Packet, XorCipher};
use fennec_protocol::{DecodeFn, Dispatcher, OpcodePair};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, Keys};
use crate::error::ClientError;
use crate::heartbeat;
use crate::notice::{Notice, NoticeKind};
use crate::room::Room;
use crate::state::{Effect, SessionState};

// Identification-frame constants. The server checks these against the
// build it expects; they change only with protocol revisions.
const IDENT_CAPABILITY: u32 = 0x1FBD;
const IDENT_SALT: u32 = 0x6257;
const IDENT_PLATFORM: &str = "Desktop";
const IDENT_REFERRER: &str = "-";
const CLIENT_HASH: &str = "5f0e2a4d9c4b6a1e3d8f7b2c9a0e6d4f8b1c3a5e";
const PLAYER_SETTINGS: &str = "A=t&SA=t&SV=t&EV=t&MP3=t&AE=t&VE=t&ACC=t&PR=t&SP=f&SB=f&DEB=f&V=LNX 29,0,0,140&M=Adobe Linux&R=1920x1080&COL=color&AR=1.0&OS=Linux&ARCH=x86&L=en&PT=Desktop";
/// Loader path echoed in the login frame.
const LOADER_URL: &str = "app:/GameClient.swf/[[DYNAMIC]]/2/[[DYNAMIC]]/4";

/// Hard cap on a single chat payload.
const MAX_MESSAGE_LEN: usize = 255;

// Community-platform request codes.
const CP_CHANNEL_MESSAGE: u16 = 48;
const CP_TRIBE_MESSAGE: u16 = 50;
const CP_WHISPER: u16 = 52;
const CP_JOIN_CHANNEL: u16 = 54;
const CP_LEAVE_CHANNEL: u16 = 56;

/// Shared core behind the [`Client`] handle and its background tasks.
pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) keys: Keys,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) bus: EventBus<Notice>,
    dispatcher: Mutex<Dispatcher>,
    main: Mutex<Option<Connection>>,
    room_data: Mutex<Option<Connection>>,
    /// Port the main connection landed on; the room-data connection
    /// reuses it against the switched host.
    main_port: AtomicU16,
    inbound: Mutex<Option<mpsc::UnboundedSender<NetEvent>>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    frame_task: Mutex<Option<JoinHandle<()>>>,
}

impl ClientInner {
    pub(crate) fn main_connection(&self) -> Option<Connection> {
        lock(&self.main).clone()
    }

    pub(crate) fn room_connection(&self) -> Option<Connection> {
        lock(&self.room_data).clone()
    }

    /// Closes both connections and stops the background tasks.
    async fn shutdown(&self) {
        if let Some(task) = lock(&self.heartbeat).take() {
            task.abort();
        }
        let main = lock(&self.main).take();
        let room = lock(&self.room_data).take();
        if let Some(conn) = main {
            conn.close().await;
        }
        if let Some(conn) = room {
            conn.close().await;
        }
        lock(&self.inbound).take();
        if let Some(task) = lock(&self.frame_task).take() {
            task.abort();
        }
    }
}

/// An async client for the game protocol.
///
/// Owns up to two TCP connections (main + room-data), a frame task that
/// decodes and applies inbound traffic, and the notice bus applications
/// subscribe to. Cloning shares everything.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a disconnected client.
    pub fn new(config: ClientConfig, keys: Keys) -> Self {
        let bus = EventBus::new();

        // Handler failures come back around as a notice, except for
        // failures of HandlerFailed handlers themselves.
        let hook_bus = bus.clone();
        bus.on_handler_error(move |kind, error| {
            if kind == NoticeKind::HandlerFailed {
                tracing::warn!(%error, "HandlerFailed handler failed");
                return;
            }
            hook_bus.dispatch(Notice::HandlerFailed {
                source: kind,
                message: error.to_string(),
            });
        });

        Self {
            inner: Arc::new(ClientInner {
                config,
                keys,
                state: Mutex::new(SessionState::default()),
                bus,
                dispatcher: Mutex::new(Dispatcher::new()),
                main: Mutex::new(None),
                room_data: Mutex::new(None),
                main_port: AtomicU16::new(0),
                inbound: Mutex::new(None),
                heartbeat: Mutex::new(None),
                frame_task: Mutex::new(None),
            }),
        }
    }

    /// The notice bus: register handlers and waiters here.
    pub fn notices(&self) -> &EventBus<Notice> {
        &self.inner.bus
    }

    /// Registers (or replaces) the decoder for an opcode pair, for frame
    /// types this crate does not know about.
    pub fn register_opcode(&self, opcode: OpcodePair, decode: DecodeFn) {
        lock(&self.inner.dispatcher).register(opcode, decode);
    }

    /// Runs a closure against the session state.
    pub fn with_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&lock(&self.inner.state))
    }

    /// The room we currently occupy, if any.
    pub fn room(&self) -> Option<Room> {
        self.with_state(|state| state.room.clone())
    }

    /// Username confirmed by the server, once logged in.
    pub fn username(&self) -> Option<String> {
        self.with_state(|state| state.username.clone())
    }

    // ---------------------------------------------------------------------
    // Connection lifecycle
    // ---------------------------------------------------------------------

    /// Establishes the main connection and sends the identification
    /// frame. The configured ports are tried in order.
    ///
    /// # Errors
    /// [`ClientError::AlreadyConnected`] if a session is already up
    /// (call [`Client::close`] first);
    /// [`fennec_net::NetError::EndpointsExhausted`] (wrapped) once every
    /// port failed.
    pub async fn connect(&self) -> Result<(), ClientError> {
        if self.inner.main_connection().is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.inner.inbound) = Some(tx.clone());

        let cipher = XorCipher::new(self.inner.keys.identification.clone())
            .map_err(|_| ClientError::InvalidArgument("identification key is empty".into()))?;
        let conn = Connection::connect_fallback(
            ConnectionKind::Main,
            &self.inner.config.host,
            &self.inner.config.ports,
            Some(cipher),
            tx,
        )
        .await?;
        self.inner
            .main_port
            .store(conn.peer_addr().port(), Ordering::Relaxed);
        *lock(&self.inner.main) = Some(conn.clone());

        let task = tokio::spawn(run_frames(Arc::clone(&self.inner), rx));
        *lock(&self.inner.frame_task) = Some(task);

        self.send_identification(&conn).await
    }

    /// First frame of every session: who we claim to be.
    async fn send_identification(&self, conn: &Connection) -> Result<(), ClientError> {
        let keys = &self.inner.keys;
        let mut packet = frame(OpcodePair::IDENTIFICATION);
        packet
            .write_u16(keys.version)
            .write_utf(&keys.connection_token)
            .write_utf(IDENT_PLATFORM)
            .write_utf(IDENT_REFERRER)
            .write_u32(IDENT_CAPABILITY)
            .write_utf("")
            .write_utf(CLIENT_HASH)
            .write_utf(PLAYER_SETTINGS)
            .write_u32(0)
            .write_u32(IDENT_SALT)
            .write_utf("");
        conn.send(&packet).await?;
        Ok(())
    }

    /// Logs in. Call after the `LoginReady` notice.
    ///
    /// The password is sent pre-hashed; this crate never sees plaintext
    /// credentials.
    pub async fn login(
        &self,
        username: &str,
        password_hash: &str,
        start_room: &str,
    ) -> Result<(), ClientError> {
        let conn = self.main()?;
        let token = self.with_state(|state| state.auth_token);

        let mut packet = frame(OpcodePair::LOGIN);
        packet
            .write_utf(username)
            .write_utf(password_hash)
            .write_utf(LOADER_URL)
            .write_utf(start_room)
            .write_u32(token ^ self.inner.keys.auth_offset)
            .write_u8(0)
            .write_utf("");
        conn.send_ciphered(&packet).await?;
        Ok(())
    }

    /// Closes both connections and stops the background tasks.
    /// Idempotent; safe from any state.
    pub async fn close(&self) {
        self.inner.shutdown().await;
    }

    // ---------------------------------------------------------------------
    // Chat
    // ---------------------------------------------------------------------

    /// Says something in the current room.
    pub async fn send_room_message(&self, content: &str) -> Result<(), ClientError> {
        let conn = self.room_data()?;
        let mut packet = frame(OpcodePair::ROOM_MESSAGE);
        packet.write_utf(content);
        conn.send_ciphered(&packet).await?;
        Ok(())
    }

    /// Says something on the tribe channel.
    pub async fn send_tribe_message(&self, content: &str) -> Result<(), ClientError> {
        let mut body = Packet::empty();
        body.write_utf(content);
        self.send_platform(CP_TRIBE_MESSAGE, &body).await?;
        Ok(())
    }

    /// Says something in a joined channel.
    pub async fn send_channel_message(
        &self,
        channel: &str,
        content: &str,
    ) -> Result<(), ClientError> {
        let mut body = Packet::empty();
        body.write_utf(channel).write_utf(content);
        self.send_platform(CP_CHANNEL_MESSAGE, &body).await?;
        Ok(())
    }

    /// Sends a private message.
    ///
    /// Angle brackets are escaped (the client UI treats them as markup)
    /// and long messages are split into sequential sends of at most
    /// 255 bytes each.
    pub async fn whisper(&self, receiver: &str, content: &str) -> Result<(), ClientError> {
        let escaped = escape_markup(content);
        for chunk in split_message(&escaped, MAX_MESSAGE_LEN) {
            let mut body = Packet::empty();
            body.write_utf(receiver).write_utf(chunk);
            self.send_platform(CP_WHISPER, &body).await?;
        }
        Ok(())
    }

    /// Sends a raw text command (the leading `/` is not included).
    pub async fn send_command(&self, command: &str) -> Result<(), ClientError> {
        let conn = self.main()?;
        let truncated = split_message(command, MAX_MESSAGE_LEN)[0];
        let mut packet = frame(OpcodePair::COMMAND);
        packet.write_utf(truncated);
        conn.send_ciphered(&packet).await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Rooms and channels
    // ---------------------------------------------------------------------

    /// Asks to join a room by name.
    pub async fn join_room(&self, name: &str) -> Result<(), ClientError> {
        let conn = self.main()?;
        let mut packet = frame(OpcodePair::JOIN_ROOM);
        packet.write_utf("").write_utf(name).write_bool(false);
        conn.send(&packet).await?;
        Ok(())
    }

    /// Enters the own tribe's house.
    pub async fn enter_tribe_house(&self) -> Result<(), ClientError> {
        let conn = self.main()?;
        conn.send(&frame(OpcodePair::TRIBE_HOUSE)).await?;
        Ok(())
    }

    /// Joins the tribe house of an inviting player.
    pub async fn join_tribe_house_of(&self, host: &str) -> Result<(), ClientError> {
        let conn = self.main()?;
        let mut packet = frame(OpcodePair::TRIBE_HOUSE_INVITE);
        packet.write_utf(host);
        conn.send(&packet).await?;
        Ok(())
    }

    /// Joins a chat channel.
    pub async fn join_channel(&self, name: &str, permanent: bool) -> Result<(), ClientError> {
        let mut body = Packet::empty();
        body.write_utf(name).write_bool(permanent);
        self.send_platform(CP_JOIN_CHANNEL, &body).await?;
        Ok(())
    }

    /// Leaves a chat channel.
    pub async fn leave_channel(&self, name: &str) -> Result<(), ClientError> {
        let mut body = Packet::empty();
        body.write_utf(name);
        self.send_platform(CP_LEAVE_CHANNEL, &body).await?;
        Ok(())
    }

    /// Sends a community-platform request and returns its sequence
    /// number, which the matching reply echoes.
    pub async fn send_platform(&self, code: u16, body: &Packet) -> Result<u32, ClientError> {
        let conn = self.main()?;
        let sequence = {
            let mut state = lock(&self.inner.state);
            state.platform_sequence = state.platform_sequence.wrapping_add(1);
            state.platform_sequence
        };

        let mut packet = frame(OpcodePair::PLATFORM);
        packet
            .write_u16(code)
            .write_u32(sequence)
            .write_bytes(body.as_slice());
        conn.send_ciphered(&packet).await?;
        Ok(sequence)
    }

    // ---------------------------------------------------------------------
    // Trade and inventory
    // ---------------------------------------------------------------------

    /// Invites a player to trade.
    pub async fn invite_trade(&self, player_id: u32) -> Result<(), ClientError> {
        self.send_trade_invite(player_id).await
    }

    /// Accepts a pending trade invitation (same frame as the invite).
    pub async fn accept_trade(&self, player_id: u32) -> Result<(), ClientError> {
        self.send_trade_invite(player_id).await
    }

    async fn send_trade_invite(&self, player_id: u32) -> Result<(), ClientError> {
        let conn = self.room_data()?;
        let mut packet = frame(OpcodePair::TRADE_INVITE);
        packet.write_u32(player_id);
        conn.send(&packet).await?;
        Ok(())
    }

    /// Sets the local lock flag on the current trade.
    pub async fn lock_trade(&self, locked: bool) -> Result<(), ClientError> {
        let conn = self.room_data()?;
        let mut packet = frame(OpcodePair::TRADE_LOCK);
        packet.write_bool(locked);
        conn.send(&packet).await?;
        Ok(())
    }

    /// Walks away from the current trade.
    pub async fn close_trade(&self) -> Result<(), ClientError> {
        let conn = self.room_data()?;
        conn.send(&frame(OpcodePair::TRADE_ERROR)).await?;
        Ok(())
    }

    /// Requests a full inventory snapshot.
    pub async fn request_inventory(&self) -> Result<(), ClientError> {
        let conn = self.main()?;
        conn.send(&frame(OpcodePair::INVENTORY_SNAPSHOT)).await?;
        Ok(())
    }

    /// Requests the shop list.
    pub async fn request_shop_list(&self) -> Result<(), ClientError> {
        let conn = self.main()?;
        conn.send(&frame(OpcodePair::SHOP_LIST)).await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Gameplay
    // ---------------------------------------------------------------------

    /// Plays an emote. Emote 10 (the flag emote) carries a country code.
    pub async fn play_emote(&self, id: u8, flag: Option<&str>) -> Result<(), ClientError> {
        let conn = self.room_data()?;
        let mut packet = frame(OpcodePair::EMOTE);
        packet.write_u8(id).write_u32(0);
        if id == 10 {
            packet.write_utf(flag.unwrap_or("be"));
        }
        conn.send(&packet).await?;
        Ok(())
    }

    /// Shows a smiley (ids 0 through 9).
    pub async fn show_smiley(&self, id: u8) -> Result<(), ClientError> {
        if id > 9 {
            return Err(ClientError::InvalidArgument(format!(
                "smiley id {id} out of range 0..=9"
            )));
        }
        let conn = self.room_data()?;
        let mut packet = frame(OpcodePair::SMILEY);
        packet.write_u8(id);
        conn.send(&packet).await?;
        Ok(())
    }

    /// Loads a scripted payload into the current room.
    pub async fn load_script(&self, script: &[u8]) -> Result<(), ClientError> {
        let conn = self.room_data()?;
        let mut packet = frame(OpcodePair::LOAD_SCRIPT);
        packet.write_u24(script.len() as u32).write_bytes(script);
        conn.send(&packet).await?;
        Ok(())
    }

    // ---------------------------------------------------------------------

    fn main(&self) -> Result<Connection, ClientError> {
        self.inner.main_connection().ok_or(ClientError::NotConnected)
    }

    fn room_data(&self) -> Result<Connection, ClientError> {
        self.inner.room_connection().ok_or(ClientError::NotConnected)
    }
}

/// Seeds a packet with a named opcode pair.
fn frame(opcode: OpcodePair) -> Packet {
    Packet::new(opcode.0, opcode.1)
}

// ---------------------------------------------------------------------------
// Frame task
// ---------------------------------------------------------------------------

/// Decodes and applies inbound traffic from both connections.
///
/// For each frame: decode, mutate the session state under its lock,
/// release the lock, perform the requested I/O effects, then dispatch
/// the notices. State is therefore always updated before a notice fires,
/// and no lock is held across an `.await`.
async fn run_frames(inner: Arc<ClientInner>, mut rx: mpsc::UnboundedReceiver<NetEvent>) {
    while let Some(net_event) = rx.recv().await {
        match net_event {
            NetEvent::Frame { kind, mut packet } => {
                let decoded = lock(&inner.dispatcher).decode(&mut packet);
                match decoded {
                    Ok(event) => {
                        let outcome = lock(&inner.state).apply(kind, event, &inner.config);
                        for effect in outcome.effects {
                            perform_effect(&inner, effect).await;
                        }
                        for notice in outcome.notices {
                            inner.bus.dispatch(notice);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%kind, %error, "dropping undecodable frame");
                    }
                }
            }
            NetEvent::Closed { kind, error } => {
                tracing::warn!(%kind, %error, "connection lost");
                match kind {
                    // The room-data connection has no life of its own:
                    // losing the main connection tears it down too.
                    ConnectionKind::Main => {
                        if let Some(task) = lock(&inner.heartbeat).take() {
                            task.abort();
                        }
                        lock(&inner.main).take();
                        let room = lock(&inner.room_data).take();
                        if let Some(room) = room {
                            room.close().await;
                        }
                    }
                    ConnectionKind::RoomData => {
                        lock(&inner.room_data).take();
                    }
                }
                inner.bus.dispatch(Notice::ConnectionClosed { kind });
            }
        }
    }
    tracing::debug!("frame task stopped");
}

async fn perform_effect(inner: &Arc<ClientInner>, effect: Effect) {
    match effect {
        Effect::SetFingerprint { kind, fingerprint } => {
            let conn = match kind {
                ConnectionKind::Main => inner.main_connection(),
                ConnectionKind::RoomData => inner.room_connection(),
            };
            match conn {
                Some(conn) => conn.set_fingerprint(fingerprint),
                None => tracing::debug!(%kind, "fingerprint for an absent connection"),
            }
        }

        Effect::SendMain(packet) => match inner.main_connection() {
            Some(conn) => {
                if let Err(error) = conn.send(&packet).await {
                    tracing::warn!(%error, "handshake reply failed");
                }
            }
            None => tracing::debug!("send requested while disconnected"),
        },

        Effect::StartHeartbeat => start_heartbeat(inner),

        Effect::ScheduleDisconnect => {
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                tokio::time::sleep(inner.config.login_failure_grace).await;
                inner.shutdown().await;
            });
        }

        Effect::SwitchRoomServer { server_id, host } => {
            switch_room_server(inner, server_id, &host).await;
        }
    }
}

/// Starts the keepalive loop unless one is already running.
fn start_heartbeat(inner: &Arc<ClientInner>) {
    let mut guard = lock(&inner.heartbeat);
    if guard.as_ref().is_some_and(|task| !task.is_finished()) {
        return;
    }
    *guard = Some(tokio::spawn(heartbeat::run(Arc::clone(inner))));
}

/// Replaces the room-data connection: the old one is fully closed, the
/// new one connects to the given host on the main connection's port and
/// acknowledges the switch before anything else is sent on it.
async fn switch_room_server(inner: &Arc<ClientInner>, server_id: u32, host: &str) {
    // Take the old connection out before awaiting; the slot's guard must
    // not live across the close.
    let old = lock(&inner.room_data).take();
    if let Some(old) = old {
        old.close().await;
    }
    let Some(tx) = lock(&inner.inbound).clone() else {
        return;
    };

    let port = inner.main_port.load(Ordering::Relaxed);
    let cipher = XorCipher::new(inner.keys.messages.clone()).ok();
    match Connection::connect(ConnectionKind::RoomData, host, port, cipher, tx).await {
        Ok(conn) => {
            let mut ack = frame(OpcodePair::ROOM_SERVER_SWITCH);
            ack.write_u32(server_id);
            if let Err(error) = conn.send(&ack).await {
                tracing::warn!(%error, "room-server switch ack failed");
            }
            *lock(&inner.room_data) = Some(conn);
        }
        Err(error) => {
            tracing::warn!(host, port, %error, "room-data connection failed");
        }
    }
}

// ---------------------------------------------------------------------------

/// Escapes angle brackets, which the client UI treats as markup.
fn escape_markup(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Splits a message into chunks of at most `max` bytes, on char
/// boundaries. Always yields at least one chunk.
fn split_message(text: &str, max: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > max {
        let mut cut = max;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }
    chunks
}

/// Locks a mutex, recovering the guard if a panic elsewhere poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_markup_replaces_angle_brackets() {
        assert_eq!(escape_markup("a <b> c"), "a &lt;b&gt; c");
        assert_eq!(escape_markup("plain"), "plain");
    }

    #[test]
    fn test_split_message_respects_byte_limit() {
        let text = "x".repeat(600);
        let chunks = split_message(&text, 255);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 255);
        assert_eq!(chunks[1].len(), 255);
        assert_eq!(chunks[2].len(), 90);
    }

    #[test]
    fn test_split_message_never_cuts_a_char() {
        // é is two bytes; an odd limit would split it without the
        // boundary check.
        let text = "é".repeat(200);
        for chunk in split_message(&text, 255) {
            assert!(chunk.len() <= 255);
            assert!(std::str::from_utf8(chunk.as_bytes()).is_ok());
        }
    }

    #[test]
    fn test_split_message_empty_input_yields_one_chunk() {
        assert_eq!(split_message("", 255), vec![""]);
    }
}

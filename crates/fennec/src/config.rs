//! Client configuration and credential material.

use std::time::Duration;

/// How to resolve a trade-error frame whose counterparty name is empty.
///
/// The wire sometimes reports a trade error without naming the other
/// party. The matching rule is explicit configuration rather than a
/// guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeErrorScope {
    /// Apply the error to the current trade, if any.
    #[default]
    CurrentTrade,
    /// Drop the frame (logged at debug).
    Ignore,
}

/// Tunable client behavior. All fields have workable defaults.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server hostname or address.
    pub host: String,
    /// Candidate ports for the main connection, tried in order.
    pub ports: Vec<u16>,
    /// Interval between keepalive rounds.
    pub heartbeat_interval: Duration,
    /// Delay between a login-failure notice and the forced disconnect,
    /// giving handlers a chance to observe the failure.
    pub login_failure_grace: Duration,
    /// Matching rule for anonymous trade errors.
    pub trade_error_scope: TradeErrorScope,
    /// Community id sent in the capability reply.
    pub community: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ports: vec![13801, 11801, 12801, 14801],
            heartbeat_interval: Duration::from_secs(15),
            login_failure_grace: Duration::from_secs(5),
            trade_error_scope: TradeErrorScope::default(),
            community: 0,
        }
    }
}

/// Credential material for the handshake and login.
///
/// Obtaining these is deliberately out of scope; the caller supplies
/// them from whatever bootstrap it uses.
#[derive(Debug, Clone)]
pub struct Keys {
    /// Protocol version sent in the identification frame.
    pub version: u16,
    /// Connection token sent in the identification frame.
    pub connection_token: String,
    /// XORed into the server auth token inside the login frame.
    pub auth_offset: u32,
    /// Cipher key for frames sent on the main connection.
    pub identification: Vec<u8>,
    /// Cipher key for frames sent on the room-data connection.
    pub messages: Vec<u8>,
}

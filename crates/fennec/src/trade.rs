//! The trade state machine.
//!
//! One registry per session tracks every trade by counterparty session
//! id. Transitions are frame-driven only; the registry mutates state and
//! reports the notices to dispatch, so every rule here is testable
//! without a socket.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::notice::Notice;

/// Finished trades kept for inspection.
const HISTORY_CAP: usize = 32;

/// Lifecycle of one trade.
///
/// `Invited → Active → {Completed | Errored | Closed}`. There is no way
/// back from a terminal state; a new trade with the same counterparty is
/// a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    /// Invitation seen, not yet accepted by both parties.
    Invited,
    /// Both parties accepted; items and locks are in play.
    Active,
    /// Exchanged successfully.
    Completed,
    /// Aborted by the server with a reason code.
    Errored(u8),
    /// Ended without completing (departure, supersession, explicit close).
    Closed,
}

impl TradeState {
    /// Whether the trade can still change.
    pub fn is_live(self) -> bool {
        matches!(self, TradeState::Invited | TradeState::Active)
    }
}

/// One trade with one counterparty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    /// Counterparty session id.
    pub counterparty: u32,
    /// Current lifecycle state.
    pub state: TradeState,
    /// Net quantity per item on the local side.
    pub own_offer: BTreeMap<u16, i32>,
    /// Net quantity per item on the counterparty side.
    pub their_offer: BTreeMap<u16, i32>,
    /// Local lock flag.
    pub own_locked: bool,
    /// Counterparty lock flag.
    pub their_locked: bool,
}

impl Trade {
    fn new(counterparty: u32, state: TradeState) -> Self {
        Self {
            counterparty,
            state,
            own_offer: BTreeMap::new(),
            their_offer: BTreeMap::new(),
            own_locked: false,
            their_locked: false,
        }
    }
}

/// All trades of the session, live and finished.
///
/// At most one trade is *current* (items and locks apply to it); the
/// registry force-closes a superseded current trade so the invariant
/// holds. Frames for absent or finished trades are ignored with a debug
/// log — late frames after a close are expected, not an error.
#[derive(Debug, Default)]
pub struct TradeRegistry {
    trades: HashMap<u32, Trade>,
    current: Option<u32>,
    history: VecDeque<Trade>,
}

impl TradeRegistry {
    /// The trade with this counterparty, if still tracked as live.
    pub fn get(&self, session_id: u32) -> Option<&Trade> {
        self.trades.get(&session_id)
    }

    /// The current trade, if any.
    pub fn current(&self) -> Option<&Trade> {
        self.current.and_then(|id| self.trades.get(&id))
    }

    /// Finished trades, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Trade> {
        self.history.iter()
    }

    /// Records an invitation. Duplicate invitations are ignored.
    pub fn invite(&mut self, session_id: u32) -> Option<Notice> {
        if self.trades.contains_key(&session_id) {
            tracing::debug!(%session_id, "duplicate trade invite ignored");
            return None;
        }
        self.trades
            .insert(session_id, Trade::new(session_id, TradeState::Invited));
        Some(Notice::TradeInvited { session_id })
    }

    /// Promotes a trade to active and makes it current.
    ///
    /// A different current trade is force-closed first (its TradeClosed
    /// precedes the TradeStarted). A start without a tracked invitation
    /// creates the trade fresh — the counterparty initiated.
    pub fn start(&mut self, session_id: u32) -> Vec<Notice> {
        let mut notices = Vec::new();

        match self.current {
            Some(previous) if previous != session_id => {
                if let Some(notice) = self.force_close(previous) {
                    notices.push(notice);
                }
            }
            _ => {}
        }

        let trade = self
            .trades
            .entry(session_id)
            .or_insert_with(|| Trade::new(session_id, TradeState::Invited));
        trade.state = TradeState::Active;
        self.current = Some(session_id);

        notices.push(Notice::TradeStarted { session_id });
        notices
    }

    /// Applies an item movement to the current trade.
    ///
    /// Quantities accumulate signed; an entry netting zero is removed.
    /// Any delta, from either side, resets **both** lock flags.
    pub fn item_delta(
        &mut self,
        own_side: bool,
        item_id: u16,
        adding: bool,
        quantity: u8,
    ) -> Option<Notice> {
        let Some(trade) = self.current_mut() else {
            tracing::debug!(item_id, "trade item delta without a current trade");
            return None;
        };

        let delta = if adding {
            i32::from(quantity)
        } else {
            -i32::from(quantity)
        };
        let offer = if own_side {
            &mut trade.own_offer
        } else {
            &mut trade.their_offer
        };
        let net = offer.entry(item_id).or_insert(0);
        *net += delta;
        let net = *net;
        if net == 0 {
            offer.remove(&item_id);
        }

        trade.own_locked = false;
        trade.their_locked = false;

        Some(Notice::TradeItemChanged {
            session_id: trade.counterparty,
            own_side,
            item_id,
            quantity: net,
        })
    }

    /// Sets one side's lock flag on the current trade.
    pub fn lock(&mut self, own_side: bool, locked: bool) -> Option<Notice> {
        let Some(trade) = self.current_mut() else {
            tracing::debug!("trade lock without a current trade");
            return None;
        };

        if own_side {
            trade.own_locked = locked;
        } else {
            trade.their_locked = locked;
        }

        Some(Notice::TradeLockChanged {
            session_id: trade.counterparty,
            own_side,
            locked,
        })
    }

    /// Completes the current trade.
    pub fn complete(&mut self) -> Option<Notice> {
        let session_id = self.current.take()?;
        self.finish(session_id, TradeState::Completed);
        Some(Notice::TradeCompleted { session_id })
    }

    /// Applies a server-side trade error.
    pub fn error(&mut self, session_id: u32, code: u8) -> Vec<Notice> {
        if !self.trades.get(&session_id).is_some_and(|t| t.state.is_live()) {
            tracing::debug!(%session_id, code, "trade error for an untracked trade ignored");
            return Vec::new();
        }

        if self.current == Some(session_id) {
            self.current = None;
        }
        self.finish(session_id, TradeState::Errored(code));

        vec![
            Notice::TradeErrored { session_id, code },
            Notice::TradeClosed { session_id },
        ]
    }

    /// Closes a live trade without completion. Returns the TradeClosed
    /// notice, or `None` if the trade is absent or already finished —
    /// each trade closes at most once.
    pub fn force_close(&mut self, session_id: u32) -> Option<Notice> {
        if !self.trades.get(&session_id).is_some_and(|t| t.state.is_live()) {
            return None;
        }

        if self.current == Some(session_id) {
            self.current = None;
        }
        self.finish(session_id, TradeState::Closed);
        Some(Notice::TradeClosed { session_id })
    }

    /// Reconciles live trades against a new roster: trades whose
    /// counterparty departed are force-closed.
    pub fn roster_sync(&mut self, present: impl Fn(u32) -> bool) -> Vec<Notice> {
        let departed: Vec<u32> = self
            .trades
            .iter()
            .filter(|(id, trade)| trade.state.is_live() && !present(**id))
            .map(|(id, _)| *id)
            .collect();

        departed
            .into_iter()
            .filter_map(|id| self.force_close(id))
            .collect()
    }

    fn current_mut(&mut self) -> Option<&mut Trade> {
        self.current.and_then(|id| self.trades.get_mut(&id))
    }

    /// Moves a trade to the bounded history with a terminal state.
    fn finish(&mut self, session_id: u32, state: TradeState) {
        if let Some(mut trade) = self.trades.remove(&session_id) {
            trade.state = state;
            self.history.push_back(trade);
            if self.history.len() > HISTORY_CAP {
                self.history.pop_front();
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_creates_once_and_ignores_duplicates() {
        let mut reg = TradeRegistry::default();

        assert_eq!(reg.invite(7), Some(Notice::TradeInvited { session_id: 7 }));
        assert_eq!(reg.invite(7), None);
        assert_eq!(reg.get(7).unwrap().state, TradeState::Invited);
    }

    #[test]
    fn test_start_promotes_and_sets_current() {
        let mut reg = TradeRegistry::default();
        reg.invite(7);

        assert_eq!(reg.start(7), vec![Notice::TradeStarted { session_id: 7 }]);
        assert_eq!(reg.current().unwrap().counterparty, 7);
        assert_eq!(reg.get(7).unwrap().state, TradeState::Active);
    }

    #[test]
    fn test_start_without_invite_creates_fresh() {
        let mut reg = TradeRegistry::default();
        assert_eq!(reg.start(9), vec![Notice::TradeStarted { session_id: 9 }]);
        assert_eq!(reg.get(9).unwrap().state, TradeState::Active);
    }

    #[test]
    fn test_start_force_closes_the_previous_current_trade() {
        let mut reg = TradeRegistry::default();
        reg.start(7);

        let notices = reg.start(9);
        assert_eq!(
            notices,
            vec![
                Notice::TradeClosed { session_id: 7 },
                Notice::TradeStarted { session_id: 9 },
            ]
        );
        assert_eq!(reg.current().unwrap().counterparty, 9);
        assert!(reg.get(7).is_none());
    }

    #[test]
    fn test_item_delta_accumulates_signed_and_prunes_zero() {
        let mut reg = TradeRegistry::default();
        reg.start(7);

        reg.item_delta(true, 10, true, 3);
        let notice = reg.item_delta(true, 10, true, 2).unwrap();
        assert_eq!(
            notice,
            Notice::TradeItemChanged {
                session_id: 7,
                own_side: true,
                item_id: 10,
                quantity: 5,
            }
        );

        // Net back to zero removes the entry.
        reg.item_delta(true, 10, false, 5);
        assert!(reg.current().unwrap().own_offer.is_empty());
    }

    #[test]
    fn test_item_delta_resets_both_locks() {
        let mut reg = TradeRegistry::default();
        reg.start(7);
        reg.lock(true, true);
        reg.lock(false, true);

        reg.item_delta(false, 10, true, 1);

        let trade = reg.current().unwrap();
        assert!(!trade.own_locked);
        assert!(!trade.their_locked);
    }

    #[test]
    fn test_item_delta_without_current_trade_is_ignored() {
        let mut reg = TradeRegistry::default();
        assert_eq!(reg.item_delta(true, 10, true, 1), None);

        reg.invite(7);
        // Invited but not current yet.
        assert_eq!(reg.item_delta(true, 10, true, 1), None);
    }

    #[test]
    fn test_complete_finishes_into_history() {
        let mut reg = TradeRegistry::default();
        reg.start(7);

        assert_eq!(reg.complete(), Some(Notice::TradeCompleted { session_id: 7 }));
        assert!(reg.current().is_none());
        assert!(reg.get(7).is_none());
        assert_eq!(
            reg.history().last().map(|t| t.state),
            Some(TradeState::Completed)
        );

        // No current trade left to complete.
        assert_eq!(reg.complete(), None);
    }

    #[test]
    fn test_error_emits_errored_then_closed() {
        let mut reg = TradeRegistry::default();
        reg.start(7);

        assert_eq!(
            reg.error(7, 4),
            vec![
                Notice::TradeErrored { session_id: 7, code: 4 },
                Notice::TradeClosed { session_id: 7 },
            ]
        );
        assert_eq!(
            reg.history().last().map(|t| t.state),
            Some(TradeState::Errored(4))
        );

        // A second error for the same trade is a late frame.
        assert!(reg.error(7, 4).is_empty());
    }

    #[test]
    fn test_force_close_fires_exactly_once() {
        let mut reg = TradeRegistry::default();
        reg.start(7);

        assert_eq!(reg.force_close(7), Some(Notice::TradeClosed { session_id: 7 }));
        assert_eq!(reg.force_close(7), None);
    }

    #[test]
    fn test_roster_sync_closes_departed_counterparties() {
        let mut reg = TradeRegistry::default();
        reg.invite(7);
        reg.start(9);

        // Only player 9 is still in the room.
        let notices = reg.roster_sync(|id| id == 9);
        assert_eq!(notices, vec![Notice::TradeClosed { session_id: 7 }]);
        assert!(reg.get(9).is_some());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut reg = TradeRegistry::default();
        for id in 0..(HISTORY_CAP as u32 + 8) {
            reg.start(id);
            reg.complete();
        }
        assert_eq!(reg.history().count(), HISTORY_CAP);
        // Oldest entries were evicted.
        assert_eq!(reg.history().next().map(|t| t.counterparty), Some(8));
    }
}

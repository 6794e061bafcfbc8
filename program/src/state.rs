// Raffle Program - State
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    program_error::ProgramError,
    program_pack::IsInitialized,
    pubkey::Pubkey,
};

use crate::error::RaffleError;

/// Most players a single round can hold
pub const MAX_PLAYERS: usize = 64;

/// Lamports held by an account above its rent-exempt minimum
pub fn held_balance(lamports: u64, rent_exempt_minimum: u64) -> u64 {
    lamports.saturating_sub(rent_exempt_minimum)
}

/// Round state
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// Waiting for the randomness callback
    Calculating,
}

/// Parameters fixed when the raffle is initialized
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Minimum payment to enter, in lamports
    pub entrance_fee: u64,
    /// Minimum seconds between the start of a round and its draw
    pub interval: i64,
    /// Key hash selecting the coordinator's gas lane
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    /// Coordinator program id
    pub vrf_coordinator: Pubkey,
    /// Coordinator config account
    pub coordinator_state: Pubkey,
    /// Subscription account paying for requests
    pub subscription: Pubkey,
}

impl RaffleConfig {
    pub const LEN: usize = 8 + 8 + 32 + 8 + 4 + 32 * 3;
}

/// The randomness request a calculating round waits on
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: u64,
    /// Players eligible to win, captured when the request was made
    pub players: Vec<Pubkey>,
    pub requested_at: UnixTimestamp,
}

impl PendingRequest {
    pub const LEN: usize = 8 + (4 + 32 * MAX_PLAYERS) + 8;
}

/// Outcome of the upkeep predicate
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpkeepReason {
    Ready,
    NotOpen,
    NoPlayers,
    IntervalNotElapsed,
    NoBalance,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpkeepCheck {
    pub upkeep_needed: bool,
    pub reason: UpkeepReason,
}

/// Raffle account data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Raffle {
    pub is_initialized: bool,
    /// Account that initialized the raffle
    pub authority: Pubkey,
    pub config: RaffleConfig,
    pub state: RaffleState,
    /// Start of the current round
    pub last_timestamp: UnixTimestamp,
    /// Entries of the current round in entry order, duplicates allowed
    pub players: Vec<Pubkey>,
    /// Winner of the last resolved round
    pub recent_winner: Option<Pubkey>,
    pub pending_request: Option<PendingRequest>,
    pub rounds_completed: u64,
}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    /// Account size with room for `MAX_PLAYERS` entries and a full snapshot
    pub const LEN: usize = 1
        + 32
        + RaffleConfig::LEN
        + 1
        + 8
        + (4 + 32 * MAX_PLAYERS)
        + (1 + 32)
        + (1 + PendingRequest::LEN)
        + 8;

    /// Opens the first round at `now`
    pub fn new(authority: Pubkey, config: RaffleConfig, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            authority,
            config,
            state: RaffleState::Open,
            last_timestamp: now,
            players: Vec::new(),
            recent_winner: None,
            pending_request: None,
            rounds_completed: 0,
        }
    }

    pub fn unpack(src: &[u8]) -> Result<Self, ProgramError> {
        let mut data = src;
        Self::deserialize(&mut data).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn pack(&self, dst: &mut [u8]) -> ProgramResult {
        let mut data = dst;
        self.serialize(&mut data)
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    /// Records an entry of `payment` lamports for `player`
    pub fn enter(&mut self, payment: u64, player: Pubkey) -> Result<(), RaffleError> {
        if payment < self.config.entrance_fee {
            return Err(RaffleError::InsufficientPayment);
        }
        if self.state != RaffleState::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(RaffleError::RaffleFull);
        }
        self.players.push(player);
        Ok(())
    }

    /// Whether the round should be closed and a draw requested.
    ///
    /// `balance` is the lamports held for the prize. Conditions are checked
    /// in order and the first failing one is reported as the reason.
    pub fn check_upkeep(&self, now: UnixTimestamp, balance: u64) -> UpkeepCheck {
        let reason = if self.state != RaffleState::Open {
            UpkeepReason::NotOpen
        } else if self.players.is_empty() {
            UpkeepReason::NoPlayers
        } else if now.saturating_sub(self.last_timestamp) < self.config.interval {
            UpkeepReason::IntervalNotElapsed
        } else if balance == 0 {
            UpkeepReason::NoBalance
        } else {
            UpkeepReason::Ready
        };

        UpkeepCheck {
            upkeep_needed: reason == UpkeepReason::Ready,
            reason,
        }
    }

    /// Moves the round to calculating, waiting on `request_id`
    pub fn begin_calculating(
        &mut self,
        request_id: u64,
        now: UnixTimestamp,
        balance: u64,
    ) -> Result<(), RaffleError> {
        if !self.check_upkeep(now, balance).upkeep_needed {
            return Err(RaffleError::UpkeepNotNeeded);
        }
        self.state = RaffleState::Calculating;
        self.pending_request = Some(PendingRequest {
            request_id,
            players: self.players.clone(),
            requested_at: now,
        });
        Ok(())
    }

    /// Winner the given words select from the pending request's snapshot
    pub fn pending_winner(
        &self,
        request_id: u64,
        random_words: &[u64],
    ) -> Result<Pubkey, RaffleError> {
        let pending = self
            .pending_request
            .as_ref()
            .filter(|pending| pending.request_id == request_id)
            .ok_or(RaffleError::UnknownRequest)?;
        let word = random_words
            .first()
            .copied()
            .ok_or(RaffleError::InvalidRandomWords)?;
        let index = word
            .checked_rem(pending.players.len() as u64)
            .ok_or(RaffleError::InvalidRandomWords)?;
        Ok(pending.players[index as usize])
    }

    /// Picks the winner and reopens the raffle. Nothing changes on error.
    pub fn resolve(
        &mut self,
        request_id: u64,
        random_words: &[u64],
        now: UnixTimestamp,
    ) -> Result<Pubkey, RaffleError> {
        let winner = self.pending_winner(request_id, random_words)?;
        self.recent_winner = Some(winner);
        self.players.clear();
        self.state = RaffleState::Open;
        self.last_timestamp = now;
        self.pending_request = None;
        self.rounds_completed = self.rounds_completed.saturating_add(1);
        Ok(winner)
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> i64 {
        self.config.interval
    }

    pub fn raffle_state(&self) -> RaffleState {
        self.state
    }

    pub fn number_of_players(&self) -> u64 {
        self.players.len() as u64
    }

    pub fn player(&self, index: u64) -> Result<Pubkey, RaffleError> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.players.get(index))
            .copied()
            .ok_or(RaffleError::IndexOutOfRange)
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn latest_timestamp(&self) -> UnixTimestamp {
        self.last_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRANCE_FEE: u64 = 100;
    const INTERVAL: i64 = 30;
    const START: UnixTimestamp = 1_700_000_000;

    fn raffle() -> Raffle {
        let config = RaffleConfig {
            entrance_fee: ENTRANCE_FEE,
            interval: INTERVAL,
            gas_lane: [7; 32],
            subscription_id: 1,
            callback_gas_limit: 500_000,
            vrf_coordinator: Pubkey::new_unique(),
            coordinator_state: Pubkey::new_unique(),
            subscription: Pubkey::new_unique(),
        };
        Raffle::new(Pubkey::new_unique(), config, START)
    }

    fn calculating(players: &[Pubkey], request_id: u64) -> Raffle {
        let mut raffle = raffle();
        for player in players {
            raffle.enter(ENTRANCE_FEE, *player).unwrap();
        }
        let balance = ENTRANCE_FEE * players.len() as u64;
        raffle
            .begin_calculating(request_id, START + INTERVAL, balance)
            .unwrap();
        raffle
    }

    #[test]
    fn new_raffle_is_open_and_empty() {
        let raffle = raffle();
        assert_eq!(raffle.raffle_state(), RaffleState::Open);
        assert_eq!(raffle.number_of_players(), 0);
        assert_eq!(raffle.recent_winner(), None);
        assert_eq!(raffle.latest_timestamp(), START);
        assert_eq!(raffle.entrance_fee(), ENTRANCE_FEE);
        assert_eq!(raffle.interval(), INTERVAL);
    }

    #[test]
    fn underpaying_entries_are_rejected() {
        let mut raffle = raffle();
        for payment in [0, 1, ENTRANCE_FEE - 1] {
            assert_eq!(
                raffle.enter(payment, Pubkey::new_unique()),
                Err(RaffleError::InsufficientPayment)
            );
        }
        assert!(raffle.players.is_empty());
    }

    #[test]
    fn entries_keep_order_and_duplicates() {
        let mut raffle = raffle();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        raffle.enter(ENTRANCE_FEE, a).unwrap();
        raffle.enter(ENTRANCE_FEE * 2, b).unwrap();
        raffle.enter(ENTRANCE_FEE, a).unwrap();
        assert_eq!(raffle.players, vec![a, b, a]);
        assert_eq!(raffle.player(1), Ok(b));
        assert_eq!(raffle.player(3), Err(RaffleError::IndexOutOfRange));
        assert_eq!(raffle.player(u64::MAX), Err(RaffleError::IndexOutOfRange));
    }

    #[test]
    fn entries_are_closed_while_calculating() {
        let mut raffle = calculating(&[Pubkey::new_unique()], 1);
        assert_eq!(
            raffle.enter(ENTRANCE_FEE, Pubkey::new_unique()),
            Err(RaffleError::RoundNotOpen)
        );
        // fee is checked first
        assert_eq!(
            raffle.enter(0, Pubkey::new_unique()),
            Err(RaffleError::InsufficientPayment)
        );
    }

    #[test]
    fn full_raffle_rejects_entries() {
        let mut raffle = raffle();
        for _ in 0..MAX_PLAYERS {
            raffle.enter(ENTRANCE_FEE, Pubkey::new_unique()).unwrap();
        }
        assert_eq!(
            raffle.enter(ENTRANCE_FEE, Pubkey::new_unique()),
            Err(RaffleError::RaffleFull)
        );
    }

    #[test]
    fn upkeep_needs_every_condition() {
        let mut raffle = raffle();
        let due = START + INTERVAL;

        let check = raffle.check_upkeep(due + 1_000, 0);
        assert!(!check.upkeep_needed);
        assert_eq!(check.reason, UpkeepReason::NoPlayers);

        raffle.enter(ENTRANCE_FEE, Pubkey::new_unique()).unwrap();
        let check = raffle.check_upkeep(due - 1, ENTRANCE_FEE);
        assert_eq!(check.reason, UpkeepReason::IntervalNotElapsed);
        // a clock behind the round start never counts as elapsed
        assert_eq!(
            raffle.check_upkeep(START - 5, ENTRANCE_FEE).reason,
            UpkeepReason::IntervalNotElapsed
        );

        assert_eq!(raffle.check_upkeep(due, 0).reason, UpkeepReason::NoBalance);

        let check = raffle.check_upkeep(due, ENTRANCE_FEE);
        assert!(check.upkeep_needed);
        assert_eq!(check.reason, UpkeepReason::Ready);

        raffle.begin_calculating(1, due, ENTRANCE_FEE).unwrap();
        let check = raffle.check_upkeep(due, ENTRANCE_FEE);
        assert!(!check.upkeep_needed);
        assert_eq!(check.reason, UpkeepReason::NotOpen);
    }

    #[test]
    fn begin_calculating_requires_upkeep() {
        let mut raffle = raffle();
        raffle.enter(ENTRANCE_FEE, Pubkey::new_unique()).unwrap();
        assert_eq!(
            raffle.begin_calculating(1, START + INTERVAL - 1, ENTRANCE_FEE),
            Err(RaffleError::UpkeepNotNeeded)
        );
        assert_eq!(raffle.raffle_state(), RaffleState::Open);
        assert!(raffle.pending_request.is_none());

        raffle
            .begin_calculating(1, START + INTERVAL, ENTRANCE_FEE)
            .unwrap();
        // a second trigger cannot issue another request
        assert_eq!(
            raffle.begin_calculating(2, START + INTERVAL, ENTRANCE_FEE),
            Err(RaffleError::UpkeepNotNeeded)
        );
        assert_eq!(raffle.pending_request.as_ref().unwrap().request_id, 1);
    }

    #[test]
    fn resolve_selects_word_modulo_snapshot() {
        let players = [
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        ];
        let mut raffle = calculating(&players, 5);
        let resolved_at = START + 100;

        let winner = raffle.resolve(5, &[7], resolved_at).unwrap();

        assert_eq!(winner, players[1]);
        assert_eq!(raffle.recent_winner(), Some(players[1]));
        assert_eq!(raffle.number_of_players(), 0);
        assert_eq!(raffle.raffle_state(), RaffleState::Open);
        assert_eq!(raffle.latest_timestamp(), resolved_at);
        assert!(raffle.pending_request.is_none());
        assert_eq!(raffle.rounds_completed, 1);
    }

    #[test]
    fn failed_resolution_changes_nothing() {
        let players = [Pubkey::new_unique(), Pubkey::new_unique()];
        let mut raffle = calculating(&players, 5);
        let before = raffle.clone();

        assert_eq!(
            raffle.resolve(6, &[1], START + 100),
            Err(RaffleError::UnknownRequest)
        );
        assert_eq!(
            raffle.resolve(5, &[], START + 100),
            Err(RaffleError::InvalidRandomWords)
        );
        assert_eq!(raffle, before);
    }

    #[test]
    fn resolve_without_pending_request_is_unknown() {
        let mut raffle = raffle();
        raffle.enter(ENTRANCE_FEE, Pubkey::new_unique()).unwrap();
        assert_eq!(
            raffle.resolve(1, &[0], START + 100),
            Err(RaffleError::UnknownRequest)
        );
    }

    #[test]
    fn full_account_fits_its_allocation() {
        let mut raffle = raffle();
        for _ in 0..MAX_PLAYERS {
            raffle.enter(ENTRANCE_FEE, Pubkey::new_unique()).unwrap();
        }
        raffle
            .begin_calculating(u64::MAX, START + INTERVAL, ENTRANCE_FEE)
            .unwrap();
        raffle.recent_winner = Some(Pubkey::new_unique());

        let mut data = vec![0u8; Raffle::LEN];
        raffle.pack(&mut data).unwrap();
        assert_eq!(Raffle::unpack(&data).unwrap(), raffle);
    }

    #[test]
    fn zeroed_account_is_uninitialized() {
        let data = vec![0u8; Raffle::LEN];
        let raffle = Raffle::unpack(&data).unwrap();
        assert!(!raffle.is_initialized());
    }

    #[test]
    fn held_balance_excludes_rent() {
        assert_eq!(held_balance(1_500, 1_000), 500);
        assert_eq!(held_balance(900, 1_000), 0);
    }
}

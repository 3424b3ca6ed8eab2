use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    msg,
    program_error::ProgramError,
    program_pack::IsInitialized,
    pubkey::Pubkey,
};

use crate::{
    error::RaffleError,
    instruction::RaffleParams,
    oracle::{RandomnessOracle, RandomnessRequest},
};

/// Seed of the raffle account PDA
pub const RAFFLE_SEED: &[u8] = b"raffle";
/// Entries one round can hold; bounds the account allocation
pub const MAX_PLAYERS: usize = 250;
/// Random words requested per round
pub const NUM_WORDS: u32 = 1;
/// Block confirmations the coordinator waits before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;

/// Find the raffle account address for a program
pub fn find_raffle_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED], program_id)
}

/// Phase of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries and winner requests
    Open,
    /// Waiting for the coordinator's randomness
    Calculating,
}

/// Settings fixed at construction
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Exact payment per entry, in lamports
    pub entrance_fee: u64,
    /// Minimum round length in seconds
    pub interval: u64,
    /// Coordinator program trusted for randomness
    pub vrf_coordinator: Pubkey,
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
}

impl RaffleConfig {
    pub const LEN: usize = 8 + 8 + 32 + 32 + 8 + 4;

    pub fn new(params: RaffleParams, vrf_coordinator: Pubkey) -> Self {
        Self {
            entrance_fee: params.entrance_fee,
            interval: params.interval,
            vrf_coordinator,
            key_hash: params.key_hash,
            subscription_id: params.subscription_id,
            callback_gas_limit: params.callback_gas_limit,
        }
    }

    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.entrance_fee == 0 {
            return Err(RaffleError::InvalidEntranceFee.into());
        }
        if self.interval == 0 || i64::try_from(self.interval).is_err() {
            return Err(RaffleError::InvalidInterval.into());
        }
        Ok(())
    }

    fn randomness_request(&self) -> RandomnessRequest {
        RandomnessRequest {
            key_hash: self.key_hash,
            subscription_id: self.subscription_id,
            request_confirmations: REQUEST_CONFIRMATIONS,
            callback_gas_limit: self.callback_gas_limit,
            num_words: NUM_WORDS,
        }
    }
}

/// Funds released by a completed round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payout {
    pub winner: Pubkey,
    pub amount: u64,
}

/// Raffle account data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Raffle {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Bump of the raffle PDA, used to sign coordinator requests
    pub bump: u8,
    pub config: RaffleConfig,
    pub state: RaffleState,
    /// Entrants in entry order; one element per entry
    pub players: Vec<Pubkey>,
    /// Entrance fees held since the last payout
    pub pool_balance: u64,
    /// Start of the current round
    pub last_timestamp: UnixTimestamp,
    pub recent_winner: Option<Pubkey>,
    /// Set only while calculating
    pub pending_request_id: Option<u64>,
    pub rounds_completed: u64,
}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    /// Allocation needed for a full player list
    pub const LEN: usize = 1
        + 1
        + RaffleConfig::LEN
        + 1
        + (4 + 32 * MAX_PLAYERS)
        + 8
        + 8
        + (1 + 32)
        + (1 + 8)
        + 8;

    pub fn new(config: RaffleConfig, bump: u8, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            bump,
            config,
            state: RaffleState::Open,
            players: Vec::new(),
            pool_balance: 0,
            last_timestamp: now,
            recent_winner: None,
            pending_request_id: None,
            rounds_completed: 0,
        }
    }

    /// Deserialize an initialized raffle from account data
    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        let raffle =
            Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)?;
        if !raffle.is_initialized() {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(raffle)
    }

    pub fn store(&self, data: &mut [u8]) -> Result<(), ProgramError> {
        let mut writer = data;
        self.serialize(&mut writer)
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    /// Record one entry paid with `payment` lamports
    pub fn enter(&mut self, player: Pubkey, payment: u64) -> Result<(), ProgramError> {
        if self.state != RaffleState::Open {
            return Err(RaffleError::RaffleNotOpen.into());
        }
        if payment < self.config.entrance_fee {
            msg!(
                "Payment of {} lamports is below the entrance fee of {}",
                payment,
                self.config.entrance_fee
            );
            return Err(RaffleError::InsufficientPayment.into());
        }
        if payment > self.config.entrance_fee {
            msg!(
                "Payment of {} lamports exceeds the entrance fee of {}",
                payment,
                self.config.entrance_fee
            );
            return Err(RaffleError::ExcessPayment.into());
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(RaffleError::RaffleFull.into());
        }

        let pool_balance = self
            .pool_balance
            .checked_add(payment)
            .ok_or(RaffleError::Overflow)?;

        self.players.push(player);
        self.pool_balance = pool_balance;
        Ok(())
    }

    /// Close the round and request randomness, returning the request id.
    /// The raffle is left untouched if the oracle rejects the request.
    pub fn request_winner<O: RandomnessOracle>(
        &mut self,
        now: UnixTimestamp,
        oracle: &mut O,
    ) -> Result<u64, ProgramError> {
        if self.state != RaffleState::Open {
            return Err(RaffleError::RaffleNotOpen.into());
        }
        if !self.interval_elapsed(now) {
            msg!(
                "Round started at {}, interval of {}s not elapsed at {}",
                self.last_timestamp,
                self.config.interval,
                now
            );
            return Err(RaffleError::TooEarly.into());
        }
        if self.players.is_empty() {
            return Err(RaffleError::NoPlayers.into());
        }

        let request_id = oracle.request_random_words(&self.config.randomness_request())?;

        self.state = RaffleState::Calculating;
        self.pending_request_id = Some(request_id);
        Ok(request_id)
    }

    /// Settle the pending round with the coordinator's randomness.
    ///
    /// Returns the payout the caller must transfer; the raffle is reset for
    /// the next round only when every check passes.
    pub fn fulfill_random_words(
        &mut self,
        request_id: u64,
        random_words: &[u64],
        now: UnixTimestamp,
    ) -> Result<Payout, ProgramError> {
        if self.state != RaffleState::Calculating {
            return Err(RaffleError::NotCalculatingWinner.into());
        }
        if self.pending_request_id != Some(request_id) {
            msg!(
                "Callback for request {} but {:?} is pending",
                request_id,
                self.pending_request_id
            );
            return Err(RaffleError::RequestIdMismatch.into());
        }
        let random_word = random_words
            .first()
            .copied()
            .ok_or(RaffleError::EmptyRandomWords)?;

        let index = winner_index(random_word, self.players.len()).ok_or(RaffleError::NoPlayers)?;
        let payout = Payout {
            winner: self.players[index],
            amount: self.pool_balance,
        };

        self.players.clear();
        self.pool_balance = 0;
        self.pending_request_id = None;
        self.recent_winner = Some(payout.winner);
        self.last_timestamp = now;
        self.state = RaffleState::Open;
        self.rounds_completed = self.rounds_completed.saturating_add(1);

        Ok(payout)
    }

    /// Whether a winner request would pass its checks at `now`
    pub fn upkeep_needed(&self, now: UnixTimestamp) -> bool {
        self.state == RaffleState::Open
            && self.interval_elapsed(now)
            && !self.players.is_empty()
            && self.pool_balance > 0
    }

    fn interval_elapsed(&self, now: UnixTimestamp) -> bool {
        let interval = i64::try_from(self.config.interval).unwrap_or(i64::MAX);
        now.saturating_sub(self.last_timestamp) >= interval
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> u64 {
        self.config.interval
    }

    pub fn raffle_state(&self) -> RaffleState {
        self.state
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, index: usize) -> Option<Pubkey> {
        self.players.get(index).copied()
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.last_timestamp
    }

    pub fn pool_balance(&self) -> u64 {
        self.pool_balance
    }

    pub fn pending_request_id(&self) -> Option<u64> {
        self.pending_request_id
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }
}

/// Index of the winning entry: `random_word mod player_count`
pub fn winner_index(random_word: u64, player_count: usize) -> Option<usize> {
    let count = u64::try_from(player_count).ok()?;
    random_word
        .checked_rem(count)
        .and_then(|index| usize::try_from(index).ok())
}

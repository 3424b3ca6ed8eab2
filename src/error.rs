use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Entrance fee must be non-zero
    #[error("Entrance fee must be greater than zero")]
    InvalidEntranceFee,

    /// Interval must be non-zero and fit a timestamp difference
    #[error("Interval must be greater than zero")]
    InvalidInterval,

    /// Entry or winner request attempted while a winner is being calculated
    #[error("Raffle is not open")]
    RaffleNotOpen,

    /// Payment below the entrance fee
    #[error("Payment is below the entrance fee")]
    InsufficientPayment,

    /// Payment above the entrance fee
    #[error("Payment exceeds the entrance fee")]
    ExcessPayment,

    /// The raffle account has no room for another entry
    #[error("Raffle is full")]
    RaffleFull,

    /// The round interval has not elapsed yet
    #[error("Raffle interval has not elapsed")]
    TooEarly,

    /// Winner requested for a round without entries
    #[error("Raffle has no players")]
    NoPlayers,

    /// Randomness delivered while no request is in flight
    #[error("Raffle is not calculating a winner")]
    NotCalculatingWinner,

    /// Randomness delivered for a request other than the pending one
    #[error("Request id does not match the pending request")]
    RequestIdMismatch,

    /// Randomness callback carried no words
    #[error("No random words supplied")]
    EmptyRandomWords,

    /// Callback not signed by the configured coordinator authority
    #[error("Callback not signed by the configured coordinator")]
    UnauthorizedOracle,

    /// Coordinator program does not match the raffle configuration
    #[error("Coordinator program does not match configuration")]
    InvalidCoordinator,

    /// Coordinator returned no request id
    #[error("Coordinator did not return a request id")]
    MissingRequestId,

    /// Prize recipient does not match the derived winner
    #[error("Winner account does not match the derived winner")]
    WinnerAccountMismatch,

    /// Arithmetic overflow on balances
    #[error("Arithmetic overflow")]
    Overflow,

    /// A word list does not fit its one-byte count
    #[error("Too many random words")]
    TooManyRandomWords,

    /// Initializer is not the program's upgrade authority
    #[error("Only the upgrade authority can initialize the raffle")]
    UnauthorizedInitializer,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

// Raffle Program - Errors
use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError, program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the Raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Payment is below the entrance fee
    #[error("Not enough lamports to enter the raffle")]
    InsufficientPayment,

    /// Entries are closed while a winner is being calculated
    #[error("Raffle is not open")]
    RoundNotOpen,

    #[error("Upkeep not needed")]
    UpkeepNotNeeded,

    /// Fulfilment does not match the pending randomness request
    #[error("Unknown randomness request")]
    UnknownRequest,

    /// The prize could not be delivered to the winner
    #[error("Transfer to winner failed")]
    TransferFailed,

    #[error("Player index out of range")]
    IndexOutOfRange,

    /// The raffle account has no room for another player
    #[error("Raffle is full")]
    RaffleFull,

    #[error("Invalid random words")]
    InvalidRandomWords,

    /// Fulfilment was not signed by the configured coordinator
    #[error("Fulfilment not signed by the VRF coordinator")]
    UnauthorizedFulfillment,

    /// Coordinator or subscription accounts do not match the raffle config
    #[error("Invalid VRF coordinator accounts")]
    InvalidCoordinator,

    #[error("Invalid raffle configuration")]
    InvalidConfig,

    #[error("Raffle already initialized")]
    AlreadyInitialized,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}

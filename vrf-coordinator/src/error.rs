// VRF Coordinator - Errors
use solana_program::{decode_error::DecodeError, program_error::ProgramError};
use thiserror::Error;

/// Errors that may be returned by the VRF coordinator
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Subscription does not exist or belongs to another coordinator
    #[error("Invalid subscription")]
    InvalidSubscription,

    /// Caller is not a registered consumer of the subscription
    #[error("Invalid consumer")]
    InvalidConsumer,

    #[error("Must be subscription owner")]
    MustBeSubOwner,

    #[error("Too many consumers")]
    TooManyConsumers,

    #[error("Number of words too big")]
    NumWordsTooBig,

    /// Confirmation depth, callback gas limit or word count out of range
    #[error("Invalid request config")]
    InvalidRequestConfig,

    #[error("Nonexistent request")]
    NonexistentRequest,

    /// Override words do not match the requested word count
    #[error("Invalid random words")]
    InvalidRandomWords,

    #[error("Insufficient balance")]
    InsufficientBalance,

    /// Request account already holds a request
    #[error("Request account in use")]
    RequestAccountInUse,

    #[error("Account already initialized")]
    AlreadyInitialized,

    #[error("Arithmetic overflow")]
    Overflow,

    /// Only the coordinator admin may fulfil requests
    #[error("Unauthorized fulfiller")]
    UnauthorizedFulfiller,
}

impl From<CoordinatorError> for ProgramError {
    fn from(e: CoordinatorError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for CoordinatorError {
    fn type_of() -> &'static str {
        "Coordinator Error"
    }
}

use sled::transaction::TransactionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("corrupted record: {0}")]
    Corrupted(String),
}

impl Error {
    pub fn film_not_found(id: u64) -> Self {
        Error::NotFound(format!("film with id={} not found", id))
    }

    pub fn user_not_found(id: u64) -> Self {
        Error::NotFound(format!("user with id={} not found", id))
    }

    /// Storage, codec and corruption failures are not the caller's fault.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Codec(_) | Error::Corrupted(_)
        )
    }
}

impl From<TransactionError<Error>> for Error {
    fn from(err: TransactionError<Error>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => Error::Storage(e),
        }
    }
}

/// First rule a film or user payload broke.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("film name must not be blank")]
    NameBlank,

    #[error("description must be at most {max} characters, got {len}")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("release date must be specified")]
    ReleaseDateMissing,

    #[error("release date before 1895-12-28")]
    ReleaseDateTooEarly,

    #[error("duration must be a positive number")]
    DurationNotPositive,

    #[error("duration is out of range")]
    DurationOutOfRange,

    #[error("email must not be blank and must contain '@'")]
    EmailInvalid,

    #[error("login must not be blank or contain whitespace")]
    LoginInvalid,

    #[error("birthday must be specified")]
    BirthdayMissing,

    #[error("birthday must not be in the future")]
    BirthdayInFuture,

    #[error("users cannot befriend themselves")]
    SelfFriendship,
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::NameBlank => "name",
            ValidationError::DescriptionTooLong { .. } => "description",
            ValidationError::ReleaseDateMissing | ValidationError::ReleaseDateTooEarly => {
                "releaseDate"
            }
            ValidationError::DurationNotPositive | ValidationError::DurationOutOfRange => {
                "duration"
            }
            ValidationError::EmailInvalid => "email",
            ValidationError::LoginInvalid => "login",
            ValidationError::BirthdayMissing | ValidationError::BirthdayInFuture => "birthday",
            ValidationError::SelfFriendship => "friendId",
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The token endpoint refused or could not be reached. Nothing that
    /// needs a credential can proceed.
    #[error("credential exchange failed: {message}")]
    CredentialExchange { message: String },

    #[error("keeper {operation} returned HTTP {status}: {body}")]
    Api {
        operation: String,
        status: u16,
        body: String,
    },

    /// Neither offset nor page parameters produced any records.
    #[error("client directory pagination made no progress with either strategy")]
    PaginationExhausted,

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn credential_exchange(message: impl std::fmt::Display) -> Self {
        Self::CredentialExchange {
            message: message.to_string(),
        }
    }
}

impl keeperlink_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

keeperlink_common::impl_context!();

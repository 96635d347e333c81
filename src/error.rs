//! Error types for the user-mode debugger.

use axerrno::AxError;

use crate::token::Token;

/// Error types for session and command operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The subsystem is not active.
    Inactive,
    /// No live session carries this token.
    UnknownToken(Token),
    /// Every mailbox slot of the session is occupied.
    MailboxFull(Token),
    /// The action kind cannot be enqueued (empty or reserved sentinel).
    InvalidAction(u32),
    /// The thread already has a session.
    AlreadyTracked(Token),
    /// The registry reached its configured capacity.
    RegistryFull,
    /// Session storage could not be reserved.
    NoMemory,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Inactive => write!(f, "User debugger is not active"),
            Self::UnknownToken(token) => write!(f, "Unknown session token: {}", token),
            Self::MailboxFull(token) => write!(f, "Mailbox full for session: {}", token),
            Self::InvalidAction(kind) => write!(f, "Invalid action kind: {}", kind),
            Self::AlreadyTracked(token) => {
                write!(f, "Thread already tracked by session: {}", token)
            }
            Self::RegistryFull => write!(f, "Thread registry is full"),
            Self::NoMemory => write!(f, "Failed to reserve session storage"),
        }
    }
}

impl core::error::Error for Error {}

impl From<Error> for AxError {
    fn from(e: Error) -> Self {
        match e {
            Error::Inactive => axerrno::ax_err_type!(BadState, "user debugger inactive"),
            Error::UnknownToken(_) => axerrno::ax_err_type!(NotFound, "unknown session token"),
            Error::MailboxFull(_) => axerrno::ax_err_type!(ResourceBusy, "mailbox full"),
            Error::InvalidAction(_) => axerrno::ax_err_type!(InvalidInput, "invalid action kind"),
            Error::AlreadyTracked(_) => axerrno::ax_err_type!(AlreadyExists, "thread already tracked"),
            Error::RegistryFull => axerrno::ax_err_type!(NoMemory, "thread registry full"),
            Error::NoMemory => axerrno::ax_err_type!(NoMemory, "session storage"),
        }
    }
}

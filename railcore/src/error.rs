//! Error taxonomy for the game server.
//!
//! Every fallible game operation returns exactly one of these kinds. The
//! session dispatch loop is the single place that turns a `GameError` into a
//! response frame's result code and error payload.

use thiserror::Error;

/// Closed result-code vocabulary returned in every response frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ResultCode {
    Okey = 0,
    BadCommand = 1,
    ResourceNotFound = 2,
    AccessDenied = 3,
    InappropriateGameState = 4,
    Timeout = 5,
    InternalServerError = 500,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("{0}")]
    BadCommand(String),

    #[error("{0}")]
    ResourceNotFound(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    InappropriateGameState(String),

    #[error("{0}")]
    Timeout(String),

    #[error("internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GameError {
    pub fn bad_command(msg: impl Into<String>) -> GameError {
        GameError::BadCommand(msg.into())
    }

    pub fn resource_not_found(msg: impl Into<String>) -> GameError {
        GameError::ResourceNotFound(msg.into())
    }

    pub fn access_denied(msg: impl Into<String>) -> GameError {
        GameError::AccessDenied(msg.into())
    }

    pub fn inappropriate_state(msg: impl Into<String>) -> GameError {
        GameError::InappropriateGameState(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> GameError {
        GameError::Timeout(msg.into())
    }

    /// Human-readable message, used as the `{"error": "..."}` payload.
    pub fn message(&self) -> String {
        match self {
            GameError::Internal(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    pub fn result_code(&self) -> ResultCode {
        match self {
            GameError::BadCommand(_) => ResultCode::BadCommand,
            GameError::ResourceNotFound(_) => ResultCode::ResourceNotFound,
            GameError::AccessDenied(_) => ResultCode::AccessDenied,
            GameError::InappropriateGameState(_) => ResultCode::InappropriateGameState,
            GameError::Timeout(_) => ResultCode::Timeout,
            GameError::Internal(_) => ResultCode::InternalServerError,
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;

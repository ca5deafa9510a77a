//! Wire-level action codes and request/response frames.
//!
//! Requests are `action:u32-LE | msglen:u32-LE | payload:utf8-json`,
//! responses are `result:u32-LE | msglen:u32-LE | payload:utf8-json`.

use serde_json::Value;

use crate::error::{GameError, GameResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Action {
    Login = 1,
    Logout = 2,
    Move = 3,
    Upgrade = 4,
    Turn = 5,
    Player = 6,
    Games = 7,
    Map = 10,
    Observer = 100,
    Game = 101,
    /// Never sent by a client; the tag stored in the action log for
    /// server-originated random-event records replayed by the observer.
    Event = 102,
}

impl Action {
    pub fn from_u32(value: u32) -> GameResult<Action> {
        Ok(match value {
            1 => Action::Login,
            2 => Action::Logout,
            3 => Action::Move,
            4 => Action::Upgrade,
            5 => Action::Turn,
            6 => Action::Player,
            7 => Action::Games,
            10 => Action::Map,
            100 => Action::Observer,
            101 => Action::Game,
            102 => Action::Event,
            other => return Err(GameError::bad_command(format!("No such action: {other}"))),
        })
    }

    /// Actions whose payload is appended to the action log verbatim, once
    /// successfully applied.
    pub fn is_replayed(self) -> bool {
        matches!(self, Action::Login | Action::Logout | Action::Move | Action::Upgrade)
    }
}

/// A fully framed, JSON-decoded inbound request.
#[derive(Clone, Debug)]
pub struct Request {
    pub action: Action,
    pub payload: Value,
}

impl Request {
    /// Requires at least one key present for each group in `groups` (each
    /// group checked with the respective `any`/`all` semantics the caller
    /// wants — see [`Request::require_all`] / [`Request::require_any`]).
    pub fn require_all(&self, keys: &[&str]) -> GameResult<()> {
        let missing = keys.iter().any(|k| self.payload.get(k).is_none());
        if missing {
            return Err(GameError::bad_command(format!(
                "The command's payload does not contain all needed keys, following keys are expected: {keys:?}"
            )));
        }
        Ok(())
    }

    pub fn require_any(&self, keys: &[&str]) -> GameResult<()> {
        let present = keys.iter().any(|k| self.payload.get(k).is_some());
        if !present {
            return Err(GameError::bad_command(format!(
                "The command's payload does not contain all needed keys, following keys are expected: {keys:?}"
            )));
        }
        Ok(())
    }
}

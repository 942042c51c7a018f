//! Crate-level error aggregation.
//!
//! Component errors stay typed at their boundaries (`ClaimError`,
//! `SessionError`, ...) because callers branch on them; `AgrilinkError`
//! exists for facade operations that can fail across boundaries.

use thiserror::Error;

use crate::claim::ClaimError;
use crate::config::ConfigurationError;
use crate::session::SessionError;
use crate::state_machine::TransitionError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AgrilinkError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, AgrilinkError>;

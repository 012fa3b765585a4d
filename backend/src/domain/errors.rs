//! Typed errors surfaced by the domain services.
//!
//! Every operation either succeeds or returns exactly one of these; no
//! operation partially mutates state and then fails. Human-facing message
//! formatting is left to whatever layer sits in front of the services.

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Child not found: {0}")]
    ChildNotFound(String),

    #[error("No reward at position {0}")]
    RewardNotFound(usize),

    #[error("Insufficient points: balance {balance}, cost {cost}")]
    InsufficientPoints { balance: i64, cost: i64 },

    #[error("Cannot delete the last remaining child")]
    LastChild,

    #[error("Name cannot be empty")]
    EmptyName,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

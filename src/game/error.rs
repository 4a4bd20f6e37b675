//! Validation errors surfaced to callers with stable reason codes

use crate::world::Position;

/// Gameplay validation errors; nothing is mutated when one is returned
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Match not found")]
    UnknownMatch,

    #[error("Player not found in match")]
    UnknownPlayer,

    #[error("Player is already moving")]
    AlreadyMoving,

    #[error("Path is empty")]
    EmptyPath,

    #[error("Cell ({}, {}) is outside the world", .0.x, .0.y)]
    OutOfBounds(Position),

    #[error("Cell ({}, {}) is not next to the previous step", .0.x, .0.y)]
    NotAdjacent(Position),

    #[error("Not enough fuel: need {need:.2}, have {have:.2}")]
    InsufficientFuel { need: f64, have: f64 },

    #[error("Drill too weak for this ground")]
    DrillTooWeak,

    #[error("Cargo hold is full")]
    CargoFull,

    #[error("Nothing to grip for climbing")]
    NoWheelSupport,

    #[error("Player is too far from the outpost")]
    NotAtOutpost,

    #[error("Outpost is destroyed")]
    OutpostDestroyed,

    #[error("Not enough credits: need {need:.2}, have {have:.2}")]
    InsufficientCredits { need: f64, have: f64 },

    #[error("Nothing to sell")]
    NothingToSell,

    #[error("Already full")]
    AlreadyFull,

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Item out of stock")]
    OutOfStock,

    #[error("Item not in inventory")]
    ItemNotOwned,

    #[error("Unknown part: {0}")]
    UnknownPart(String),

    #[error("Match is shutting down")]
    Unavailable,
}

impl GameError {
    /// Machine-readable reason for clients
    pub fn code(&self) -> &'static str {
        match self {
            GameError::UnknownMatch => "unknown_match",
            GameError::UnknownPlayer => "unknown_player",
            GameError::AlreadyMoving => "already_moving",
            GameError::EmptyPath => "empty_path",
            GameError::OutOfBounds(_) => "out_of_bounds",
            GameError::NotAdjacent(_) => "not_adjacent",
            GameError::InsufficientFuel { .. } => "insufficient_fuel",
            GameError::DrillTooWeak => "drill_too_weak",
            GameError::CargoFull => "cargo_full",
            GameError::NoWheelSupport => "no_wheel_support",
            GameError::NotAtOutpost => "not_at_outpost",
            GameError::OutpostDestroyed => "outpost_destroyed",
            GameError::InsufficientCredits { .. } => "insufficient_credits",
            GameError::NothingToSell => "nothing_to_sell",
            GameError::AlreadyFull => "already_full",
            GameError::InvalidAmount => "invalid_amount",
            GameError::UnknownItem(_) => "unknown_item",
            GameError::OutOfStock => "out_of_stock",
            GameError::ItemNotOwned => "item_not_owned",
            GameError::UnknownPart(_) => "unknown_part",
            GameError::Unavailable => "unavailable",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GameError::UnknownMatch | GameError::UnknownPlayer)
    }
}

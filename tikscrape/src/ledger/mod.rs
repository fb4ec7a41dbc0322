//! Reversible action ledger.
//!
//! Every mutating workflow records a [`Change`] carrying the commands it
//! sent and the inverse commands that take it back. [`Ledger::undo`]
//! replays those inverses in order.

mod action;
mod store;

pub use action::{Action, Change};
pub use store::{Ledger, UndoReport};

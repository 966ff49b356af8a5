//! Parties domain module: the customers delivery notes are issued to.

pub mod party;

pub use party::{Party, PartyId};

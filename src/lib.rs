//! Tribe War - scheduled faction wars for a multiplayer survival server
//!
//! Leaders declare war on another tribe; after a preparation delay the war
//! becomes active and structure damage between the two sides (and their
//! allies) is allowed. A cooldown follows every war.

pub mod command;
pub mod core;
pub mod host;
pub mod names;
pub mod notify;
pub mod persistence;
pub mod promo;
pub mod system;
pub mod war;

pub use system::TribeWarSystem;

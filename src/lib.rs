//! Scooter Patrol — parking complaint intake and moderation bot.

pub mod bot;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod ledger;
pub mod moderation;

//! Core election logic: voter verification, one-time codes and ballots.

pub mod services;

pub use services::*;

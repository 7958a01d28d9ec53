//! Broker Store Migrator
//!
//! Moves service broker state (service instances and bindings) out of a SQL
//! database and into a secret store, then retires the database and activates
//! the secret store so that later runs do nothing.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod migration;
pub mod store;
pub mod types;

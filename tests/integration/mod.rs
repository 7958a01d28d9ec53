//! Integration tests for the broker store migrator

mod cli_binary;
mod secret_store;

//! CLI domain: parse, route, and output only.
//! Orchestration lives in `migration`; the route wires stores to it.

mod output;
mod parse;
mod route;

pub use output::{format_outcome, format_preview, map_error};
pub use parse::Cli;
pub use route::{tolerate_missing_database, RunContext, RunReport};

#[macro_use]
extern crate tracing;

pub mod allowlist;
pub mod config;
pub mod dns;
pub mod events;
pub mod inventory;
pub mod reconcile;

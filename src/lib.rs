// src/lib.rs
// Library interface for ct-tripwire
pub mod cli;
pub mod config;
pub mod ct_source;
pub mod filter;
pub mod health;
pub mod notifier;
pub mod scheduler;
pub mod state;
pub mod stats;
pub mod tracker;
pub mod types;

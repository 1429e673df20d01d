//! Core library for the exchange-rate graph arbitrage detector.
//!
//! Pool tasks decode reserve updates and write directed rate edges into a
//! shared graph; a scheduled task snapshots the graph and searches it for
//! negative cycles, i.e. closed trading walks whose rates multiply above 1.

pub mod arbitrage;
pub mod config;
pub mod dex;
pub mod errors;
pub mod graph;
pub mod models;
pub mod report;
pub mod scheduler;
pub mod utils;

//! Campaign wizard. Headless core of the phishing-simulation campaign
//! builder: step sequencing, validation gates, step persistence and
//! supervised long-running backend operations.

pub mod api;
pub mod config;
pub mod connectivity;
pub mod driver;
pub mod error;
pub mod operation;
pub mod steps;
pub mod wizard;

#[cfg(test)]
mod testing;

//! configuration
//!
//! Every tunable of the verdict engine lives here: the veracity signal
//! weights, the confidence thresholds gating resolution, the dispute
//! window and expiry deadline, and the settlement retry policy. All of
//! them load from a TOML file where every section is optional and falls
//! back to its default.

#![deny(rust_2018_idioms)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

pub mod config;

pub use crate::config::{
    Config, ConfigError, ResolutionConfig, ScoringConfig, SettlementConfig,
};

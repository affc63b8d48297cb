//! Veracity scoring
//!
//! Combines the three independent veracity signals of a news item, and
//! derives the confidence measure that gates when the verdict engine may
//! resolve a dispute.

#![deny(rust_2018_idioms)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

/// Module containing the veracity scoring function
pub mod scoring;

pub use scoring::{
    compute_veracity, crowd_signal, outcome_from_score, witness_signal, Veracity,
};

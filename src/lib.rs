//! Veridict
//!
//! Truth-staking and verdict consensus engine. Disputed news items are
//! resolved by combining three independent veracity signals: an automated
//! content analysis score, value staked on TRUE or FALSE, and
//! reputation-weighted witness testimony. Settlement pays the losing pool
//! to the winners pro rata, conserving every drop, and feeds accuracy
//! back into staker and witness reputations.
//!
//! This crate is a facade re-exporting the workspace members.

#![deny(rust_2018_idioms)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

pub use veridict_config as config;
pub use veridict_data_structures as data_structures;
pub use veridict_node as node;
pub use veridict_reputation as reputation;
pub use veridict_storage as storage;
pub use veridict_validations as validations;

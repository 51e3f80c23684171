//! Connectivity probe for Kafka clusters.
//!
//! Opens an administrative session, lists topics, then opens and closes a
//! producer and a consumer session, classifying the first failure and
//! reporting a PASS/FAIL verdict.

pub mod cli;
pub mod config;
pub mod kafka;
pub mod probe;
pub mod report;

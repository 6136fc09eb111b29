#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Shared test helpers used across the workspace suites.
//! Layout: fixtures.rs (snapshot builders), mocks.rs (engine and dispatcher doubles).

pub mod fixtures;
pub mod mocks;

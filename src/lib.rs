//! Host probe that discovers containers and overlay network peers and
//! publishes them as mergeable [`report::Report`]s.
//!
//! * [`report`] holds the data model and its merge algebra.
//! * [`probe`] defines the `Reporter`/`Tagger` capabilities and the loop
//!   that drives them.
//! * [`overlay`] holds the weave tagger.
//! * [`collector`] merges published reports over a rolling window.

pub mod collector;
pub mod config;
pub mod error;
pub mod overlay;
pub mod probe;
pub mod report;

pub use error::{ProbeError, Result};
pub use report::Report;

//! Location sampling.
//!
//! # Components
//!
//! - [`provider`] - [`Fix`], [`FixError`], and the platform [`FixProvider`] seam
//! - [`worker`] - [`LocationSampler`] cadence loop with idempotent start/stop

mod provider;
mod worker;

pub use provider::{Fix, FixError, FixProvider};
pub use worker::{LocationSampler, SamplerConfig, SamplerEvent};

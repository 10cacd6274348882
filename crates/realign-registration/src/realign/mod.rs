//! Realignment of 4D series.
//!
//! The [`Realigner`] estimates one rigid transform per frame against a
//! reference volume ([`ReferenceStrategy`]), records them in a
//! [`TransformLog`] and resamples the series into reference space.

pub mod config;
pub mod reference;
pub mod log;
pub mod realigner;

pub use config::RealignConfig;
pub use reference::ReferenceStrategy;
pub use log::{TransformLog, TransformRecord};
pub use realigner::{RealignOutput, Realigner};

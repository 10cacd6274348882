//! Regularization of estimated motion parameters.

pub mod trait_;
pub mod temporal;

pub use trait_::{Regularized, Regularizer};
pub use temporal::TemporalSmoothness;

//! Write path: value model, per-series strategies, and the flush driver.

pub mod measurement;
pub mod registry;
pub mod series;
pub mod strategy;

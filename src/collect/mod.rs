//! Measurement producers: series naming, activity and skilling-item translation.

pub mod activity;
pub mod series_names;
pub mod skilling;

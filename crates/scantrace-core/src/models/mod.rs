//! Data models for ScanTrace

mod attribute;
mod report;

pub use attribute::*;
pub use report::*;

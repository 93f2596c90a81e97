//! Integration scenarios
//!
//! - `end_to_end`: several clients driving one broker through `VmsClient`
//! - `concurrency`: many threads and tasks hitting the broker at once

pub mod concurrency;
pub mod end_to_end;

//! # Vehicle Map Service Test Suite
//!
//! Cross-crate scenarios exercising the broker through its public API.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # criterion benchmarks (resolver, routing)
//! └── src/integration/  # end-to-end and concurrency scenarios
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p vms-tests
//!
//! # By category
//! cargo test -p vms-tests integration::end_to_end
//! cargo test -p vms-tests integration::concurrency
//!
//! # Benchmarks
//! cargo bench -p vms-tests
//! ```

pub mod integration;

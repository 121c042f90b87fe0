//! Unit tests for webtoon-translate-core.
//!
//! Service and store behavior through the public crate API, with in-memory
//! backends throughout (one sqlite case under a tempdir).

pub mod expiry;
pub mod helpers;
pub mod lifecycle;
pub mod quota;

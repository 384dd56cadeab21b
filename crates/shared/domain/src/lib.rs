//! # Domain Models
//!
//! Pure configuration types shared by the kernel and every feature crate, with
//! minimal dependencies (`serde`, `serde_json`).
//! Keep it lean: no I/O, networking, or lifecycle logic. Just data and simple helpers.

pub mod config;

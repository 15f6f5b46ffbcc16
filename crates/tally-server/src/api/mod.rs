//! API response types and helpers

pub mod response;

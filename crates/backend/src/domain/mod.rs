//! Domain types for the three cached data categories
//!
//! These types describe what a scanner computes for one key and how the
//! cache tracks it. They are independent of the scanning and caching machinery.

pub mod cache;
pub mod config;
pub mod project;
pub mod scripture;
pub mod translation;

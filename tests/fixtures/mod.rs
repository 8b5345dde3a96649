//! Test fixtures for tour-planner.
//!
//! Provides realistic test data including:
//! - Hanoi landmark locations used as stops
//! - Helpers writing distance tables and stop catalogs to disk

#![allow(dead_code)]

pub mod hanoi_locations;

pub use hanoi_locations::*;

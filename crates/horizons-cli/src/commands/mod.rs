//! Command handlers

pub mod config;
pub mod sync;
pub mod task;

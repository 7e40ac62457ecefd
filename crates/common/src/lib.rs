//! Common utilities and types shared across the group viewing components.

#![warn(clippy::pedantic)]

/// Module for identifier types
pub mod types;

/// Module for logging configuration and subscriber setup
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;

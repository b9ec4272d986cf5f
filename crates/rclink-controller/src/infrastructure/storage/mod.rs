//! Persistent configuration for the controller.

pub mod config;

//! Shared types, collaborator traits and configuration loading
//!
//! This module contains the types exchanged with external services and the
//! code used across the session core.

pub mod types;
pub mod config;
pub mod traits;

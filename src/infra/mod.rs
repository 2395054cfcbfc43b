//! Infrastructure layer for cross-cutting concerns.
//!
//! Provides foundational infrastructure including:
//! - Configuration management and validation
//! - Error handling and result types
//! - One-time crypto provider initialization

pub mod config;
pub mod error;
pub mod provider;

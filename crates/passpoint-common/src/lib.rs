//! Passpoint Common - Shared types and utilities
//!
//! This crate provides the identifiers, error definitions, runtime
//! configuration and beacon element parsing used by the profile manager
//! and its front ends.

pub mod config;
pub mod error;
pub mod ie;
pub mod types;

pub use config::Config;
pub use error::{CollaboratorError, PasspointError, Result};
pub use ie::{Hs20Indication, InformationElement, RoamingConsortium};
pub use types::*;

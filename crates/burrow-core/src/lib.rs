//! Core types and utilities for burrow.
//!
//! This crate provides the foundational types used throughout the burrow workspace:
//!
//! - **Identifiers**: the store-assigned [`TunnelId`]
//! - **Protocols**: the [`Proto`] a tunnel exposes its local address over
//!
//! # Example
//!
//! ```
//! use burrow_core::{Proto, TunnelId};
//!
//! let id: TunnelId = "42".parse().unwrap();
//! assert_eq!(id.as_u64(), 42);
//!
//! let proto: Proto = "tcp".parse().unwrap();
//! assert_eq!(proto, Proto::Tcp);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod proto;

pub use ids::{IdError, TunnelId};
pub use proto::{Proto, ProtoError};

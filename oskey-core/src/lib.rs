//! # oskey-core
//!
//! Core protocol implementation for OSKey hardware wallets.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame encoding/decoding and stream reassembly
//! - Application message definitions
//! - Firmware version comparison
//! - PIN hashing and input validation
//! - Protocol constants

pub mod constants;
pub mod error;
pub mod frame;
pub mod message;
pub mod pin;
pub mod reassembler;
pub mod validation;
pub mod version;

pub use error::{Error, Result};
pub use frame::Decoded;
pub use message::{ReqData, ResData};
pub use reassembler::Reassembler;


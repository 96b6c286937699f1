#![deny(unused_imports)]
#![warn(missing_debug_implementations)]

//! Pinward
//!
//! Ownership and change notification for the physical resources of lab hardware: pins,
//! converter channels and whole groups of them. Devices expose their resources as a tree,
//! channels claim parts of that tree and everybody interested gets told when availability
//! changes.
//!
//! The entry point of the `pinward` tool can be found in
//! [bin/pinward/main.rs](../bin/pinward/main.rs)

/// Ports of a device and the resources they use
pub mod channels;

pub mod config;

/// Device drivers and their registry
pub mod devices;

/// Shared error type
pub mod error;

pub mod logging;

/// Resources
pub mod resources;

pub mod setup;

mod env;

pub use env::{RELEASE_STRING, VERSION_STRING};
pub use error::{Error, Result};
pub use resources::{build, ResourceRef};
pub use setup::Setup;

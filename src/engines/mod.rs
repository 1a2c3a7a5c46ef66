//! Engine client implementations.
//!
//! Each implementation drives one external container engine through the
//! [`PodEngine`](crate::engine::PodEngine) contract.

pub mod podman;

pub use self::podman::PodmanEngine;

//! Test utilities for podsweep.
//!
//! Provides an in-memory cluster implementing [`PodApi`](crate::cluster::PodApi)
//! and a builder for pod snapshots, so sweeps can be exercised without a
//! Kubernetes API server.
//!
//! # Feature Flag
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! common = { path = "../common", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testing::{InMemoryPodApi, PodBuilder};
//!
//! let cluster = InMemoryPodApi::with_pods([
//!     PodBuilder::new("a", "p1").failed("Evicted").build(),
//!     PodBuilder::new("a", "p2").running().build(),
//! ]);
//! ```

mod cluster;
mod pod_builder;

pub use cluster::{DeleteCall, InMemoryPodApi};
pub use pod_builder::PodBuilder;

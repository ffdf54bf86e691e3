//! Run Databricks test notebooks remotely and collect their reports.
//!
//! The notebook side runs its tests with [`formatter::run_unittest_suite`] and
//! exits with the JSON [`summary::TestSummary`]. The local side submits the
//! notebook through a [`databricks::JobsService`], waits for it, and decodes
//! the summary into a [`result::ExecutionResult`] with [`client::TestClient`].

pub mod cli;
pub mod client;
pub mod config;
pub mod databricks;
pub mod error;
pub mod formatter;
pub mod result;
pub mod session;
pub mod summary;

pub use client::{ArtifactKind, ArtifactTarget, ClientSettings, TestClient};
pub use error::{ClientError, DecodeError, ServiceError};
pub use result::ExecutionResult;
pub use summary::TestSummary;

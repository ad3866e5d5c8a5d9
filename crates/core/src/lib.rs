// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! OpenCLI Core - Task-domain abstractions and the domain registry.
//!
//! This crate defines the core abstractions shared by every task domain and
//! by the pipeline engine that schedules them:
//!
//! ## Core Modules
//!
//! - [`domain`]: The [`Domain`] trait plugin contract, display metadata, and
//!   progress reporting.
//! - [`registry`]: [`DomainRegistry`], which owns disjoint `task_type`
//!   claims and dispatches tasks to their owning domain.
//! - [`task`]: [`TaskData`] / [`TaskResult`], the input/output shapes every
//!   domain speaks.
//! - [`auth`]: WebSocket/HTTP auth token generation and verification.
//! - [`error`]: [`CoreError`], the structured error type used throughout.

// Re-export async_trait for use in domain implementations.
pub use async_trait::async_trait;

pub mod auth;
pub mod domain;
pub mod error;
pub mod registry;
pub mod task;

pub use domain::{Domain, DisplayConfig, DomainHandle, ProgressCallback, ProgressData};
pub use error::CoreError;
pub use registry::{DomainRegistry, SharedRegistry};
pub use task::{TaskData, TaskResult};

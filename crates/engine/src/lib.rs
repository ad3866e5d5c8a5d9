// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! OpenCLI Engine - the pipeline execution engine and episode compiler.
//!
//! ## Core Modules
//!
//! - [`executor`]: layered (Kahn's algorithm) pipeline execution with
//!   intra-wave parallelism, skip-on-upstream-failure, partial
//!   re-execution, and cooperative cancellation.
//! - [`graph`]: in-degree/dependent adjacency, cycle detection, and
//!   reverse-BFS ancestor computation shared by the executor.
//! - [`template`]: `{{node.field}}` / `{{params.name}}` reference parsing
//!   and resolution.
//! - [`episode`]: lowers an [`opencli_api::EpisodeScript`] into a concrete
//!   [`opencli_api::Pipeline`] DAG with a post-processing tail.
//! - [`constants`]: shared defaults used by the executor and the episode
//!   compiler.

pub mod constants;
pub mod episode;
pub mod executor;
pub mod graph;
pub mod template;

pub use episode::{compile_episode, EpisodeSettings};
pub use executor::{
    execute_pipeline, CancelledFn, ExecutionOptions, NodeStatus, PipelineExecutionResult,
    ProgressEvent, ProgressFn,
};
pub use template::Template;

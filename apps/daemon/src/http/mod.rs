// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! HTTP handler modules for the `/api/v1` surface. Split by resource the
//! way the spec's endpoint table groups them, rather than the teacher's
//! single `server.rs` file — this daemon's surface is uniform CRUD over
//! several resources instead of one session-centric API, so one file per
//! resource keeps each handler set small.

pub mod config;
pub mod episodes;
pub mod execute;
pub mod files;
pub mod health;
pub mod nodes;
pub mod pipelines;

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Presence agent.
//!
//! Keeps one TCP connection to the gateway open for as long as the process
//! runs, reconnecting forever and sending a heartbeat whenever the link has
//! been quiet for a full interval.

pub mod error;
pub mod supervisor;

pub use error::{AgentError, Result};
pub use supervisor::{AttemptState, ConnectionSupervisor, SupervisorStatus, HEARTBEAT};

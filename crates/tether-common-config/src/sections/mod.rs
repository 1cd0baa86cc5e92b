// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod agent;
mod hooks;
mod logging;
mod server;

pub use agent::{AgentConfig, AgentConfigLayer};
pub use hooks::{HookOrdering, HooksConfig, HooksConfigLayer};
pub use logging::{LogLevel, LoggingConfig, LoggingConfigLayer};
pub use server::{ServerConfig, ServerConfigLayer};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Presence gateway.
//!
//! A peer is authorized for as long as it holds an active TCP connection to the
//! gateway. Admission and revocation are delegated to external hook
//! executables that receive the peer's address as their only argument.

pub mod error;
pub mod event_loop;
pub mod hooks;
pub mod listener;
pub mod reaper;
pub mod registry;
pub mod sweeper;

pub use error::{Result, ServerError};
pub use event_loop::{EventLoop, Eviction, LoopOptions, READ_CHUNK};
pub use hooks::{HookKind, HookRunner, ProcessHookRunner};
pub use listener::{bind_listener, peer_address};
pub use reaper::Reaper;
pub use registry::{ClientRecord, ClientRegistry, ConnId};
pub use sweeper::TimeoutSweeper;

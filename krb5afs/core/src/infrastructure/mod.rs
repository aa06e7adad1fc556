// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cache_file;
pub mod ccache;
pub mod kdc_command;
pub mod passwd;
pub mod pioctl;
pub mod ticket_file;

pub use kdc_command::CommandKdcClient;
pub use passwd::PasswdResolver;
pub use pioctl::{select_backend, PioctlBackend};

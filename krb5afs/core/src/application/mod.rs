// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cache_manager;
pub mod session;
pub mod tokens;
pub mod translate;
pub mod v4_cache;
pub mod v5_cache;

pub use cache_manager::{CacheStatus, TicketCacheManager};
pub use session::{SessionOrchestrator, SessionOutcome, SessionPhase};
pub use tokens::TokenManager;
pub use translate::translate_v4;
pub use v4_cache::V4CacheManager;
pub use v5_cache::V5CacheManager;

// Core moderation module - rule storage, link matching, and the scan
// decision engine.

pub mod match_engine;
pub mod moderation_models;
pub mod moderation_service;
pub mod rule_store;
pub mod snapshot;

pub use match_engine::find_blocked_partial;
pub use moderation_models::*;
pub use moderation_service::*;
pub use rule_store::*;
pub use snapshot::*;

pub mod published_records;
pub mod rate_limit_state;
pub mod token_cooldowns;
pub mod tracked_tokens;
pub mod whale_events;

pub use published_records::{Category, NewClaim, PublishedRecord, RecordStatus};
pub use rate_limit_state::RateLimitState;
pub use token_cooldowns::TokenCooldown;
pub use tracked_tokens::TrackedToken;
pub use whale_events::{NewWhaleEvent, WhaleEvent};

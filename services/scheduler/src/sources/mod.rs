//! Candidate sources, queried in fixed priority order: whale, news, token.

pub mod news;
pub mod token;
pub mod whale;

pub use news::{FeedFetch, NewsSource, SocialFeed, SocialPost};
pub use token::{composite_score, TokenMetrics, TokenSnapshot, TokenSource};
pub use whale::WhaleSource;

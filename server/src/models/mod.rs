//! Database models — plain `sqlx::FromRow` structs mapped 1:1 to the entities
//! in the data model, following the teacher's `Conversation`/`Message`-style
//! structs rather than an ORM.

pub mod aggregator;
pub mod cache;
pub mod comment;
pub mod community;
pub mod ids;
pub mod post;
pub mod subscription;
pub mod user;
pub mod vote;

pub use aggregator::{
    Aggregator, AggregatorAuthorization, AggregatorPostLedgerEntry,
    AGGREGATOR_RATE_LIMIT_MAX, AGGREGATOR_RATE_LIMIT_WINDOW_SECS,
};
pub use cache::{IdentityCacheEntry, UnfurlCacheEntry, IDENTITY_CACHE_TTL_SECS, UNFURL_TTL_SECS};
pub use comment::{Comment, MAX_CONTENT_BYTES};
pub use community::{Community, Visibility};
pub use ids::{is_valid_community_name, is_valid_did, parse_at_uri, AtUri, Cid, Did, IdError};
pub use post::Post;
pub use subscription::{CommunityBlock, CommunitySubscription};
pub use user::User;
pub use vote::{Direction, Vote};

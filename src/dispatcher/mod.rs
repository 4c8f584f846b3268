//! Dispatcher and shard actors
//!
//! Each collection is split into `shards_per_collection` shards. A shard is
//! owned by one [`ShardActor`] task that drains a bounded mailbox one
//! message at a time; the [`Dispatcher`] routes plans to the shards, waits
//! for every reply under a timeout, and merges the replies into a
//! [`QueryResult`].
//!
//! All shards append to one shared WAL, so sequence numbers stay global.

mod actor;
mod errors;
mod router;

pub use actor::{ShardActor, ShardHandle, ShardMessage, ShardReply};
pub use errors::{DispatchError, DispatchResult};
pub use router::{Dispatcher, QueryResult};

//! Long-lived background jobs owning a tracker handle and a shutdown
//! signal: the flusher that drains dirty buckets into storage, and the
//! follower-side mirror loop.

mod flush;
mod mirror;

pub use flush::FlushService;
pub use mirror::{MirrorService, Scraper};

//! The consumed feed-fetch operation: one call per remote feed, returning a
//! title and an ordered list of items.
//!
//! Feed XML parsing itself is an external concern — [`HttpFeedFetcher`] is a
//! thin adapter over `feed-rs`, and the engine only ever talks to the
//! [`FeedFetcher`] trait so tests can script fetch outcomes.

mod fetcher;

pub use fetcher::{FeedFetcher, FetchError, FetchedFeed, HttpFeedFetcher};

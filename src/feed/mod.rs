//! Feed retrieval for RSS/Atom sources.
//!
//! - [`parser`] - Converts feed XML into [`FeedEntry`] values using `feed-rs`
//! - [`fetcher`] - Single-shot HTTP retrieval with size and time limits
//!
//! # Example
//!
//! ```ignore
//! use feedvoice::feed::FeedFetcher;
//!
//! let entries = FeedFetcher::default()
//!     .fetch("http://feeds.bbci.co.uk/news/rss.xml?edition=uk#", 10)
//!     .await?;
//! ```

mod fetcher;
mod parser;

pub use fetcher::{cap_entries, FeedFetcher, FetchError};
pub use parser::{parse_feed, FeedEntry};

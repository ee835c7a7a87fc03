//! Output formats for scraped listings.
//!
//! # Submodules
//!
//! - [`rss`]: renders a [`FeedDocument`](crate::models::FeedDocument) as an
//!   RSS 2.0 document
//!
//! Rendering is pure: it performs no I/O and yields byte-identical output for
//! identical input.

pub mod rss;

//! Photo sources
//!
//! A photo source lists photos (search results, feeds, albums) and downloads
//! their bytes. Everything above this layer works against the [`PhotoSource`]
//! trait, so job execution can be exercised without a network.
//!
//! ## Architecture
//!
//! - [`PhotoSource`]: listing, user resolution and byte fetching
//! - [`FlickrSource`]: the Flickr REST API over `reqwest`
//! - [`SourceError`]: failure classification consumed by the retry layer
//!
//! Sources neither retry nor pace requests; the job runner wraps every call in
//! [`crate::retry`] and the shared [`crate::rate_limiter::RequestLimiter`].

mod flickr;
mod traits;

pub use flickr::FlickrSource;
pub use traits::{
    Album, Photo, PhotoSource, SearchParams, SizeUrl, SourceError, SourceResult, UserInfo,
};

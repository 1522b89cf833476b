//! Tests against the real Flickr API
//!
//! Need `FLICKR_API_KEY` in the environment or a `.env` file; skipped otherwise.
//!
//! ```bash
//! cargo test --features live-tests --test live_flickr
//! ```

#![cfg(feature = "live-tests")]

mod common;

use common::{collect_events, create_live_downloader, progress_of, zip_entries};
use flickr_dl::types::{SortOrder, TagMode};
use flickr_dl::{DownloadRequest, DownloadTarget, Event, PhotoSize};

#[tokio::test]
async fn live_search_downloads_small_archive() {
    let Some((downloader, _temp_dir)) = create_live_downloader().await else {
        eprintln!("FLICKR_API_KEY not set, skipping");
        return;
    };

    let request = DownloadRequest::new(DownloadTarget::Search {
        text: "lighthouse".to_string(),
        tags: vec![],
        tag_mode: TagMode::Any,
        sort: SortOrder::InterestingnessDesc,
        licenses: vec![],
        user_id: None,
    })
    .with_count(3)
    .with_size(PhotoSize::Small);

    let id = downloader.submit(request).await.unwrap();
    let events = collect_events(&downloader, &id).await;

    assert_eq!(progress_of(&events).last(), Some(&(3, 3)));
    assert!(matches!(events.last(), Some(Event::Complete { .. })));

    let archive = downloader.retrieve(&id).await.unwrap();
    assert!(!zip_entries(&archive.path).is_empty());
}

#[tokio::test]
async fn live_resolve_user() {
    let Some((downloader, _temp_dir)) = create_live_downloader().await else {
        eprintln!("FLICKR_API_KEY not set, skipping");
        return;
    };

    let user = downloader.resolve_user("flickr").await.unwrap();
    assert!(user.nsid.contains("@N"));
}

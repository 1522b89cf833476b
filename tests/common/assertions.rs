//! Event collection and archive inspection helpers

use flickr_dl::{Event, JobId, PhotoDownloader};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Read a job's stream from the start until its terminal event
pub async fn collect_events(downloader: &PhotoDownloader, id: &JobId) -> Vec<Event> {
    let mut subscription = downloader.subscribe(id).await.unwrap();
    let mut events = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = subscription.next().await {
            events.push(event);
        }
    })
    .await
    .expect("job did not reach a terminal event in time");
    events
}

/// `(current, total)` of every progress event, in order
pub fn progress_of(events: &[Event]) -> Vec<(usize, usize)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Progress { current, total } => Some((*current, *total)),
            _ => None,
        })
        .collect()
}

/// Every stream ends in exactly one terminal event, and nothing follows it
pub fn assert_single_terminal(events: &[Event]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "expected one terminal event in {events:?}");
    assert!(
        events.last().is_some_and(Event::is_terminal),
        "terminal event must come last in {events:?}"
    );
}

/// `current` never goes backwards and never passes `total`
pub fn assert_progress_monotonic(events: &[Event]) {
    let progress = progress_of(events);
    for pair in progress.windows(2) {
        assert!(pair[0].0 <= pair[1].0, "progress went backwards: {progress:?}");
    }
    if let Some((current, total)) = progress.last() {
        assert!(current <= total, "progress overshot: {progress:?}");
    }
}

/// Entry names of a ZIP archive in archive order
pub fn zip_entries(path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Contents of one archive entry
pub fn zip_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut data = Vec::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    data
}

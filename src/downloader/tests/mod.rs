use super::test_helpers::*;
use super::*;
use crate::source::SourceError;
use crate::types::{
    AlbumSelection, DownloadRequest, DownloadTarget, Event, JobId, JobState, PhotoSize, SortOrder,
    TagMode,
};
use std::io::Read;
use std::path::Path;


fn search_request(count: u32) -> DownloadRequest {
    DownloadRequest::new(DownloadTarget::Search {
        text: "lighthouse".into(),
        tags: vec![],
        tag_mode: TagMode::Any,
        sort: SortOrder::Relevance,
        licenses: vec![],
        user_id: None,
    })
    .with_count(count)
}

fn zip_entry_names(path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn zip_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    data
}

fn progress_events(events: &[Event]) -> Vec<(usize, usize)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress { current, total } => Some((*current, *total)),
            _ => None,
        })
        .collect()
}

fn unavailable() -> SourceError {
    SourceError::Unavailable {
        status: 503,
        message: "service unavailable".into(),
    }
}

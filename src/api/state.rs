//! State handed to every route handler

use crate::{Config, PhotoDownloader};
use std::sync::Arc;

/// The job subsystem plus the settings the server was started with
///
/// Handlers reach jobs only through `downloader`. `config` is the startup
/// snapshot; the request rate may have changed since, so read it from the
/// downloader.
#[derive(Clone)]
pub struct AppState {
    /// Job subsystem shared with the embedding process
    pub downloader: Arc<PhotoDownloader>,

    /// Settings as passed to [`create_router`](crate::api::create_router)
    pub config: Arc<Config>,
}

impl AppState {
    /// Bundle the downloader with its startup config
    pub fn new(downloader: Arc<PhotoDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}

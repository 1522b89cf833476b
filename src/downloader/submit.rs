//! Request intake: submissions, previews and user lookup.

use crate::error::Result;
use crate::types::{DownloadRequest, JobId, Preview, PreviewItem, UserAlbums};

use super::PhotoDownloader;

/// Number of items shown by [`PhotoDownloader::preview`]
pub const PREVIEW_LIMIT: usize = 50;

impl PhotoDownloader {
    /// Build the work plan for a request and start a job for it
    ///
    /// Listing happens before this returns, so an unknown user or an unreachable
    /// source is reported here rather than as a job failure.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`](crate::Error::InvalidRequest),
    /// [`Error::SourceUnavailable`](crate::Error::SourceUnavailable),
    /// [`Error::TooManyJobs`](crate::Error::TooManyJobs) or
    /// [`Error::ShuttingDown`](crate::Error::ShuttingDown).
    pub async fn submit(&self, request: DownloadRequest) -> Result<JobId> {
        self.ensure_accepting()?;
        let plan = self.planner.build(&request).await?;
        self.start(plan).await
    }

    /// Build the work plan for a request without starting it
    pub async fn preview(&self, request: DownloadRequest) -> Result<Preview> {
        let plan = self.planner.build(&request).await?;

        let items = plan
            .items
            .iter()
            .take(PREVIEW_LIMIT)
            .map(|item| PreviewItem {
                id: item.photo_id.clone(),
                title: item.title.clone(),
                owner: item.owner.clone(),
                date_taken: item.date_taken.clone(),
                thumb_url: item.thumb_url.clone(),
            })
            .collect();

        Ok(Preview {
            total: plan.total(),
            label: plan.label,
            items,
        })
    }

    /// Look up an account by username, profile URL or NSID, with its albums
    pub async fn resolve_user(&self, user: &str) -> Result<UserAlbums> {
        self.planner.user_albums(user).await
    }
}

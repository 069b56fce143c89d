use std::time::Duration;

use kinetic_types::pagination::DEFAULT_PAGE_SIZE;

/// Client-side timing and paging knobs.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub page_size: u32,
    /// Period of the backward refresh on open feeds.
    pub refresh_interval: Duration,
    /// Period of the re-fetch of posts whose media is still transcoding.
    pub media_poll_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            refresh_interval: Duration::from_secs(5),
            media_poll_interval: Duration::from_secs(10),
        }
    }
}

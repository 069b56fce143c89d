use anyhow::Result;
use rusqlite::OptionalExtension;

use kinetic_types::models::{ProcessingStatus, VisualMedia};

use crate::Database;
use crate::posts::media_from_row;

impl Database {
    /// Apply a transcoder verdict to every unsettled media row with this file name.
    /// Settled rows are never touched again.
    pub fn update_transcode_status(&self, file_name: &str, complete: bool) -> Result<usize> {
        let status = if complete {
            ProcessingStatus::Completed
        } else {
            ProcessingStatus::Failed
        };

        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE visual_media SET processing_status = ?1
                 WHERE file_name = ?2 AND processing_status IN ('PENDING', 'PROCESSING')",
                (status.as_str(), file_name),
            )?;
            Ok(n)
        })
    }

    /// Mark pending media as picked up by the transcoder.
    pub fn mark_media_processing(&self, file_name: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE visual_media SET processing_status = 'PROCESSING'
                 WHERE file_name = ?1 AND processing_status = 'PENDING'",
                [file_name],
            )?;
            Ok(n)
        })
    }

    pub fn find_media(&self, file_name: &str) -> Result<Option<VisualMedia>> {
        self.with_conn(|conn| {
            let media = conn
                .query_row(
                    "SELECT id, kind, url, file_name, processing_status
                     FROM visual_media WHERE file_name = ?1 ORDER BY id LIMIT 1",
                    [file_name],
                    media_from_row,
                )
                .optional()?;
            Ok(media)
        })
    }
}

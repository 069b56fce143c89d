//! Transcoder callback. Unauthenticated: the transcoder's event bus posts
//! here directly.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::{info, warn};

use kinetic_types::api::{TranscodeStatusQuery, TranscodeStatusResponse, TranscodeUpdateResponse};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

const JOB_STATE_CHANGE: &str = "MediaConvert Job State Change";

/// Either an event-bus envelope or a hand-made `{fileName, status}` body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TranscodeEvent {
    Bus {
        #[serde(rename = "detail-type")]
        detail_type: String,
        detail: JobDetail,
    },
    Manual {
        #[serde(rename = "fileName")]
        file_name: Option<String>,
        status: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub status: Option<String>,
    #[serde(default)]
    pub output_group_details: Vec<OutputGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputGroup {
    #[serde(default)]
    pub output_details: Vec<OutputDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDetail {
    #[serde(default)]
    pub output_file_paths: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    InProgress,
    Settled { complete: bool },
}

impl Verdict {
    fn from_status(status: Option<&str>) -> Self {
        match status {
            Some("COMPLETE") => Verdict::Settled { complete: true },
            Some("PROGRESSING") | Some("PROCESSING") => Verdict::InProgress,
            _ => Verdict::Settled { complete: false },
        }
    }
}

/// Resolve the output file name and verdict for an event.
fn interpret(event: TranscodeEvent) -> Result<(String, Verdict), ApiError> {
    match event {
        TranscodeEvent::Bus { detail_type, detail } if detail_type == JOB_STATE_CHANGE => {
            let path = detail
                .output_group_details
                .first()
                .and_then(|g| g.output_details.first())
                .and_then(|d| d.output_file_paths.first())
                .ok_or_else(|| ApiError::BadRequest("no output file path found".into()))?;

            // s3://bucket/key/name.mp4 -> name.mp4
            let file_name = path.rsplit('/').next().unwrap_or_default().to_string();
            if file_name.is_empty() {
                return Err(ApiError::BadRequest("no output file path found".into()));
            }
            Ok((file_name, Verdict::from_status(detail.status.as_deref())))
        }
        TranscodeEvent::Bus { detail_type, .. } => {
            Err(ApiError::BadRequest(format!("unsupported event type: {}", detail_type)))
        }
        TranscodeEvent::Manual { file_name, status } => {
            let mut file_name = file_name
                .filter(|f| !f.is_empty())
                .ok_or_else(|| ApiError::BadRequest("fileName is required".into()))?;
            if !file_name.ends_with(".mp4") {
                file_name.push_str(".mp4");
            }
            Ok((file_name, Verdict::from_status(status.as_deref())))
        }
    }
}

pub async fn transcode_complete(
    State(state): State<AppState>,
    Json(event): Json<TranscodeEvent>,
) -> Result<Json<TranscodeUpdateResponse>, ApiError> {
    let (file_name, verdict) = interpret(event)?;

    let name = file_name.clone();
    let updated = run_db(&state, move |db| match verdict {
        Verdict::InProgress => db.mark_media_processing(&name),
        Verdict::Settled { complete } => db.update_transcode_status(&name, complete),
    })
    .await?;

    if updated == 0 {
        warn!("Transcode event for {} matched no pending media", file_name);
    } else {
        info!("Updated {} media rows for {}", updated, file_name);
    }

    Ok(Json(TranscodeUpdateResponse {
        success: true,
        updated,
    }))
}

pub async fn transcode_status(
    State(state): State<AppState>,
    Query(query): Query<TranscodeStatusQuery>,
) -> Result<Json<TranscodeStatusResponse>, ApiError> {
    if query.file_name.is_empty() {
        return Err(ApiError::BadRequest("fileName is required".into()));
    }

    let name = query.file_name.clone();
    let media = run_db(&state, move |db| db.find_media(&name))
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(TranscodeStatusResponse {
        file_name: media.file_name.unwrap_or(query.file_name),
        processing_status: media.processing_status,
    }))
}

//! HTTP handlers for file streaming and gateway statistics.
//!
//! Streaming responses are written chunk-by-chunk; nothing buffers the whole
//! file. Response headers are fully decided before the first body byte, so
//! failures discovered later can only end the connection early.

use crate::{
    errors::AppError,
    services::{StreamError, planner, streamer::TrackedStream},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::debug;

#[derive(Clone, Copy)]
enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// GET `/stream/{file_hash}` — stream media for in-browser playback.
pub async fn stream_file(
    State(state): State<AppState>,
    Path(file_hash): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    serve_file(state, file_hash, headers, Disposition::Inline).await
}

/// GET `/dl/{file_hash}` — same mechanics, forced download.
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_hash): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    serve_file(state, file_hash, headers, Disposition::Attachment).await
}

async fn serve_file(
    state: AppState,
    file_hash: String,
    headers: HeaderMap,
    disposition: Disposition,
) -> Result<Response, AppError> {
    let record = state
        .meta
        .get_file_by_hash(&file_hash)
        .await?
        .ok_or_else(|| AppError::not_found(format!("file `{file_hash}` not found")))?;

    state.guard.check().await?;

    // Resolve before any header is committed; past this point a failure can
    // no longer change the status line.
    let location = state.streamer.resolve(record.message_id).await?;

    let total_size = record.file_size.max(0) as u64;
    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let (from, until) = planner::parse_range(range_header, total_size);
    let plan = match planner::plan(from, until, total_size, state.streamer.chunk_size()) {
        Ok(plan) => plan,
        Err(StreamError::RangeNotSatisfiable { .. }) => {
            return Ok(range_not_satisfiable(total_size));
        }
        Err(other) => return Err(other.into()),
    };

    debug!(
        message_id = record.message_id,
        total_size,
        from = plan.from,
        until = plan.until,
        offset = plan.aligned_offset,
        parts = plan.chunk_count,
        "starting stream"
    );

    let stream = state.streamer.stream(location, plan);
    let body = Body::from_stream(TrackedStream::new(
        stream,
        state.meta.clone(),
        record.message_id,
    ));

    let mut response = Response::new(body);
    *response.status_mut() = if range_header.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let is_partial = response.status() == StatusCode::PARTIAL_CONTENT;
    let resp_headers = response.headers_mut();
    resp_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&record.content_type())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    resp_headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&plan.length().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    let disposition_value = format!(
        "{}; filename=\"{}\"",
        disposition.as_str(),
        record.file_name.replace(['"', '\r', '\n'], "_")
    );
    resp_headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition_value)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    resp_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    resp_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
    resp_headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    if is_partial {
        if let Ok(value) = HeaderValue::from_str(&format!(
            "bytes {}-{}/{}",
            plan.from, plan.until, total_size
        )) {
            resp_headers.insert(header::CONTENT_RANGE, value);
        }
    }

    Ok(response)
}

/// 416 with the size hint and no body.
fn range_not_satisfiable(total_size: u64) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
    if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total_size}")) {
        response.headers_mut().insert(header::CONTENT_RANGE, value);
    }
    response
}

#[derive(Serialize)]
struct FormattedBandwidth {
    total_bandwidth: String,
    today_bandwidth: String,
}

#[derive(Serialize)]
struct StatsResponse {
    total_files: i64,
    total_downloads: i64,
    total_bandwidth: i64,
    today_bandwidth: i64,
    formatted: FormattedBandwidth,
}

/// GET `/stats` — aggregate gateway statistics.
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = state.meta.get_stats().await?;
    Ok(Json(StatsResponse {
        total_files: stats.total_files,
        total_downloads: stats.total_downloads,
        total_bandwidth: stats.total_bandwidth,
        today_bandwidth: stats.today_bandwidth,
        formatted: FormattedBandwidth {
            total_bandwidth: format_size(stats.total_bandwidth.max(0) as u64),
            today_bandwidth: format_size(stats.today_bandwidth.max(0) as u64),
        },
    }))
}

#[derive(Serialize)]
struct BandwidthDetail {
    total: i64,
    today: i64,
    limit: u64,
    remaining: u64,
    percentage: f64,
    formatted: FormattedQuota,
}

#[derive(Serialize)]
struct FormattedQuota {
    total: String,
    today: String,
    limit: String,
    remaining: String,
}

/// GET `/bandwidth` — quota usage detail.
pub async fn bandwidth(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = state.meta.get_bandwidth_stats().await?;
    let limit = state.guard.quota_bytes();
    let used = stats.total.max(0) as u64;
    let remaining = limit.saturating_sub(used);
    let percentage = if limit > 0 {
        used as f64 / limit as f64 * 100.0
    } else {
        0.0
    };
    Ok(Json(BandwidthDetail {
        total: stats.total,
        today: stats.today,
        limit,
        remaining,
        percentage,
        formatted: FormattedQuota {
            total: format_size(used),
            today: format_size(stats.today.max(0) as u64),
            limit: format_size(limit),
            remaining: format_size(remaining),
        },
    }))
}

/// Human-readable byte count, binary units.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

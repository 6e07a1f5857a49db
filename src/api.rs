// HTTP shell: media info, download init, one-shot file retrieval

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path as AxumPath, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::io::ReaderStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::downloader::{AudioQuality, DownloadError, DownloadRequestSpec, Downloader, VideoQuality};

#[derive(Clone)]
pub struct AppState {
    pub downloader: Arc<Downloader>,
}

impl AppState {
    pub fn new(downloader: Downloader) -> Self {
        Self {
            downloader: Arc::new(downloader),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/info", post(media_info))
        .route("/api/download/init", post(init_download))
        .route("/api/download/{filename}", get(download_file))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            details: None,
        }
    }

    fn internal(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details,
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        if err.is_validation() {
            return Self::bad_request(err.to_string());
        }
        match err {
            DownloadError::DownloadFailed(detail) => Self::internal("Download failed", Some(detail)),
            other => Self::internal(other.to_string(), None),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.message, "details": details }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoRequest {
    #[serde(default)]
    pub video_url: Option<String>,
}

/// Download parameters as sent by the web client.
///
/// Numbers may arrive as JSON numbers or strings; empty strings and nulls
/// count as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitDownloadRequest {
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::height")]
    pub quality: Option<u32>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub fps: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub bitrate: Option<f64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_video_only: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_audio_only: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub audio_codec: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub video_format: Option<String>,
}

impl InitDownloadRequest {
    pub fn to_spec(&self) -> DownloadRequestSpec {
        // Client sends audio-only picks as bitrate/codec without any video fields
        let audio_only = self.is_audio_only.unwrap_or_else(|| {
            self.quality.is_none()
                && self.fps.is_none()
                && (self.bitrate.is_some() || self.audio_codec.is_some())
        });

        DownloadRequestSpec {
            target_height_px: self.quality,
            target_frame_rate: self.fps,
            target_container: self.video_format.as_ref().map(|f| f.to_ascii_lowercase()),
            audio_only,
            video_only: self.is_video_only.unwrap_or(false),
            target_audio_codec: self.audio_codec.clone(),
            target_bitrate_kbps: self.bitrate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AudioQualityView {
    pub codec: String,
    pub label: String,
    pub bitrates: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub title: String,
    pub thumbnail: String,
    pub qualities: Vec<VideoQuality>,
    pub audio_qualities: Vec<AudioQualityView>,
}

#[derive(Debug, Serialize)]
pub struct InitDownloadResponse {
    pub filename: String,
    /// Pass back as `?token=` to retrieve exactly this download
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
}

impl DownloadQuery {
    fn token(&self) -> Result<Option<Uuid>, ApiError> {
        match self.token.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| ApiError::bad_request("Invalid download token")),
        }
    }
}

fn require_url(url: Option<&str>) -> Result<&str, ApiError> {
    match url.map(str::trim) {
        Some(u) if !u.is_empty() => Ok(u),
        _ => Err(ApiError::bad_request("URL is required")),
    }
}

pub async fn media_info(
    State(state): State<AppState>,
    payload: Result<Json<InfoRequest>, JsonRejection>,
) -> Result<Json<InfoResponse>, ApiError> {
    let Json(request) = payload?;
    let url = require_url(request.video_url.as_deref())?;

    let catalog = state.downloader.media_info(url).await?;
    let codecs = state.downloader.codecs();
    let audio_qualities = catalog
        .audio_qualities
        .into_iter()
        .map(|AudioQuality { codec, available_bitrates_kbps }| AudioQualityView {
            label: codecs.label(&codec),
            codec,
            bitrates: available_bitrates_kbps,
        })
        .collect();

    Ok(Json(InfoResponse {
        title: catalog.title,
        thumbnail: catalog.thumbnail_url,
        qualities: catalog.video_qualities,
        audio_qualities,
    }))
}

pub async fn init_download(
    State(state): State<AppState>,
    payload: Result<Json<InitDownloadRequest>, JsonRejection>,
) -> Result<Json<InitDownloadResponse>, ApiError> {
    let Json(request) = payload?;
    let url = require_url(request.video_url.as_deref())?;
    let spec = request.to_spec();
    info!(%url, ?spec, "Download requested");

    let ready = state.downloader.download(url, &spec).await?;
    Ok(Json(InitDownloadResponse {
        filename: ready.filename,
        token: ready.token.to_string(),
    }))
}

pub async fn download_file(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let token = query.token()?;
    let guard = state
        .downloader
        .take_file(&filename, token)
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let file = tokio::fs::File::open(guard.path()).await.map_err(|e| {
        error!(path = %guard.path().display(), "Cannot open finished download: {}", e);
        ApiError::not_found("File not found")
    })?;
    let length = file.metadata().await.ok().map(|m| m.len());

    // The stream owns the guard: the file goes away once the body is dropped
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _keep = &guard;
        chunk
    });

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_filename(&filename)),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(len) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    info!(%filename, "Serving download");
    Ok(response)
}

fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Deserializers tolerant of the loosely typed web client
mod lenient {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn raw<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            other => other,
        })
    }

    fn parse_number<E: serde::de::Error>(value: Value, strip_suffix: bool) -> Result<f64, E> {
        let parsed = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let s = s.trim();
                let s = if strip_suffix {
                    s.trim_end_matches(['p', 'P'])
                } else {
                    s
                };
                s.parse::<f64>().ok()
            }
            _ => None,
        };
        parsed
            .filter(|n| n.is_finite())
            .ok_or_else(|| E::custom(format!("expected a number, got {}", value)))
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        raw(d)?.map(|v| parse_number(v, false)).transpose()
    }

    /// Pixel height; "1080p" is accepted
    pub fn height<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let Some(value) = raw(d)? else {
            return Ok(None);
        };
        let n = parse_number::<D::Error>(value, true)?;
        if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
            return Err(D::Error::custom(format!("invalid quality {}", n)));
        }
        Ok(Some(n as u32))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match raw(d)? {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                other => Err(D::Error::custom(format!("invalid flag '{}'", other))),
            },
            Some(other) => Err(D::Error::custom(format!("invalid flag {}", other))),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match raw(d)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(other) => Err(D::Error::custom(format!("expected a string, got {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::extractors::ExtractorConfig;
    use crate::downloader::testing::{sample_metadata, FakeBackend, FakeExtractor};
    use axum::body::to_bytes;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn state(extractor: FakeExtractor, backend: FakeBackend, dir: &std::path::Path) -> AppState {
        AppState::new(Downloader::new(
            Arc::new(extractor),
            Arc::new(backend),
            ExtractorConfig::default(),
            dir,
        ))
    }

    fn init_request(value: Value) -> InitDownloadRequest {
        serde_json::from_value(value).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_info_returns_catalog_with_labels() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(FakeExtractor::ok(sample_metadata()), FakeBackend::ok(), dir.path());

        let Json(info) = media_info(
            State(st),
            Ok(Json(InfoRequest {
                video_url: Some("https://youtu.be/abc".into()),
            })),
        )
        .await
        .unwrap();

        let body = serde_json::to_value(&info).unwrap();
        assert_eq!(body["title"], "My Video! #1");
        assert_eq!(body["qualities"][0]["resolution"], "720p");
        assert_eq!(body["qualities"][1]["fps"], json!([30.0, 60.0]));
        assert_eq!(body["qualities"][1]["containers"], json!(["mp4", "webm"]));
        assert_eq!(body["audioQualities"][0]["codec"], "mp4a.40.2");
        assert_eq!(body["audioQualities"][0]["label"], "AAC");
        assert_eq!(body["audioQualities"][0]["bitrates"], json!([128.0, 192.0]));
    }

    #[tokio::test]
    async fn test_info_requires_url() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(FakeExtractor::ok(sample_metadata()), FakeBackend::ok(), dir.path());

        let err = media_info(State(st), Ok(Json(InfoRequest::default())))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "URL is required");
    }

    #[tokio::test]
    async fn test_info_hides_upstream_failure() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(
            FakeExtractor::failing(DownloadError::ExecutionError("ERROR: Unsupported URL".into())),
            FakeBackend::ok(),
            dir.path(),
        );

        let err = media_info(
            State(st),
            Ok(Json(InfoRequest {
                video_url: Some("nope".into()),
            })),
        )
        .await
        .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid URL or unable to retrieve media information");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_init_then_download_streams_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(FakeExtractor::ok(sample_metadata()), FakeBackend::ok(), dir.path());

        let request = init_request(json!({
            "videoUrl": "https://youtu.be/abc",
            "quality": "1080",
            "fps": 60
        }));
        let Json(init) = init_download(State(st.clone()), Ok(Json(request)))
            .await
            .unwrap();
        assert_eq!(init.filename, "my_video___1.mp4");

        assert!(Uuid::parse_str(&init.token).is_ok());

        let response = download_file(
            State(st.clone()),
            AxumPath(init.filename.clone()),
            Query(DownloadQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"my_video___1.mp4\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"media bytes");

        // Body dropped: request directory is gone
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let err = download_file(
            State(st),
            AxumPath(init.filename),
            Query(DownloadQuery::default()),
        )
        .await
        .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "File not found");
    }

    #[tokio::test]
    async fn test_download_token_selects_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(FakeExtractor::ok(sample_metadata()), FakeBackend::ok(), dir.path());
        let request = || {
            init_request(json!({
                "videoUrl": "https://youtu.be/abc",
                "quality": 720,
                "fps": 30
            }))
        };

        let Json(first) = init_download(State(st.clone()), Ok(Json(request()))).await.unwrap();
        let Json(second) = init_download(State(st.clone()), Ok(Json(request()))).await.unwrap();
        assert_eq!(first.filename, second.filename);
        assert_ne!(first.token, second.token);

        let query = |token: &str| {
            Query(DownloadQuery {
                token: Some(token.to_string()),
            })
        };
        let response = download_file(
            State(st.clone()),
            AxumPath(second.filename.clone()),
            query(&second.token),
        )
        .await
        .unwrap();
        drop(response);
        assert!(dir.path().join(&first.token).exists());
        assert!(!dir.path().join(&second.token).exists());

        // Already served
        let err = download_file(
            State(st.clone()),
            AxumPath(second.filename.clone()),
            query(&second.token),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = download_file(State(st), AxumPath(first.filename), query("not-a-token"))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid download token");
    }

    #[tokio::test]
    async fn test_init_rejects_contradictory_flags() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(FakeExtractor::ok(sample_metadata()), FakeBackend::ok(), dir.path());

        let request = init_request(json!({
            "videoUrl": "https://youtu.be/abc",
            "isAudioOnly": true,
            "isVideoOnly": true
        }));
        let err = init_download(State(st), Ok(Json(request))).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_init_reports_engine_failure_with_details() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(
            FakeExtractor::ok(sample_metadata()),
            FakeBackend::failing("ERROR: Requested format is not available"),
            dir.path(),
        );

        let request = init_request(json!({
            "videoUrl": "https://youtu.be/abc",
            "quality": 720,
            "fps": 30
        }));
        let err = init_download(State(st), Ok(Json(request))).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Download failed");
        assert_eq!(body["details"], "ERROR: Requested format is not available");
    }

    #[test]
    fn test_lenient_fields() {
        let request = init_request(json!({
            "videoUrl": "u",
            "quality": "1080p",
            "fps": "29.97",
            "bitrate": "",
            "isVideoOnly": "false",
            "audioCodec": null,
            "videoFormat": "MKV"
        }));
        assert_eq!(request.quality, Some(1080));
        assert_eq!(request.fps, Some(29.97));
        assert_eq!(request.bitrate, None);
        assert_eq!(request.is_video_only, Some(false));
        assert_eq!(request.audio_codec, None);

        let spec = request.to_spec();
        assert_eq!(spec.target_container.as_deref(), Some("mkv"));
        assert!(!spec.audio_only);
    }

    #[test]
    fn test_lenient_rejects_garbage() {
        let result: Result<InitDownloadRequest, _> =
            serde_json::from_value(json!({ "quality": "best" }));
        assert!(result.is_err());
        let result: Result<InitDownloadRequest, _> =
            serde_json::from_value(json!({ "fps": [60] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_audio_only_inferred_from_audio_fields() {
        let spec = init_request(json!({ "videoUrl": "u", "bitrate": 128, "audioCodec": "opus" }))
            .to_spec();
        assert!(spec.audio_only);
        assert_eq!(spec.target_bitrate_kbps, Some(128.0));

        let spec = init_request(json!({ "videoUrl": "u", "quality": 720, "fps": 30, "bitrate": 128 }))
            .to_spec();
        assert!(!spec.audio_only);

        let spec = init_request(json!({ "videoUrl": "u", "bitrate": 128, "isAudioOnly": false }))
            .to_spec();
        assert!(!spec.audio_only);
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for_filename("a.mp4"), "video/mp4");
        assert_eq!(content_type_for_filename("a.M4A"), "audio/mp4");
        assert_eq!(content_type_for_filename("a.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_api_error_serializes_json() {
        let response = ApiError::from(DownloadError::NoVideoAvailable).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "No video stream satisfies the request");
    }
}

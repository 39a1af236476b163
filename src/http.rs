use axum::{
    Json,
    extract::{FromRequest, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use codec_prefs::{
    EncodingConfiguration, MediaFormat, MediaKind, MoveDirection,
    codec::default_priority,
    engine::{apply_codec_preferences, build_api},
    format::parse_encoding_key,
    negotiation::{NegotiatedMedia, negotiate_offer},
};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use webrtc::peer_connection::{
    configuration::RTCConfiguration, sdp::session_description::RTCSessionDescription,
};

use crate::state::AppState;

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/encodings/{kind}", axum::routing::get(list_encodings))
        .route(
            "/encodings/{kind}/{name}/{rate}",
            axum::routing::put(set_priority),
        )
        .route(
            "/encodings/{kind}/{name}/{rate}/{direction}",
            axum::routing::post(move_encoding),
        )
        .route("/negotiate", axum::routing::post(negotiate))
        .route("/answer", axum::routing::post(answer))
        .with_state(state)
}

pub fn format_json(config: &EncodingConfiguration, format: &MediaFormat) -> Value {
    let priority = config.priority(format);
    json!({
        "encoding": format.encoding,
        "clock_rate": format.clock_rate,
        "payload_type": format.payload_type,
        "priority": priority,
        "default_priority": default_priority(&format.encoding, format.clock_rate),
        "enabled": priority > 0,
    })
}

pub fn negotiated_json(config: &EncodingConfiguration, media: &[NegotiatedMedia]) -> Value {
    Value::Array(
        media
            .iter()
            .map(|m| {
                json!({
                    "kind": m.kind.as_str(),
                    "mid": m.mid,
                    "preferred": m.preferred().map(ToString::to_string),
                    "accepted": m.accepted.iter().map(|f| format_json(config, f)).collect::<Vec<_>>(),
                    "rejected": m.rejected.iter().map(|f| format_json(config, f)).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

fn parse_kind(kind: &str) -> Result<MediaKind, StatusCode> {
    kind.parse().map_err(|e| {
        warn!("{}", e);
        StatusCode::NOT_FOUND
    })
}

fn parse_format(state: &AppState, kind: &str, name: &str, rate: &str) -> Result<MediaFormat, StatusCode> {
    let kind = parse_kind(kind)?;
    let (encoding, clock_rate) = parse_encoding_key(&format!("{name}/{rate}")).map_err(|e| {
        warn!("Invalid format '{}/{}': {}", name, rate, e);
        StatusCode::BAD_REQUEST
    })?;
    Ok(state.resolve(kind, &encoding, clock_rate))
}

async fn list_encodings(
    State(AppState { config }): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let kind = parse_kind(&kind)?;
    let entries = config
        .ordered_encodings(kind)
        .iter()
        .map(|(f, _)| format_json(&config, f))
        .collect();
    Ok(Json(Value::Array(entries)))
}

async fn set_priority(
    State(state): State<AppState>,
    Path((kind, name, rate)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let format = parse_format(&state, &kind, &name, &rate)?;
    let priority = body
        .get("priority")
        .and_then(Value::as_i64)
        .and_then(|p| i32::try_from(p).ok())
        .ok_or_else(|| {
            warn!("Missing or invalid 'priority' in {}", body);
            StatusCode::UNPROCESSABLE_ENTITY
        })?;

    // the store write is blocking file I/O
    let config = state.config.clone();
    let format = tokio::task::spawn_blocking(move || {
        config.set_priority(&format, priority);
        format
    })
    .await
    .map_err(|e| {
        error!("Priority update failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!("Priority of {} set to {}", format, priority);

    Ok(Json(format_json(&state.config, &format)))
}

async fn move_encoding(
    State(state): State<AppState>,
    Path((kind, name, rate, direction)): Path<(String, String, String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let format = parse_format(&state, &kind, &name, &rate)?;
    let direction = match direction.as_str() {
        "up" => MoveDirection::Up,
        "down" => MoveDirection::Down,
        _ => return Err(StatusCode::NOT_FOUND),
    };

    let config = state.config.clone();
    let (format, moved) = tokio::task::spawn_blocking(move || {
        let moved = config.move_encoding(format.kind, &format, direction);
        (format, moved)
    })
    .await
    .map_err(|e| {
        error!("Move failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match moved {
        Some(index) => Ok(Json(json!({
            "index": index,
            "encoding": format_json(&state.config, &format),
        }))),
        None => {
            warn!("Cannot move {} {:?}", format, direction);
            Err(StatusCode::CONFLICT)
        }
    }
}

pub struct SDPOffer(pub String);

impl<S> FromRequest<S> for SDPOffer
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request(
        req: axum::http::Request<axum::body::Body>,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let ct = req
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if ct.split(';').next().map(|s| s.trim()) != Some("application/sdp") {
            warn!("Invalid Content-Type: '{}'", ct);
            return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        }

        let bytes = axum::body::to_bytes(req.into_body(), 1024 * 16)
            .await
            .map_err(|e| {
                error!("Failed to read body: {}", e);
                StatusCode::BAD_REQUEST
            })?;

        Ok(SDPOffer(String::from_utf8_lossy(bytes.as_ref()).to_string()))
    }
}

async fn negotiate(
    State(AppState { config }): State<AppState>,
    SDPOffer(offer): SDPOffer,
) -> Result<Json<Value>, StatusCode> {
    let media = negotiate_offer(&config, &offer).map_err(|e| {
        error!("Failed to negotiate: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    Ok(Json(negotiated_json(&config, &media)))
}

pub struct SDPAnswer(pub RTCSessionDescription);

impl IntoResponse for SDPAnswer {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/sdp")],
            self.0.sdp,
        )
            .into_response()
    }
}

/// Answers `offer` with a throwaway peer connection. Each answered section
/// lists its codecs in local priority order.
async fn answer(
    State(AppState { config }): State<AppState>,
    SDPOffer(offer): SDPOffer,
) -> Result<SDPAnswer, StatusCode> {
    let media = negotiate_offer(&config, &offer).map_err(|e| {
        error!("Failed to negotiate: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    let offer = RTCSessionDescription::offer(offer).map_err(|e| {
        error!("Failed to parse SDP: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    let api = build_api(&config).map_err(|e| {
        error!("Failed to build media engine: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let pc = api
        .new_peer_connection(RTCConfiguration::default())
        .await
        .map_err(|e| {
            error!("Failed to create peer connection: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let result = match pc.set_remote_description(offer).await {
        Ok(()) => match apply_codec_preferences(&config, &pc, &media).await {
            Ok(()) => pc.create_answer(None).await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = pc.close().await {
        warn!("Failed to close peer connection: {}", e);
    }

    let answer = result.map_err(|e| {
        error!("Failed to answer offer: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    Ok(SDPAnswer(answer))
}

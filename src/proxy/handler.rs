//! Chat completion handler: model resolution, dispatch, 429 fallback

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::server::RelayState;
use crate::upstream::DispatchError;

/// Forward one chat completion to the upstream provider
///
/// Resolves the model through the availability tracker, dispatches with
/// retries, and on a rate limit records the hit and re-dispatches once on the
/// next model in the chain. Terminal upstream errors keep their original
/// status code and message.
pub async fn chat_handler(State(state): State<RelayState>, Json(body): Json<Value>) -> Response {
    let request_id = Uuid::new_v4();

    if let Err(message) = validate_chat_body(&body) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
    }

    let requested = body.get("model").and_then(|m| m.as_str()).unwrap_or("");
    let model = state.tracker.get_available_model(requested);
    if !requested.is_empty() && model != requested {
        tracing::info!(
            request_id = %request_id,
            requested = %requested,
            model = %model,
            "request rerouted along fallback chain"
        );
    }

    match dispatch_chat(&state, &model, &body).await {
        Ok(completion) => {
            tracing::info!(request_id = %request_id, model = %model, "chat completion ok");
            Json(completion).into_response()
        }
        Err(err) if err.source.is_rate_limited() => {
            state.tracker.record_rate_limit(&model);

            let fallback = state.tracker.get_available_model(&model);
            if fallback == model {
                // Terminal model rate-limited; nothing left to fall back to
                return upstream_error_response(request_id, &model, err);
            }

            tracing::warn!(
                request_id = %request_id,
                limited = %model,
                fallback = %fallback,
                "rate limited, re-dispatching on fallback model"
            );

            match dispatch_chat(&state, &fallback, &body).await {
                Ok(completion) => {
                    tracing::info!(
                        request_id = %request_id,
                        model = %fallback,
                        "chat completion ok on fallback model"
                    );
                    Json(completion).into_response()
                }
                Err(fallback_err) => {
                    if fallback_err.source.is_rate_limited() {
                        state.tracker.record_rate_limit(&fallback);
                    }
                    upstream_error_response(request_id, &fallback, fallback_err)
                }
            }
        }
        Err(err) => upstream_error_response(request_id, &model, err),
    }
}

/// Run one dispatch against the upstream for the given model
async fn dispatch_chat(
    state: &RelayState,
    model: &str,
    body: &Value,
) -> Result<Value, DispatchError> {
    state
        .dispatcher
        .dispatch(model, || state.upstream.chat_completion(model, body))
        .await
}

/// The shape checks the relay enforces before spending upstream quota
fn validate_chat_body(body: &Value) -> Result<(), &'static str> {
    let Some(messages) = body.get("messages").and_then(|m| m.as_array()) else {
        return Err("Invalid messages format. Expected an array of messages.");
    };

    if messages.is_empty() {
        return Err("Invalid messages format. Expected an array of messages.");
    }

    let well_formed = messages.iter().all(|message| {
        message.get("role").map_or(false, Value::is_string)
            && message.get("content").map_or(false, Value::is_string)
    });

    if !well_formed {
        return Err("Invalid message format. Each message must have \"role\" and \"content\" as strings.");
    }

    Ok(())
}

/// Map a terminal dispatch failure to the client response
///
/// Upstream status codes pass through untouched; transport failures with no
/// status map to 502.
fn upstream_error_response(request_id: Uuid, model: &str, err: DispatchError) -> Response {
    let status = err
        .status_code()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY);

    tracing::error!(
        request_id = %request_id,
        model = %model,
        status = %status,
        attempts = err.attempts,
        error = %err.source,
        "chat completion failed"
    );

    (status, Json(json!({ "error": err.source.message() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamError;

    #[test]
    fn test_validate_rejects_missing_messages() {
        assert!(validate_chat_body(&json!({ "model": "gpt-4o" })).is_err());
        assert!(validate_chat_body(&json!({ "messages": "hi" })).is_err());
        assert!(validate_chat_body(&json!({ "messages": [] })).is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_message() {
        let body = json!({
            "messages": [
                { "role": "user", "content": "hello" },
                { "role": "user" }
            ]
        });
        assert!(validate_chat_body(&body).is_err());

        let body = json!({
            "messages": [{ "role": "user", "content": 42 }]
        });
        assert!(validate_chat_body(&body).is_err());
    }

    #[test]
    fn test_validate_accepts_role_content_strings() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [
                { "role": "system", "content": "You are helpful" },
                { "role": "user", "content": "hello" }
            ],
            "temperature": 0.5
        });
        assert!(validate_chat_body(&body).is_ok());
    }

    #[test]
    fn test_error_response_preserves_upstream_status() {
        let err = DispatchError {
            attempts: 1,
            source: UpstreamError::from_status(429, "quota exceeded".into()),
        };
        let response = upstream_error_response(Uuid::new_v4(), "gpt-4o", err);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let err = DispatchError {
            attempts: 1,
            source: UpstreamError::from_status(400, "bad".into()),
        };
        let response = upstream_error_response(Uuid::new_v4(), "gpt-4o", err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_response_maps_transport_failures_to_502() {
        let err = DispatchError {
            attempts: 3,
            source: UpstreamError::Timeout,
        };
        let response = upstream_error_response(Uuid::new_v4(), "gpt-4o", err);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}

//! Snapshot query handler.

use axum::Json;
use axum::extract::State;

use super::SharedAppState;
use crate::domain::streaming::SnapshotResponse;

/// `GET /api/latest`: the current snapshot, stale or not.
pub(super) async fn latest_handler(State(state): State<SharedAppState>) -> Json<SnapshotResponse> {
    Json(SnapshotResponse::from(state.cache.snapshot()))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::super::{router, test_support};
    use crate::domain::topic::{LiveSlot, MetadataSlot};

    async fn get_latest(app: axum::Router) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::get("/api/latest").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn empty_cache_returns_defaults() {
        let (status, body) = get_latest(router(test_support::state())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "success": true,
                "data": {
                    "contactDetails": null,
                    "referanceDetails": null,
                    "liveRates": {},
                    "workerPublishCoin": null,
                    "lastUpdate": null,
                    "coinLastUpdate": null,
                }
            })
        );
    }

    #[tokio::test]
    async fn reflects_cached_values() {
        let state = test_support::state();
        state
            .cache
            .write_metadata(MetadataSlot::ContactDetails, json!({"phone": "123"}));
        state
            .cache
            .write_live(LiveSlot::Coins, json!({"BTC": 50000}), Utc::now());

        let (status, body) = get_latest(router(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["contactDetails"], json!({"phone": "123"}));
        assert_eq!(body["data"]["workerPublishCoin"], json!({"BTC": 50000}));
        assert!(body["data"]["coinLastUpdate"].is_string());
        assert_eq!(body["data"]["lastUpdate"], Value::Null);
    }
}

//! Application info endpoint.
//!
//! Exposes `GET /info/v1` returning app name, version, cluster ID, and task
//! ID through the response envelope. Useful for health checks and deployment
//! verification.

use crate::web::warp::{into_envelope, with_codec};
use serde_json::json;
use warp::Filter;
use warp::filters::BoxedFilter;

/// Creates the `/info/v1` route returning enveloped application metadata.
pub fn get_info_route() -> BoxedFilter<(impl warp::Reply,)> {
    warp::path!("info" / "v1")
        .and(warp::get())
        .and(with_codec())
        .and_then(handle_get_info)
        .boxed()
}

#[tracing::instrument(level = "debug", name = "GET /info/v1", skip_all)]
async fn handle_get_info(
    codec: crate::web::codec::Codec,
) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(into_envelope(
        codec,
        Ok(json!({
            "app": crate::APP_NAME.clone(),
            "version": crate::APP_VERSION.clone(),
            "clusterId": crate::CLUSTER_ID.clone(),
            "taskId": crate::TASK_ID.clone(),
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use warp::http::StatusCode;

    #[tokio::test]
    async fn info_is_enveloped() {
        let res = warp::test::request()
            .path("/info/v1")
            .reply(&get_info_route())
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["code"], 200);
        assert_eq!(body["message"], "success");
        // Four metadata fields, so no single-field unwrap applies.
        assert!(body["data"].get("app").is_some());
        assert!(body["data"].get("version").is_some());
    }
}

//! Warp server plumbing: body filters, envelope replies, and the runner.
//!
//! Handlers decode their input with [`with_body_as_payload`], do their work,
//! and hand an `anyhow::Result` to [`into_envelope`]; from there on every
//! byte on the wire is produced by the envelope translator. Unmatched routes
//! and stray rejections are recovered through the same translator so clients
//! never see a bare transport error.

use crate::client_bail;
use crate::tools::{system, watch::Watch};
use crate::web::codec::{Codec, codec_for_request};
use crate::web::envelope::{encode_error, encode_success, internal_error_fallback};
use crate::web::error::{ResultExt, ServiceError};
use anyhow::{Context, anyhow};
use futures_util::{Stream, StreamExt, TryStreamExt};
use hyper::{Body, Server};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::env;
use std::error::Error;
use std::net::SocketAddr;
use std::pin::Pin;
use std::str::FromStr;
use std::task::Poll;
use std::time::Duration;
use tokio_util::bytes::Buf;
use tokio_util::bytes::BufMut;
use tower::{Service, ServiceBuilder};
use tracing::{Instrument, Span, debug_span};
use warp::http::Request;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply, http};

/// Extracts the request's `Content-Length` header.
pub fn content_length_header() -> impl Filter<Extract = (u64,), Error = Rejection> + Clone {
    warp::header::header::<u64>(http::header::CONTENT_LENGTH.as_str())
}

/// Injects a cloneable value into a filter chain.
pub fn with_cloneable<C: Clone + Send>(
    value: C,
) -> impl Filter<Extract = (C,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

/// Extracts the response codec negotiated from the request's `Accept` header.
pub fn with_codec() -> impl Filter<Extract = (Codec,), Error = Rejection> + Clone {
    warp::header::optional::<String>(http::header::ACCEPT.as_str())
        .map(|accept: Option<String>| codec_for_request(accept.as_deref()))
}

/// Converts a handler result into an enveloped response.
///
/// Success payloads go through `encode_success`; if even the envelope cannot
/// be serialized the minimal bodiless fallback is emitted. Errors are
/// flattened to their [`ServiceError`] form and go through `encode_error`.
pub fn into_envelope<S: Serialize>(codec: Codec, result: anyhow::Result<S>) -> Response {
    match result {
        Ok(payload) => {
            encode_success(codec, &payload).unwrap_or_else(|_| internal_error_fallback())
        }
        Err(err) => encode_error(codec, &ServiceError::from_anyhow(&err)),
    }
}

/// Reads the request body into memory and decodes it with the codec named by
/// the request's `Content-Type` header.
pub fn with_body_as_payload<T: DeserializeOwned + Send>(
    max_body_size: u64,
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::stream()
        .and(content_length_header())
        .and(warp::header::optional::<String>(
            http::header::CONTENT_TYPE.as_str(),
        ))
        .and(with_cloneable(max_body_size))
        .and_then(
            async move |stream, content_length, content_type: Option<String>, max_body_size| {
                decode_payload(
                    stream,
                    content_length,
                    codec_for_request(content_type.as_deref()),
                    max_body_size,
                )
                .await
                .map_err(into_rejection)
            },
        )
}

async fn decode_payload<T: DeserializeOwned + Send>(
    stream: impl Stream<Item = Result<impl Buf + Send + 'static, warp::Error>> + Unpin + Send + 'static,
    content_length: u64,
    codec: Codec,
    max_body_size: u64,
) -> anyhow::Result<T> {
    let data = body_as_buffer(stream, content_length, max_body_size).await?;
    let decoded = codec
        .unmarshal(&data)
        .context("Invalid request body")
        .mark_client_error()?;

    Ok(decoded)
}

async fn body_as_buffer(
    stream: impl Stream<Item = Result<impl Buf + Send + 'static, warp::Error>> + Unpin + Send + 'static,
    content_length: u64,
    max_body_size: u64,
) -> anyhow::Result<Vec<u8>> {
    if content_length == 0 {
        client_bail!("Empty input data");
    }
    if content_length > max_body_size {
        client_bail!("The given request data is too large");
    }

    let stream = as_size_limited_stream(stream, content_length).await;
    read_into_buffer(stream, content_length).await
}

async fn as_size_limited_stream<E: Error + Send + Sync + 'static>(
    stream: impl Stream<Item = Result<impl Buf, E>> + Unpin + Send,
    content_length: u64,
) -> impl Stream<Item = Result<impl Buf, std::io::Error>> {
    let mut remaining_bytes = content_length as i64;

    stream.map(move |result| match result {
        Ok(bytes) => {
            remaining_bytes -= bytes.remaining() as i64;
            if remaining_bytes < 0 {
                Err(std::io::Error::other(anyhow!("Input data too large")))
            } else {
                Ok(bytes)
            }
        }
        Err(err) => Err(std::io::Error::other(err)),
    })
}

async fn read_into_buffer(
    mut stream: impl Stream<Item = Result<impl Buf, std::io::Error>> + Unpin,
    content_length: u64,
) -> anyhow::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(content_length as usize);
    while let Some(chunk) = stream
        .try_next()
        .await
        .context("Failed to read body")
        .mark_client_error()?
    {
        data.put(chunk);
    }

    Ok(data)
}

/// Converts an `anyhow` error into a warp rejection carrying the structured
/// domain error, for filters that must reject rather than reply.
pub fn into_rejection(err: anyhow::Error) -> Rejection {
    ServiceError::from_anyhow(&err).into()
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(service_error) = err.find::<ServiceError>() {
        Ok(encode_error(Codec::Json, service_error))
    } else if err.is_not_found() {
        Ok(encode_error(
            Codec::Json,
            &ServiceError::new(404, "route not found"),
        ))
    } else {
        Err(err)
    }
}

/// Combines several route filters with `or`.
#[macro_export]
macro_rules! routes {
    [$route:expr] => {
        $route
    };
    [$route:expr, $($rest:expr),+] => {
        warp::Filter::or($route, routes![$($rest),+])
    };
}

/// Runs the HTTP server on `BIND_ADDRESS` until a termination signal arrives.
///
/// Rejections escaping the routes are recovered through the envelope
/// translator, and every request runs inside a traced span that records the
/// response status and elapsed time.
pub async fn run_webserver<F>(routes: F) -> anyhow::Result<()>
where
    F: Filter + Clone + Send + Sync + 'static,
    F::Extract: Reply,
    F::Error: Into<Rejection> + 'static,
{
    let bind_address = env::var("BIND_ADDRESS")
        .context("Failed to read bind address. Please provide BIND_ADDRESS in the environment")?;
    let bind_address =
        SocketAddr::from_str(&bind_address).context("Failed to parse bind address.")?;

    tracing::info!("Starting server at {}", bind_address.clone());

    let filter = routes.boxed().recover(handle_rejection);

    let svc = warp::service(filter);
    let traced_svc = ServiceBuilder::new()
        .layer_fn(|inner| TracingMiddleware { inner })
        .service(svc);

    system::install_termination_listener();

    let server = Server::bind(&bind_address).serve(hyper::service::make_service_fn(|_| {
        let svc = traced_svc.clone();
        async move { Ok::<_, Infallible>(svc) }
    }));

    tracing::info!(
        "Running HTTP server at effective address {}",
        server.local_addr()
    );
    server
        .with_graceful_shutdown(system::await_shutdown())
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", bind_address))?;

    tracing::info!("HTTP Server has been stopped...");
    // Wait a bit to ensure all requests are processed and also permit background tasks to finish
    // (as most probably the web server will run in the main thread which will cause the process
    // to terminate once it completes).
    tokio::time::sleep(Duration::from_secs(3)).await;
    tracing::info!("HTTP Server has been terminated.");

    Ok(())
}

#[derive(Clone)]
struct TracingMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingMiddleware<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let span = debug_span!(
            "http_request",
            service = crate::CLUSTER_ID.clone(),
            http.method = %method,
            http.url = %path,
            http.status_code = tracing::field::Empty,
            elapsed_us = tracing::field::Empty,
        );

        let mut inner = self.inner.clone();

        let fut = async move {
            let watch = Watch::start();
            let response = inner.call(req).await?;
            let status = response.status().as_u16();
            Span::current().record("http.status_code", status as i64);
            Span::current().record("elapsed_us", watch.elapsed_us() as i64);
            Ok(response)
        }
        .instrument(span);

        Box::pin(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;
    use serde_json::{Value, json};
    use warp::http::StatusCode;
    use warp::hyper;

    async fn body_json(res: Response) -> Value {
        let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn into_envelope_wraps_success() {
        let res = into_envelope(Codec::Json, Ok(json!({"greeting": "hi"})));

        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["data"], "hi");
    }

    #[tokio::test]
    async fn into_envelope_wraps_domain_errors() {
        let result: anyhow::Result<Value> = Err(anyhow!("missing")).with_code(404);
        let res = into_envelope(Codec::Json, result);

        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["code"], 404);
    }

    #[tokio::test]
    async fn into_envelope_defaults_plain_errors_to_500() {
        let result: anyhow::Result<Value> = Err(anyhow!("disk on fire"));
        let res = into_envelope(Codec::Json, result);

        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["code"], 500);
        assert_eq!(body["message"], "disk on fire");
    }

    #[tokio::test]
    async fn decode_payload_reads_valid_body() {
        let payload = json!({"name": "amy"});
        let bytes = Bytes::from(serde_json::to_vec(&payload).unwrap());
        let len = bytes.len() as u64;
        let stream = stream::iter(vec![Ok::<Bytes, warp::Error>(bytes)]);

        let decoded: Value = decode_payload(stream, len, Codec::Json, 1024).await.unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn decode_payload_rejects_invalid_body() {
        let bytes = Bytes::from("not json");
        let len = bytes.len() as u64;
        let stream = stream::iter(vec![Ok::<Bytes, warp::Error>(bytes)]);

        let err = decode_payload::<Value>(stream, len, Codec::Json, 1024)
            .await
            .unwrap_err();
        assert_eq!(ServiceError::from_anyhow(&err).code, 400);
    }

    #[tokio::test]
    async fn body_as_buffer_rejects_empty_and_oversized_bodies() {
        let empty = stream::iter(Vec::<Result<Bytes, warp::Error>>::new());
        let err = body_as_buffer(empty, 0, 1024).await.unwrap_err();
        assert_eq!(ServiceError::from_anyhow(&err).code, 400);

        let large = stream::iter(vec![Ok::<Bytes, warp::Error>(Bytes::from("abcdef"))]);
        let err = body_as_buffer(large, 6, 4).await.unwrap_err();
        assert_eq!(ServiceError::from_anyhow(&err).code, 400);
    }

    #[tokio::test]
    async fn size_limited_stream_cuts_off_lying_content_length() {
        let stream = stream::iter(vec![
            Ok::<Bytes, warp::Error>(Bytes::from("hello")),
            Ok::<Bytes, warp::Error>(Bytes::from("world")),
        ]);
        let result: Vec<_> = as_size_limited_stream(stream, 5).await.collect().await;

        assert_eq!(result.iter().filter(|res| res.is_ok()).count(), 1);
        assert_eq!(result.iter().filter(|res| res.is_err()).count(), 1);
    }

    #[tokio::test]
    async fn unmatched_routes_get_enveloped_404() {
        let route = warp::path!("known").map(|| "ok");
        let filter = route.recover(handle_rejection);

        let res = warp::test::request()
            .path("/unknown")
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["code"], 404);
    }
}

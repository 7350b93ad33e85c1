//! Actix Web surface for session commands and the live feeds.

use std::{sync::Arc, time::Duration};

use actix_web::{
    App, HttpResponse, HttpServer,
    http::{StatusCode, header},
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use async_stream::stream;
use pose_core::MetricsSnapshot;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info};

use crate::{
    config::StreamSettings,
    html, telemetry,
    tracking::{SessionController, SessionError},
};

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) controller: Arc<SessionController>,
    pub(crate) stream: StreamSettings,
}

#[derive(Serialize)]
struct CommandAck {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CommandAck {
    fn ok(message: &'static str) -> Self {
        Self {
            message,
            error: None,
        }
    }

    fn failed(message: &'static str, error: String) -> Self {
        Self {
            message,
            error: Some(error),
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    tracking: bool,
    frames: u64,
}

/// Register every route on an `App`.
pub(crate) fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_route))
        .service(
            web::resource("/start_tracking")
                .route(web::post().to(start_tracking))
                .route(web::get().to(start_tracking)),
        )
        .service(
            web::resource("/stop_tracking")
                .route(web::post().to(stop_tracking))
                .route(web::get().to(stop_tracking)),
        )
        .route("/video_feed", web::get().to(video_feed))
        .route("/stream.mjpg", web::get().to(video_feed))
        .route("/frame.jpg", web::get().to(frame_handler))
        .route("/pose_data", web::get().to(pose_data))
        .route("/status", web::get().to(status_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Bind and serve until the server is stopped (Ctrl+C or SIGTERM).
pub(crate) fn run_server(state: ServerState, host: String, port: u16) -> Result<()> {
    let data = web::Data::new(state);
    actix_web::rt::System::new().block_on(async move {
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .configure(configure_routes)
        })
        .shutdown_timeout(5)
        .bind((host.as_str(), port))
        .with_context(|| format!("Failed to bind HTTP server to {host}:{port}"))?
        .run();

        info!("Serving on http://{host}:{port}");
        server.await.context("HTTP server error")
    })
}

/// One part of a `multipart/x-mixed-replace; boundary=frame` body.
pub(crate) fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let mut payload = Vec::with_capacity(jpeg.len() + 48);
    payload.extend_from_slice(b"--frame\r\n");
    payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    payload.extend_from_slice(jpeg);
    payload.extend_from_slice(b"\r\n");
    Bytes::from(payload)
}

fn sse_event(snapshot: &MetricsSnapshot) -> Bytes {
    match serde_json::to_string(snapshot) {
        Ok(json) => {
            let mut chunk = String::with_capacity(json.len() + 32);
            chunk.push_str("event: pose_data\n");
            chunk.push_str("data: ");
            chunk.push_str(&json);
            chunk.push_str("\n\n");
            Bytes::from(chunk)
        }
        Err(err) => Bytes::from(format!("event: error\ndata: {err}\n\n")),
    }
}

fn streaming_response(content_type: &'static str) -> actix_web::HttpResponseBuilder {
    let mut builder = HttpResponse::Ok();
    builder
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET"))
        .insert_header((header::ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Type"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONTENT_TYPE, content_type));
    builder
}

async fn index_route() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html::INDEX_HTML)
}

async fn start_tracking(state: web::Data<ServerState>) -> HttpResponse {
    let controller = state.controller.clone();
    let (status, ack) = match web::block(move || controller.start()).await {
        Ok(Ok(outcome)) => (StatusCode::OK, CommandAck::ok(outcome.message())),
        Ok(Err(err @ SessionError::DeviceUnavailable(_))) => {
            error!("Failed to start pose tracking: {err:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                CommandAck::failed("Failed to start pose tracking", error_chain(err)),
            )
        }
        Ok(Err(err)) => {
            error!("Failed to start pose tracking: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                CommandAck::failed("Failed to start pose tracking", error_chain(err)),
            )
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            CommandAck::failed("Failed to start pose tracking", err.to_string()),
        ),
    };
    HttpResponse::build(status)
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(ack)
}

async fn stop_tracking(state: web::Data<ServerState>) -> HttpResponse {
    let controller = state.controller.clone();
    match web::block(move || controller.stop()).await {
        Ok(outcome) => HttpResponse::Ok()
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .json(CommandAck::ok(outcome.message())),
        Err(err) => HttpResponse::InternalServerError().json(CommandAck::failed(
            "Failed to stop pose tracking",
            err.to_string(),
        )),
    }
}

fn error_chain(err: SessionError) -> String {
    format!("{:#}", anyhow::Error::new(err))
}

/// Stream the annotated feed, sending each new frame once per consumer.
async fn video_feed(state: web::Data<ServerState>) -> HttpResponse {
    let frames = state.controller.frames().clone();
    let settings = state.stream;
    let stream = stream! {
        let mut interval = actix_web::rt::time::interval(settings.poll_interval);
        let mut last_sent = None;
        loop {
            interval.tick().await;
            let Some(frame) = frames.latest_after(last_sent) else {
                continue;
            };
            last_sent = Some(frame.sequence);
            match frame.jpeg(settings.jpeg_quality) {
                Ok(jpeg) => {
                    metrics::counter!("pose_stream_frames_total").increment(1);
                    yield Ok::<Bytes, actix_web::Error>(multipart_chunk(&jpeg));
                }
                Err(err) => {
                    error!("Skipping frame {}: {err:#}", frame.sequence);
                    metrics::counter!("pose_encode_errors_total").increment(1);
                }
            }
        }
    };

    streaming_response("multipart/x-mixed-replace; boundary=frame").streaming(stream)
}

/// Return the latest frame as a single JPEG.
async fn frame_handler(state: web::Data<ServerState>) -> HttpResponse {
    let Some(frame) = state.controller.frames().latest() else {
        return HttpResponse::NoContent().finish();
    };
    match frame.jpeg(state.stream.jpeg_quality) {
        Ok(jpeg) => HttpResponse::Ok()
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .insert_header(("X-Sequence", frame.sequence.to_string()))
            .insert_header(("X-Annotated", frame.annotated.to_string()))
            .content_type("image/jpeg")
            .body(jpeg),
        Err(err) => {
            metrics::counter!("pose_encode_errors_total").increment(1);
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}

/// Server-Sent Events carrying every metrics snapshot published after connect.
async fn pose_data(state: web::Data<ServerState>) -> HttpResponse {
    let mut rx = state.controller.metrics().subscribe();
    debug!(
        subscribers = state.controller.metrics().subscribers(),
        "pose_data client connected"
    );
    let stream = stream! {
        yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"retry: 500\n\n"));
        loop {
            match tokio::time::timeout(SSE_KEEP_ALIVE, rx.recv()).await {
                Ok(Ok(snapshot)) => {
                    yield Ok::<Bytes, actix_web::Error>(sse_event(&snapshot));
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    debug!(skipped, "pose_data subscriber lagged");
                    metrics::counter!("pose_metrics_lagged_total").increment(skipped);
                }
                Ok(Err(RecvError::Closed)) => break,
                Err(_) => {
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b": keep-alive\n\n"));
                }
            }
        }
    };

    streaming_response("text/event-stream")
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(stream)
}

async fn status_handler(state: web::Data<ServerState>) -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        tracking: state.controller.is_running(),
        frames: state.controller.frames().published(),
    })
}

async fn metrics_handler() -> HttpResponse {
    let body = telemetry::prometheus_handle()
        .map(|handle| handle.render())
        .unwrap_or_default();
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body)
}

#[cfg(test)]
mod tests {
    use std::{future::poll_fn, pin::Pin};

    use actix_web::{
        body::{BoxBody, MessageBody},
        test as actix_test,
    };
    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::{Value, json};

    use super::*;
    use crate::tracking::testing::StubFactory;

    fn state(factory: StubFactory) -> web::Data<ServerState> {
        web::Data::new(ServerState {
            controller: Arc::new(SessionController::new(
                Arc::new(factory),
                Duration::from_millis(1),
            )),
            stream: StreamSettings {
                poll_interval: Duration::from_millis(5),
                jpeg_quality: 80,
            },
        })
    }

    async fn next_chunk(mut body: BoxBody, wait: Duration) -> (Option<Bytes>, BoxBody) {
        let chunk = tokio::time::timeout(wait, poll_fn(|cx| Pin::new(&mut body).poll_next(cx)))
            .await
            .ok()
            .flatten()
            .map(|res| res.expect("body chunk"));
        (chunk, body)
    }

    #[test]
    fn multipart_framing_is_exact() {
        let chunk = multipart_chunk(&[0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(
            chunk.as_ref(),
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8\xFF\xD9\r\n"
        );
    }

    #[actix_web::test]
    async fn commands_acknowledge_with_json() {
        let data = state(StubFactory::new(vec![170.0]));
        let app = actix_test::init_service(
            App::new()
                .app_data(data.clone())
                .configure(configure_routes),
        )
        .await;

        let ack = |uri: &'static str| actix_test::TestRequest::post().uri(uri).to_request();

        let body: Value = actix_test::call_and_read_body_json(&app, ack("/start_tracking")).await;
        assert_eq!(body, json!({"message": "Pose tracking started"}));
        let body: Value = actix_test::call_and_read_body_json(&app, ack("/start_tracking")).await;
        assert_eq!(body, json!({"message": "Pose tracking already running"}));

        let body: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::get().uri("/status").to_request(),
        )
        .await;
        assert_eq!(body["tracking"], json!(true));

        let body: Value = actix_test::call_and_read_body_json(&app, ack("/stop_tracking")).await;
        assert_eq!(body, json!({"message": "Tracking stopped"}));
        let body: Value = actix_test::call_and_read_body_json(&app, ack("/stop_tracking")).await;
        assert_eq!(body, json!({"message": "Tracking not running"}));

        data.controller.shutdown();
    }

    #[actix_web::test]
    async fn unavailable_device_returns_service_unavailable() {
        let data = state(StubFactory::unavailable());
        let app = actix_test::init_service(
            App::new()
                .app_data(data.clone())
                .configure(configure_routes),
        )
        .await;

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::post().uri("/start_tracking").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], json!("Failed to start pose tracking"));
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|msg| msg.contains("capture device unavailable"))
        );
        assert!(!data.controller.is_running());
    }

    #[actix_web::test]
    async fn single_frame_is_empty_until_published() {
        let data = state(StubFactory::new(vec![]));
        let app = actix_test::init_service(
            App::new()
                .app_data(data.clone())
                .configure(configure_routes),
        )
        .await;

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/frame.jpg").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        data.controller
            .frames()
            .publish(RgbImage::from_pixel(40, 30, Rgb([200, 10, 10])), false);
        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/frame.jpg").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let jpeg = actix_test::read_body(resp).await;
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[actix_web::test]
    async fn video_feed_sends_nothing_until_a_frame_exists() {
        let data = state(StubFactory::new(vec![]));
        let app = actix_test::init_service(
            App::new()
                .app_data(data.clone())
                .configure(configure_routes),
        )
        .await;

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/video_feed").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "multipart/x-mixed-replace; boundary=frame"
        );
        let (chunk, body) = next_chunk(resp.into_body(), Duration::from_millis(50)).await;
        assert!(chunk.is_none());

        data.controller
            .frames()
            .publish(RgbImage::from_pixel(48, 32, Rgb([0, 90, 180])), true);
        let (chunk, body) = next_chunk(body, Duration::from_secs(2)).await;
        let chunk = chunk.expect("multipart part");
        let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(chunk.starts_with(header));
        assert!(chunk.ends_with(b"\r\n"));
        let jpeg = &chunk[header.len()..chunk.len() - 2];
        let decoded = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (48, 32));

        let (chunk, _) = next_chunk(body, Duration::from_millis(50)).await;
        assert!(chunk.is_none(), "same frame must not be sent twice");
    }

    #[actix_web::test]
    async fn concurrent_video_consumers_each_receive_the_first_frame() {
        let data = state(StubFactory::new(vec![]));
        let app = actix_test::init_service(
            App::new()
                .app_data(data.clone())
                .configure(configure_routes),
        )
        .await;

        let mut bodies = Vec::new();
        for _ in 0..2 {
            let resp = actix_test::call_service(
                &app,
                actix_test::TestRequest::get().uri("/video_feed").to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
            let (chunk, body) = next_chunk(resp.into_body(), Duration::from_millis(50)).await;
            assert!(chunk.is_none());
            bodies.push(body);
        }

        data.controller
            .frames()
            .publish(RgbImage::from_pixel(40, 30, Rgb([10, 200, 10])), false);
        let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        let mut parts = Vec::new();
        for body in bodies {
            let (chunk, _) = next_chunk(body, Duration::from_secs(2)).await;
            let chunk = chunk.expect("multipart part for every consumer");
            assert!(chunk.starts_with(header));
            let jpeg = chunk.slice(header.len()..chunk.len() - 2);
            let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (40, 30));
            parts.push(jpeg);
        }
        assert_eq!(parts[0], parts[1]);
    }

    #[actix_web::test]
    async fn pose_data_streams_snapshots_as_events() {
        let data = state(StubFactory::new(vec![170.0, 20.0]));
        let app = actix_test::init_service(
            App::new()
                .app_data(data.clone())
                .configure(configure_routes),
        )
        .await;

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/pose_data").to_request(),
        )
        .await;
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        let (chunk, body) = next_chunk(resp.into_body(), Duration::from_secs(1)).await;
        assert_eq!(chunk.unwrap().as_ref(), b"retry: 500\n\n");

        data.controller.start().unwrap();
        let (chunk, _) = next_chunk(body, Duration::from_secs(5)).await;
        data.controller.shutdown();

        let chunk = chunk.expect("pose_data event");
        let text = std::str::from_utf8(&chunk).unwrap();
        let payload = text
            .strip_prefix("event: pose_data\ndata: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .expect("sse framing");
        let value: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(value["reps"], json!(0));
        assert_eq!(value["stage"], json!("down"));
        assert!(value.get("shoulderX").is_some());
        assert!(value.get("wristY").is_some());
    }

    #[actix_web::test]
    async fn index_page_is_served() {
        let data = state(StubFactory::new(vec![]));
        let app = actix_test::init_service(
            App::new()
                .app_data(data)
                .configure(configure_routes),
        )
        .await;
        let body =
            actix_test::call_and_read_body(&app, actix_test::TestRequest::get().uri("/").to_request())
                .await;
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("/video_feed"));
        assert!(html.contains("/pose_data"));
    }
}

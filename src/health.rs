use crate::state::AppState;
use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `GET /health`. The body is a fixed string that clients compare verbatim.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let (status, body) = state.files.handle_health();
    HttpResponse::build(status).insert_header(ContentType::json()).body(body)
}

/// `GET /metrics`
pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();
    let service = state.files.service();
    let transcription = service.stats();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "port": state.config.server.port
        },
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats,
        "transcription": {
            "model": state.config.model.path,
            "language": service.params().language,
            "threads": service.params().threads,
            "completed": transcription.completed,
            "failed": transcription.failed,
            "queue_depth": transcription.queue_depth,
            "average_inference_ms": transcription.average_inference_ms()
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handlers::{configure_routes, FileHandler};
    use crate::middleware::MetricsMiddleware;
    use crate::transcription::recognizer::UnloadedRecognizer;
    use crate::transcription::{InferenceParams, TranscriptionService};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_metrics_counts_requests() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(TranscriptionService::new(
            Box::new(UnloadedRecognizer),
            InferenceParams::default(),
        ));
        let state = web::Data::new(AppState::new(
            AppConfig::default(),
            FileHandler::new(service, dir.path()),
        ));
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(MetricsMiddleware)
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::post().uri("/file").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["overall"]["total_requests"], 2);
        assert_eq!(body["overall"]["total_errors"], 1);
        assert_eq!(body["transcription"]["completed"], 0);
        assert_eq!(body["transcription"]["queue_depth"], 0);
        assert_eq!(body["transcription"]["language"], "ru");
    }
}

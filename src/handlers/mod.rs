pub mod transcribe;

pub use transcribe::{transcribe_file, FileHandler};

use crate::health;
use actix_web::web;

/// Public HTTP surface: `POST /file`, `GET /health`, `GET /metrics`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/file", web::post().to(transcribe_file))
        .route("/health", web::get().to(health::health_check))
        .route("/metrics", web::get().to(health::detailed_metrics));
}

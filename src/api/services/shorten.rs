use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::error_response;
use crate::api::middleware::Owner;
use crate::config::get_config;
use crate::errors::ShortenerError;
use crate::services::{CorrelationItem, ShortenOutcome, ShortenService};

/// 纯文本接口要求的最短 URL 长度
const MIN_TEXT_URL_LEN: usize = 4;

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponseItem {
    pub correlation_id: String,
    pub short_url: String,
}

pub struct ShortenHandlers;

impl ShortenHandlers {
    /// `POST /`，请求体为原始 URL 文本
    pub async fn shorten_text(
        body: String,
        owner: Owner,
        service: web::Data<ShortenService>,
    ) -> impl Responder {
        let original = body.trim();
        if original.len() < MIN_TEXT_URL_LEN {
            return HttpResponse::BadRequest().body("request body must contain a url");
        }

        match service.shorten(original, owner.as_str()).await {
            Ok(outcome) => {
                let short_url = get_config().server.short_url(outcome.alias());
                let mut response = if outcome.is_created() {
                    HttpResponse::Created()
                } else {
                    HttpResponse::Conflict()
                };
                response
                    .content_type("text/plain; charset=utf-8")
                    .body(short_url)
            }
            Err(e) => error_response(&e),
        }
    }

    /// `POST /api/shorten`
    pub async fn shorten_json(
        payload: web::Json<ShortenRequest>,
        owner: Owner,
        service: web::Data<ShortenService>,
    ) -> impl Responder {
        let ShortenRequest { url } = payload.into_inner();
        if url.trim().is_empty() {
            return HttpResponse::BadRequest().body("url can not be empty");
        }

        match service.shorten(url.trim(), owner.as_str()).await {
            Ok(outcome) => {
                let result = get_config().server.short_url(outcome.alias());
                match outcome {
                    ShortenOutcome::Created(_) => {
                        HttpResponse::Created().json(ShortenResponse { result })
                    }
                    ShortenOutcome::AlreadyExists { .. } => {
                        debug!("Returning existing short url {}", result);
                        HttpResponse::Conflict().json(ShortenResponse { result })
                    }
                }
            }
            Err(e) => error_response(&e),
        }
    }

    /// `POST /api/shorten/batch`
    pub async fn shorten_batch(
        payload: web::Json<Vec<CorrelationItem>>,
        owner: Owner,
        service: web::Data<ShortenService>,
    ) -> impl Responder {
        let items = payload.into_inner();
        if items.is_empty() {
            return HttpResponse::BadRequest().body("batch can not be empty");
        }
        if items.iter().any(|item| item.original_url.trim().is_empty()) {
            return HttpResponse::BadRequest().body("original_url can not be empty");
        }
        trace!("Batch shorten request with {} items", items.len());

        match service.shorten_batch(items, owner.as_str()).await {
            Ok(outputs) => {
                let config = get_config();
                let body: Vec<BatchResponseItem> = outputs
                    .into_iter()
                    .map(|item| BatchResponseItem {
                        short_url: config.server.short_url(&item.short_alias),
                        correlation_id: item.correlation_id,
                    })
                    .collect();
                HttpResponse::Created().json(body)
            }
            // 批量接口不区分重复，整体按失败处理
            Err(e @ ShortenerError::AlreadyExists { .. }) => {
                HttpResponse::InternalServerError().body(e.message())
            }
            Err(e) => error_response(&e),
        }
    }
}

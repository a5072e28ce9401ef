use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error_response;
use crate::api::middleware::Owner;
use crate::config::get_config;
use crate::services::ShortenService;

#[derive(Debug, Serialize, Deserialize)]
pub struct UserUrl {
    pub short_url: String,
    pub original_url: String,
}

pub struct UserUrlsService;

impl UserUrlsService {
    /// `GET /api/user/urls`
    pub async fn list(owner: Owner, service: web::Data<ShortenService>) -> impl Responder {
        match service.show_all(owner.as_str()).await {
            Ok(records) => {
                let config = get_config();
                let body: Vec<UserUrl> = records
                    .into_iter()
                    .map(|record| UserUrl {
                        short_url: config.server.short_url(&record.alias),
                        original_url: record.original,
                    })
                    .collect();
                HttpResponse::Ok().json(body)
            }
            Err(e) => error_response(&e),
        }
    }

    /// `DELETE /api/user/urls`：交给防抖器，立即返回 202
    pub async fn delete(
        payload: web::Json<Vec<String>>,
        owner: Owner,
        service: web::Data<ShortenService>,
    ) -> impl Responder {
        let aliases: Vec<String> = payload
            .into_inner()
            .into_iter()
            .filter(|alias| !alias.is_empty())
            .collect();
        if aliases.is_empty() {
            return HttpResponse::BadRequest().body("no aliases to delete");
        }

        debug!(
            "Queued deletion of {} aliases for owner '{}'",
            aliases.len(),
            owner.as_str()
        );
        service.delete_batch(aliases, owner.as_str());
        HttpResponse::Accepted().finish()
    }
}

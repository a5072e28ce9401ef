use actix_web::{HttpResponse, Responder, web};
use tracing::{debug, trace};

use super::error_response;
use crate::services::ShortenService;

pub struct RedirectService;

impl RedirectService {
    /// `GET /{id}`：307 跳转；已删除返回 410，不存在返回 404
    pub async fn handle_redirect(
        path: web::Path<String>,
        service: web::Data<ShortenService>,
    ) -> impl Responder {
        let alias = path.into_inner();

        match service.restore_origin(&alias).await {
            Ok(original) => {
                trace!("Redirecting {} -> {}", alias, original);
                HttpResponse::TemporaryRedirect()
                    .insert_header(("Location", original))
                    .finish()
            }
            Err(e) => {
                debug!("Redirect for '{}' failed: {}", alias, e);
                error_response(&e)
            }
        }
    }
}

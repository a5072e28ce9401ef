pub mod health;
pub mod redirect;
pub mod shorten;
pub mod user_urls;

use actix_web::{HttpResponse, web};
use tracing::error;

use crate::errors::ShortenerError;

pub use health::HealthService;
pub use redirect::RedirectService;
pub use shorten::ShortenHandlers;
pub use user_urls::UserUrlsService;

/// 业务错误到 HTTP 响应的映射，非信息性错误记为 error
pub fn error_response(err: &ShortenerError) -> HttpResponse {
    match err {
        ShortenerError::AlreadyExists { .. } => HttpResponse::Conflict().body(err.message()),
        ShortenerError::UrlDeleted { .. } => HttpResponse::Gone().body(err.message()),
        ShortenerError::NotFound(_) => HttpResponse::NotFound().body(err.message()),
        ShortenerError::NoRecordsForOwner(_) => HttpResponse::NoContent().finish(),
        ShortenerError::Validation(_) => HttpResponse::BadRequest().body(err.message()),
        _ => {
            error!("{}", err.format_simple());
            HttpResponse::InternalServerError().body("internal server error")
        }
    }
}

/// 全部路由；`/{id}` 放在最后
pub fn shortener_routes() -> actix_web::Scope {
    web::scope("")
        .route("/ping", web::get().to(HealthService::ping))
        .route("/api/shorten", web::post().to(ShortenHandlers::shorten_json))
        .route(
            "/api/shorten/batch",
            web::post().to(ShortenHandlers::shorten_batch),
        )
        .route("/api/user/urls", web::get().to(UserUrlsService::list))
        .route("/api/user/urls", web::delete().to(UserUrlsService::delete))
        .route("/", web::post().to(ShortenHandlers::shorten_text))
        .route("/{id}", web::get().to(RedirectService::handle_redirect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ShortenerError::already_exists("a", "b"), StatusCode::CONFLICT),
            (ShortenerError::url_deleted("a", "b"), StatusCode::GONE),
            (ShortenerError::not_found("a"), StatusCode::NOT_FOUND),
            (ShortenerError::no_records_for_owner("a"), StatusCode::NO_CONTENT),
            (ShortenerError::validation("a"), StatusCode::BAD_REQUEST),
            (
                ShortenerError::database_operation("a"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ShortenerError::alias_conflict("a"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(error_response(&err).status(), status, "{:?}", err);
        }
    }
}

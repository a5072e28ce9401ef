use std::time::Duration;

use actix_web::{HttpResponse, Responder, web};
use tracing::{error, trace};

use crate::services::ShortenService;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HealthService;

impl HealthService {
    /// `GET /ping`：存储可用时 200，否则 500
    pub async fn ping(service: web::Data<ShortenService>) -> impl Responder {
        match tokio::time::timeout(PING_TIMEOUT, service.ping()).await {
            Ok(Ok(())) => {
                trace!("Storage ping ok");
                HttpResponse::Ok().body("OK")
            }
            Ok(Err(e)) => {
                error!("Storage ping failed: {}", e);
                HttpResponse::InternalServerError().body("storage unavailable")
            }
            Err(_) => {
                error!("Storage ping timed out after {:?}", PING_TIMEOUT);
                HttpResponse::InternalServerError().body("storage unavailable")
            }
        }
    }
}

//! 匿名身份中间件
//!
//! Cookie 值为 `hex(id || HMAC-SHA256(secret, id))`，`id` 是 UUID v4 的 16 字节。
//! 缺失或校验失败时签发新身份并在响应中写回 Cookie。
//! Handler 通过 [`Owner`] 提取器获取当前身份。

use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_service::{Service, Transform};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::LocalBoxFuture;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::config::IdentityConfig;
use crate::errors::{Result, ShortenerError};

type HmacSha256 = Hmac<Sha256>;

const ID_LEN: usize = 16;
const MAC_LEN: usize = 32;

/// 当前请求的身份；未经中间件时为空字符串（匿名）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Owner(pub String);

impl Owner {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequest for Owner {
    type Error = Error;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(req.extensions().get::<Owner>().cloned().unwrap_or_default()))
    }
}

/// Cookie 签名器
#[derive(Clone)]
pub struct IdentitySigner {
    mac: HmacSha256,
}

impl IdentitySigner {
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| ShortenerError::config(format!("invalid identity secret: {}", e)))?;
        Ok(Self { mac })
    }

    /// 密钥为空时随机生成，重启后旧 Cookie 失效
    pub fn from_config(config: &IdentityConfig) -> Result<Self> {
        if config.secret.is_empty() {
            warn!("identity.secret is empty, using a random key; existing cookies will not survive a restart");
            let secret: [u8; 32] = rand::random();
            Self::new(&secret)
        } else {
            Self::new(config.secret.as_bytes())
        }
    }

    fn tag(&self, id: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(id);
        mac.finalize().into_bytes().to_vec()
    }

    /// 签发新身份，返回 (owner, cookie 值)
    pub fn issue(&self) -> (String, String) {
        let id = Uuid::new_v4();
        let mut token = id.as_bytes().to_vec();
        token.extend_from_slice(&self.tag(id.as_bytes()));
        (id.to_string(), hex::encode(token))
    }

    /// 校验 Cookie 值，成功时返回 owner
    pub fn verify(&self, value: &str) -> Option<String> {
        let raw = hex::decode(value).ok()?;
        if raw.len() != ID_LEN + MAC_LEN {
            return None;
        }
        let (id, tag) = raw.split_at(ID_LEN);
        if !bool::from(self.tag(id).as_slice().ct_eq(tag)) {
            return None;
        }
        Uuid::from_slice(id).ok().map(|id| id.to_string())
    }
}

/// 身份中间件工厂
#[derive(Clone)]
pub struct IdentityMiddleware {
    signer: Arc<IdentitySigner>,
    cookie_name: Rc<str>,
    max_age_secs: i64,
}

impl IdentityMiddleware {
    pub fn new(signer: Arc<IdentitySigner>, config: &IdentityConfig) -> Self {
        Self {
            signer,
            cookie_name: Rc::from(config.cookie_name.as_str()),
            max_age_secs: config.max_age_secs,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IdentityMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = IdentityService<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityService {
            service: Rc::new(service),
            signer: self.signer.clone(),
            cookie_name: self.cookie_name.clone(),
            max_age_secs: self.max_age_secs,
        }))
    }
}

pub struct IdentityService<S> {
    service: Rc<S>,
    signer: Arc<IdentitySigner>,
    cookie_name: Rc<str>,
    max_age_secs: i64,
}

impl<S, B> Service<ServiceRequest> for IdentityService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        let verified = req
            .cookie(&self.cookie_name)
            .and_then(|cookie| self.signer.verify(cookie.value()));

        let new_cookie = match verified {
            Some(owner) => {
                trace!("Identity cookie verified for {}", owner);
                req.extensions_mut().insert(Owner(owner));
                None
            }
            None => {
                let (owner, value) = self.signer.issue();
                trace!("Issued new identity {}", owner);
                req.extensions_mut().insert(Owner(owner));

                let mut cookie = Cookie::new(self.cookie_name.to_string(), value);
                cookie.set_path("/");
                cookie.set_http_only(true);
                cookie.set_same_site(SameSite::Lax);
                cookie.set_max_age(actix_web::cookie::time::Duration::seconds(
                    self.max_age_secs,
                ));
                Some(cookie)
            }
        };

        Box::pin(async move {
            let mut response = srv.call(req).await?;
            if let Some(cookie) = new_cookie
                && let Err(e) = response.response_mut().add_cookie(&cookie)
            {
                warn!("Failed to set identity cookie: {}", e);
            }
            Ok(response)
        })
    }
}

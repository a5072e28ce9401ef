//! HTTP layer: handlers in `services`, identity and request-id in `middleware`

pub mod middleware;
pub mod services;

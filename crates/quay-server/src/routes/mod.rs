//! HTTP routes.

pub mod demo;
pub mod health;

pub use demo::{
    Account, FlashMessage, FlashRequest, FlashResponse, LoginRequest, Visits, VisitsResponse,
    WhoAmIResponse, demo_routes,
};
pub use health::{HealthResponse, health_routes};

//! SEV customer REST API integration
//!
//! `client` owns the HTTP session and bearer token, `types` the wire
//! structures. Everything above this module talks to the API through the
//! [`MeterApi`] trait so it can run against a fake in tests.

pub mod client;
pub mod types;

pub use client::SevClient;
pub use types::{Credentials, Customer, Installation, MeterInfo, MeterReadings, Reading};

use crate::logging::get_logger;
use serde_json::Value;

/// Named operations exposed by the upstream API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    AvailableMeters,
    HourlyKwhUsage,
    EstimatedCo2,
    EstimatedCost,
}

impl Endpoint {
    /// Path relative to the API base URL
    pub fn path(&self) -> &'static str {
        match self {
            Self::Login => "login_and_get_jwt_token",
            Self::AvailableMeters => "get_available_meters",
            Self::HourlyKwhUsage => "hourly_kwh_usage",
            Self::EstimatedCo2 => "estimated_CO2",
            Self::EstimatedCost => "estimated_cost",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Authenticated "call endpoint X with payload Y" seam.
///
/// Implementations never fail loudly: any problem is logged and surfaces as
/// `None`.
#[async_trait::async_trait]
pub trait MeterApi: Send + Sync {
    async fn call(&self, endpoint: Endpoint, payload: &Value) -> Option<Value>;
}

/// List customers, installations and meters visible to the account
pub async fn available_meters(api: &dyn MeterApi) -> Option<Vec<Customer>> {
    let response = api
        .call(Endpoint::AvailableMeters, &serde_json::json!({}))
        .await?;
    match types::decode_customers(response) {
        Ok(customers) => Some(customers),
        Err(e) => {
            get_logger("api").error(&format!("Unexpected meter listing: {}", e));
            None
        }
    }
}

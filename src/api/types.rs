//! Wire types of the SEV customer REST API

use crate::error::{Result, SevError};
use serde::{Deserialize, Deserializer, Serialize};

/// Account credentials, fixed for the lifetime of one client
#[derive(Clone)]
pub struct Credentials {
    pub user_name: String,
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Login body; the API calls the key a password
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub user_name: &'a str,
    pub password: &'a str,
}

/// Body shared by the three reading endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ReadingsRequest<'a> {
    pub meters: &'a [String],
    pub from_date: String,
    pub to_date: String,
}

/// One hourly sample for one meter
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reading {
    pub time_stamp: String,
    #[serde(deserialize_with = "de_decimal")]
    pub reading: f64,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub cumulative_value: Option<f64>,
}

/// Chronologically ordered readings of one meter as returned by a reading endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeterReadings {
    #[serde(deserialize_with = "de_id")]
    pub meter_id: String,
    #[serde(default)]
    pub readings: Vec<Reading>,
}

/// `get_available_meters` top level entry
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub installations: Vec<Installation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Installation {
    #[serde(deserialize_with = "de_id")]
    pub inst_id: String,
    #[serde(default)]
    pub meters: Vec<MeterInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeterInfo {
    #[serde(deserialize_with = "de_id")]
    pub meter_id: String,
    #[serde(default)]
    pub meter_name: String,
    #[serde(default)]
    pub meter_type: String,
}

/// Parse the topology listing
pub fn decode_customers(value: serde_json::Value) -> Result<Vec<Customer>> {
    if value.is_null() {
        return Err(SevError::empty_response("get_available_meters"));
    }
    Ok(serde_json::from_value(value)?)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(serde_json::Number),
    Text(String),
}

/// Parse a decimal that may use a comma as separator; only finite values pass
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn de_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n.to_string()),
        NumberOrText::Text(s) => Ok(s),
    }
}

fn decimal_from<E: serde::de::Error>(raw: NumberOrText) -> std::result::Result<f64, E> {
    match raw {
        NumberOrText::Number(n) => n
            .as_f64()
            .ok_or_else(|| E::custom(format!("number out of range: {}", n))),
        NumberOrText::Text(s) => {
            parse_decimal(&s).ok_or_else(|| E::custom(format!("not a decimal: {:?}", s)))
        }
    }
}

fn de_decimal<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    decimal_from(NumberOrText::deserialize(deserializer)?)
}

fn de_opt_decimal<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrText>::deserialize(deserializer)?
        .map(decimal_from)
        .transpose()
}

//! Derived metric kinds and the per-meter metric table

use crate::api::Endpoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// The seven values derived for every meter
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Kwh,
    Co2,
    Cost,
    KwhToday,
    Co2Today,
    CostToday,
    KwhTotal,
}

/// How the host platform accumulates a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
}

/// Static presentation data for one metric kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub unit: &'static str,
    pub icon: &'static str,
    pub device_class: &'static str,
    pub state_class: StateClass,
    /// Value restarts from zero at the start of each day
    pub resets_daily: bool,
}

const KWH_ICON: &str = "mdi:home-lightning-bolt";
const CO2_ICON: &str = "mdi:molecule-co2";
const COST_ICON: &str = "mdi:circle-multiple";

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::Kwh,
        MetricKind::Co2,
        MetricKind::Cost,
        MetricKind::KwhToday,
        MetricKind::KwhTotal,
        MetricKind::Co2Today,
        MetricKind::CostToday,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Kwh => "kwh",
            Self::Co2 => "co2",
            Self::Cost => "cost",
            Self::KwhToday => "kwh_today",
            Self::Co2Today => "co2_today",
            Self::CostToday => "cost_today",
            Self::KwhTotal => "kwh_total",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    pub fn descriptor(&self) -> MetricDescriptor {
        match self {
            Self::Kwh => MetricDescriptor {
                name: "Energy consumption, last hour",
                unit: "kWh",
                icon: KWH_ICON,
                device_class: "energy",
                state_class: StateClass::Measurement,
                resets_daily: false,
            },
            Self::Co2 => MetricDescriptor {
                name: "Estimated co2 usage, last hour",
                unit: "kg",
                icon: CO2_ICON,
                device_class: "power_factor",
                state_class: StateClass::Measurement,
                resets_daily: false,
            },
            Self::Cost => MetricDescriptor {
                name: "Estimated cost, last hour",
                unit: "kr",
                icon: COST_ICON,
                device_class: "monetary",
                state_class: StateClass::Measurement,
                resets_daily: false,
            },
            Self::KwhToday => MetricDescriptor {
                name: "Energy consumption, today",
                unit: "kWh",
                icon: KWH_ICON,
                device_class: "energy",
                state_class: StateClass::Total,
                resets_daily: true,
            },
            Self::Co2Today => MetricDescriptor {
                name: "Estimated co2 usage, today",
                unit: "kg",
                icon: CO2_ICON,
                device_class: "power_factor",
                state_class: StateClass::Total,
                resets_daily: true,
            },
            Self::CostToday => MetricDescriptor {
                name: "Estimated cost, today",
                unit: "kr",
                icon: COST_ICON,
                device_class: "monetary",
                state_class: StateClass::Measurement,
                resets_daily: true,
            },
            Self::KwhTotal => MetricDescriptor {
                name: "Energy consumption, cumulative",
                unit: "kWh",
                icon: KWH_ICON,
                device_class: "energy",
                state_class: StateClass::Total,
                resets_daily: false,
            },
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// The three reading endpoints and the kinds each one feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingSource {
    Energy,
    Co2,
    Cost,
}

impl ReadingSource {
    pub const ALL: [ReadingSource; 3] = [Self::Energy, Self::Co2, Self::Cost];

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Energy => Endpoint::HourlyKwhUsage,
            Self::Co2 => Endpoint::EstimatedCo2,
            Self::Cost => Endpoint::EstimatedCost,
        }
    }

    /// Latest reading in the window
    pub fn latest(&self) -> MetricKind {
        match self {
            Self::Energy => MetricKind::Kwh,
            Self::Co2 => MetricKind::Co2,
            Self::Cost => MetricKind::Cost,
        }
    }

    /// Sum over the window
    pub fn today(&self) -> MetricKind {
        match self {
            Self::Energy => MetricKind::KwhToday,
            Self::Co2 => MetricKind::Co2Today,
            Self::Cost => MetricKind::CostToday,
        }
    }

    /// Lifetime counter, only reported by the energy endpoint
    pub fn total(&self) -> Option<MetricKind> {
        match self {
            Self::Energy => Some(MetricKind::KwhTotal),
            Self::Co2 | Self::Cost => None,
        }
    }
}

/// One table cell
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MetricValue {
    /// Timestamp of the reading the value was taken from
    pub time: String,
    pub value: f64,
}

pub type MeterMetrics = BTreeMap<MetricKind, MetricValue>;

/// `meter_id -> kind -> value`, rebuilt on every refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricTable {
    meters: BTreeMap<String, MeterMetrics>,
}

impl MetricTable {
    pub fn insert(&mut self, meter_id: &str, kind: MetricKind, value: MetricValue) {
        self.meters
            .entry(meter_id.to_string())
            .or_default()
            .insert(kind, value);
    }

    pub fn get(&self, meter_id: &str, kind: MetricKind) -> Option<&MetricValue> {
        self.meters.get(meter_id).and_then(|m| m.get(&kind))
    }

    pub fn meter(&self, meter_id: &str) -> Option<&MeterMetrics> {
        self.meters.get(meter_id)
    }

    pub fn meter_ids(&self) -> impl Iterator<Item = &str> {
        self.meters.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }
}

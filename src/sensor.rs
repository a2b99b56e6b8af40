//! Per (meter, metric) data points handed to the host platform

use crate::aggregator::TIMESTAMP_FORMAT;
use crate::api::types::{Customer, MeterInfo};
use crate::metrics::{MetricKind, MetricTable, StateClass};
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

pub const ATTRIBUTION: &str = "Data provided by api.sev.fo";

/// Display name for a meter; the two known type codes have fixed labels
pub fn meter_display_name(meter_type: &str, meter_name: &str) -> String {
    match meter_type {
        "E-01" => "Main meter".to_string(),
        "E-02" => "Green meter".to_string(),
        _ => meter_name.to_string(),
    }
}

/// A discovered meter and the installation it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterIdentity {
    pub inst_id: String,
    pub meter_id: String,
    pub display_name: String,
    pub meter_type: String,
}

impl MeterIdentity {
    pub fn new(inst_id: &str, meter: &MeterInfo) -> Self {
        Self {
            inst_id: inst_id.to_string(),
            meter_id: meter.meter_id.clone(),
            display_name: meter_display_name(&meter.meter_type, &meter.meter_name),
            meter_type: meter.meter_type.clone(),
        }
    }
}

/// Meters of one installation, in listing order
#[derive(Debug, Clone)]
pub struct InstallationMeters {
    pub inst_id: String,
    pub customer_name: String,
    pub meters: Vec<MeterIdentity>,
}

impl InstallationMeters {
    pub fn meter_ids(&self) -> Vec<String> {
        self.meters.iter().map(|m| m.meter_id.clone()).collect()
    }
}

/// Flatten the topology listing into installations
pub fn installations_from_topology(customers: &[Customer]) -> Vec<InstallationMeters> {
    customers
        .iter()
        .flat_map(|customer| {
            customer.installations.iter().map(|inst| InstallationMeters {
                inst_id: inst.inst_id.clone(),
                customer_name: customer.customer_name.clone(),
                meters: inst
                    .meters
                    .iter()
                    .map(|m| MeterIdentity::new(&inst.inst_id, m))
                    .collect(),
            })
        })
        .collect()
}

/// One readable value: a single metric of a single meter
#[derive(Debug, Clone)]
pub struct DataPoint {
    meter: MeterIdentity,
    kind: MetricKind,
    state: Option<f64>,
    date: Option<String>,
}

impl DataPoint {
    pub fn new(meter: MeterIdentity, kind: MetricKind) -> Self {
        Self {
            meter,
            kind,
            state: None,
            date: None,
        }
    }

    /// One data point per metric kind for `meter`
    pub fn all_for(meter: &MeterIdentity) -> Vec<Self> {
        MetricKind::ALL
            .into_iter()
            .map(|kind| Self::new(meter.clone(), kind))
            .collect()
    }

    pub fn unique_id(&self) -> String {
        format!(
            "e_mitt_sev_{}_{}_{}",
            self.meter.inst_id, self.meter.meter_id, self.kind
        )
    }

    pub fn entity_id(&self) -> String {
        format!(
            "sensor.mitt_sev_{}_{}-{}",
            self.meter.inst_id, self.meter.meter_id, self.kind
        )
    }

    pub fn friendly_name(&self) -> String {
        format!("{}, {}", self.meter.display_name, self.kind.descriptor().name)
    }

    pub fn meter(&self) -> &MeterIdentity {
        &self.meter
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// `None` until a refresh has produced this cell
    pub fn state(&self) -> Option<f64> {
        self.state
    }

    /// Pick this point's cell out of a freshly published table.
    ///
    /// An empty table means no data arrived at all and leaves the point
    /// untouched. Otherwise a missing cell clears the value; the date of
    /// the last reading seen is kept.
    pub fn update_from(&mut self, table: &MetricTable) {
        if table.is_empty() {
            return;
        }
        match table.get(&self.meter.meter_id, self.kind) {
            Some(cell) => {
                self.state = Some(cell.value);
                self.date = Some(cell.time.clone());
            }
            None => self.state = None,
        }
    }

    pub fn view(&self) -> DataPointView {
        let descriptor = self.kind.descriptor();
        let mut attributes = BTreeMap::new();
        attributes.insert("attribution".to_string(), ATTRIBUTION.to_string());
        if let Some(date) = &self.date {
            attributes.insert("date".to_string(), date.clone());
            if descriptor.resets_daily
                && let Some(reset) = start_of_day(date)
            {
                attributes.insert("last_reset".to_string(), reset);
            }
        }
        DataPointView {
            unique_id: self.unique_id(),
            entity_id: self.entity_id(),
            name: self.friendly_name(),
            installation_id: self.meter.inst_id.clone(),
            meter_id: self.meter.meter_id.clone(),
            kind: self.kind,
            state: self.state,
            unit: descriptor.unit.to_string(),
            icon: descriptor.icon.to_string(),
            device_class: descriptor.device_class.to_string(),
            state_class: descriptor.state_class,
            attributes,
        }
    }
}

/// Midnight of the day a reading timestamp falls on
fn start_of_day(time_stamp: &str) -> Option<String> {
    let parsed = NaiveDateTime::parse_from_str(time_stamp, TIMESTAMP_FORMAT).ok()?;
    Some(
        parsed
            .date()
            .and_time(NaiveTime::MIN)
            .format(TIMESTAMP_FORMAT)
            .to_string(),
    )
}

/// Serializable snapshot of a [`DataPoint`]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DataPointView {
    pub unique_id: String,
    pub entity_id: String,
    pub name: String,
    pub installation_id: String,
    pub meter_id: String,
    pub kind: MetricKind,
    pub state: Option<f64>,
    pub unit: String,
    pub icon: String,
    pub device_class: String,
    pub state_class: StateClass,
    pub attributes: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricValue;

    fn meter(meter_type: &str) -> MeterIdentity {
        MeterIdentity::new(
            "12",
            &MeterInfo {
                meter_id: "4711".into(),
                meter_name: "Garage".into(),
                meter_type: meter_type.into(),
            },
        )
    }

    #[test]
    fn known_meter_types_get_fixed_labels() {
        assert_eq!(meter("E-01").display_name, "Main meter");
        assert_eq!(meter("E-02").display_name, "Green meter");
        assert_eq!(meter("X-99").display_name, "Garage");
    }

    #[test]
    fn identifiers_follow_naming_scheme() {
        let p = DataPoint::new(meter("E-01"), MetricKind::KwhToday);
        assert_eq!(p.unique_id(), "e_mitt_sev_12_4711_kwh_today");
        assert_eq!(p.entity_id(), "sensor.mitt_sev_12_4711-kwh_today");
        assert_eq!(p.friendly_name(), "Main meter, Energy consumption, today");
    }

    #[test]
    fn update_reads_own_cell_and_handles_gaps() {
        let mut p = DataPoint::new(meter("E-01"), MetricKind::Co2);
        assert_eq!(p.state(), None);

        let mut table = MetricTable::default();
        table.insert(
            "4711",
            MetricKind::Co2,
            MetricValue {
                time: "2024-03-01T09:00:00".into(),
                value: 0.4,
            },
        );
        p.update_from(&table);
        assert_eq!(p.state(), Some(0.4));

        // Empty table: nothing arrived, keep the value
        p.update_from(&MetricTable::default());
        assert_eq!(p.state(), Some(0.4));

        // Table without this cell: gap
        let mut other = MetricTable::default();
        other.insert(
            "4711",
            MetricKind::Kwh,
            MetricValue {
                time: "2024-03-01T10:00:00".into(),
                value: 1.0,
            },
        );
        p.update_from(&other);
        assert_eq!(p.state(), None);
        let view = p.view();
        assert_eq!(view.attributes["date"], "2024-03-01T09:00:00");
        assert_eq!(view.attributes["attribution"], ATTRIBUTION);
        assert_eq!(view.unit, "kg");
    }

    #[test]
    fn daily_kinds_report_last_reset() {
        let mut table = MetricTable::default();
        for kind in [MetricKind::KwhToday, MetricKind::Kwh, MetricKind::KwhTotal] {
            table.insert(
                "4711",
                kind,
                MetricValue {
                    time: "2024-03-01T09:00:00".into(),
                    value: 1.0,
                },
            );
        }

        let mut today = DataPoint::new(meter("E-01"), MetricKind::KwhToday);
        today.update_from(&table);
        assert_eq!(today.view().attributes["last_reset"], "2024-03-01T00:00:00");

        for kind in [MetricKind::Kwh, MetricKind::KwhTotal] {
            let mut p = DataPoint::new(meter("E-01"), kind);
            p.update_from(&table);
            assert!(!p.view().attributes.contains_key("last_reset"));
        }

        // No reading yet: nothing to reset from
        let empty = DataPoint::new(meter("E-01"), MetricKind::CostToday);
        assert!(!empty.view().attributes.contains_key("last_reset"));
    }

    #[test]
    fn one_point_per_kind() {
        let points = DataPoint::all_for(&meter("E-02"));
        assert_eq!(points.len(), MetricKind::ALL.len());
    }
}

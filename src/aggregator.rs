//! Folds the three reading endpoints into the derived metric table
//!
//! One [`Aggregator`] serves a fixed set of meters. [`Aggregator::refresh`]
//! queries hourly kWh, estimated CO2 and estimated cost for the current day
//! concurrently, folds whatever came back into a fresh [`MetricTable`] and
//! swaps it in as a whole. Refreshes are throttled to a minimum interval.

use crate::api::types::{MeterReadings, ReadingsRequest};
use crate::api::MeterApi;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::metrics::{MetricKind, MetricTable, MetricValue, ReadingSource};
use chrono::{Local, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Wire format of window bounds and reading timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// `[start of today, now]` in local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    /// Window ending now, in `tz` or system local time
    pub fn today(tz: Option<Tz>) -> Self {
        let now = match tz {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        };
        Self::ending_at(now)
    }

    pub fn ending_at(now: NaiveDateTime) -> Self {
        Self {
            start: now.date().and_time(NaiveTime::MIN),
            end: now,
        }
    }

    pub fn from_date(&self) -> String {
        self.start.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn to_date(&self) -> String {
        self.end.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Write the derived cells of one endpoint's response into `table`.
///
/// Readings are taken in the order the API returned them; the final entry
/// is treated as the latest. Meters without readings contribute nothing.
pub fn fold_readings(table: &mut MetricTable, source: ReadingSource, meters: &[MeterReadings]) {
    for meter in meters {
        let Some(last) = meter.readings.last() else {
            continue;
        };
        let sum: f64 = meter.readings.iter().map(|r| r.reading).sum();
        table.insert(
            &meter.meter_id,
            source.latest(),
            MetricValue {
                time: last.time_stamp.clone(),
                value: last.reading,
            },
        );
        table.insert(
            &meter.meter_id,
            source.today(),
            MetricValue {
                time: last.time_stamp.clone(),
                value: sum,
            },
        );
        if let Some(kind) = source.total()
            && let Some(cumulative) = last.cumulative_value
        {
            table.insert(
                &meter.meter_id,
                kind,
                MetricValue {
                    time: last.time_stamp.clone(),
                    value: cumulative,
                },
            );
        }
    }
}

/// What a call to [`Aggregator::refresh`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new table was folded and published
    Refreshed,
    /// Network was queried but nothing usable came back; the old table stays
    Unchanged,
    /// Skipped: inside the minimum interval or another refresh is running
    Throttled,
}

pub struct Aggregator {
    api: Arc<dyn MeterApi>,
    meter_ids: Vec<String>,
    min_interval: Duration,
    timezone: Option<Tz>,
    table: RwLock<Arc<MetricTable>>,
    last_refresh: Mutex<Option<Instant>>,
    logger: StructuredLogger,
}

impl Aggregator {
    pub fn new(
        api: Arc<dyn MeterApi>,
        meter_ids: Vec<String>,
        min_interval: Duration,
        timezone: Option<Tz>,
    ) -> Self {
        Self::with_context(api, meter_ids, min_interval, timezone, LogContext::new("aggregator"))
    }

    pub fn with_context(
        api: Arc<dyn MeterApi>,
        meter_ids: Vec<String>,
        min_interval: Duration,
        timezone: Option<Tz>,
        context: LogContext,
    ) -> Self {
        Self {
            api,
            meter_ids,
            min_interval,
            timezone,
            table: RwLock::new(Arc::new(MetricTable::default())),
            last_refresh: Mutex::new(None),
            logger: get_logger_with_context(context),
        }
    }

    pub fn meter_ids(&self) -> &[String] {
        &self.meter_ids
    }

    /// Current table; never partially folded
    pub fn snapshot(&self) -> Arc<MetricTable> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn value(&self, meter_id: &str, kind: MetricKind) -> Option<MetricValue> {
        self.snapshot().get(meter_id, kind).cloned()
    }

    /// Recompute the table unless the last refresh is younger than the
    /// minimum interval.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Ok(mut last) = self.last_refresh.try_lock() else {
            self.logger.debug("Refresh already in progress");
            return RefreshOutcome::Throttled;
        };
        let now = Instant::now();
        if let Some(previous) = *last
            && now.duration_since(previous) < self.min_interval
        {
            return RefreshOutcome::Throttled;
        }
        *last = Some(now);
        self.refresh_now().await
    }

    async fn refresh_now(&self) -> RefreshOutcome {
        if self.meter_ids.is_empty() {
            self.logger.warn("No meters to refresh");
            return RefreshOutcome::Unchanged;
        }

        let window = Window::today(self.timezone);
        self.logger.info(&format!(
            "Refreshing {} meter(s) for {} .. {}",
            self.meter_ids.len(),
            window.from_date(),
            window.to_date()
        ));
        let payload = match serde_json::to_value(ReadingsRequest {
            meters: &self.meter_ids,
            from_date: window.from_date(),
            to_date: window.to_date(),
        }) {
            Ok(v) => v,
            Err(e) => {
                self.logger.error(&format!("Cannot encode request: {}", e));
                return RefreshOutcome::Unchanged;
            }
        };

        let (kwh, co2, cost) = tokio::join!(
            self.api.call(ReadingSource::Energy.endpoint(), &payload),
            self.api.call(ReadingSource::Co2.endpoint(), &payload),
            self.api.call(ReadingSource::Cost.endpoint(), &payload),
        );

        let mut table = MetricTable::default();
        for (source, response) in ReadingSource::ALL.into_iter().zip([kwh, co2, cost]) {
            match response {
                Some(value) => {
                    let meters = self.decode(source, value);
                    fold_readings(&mut table, source, &meters);
                }
                None => self.logger.warn(&format!(
                    "No data from {} this cycle",
                    source.endpoint()
                )),
            }
        }

        if table.is_empty() {
            self.logger
                .warn("Refresh produced no data; keeping previous values");
            return RefreshOutcome::Unchanged;
        }
        self.logger
            .debug(&format!("Folded metrics for {} meter(s)", table.len()));
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);
        RefreshOutcome::Refreshed
    }

    fn decode(&self, source: ReadingSource, value: Value) -> Vec<MeterReadings> {
        let Value::Array(entries) = value else {
            self.logger.error(&format!(
                "Unexpected {} response: expected a list of meters",
                source.endpoint()
            ));
            return Vec::new();
        };
        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<MeterReadings>(entry) {
                Ok(meter) => Some(meter),
                Err(e) => {
                    self.logger.warn(&format!(
                        "Skipping malformed {} entry: {}",
                        source.endpoint(),
                        e
                    ));
                    None
                }
            })
            .collect()
    }
}

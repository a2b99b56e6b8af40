//! Polling service tying discovery, aggregation and data points together

use crate::aggregator::{Aggregator, RefreshOutcome};
use crate::api::types::Customer;
use crate::api::{self, MeterApi};
use crate::config::Config;
use crate::error::{Result, SevError};
use crate::logging::{LogContext, StructuredLogger, get_logger};
use crate::metrics::MetricTable;
use crate::sensor::{DataPoint, DataPointView, InstallationMeters, installations_from_topology};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// One installation: its aggregator and the data points fed from it
pub struct InstallationHandle {
    pub inst_id: String,
    pub customer_name: String,
    aggregator: Aggregator,
    points: RwLock<Vec<DataPoint>>,
}

impl InstallationHandle {
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }
}

pub struct MeterService {
    installations: Vec<InstallationHandle>,
    logger: StructuredLogger,
}

impl MeterService {
    /// List the account's meters once and build one aggregator per installation
    pub async fn discover(client: Arc<dyn MeterApi>, config: &Config) -> Result<Self> {
        let customers = api::available_meters(client.as_ref())
            .await
            .ok_or_else(|| SevError::api("meter discovery failed"))?;
        Ok(Self::from_topology(
            client,
            &customers,
            config.polling.min_refresh_interval(),
            config.timezone()?,
        ))
    }

    pub fn from_topology(
        client: Arc<dyn MeterApi>,
        customers: &[Customer],
        min_interval: Duration,
        timezone: Option<Tz>,
    ) -> Self {
        let logger = get_logger("service");
        let installations: Vec<InstallationHandle> = installations_from_topology(customers)
            .into_iter()
            .map(|inst| Self::build_installation(&client, inst, min_interval, timezone, &logger))
            .collect();
        if installations.is_empty() {
            logger.warn("No sev installations found");
        }
        Self {
            installations,
            logger,
        }
    }

    fn build_installation(
        client: &Arc<dyn MeterApi>,
        inst: InstallationMeters,
        min_interval: Duration,
        timezone: Option<Tz>,
        logger: &StructuredLogger,
    ) -> InstallationHandle {
        logger.info(&format!(
            "customer: {}, installation: {}",
            inst.customer_name, inst.inst_id
        ));
        let points: Vec<DataPoint> = inst
            .meters
            .iter()
            .inspect(|m| logger.info(&format!("meter: {} : {}", m.meter_id, m.display_name)))
            .flat_map(DataPoint::all_for)
            .collect();
        let aggregator = Aggregator::with_context(
            Arc::clone(client),
            inst.meter_ids(),
            min_interval,
            timezone,
            LogContext::new("aggregator").with_installation(&inst.inst_id),
        );
        InstallationHandle {
            inst_id: inst.inst_id,
            customer_name: inst.customer_name,
            aggregator,
            points: RwLock::new(points),
        }
    }

    pub fn installations(&self) -> &[InstallationHandle] {
        &self.installations
    }

    /// Refresh every installation (throttled) and push the results into its data points
    pub async fn update_all(&self) {
        for inst in &self.installations {
            let outcome = inst.aggregator.refresh().await;
            if outcome == RefreshOutcome::Throttled {
                continue;
            }
            let table = inst.aggregator.snapshot();
            let mut points = inst.points.write().await;
            for point in points.iter_mut() {
                point.update_from(&table);
            }
            self.logger.debug(&format!(
                "Installation {} updated ({:?})",
                inst.inst_id, outcome
            ));
        }
    }

    /// Update on every tick of `scan_interval` until `shutdown` resolves
    pub async fn run<F>(&self, scan_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(scan_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    self.logger.info("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => self.update_all().await,
            }
        }
    }

    pub async fn data_points(&self) -> Vec<DataPointView> {
        let mut views = Vec::new();
        for inst in &self.installations {
            views.extend(inst.points.read().await.iter().map(DataPoint::view));
        }
        views
    }

    pub async fn data_point(&self, unique_id: &str) -> Option<DataPointView> {
        for inst in &self.installations {
            if let Some(point) = inst
                .points
                .read()
                .await
                .iter()
                .find(|p| p.unique_id() == unique_id)
            {
                return Some(point.view());
            }
        }
        None
    }

    /// Current table of every installation, keyed by installation id
    pub fn tables(&self) -> BTreeMap<String, Arc<MetricTable>> {
        self.installations
            .iter()
            .map(|inst| (inst.inst_id.clone(), inst.aggregator.snapshot()))
            .collect()
    }
}

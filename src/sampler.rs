//! Glue between the scheduler, the aggregator and the display model.

use crate::config::AppConfig;
use crate::data::SampleAggregator;
use crate::error::StartupError;
use crate::model::DisplayModel;
use crate::probes::SensorProbe;
use crate::scheduler::{Scheduler, TickPlan};
use tracing::{info, warn};

/// Result of one interval boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped,
    Sampled { tick: u64, render: bool },
}

impl TickOutcome {
    pub fn should_render(&self) -> bool {
        matches!(self, TickOutcome::Sampled { render: true, .. })
    }
}

pub struct SamplingLoop {
    aggregator: SampleAggregator,
    model: DisplayModel,
    scheduler: Scheduler,
}

impl SamplingLoop {
    /// Panels are created from the aggregator's registrations, so every probe
    /// registered at this point owns exactly one panel.
    pub fn new(
        aggregator: SampleAggregator,
        scheduler: Scheduler,
        history_capacity: usize,
        failure_threshold: u32,
    ) -> Self {
        let model = DisplayModel::new(
            aggregator.descriptors(),
            history_capacity,
            failure_threshold,
        );
        Self {
            aggregator,
            model,
            scheduler,
        }
    }

    /// Registers `probes` in order and sizes everything from `config`.
    /// A probe whose id is already taken is skipped.
    pub fn from_config(
        config: &AppConfig,
        probes: Vec<Box<dyn SensorProbe>>,
    ) -> Result<Self, StartupError> {
        let mut aggregator = SampleAggregator::new(config.probe_timeout());
        for probe in probes {
            if let Err(err) = aggregator.register(probe) {
                warn!("skipping probe: {}", err);
            }
        }
        if aggregator.is_empty() {
            return Err(StartupError::NoProbes);
        }
        info!(probes = aggregator.len(), "sampling loop ready");

        let scheduler = Scheduler::new(config.sample_interval(), config.render_interval());
        Ok(Self::new(
            aggregator,
            scheduler,
            config.history_capacity,
            config.failure_threshold,
        ))
    }

    pub fn on_interval(&mut self) -> TickOutcome {
        match self.scheduler.on_interval() {
            TickPlan::Skip => TickOutcome::Skipped,
            TickPlan::Sample { tick, render } => {
                let snapshot = self.aggregator.collect(tick);
                self.model.update(snapshot);
                TickOutcome::Sampled { tick, render }
            }
        }
    }

    pub fn model(&self) -> &DisplayModel {
        &self.model
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn aggregator(&self) -> &SampleAggregator {
        &self.aggregator
    }
}

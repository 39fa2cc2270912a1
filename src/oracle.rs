//! The entry point the outer search process calls.
//!
//! One evaluation runs decode, assembly, placement, connection and flight,
//! and turns whatever happens into a single [`Evaluation`] record.
//! Malformed or unflyable designs never panic; they come back as `Failure`
//! with sentinel metrics.

use crate::assembly::Assembler;
use crate::config::OracleConfig;
use crate::error::{DesignError, RuntimeSafetyCutoff};
use crate::grammar::{self, Design, FIELD_DELIMITER, UNPARSED_CAPACITY};
use crate::layout::NodeCounter;
use crate::placement::{HeadlessPlacement, PlacementSink};
use crate::simulator::{
    CollisionFlag, FlightSimulator, TerminationResult, TerminationStatus, TrajectorySample,
};
use crate::vehicle::VehicleModel;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// State scoped to a single evaluation.
///
/// Created fresh for every design, so nothing carries over between two
/// evaluations in the same process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    pub counter: NodeCounter,
    pub collision: CollisionFlag,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOptions {
    /// Keep the sampled trajectory in the result.
    pub record_trajectory: bool,
}

/// The oracle's verdict on one design.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(flatten)]
    pub result: TerminationResult,
    /// Capacity from the numeric suffix, or the unparsed sentinel.
    pub payload_capacity: f32,
    /// Bounded loops that stopped early while building the vehicle.
    pub cutoffs: Vec<RuntimeSafetyCutoff>,
    pub trajectory: Option<Vec<TrajectorySample>>,
}

impl Evaluation {
    fn rejected(error: &DesignError, payload_capacity: f32) -> Self {
        warn!(%error, "design rejected");
        Self {
            result: TerminationResult::failure(),
            payload_capacity,
            cutoffs: Vec::new(),
            trajectory: None,
        }
    }

    pub fn status(&self) -> TerminationStatus {
        self.result.status
    }

    /// `<status> <distance> <velocity> <cost>`
    pub fn result_line(&self) -> String {
        let r = &self.result;
        format!("{} {} {} {}", r.status, r.distance, r.velocity, r.cost)
    }

    /// The result line followed by one line per trajectory sample, if recorded.
    pub fn report_lines(&self) -> Vec<String> {
        std::iter::once(self.result_line())
            .chain(
                self.trajectory
                    .iter()
                    .flatten()
                    .map(|sample| sample.to_string()),
            )
            .collect()
    }
}

/// Evaluates design strings one at a time.
///
/// Placement requests go to the sink `S`; components staged by one
/// evaluation are released before the next one places its own.
pub struct EvaluationOracle<S: PlacementSink> {
    config: OracleConfig,
    assembler: Assembler,
    sink: S,
    staged: Option<VehicleModel>,
}

impl EvaluationOracle<HeadlessPlacement> {
    /// Oracle with default configuration that draws nothing.
    pub fn headless() -> Self {
        Self::new(OracleConfig::default(), HeadlessPlacement::new())
    }
}

impl<S: PlacementSink> EvaluationOracle<S> {
    pub fn new(config: OracleConfig, sink: S) -> Self {
        Self {
            assembler: Assembler::new(config.assembly.clone()),
            config,
            sink,
            staged: None,
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Vehicle placed by the latest evaluation, if it got that far.
    pub fn vehicle(&self) -> Option<&VehicleModel> {
        self.staged.as_ref()
    }

    pub fn evaluate(&mut self, design: &str) -> Evaluation {
        self.evaluate_with(design, EvaluationOptions::default())
    }

    pub fn evaluate_with(&mut self, design: &str, options: EvaluationOptions) -> Evaluation {
        self.release();
        let mut context = EvaluationContext::new();
        info!(design, "evaluating design");

        let decoded = match grammar::decode(design) {
            Ok(decoded) => decoded,
            Err(error) => return Evaluation::rejected(&error, suffix_capacity(design)),
        };

        match self.fly(&decoded, &mut context, options) {
            Ok(evaluation) => evaluation,
            Err(error) => Evaluation::rejected(&error, decoded.payload_capacity),
        }
    }

    /// Asks the sink to remove everything the previous evaluation placed.
    pub fn release(&mut self) {
        if let Some(mut vehicle) = self.staged.take() {
            vehicle.release(&mut self.sink);
        }
    }

    fn fly(
        &mut self,
        design: &Design,
        context: &mut EvaluationContext,
        options: EvaluationOptions,
    ) -> Result<Evaluation, DesignError> {
        let layout = self.assembler.build(design, &mut context.counter)?;
        let mut cutoffs = layout.cutoffs.clone();
        debug!(
            joints = layout.joints.len(),
            built = layout.steps.len(),
            skipped = layout.skipped.len(),
            "design assembled"
        );

        let vehicle = VehicleModel::place(&layout, &self.config.vehicle, &mut self.sink);
        let vehicle = self.staged.insert(vehicle);
        let connectivity = vehicle.connect(&self.config.vehicle)?;
        cutoffs.extend(connectivity.cutoff);

        let totals = vehicle.totals();
        let cost = totals.cost(&self.config.vehicle);
        let battery = totals.battery_energy(&self.config.vehicle);
        debug!(cost, battery, motors = totals.motor_count, "vehicle weighed");

        let mut simulator = FlightSimulator::new(
            vehicle,
            Some(&connectivity),
            design.payload_mass(),
            cost,
            battery,
            self.config.flight.clone(),
        );
        let result = loop {
            if let Some(result) = simulator.tick(&mut context.collision) {
                break result;
            }
        };

        Ok(Evaluation {
            result,
            payload_capacity: design.payload_capacity,
            cutoffs,
            trajectory: options
                .record_trajectory
                .then(|| simulator.into_trajectory()),
        })
    }
}

/// Best-effort read of the capacity field of a string that failed to decode.
fn suffix_capacity(design: &str) -> f32 {
    let field = design
        .split_once(FIELD_DELIMITER)
        .and_then(|(_, suffix)| suffix.split(FIELD_DELIMITER).next());
    grammar::parse_capacity(field).unwrap_or(UNPARSED_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_read_even_from_broken_designs() {
        assert_eq!(suffix_capacity("*a?M0,7,1"), 7.0);
        assert_eq!(suffix_capacity("*aMM0"), UNPARSED_CAPACITY);
        assert_eq!(suffix_capacity("*aMM0,x,1"), UNPARSED_CAPACITY);
    }

    #[test]
    fn context_reset_clears_collision_and_counter() {
        let mut context = EvaluationContext::new();
        context.collision.raise();
        assert!(context.counter.allocate().is_ok());
        context.reset();
        assert!(!context.collision.is_raised());
        assert_eq!(context.counter.peek(), 0);
    }
}

//! Fixed-step flight simulation of a placed vehicle.
//!
//! The simulator flies the [`Airframe`] under four PID loops (throttle,
//! pitch, roll, yaw). It starts in [`FlightMode::Hovering`]. Once the vehicle
//! holds still it switches to [`FlightMode::ForwardFlight`] and pitches its
//! nose down to cruise until the battery runs out or a guard trips.
//!
//! Each call to [`FlightSimulator::tick`] advances exactly one timestep. The
//! caller owns the clock.

use crate::airframe::{Airframe, BoundaryContact, ContactDetector};
use crate::blueprint::{ComponentCategory, MotorData};
use crate::config::FlightConfig;
use crate::pid::PidController;
use crate::vehicle::{Connectivity, VehicleModel};
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Control regime. The switch to forward flight is one-way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightMode {
    Hovering,
    ForwardFlight,
}

/// Outcome of an evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationStatus {
    Success,
    HitBoundary,
    CouldNotStabilize,
    Failure,
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "Success",
            Self::HitBoundary => "HitBoundary",
            Self::CouldNotStabilize => "CouldNotStabilize",
            Self::Failure => "Failure",
        })
    }
}

/// Final verdict of a simulation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerminationResult {
    pub status: TerminationStatus,
    pub distance: f32,
    pub velocity: f32,
    pub cost: f32,
}

impl TerminationResult {
    /// `Failure` with every metric set to the `-1` sentinel.
    pub fn failure() -> Self {
        Self {
            status: TerminationStatus::Failure,
            distance: -1.0,
            velocity: -1.0,
            cost: -1.0,
        }
    }
}

/// Pose of the main structure at one sampling instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub time: f32,
    pub position: Vec3,
    pub orientation: Quat,
}

impl fmt::Display for TrajectorySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (p, q) = (self.position, self.orientation);
        write!(
            f,
            "{} {} {} {} {} {} {} {}",
            self.time, p.x, p.y, p.z, q.x, q.y, q.z, q.w
        )
    }
}

/// Outputs of the four control loops on one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlOutputs {
    pub throttle: f32,
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
}

impl ControlOutputs {
    /// Thrust command for one motor, before the motor's own limit.
    ///
    /// Throttle plus the quadrant's pitch and roll mix plus the yaw output,
    /// which counter-rotating motors invert. A motor without a quadrant gets
    /// no command.
    pub fn motor_command(&self, category: ComponentCategory, motor: &MotorData) -> f32 {
        let Some(quadrant) = motor.quadrant else {
            return 0.0;
        };
        let (pitch_mix, roll_mix) = quadrant.mix();
        self.throttle
            + self.pitch * pitch_mix
            + self.roll * roll_mix
            + self.yaw * category.yaw_sign()
    }
}

/// Per-evaluation state the simulator shares with the oracle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollisionFlag {
    raised: bool,
}

impl CollisionFlag {
    pub fn raise(&mut self) {
        self.raised = true;
    }

    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn clear(&mut self) {
        self.raised = false;
    }
}

/// Flight state machine for one evaluation.
pub struct FlightSimulator {
    config: FlightConfig,
    airframe: Option<Airframe>,
    contact: Box<dyn ContactDetector>,
    cost: f32,
    battery_energy: f32,
    energy_used: f32,
    mode: FlightMode,
    throttle: f32,
    lift: f32,
    steps: u32,
    elapsed: f32,
    pitch: PidController,
    roll: PidController,
    yaw: PidController,
    altitude: PidController,
    trajectory: Vec<TrajectorySample>,
    terminal: Option<TerminationResult>,
}

impl FlightSimulator {
    /// Builds the flying airframe from `vehicle`.
    ///
    /// With a [`Connectivity`], only its members fly; otherwise every
    /// component does. The payload rides on the main structure.
    /// A vehicle without main structure yields a simulator whose first tick
    /// terminates with `Failure`.
    pub fn new(
        vehicle: &VehicleModel,
        connectivity: Option<&Connectivity>,
        payload_mass: f32,
        cost: f32,
        battery_energy: f32,
        config: FlightConfig,
    ) -> Self {
        let airframe = Airframe::build(vehicle, connectivity, payload_mass, &config);

        Self {
            config,
            airframe,
            contact: Box::new(BoundaryContact),
            cost,
            battery_energy,
            energy_used: 0.0,
            mode: FlightMode::Hovering,
            throttle: 0.0,
            lift: 0.0,
            steps: 0,
            elapsed: 0.0,
            pitch: PidController::new(),
            roll: PidController::new(),
            yaw: PidController::new(),
            altitude: PidController::new(),
            trajectory: Vec::new(),
            terminal: None,
        }
    }

    /// Replaces the default [`BoundaryContact`] detector.
    pub fn with_contact_detector(mut self, detector: Box<dyn ContactDetector>) -> Self {
        self.contact = detector;
        self
    }

    pub fn mode(&self) -> FlightMode {
        self.mode
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    /// Total foil lift applied on the latest tick.
    pub fn lift(&self) -> f32 {
        self.lift
    }

    pub fn energy_used(&self) -> f32 {
        self.energy_used
    }

    pub fn trajectory(&self) -> &[TrajectorySample] {
        &self.trajectory
    }

    pub fn into_trajectory(self) -> Vec<TrajectorySample> {
        self.trajectory
    }

    pub fn terminal(&self) -> Option<TerminationResult> {
        self.terminal
    }

    pub fn airframe(&self) -> Option<&Airframe> {
        self.airframe.as_ref()
    }

    /// Current pose of the main structure, if there is one.
    pub fn main_pose(&self) -> Option<(Vec3, Quat)> {
        self.airframe
            .as_ref()
            .map(|a| (a.main_position(), a.main_rotation()))
    }

    /// Advances one timestep.
    ///
    /// Returns the verdict on the tick that terminates the run; later calls
    /// change nothing and keep returning it.
    pub fn tick(&mut self, collision: &mut CollisionFlag) -> Option<TerminationResult> {
        if self.terminal.is_some() {
            return self.terminal;
        }
        self.steps += 1;
        self.elapsed += self.config.dt;

        let Some(mut airframe) = self.airframe.take() else {
            info!("no main structure to fly");
            self.terminal = Some(TerminationResult::failure());
            return self.terminal;
        };

        let verdict = self.step(&mut airframe, collision);
        self.airframe = Some(airframe);
        verdict
    }

    fn step(
        &mut self,
        airframe: &mut Airframe,
        collision: &mut CollisionFlag,
    ) -> Option<TerminationResult> {
        let cfg = &self.config;
        let dt = cfg.dt;
        let velocity = airframe.main_velocity();
        let spin = airframe.main_angular_velocity();

        let climb = self.altitude.output(cfg.throttle_gains, velocity.y, dt);
        self.throttle = (self.throttle - climb).clamp(0.0, cfg.max_throttle);

        if self.mode == FlightMode::Hovering
            && velocity.y.abs() < cfg.hover_linear_tolerance
            && spin.x.abs() < cfg.hover_angular_tolerance
            && spin.y.abs() < cfg.hover_angular_tolerance
            && velocity.x.abs() < cfg.hover_linear_tolerance
            && velocity.z.abs() < cfg.hover_linear_tolerance
            && self.steps > cfg.hover_min_steps
        {
            info!(steps = self.steps, "hover stable, switching to forward flight");
            self.mode = FlightMode::ForwardFlight;
        }

        let main_rotation = airframe.main_rotation();
        let (yaw, pitch, roll) = main_rotation.to_euler(EulerRot::YXZ);
        let pitch_error = wrap_degrees(pitch.to_degrees() - self.target_pitch());
        let roll_error = wrap_degrees(-roll.to_degrees());
        let yaw_error = wrap_degrees(yaw.to_degrees() - airframe.reference_yaw());

        let pitch_gains = if self.throttle > cfg.pitch_boost_throttle {
            cfg.pitch_gains.scaled(cfg.pitch_gain_boost)
        } else {
            cfg.pitch_gains
        };
        let outputs = ControlOutputs {
            throttle: self.throttle,
            pitch: self.pitch.output(pitch_gains, pitch_error, dt),
            roll: self.roll.output(cfg.roll_gains, roll_error, dt),
            yaw: self.yaw.output(cfg.yaw_gains, yaw_error, dt),
        };

        let forward = main_rotation * Vec3::Z;
        let heading = velocity.normalize_or_zero();
        let planar_speed = Vec3::new(velocity.x, 0.0, velocity.z).length();
        let alignment = forward.dot(heading).max(0.0);

        self.lift = 0.0;
        for slot in 0..airframe.parts().len() {
            let part = &airframe.parts()[slot];
            if part.category != ComponentCategory::Foil {
                continue;
            }
            let scale = part.scale;
            let Some(pose) = airframe.pose(slot) else {
                continue;
            };
            let hit = airframe.look_ahead(
                slot,
                pose.position + forward * (0.75 * scale / 2.0 + cfg.lookahead_margin),
                forward,
            );
            if hit.blocks_lift() {
                debug!(component = pose.component, ?hit, "foil lift blocked");
                continue;
            }
            let area = pose.half_size.x * pose.half_size.z * 4.0;
            let lift = alignment * cfg.lift_coefficient * planar_speed * planar_speed * area;
            self.lift += lift;
            airframe.add_force_at_point(slot, pose.rotation * Vec3::Y * lift, pose.position);
        }

        let mut verdict = None;
        if self.energy_used < self.battery_energy {
            for slot in 0..airframe.parts().len() {
                let part = &airframe.parts()[slot];
                let Some(motor) = part.motor else {
                    continue;
                };
                let category = part.category;
                // Negative commands push down and credit energy back.
                let thrust = outputs.motor_command(category, &motor).min(motor.max_thrust);
                self.energy_used += thrust / cfg.thrust_per_energy;

                let Some(pose) = airframe.pose(slot) else {
                    continue;
                };
                let up = pose.rotation * Vec3::Y;
                airframe.add_force_at_point(slot, up * thrust, pose.position);
                airframe.add_torque(slot, up * thrust * category.spin_sign());
            }
        } else {
            verdict = Some(match self.mode {
                FlightMode::ForwardFlight => TerminationStatus::Success,
                FlightMode::Hovering => TerminationStatus::CouldNotStabilize,
            });
        }

        let main_position = airframe.main_position();
        if main_position.y <= cfg.boundary_height {
            verdict = Some(TerminationStatus::HitBoundary);
            collision.raise();
        }

        if main_position.x.abs() > cfg.runaway_x
            || main_position.z.abs() > cfg.runaway_z
            || self.steps > cfg.max_steps
        {
            if self.energy_used < self.battery_energy {
                debug!(steps = self.steps, "runaway guard drained the battery");
            }
            self.energy_used = f32::INFINITY;
        }

        if main_position.y > cfg.altitude_ceiling {
            verdict = Some(TerminationStatus::CouldNotStabilize);
        }

        if collision.is_raised() {
            verdict = Some(match self.mode {
                FlightMode::ForwardFlight => TerminationStatus::HitBoundary,
                FlightMode::Hovering => TerminationStatus::CouldNotStabilize,
            });
        }

        if self.elapsed % cfg.sample_interval <= dt {
            self.trajectory.push(TrajectorySample {
                time: self.elapsed,
                position: main_position,
                orientation: main_rotation,
            });
        }

        if let Some(status) = verdict {
            let distance = match self.mode {
                FlightMode::ForwardFlight => {
                    main_position.distance(airframe.initial_main_position())
                }
                FlightMode::Hovering => -velocity.y.abs(),
            } / cfg.distance_divisor;
            let result = TerminationResult {
                status,
                distance,
                velocity: cfg.velocity_factor * planar_speed,
                cost: self.cost,
            };
            info!(
                %status,
                distance,
                velocity = result.velocity,
                steps = self.steps,
                "flight terminated"
            );
            self.terminal = Some(result);
            return self.terminal;
        }

        let contacts = airframe.step();
        if self.contact.in_contact(&contacts) {
            debug!(?contacts, "contact detected");
            collision.raise();
        }
        None
    }

    /// Pitch the attitude loop holds in the current mode, in degrees.
    pub fn target_pitch(&self) -> f32 {
        match self.mode {
            FlightMode::Hovering => 0.0,
            FlightMode::ForwardFlight => self.config.forward_pitch_degrees,
        }
    }
}

/// Wraps an angle in degrees into `(-180, 180]`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angles_wrap_into_half_open_range() {
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert!((wrap_degrees(350.0) + 10.0).abs() < 1e-4);
        assert!((wrap_degrees(-190.0) - 170.0).abs() < 1e-4);
    }

    #[test]
    fn collision_flag_clears() {
        let mut flag = CollisionFlag::default();
        assert!(!flag.is_raised());
        flag.raise();
        assert!(flag.is_raised());
        flag.clear();
        assert!(!flag.is_raised());
    }
}

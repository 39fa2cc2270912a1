//! Tunable constants for assembly, vehicle modelling and flight.
//!
//! Every struct implements [`Default`] with the baseline values the oracle is
//! calibrated against, and deserializes with `#[serde(default)]` so callers can
//! override a handful of fields without restating the rest.

use crate::blueprint::ShapePrimitive;
use crate::pid::PidGains;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Complete configuration of one oracle instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub assembly: AssemblyConfig,
    pub vehicle: VehicleConfig,
    pub flight: FlightConfig,
}

/// Settings for the assembly sequencer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Maximum number of sequenced edges that are built.
    pub max_steps: usize,
    /// Maximum number of resize steps applied to one component.
    pub max_size_steps: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_size_steps: 100,
        }
    }
}

/// Geometry, mass and economics of the placed vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Distance between neighbouring grid joints in designer units.
    pub grid_spacing: f32,
    /// Uniform scale applied when the design is copied to the staging area.
    pub staging_scale: f32,
    /// Translation of the staged copy (puts the design above the boundary plane).
    pub staging_offset: Vec3,

    /// Linear scale change per size step.
    pub size_step: f32,
    /// Shrinking is only allowed while the linear scale is above this value.
    pub shrink_floor: f32,

    /// Yaw structures and foils are staged at, in degrees. Motor offsets are
    /// yawed by the same angle before quadrant classification.
    pub heading_degrees: f32,
    /// Pitch of foils after the heading yaw, in degrees.
    pub foil_tilt_degrees: f32,
    /// Dead band around each axis when classifying quadrants.
    pub quadrant_tolerance: f32,

    pub structure_shape: ShapePrimitive,
    pub motor_shape: ShapePrimitive,
    pub foil_shape: ShapePrimitive,
    pub connector_shape: ShapePrimitive,

    /// Volume per unit mass, per category (mass = volume / divisor).
    pub structure_volume_per_mass: f32,
    pub motor_volume_per_mass: f32,
    pub foil_volume_per_mass: f32,

    /// Mass per unit drag, per category (drag = mass / divisor).
    pub structure_mass_per_drag: f32,
    pub motor_mass_per_drag: f32,
    pub foil_mass_per_drag: f32,

    /// Static thrust every motor has regardless of size.
    pub motor_base_thrust: f32,
    /// Swept volume that yields one unit of thrust.
    pub motor_prop_volume: f32,
    /// Stretch applied to the motor's width when sizing its propeller.
    pub motor_prop_stretch: f32,

    /// Maximum number of greedy connection passes.
    pub max_connection_passes: usize,

    /// Structure weight of the reference design.
    pub reference_structure_weight: f32,
    /// Battery energy of the reference design.
    pub reference_battery_energy: f32,

    pub structural_cost_per_weight: f32,
    pub foil_cost_per_weight: f32,
    pub controller_base_cost: f32,
    pub controller_cost_per_motor: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            grid_spacing: 10.0,
            staging_scale: 2.0,
            staging_offset: Vec3::new(0.0, 1000.0, 2000.0),
            size_step: 0.25,
            shrink_floor: 0.8,
            heading_degrees: 45.0,
            foil_tilt_degrees: -10.0,
            quadrant_tolerance: 0.01,
            structure_shape: ShapePrimitive::Box(Vec3::new(2.8, 0.5, 2.8)),
            motor_shape: ShapePrimitive::Cylinder {
                radius: 0.6,
                height: 0.5,
            },
            foil_shape: ShapePrimitive::Box(Vec3::new(3.0, 0.1, 1.2)),
            connector_shape: ShapePrimitive::Box(Vec3::new(0.25, 0.25, 4.0)),
            structure_volume_per_mass: 20.0,
            motor_volume_per_mass: 10.0,
            foil_volume_per_mass: 71.0,
            structure_mass_per_drag: 100.0,
            motor_mass_per_drag: 400.0,
            foil_mass_per_drag: 400.0,
            motor_base_thrust: 10.0,
            motor_prop_volume: 0.075,
            motor_prop_stretch: 1.4,
            max_connection_passes: 100,
            reference_structure_weight: 17.7,
            reference_battery_energy: 570.0,
            structural_cost_per_weight: 140.0,
            foil_cost_per_weight: 40.0,
            controller_base_cost: 200.0,
            controller_cost_per_motor: 50.0,
        }
    }
}

/// Flight-dynamics and controller settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Fixed simulation timestep in seconds.
    pub dt: f32,
    pub gravity: Vec3,

    pub pitch_gains: PidGains,
    pub roll_gains: PidGains,
    pub yaw_gains: PidGains,
    pub throttle_gains: PidGains,

    pub max_throttle: f32,
    /// Above this throttle the pitch gains are multiplied by `pitch_gain_boost`.
    pub pitch_boost_throttle: f32,
    pub pitch_gain_boost: f32,

    /// Hover is declared once these bounds hold after `hover_min_steps`.
    pub hover_linear_tolerance: f32,
    pub hover_angular_tolerance: f32,
    pub hover_min_steps: u32,

    /// Nose-down pitch held during forward flight, in degrees.
    pub forward_pitch_degrees: f32,

    pub lift_coefficient: f32,
    /// Thrust that drains one unit of battery energy per tick.
    pub thrust_per_energy: f32,

    pub angular_damping: f32,
    pub max_angular_speed: f32,

    /// Height of the boundary plane under the staged design.
    pub boundary_height: f32,
    /// Altitude above which the run is treated as an outlier.
    pub altitude_ceiling: f32,
    pub runaway_x: f32,
    pub runaway_z: f32,
    pub max_steps: u32,

    /// Trajectory sampling period in seconds.
    pub sample_interval: f32,

    pub distance_divisor: f32,
    pub velocity_factor: f32,

    /// How far ahead of a foil its lookahead ray starts, on top of a size-dependent part.
    pub lookahead_margin: f32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            dt: 0.02,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            pitch_gains: PidGains::new(2.0, 3.0, 2.0),
            roll_gains: PidGains::new(2.0, 0.2, 0.5),
            yaw_gains: PidGains::new(1.0, 0.0, 0.0),
            throttle_gains: PidGains::new(0.5, 0.2, 0.2),
            max_throttle: 200.0,
            pitch_boost_throttle: 100.0,
            pitch_gain_boost: 2.0,
            hover_linear_tolerance: 0.10,
            hover_angular_tolerance: 0.05,
            hover_min_steps: 100,
            forward_pitch_degrees: 16.0,
            lift_coefficient: 0.0005,
            thrust_per_energy: 500.0,
            angular_damping: 0.05,
            max_angular_speed: 7.0,
            boundary_height: 960.0,
            altitude_ceiling: 1200.0,
            runaway_x: 2000.0,
            runaway_z: 4000.0,
            max_steps: 40_000,
            sample_interval: 0.2,
            distance_divisor: 38.0,
            velocity_factor: 0.5418,
            lookahead_margin: 5.0,
        }
    }
}

use crate::grammar::ComponentType;
use crate::placement::PlacementHandle;
use bevy_heavy::ComputeMassProperties3d;
use bevy_math::primitives::{Cuboid, Cylinder};
use glam::{Mat3, Quat, Vec3};
use rapier3d::prelude::ColliderBuilder;
use serde::{Deserialize, Serialize};

/// Index of a component inside a [`crate::vehicle::VehicleModel`].
pub type ComponentId = usize;

/// Physical role of a placed component.
///
/// Stored on the component at placement time; every force, mass and lookahead
/// decision matches on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentCategory {
    Structure,
    MotorCw,
    MotorCcw,
    Connector,
    Foil,
}

impl ComponentCategory {
    /// Category hosted at a joint of the given type, if any.
    pub fn from_component_type(kind: ComponentType) -> Option<Self> {
        match kind {
            ComponentType::Structure => Some(Self::Structure),
            ComponentType::MotorCw => Some(Self::MotorCw),
            ComponentType::MotorCcw => Some(Self::MotorCcw),
            ComponentType::Foil => Some(Self::Foil),
            ComponentType::None => None,
        }
    }

    pub fn is_motor(self) -> bool {
        matches!(self, Self::MotorCw | Self::MotorCcw)
    }

    /// Sign of the yaw command for this motor; counter-rotating motors invert it.
    pub fn yaw_sign(self) -> f32 {
        match self {
            Self::MotorCcw => -1.0,
            _ => 1.0,
        }
    }

    /// Sign of the reaction torque about the spin axis.
    pub fn spin_sign(self) -> f32 {
        match self {
            Self::MotorCcw => 1.0,
            Self::MotorCw => -1.0,
            _ => 0.0,
        }
    }
}

/// Supported geometric primitives for vehicle components.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ShapePrimitive {
    /// A box defined by half-extents (x, y, z).
    Box(Vec3),
    /// A cylinder defined by radius and height (aligned along Y axis).
    Cylinder { radius: f32, height: f32 },
}

/// The `bevy_math` shape behind a [`ShapePrimitive`], weighed through
/// [`ComputeMassProperties3d`] when a component is staged.
#[derive(Clone, Copy, Debug)]
pub enum BevyPrimitive {
    Cuboid(Cuboid),
    Cylinder(Cylinder),
}

impl ComputeMassProperties3d for BevyPrimitive {
    fn mass(&self, density: f32) -> f32 {
        match self {
            Self::Cuboid(s) => s.mass(density),
            Self::Cylinder(s) => s.mass(density),
        }
    }

    fn unit_principal_angular_inertia(&self) -> Vec3 {
        match self {
            Self::Cuboid(s) => s.unit_principal_angular_inertia(),
            Self::Cylinder(s) => s.unit_principal_angular_inertia(),
        }
    }

    fn center_of_mass(&self) -> Vec3 {
        match self {
            Self::Cuboid(s) => s.center_of_mass(),
            Self::Cylinder(s) => s.center_of_mass(),
        }
    }
}

impl ShapePrimitive {
    /// Convert to the corresponding `bevy_math` primitive for mass-property computation.
    pub fn to_bevy_primitive(self) -> BevyPrimitive {
        match self {
            Self::Box(half_extents) => BevyPrimitive::Cuboid(Cuboid {
                half_size: half_extents,
            }),
            Self::Cylinder { radius, height } => {
                BevyPrimitive::Cylinder(Cylinder::new(radius, height))
            }
        }
    }

    /// Uniformly scaled copy.
    pub fn scaled(self, factor: f32) -> Self {
        match self {
            Self::Box(half_extents) => Self::Box(half_extents * factor),
            Self::Cylinder { radius, height } => Self::Cylinder {
                radius: radius * factor,
                height: height * factor,
            },
        }
    }

    /// Half-extents of the primitive in its own frame.
    pub fn half_extents(self) -> Vec3 {
        match self {
            Self::Box(half_extents) => half_extents,
            Self::Cylinder { radius, height } => Vec3::new(radius, height / 2.0, radius),
        }
    }

    /// Full size of the axis-aligned box enclosing the primitive once rotated.
    pub fn bounds_size(self, rotation: Quat) -> Vec3 {
        let m = Mat3::from_quat(rotation);
        let h = self.half_extents();
        let abs = Mat3::from_cols(m.x_axis.abs(), m.y_axis.abs(), m.z_axis.abs());
        2.0 * (abs * h)
    }

    /// Principal moments of inertia about the primitive's own axes for the given mass.
    pub fn principal_inertia(self, mass: f32) -> Vec3 {
        self.to_bevy_primitive().unit_principal_angular_inertia() * mass
    }

    /// Collider of the same geometry. Mass properties are left to the caller.
    pub fn to_collider(self) -> ColliderBuilder {
        match self {
            Self::Box(h) => ColliderBuilder::cuboid(h.x, h.y, h.z),
            Self::Cylinder { radius, height } => ColliderBuilder::cylinder(height / 2.0, radius),
        }
    }
}

/// One of eight directional groups used to mix motor commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    Front,
    Back,
    Left,
    Right,
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
}

impl Quadrant {
    /// Classifies an offset from the design centroid.
    ///
    /// The offset is yawed by `yaw_degrees` first. A component within
    /// `tolerance` of an axis falls in that axis' pure quadrant; one within
    /// tolerance of both axes has no quadrant.
    pub fn classify(offset: Vec3, yaw_degrees: f32, tolerance: f32) -> Option<Self> {
        let v = Quat::from_rotation_y(yaw_degrees.to_radians()) * offset;
        let x = axis_sign(v.x, tolerance);
        let z = axis_sign(v.z, tolerance);
        match (x, z) {
            (1, 1) => Some(Self::FrontLeft),
            (1, -1) => Some(Self::FrontRight),
            (-1, -1) => Some(Self::BackRight),
            (-1, 1) => Some(Self::BackLeft),
            (1, 0) => Some(Self::Front),
            (-1, 0) => Some(Self::Back),
            (0, 1) => Some(Self::Left),
            (0, -1) => Some(Self::Right),
            _ => None,
        }
    }

    /// Quadrant on the other side of the centroid.
    pub fn opposite(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::FrontLeft => Self::BackRight,
            Self::BackRight => Self::FrontLeft,
            Self::FrontRight => Self::BackLeft,
            Self::BackLeft => Self::FrontRight,
        }
    }

    /// Signs applied to the pitch and roll commands for this quadrant.
    pub fn mix(self) -> (f32, f32) {
        match self {
            Self::FrontRight => (1.0, 1.0),
            Self::FrontLeft => (1.0, -1.0),
            Self::BackRight => (-1.0, 1.0),
            Self::BackLeft => (-1.0, -1.0),
            Self::Right => (0.0, 1.0),
            Self::Left => (0.0, -1.0),
            Self::Front => (1.0, 0.0),
            Self::Back => (-1.0, 0.0),
        }
    }
}

fn axis_sign(value: f32, tolerance: f32) -> i8 {
    if value > tolerance {
        1
    } else if value < -tolerance {
        -1
    } else {
        0
    }
}

/// Propulsion data carried by motor components.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotorData {
    /// `None` when the motor sits on the centroid; such a motor never receives a command.
    pub quadrant: Option<Quadrant>,
    pub max_thrust: f32,
}

/// A component placed in the staging area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalComponent {
    pub category: ComponentCategory,
    /// Staged world position.
    pub position: Vec3,
    /// Orientation relative to the vehicle body.
    pub rotation: Quat,
    /// Staged geometry.
    pub shape: ShapePrimitive,
    /// Linear scale relative to the base shape (staging and size steps combined).
    pub scale: f32,
    pub mass: f32,
    pub drag: f32,
    pub motor: Option<MotorData>,
    /// Handle returned by the placement collaborator.
    #[serde(skip)]
    pub handle: Option<PlacementHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_axis_offsets_get_pure_quadrants() {
        let c = Quadrant::classify(Vec3::new(1.0, 0.0, 1.0), 45.0, 0.01);
        assert_eq!(c, Some(Quadrant::Front));
        let c = Quadrant::classify(Vec3::new(-1.0, 0.0, 1.0), 45.0, 0.01);
        assert_eq!(c, Some(Quadrant::Left));
        assert_eq!(Quadrant::classify(Vec3::ZERO, 45.0, 0.01), None);
    }

    #[test]
    fn rotated_box_bounds_grow() {
        let shape = ShapePrimitive::Box(Vec3::new(1.0, 0.5, 1.0));
        let size = shape.bounds_size(Quat::from_rotation_y(45f32.to_radians()));
        assert!((size.x - 2.0 * 2f32.sqrt()).abs() < 1e-4);
        assert!((size.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cylinder_spins_easiest_about_its_axis() {
        let shape = ShapePrimitive::Cylinder {
            radius: 1.0,
            height: 4.0,
        };
        let inertia = shape.principal_inertia(2.0);
        assert!((inertia.y - 1.0).abs() < 1e-4);
        assert!(inertia.x > inertia.y);
        assert!((inertia.x - inertia.z).abs() < 1e-4);
    }

    #[test]
    fn box_mass_is_volume_times_density() {
        let shape = ShapePrimitive::Box(Vec3::new(1.0, 2.0, 3.0));
        let mass = shape.to_bevy_primitive().mass(1.0 / 20.0);
        assert!((mass - 48.0 / 20.0).abs() < 1e-3);
    }
}

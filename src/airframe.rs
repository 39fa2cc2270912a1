//! Rigid-body world of one flight.
//!
//! Every component with mass flies as its own dynamic body, welded to the
//! component it was connected to by a fixed joint. Connectors carry no mass;
//! their colliders ride on their anchor's body. The boundary is a fixed slab
//! whose top face sits at the boundary height.

use crate::blueprint::{
    ComponentCategory, ComponentId, MotorData, PhysicalComponent, ShapePrimitive,
};
use crate::config::FlightConfig;
use crate::vehicle::{Connectivity, VehicleModel};
use glam::{EulerRot, Quat, Vec3};
use rapier3d::na::{
    Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3, point, vector,
};
use rapier3d::prelude::*;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

const VEHICLE_COLLISION_GROUP: Group = Group::GROUP_1;
const BOUNDARY_COLLISION_GROUP: Group = Group::GROUP_2;
/// Half size of the boundary slab. Wide enough for anything the runaway guard lets through.
const BOUNDARY_HALF_EXTENTS: [f32; 3] = [4000.0, 10.0, 8000.0];

/// World pose and extent of one flying component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartPose {
    pub component: ComponentId,
    pub category: ComponentCategory,
    pub position: Vec3,
    pub rotation: Quat,
    /// Half size of the world-aligned bounding box.
    pub half_size: Vec3,
}

/// What the lookahead ray in front of a foil ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookahead {
    Clear,
    Component(ComponentCategory),
    /// Something that is not a vehicle component, such as the boundary.
    Unclassified,
}

impl Lookahead {
    /// Only motors and connectors in front of a foil cancel its lift.
    pub fn blocks_lift(self) -> bool {
        match self {
            Self::Component(category) => !matches!(
                category,
                ComponentCategory::Foil | ComponentCategory::Structure
            ),
            Self::Clear | Self::Unclassified => false,
        }
    }
}

/// What a flying component started touching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Touched {
    Boundary,
    Component(ComponentId),
}

/// A contact that began during the last physics step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contact {
    pub component: ComponentId,
    pub category: ComponentCategory,
    pub touched: Touched,
}

/// Decides after each physics step whether the vehicle touched something.
///
/// A positive answer raises the evaluation's collision flag, which the next
/// tick turns into a termination.
pub trait ContactDetector {
    fn in_contact(&mut self, contacts: &[Contact]) -> bool;
}

/// Reports contact as soon as any component touches the boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundaryContact;

impl ContactDetector for BoundaryContact {
    fn in_contact(&mut self, contacts: &[Contact]) -> bool {
        contacts.iter().any(|c| c.touched == Touched::Boundary)
    }
}

/// Collects the collider pairs whose contact started during a step.
#[derive(Default)]
struct ContactLog {
    started: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl ContactLog {
    fn drain(&mut self) -> Vec<(ColliderHandle, ColliderHandle)> {
        std::mem::take(
            self.started
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl EventHandler for ContactLog {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Started(a, b, _) = event {
            self.started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((a, b));
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: f32,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: f32,
    ) {
    }
}

/// A component that flies with the vehicle.
#[derive(Clone, Debug)]
pub struct FlyingPart {
    pub component: ComponentId,
    pub category: ComponentCategory,
    /// Linear scale of the staged component.
    pub scale: f32,
    pub motor: Option<MotorData>,
    shape: ShapePrimitive,
    body: RigidBodyHandle,
    collider: ColliderHandle,
}

/// The physics world of one flight, from the first tick to the verdict.
pub struct Airframe {
    pipeline: PhysicsPipeline,
    gravity: Vector3<f32>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    events: ContactLog,
    parts: Vec<FlyingPart>,
    by_collider: HashMap<ColliderHandle, usize>,
    boundary: ColliderHandle,
    /// Index of the main structure in `parts`.
    main: usize,
    max_angular_speed: f32,
    initial_main_position: Vec3,
    reference_yaw: f32,
}

impl Airframe {
    /// Builds the world for `vehicle`, or `None` without a main structure.
    ///
    /// With a [`Connectivity`], only its members fly and each is welded to its
    /// anchor; otherwise every component flies, welded to the main structure.
    /// The payload is extra mass on the main structure's body.
    pub fn build(
        vehicle: &VehicleModel,
        connectivity: Option<&Connectivity>,
        payload_mass: f32,
        config: &FlightConfig,
    ) -> Option<Self> {
        let main_id = vehicle.main_structure()?;
        let main_component = vehicle.component(main_id)?;

        let (members, anchors): (Vec<ComponentId>, HashMap<ComponentId, ComponentId>) =
            match connectivity {
                Some(c) => (
                    c.members().collect(),
                    c.attachments.iter().map(|a| (a.component, a.anchor)).collect(),
                ),
                None => {
                    let mut members = vec![main_id];
                    members.extend((0..vehicle.components().len()).filter(|&id| id != main_id));
                    (members, HashMap::new())
                }
            };

        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = config.dt;

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let mut impulse_joints = ImpulseJointSet::new();

        let ground = bodies.insert(RigidBodyBuilder::fixed().build());
        let [hx, hy, hz] = BOUNDARY_HALF_EXTENTS;
        let boundary = colliders.insert_with_parent(
            ColliderBuilder::cuboid(hx, hy, hz)
                .translation(vector![0.0, config.boundary_height - hy, 0.0])
                .collision_groups(InteractionGroups::new(
                    BOUNDARY_COLLISION_GROUP,
                    VEHICLE_COLLISION_GROUP,
                ))
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            ground,
            &mut bodies,
        );

        let mut parts = Vec::with_capacity(members.len());
        let mut by_collider = HashMap::new();
        let mut hosts: HashMap<ComponentId, RigidBodyHandle> = HashMap::new();

        for id in members {
            let Some(component) = vehicle.component(id) else {
                continue;
            };
            let anchor = if id == main_id {
                None
            } else {
                let anchor = anchors.get(&id).copied().unwrap_or(main_id);
                match (hosts.get(&anchor), vehicle.component(anchor)) {
                    (Some(&host), Some(anchor_component)) => Some((host, anchor_component)),
                    _ => {
                        warn!(component = id, anchor, "anchor not flying, component left behind");
                        continue;
                    }
                }
            };

            let groups = InteractionGroups::new(
                VEHICLE_COLLISION_GROUP,
                BOUNDARY_COLLISION_GROUP,
            );
            let (body, collider) = if component.mass > 0.0 {
                let mut builder = RigidBodyBuilder::dynamic()
                    .translation(to_vector(component.position))
                    .rotation(to_rotation(component.rotation).scaled_axis())
                    .linear_damping(component.drag)
                    .angular_damping(config.angular_damping);
                if id == main_id {
                    builder = builder.additional_mass(payload_mass);
                }
                let body = bodies.insert(builder.build());
                let collider = colliders.insert_with_parent(
                    component
                        .shape
                        .to_collider()
                        .mass_properties(MassProperties::new(
                            Point3::origin(),
                            component.mass,
                            to_vector(component.shape.principal_inertia(component.mass)),
                        ))
                        .collision_groups(groups)
                        .build(),
                    body,
                    &mut bodies,
                );
                if let Some((host, anchor_component)) = anchor {
                    let joint = FixedJointBuilder::new()
                        .local_frame1(relative_frame(anchor_component, component))
                        .local_frame2(Isometry3::identity())
                        .contacts_enabled(false);
                    impulse_joints.insert(host, body, joint, true);
                }
                hosts.insert(id, body);
                (body, collider)
            } else {
                let Some((host, anchor_component)) = anchor else {
                    warn!(component = id, "massless main structure cannot fly");
                    return None;
                };
                let collider = colliders.insert_with_parent(
                    component
                        .shape
                        .to_collider()
                        .density(0.0)
                        .position(relative_frame(anchor_component, component))
                        .collision_groups(groups)
                        .build(),
                    host,
                    &mut bodies,
                );
                (host, collider)
            };

            by_collider.insert(collider, parts.len());
            parts.push(FlyingPart {
                component: id,
                category: component.category,
                scale: component.scale,
                motor: component.motor,
                shape: component.shape,
                body,
                collider,
            });
        }

        let main = parts.iter().position(|p| p.component == main_id)?;
        let (yaw, _, _) = main_component.rotation.to_euler(EulerRot::YXZ);
        debug!(
            parts = parts.len(),
            bodies = bodies.len(),
            joints = impulse_joints.len(),
            "airframe built"
        );

        Some(Self {
            pipeline: PhysicsPipeline::new(),
            gravity: to_vector(config.gravity),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            impulse_joints,
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            events: ContactLog::default(),
            parts,
            by_collider,
            boundary,
            main,
            max_angular_speed: config.max_angular_speed,
            initial_main_position: main_component.position,
            reference_yaw: yaw.to_degrees(),
        })
    }

    pub fn parts(&self) -> &[FlyingPart] {
        &self.parts
    }

    /// Staged position of the main structure before the first step.
    pub fn initial_main_position(&self) -> Vec3 {
        self.initial_main_position
    }

    /// Staged yaw of the main structure in degrees; the yaw loop holds it.
    pub fn reference_yaw(&self) -> f32 {
        self.reference_yaw
    }

    fn main_body(&self) -> Option<&RigidBody> {
        self.parts
            .get(self.main)
            .and_then(|part| self.bodies.get(part.body))
    }

    pub fn main_position(&self) -> Vec3 {
        self.main_body()
            .map_or(self.initial_main_position, |b| from_vector(b.translation()))
    }

    pub fn main_rotation(&self) -> Quat {
        self.main_body()
            .map_or(Quat::IDENTITY, |b| from_rotation(b.rotation()))
    }

    pub fn main_velocity(&self) -> Vec3 {
        self.main_body()
            .map_or(Vec3::ZERO, |b| from_vector(b.linvel()))
    }

    /// World-frame angular velocity of the main structure in rad/s.
    pub fn main_angular_velocity(&self) -> Vec3 {
        self.main_body()
            .map_or(Vec3::ZERO, |b| from_vector(b.angvel()))
    }

    /// World pose of the part at `slot`.
    pub fn pose(&self, slot: usize) -> Option<PartPose> {
        let part = self.parts.get(slot)?;
        let world = self.colliders.get(part.collider)?.position();
        let rotation = from_rotation(&world.rotation);
        Some(PartPose {
            component: part.component,
            category: part.category,
            position: from_vector(&world.translation.vector),
            rotation,
            half_size: part.shape.bounds_size(rotation) / 2.0,
        })
    }

    pub fn poses(&self) -> Vec<PartPose> {
        (0..self.parts.len()).filter_map(|slot| self.pose(slot)).collect()
    }

    /// Casts a ray from `origin` along `direction`, ignoring the part at `slot`,
    /// and classifies the first collider it hits.
    pub fn look_ahead(&self, slot: usize, origin: Vec3, direction: Vec3) -> Lookahead {
        let Some(part) = self.parts.get(slot) else {
            return Lookahead::Clear;
        };
        let query = self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            QueryFilter::default().exclude_collider(part.collider),
        );
        let ray = Ray::new(
            point![origin.x, origin.y, origin.z],
            to_vector(direction),
        );
        match query.cast_ray(&ray, f32::MAX, true) {
            None => Lookahead::Clear,
            Some((hit, _)) => self
                .by_collider
                .get(&hit)
                .and_then(|&other| self.parts.get(other))
                .map_or(Lookahead::Unclassified, |other| {
                    Lookahead::Component(other.category)
                }),
        }
    }

    /// Applies a world-space force at a world-space point of the part's body.
    pub fn add_force_at_point(&mut self, slot: usize, force: Vec3, at: Vec3) {
        if let Some(body) = self.part_body_mut(slot) {
            body.add_force_at_point(to_vector(force), point![at.x, at.y, at.z], true);
        }
    }

    pub fn add_torque(&mut self, slot: usize, torque: Vec3) {
        if let Some(body) = self.part_body_mut(slot) {
            body.add_torque(to_vector(torque), true);
        }
    }

    fn part_body_mut(&mut self, slot: usize) -> Option<&mut RigidBody> {
        let handle = self.parts.get(slot)?.body;
        self.bodies.get_mut(handle)
    }

    /// Advances the world by one timestep and returns the contacts that began.
    ///
    /// Forces applied before the call act for exactly this step.
    pub fn step(&mut self) -> Vec<Contact> {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &self.events,
        );

        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
            let spin = *body.angvel();
            let speed = spin.norm();
            if speed > self.max_angular_speed {
                body.set_angvel(spin * (self.max_angular_speed / speed), true);
            }
        }

        self.events
            .drain()
            .into_iter()
            .filter_map(|(a, b)| self.contact(a, b))
            .collect()
    }

    fn contact(&self, a: ColliderHandle, b: ColliderHandle) -> Option<Contact> {
        let (slot, other) = match (self.by_collider.get(&a), self.by_collider.get(&b)) {
            (Some(&slot), _) => (slot, b),
            (None, Some(&slot)) => (slot, a),
            (None, None) => return None,
        };
        let part = self.parts.get(slot)?;
        let touched = if other == self.boundary {
            Touched::Boundary
        } else {
            let &other = self.by_collider.get(&other)?;
            Touched::Component(self.parts.get(other)?.component)
        };
        Some(Contact {
            component: part.component,
            category: part.category,
            touched,
        })
    }
}

/// Pose of `child` expressed in the frame of `parent`.
fn relative_frame(parent: &PhysicalComponent, child: &PhysicalComponent) -> Isometry3<f32> {
    isometry(parent.position, parent.rotation).inverse() * isometry(child.position, child.rotation)
}

fn isometry(position: Vec3, rotation: Quat) -> Isometry3<f32> {
    Isometry3::from_parts(Translation3::from(to_vector(position)), to_rotation(rotation))
}

fn to_vector(v: Vec3) -> Vector3<f32> {
    vector![v.x, v.y, v.z]
}

fn from_vector(v: &Vector3<f32>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn to_rotation(q: Quat) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

fn from_rotation(q: &UnitQuaternion<f32>) -> Quat {
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_motors_and_connectors_block_lift() {
        assert!(Lookahead::Component(ComponentCategory::MotorCw).blocks_lift());
        assert!(Lookahead::Component(ComponentCategory::Connector).blocks_lift());
        assert!(!Lookahead::Component(ComponentCategory::Structure).blocks_lift());
        assert!(!Lookahead::Component(ComponentCategory::Foil).blocks_lift());
        assert!(!Lookahead::Unclassified.blocks_lift());
        assert!(!Lookahead::Clear.blocks_lift());
    }

    #[test]
    fn boundary_contact_ignores_other_touches() {
        let mut detector = BoundaryContact;
        let touch = |touched| Contact {
            component: 1,
            category: ComponentCategory::MotorCw,
            touched,
        };
        assert!(!detector.in_contact(&[]));
        assert!(!detector.in_contact(&[touch(Touched::Component(0))]));
        assert!(detector.in_contact(&[touch(Touched::Component(0)), touch(Touched::Boundary)]));
    }

    #[test]
    fn rotations_survive_the_round_trip() {
        let q = Quat::from_euler(EulerRot::YXZ, 0.7, -0.3, 0.2);
        let back = from_rotation(&to_rotation(q));
        assert!(q.angle_between(back) < 1e-5);

        let frame = isometry(Vec3::new(1.0, 2.0, 3.0), q);
        let p = frame * Point3::new(1.0, 0.0, 0.0);
        let expected = Vec3::new(1.0, 2.0, 3.0) + q * Vec3::X;
        assert!((Vec3::new(p.x, p.y, p.z) - expected).length() < 1e-5);
    }
}

//! Vehicle model: places a scaled physical copy of an assembled layout.
//!
//! Placement happens in designer space first (grid spacing, size steps,
//! per-category orientation), then every part is copied into the staging
//! area: scaled by `staging_scale` and moved by `staging_offset` so the design
//! floats above the boundary plane.

use crate::assembly::AssemblyLayout;
use crate::blueprint::{
    ComponentCategory, ComponentId, MotorData, PhysicalComponent, Quadrant, ShapePrimitive,
};
use crate::config::VehicleConfig;
use crate::error::{CutoffStage, DesignError, RuntimeSafetyCutoff};
use crate::layout::cell_position;
use crate::placement::{PlacementRequest, PlacementSink};
use bevy_heavy::ComputeMassProperties3d as _;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Per-category weight totals, accumulated during placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleTotals {
    pub structure_weight: f32,
    pub motor_weight: f32,
    pub connection_weight: f32,
    pub foil_weight: f32,
    pub motor_count: usize,
}

impl VehicleTotals {
    /// Battery energy grows with the square of structure weight, relative to
    /// the reference design.
    pub fn battery_energy(&self, config: &VehicleConfig) -> f32 {
        (self.structure_weight / config.reference_structure_weight).powi(2)
            * config.reference_battery_energy
    }

    pub fn cost(&self, config: &VehicleConfig) -> f32 {
        (self.structure_weight + self.motor_weight + self.connection_weight)
            * config.structural_cost_per_weight
            + self.foil_weight * config.foil_cost_per_weight
            + (config.controller_base_cost
                + config.controller_cost_per_motor * self.motor_count as f32)
    }
}

/// A fixed joint between a newly connected component and its anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub component: ComponentId,
    pub anchor: ComponentId,
}

/// Spanning connection structure rooted at the main structure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Connectivity {
    pub root: ComponentId,
    pub attachments: Vec<Attachment>,
    /// Components the greedy pass never reached; they do not fly with the body.
    pub unconnected: Vec<ComponentId>,
    pub cutoff: Option<RuntimeSafetyCutoff>,
}

impl Connectivity {
    /// The root followed by every attached component, in attachment order.
    pub fn members(&self) -> impl Iterator<Item = ComponentId> + '_ {
        std::iter::once(self.root).chain(self.attachments.iter().map(|a| a.component))
    }

    pub fn is_connected(&self, id: ComponentId) -> bool {
        self.members().any(|m| m == id)
    }
}

/// Placed, classified and weighed vehicle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleModel {
    components: Vec<PhysicalComponent>,
    main_structure: Option<ComponentId>,
    totals: VehicleTotals,
    staging_origin: Vec3,
}

/// A part in designer space, before staging.
struct DesignerPart {
    category: ComponentCategory,
    position: Vec3,
    rotation: Quat,
    shape: ShapePrimitive,
    factor: f32,
}

impl VehicleModel {
    /// Places every component of `layout`, reporting each one to `sink`.
    ///
    /// Never fails: a layout without structure yields a model whose
    /// [`main_structure`](Self::main_structure) is `None`.
    pub fn place(
        layout: &AssemblyLayout,
        config: &VehicleConfig,
        sink: &mut dyn PlacementSink,
    ) -> Self {
        let parts = designer_parts(layout, config);

        let (min, max) = parts.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(min, max), part| {
                let half = part.shape.bounds_size(part.rotation) / 2.0;
                (min.min(part.position - half), max.max(part.position + half))
            },
        );
        let center = if parts.is_empty() {
            Vec3::ZERO
        } else {
            (min + max) / 2.0
        };

        let mut model = Self {
            staging_origin: config.staging_offset + center * config.staging_scale,
            ..Self::default()
        };
        let mut main_distance = f32::INFINITY;

        for part in parts {
            let mass_for = |volume_per_mass: f32| {
                part.shape.to_bevy_primitive().mass(1.0 / volume_per_mass)
            };
            let staged_position = part.position * config.staging_scale + config.staging_offset;
            let scale = part.factor * config.staging_scale;

            let (mass, drag, motor) = match part.category {
                ComponentCategory::Structure => {
                    let mass = mass_for(config.structure_volume_per_mass);
                    model.totals.structure_weight += mass;
                    (mass, mass / config.structure_mass_per_drag, None)
                }
                ComponentCategory::MotorCw | ComponentCategory::MotorCcw => {
                    let mass = mass_for(config.motor_volume_per_mass);
                    model.totals.motor_weight += mass;
                    model.totals.motor_count += 1;
                    let size = part.shape.bounds_size(part.rotation);
                    let motor = MotorData {
                        quadrant: Quadrant::classify(
                            part.position - center,
                            config.heading_degrees,
                            config.quadrant_tolerance,
                        ),
                        max_thrust: config.motor_base_thrust
                            + size.x * config.motor_prop_stretch * size.y * size.z
                                / config.motor_prop_volume,
                    };
                    (mass, mass / config.motor_mass_per_drag, Some(motor))
                }
                ComponentCategory::Foil => {
                    let mass = mass_for(config.foil_volume_per_mass);
                    model.totals.foil_weight += mass;
                    (mass, mass / config.foil_mass_per_drag, None)
                }
                ComponentCategory::Connector => (0.0, 0.0, None),
            };

            let id = model.components.len();
            if part.category == ComponentCategory::Structure {
                let distance = staged_position.distance(model.staging_origin);
                if distance < main_distance {
                    main_distance = distance;
                    model.main_structure = Some(id);
                }
            }

            let handle = sink.place(&PlacementRequest {
                category: part.category,
                position: staged_position,
                orientation: part.rotation,
                scale,
            });

            model.components.push(PhysicalComponent {
                category: part.category,
                position: staged_position,
                rotation: part.rotation,
                shape: part.shape.scaled(config.staging_scale),
                scale,
                mass,
                drag,
                motor,
                handle: Some(handle),
            });
        }

        debug!(
            components = model.components.len(),
            main = ?model.main_structure,
            "vehicle placed"
        );
        model
    }

    pub fn components(&self) -> &[PhysicalComponent] {
        &self.components
    }

    pub fn component(&self, id: ComponentId) -> Option<&PhysicalComponent> {
        self.components.get(id)
    }

    pub fn main_structure(&self) -> Option<ComponentId> {
        self.main_structure
    }

    /// The main structure, or [`DesignError::NoStructure`].
    pub fn require_main_structure(&self) -> Result<ComponentId, DesignError> {
        self.main_structure.ok_or(DesignError::NoStructure)
    }

    pub fn totals(&self) -> &VehicleTotals {
        &self.totals
    }

    /// Point the main structure is chosen against.
    pub fn staging_origin(&self) -> Vec3 {
        self.staging_origin
    }

    /// Motors assigned to `quadrant`, in placement order.
    pub fn motors(&self, quadrant: Quadrant) -> impl Iterator<Item = ComponentId> + '_ {
        self.components
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.motor.is_some_and(|m| m.quadrant == Some(quadrant)))
            .map(|(id, _)| id)
    }

    /// Builds the spanning connection structure.
    ///
    /// Repeatedly joins the closest (unconnected, connected) pair whose
    /// connected side has mass, for at most `max_connection_passes` passes.
    /// Anything still loose afterwards is listed in
    /// [`Connectivity::unconnected`] together with a cutoff signal.
    pub fn connect(&self, config: &VehicleConfig) -> Result<Connectivity, DesignError> {
        let root = self.require_main_structure()?;
        let mut connectivity = Connectivity {
            root,
            ..Connectivity::default()
        };

        let mut pending: Vec<ComponentId> = [
            ComponentCategory::Structure,
            ComponentCategory::MotorCcw,
            ComponentCategory::MotorCw,
            ComponentCategory::Connector,
            ComponentCategory::Foil,
        ]
        .into_iter()
        .flat_map(|category| {
            self.components
                .iter()
                .enumerate()
                .filter(move |(id, c)| c.category == category && *id != root)
                .map(|(id, _)| id)
        })
        .collect();
        let mut connected = vec![root];

        let mut passes = 0;
        while !pending.is_empty() && passes < config.max_connection_passes {
            let mut best: Option<(usize, ComponentId, f32)> = None;
            for (slot, &candidate) in pending.iter().enumerate() {
                for &anchor in &connected {
                    if self.components[anchor].mass <= 0.0 {
                        continue;
                    }
                    let distance = self.components[candidate]
                        .position
                        .distance(self.components[anchor].position);
                    if best.is_none_or(|(_, _, d)| distance < d) {
                        best = Some((slot, anchor, distance));
                    }
                }
            }

            let Some((slot, anchor, _)) = best else {
                break;
            };
            let component = pending.remove(slot);
            connected.push(component);
            connectivity.attachments.push(Attachment { component, anchor });
            passes += 1;
        }

        if !pending.is_empty() {
            warn!(
                loose = pending.len(),
                limit = config.max_connection_passes,
                "components left unconnected"
            );
            connectivity.cutoff = Some(RuntimeSafetyCutoff {
                stage: CutoffStage::Connectivity,
                limit: config.max_connection_passes,
            });
        }
        connectivity.unconnected = pending;
        Ok(connectivity)
    }

    /// Asks the collaborator to remove every placed component.
    pub fn release(&mut self, sink: &mut dyn PlacementSink) {
        for component in &mut self.components {
            if let Some(handle) = component.handle.take() {
                sink.remove(handle);
            }
        }
    }
}

/// Linear scale after `size` resize steps; shrinking stops at the floor.
pub fn size_factor(size: i32, config: &VehicleConfig) -> f32 {
    let mut factor = 1.0;
    if size > 0 {
        factor += config.size_step * size as f32;
    } else {
        for _ in 0..size.unsigned_abs() {
            if factor > config.shrink_floor {
                factor -= config.size_step;
            }
        }
    }
    factor
}

fn designer_parts(layout: &AssemblyLayout, config: &VehicleConfig) -> Vec<DesignerPart> {
    let mut parts = Vec::new();
    let heading = Quat::from_rotation_y(config.heading_degrees.to_radians());

    for joint in &layout.joints {
        let Some((kind, size)) = joint.component else {
            continue;
        };
        let Some(category) = ComponentCategory::from_component_type(kind) else {
            continue;
        };
        let (base, rotation) = match category {
            ComponentCategory::Structure => (config.structure_shape, heading),
            ComponentCategory::MotorCw | ComponentCategory::MotorCcw => {
                (config.motor_shape, Quat::IDENTITY)
            }
            ComponentCategory::Foil => (
                config.foil_shape,
                heading * Quat::from_rotation_x(config.foil_tilt_degrees.to_radians()),
            ),
            ComponentCategory::Connector => continue,
        };
        let factor = size_factor(size, config);
        parts.push(DesignerPart {
            category,
            position: joint.position(config.grid_spacing),
            rotation,
            shape: base.scaled(factor),
            factor,
        });
    }

    for step in &layout.steps {
        let start = cell_position(step.start, config.grid_spacing);
        let end = cell_position(step.end, config.grid_spacing);
        parts.push(DesignerPart {
            category: ComponentCategory::Connector,
            position: (start + end) / 2.0,
            rotation: Quat::from_rotation_y(step.direction.yaw_degrees().to_radians()),
            shape: config.connector_shape,
            factor: 1.0,
        });
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrinking_stops_at_floor() {
        let config = VehicleConfig::default();
        assert_eq!(size_factor(0, &config), 1.0);
        assert_eq!(size_factor(4, &config), 2.0);
        assert_eq!(size_factor(-1, &config), 0.75);
        assert_eq!(size_factor(-5, &config), 0.75);
    }
}

//! Assembly sequencer: turns a decoded [`Design`] into a buildable joint layout.
//!
//! The entry point is [`Assembler::build`]. It first orders the edges with
//! [`sequence_edges`], then replays them on a grid starting from a locked root
//! joint, the same way the design was drawn:
//!
//! 1. The source joint is the latest joint currently carrying the edge's source index.
//! 2. The build direction is the unit step between the two nodes' declared cells.
//! 3. A new joint is created at the far cell unless one already sits there
//!    (a cycle edge, `introduces_new_node = false`).
//! 4. A connector is laid between the two cells unless that segment is taken.
//! 5. Whatever unlocked joint sits at the destination's declared cell takes the
//!    destination's index and is locked.
//!
//! Edges that cannot be built are reported in [`AssemblyLayout::skipped`]
//! rather than aborting the whole design.

use crate::config::AssemblyConfig;
use crate::error::{CutoffStage, DesignError, RuntimeSafetyCutoff};
use crate::grammar::{ComponentType, Design, Edge, NodeIndex};
use crate::layout::{GridDirection, Joint, NodeCounter, ROOT_CELL};
use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Orders edges so that every destination index is built once, in ascending
/// order, before any cycle edge.
///
/// The first edge seen for a destination index is that index's primary edge.
/// Later edges to the same destination are cycle edges: they are queued in
/// encounter order and appended after the largest destination index, one
/// step each.
pub fn sequence_edges(edges: &[Edge]) -> Vec<Edge> {
    let mut by_destination: BTreeMap<usize, Edge> = BTreeMap::new();
    let mut overflow = Vec::new();
    let mut max_step = 0;

    for edge in edges {
        if by_destination.contains_key(&edge.to) {
            overflow.push(*edge);
        } else {
            by_destination.insert(edge.to, *edge);
        }
        max_step = max_step.max(edge.to);
    }

    for edge in overflow {
        max_step += 1;
        by_destination.insert(max_step, edge);
    }

    by_destination.into_values().collect()
}

/// Why a sequenced edge produced no connector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The declared cells of the two nodes are not grid neighbours.
    NotUnitStep,
    /// No joint carries the source index yet.
    SourceMissing,
    /// The source joint already used its handle in this direction.
    HandleUsed,
    /// A connector already occupies this segment.
    SegmentOccupied,
}

/// A sequenced edge that was not built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedEdge {
    pub edge: Edge,
    pub reason: SkipReason,
}

/// A connector laid between two neighbouring cells.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssemblyStep {
    /// The edge with `introduces_new_node` resolved.
    pub edge: Edge,
    pub direction: GridDirection,
    pub start: IVec2,
    pub end: IVec2,
}

/// Result of replaying a design on the grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyLayout {
    /// Joints in construction order; the first one is the root.
    pub joints: Vec<Joint>,
    /// Connectors in build order.
    pub steps: Vec<AssemblyStep>,
    pub skipped: Vec<SkippedEdge>,
    pub cutoffs: Vec<RuntimeSafetyCutoff>,
}

impl AssemblyLayout {
    /// The joint currently named `index`; the most recently built one wins.
    pub fn joint_for(&self, index: NodeIndex) -> Option<&Joint> {
        self.joints.iter().rev().find(|j| j.index == index)
    }

    /// Edges in the order they were built.
    pub fn build_order(&self) -> impl Iterator<Item = &Edge> {
        self.steps.iter().map(|s| &s.edge)
    }

    fn joint_for_mut(&mut self, index: NodeIndex) -> Option<&mut Joint> {
        self.joints.iter_mut().rev().find(|j| j.index == index)
    }

    fn occupied(&self, cell: IVec2) -> bool {
        self.joints.iter().any(|j| j.cell == cell)
    }
}

/// Replays designs on the grid.
#[derive(Clone, Debug, Default)]
pub struct Assembler {
    config: AssemblyConfig,
}

impl Assembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self { config }
    }

    /// Builds the joint layout for `design`.
    ///
    /// `counter` must be fresh for this evaluation; the root joint takes the
    /// first index. Fails with [`DesignError::CapacityExceeded`] once the
    /// counter runs past the node-id alphabet.
    pub fn build(
        &self,
        design: &Design,
        counter: &mut NodeCounter,
    ) -> Result<AssemblyLayout, DesignError> {
        let mut layout = AssemblyLayout::default();
        let mut root = Joint::new(counter.allocate()?, ROOT_CELL);
        root.locked = true;
        layout.joints.push(root);

        // Segment midpoints in doubled cell units, so they stay integral.
        let mut segments: HashSet<IVec2> = HashSet::new();

        let mut order = sequence_edges(&design.edges);
        if order.len() > self.config.max_steps {
            warn!(
                edges = order.len(),
                limit = self.config.max_steps,
                "assembly truncated by step bound"
            );
            order.truncate(self.config.max_steps);
            layout.cutoffs.push(RuntimeSafetyCutoff {
                stage: CutoffStage::Sequencing,
                limit: self.config.max_steps,
            });
        }

        for edge in order {
            // Decode guarantees both ends are declared.
            let (Some(source), Some(target)) = (design.node(edge.from), design.node(edge.to))
            else {
                continue;
            };
            let declared_end = IVec2::new(target.grid_x, target.grid_z);
            let declared_start = IVec2::new(source.grid_x, source.grid_z);

            let delta = declared_end - declared_start;
            match self.lay_connector(&mut layout, &mut segments, counter, edge, delta)? {
                Ok(step) => layout.steps.push(step),
                Err(reason) => {
                    debug!(from = edge.from, to = edge.to, ?reason, "assembly step skipped");
                    layout.skipped.push(SkippedEdge { edge, reason });
                }
            }

            // Reconcile identities even when the connector was skipped.
            for joint in layout.joints.iter_mut() {
                if joint.cell == declared_end && !joint.locked {
                    if joint.index != edge.to {
                        joint.index = edge.to;
                        counter.advance_past(edge.to);
                    }
                    joint.locked = true;
                }
            }
        }

        self.attach_components(design, &mut layout);
        Ok(layout)
    }

    /// Lays one connector. The outer `Result` carries hard failures, the inner
    /// one the reason a step was skipped.
    fn lay_connector(
        &self,
        layout: &mut AssemblyLayout,
        segments: &mut HashSet<IVec2>,
        counter: &mut NodeCounter,
        mut edge: Edge,
        delta: IVec2,
    ) -> Result<Result<AssemblyStep, SkipReason>, DesignError> {
        let Some(direction) = GridDirection::from_delta(delta) else {
            return Ok(Err(SkipReason::NotUnitStep));
        };
        let Some(source) = layout.joint_for(edge.from) else {
            return Ok(Err(SkipReason::SourceMissing));
        };
        if source.handle_used(direction) {
            return Ok(Err(SkipReason::HandleUsed));
        }

        let start = source.cell;
        let end = start + direction.step();

        edge.introduces_new_node = !layout.occupied(end);
        if edge.introduces_new_node {
            layout.joints.push(Joint::new(counter.allocate()?, end));
        }

        if !segments.insert(start + end) {
            return Ok(Err(SkipReason::SegmentOccupied));
        }
        if let Some(source) = layout.joint_for_mut(edge.from) {
            source.use_handle(direction);
        }

        Ok(Ok(AssemblyStep {
            edge,
            direction,
            start,
            end,
        }))
    }

    fn attach_components(&self, design: &Design, layout: &mut AssemblyLayout) {
        let limit = self.config.max_size_steps;
        for node in &design.nodes {
            let mut size = node.size;
            if size.unsigned_abs() as usize > limit {
                warn!(node = node.index, size, limit, "component size truncated by step bound");
                size = size.signum() * limit as i32;
                layout.cutoffs.push(RuntimeSafetyCutoff {
                    stage: CutoffStage::Sizing,
                    limit,
                });
            }

            match layout.joint_for_mut(node.index) {
                Some(joint) => {
                    joint.component = match node.component {
                        ComponentType::None => None,
                        kind => Some((kind, size)),
                    };
                }
                None => warn!(node = node.index, "node was never built; component dropped"),
            }
        }
    }
}

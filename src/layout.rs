//! Joint arena used while a design is being assembled on the grid.

use crate::error::DesignError;
use crate::grammar::{ComponentType, NODE_ID_ALPHABET, NodeIndex};
use glam::{IVec2, Vec3};
use serde::{Deserialize, Serialize};

/// Position of the joint every assembly starts from.
pub const ROOT_CELL: IVec2 = IVec2::ZERO;

/// One of the four connection handles around a joint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridDirection {
    PosX,
    NegX,
    PosZ,
    NegZ,
}

impl GridDirection {
    /// Direction for a unit step between two cells, if the step is a unit step.
    pub fn from_delta(delta: IVec2) -> Option<Self> {
        match (delta.x, delta.y) {
            (1, 0) => Some(Self::PosX),
            (-1, 0) => Some(Self::NegX),
            (0, 1) => Some(Self::PosZ),
            (0, -1) => Some(Self::NegZ),
            _ => None,
        }
    }

    /// Cell offset of one step in this direction (`y` holds the grid `z`).
    pub fn step(self) -> IVec2 {
        match self {
            Self::PosX => IVec2::X,
            Self::NegX => IVec2::NEG_X,
            Self::PosZ => IVec2::Y,
            Self::NegZ => IVec2::NEG_Y,
        }
    }

    /// Yaw that turns a connector built along `+z` onto this direction.
    pub fn yaw_degrees(self) -> f32 {
        match self {
            Self::PosZ => 0.0,
            Self::PosX => 90.0,
            Self::NegZ => 180.0,
            Self::NegX => -90.0,
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::PosX => 0,
            Self::NegX => 1,
            Self::PosZ => 2,
            Self::NegZ => 3,
        }
    }
}

/// A grid joint created during assembly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Current node index; may be renamed once before it is locked.
    pub index: NodeIndex,
    pub cell: IVec2,
    pub locked: bool,
    /// Component and size attached once all edges are built.
    pub component: Option<(ComponentType, i32)>,
    handles_used: [bool; 4],
}

impl Joint {
    pub fn new(index: NodeIndex, cell: IVec2) -> Self {
        Self {
            index,
            cell,
            locked: false,
            component: None,
            handles_used: [false; 4],
        }
    }

    pub fn handle_used(&self, direction: GridDirection) -> bool {
        self.handles_used[direction.slot()]
    }

    pub fn use_handle(&mut self, direction: GridDirection) {
        self.handles_used[direction.slot()] = true;
    }

    /// Designer-space position of the joint centre.
    pub fn position(&self, spacing: f32) -> Vec3 {
        cell_position(self.cell, spacing)
    }
}

/// Designer-space position of a grid cell.
pub fn cell_position(cell: IVec2, spacing: f32) -> Vec3 {
    Vec3::new(cell.x as f32 * spacing, 0.0, cell.y as f32 * spacing)
}

/// Monotonic node-id counter, scoped to one evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeCounter {
    next: NodeIndex,
}

impl NodeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next free index.
    pub fn allocate(&mut self) -> Result<NodeIndex, DesignError> {
        if self.next >= NODE_ID_ALPHABET.len() {
            return Err(DesignError::CapacityExceeded {
                limit: NODE_ID_ALPHABET.len(),
            });
        }
        let index = self.next;
        self.next += 1;
        Ok(index)
    }

    /// Makes sure later allocations never reuse `index`.
    pub fn advance_past(&mut self, index: NodeIndex) {
        self.next = self.next.max(index + 1);
    }

    pub fn peek(&self) -> NodeIndex {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_stops_at_alphabet_size() {
        let mut counter = NodeCounter::new();
        counter.advance_past(40);
        assert_eq!(counter.allocate(), Ok(41));
        assert_eq!(counter.allocate(), Err(DesignError::CapacityExceeded { limit: 42 }));
    }

    #[test]
    fn directions_round_trip_through_deltas() {
        for dir in [
            GridDirection::PosX,
            GridDirection::NegX,
            GridDirection::PosZ,
            GridDirection::NegZ,
        ] {
            assert_eq!(GridDirection::from_delta(dir.step()), Some(dir));
        }
        assert_eq!(GridDirection::from_delta(IVec2::new(1, 1)), None);
    }
}

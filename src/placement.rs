//! Contract with the rendering/placement subsystem.
//!
//! The core announces every staged component and keeps the returned handle
//! only so it can ask for the component to be removed later. It never looks
//! inside a handle.

use crate::blueprint::ComponentCategory;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Opaque token issued by a [`PlacementSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementHandle(pub u64);

/// What the core asks the collaborator to place.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementRequest {
    pub category: ComponentCategory,
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: f32,
}

/// Receives placement requests and removals.
pub trait PlacementSink {
    fn place(&mut self, request: &PlacementRequest) -> PlacementHandle;

    fn remove(&mut self, handle: PlacementHandle);
}

/// Sink for headless evaluation: hands out sequential handles and draws nothing.
#[derive(Clone, Debug, Default)]
pub struct HeadlessPlacement {
    next: u64,
    live: usize,
}

impl HeadlessPlacement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of components placed and not yet removed.
    pub fn live(&self) -> usize {
        self.live
    }
}

impl PlacementSink for HeadlessPlacement {
    fn place(&mut self, _request: &PlacementRequest) -> PlacementHandle {
        let handle = PlacementHandle(self.next);
        self.next += 1;
        self.live += 1;
        handle
    }

    fn remove(&mut self, _handle: PlacementHandle) {
        self.live = self.live.saturating_sub(1);
    }
}

use glam::{Quat, Vec3A};

use super::NodeId;

/// Pins `target`'s world position and orientation. Evaluated by the scene
/// every frame and after every tracked pose update; the record itself never changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseConstraint {
    pub target: NodeId,
    pub position: Vec3A,
    pub orientation: Quat,
}

impl PoseConstraint {
    pub fn freeze(target: NodeId, position: Vec3A, orientation: Quat) -> Self {
        Self {
            target,
            position,
            orientation: orientation.normalize(),
        }
    }
}

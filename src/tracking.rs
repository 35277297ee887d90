use std::{fmt, sync::Arc};

use glam::{Affine3A, Vec2};

use crate::scene::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An image registered for detection. `physical_size` is in meters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub name: Option<Arc<str>>,
    pub physical_size: Vec2,
}

impl ReferenceImage {
    pub fn new(name: &str, width: f32, height: f32) -> Self {
        Self {
            name: Some(name.into()),
            physical_size: Vec2::new(width, height),
        }
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnchorKind {
    Image(ReferenceImage),
    Plane { extent: Vec2 },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub id: AnchorId,
    pub transform: Affine3A,
    pub kind: AnchorKind,
}

impl Anchor {
    pub fn reference_image(&self) -> Option<&ReferenceImage> {
        match &self.kind {
            AnchorKind::Image(image) => Some(image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnchorEvent {
    Added(Anchor),
    Updated(Anchor),
    Removed(Anchor),
}

impl AnchorEvent {
    pub fn anchor(&self) -> &Anchor {
        match self {
            Self::Added(a) | Self::Updated(a) | Self::Removed(a) => a,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedReason {
    Initializing,
    ExcessiveMotion,
    InsufficientFeatures,
    Relocalizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    NotAvailable,
    Limited(LimitedReason),
    Normal,
}

impl TrackingState {
    pub fn presentation_string(&self) -> &'static str {
        match self {
            Self::NotAvailable => "TRACKING UNAVAILABLE",
            Self::Normal => "TRACKING NORMAL",
            Self::Limited(LimitedReason::ExcessiveMotion) => "TRACKING LIMITED\nExcessive motion",
            Self::Limited(LimitedReason::InsufficientFeatures) => "TRACKING LIMITED\nLow detail",
            Self::Limited(LimitedReason::Initializing) => "Initializing",
            Self::Limited(LimitedReason::Relocalizing) => "Recovering from interruption",
        }
    }

    pub fn recommendation(&self) -> Option<&'static str> {
        match self {
            Self::Limited(LimitedReason::ExcessiveMotion) => {
                Some("Try slowing down your movement, or reset the session.")
            }
            Self::Limited(LimitedReason::InsufficientFeatures) => {
                Some("Try pointing at a flat surface, or reset the session.")
            }
            Self::Limited(LimitedReason::Relocalizing) => Some(
                "Return to the location where you left off or try resetting the session.",
            ),
            _ => None,
        }
    }
}

/// Receives anchor lifecycle callbacks from the tracking session.
///
/// `node` is the scene node the renderer created for the anchor; on `did_add`
/// it is empty and already placed at the anchor's pose.
pub trait AnchorDelegate {
    fn did_add(&self, anchor: &Anchor, node: NodeId);
    fn did_update(&self, anchor: &Anchor, node: NodeId);
    fn did_remove(&self, anchor: &Anchor, node: NodeId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_anchors_expose_reference() {
        let image = Anchor {
            id: AnchorId(1),
            transform: Affine3A::IDENTITY,
            kind: AnchorKind::Image(ReferenceImage::new("1", 0.1, 0.05)),
        };
        let plane = Anchor {
            id: AnchorId(2),
            transform: Affine3A::IDENTITY,
            kind: AnchorKind::Plane {
                extent: Vec2::ONE,
            },
        };

        assert_eq!(image.reference_image().map(|r| r.name_or_empty()), Some("1"));
        assert!(plane.reference_image().is_none());
        assert_eq!(AnchorEvent::Removed(plane.clone()).anchor(), &plane);
    }

    #[test]
    fn limited_tracking_has_recommendation() {
        let state = TrackingState::Limited(LimitedReason::ExcessiveMotion);
        assert!(state.presentation_string().starts_with("TRACKING LIMITED"));
        assert!(state.recommendation().is_some());
        assert!(TrackingState::Normal.recommendation().is_none());
    }
}

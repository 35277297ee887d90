use std::{f32::consts::FRAC_PI_2, sync::Arc};

use glam::{Affine3A, Quat, Vec3};

use crate::{
    backend::{scene_queue::SceneQueueHandle, task::UiDispatcher},
    scene::{action::Action, constraint::PoseConstraint, Material, Node, NodeId, Plane, SceneGraph},
    tracking::{Anchor, AnchorDelegate, ReferenceImage},
};

use super::template::{is_arrow_image, OverlayTemplate};

/// Forward bob every 1.1s. Runs until the node is destroyed.
pub fn highlight_action() -> Action {
    Action::sequence([
        Action::wait(0.1),
        Action::move_by(0.0, 0.0, -0.15, 1.0),
        Action::move_by(0.0, 0.0, 0.15, 0.0),
    ])
    .repeat_forever()
}

/// Texts shown when an image is detected.
#[derive(Debug, Clone)]
pub struct DetectionMessages {
    pub detected: Arc<str>,
    pub fallback: Arc<str>,
}

/// Places an overlay on every newly detected image anchor and freezes the anchor
/// at the pose it was first seen at.
pub struct ImageAnchorBinder {
    scene: SceneQueueHandle,
    ui: UiDispatcher,
    messages: DetectionMessages,
}

impl ImageAnchorBinder {
    pub fn new(scene: SceneQueueHandle, ui: UiDispatcher, messages: DetectionMessages) -> Self {
        Self {
            scene,
            ui,
            messages,
        }
    }
}

/// Builds the overlay under `anchor_node` and pins the anchor node in place.
/// Returns the overlay node, or `None` if the anchor node is already gone.
pub fn place_overlay(
    scene: &mut SceneGraph,
    anchor_node: NodeId,
    image: &ReferenceImage,
) -> Option<NodeId> {
    let Some(anchor_world) = scene.world_transform(anchor_node) else {
        log::warn!("Anchor node {anchor_node:?} vanished before its overlay was placed");
        return None;
    };

    let template = OverlayTemplate::lookup(image);

    let overlay = scene.create_node(Node {
        transform: Affine3A::from_rotation_translation(
            // planes are vertical in node space, image anchors are horizontal
            Quat::from_rotation_x(-FRAC_PI_2),
            Vec3::new(0., 0., template.z_offset),
        ),
        geometry: Some(Plane {
            width: template.width,
            height: template.height,
        }),
        material: Some(Material::textured(template.texture)),
        opacity: 1.0,
        ..Default::default()
    });

    if template.animated {
        scene.run_action(overlay, highlight_action());
    }

    if let Err(e) = scene.add_child(anchor_node, overlay) {
        log::warn!("Could not attach overlay: {e:?}");
        scene.remove_from_parent(overlay);
        return None;
    }

    let (_, orientation, position) = anchor_world.to_scale_rotation_translation();
    scene.add_constraint(
        anchor_node,
        PoseConstraint::freeze(anchor_node, position.into(), orientation),
    );

    log::debug!(
        "Placed {} overlay {:?} ({}x{}) on {:?}",
        template.texture,
        overlay,
        template.width,
        template.height,
        anchor_node
    );

    Some(overlay)
}

impl AnchorDelegate for ImageAnchorBinder {
    fn did_add(&self, anchor: &Anchor, node: NodeId) {
        let Some(image) = anchor.reference_image() else {
            return;
        };

        {
            let image = image.clone();
            self.scene.dispatch(move |scene| {
                place_overlay(scene, node, &image);
            });
        }

        log::info!("Detected image {:?} on anchor {}", image.name_or_empty(), anchor.id);
        let text = if is_arrow_image(image) {
            self.messages.detected.clone()
        } else {
            self.messages.fallback.clone()
        };
        self.ui.dispatch_status(move |status| {
            status.cancel_all_scheduled_messages();
            status.show_message(&text, true);
        });
    }

    fn did_update(&self, anchor: &Anchor, node: NodeId) {
        let (scale, _, _) = anchor.transform.to_scale_rotation_translation();
        log::debug!("Anchor {} updated on {:?}, scale {}", anchor.id, node, scale);
    }

    fn did_remove(&self, anchor: &Anchor, node: NodeId) {
        match anchor.reference_image() {
            Some(image) => log::debug!(
                "Image {:?} lost with anchor {} ({:?})",
                image.name_or_empty(),
                anchor.id,
                node
            ),
            None => log::debug!("Anchor {} removed with {:?}", anchor.id, node),
        }
    }
}

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use serde::Deserialize;

use crate::{
    scene::{Node, NodeId, SceneGraph},
    tracking::{Anchor, AnchorDelegate, AnchorEvent, AnchorId, AnchorKind, ReferenceImage},
};

use super::BackendError;

#[derive(Deserialize)]
struct CatalogEntry {
    name: Option<String>,
    width: f32,
    height: f32,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Deserialize)]
struct Catalog {
    images: Vec<CatalogEntry>,
}

/// Loads the reference image group `<root>/<group>.yaml`.
///
/// Any problem with the bundled resources is unrecoverable: without its
/// reference images the session has nothing to detect.
pub fn load_reference_images(root: &Path, group: &str) -> Result<Vec<ReferenceImage>, BackendError> {
    let missing = |reason: String| BackendError::MissingResources {
        group: group.to_string(),
        reason,
    };

    let manifest = root.join(format!("{group}.yaml"));
    let data = std::fs::read_to_string(&manifest)
        .map_err(|e| missing(format!("{}: {e}", manifest.to_string_lossy())))?;
    let catalog: Catalog =
        serde_yaml::from_str(&data).map_err(|e| missing(format!("malformed manifest: {e}")))?;

    if catalog.images.is_empty() {
        return Err(missing("group has no images".into()));
    }

    catalog
        .images
        .into_iter()
        .map(|entry| {
            if let Some(file) = &entry.image {
                let path = root.join(file);
                if !path.is_file() {
                    return Err(missing(format!("{} not found", path.to_string_lossy())));
                }
            }
            if !(entry.width > 0. && entry.height > 0.) {
                return Err(missing(format!(
                    "image {:?} needs a positive physical size",
                    entry.name
                )));
            }
            Ok(ReferenceImage {
                name: entry.name.map(Arc::from),
                physical_size: glam::Vec2::new(entry.width, entry.height),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneDetection {
    None,
    Horizontal,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub detection_images: Vec<ReferenceImage>,
    pub plane_detection: PlaneDetection,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub reset_tracking: bool,
    pub remove_existing_anchors: bool,
}

/// World tracking session. Owns the anchor table and plays the renderer's
/// part for anchor nodes: it creates them, moves them on tracking updates and
/// removes them with their anchor.
pub struct TrackingSession {
    scene: Arc<Mutex<SceneGraph>>,
    anchors: HashMap<AnchorId, (NodeId, AnchorKind)>,
    config: Option<SessionConfig>,
    running: bool,
}

impl TrackingSession {
    pub fn new(scene: Arc<Mutex<SceneGraph>>) -> Self {
        Self {
            scene,
            anchors: HashMap::new(),
            config: None,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn anchor_node(&self, id: AnchorId) -> Option<NodeId> {
        self.anchors.get(&id).map(|(node, _)| *node)
    }

    /// Registered reference image with this name, if any.
    pub fn reference_image(&self, name: &str) -> Option<&ReferenceImage> {
        self.config
            .as_ref()?
            .detection_images
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
    }

    pub fn run(&mut self, config: SessionConfig, options: RunOptions, delegate: &dyn AnchorDelegate) {
        if options.remove_existing_anchors {
            let mut ids: Vec<AnchorId> = self.anchors.keys().copied().collect();
            ids.sort_unstable();
            for id in ids {
                self.remove_anchor(id, delegate);
            }
        }
        if options.reset_tracking {
            log::debug!("Tracking reset");
        }

        log::info!(
            "Session running with {} reference images, plane detection {:?}",
            config.detection_images.len(),
            config.plane_detection
        );
        self.config = Some(config);
        self.running = true;
    }

    pub fn pause(&mut self) {
        if self.running {
            log::info!("Session paused");
        }
        self.running = false;
    }

    /// Entry point for the tracker's anchor callbacks.
    pub fn handle_event(&mut self, event: AnchorEvent, delegate: &dyn AnchorDelegate) {
        let id = event.anchor().id;
        let handled = match event {
            AnchorEvent::Added(anchor) => self.add_anchor(anchor, delegate).is_some(),
            AnchorEvent::Updated(anchor) => self.update_anchor(anchor, delegate),
            AnchorEvent::Removed(anchor) => self.remove_anchor(anchor.id, delegate),
        };
        if !handled {
            log::debug!("Anchor event for {id} ignored");
        }
    }

    pub fn add_anchor(&mut self, anchor: Anchor, delegate: &dyn AnchorDelegate) -> Option<NodeId> {
        if !self.running {
            return None;
        }
        if self.anchors.contains_key(&anchor.id) {
            log::debug!("Anchor {} already tracked", anchor.id);
            return None;
        }
        match &anchor.kind {
            AnchorKind::Image(image) if !self.is_registered(image) => {
                log::warn!("Ignoring unregistered image {:?}", image.name_or_empty());
                return None;
            }
            AnchorKind::Plane { .. }
                if self.config.as_ref().map(|c| c.plane_detection) != Some(PlaneDetection::Horizontal) =>
            {
                return None;
            }
            _ => {}
        }

        let node = {
            let mut scene = self.scene.lock().unwrap_or_else(PoisonError::into_inner);
            let root = scene.root();
            let node = scene.create_node(Node {
                transform: anchor.transform,
                ..Default::default()
            });
            if let Err(e) = scene.add_child(root, node) {
                log::error!("Failed to insert anchor node: {e:?}");
                return None;
            }
            node
        };
        self.anchors.insert(anchor.id, (node, anchor.kind.clone()));
        delegate.did_add(&anchor, node);
        Some(node)
    }

    pub fn update_anchor(&mut self, anchor: Anchor, delegate: &dyn AnchorDelegate) -> bool {
        if !self.running {
            return false;
        }
        let Some(node) = self.anchor_node(anchor.id) else {
            return false;
        };
        {
            let mut scene = self.scene.lock().unwrap_or_else(PoisonError::into_inner);
            scene.apply_tracked_pose(node, anchor.transform);
        }
        delegate.did_update(&anchor, node);
        true
    }

    pub fn remove_anchor(&mut self, id: AnchorId, delegate: &dyn AnchorDelegate) -> bool {
        let Some((node, kind)) = self.anchors.remove(&id) else {
            return false;
        };
        let transform = {
            let mut scene = self.scene.lock().unwrap_or_else(PoisonError::into_inner);
            let transform = scene.world_transform(node);
            scene.remove_from_parent(node);
            transform
        };
        let anchor = Anchor {
            id,
            transform: transform.unwrap_or_default(),
            kind,
        };
        delegate.did_remove(&anchor, node);
        true
    }

    fn is_registered(&self, image: &ReferenceImage) -> bool {
        self.config
            .as_ref()
            .is_some_and(|c| c.detection_images.iter().any(|r| r.name == image.name))
    }
}

pub mod action;
pub mod constraint;

use std::{collections::HashMap, sync::Arc};

use glam::{Affine3A, Quat, Vec2, Vec3, Vec3A, Vec3Swizzles};
use smallvec::SmallVec;

use action::{Action, RunningAction};
use constraint::PoseConstraint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A flat rectangle in the node's XY plane, centered on the origin, facing +Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub texture: Arc<str>,
    pub double_sided: bool,
    pub transparent: bool,
}

impl Material {
    pub fn textured(texture: &str) -> Self {
        Self {
            texture: texture.into(),
            double_sided: false,
            transparent: false,
        }
    }
}

pub struct Node {
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 4]>,
    pub transform: Affine3A,
    pub geometry: Option<Plane>,
    pub material: Option<Material>,
    pub opacity: f32,
    pub constraints: SmallVec<[PoseConstraint; 2]>,
    pub actions: Vec<RunningAction>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            parent: None,
            children: SmallVec::new(),
            transform: Affine3A::IDENTITY,
            geometry: None,
            material: None,
            opacity: 1.0,
            constraints: SmallVec::new(),
            actions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3A,
    pub dir: Vec3A,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub node: NodeId,
    pub dist: f32,
}

pub struct SceneGraph {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: usize,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::default());
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Creates a detached node. It is not rendered until added to the tree.
    pub fn create_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> anyhow::Result<()> {
        if !self.contains(parent) {
            anyhow::bail!("parent node {parent:?} does not exist");
        }
        if parent == child || self.is_ancestor(child, parent) {
            anyhow::bail!("adding {child:?} under {parent:?} would create a cycle");
        }

        let old_parent = match self.nodes.get_mut(&child) {
            Some(node) => node.parent.replace(parent),
            None => anyhow::bail!("child node {child:?} does not exist"),
        };
        if let Some(old) = old_parent.and_then(|p| self.nodes.get_mut(&p)) {
            old.children.retain(|c| *c != child);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(child);
        }
        Ok(())
    }

    /// Detaches `id` and destroys its subtree, including any running actions.
    pub fn remove_from_parent(&mut self, id: NodeId) -> bool {
        if id == self.root {
            return false;
        }
        let Some(parent) = self.nodes.get(&id).map(|n| n.parent) else {
            return false;
        };
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }

        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&next) {
                stack.extend(removed.children);
            }
        }
        true
    }

    fn is_ancestor(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        while let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    /// Whether the node is part of the rendered tree.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || (self.contains(id) && self.is_ancestor(self.root, id))
    }

    pub fn world_transform(&self, id: NodeId) -> Option<Affine3A> {
        let mut transform = self.nodes.get(&id)?.transform;
        let mut current = id;
        while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent) {
            transform = self.nodes.get(&parent)?.transform * transform;
            current = parent;
        }
        Some(transform)
    }

    /// Moves the node so its world pose matches, keeping its scale.
    pub fn set_world_pose(&mut self, id: NodeId, position: Vec3A, orientation: Quat) -> bool {
        let Some(world) = self.world_transform(id) else {
            return false;
        };
        let parent_world = self
            .nodes
            .get(&id)
            .and_then(|n| n.parent)
            .and_then(|p| self.world_transform(p))
            .unwrap_or(Affine3A::IDENTITY);

        let (scale, _, _) = world.to_scale_rotation_translation();
        let desired =
            Affine3A::from_scale_rotation_translation(scale, orientation, Vec3::from(position));

        if let Some(node) = self.nodes.get_mut(&id) {
            node.transform = parent_world.inverse() * desired;
            return true;
        }
        false
    }

    pub fn add_constraint(&mut self, id: NodeId, constraint: PoseConstraint) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.constraints.push(constraint);
        self.solve_node_constraints(id);
        true
    }

    pub fn run_action(&mut self, id: NodeId, action: Action) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.actions.push(RunningAction::new(action));
        true
    }

    /// The tracker reporting a new pose for an anchor node. Constraints win.
    pub fn apply_tracked_pose(&mut self, id: NodeId, transform: Affine3A) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.transform = transform;
        self.solve_node_constraints(id);
        true
    }

    fn solve_node_constraints(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let constraints = node.constraints.clone();
        for c in constraints {
            self.set_world_pose(c.target, c.position, c.orientation);
        }
    }

    pub fn solve_constraints(&mut self) {
        let mut ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| !n.constraints.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        for id in ids {
            self.solve_node_constraints(id);
        }
    }

    /// One render frame: advance actions, then evaluate constraints.
    pub fn tick(&mut self, dt: f32) {
        for node in self.nodes.values_mut() {
            if node.actions.is_empty() {
                continue;
            }
            let mut translation = Vec3A::ZERO;
            for action in &mut node.actions {
                translation += action.advance(dt);
            }
            node.actions.retain(|a| !a.is_finished());
            node.transform.translation += translation;
        }
        self.solve_constraints();
    }

    /// Bounding-box hit test against every attached plane, nearest first.
    pub fn hit_test(&self, ray: &Ray) -> Vec<HitResult> {
        let mut hits: Vec<HitResult> = self
            .nodes
            .iter()
            .filter_map(|(id, node)| {
                let plane = node.geometry?;
                if !self.is_attached(*id) {
                    return None;
                }
                let transform = self.world_transform(*id)?;
                let (dist, local) = raycast_plane(ray, &transform)?;
                if local.x.abs() > plane.width * 0.5 || local.y.abs() > plane.height * 0.5 {
                    return None;
                }
                Some(HitResult { node: *id, dist })
            })
            .collect();

        hits.sort_by(|a, b| a.dist.total_cmp(&b.dist).then(a.node.cmp(&b.node)));
        hits
    }
}

fn raycast_plane(ray: &Ray, plane: &Affine3A) -> Option<(f32, Vec2)> {
    let plane_normal = plane.transform_vector3a(Vec3A::Z).normalize_or_zero();
    let ray_dir = ray.dir.normalize_or_zero();
    let denom = ray_dir.dot(plane_normal);

    // parallel to the plane; bounding boxes are hit from either side
    if denom.abs() <= f32::EPSILON {
        return None;
    }

    let dist = (plane.translation - ray.origin).dot(plane_normal) / denom;
    if dist < 0.0 {
        // hit is behind us
        return None;
    }

    let hit_local = plane
        .inverse()
        .transform_point3a(ray.origin + ray_dir * dist)
        .xy();

    Some((dist, hit_local))
}

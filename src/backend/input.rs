use glam::{vec3a, Affine3A, Vec2};
use serde::Deserialize;

use crate::{scene::Ray, state::AppState};

use super::task::TaskType;

/// The device camera: a world pose plus a pinhole looking down -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub transform: Affine3A,
    pub fov_y: f32,
    /// Screen size in points.
    pub viewport: Vec2,
}

impl Camera {
    pub fn with_fov_degrees(fov_y: f32) -> Self {
        Self {
            transform: Affine3A::IDENTITY,
            fov_y: fov_y.to_radians(),
            viewport: Vec2::new(1280., 720.),
        }
    }

    /// World-space ray through a screen point. (0, 0) is the top-left corner.
    pub fn ray_through(&self, point: Vec2) -> Ray {
        let half_h = (self.fov_y * 0.5).tan();
        let aspect = self.viewport.x / self.viewport.y.max(1.);
        let ndc = point / self.viewport.max(Vec2::ONE) * 2. - Vec2::ONE;

        let local_dir = vec3a(ndc.x * half_h * aspect, -ndc.y * half_h, -1.);
        Ray {
            origin: self.transform.translation,
            dir: self.transform.transform_vector3a(local_dir).normalize(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TouchEvent {
    pub x: f32,
    pub y: f32,
}

/// Touch-down. Hit-tests and detaches in one scene job, so taps queued before
/// the first one lands cannot hit the same overlay again. The product page is
/// opened from the UI context.
pub fn touches_began(app: &AppState, touch: TouchEvent) {
    let ray = app.camera.ray_through(Vec2::new(touch.x, touch.y));
    let url = app.session.config.link_url.clone();
    let ui = app.tasks.dispatcher();

    app.scene_queue.dispatch(move |scene| {
        let Some(hit) = scene.hit_test(&ray).first().copied() else {
            return;
        };
        log::info!("Tapped overlay {:?} at {:.3}m", hit.node, hit.dist);
        scene.remove_from_parent(hit.node);
        ui.dispatch(TaskType::OpenUrl(url));
    });
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use glam::{Quat, Vec3, Vec3A};

    use super::*;
    use crate::{
        overlays::{browser::tests::RecordingBrowser, image_anchor::place_overlay},
        scene::{Node, NodeId},
        state::tests::test_state,
        tracking::ReferenceImage,
    };

    const LINK: &str = "https://www.ikea.com/hk/zh/catalog/products/60162301/";

    #[test]
    fn center_ray_points_forward() {
        let camera = Camera::with_fov_degrees(60.);
        let ray = camera.ray_through(Vec2::new(640., 360.));
        assert!(ray.dir.abs_diff_eq(Vec3A::NEG_Z, 1e-5));

        let top_left = camera.ray_through(Vec2::ZERO);
        assert!(top_left.dir.x < 0. && top_left.dir.y > 0.);
    }

    /// An image lying on a table half a meter below and in front of the
    /// camera, with the camera looking straight at it.
    fn table_scene(app: &mut AppState) -> (NodeId, NodeId) {
        let (anchor, overlay) = {
            let mut scene = app.scene.lock().unwrap();
            let root = scene.root();
            let anchor = scene.create_node(Node {
                transform: Affine3A::from_rotation_translation(
                    Quat::IDENTITY,
                    Vec3::new(0., -0.5, -0.5),
                ),
                ..Default::default()
            });
            scene.add_child(root, anchor).unwrap();
            let overlay =
                place_overlay(&mut scene, anchor, &ReferenceImage::new("1", 0.1, 0.05)).unwrap();
            (anchor, overlay)
        };
        app.camera.transform = Affine3A::look_to_rh(Vec3::ZERO, Vec3::new(0., -1., -1.), Vec3::Y)
            .inverse();
        (anchor, overlay)
    }

    fn tap_center(app: &AppState) {
        let center = app.camera.viewport * 0.5;
        touches_began(
            app,
            TouchEvent {
                x: center.x,
                y: center.y,
            },
        );
    }

    fn settle(app: &mut AppState) {
        assert!(app.scene_queue.sync());
        let mut due = VecDeque::new();
        app.update(0., &mut due);
    }

    #[test]
    fn tap_on_overlay_opens_link_and_detaches_it() {
        let browser = RecordingBrowser::default();
        let (mut app, _dir) = test_state(browser.clone());
        let (anchor, overlay) = table_scene(&mut app);

        tap_center(&app);
        settle(&mut app);

        assert_eq!(browser.opened(), vec![LINK.to_string()]);
        let scene = app.scene.lock().unwrap();
        assert!(!scene.contains(overlay));
        assert!(scene.get(anchor).unwrap().children.is_empty());
    }

    #[test]
    fn quick_double_tap_opens_link_once() {
        let browser = RecordingBrowser::default();
        let (mut app, _dir) = test_state(browser.clone());
        let (_, overlay) = table_scene(&mut app);

        tap_center(&app);
        tap_center(&app);
        settle(&mut app);

        assert_eq!(browser.opened(), vec![LINK.to_string()]);
        assert!(!app.scene.lock().unwrap().contains(overlay));
    }

    #[test]
    fn tap_on_nothing_is_a_no_op() {
        let browser = RecordingBrowser::default();
        let (mut app, _dir) = test_state(browser.clone());
        touches_began(&app, TouchEvent { x: 10., y: 10. });
        settle(&mut app);
        assert!(browser.opened().is_empty());
    }
}

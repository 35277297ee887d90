use std::{
    collections::VecDeque,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use glam::{Affine3A, Quat, Vec2, Vec3};
use serde::Deserialize;

use crate::{
    overlays::browser::SystemBrowser,
    state::{AppSession, AppState},
    tracking::{Anchor, AnchorEvent, AnchorId, AnchorKind, LimitedReason, TrackingState},
};

use super::{
    input::{touches_began, TouchEvent},
    BackendError,
};

fn def_rotation() -> Quat {
    Quat::IDENTITY
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedAnchor {
    pub anchor: u64,
    /// Reference image name for image anchors.
    #[serde(default)]
    pub image: Option<String>,
    /// Extent for plane anchors.
    #[serde(default)]
    pub plane: Option<Vec2>,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "def_rotation")]
    pub rotation: Quat,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedTrackingState {
    NotAvailable,
    Normal,
    Initializing,
    ExcessiveMotion,
    InsufficientFeatures,
    Relocalizing,
}

impl From<RecordedTrackingState> for TrackingState {
    fn from(value: RecordedTrackingState) -> Self {
        match value {
            RecordedTrackingState::NotAvailable => Self::NotAvailable,
            RecordedTrackingState::Normal => Self::Normal,
            RecordedTrackingState::Initializing => Self::Limited(LimitedReason::Initializing),
            RecordedTrackingState::ExcessiveMotion => Self::Limited(LimitedReason::ExcessiveMotion),
            RecordedTrackingState::InsufficientFeatures => {
                Self::Limited(LimitedReason::InsufficientFeatures)
            }
            RecordedTrackingState::Relocalizing => Self::Limited(LimitedReason::Relocalizing),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    Added(RecordedAnchor),
    Updated(RecordedAnchor),
    Removed(RecordedAnchor),
    Tracking { state: RecordedTrackingState },
    Tap(TouchEvent),
    Interrupt,
    Resume,
    Restart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayStep {
    /// Seconds since the session started.
    pub at: f32,
    #[serde(flatten)]
    pub event: ReplayEvent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraSetup {
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "def_rotation")]
    pub rotation: Quat,
    pub viewport: Option<Vec2>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub camera: Option<CameraSetup>,
    #[serde(default)]
    pub steps: Vec<ReplayStep>,
}

impl ReplayScript {
    pub fn from_yaml(data: &str) -> anyhow::Result<Self> {
        let mut script: ReplayScript = serde_yaml::from_str(data)?;
        script.steps.sort_by(|a, b| a.at.total_cmp(&b.at));
        Ok(script)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read replay {}", path.to_string_lossy()))?;
        Self::from_yaml(&data)
            .with_context(|| format!("Could not parse replay {}", path.to_string_lossy()))
    }
}

impl RecordedAnchor {
    fn to_anchor(&self, app: &AppState) -> Option<Anchor> {
        let kind = match (&self.image, self.plane) {
            (Some(name), _) => match app.tracking.reference_image(name) {
                Some(image) => AnchorKind::Image(image.clone()),
                None => {
                    log::warn!("Replay references unknown image {name:?}");
                    return None;
                }
            },
            (None, Some(extent)) => AnchorKind::Plane { extent },
            (None, None) => AnchorKind::Other,
        };
        Some(Anchor {
            id: AnchorId(self.anchor),
            transform: Affine3A::from_rotation_translation(self.rotation.normalize(), self.position),
            kind,
        })
    }
}

pub fn apply_event(app: &mut AppState, event: ReplayEvent) -> Result<(), BackendError> {
    match event {
        ReplayEvent::Added(recorded) => {
            if let Some(anchor) = recorded.to_anchor(app) {
                app.tracking
                    .handle_event(AnchorEvent::Added(anchor), &app.binder);
            }
        }
        ReplayEvent::Updated(recorded) => {
            if let Some(anchor) = recorded.to_anchor(app) {
                app.tracking
                    .handle_event(AnchorEvent::Updated(anchor), &app.binder);
            }
        }
        ReplayEvent::Removed(recorded) => {
            if let Some(anchor) = recorded.to_anchor(app) {
                app.tracking
                    .handle_event(AnchorEvent::Removed(anchor), &app.binder);
            }
        }
        ReplayEvent::Tracking { state } => app.camera_did_change_tracking_state(state.into()),
        ReplayEvent::Tap(touch) => {
            touches_began(app, touch);
        }
        ReplayEvent::Interrupt => app.session_was_interrupted(),
        ReplayEvent::Resume => app.session_interruption_ended()?,
        ReplayEvent::Restart => app.restart_experience()?,
    }
    Ok(())
}

/// Drives the app from a recorded session until the script runs out
/// (unless `keep_running`) or `running` is cleared.
pub fn replay_run(
    running: Arc<AtomicBool>,
    script: Option<&Path>,
    keep_running: bool,
) -> Result<(), BackendError> {
    let script = match script {
        Some(path) => ReplayScript::load(path)?,
        None => ReplayScript {
            camera: None,
            steps: Vec::new(),
        },
    };
    let keep_running = keep_running || script.steps.is_empty();

    let session = AppSession::load()?;
    let mut app = AppState::new(session, Box::new(SystemBrowser))?;

    if let Some(camera) = &script.camera {
        app.camera.transform =
            Affine3A::from_rotation_translation(camera.rotation.normalize(), camera.position);
        if let Some(viewport) = camera.viewport {
            app.camera.viewport = viewport;
        }
    }

    app.reset_tracking()?;

    let frame_time = app.session.config.frame_time();
    let mut steps: VecDeque<ReplayStep> = script.steps.into();
    let mut due_tasks = VecDeque::new();
    let start = Instant::now();
    let mut last_frame = start;

    log::info!("Replaying {} steps", steps.len());

    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        let elapsed = now.duration_since(start).as_secs_f32();

        while steps.front().is_some_and(|s| s.at <= elapsed) {
            if let Some(step) = steps.pop_front() {
                log::debug!("t={:.2} {:?}", step.at, step.event);
                apply_event(&mut app, step.event)?;
            }
        }

        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;
        app.update(dt, &mut due_tasks);

        if steps.is_empty() && !keep_running {
            log::info!("Replay finished");
            break;
        }

        let spent = Instant::now().duration_since(now);
        std::thread::sleep(frame_time.saturating_sub(spent).max(Duration::from_millis(1)));
    }

    app.tracking.pause();
    app.scene_queue.sync();
    Ok(())
}

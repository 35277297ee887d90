use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use crate::{
    backend::{
        input::Camera,
        scene_queue::SceneQueue,
        session::{load_reference_images, PlaneDetection, RunOptions, SessionConfig, TrackingSession},
        task::{TaskContainer, TaskType},
        BackendError,
    },
    config::GeneralConfig,
    config_io,
    overlays::{
        browser::Browser,
        image_anchor::{DetectionMessages, ImageAnchorBinder},
        status::{MessageType, StatusMessenger, StatusView},
    },
    scene::SceneGraph,
    tracking::TrackingState,
};

pub const SCENE_QUEUE_LABEL: &str = "image-anchor-overlay.serialSceneQueue";

pub struct AppSession {
    pub config_root_path: PathBuf,
    pub config: GeneralConfig,
}

impl AppSession {
    pub fn load() -> anyhow::Result<Self> {
        let config_root_path = config_io::ensure_config_root();
        log::info!("Config root path: {}", config_root_path.to_string_lossy());
        let config = GeneralConfig::load_from_disk(&config_root_path)?;

        Ok(AppSession {
            config_root_path,
            config,
        })
    }
}

pub struct AppState {
    pub session: AppSession,
    pub tasks: TaskContainer,
    pub scene: Arc<Mutex<SceneGraph>>,
    pub scene_queue: SceneQueue,
    pub tracking: TrackingSession,
    pub binder: ImageAnchorBinder,
    pub status: StatusView,
    pub browser: Box<dyn Browser>,
    pub camera: Camera,
    pub restart_available: bool,
}

impl AppState {
    pub fn new(session: AppSession, browser: Box<dyn Browser>) -> anyhow::Result<Self> {
        let scene = Arc::new(Mutex::new(SceneGraph::new()));
        let scene_queue = SceneQueue::new(SCENE_QUEUE_LABEL, scene.clone())?;
        let tasks = TaskContainer::new();

        let config = &session.config;
        let binder = ImageAnchorBinder::new(
            scene_queue.handle(),
            tasks.dispatcher(),
            DetectionMessages {
                detected: config.detected_message.clone(),
                fallback: config.fallback_message.clone(),
            },
        );
        let status = StatusView::new(config.message_hide_delay());
        let camera = Camera::with_fov_degrees(config.camera_fov_y);

        Ok(AppState {
            tracking: TrackingSession::new(scene.clone()),
            session,
            tasks,
            scene,
            scene_queue,
            binder,
            status,
            browser,
            camera,
            restart_available: true,
        })
    }

    /// (Re)starts image detection from scratch.
    pub fn reset_tracking(&mut self) -> Result<(), BackendError> {
        let config = &self.session.config;
        let detection_images =
            load_reference_images(&config.resource_root, &config.reference_group)?;

        self.tracking.run(
            SessionConfig {
                detection_images,
                plane_detection: if config.detect_planes {
                    PlaneDetection::Horizontal
                } else {
                    PlaneDetection::None
                },
            },
            RunOptions {
                reset_tracking: true,
                remove_existing_anchors: true,
            },
            &self.binder,
        );

        self.status.schedule_message(
            &config.look_around_message,
            config.look_around_delay(),
            MessageType::ContentPlacement,
        );
        Ok(())
    }

    /// Ignored while a previous restart is cooling down.
    pub fn restart_experience(&mut self) -> Result<(), BackendError> {
        if !self.restart_available {
            log::debug!("Restart already in progress");
            return Ok(());
        }
        self.restart_available = false;

        self.status.cancel_all_scheduled_messages();
        self.reset_tracking()?;

        self.tasks.enqueue_at(
            TaskType::EnableRestart,
            Instant::now() + self.session.config.restart_cooldown(),
        );
        Ok(())
    }

    pub fn camera_did_change_tracking_state(&mut self, state: TrackingState) {
        self.status.show_tracking_quality_info(state, true);

        match state {
            TrackingState::NotAvailable | TrackingState::Limited(_) => {
                self.status
                    .escalate_feedback(state, self.session.config.escalation_delay());
            }
            TrackingState::Normal => {
                self.status
                    .cancel_scheduled_message(MessageType::TrackingStateEscalation);
            }
        }
    }

    pub fn session_was_interrupted(&mut self) {
        self.tracking.pause();
        self.status.show_message(
            "SESSION INTERRUPTED\nThe session will be reset after the interruption has ended.",
            false,
        );
    }

    /// Resumes tracking even when a recent restart is still cooling down.
    pub fn session_interruption_ended(&mut self) -> Result<(), BackendError> {
        self.status.show_message("RESETTING SESSION", true);
        self.restart_experience()?;
        if !self.tracking.is_running() {
            self.reset_tracking()?;
        }
        Ok(())
    }

    pub fn process_tasks(&mut self, due_tasks: &mut VecDeque<TaskType>) {
        while let Some(task) = due_tasks.pop_front() {
            match task {
                TaskType::Status(f) => f(&mut self.status),
                TaskType::OpenUrl(url) => {
                    if let Err(e) = self.browser.open_url(&url) {
                        log::error!("{e:?}");
                    }
                }
                TaskType::EnableRestart => {
                    self.restart_available = true;
                }
            }
        }
    }

    /// One UI frame: run due tasks, update the status overlay and render the scene.
    pub fn update(&mut self, dt: f32, due_tasks: &mut VecDeque<TaskType>) {
        self.tasks.receive_dispatched();
        let now = Instant::now();
        self.tasks.retrieve_due_at(now, due_tasks);
        self.process_tasks(due_tasks);
        self.status.tick(now);

        self.scene
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tick(dt);
    }
}

#[cfg(test)]
pub mod tests {
    use std::{fs, time::Duration};

    use super::*;
    use crate::overlays::browser::tests::RecordingBrowser;

    pub fn test_state(browser: RecordingBrowser) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("AR Resources.yaml"),
            "images:\n  - name: \"1\"\n    width: 0.1\n    height: 0.05\n  - name: logo\n    width: 0.2\n    height: 0.1\n",
        )
        .unwrap();

        let config = GeneralConfig {
            resource_root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let session = AppSession {
            config_root_path: dir.path().to_path_buf(),
            config,
        };
        (AppState::new(session, Box::new(browser)).unwrap(), dir)
    }

    #[test]
    fn reset_tracking_schedules_hint() {
        let (mut app, _dir) = test_state(RecordingBrowser::default());
        app.reset_tracking().unwrap();
        assert!(app.tracking.is_running());
        assert!(app.tracking.reference_image("logo").is_some());
        assert!(app.status.is_scheduled(MessageType::ContentPlacement));
    }

    #[test]
    fn missing_resources_are_fatal() {
        let (mut app, _dir) = test_state(RecordingBrowser::default());
        app.session.config.reference_group = "Nope".into();
        let err = app.reset_tracking().unwrap_err();
        assert!(matches!(err, BackendError::MissingResources { .. }));
        assert!(!app.tracking.is_running());
    }

    #[test]
    fn restart_is_debounced_until_cooldown_task_runs() {
        let (mut app, _dir) = test_state(RecordingBrowser::default());
        app.restart_experience().unwrap();
        assert!(!app.restart_available);

        // second request is a no-op
        app.status.cancel_all_scheduled_messages();
        app.restart_experience().unwrap();
        assert!(!app.status.is_scheduled(MessageType::ContentPlacement));

        let mut due = VecDeque::new();
        app.tasks
            .retrieve_due_at(Instant::now() + Duration::from_secs(60), &mut due);
        app.process_tasks(&mut due);
        assert!(app.restart_available);
    }

    #[test]
    fn tracking_state_escalates_until_normal() {
        let (mut app, _dir) = test_state(RecordingBrowser::default());
        app.camera_did_change_tracking_state(TrackingState::NotAvailable);
        assert!(app.status.is_scheduled(MessageType::TrackingStateEscalation));
        app.camera_did_change_tracking_state(TrackingState::Normal);
        assert!(!app.status.is_scheduled(MessageType::TrackingStateEscalation));
        assert_eq!(app.status.visible_message(), Some("TRACKING NORMAL"));
    }

    #[test]
    fn interruption_pauses_and_resumes() {
        let (mut app, _dir) = test_state(RecordingBrowser::default());
        app.reset_tracking().unwrap();
        app.session_was_interrupted();
        assert!(!app.tracking.is_running());
        app.session_interruption_ended().unwrap();
        assert!(app.tracking.is_running());
    }

    #[test]
    fn resume_during_restart_cooldown_still_tracks() {
        let (mut app, _dir) = test_state(RecordingBrowser::default());
        app.reset_tracking().unwrap();
        app.restart_experience().unwrap();
        assert!(!app.restart_available);

        app.session_was_interrupted();
        assert!(!app.tracking.is_running());
        app.session_interruption_ended().unwrap();
        assert!(app.tracking.is_running());
        assert!(app.status.is_scheduled(MessageType::ContentPlacement));

        // cooldown still gates further restarts
        assert!(!app.restart_available);
        let mut due = VecDeque::new();
        app.tasks
            .retrieve_due_at(Instant::now() + Duration::from_secs(60), &mut due);
        app.process_tasks(&mut due);
        assert!(app.restart_available);
    }

    #[test]
    fn open_url_task_reaches_browser() {
        let browser = RecordingBrowser::default();
        let (mut app, _dir) = test_state(browser.clone());
        let mut due = VecDeque::from([TaskType::OpenUrl("https://example.com/".into())]);
        app.process_tasks(&mut due);
        assert_eq!(browser.opened(), vec!["https://example.com/".to_string()]);
    }
}

use std::{path::Path, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use config::{Config, File};
use log::error;
use serde::Deserialize;

use crate::config_io::get_conf_d_path;

fn def_resource_root() -> PathBuf {
    PathBuf::from("assets")
}

fn def_reference_group() -> Arc<str> {
    "AR Resources".into()
}

fn def_detected_message() -> Arc<str> {
    "Detected image".into()
}

fn def_fallback_message() -> Arc<str> {
    "Detected unknown image".into()
}

fn def_look_around_message() -> Arc<str> {
    "Look around to detect images".into()
}

fn def_look_around_delay() -> f32 {
    7.5
}

fn def_link_url() -> Arc<str> {
    "https://www.ikea.com/hk/zh/catalog/products/60162301/".into()
}

fn def_message_hide_delay() -> f32 {
    6.0
}

fn def_restart_cooldown() -> f32 {
    5.0
}

fn def_escalation_delay() -> f32 {
    3.0
}

fn def_true() -> bool {
    true
}

fn def_frame_rate() -> f32 {
    60.0
}

fn def_camera_fov_y() -> f32 {
    60.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Directory holding the bundled reference image groups.
    #[serde(default = "def_resource_root")]
    pub resource_root: PathBuf,

    #[serde(default = "def_reference_group")]
    pub reference_group: Arc<str>,

    #[serde(default = "def_detected_message")]
    pub detected_message: Arc<str>,

    #[serde(default = "def_fallback_message")]
    pub fallback_message: Arc<str>,

    #[serde(default = "def_look_around_message")]
    pub look_around_message: Arc<str>,

    #[serde(default = "def_look_around_delay")]
    pub look_around_delay: f32,

    #[serde(default = "def_link_url")]
    pub link_url: Arc<str>,

    #[serde(default = "def_message_hide_delay")]
    pub message_hide_delay: f32,

    #[serde(default = "def_restart_cooldown")]
    pub restart_cooldown: f32,

    #[serde(default = "def_escalation_delay")]
    pub escalation_delay: f32,

    /// Track horizontal planes alongside the reference images.
    #[serde(default = "def_true")]
    pub detect_planes: bool,

    #[serde(default = "def_frame_rate")]
    pub frame_rate: f32,

    #[serde(default = "def_camera_fov_y")]
    pub camera_fov_y: f32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            resource_root: def_resource_root(),
            reference_group: def_reference_group(),
            detected_message: def_detected_message(),
            fallback_message: def_fallback_message(),
            look_around_message: def_look_around_message(),
            look_around_delay: def_look_around_delay(),
            link_url: def_link_url(),
            message_hide_delay: def_message_hide_delay(),
            restart_cooldown: def_restart_cooldown(),
            escalation_delay: def_escalation_delay(),
            detect_planes: def_true(),
            frame_rate: def_frame_rate(),
            camera_fov_y: def_camera_fov_y(),
        }
    }
}

impl GeneralConfig {
    fn sanitize_range(name: &str, val: f32, from: f32, to: f32) -> anyhow::Result<()> {
        if !val.is_finite() || val < from || val > to {
            bail!("GeneralConfig: {} needs to be between {} and {}", name, from, to);
        }
        Ok(())
    }

    pub fn load_from_disk(root: &Path) -> anyhow::Result<GeneralConfig> {
        let config = load_general(root)?;
        config.post_load()?;
        Ok(config)
    }

    fn post_load(&self) -> anyhow::Result<()> {
        GeneralConfig::sanitize_range("look_around_delay", self.look_around_delay, 0.0, 600.0)?;
        GeneralConfig::sanitize_range("message_hide_delay", self.message_hide_delay, 0.1, 600.0)?;
        GeneralConfig::sanitize_range("restart_cooldown", self.restart_cooldown, 0.0, 600.0)?;
        GeneralConfig::sanitize_range("escalation_delay", self.escalation_delay, 0.0, 600.0)?;
        GeneralConfig::sanitize_range("frame_rate", self.frame_rate, 1.0, 1000.0)?;
        GeneralConfig::sanitize_range("camera_fov_y", self.camera_fov_y, 1.0, 179.0)?;
        Ok(())
    }

    pub fn look_around_delay(&self) -> Duration {
        Duration::from_secs_f32(self.look_around_delay)
    }

    pub fn message_hide_delay(&self) -> Duration {
        Duration::from_secs_f32(self.message_hide_delay)
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_secs_f32(self.restart_cooldown)
    }

    pub fn escalation_delay(&self) -> Duration {
        Duration::from_secs_f32(self.escalation_delay)
    }

    pub fn frame_time(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.frame_rate)
    }
}

/// Reads `config.yaml` from the root and from `conf.d`, then every file in
/// `conf.d` in alphabetical order. Later files override earlier ones.
pub fn load_general(root: &Path) -> anyhow::Result<GeneralConfig> {
    let mut settings_builder = Config::builder();

    let path_conf_d = get_conf_d_path(root);

    for base_conf in [root.to_path_buf(), path_conf_d.clone()] {
        let base_conf = base_conf.join("config.yaml");
        if base_conf.exists() {
            log::info!("Loading config file: {}", base_conf.to_string_lossy());
            settings_builder = settings_builder.add_source(File::from(base_conf));
        }
    }

    if let Ok(paths_unsorted) = std::fs::read_dir(&path_conf_d) {
        let mut paths: Vec<_> = paths_unsorted
            .filter_map(|r| match r {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    error!("Failed to read conf.d directory: {}", e);
                    None
                }
            })
            .filter(|p| p.is_file() && p.file_name().is_some_and(|n| n != "config.yaml"))
            .collect();
        // Sort paths alphabetically
        paths.sort();
        for path in paths {
            log::info!("Loading config file: {}", path.to_string_lossy());
            settings_builder = settings_builder.add_source(File::from(path));
        }
    }

    let settings = settings_builder
        .build()
        .context("Failed to build settings")?;
    settings
        .try_deserialize::<GeneralConfig>()
        .context("Failed to deserialize settings")
}

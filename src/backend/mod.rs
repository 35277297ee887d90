pub mod input;
pub mod replay;
pub mod scene_queue;
pub mod session;
pub mod task;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Missing expected asset catalog resources ({group}): {reason}")]
    MissingResources { group: String, reason: String },
    #[error("Fatal: {0:?}")]
    Fatal(#[from] anyhow::Error),
}

use std::{
    sync::{mpsc, Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};

use anyhow::Context;

use crate::scene::SceneGraph;

pub type SceneJob = dyn FnOnce(&mut SceneGraph) + Send;

enum SceneMsg {
    Job(Box<SceneJob>),
    Sync(mpsc::SyncSender<()>),
    Shutdown,
}

/// Sending half of the scene queue. Cheap to clone and safe to use from any thread.
#[derive(Clone)]
pub struct SceneQueueHandle {
    tx: mpsc::Sender<SceneMsg>,
}

impl SceneQueueHandle {
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce(&mut SceneGraph) + Send + 'static,
    {
        if self.tx.send(SceneMsg::Job(Box::new(job))).is_err() {
            log::warn!("Scene queue is shut down, dropping job");
        }
    }

    /// Blocks until every job submitted before this call has run.
    pub fn sync(&self) -> bool {
        let (tx, rx) = mpsc::sync_channel(1);
        if self.tx.send(SceneMsg::Sync(tx)).is_err() {
            return false;
        }
        rx.recv().is_ok()
    }
}

/// Serial worker that owns every mutation of the shared scene graph.
/// Jobs run one at a time, in the order they were dispatched.
pub struct SceneQueue {
    handle: SceneQueueHandle,
    worker: Option<JoinHandle<()>>,
}

impl SceneQueue {
    pub fn new(label: &str, scene: Arc<Mutex<SceneGraph>>) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel::<SceneMsg>();

        let worker = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                for msg in rx {
                    match msg {
                        SceneMsg::Job(job) => {
                            let mut scene = scene.lock().unwrap_or_else(PoisonError::into_inner);
                            job(&mut scene);
                        }
                        SceneMsg::Sync(done) => {
                            let _ = done.send(());
                        }
                        SceneMsg::Shutdown => break,
                    }
                }
                log::debug!("Scene queue drained, worker exiting");
            })
            .with_context(|| format!("Failed to spawn scene queue {label}"))?;

        Ok(Self {
            handle: SceneQueueHandle { tx },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> SceneQueueHandle {
        self.handle.clone()
    }

    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce(&mut SceneGraph) + Send + 'static,
    {
        self.handle.dispatch(job);
    }

    pub fn sync(&self) -> bool {
        self.handle.sync()
    }
}

impl Drop for SceneQueue {
    fn drop(&mut self) {
        // jobs queued before this point still run
        let _ = self.handle.tx.send(SceneMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Scene queue worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Node;

    #[test]
    fn jobs_run_in_submission_order() {
        let scene = Arc::new(Mutex::new(SceneGraph::new()));
        let queue = SceneQueue::new("test.scene", scene).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = seen.clone();
            queue.dispatch(move |_| seen.lock().unwrap().push(i));
        }
        assert!(queue.sync());

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn jobs_mutate_the_shared_scene() {
        let scene = Arc::new(Mutex::new(SceneGraph::new()));
        let queue = SceneQueue::new("test.scene", scene.clone()).unwrap();
        let handle = queue.handle();

        let worker = thread::spawn(move || {
            handle.dispatch(|scene| {
                let root = scene.root();
                let id = scene.create_node(Node::default());
                scene.add_child(root, id).unwrap();
            });
        });
        worker.join().unwrap();
        assert!(queue.sync());

        assert_eq!(scene.lock().unwrap().len(), 2);
    }

    #[test]
    fn drop_joins_worker_with_outstanding_handles() {
        let scene = Arc::new(Mutex::new(SceneGraph::new()));
        let queue = SceneQueue::new("test.scene", scene.clone()).unwrap();
        let handle = queue.handle();
        handle.dispatch(|scene| {
            scene.create_node(Node::default());
        });
        drop(queue);

        assert_eq!(scene.lock().unwrap().len(), 2);
        // late jobs are dropped, not run
        handle.dispatch(|scene| {
            scene.create_node(Node::default());
        });
        assert!(!handle.sync());
        assert_eq!(scene.lock().unwrap().len(), 2);
    }
}

use std::{
    cmp,
    collections::{BinaryHeap, VecDeque},
    sync::{
        atomic::{self, AtomicUsize},
        mpsc, Arc,
    },
    time::Instant,
};

use crate::overlays::status::StatusMessenger;

static TASK_AUTO_INCREMENT: AtomicUsize = AtomicUsize::new(0);

struct AppTask {
    pub not_before: Instant,
    pub id: usize,
    pub task: TaskType,
}

impl PartialEq<AppTask> for AppTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == cmp::Ordering::Equal
    }
}
impl PartialOrd<AppTask> for AppTask {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Eq for AppTask {}
impl Ord for AppTask {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.not_before
            .cmp(&other.not_before)
            .then(self.id.cmp(&other.id))
            .reverse()
    }
}

pub type StatusTask = dyn FnOnce(&mut dyn StatusMessenger) + Send;

/// Work that must run on the UI context.
pub enum TaskType {
    Status(Box<StatusTask>),
    OpenUrl(Arc<str>),
    /// End of the restart cooldown.
    EnableRestart,
}

/// Posts tasks to the UI context from any thread.
#[derive(Clone)]
pub struct UiDispatcher {
    tx: mpsc::Sender<TaskType>,
}

impl UiDispatcher {
    pub fn dispatch(&self, task: TaskType) {
        if self.tx.send(task).is_err() {
            log::warn!("UI context is gone, dropping task");
        }
    }

    pub fn dispatch_status<F>(&self, f: F)
    where
        F: FnOnce(&mut dyn StatusMessenger) + Send + 'static,
    {
        self.dispatch(TaskType::Status(Box::new(f)));
    }
}

pub struct TaskContainer {
    tasks: BinaryHeap<AppTask>,
    rx_dispatched: mpsc::Receiver<TaskType>,
    tx_dispatched: mpsc::Sender<TaskType>,
}

impl Default for TaskContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskContainer {
    pub fn new() -> Self {
        let (tx_dispatched, rx_dispatched) = mpsc::channel();
        Self {
            tasks: BinaryHeap::new(),
            rx_dispatched,
            tx_dispatched,
        }
    }

    pub fn dispatcher(&self) -> UiDispatcher {
        UiDispatcher {
            tx: self.tx_dispatched.clone(),
        }
    }

    /// Enqueue a task to be executed at a specific time.
    /// If the time is in the past, the task will be executed immediately.
    /// Multiple tasks enqueued for the same instant will be executed in order of submission.
    pub fn enqueue_at(&mut self, task: TaskType, not_before: Instant) {
        self.tasks.push(AppTask {
            not_before,
            id: TASK_AUTO_INCREMENT.fetch_add(1, atomic::Ordering::Relaxed),
            task,
        });
    }

    /// Moves tasks posted through a [`UiDispatcher`] into the queue.
    pub fn receive_dispatched(&mut self) {
        let now = Instant::now();
        while let Ok(task) = self.rx_dispatched.try_recv() {
            self.enqueue_at(task, now);
        }
    }

    pub fn retrieve_due(&mut self, dest_buf: &mut VecDeque<TaskType>) {
        self.retrieve_due_at(Instant::now(), dest_buf);
    }

    pub fn retrieve_due_at(&mut self, now: Instant, dest_buf: &mut VecDeque<TaskType>) {
        while let Some(task) = self.tasks.peek() {
            if task.not_before > now {
                break;
            }

            if let Some(task) = self.tasks.pop() {
                dest_buf.push_back(task.task);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

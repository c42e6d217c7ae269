use std::collections::VecDeque;
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread;

use log::debug;

use super::{MainTask, MainThread};
use crate::error::{DispatchError, RouteError};

/// Main thread backed by a dedicated OS thread that runs posted tasks in order
pub struct LooperThread {
    sender: Mutex<Option<Sender<MainTask>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl LooperThread {
    pub fn spawn() -> Result<Self, RouteError> {
        let (sender, receiver) = mpsc::channel::<MainTask>();

        let handle = thread::Builder::new()
            .name("main-looper".to_string())
            .spawn(move || {
                // Exits once every sender is gone
                while let Ok(task) = receiver.recv() {
                    task();
                }
                debug!("Main looper exited");
            })
            .map_err(RouteError::WorkerSpawn)?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop accepting tasks, drain what is queued and join the thread
    pub fn quit(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }

        let handle = self.handle.lock().ok().and_then(|mut handle| handle.take());
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl MainThread for LooperThread {
    fn post(&self, task: MainTask) -> Result<(), DispatchError> {
        let sender = self.sender.lock().map_err(|_| DispatchError::LooperClosed)?;
        match sender.as_ref() {
            Some(sender) => sender.send(task).map_err(|_| DispatchError::LooperClosed),
            None => Err(DispatchError::LooperClosed),
        }
    }
}

impl Drop for LooperThread {
    fn drop(&mut self) {
        self.quit();
    }
}

/// Main thread that only runs tasks when asked to
#[derive(Default)]
pub struct ManualMainThread {
    queue: Mutex<VecDeque<MainTask>>,
    closed: Mutex<bool>,
}

impl ManualMainThread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued tasks, including any they post, until the queue is empty.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = match self.queue.lock() {
                Ok(mut queue) => queue.pop_front(),
                Err(_) => None,
            };
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    /// Refuse further posts, as a looper that has quit would
    pub fn close(&self) {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
    }
}

impl MainThread for ManualMainThread {
    fn post(&self, task: MainTask) -> Result<(), DispatchError> {
        if self.closed.lock().map(|closed| *closed).unwrap_or(true) {
            return Err(DispatchError::LooperClosed);
        }
        let mut queue = self.queue.lock().map_err(|_| DispatchError::LooperClosed)?;
        queue.push_back(task);
        Ok(())
    }
}

//! Background loading thread with a one-shot completion gate.

use std::{
    sync::mpsc::{Receiver, TryRecvError},
    thread::JoinHandle,
};

/// One-shot gate for the result of a background load.
///
/// Spawns a worker thread running the load closure and hands the result to the frame loop exactly once.
/// The gate is destroyed after the result is taken.
pub(crate) struct LoadGate<T> {
    /// Channel the worker pushes the single result into.
    receiver: Receiver<T>,
    /// Worker thread, joined when the result is taken.
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> LoadGate<T> {
    /// Spawn the worker thread running the load closure.
    ///
    /// # Panics
    ///
    /// - When the operating system refuses to spawn a thread.
    pub(crate) fn spawn(load: Box<dyn FnOnce() -> T + Send>) -> Self {
        let (sender, receiver) = std::sync::mpsc::sync_channel(1);

        let worker = std::thread::Builder::new()
            .name(String::from("plinth-load"))
            .spawn(move || {
                let result = load();

                // The receiver only disappears when the loop shuts down mid-load
                if sender.send(result).is_err() {
                    log::warn!("Background load finished after the frame loop shut down");
                }
            })
            .expect("Error spawning background load thread");

        Self {
            receiver,
            worker: Some(worker),
        }
    }

    /// Take the result when the worker finished, without blocking.
    pub(crate) fn poll(&mut self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(result) => {
                if let Some(worker) = self.worker.take() {
                    // The worker already sent its result, joining can't block for long
                    if worker.join().is_err() {
                        log::error!("Background load thread panicked after delivering");
                    }
                }

                Some(result)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::LoadGate;

    /// The result comes through exactly once.
    #[test]
    fn delivers_once() {
        let mut gate = LoadGate::spawn(Box::new(|| 42_u32));

        let deadline = Instant::now() + Duration::from_secs(5);
        let result = loop {
            if let Some(result) = gate.poll() {
                break result;
            }
            assert!(Instant::now() < deadline, "load never completed");
            std::thread::sleep(Duration::from_millis(1));
        };

        assert_eq!(result, 42);
        // Channel is drained, nothing left to deliver
        assert_eq!(gate.poll(), None);
    }

    /// Polling before the worker finishes yields nothing and doesn't block.
    #[test]
    fn poll_is_non_blocking() {
        let mut gate = LoadGate::spawn(Box::new(|| {
            std::thread::sleep(Duration::from_millis(100));
        }));

        let start = Instant::now();
        let early = gate.poll();
        assert!(start.elapsed() < Duration::from_millis(50));
        assert!(early.is_none());
    }
}

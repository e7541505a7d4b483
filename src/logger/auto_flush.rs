//! Background flush thread.

use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument};

use super::buffered::BufferedLogger;
use crate::error::{Error, Result};

/// Handle to a running auto-flush thread
#[derive(Debug)]
pub struct AutoFlushHandle {
    handle: JoinHandle<Result<usize>>,
}

impl AutoFlushHandle {
    /// Wait for the thread to exit.
    ///
    /// Returns the number of non-empty flushes it performed, or the sink error
    /// that stopped it.
    pub fn join(self) -> Result<usize> {
        self.handle
            .join()
            .map_err(|payload| Error::WorkerPanicked(panic_message(payload.as_ref())))?
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub(super) fn spawn(logger: Arc<BufferedLogger>, interval: Duration) -> Result<AutoFlushHandle> {
    let handle = thread::Builder::new()
        .name(logger.config().thread_name.clone())
        .spawn(move || run(&logger, interval))?;

    Ok(AutoFlushHandle { handle })
}

/// Clears the running flag even if a flush unwinds.
struct Running<'a>(&'a BufferedLogger);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.control.lock().running = false;
    }
}

#[instrument(skip(logger), fields(thread = %logger.config().thread_name))]
fn run(logger: &BufferedLogger, interval: Duration) -> Result<usize> {
    let _running = Running(logger);
    let mut flushes = 0;

    loop {
        let stopping = sleep_unless_stopped(logger, interval);

        match logger.flush() {
            Ok(0) => {}
            Ok(_) => flushes += 1,
            Err(e) => {
                error!(error = %e, "Auto-flush stopped by sink failure");
                return Err(e);
            }
        }

        if stopping {
            info!(flushes, "Auto-flush stopped");
            return Ok(flushes);
        }
    }
}

/// Sleep for `interval` or until stop is requested. Returns whether it was.
///
/// An interval too large to form a deadline sleeps until stop.
fn sleep_unless_stopped(logger: &BufferedLogger, interval: Duration) -> bool {
    let deadline = Instant::now().checked_add(interval);
    let mut control = logger.control.lock();

    while !control.stop_requested {
        match deadline {
            Some(deadline) => {
                if logger.wake.wait_until(&mut control, deadline).timed_out() {
                    break;
                }
            }
            None => logger.wake.wait(&mut control),
        }
    }

    if control.stop_requested {
        debug!("Auto-flush woke for stop");
    }
    control.stop_requested
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "auto-flush thread panicked".to_string()
    }
}

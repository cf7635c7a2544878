//! Cooperative interruption for long-running commands
//!
//! A command that loops (effects, watch mode) polls a [`CancellationFlag`]
//! until a watcher flips it. Two watchers exist: one waits for a line on
//! stdin, the other for a fixed duration. Nothing here stops the command by
//! force; a loop that never checks the flag runs forever.

use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::task::AbortHandle;
use tracing::debug;

use crate::error::LifxResult;

/// Default delay between two checks of the flag in a polling loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Prompt printed before the console watcher starts
pub const KEY_LISTENER_PROMPT: &str = "Press [ENTER] to stop";

#[derive(Debug, Default)]
struct FlagState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared stop signal for one command invocation
///
/// Monotonic: once set it stays set. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    state: Arc<FlagState>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is set
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel() is not missed
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Sets the flag and reports completion when the watcher ends, however it ends.
struct FireOnDrop {
    flag: CancellationFlag,
    done: Option<oneshot::Sender<()>>,
}

impl FireOnDrop {
    fn new(flag: CancellationFlag, done: oneshot::Sender<()>) -> Self {
        Self {
            flag,
            done: Some(done),
        }
    }
}

impl Drop for FireOnDrop {
    fn drop(&mut self) {
        self.flag.cancel();
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// Handle to a running watcher
///
/// Dropping the handle (or calling [`WatcherHandle::abandon`]) detaches the
/// watcher; it still fires on its own.
#[derive(Debug)]
pub struct WatcherHandle {
    done: oneshot::Receiver<()>,
    task: Option<AbortHandle>,
}

impl WatcherHandle {
    /// Wait until the watcher has fired
    pub async fn finished(self) {
        let _ = self.done.await;
    }

    /// Stop a timer early. Treated like natural expiry: the flag is set.
    pub fn interrupt(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn abandon(self) {}
}

/// Starts watchers against one flag and offers the polling helpers
#[derive(Debug, Clone)]
pub struct InterruptController {
    flag: CancellationFlag,
    poll_interval: Duration,
}

impl InterruptController {
    pub fn new(flag: CancellationFlag) -> Self {
        Self {
            flag,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn flag(&self) -> &CancellationFlag {
        &self.flag
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.flag.cancelled().await
    }

    /// Sleep for `duration` unless the flag is set first.
    ///
    /// Returns whether the flag is set.
    pub async fn sleep_unless_cancelled(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.flag.cancelled() => true,
            _ = tokio::time::sleep(duration) => self.flag.is_cancelled(),
        }
    }

    /// One poll-interval wait; see [`Self::sleep_unless_cancelled`]
    pub async fn tick(&self) -> bool {
        self.sleep_unless_cancelled(self.poll_interval).await
    }

    /// Print the stop prompt, then watch stdin
    pub fn start_key_listener(&self, out: &mut (dyn Write + Send)) -> LifxResult<WatcherHandle> {
        write_prompt(out)?;
        self.start_console_watcher()
    }

    /// Same as [`Self::start_key_listener`] with an injected reader
    pub fn start_key_listener_from<R>(&self, out: &mut (dyn Write + Send), reader: R) -> LifxResult<WatcherHandle>
    where
        R: BufRead + Send + 'static,
    {
        write_prompt(out)?;
        self.start_line_watcher(reader)
    }

    /// Watch stdin for a single line
    pub fn start_console_watcher(&self) -> LifxResult<WatcherHandle> {
        self.start_line_watcher(BufReader::new(std::io::stdin()))
    }

    /// Set the flag once one line (or EOF, or a read error) arrives on `reader`
    ///
    /// Runs on a dedicated thread: a blocking console read must not hold up
    /// the async runtime's shutdown.
    pub fn start_line_watcher<R>(&self, mut reader: R) -> LifxResult<WatcherHandle>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let flag = self.flag.clone();

        thread::Builder::new()
            .name("lifxctl-key-listener".to_string())
            .spawn(move || {
                let _fire = FireOnDrop::new(flag, tx);
                let mut line = String::new();
                if let Err(e) = reader.read_line(&mut line) {
                    debug!("Key listener read failed: {}", e);
                }
            })?;

        Ok(WatcherHandle { done: rx, task: None })
    }

    /// Set the flag after `duration`
    ///
    /// A zero duration sets the flag before returning. Any other duration
    /// needs a running tokio runtime.
    pub fn start_timer(&self, duration: Duration) -> WatcherHandle {
        let (tx, rx) = oneshot::channel();
        let fire = FireOnDrop::new(self.flag.clone(), tx);

        if duration.is_zero() {
            drop(fire);
            return WatcherHandle { done: rx, task: None };
        }

        let task = tokio::spawn(async move {
            let _fire = fire;
            tokio::time::sleep(duration).await;
            debug!("Timer watcher expired after {:?}", duration);
        });

        WatcherHandle {
            done: rx,
            task: Some(task.abort_handle()),
        }
    }
}

fn write_prompt(out: &mut (dyn Write + Send)) -> LifxResult<()> {
    writeln!(out, "{}", KEY_LISTENER_PROMPT)?;
    out.flush()?;
    Ok(())
}

//! Console progress animation
//!
//! A marker sweeps back and forth inside `<...>` while an operation is in
//! flight, prefixed by the elapsed seconds:
//!
//! ```text
//! 3s Fetching... <      =             >
//! ```
//!
//! Two tasks run per indicator. The render task owns the writer and
//! redraws one line every frame; the ticking task bumps the seconds
//! counter once per second. Both watch one [`CancellationToken`].
//!
//! [`ProgressIndicator::stop`] cancels, then waits until the render task
//! sends the writer back over a oneshot channel. The render task only
//! sends after leaving its loop, so once `stop` returns no frame can be
//! written any more and the caller owns the line again. The ticking task
//! is not joined.

use crate::config::ProgressConfig;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const MARKER: char = '=';
/// Columns always blanked when the line is cleared.
const MIN_CLEAR_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Idle,
    Running,
    StopRequested,
    Stopped,
}

/// Position of the marker in frame `frame` on a track `width` cells wide.
///
/// The marker runs 0, 1, .., width-1 and back down to 1, then repeats.
#[must_use]
pub fn marker_position(frame: u64, width: usize) -> usize {
    let width = u64::try_from(width).unwrap_or(u64::MAX);
    if width <= 1 {
        return 0;
    }
    let period = 2 * (width - 1);
    let step = frame % period;
    let position = if step < width { step } else { period - step };
    usize::try_from(position).unwrap_or(0)
}

/// One frame, starting with a carriage return so it overwrites the last.
#[must_use]
pub fn render_frame(label: &str, seconds: u64, position: usize, width: usize) -> String {
    let width = width.max(1);
    let position = position.min(width - 1);
    format!(
        "\r{seconds}s {label}<{}{MARKER}{}>",
        " ".repeat(position),
        " ".repeat(width - 1 - position)
    )
}

/// Background progress line bound to one writer.
///
/// Owned by the caller that created it; not meant to be shared between
/// concurrent operations. `start` must run inside a Tokio runtime.
pub struct ProgressIndicator<W: Write + Send + 'static = io::Stdout> {
    label: String,
    config: ProgressConfig,
    state: ProgressState,
    /// Present whenever no render task holds it.
    writer: Option<W>,
    seconds: Arc<AtomicU64>,
    cancel: CancellationToken,
    done: Option<oneshot::Receiver<W>>,
}

impl ProgressIndicator<io::Stdout> {
    /// An indicator drawing on standard output.
    #[must_use]
    pub fn stdout(label: impl Into<String>, config: ProgressConfig) -> Self {
        Self::new(io::stdout(), label, config)
    }
}

impl<W: Write + Send + 'static> ProgressIndicator<W> {
    #[must_use]
    pub fn new(writer: W, label: impl Into<String>, config: ProgressConfig) -> Self {
        Self {
            label: label.into(),
            config,
            state: ProgressState::Idle,
            writer: Some(writer),
            seconds: Arc::new(AtomicU64::new(1)),
            cancel: CancellationToken::new(),
            done: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ProgressState {
        self.state
    }

    /// Begin animating. Does nothing while already running.
    pub fn start(&mut self) {
        if self.state == ProgressState::Running {
            return;
        }
        let Some(writer) = self.writer.take() else {
            return;
        };

        self.cancel = CancellationToken::new();
        self.seconds = Arc::new(AtomicU64::new(1));
        let (done_tx, done_rx) = oneshot::channel();
        self.done = Some(done_rx);

        tokio::spawn(tick_seconds(Arc::clone(&self.seconds), self.cancel.clone()));
        tokio::spawn(render(
            writer,
            self.label.clone(),
            self.config,
            Arc::clone(&self.seconds),
            self.cancel.clone(),
            done_tx,
        ));

        self.state = ProgressState::Running;
        debug!("Progress started: {}", self.label.trim());
    }

    /// Stop animating and clear the line.
    ///
    /// Returns only after the render task has left its loop and handed the
    /// writer back. Calling it when not running does nothing.
    pub async fn stop(&mut self) {
        if self.state != ProgressState::Running {
            return;
        }

        self.state = ProgressState::StopRequested;
        self.cancel.cancel();

        if let Some(done) = self.done.take() {
            // An Err means the render task died; its writer went with it.
            if let Ok(mut writer) = done.await {
                let _ = clear_line(&mut writer, self.clear_width());
                self.writer = Some(writer);
            }
        }

        self.state = ProgressState::Stopped;
        debug!("Progress stopped: {}", self.label.trim());
    }

    fn clear_width(&self) -> usize {
        let seconds = self.seconds.load(Ordering::Relaxed);
        let widest = render_frame(&self.label, seconds, 0, self.config.track_width)
            .chars()
            .count();
        widest.max(MIN_CLEAR_WIDTH)
    }
}

impl<W: Write + Send + 'static> Drop for ProgressIndicator<W> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn render<W: Write>(
    mut writer: W,
    label: String,
    config: ProgressConfig,
    seconds: Arc<AtomicU64>,
    cancel: CancellationToken,
    done: oneshot::Sender<W>,
) {
    let period = config.frame_interval;
    let mut frames = interval_at(Instant::now() + period, period);
    frames.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frame: u64 = 0;

    // At least one frame is drawn, however soon `stop` is called.
    loop {
        let line = render_frame(
            &label,
            seconds.load(Ordering::Relaxed),
            marker_position(frame, config.track_width),
            config.track_width,
        );
        let _ = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush());
        frame = frame.wrapping_add(1);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = frames.tick() => {}
        }
    }

    // Receiver gone means the indicator was dropped; nobody to tell.
    let _ = done.send(writer);
}

async fn tick_seconds(seconds: Arc<AtomicU64>, cancel: CancellationToken) {
    let mut ticks = interval(Duration::from_secs(1));
    ticks.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticks.tick() => {
                seconds.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn clear_line<W: Write>(writer: &mut W, width: usize) -> io::Result<()> {
    write!(writer, "\r{}\r", " ".repeat(width))?;
    writer.flush()
}

//! Panel clock
//!
//! Minute-granularity clock in the panel's right-hand cell, redrawn from a
//! `timerfd` watched by the event loop.

use crate::dispatch::{Task, TaskSender};
use crate::shell::render::{Canvas, Color};
use crate::toolkit::SurfaceId;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::time::Duration;
use tessera_ipc::Rectangle;
use tokio::io::unix::AsyncFd;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Initial delay and period of the clock timer
pub const CLOCK_INTERVAL: Duration = Duration::from_secs(60);

const CLOCK_FORMAT: &str = "%a %b %d, %I:%M %p";

/// `TimerFd` exposed to tokio's reactor
struct ClockFd(TimerFd);

impl AsRawFd for ClockFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_fd().as_raw_fd()
    }
}

/// Periodic timer that queues a `ClockTick` for its panel.
///
/// The watcher task is aborted when the timer is dropped, which also closes
/// the timerfd.
pub struct ClockTimer {
    watcher: JoinHandle<()>,
}

impl ClockTimer {
    pub fn start(panel: SurfaceId, tasks: TaskSender) -> io::Result<Self> {
        Self::with_interval(panel, tasks, CLOCK_INTERVAL)
    }

    pub fn with_interval(panel: SurfaceId, tasks: TaskSender, interval: Duration) -> io::Result<Self> {
        let handle = Handle::try_current().map_err(io::Error::other)?;
        let timer = create_timerfd(interval)?;

        let _guard = handle.enter();
        let timer = AsyncFd::new(ClockFd(timer))?;

        let watcher = handle.spawn(async move {
            loop {
                let mut ready = match timer.readable().await {
                    Ok(ready) => ready,
                    Err(e) => {
                        error!("clock timer poll failed: {}", e);
                        return;
                    }
                };

                match ready.try_io(|fd| fd.get_ref().0.wait().map_err(io::Error::from)) {
                    Ok(Ok(())) => {
                        if !tasks.send(Task::ClockTick { panel }) {
                            return;
                        }
                    }
                    Ok(Err(e)) => {
                        error!("read from clock timer failed: {}", e);
                        std::process::abort();
                    }
                    // Spurious wakeup; readiness was cleared
                    Err(_) => continue,
                }
            }
        });

        debug!("Clock timer armed for {}", panel);
        Ok(Self { watcher })
    }
}

impl Drop for ClockTimer {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

fn create_timerfd(interval: Duration) -> io::Result<TimerFd> {
    let timer = TimerFd::new(
        ClockId::CLOCK_MONOTONIC,
        TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
    )?;
    let period = TimeSpec::from(interval);
    timer.set(
        Expiration::IntervalDelayed(period, period),
        TimerSetTimeFlags::empty(),
    )?;
    Ok(timer)
}

/// The clock cell on a panel
pub struct PanelClock {
    allocation: Rectangle,
    _timer: ClockTimer,
}

impl PanelClock {
    pub fn new(timer: ClockTimer) -> Self {
        Self {
            allocation: Rectangle::default(),
            _timer: timer,
        }
    }

    pub fn allocation(&self) -> Rectangle {
        self.allocation
    }

    pub fn set_allocation(&mut self, allocation: Rectangle) {
        self.allocation = allocation;
    }

    pub fn paint(&self, canvas: &mut Canvas) {
        if self.allocation.width == 0 {
            return;
        }
        let text = current_time_text();
        let baseline = self.allocation.y + 3 * (self.allocation.height >> 2);

        // Drop shadow, then the text
        canvas.draw_text(self.allocation.x + 5, baseline + 1, &text, Color::rgb(0.0, 0.0, 0.0));
        canvas.draw_text(self.allocation.x + 4, baseline, &text, Color::rgb(1.0, 1.0, 1.0));
    }
}

pub fn current_time_text() -> String {
    chrono::Local::now().format(CLOCK_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch;

    #[tokio::test]
    async fn test_timer_queues_ticks() {
        let (tasks, mut rx) = dispatch::task_channel();
        let panel = SurfaceId(3);
        let _timer = ClockTimer::with_interval(panel, tasks, Duration::from_millis(10)).unwrap();

        let task = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(task, Some(Task::ClockTick { panel }));
    }

    #[tokio::test]
    async fn test_dropping_timer_stops_ticks() {
        let (tasks, mut rx) = dispatch::task_channel();
        let timer = ClockTimer::with_interval(SurfaceId(1), tasks, Duration::from_millis(10)).unwrap();
        drop(timer);

        // The aborted watcher drops its sender, closing the channel
        let task = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(task, None);
    }

    #[test]
    fn test_no_runtime_means_no_timer() {
        let (tasks, _rx) = dispatch::task_channel();
        assert!(ClockTimer::start(SurfaceId(1), tasks).is_err());
    }

    #[test]
    fn test_time_text_shape() {
        let text = current_time_text();
        // "Mon Jan 01, 09:05 AM"
        assert_eq!(text.len(), 20);
        assert!(text.ends_with("AM") || text.ends_with("PM"));
    }
}

//! Periodic throughput line on the terminal.
//!
//! Prints `Speed: <n>/s Total: <n> Top: <n>/s` once per interval, padded to
//! the terminal width and ended with `\r` so each report overwrites the last.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;

use super::counters::CaptureCounters;
use crate::shutdown::flag::ShutdownFlag;

const FALLBACK_WIDTH: usize = 80;

pub struct ThroughputReporter {
    counters: Arc<CaptureCounters>,
    interval: Duration,
    top: u64,
}

impl ThroughputReporter {
    pub fn new(counters: Arc<CaptureCounters>, interval: Duration) -> Self {
        Self {
            counters,
            interval,
            top: 0,
        }
    }

    /// Closes the current window and returns the status line for it.
    pub fn tick(&mut self, width: usize) -> String {
        let speed = self.counters.take_window();
        self.top = self.top.max(speed);
        format_status(speed, self.counters.total(), self.top, width)
    }

    /// Reports on stdout every interval until `stopping` is triggered or the
    /// task is aborted.
    pub fn spawn(mut self, stopping: ShutdownFlag) -> JoinHandle<()> {
        tokio::spawn(async move {
            let width = terminal_width();
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = stopping.stopped() => break,
                    _ = ticker.tick() => {
                        let line = self.tick(width);
                        let mut stdout = io::stdout().lock();
                        let _ = write!(stdout, "{}\r", line);
                        let _ = stdout.flush();
                    }
                }
            }
            debug!("throughput reporter stopped, top {}/s", self.top);
        })
    }
}

pub fn format_status(speed: u64, total: u64, top: u64, width: usize) -> String {
    let line = format!("Speed: {}/s Total: {} Top: {}/s", speed, total, top);
    format!("{:<width$}", line, width = width)
}

/// Width of the terminal on stdout, or 80 when stdout is not a terminal.
pub fn terminal_width() -> usize {
    let mut size: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut size) };
    if rc == -1 || size.ws_col == 0 {
        FALLBACK_WIDTH
    } else {
        size.ws_col as usize
    }
}

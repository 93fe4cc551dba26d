//! Aggregates per-file download progress for display. The contract
//! (`start`/`stop`, a scoped status handle with `set_filename`/
//! `set_filesize`/`add_progress`) is fixed by the engine; rendering is a
//! cosmetic concern layered on top with `indicatif`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;

const SPEED_WINDOW_SAMPLES: usize = 10;
const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct StatusRecord {
    filename: String,
    size: Option<u64>,
    downloaded: u64,
}

struct Entry {
    record: Mutex<StatusRecord>,
    bar: Option<ProgressBar>,
}

#[derive(Default)]
struct Shared {
    active: Mutex<Vec<Arc<Entry>>>,
    done: Mutex<Vec<Arc<Entry>>>,
}

/// The contract the download engine drives a monitor through.
#[async_trait]
pub trait Monitor: Send + Sync {
    async fn start(&self) {}
    async fn stop(&self) {}
    fn status(&self) -> StatusHandle;
}

/// A scoped handle for one in-flight file. Dropping it moves the record
/// from the monitor's active list to its done list.
pub struct StatusHandle {
    entry: Arc<Entry>,
    shared: Arc<Shared>,
}

impl StatusHandle {
    pub fn set_filename(&self, name: impl Into<String>) {
        let name = name.into();
        if let Some(bar) = &self.entry.bar {
            bar.set_message(name.clone());
        }
        self.entry.record.lock().unwrap().filename = name;
    }

    pub fn set_filesize(&self, size: u64) {
        if let Some(bar) = &self.entry.bar {
            bar.set_length(size);
        }
        self.entry.record.lock().unwrap().size = Some(size);
    }

    pub fn add_progress(&self, bytes: u64) {
        if let Some(bar) = &self.entry.bar {
            bar.inc(bytes);
        }
        self.entry.record.lock().unwrap().downloaded += bytes;
    }
}

impl Drop for StatusHandle {
    fn drop(&mut self) {
        if let Some(bar) = &self.entry.bar {
            bar.finish_and_clear();
        }
        let mut active = self.shared.active.lock().unwrap();
        if let Some(pos) = active.iter().position(|e| Arc::ptr_eq(e, &self.entry)) {
            let entry = active.remove(pos);
            self.shared.done.lock().unwrap().push(entry);
        }
    }
}

/// Renders a one-line summary plus two lines per in-flight file, updated on
/// a 1 Hz tick, with a rolling 10-sample throughput window.
pub struct StatusMonitor {
    shared: Arc<Shared>,
    multi: MultiProgress,
    summary: ProgressBar,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl StatusMonitor {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let summary = multi.add(ProgressBar::new_spinner());
        summary.set_style(ProgressStyle::with_template("{msg}").unwrap());

        Self {
            shared: Arc::new(Shared::default()),
            multi,
            summary,
            tick_task: Mutex::new(None),
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg}\n{bar:40.cyan/blue} {bytes}/{total_bytes}")
            .unwrap()
            .progress_chars("█░ ")
    }
}

impl Default for StatusMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Monitor for StatusMonitor {
    async fn start(&self) {
        let shared = self.shared.clone();
        let summary = self.summary.clone();
        let mut samples: VecDeque<u64> = VecDeque::with_capacity(SPEED_WINDOW_SAMPLES);
        let mut last_total: u64 = 0;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;

                let (active_count, active_bytes) = {
                    let active = shared.active.lock().unwrap();
                    let bytes: u64 = active
                        .iter()
                        .map(|e| e.record.lock().unwrap().downloaded)
                        .sum();
                    (active.len(), bytes)
                };
                let done_count = shared.done.lock().unwrap().len();
                let done_bytes: u64 = shared
                    .done
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|e| e.record.lock().unwrap().downloaded)
                    .sum();

                let total = active_bytes + done_bytes;
                let delta = total.saturating_sub(last_total);
                last_total = total;

                if samples.len() == SPEED_WINDOW_SAMPLES {
                    samples.pop_front();
                }
                samples.push_back(delta);
                let speed = samples.iter().sum::<u64>() / samples.len() as u64;

                summary.set_message(format!(
                    "{} files in progress | {} files done | {} total downloaded | {}/s",
                    active_count, done_count, total, speed
                ));
            }
        });

        *self.tick_task.lock().unwrap() = Some(handle);
    }

    async fn stop(&self) {
        if let Some(handle) = self.tick_task.lock().unwrap().take() {
            handle.abort();
        }
    }

    fn status(&self) -> StatusHandle {
        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(Self::bar_style());
        let entry = Arc::new(Entry {
            record: Mutex::new(StatusRecord::default()),
            bar: Some(bar),
        });
        self.shared.active.lock().unwrap().push(entry.clone());
        StatusHandle {
            entry,
            shared: self.shared.clone(),
        }
    }
}

/// Satisfies the monitor contract without rendering anything, for
/// non-interactive use (e.g. scripted or redirected-output runs).
pub struct NoopMonitor;

#[async_trait]
impl Monitor for NoopMonitor {
    fn status(&self) -> StatusHandle {
        let entry = Arc::new(Entry {
            record: Mutex::new(StatusRecord::default()),
            bar: None,
        });
        let shared = Arc::new(Shared::default());
        shared.active.lock().unwrap().push(entry.clone());
        StatusHandle { entry, shared }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_handle_tracks_progress() {
        let monitor = NoopMonitor;
        let handle = monitor.status();
        handle.set_filename("product.zip");
        handle.set_filesize(100);
        handle.add_progress(40);
        handle.add_progress(60);
        assert_eq!(handle.entry.record.lock().unwrap().downloaded, 100);
    }

    #[test]
    fn drop_moves_entry_from_active_to_done() {
        let monitor = StatusMonitor::new();
        {
            let handle = monitor.status();
            assert_eq!(monitor.shared.active.lock().unwrap().len(), 1);
            handle.set_filesize(10);
        }
        assert_eq!(monitor.shared.active.lock().unwrap().len(), 0);
        assert_eq!(monitor.shared.done.lock().unwrap().len(), 1);
    }
}

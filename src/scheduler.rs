use std::collections::{HashSet, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::EventName;
use crate::error::Gcmt3dError;
use crate::fetch::{FetchTask, Fetcher};
use crate::fs_util;
use crate::layout::WorkspacePaths;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::registry::{EventRegistry, PendingEvent, PendingIter};

/// Each event name is planned once. `max_count` (when positive) caps
/// readable events only; unreadable solutions pass through uncounted.
pub fn plan_downloads<'a, G: EventRegistry + ?Sized>(
    registry: &'a G,
    max_count: usize,
) -> Result<Plan<'a>, Gcmt3dError> {
    Ok(Plan {
        pending: registry.pending()?,
        seen: HashSet::new(),
        remaining: if max_count == 0 { usize::MAX } else { max_count },
    })
}

pub struct Plan<'a> {
    pending: PendingIter<'a>,
    seen: HashSet<EventName>,
    remaining: usize,
}

impl Iterator for Plan<'_> {
    type Item = Result<PendingEvent, Gcmt3dError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            match self.pending.next()? {
                Ok(pending) if !self.seen.insert(pending.event.clone()) => {
                    warn!(
                        event = %pending.event,
                        solution = %pending.solution,
                        "event already planned, skipping"
                    );
                }
                Ok(pending) => {
                    self.remaining -= 1;
                    return Some(Ok(pending));
                }
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSolution {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventOutcome {
    pub event: String,
    pub task: Option<String>,
    pub workspace: Option<Utf8PathBuf>,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl EventOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub outcomes: Vec<EventOutcome>,
    pub skipped: Vec<SkippedSolution>,
}

impl DownloadReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn first_error(&self) -> Option<&EventOutcome> {
        self.outcomes.iter().find(|outcome| !outcome.succeeded())
    }
}

pub struct DownloadScheduler<F: Fetcher> {
    fetcher: F,
    database: Utf8PathBuf,
    log_root: Utf8PathBuf,
    workers: usize,
}

impl<F: Fetcher> DownloadScheduler<F> {
    pub fn new(fetcher: F, database: impl Into<Utf8PathBuf>, log_root: impl Into<Utf8PathBuf>) -> Self {
        let workers = thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        // Fetch commands run inside the log directory, so relative roots would break.
        let database = database.into();
        let log_root = log_root.into();
        Self {
            fetcher,
            database: fs_util::absolute(&database).unwrap_or(database),
            log_root: fs_util::absolute(&log_root).unwrap_or(log_root),
            workers,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn task(&self, pending: PendingEvent) -> FetchTask {
        FetchTask {
            workspace: WorkspacePaths::resolve(&self.database, &pending.event),
            log_dir: self.log_root.join(pending.event.as_str()),
            event: pending.event,
            solution: pending.solution,
        }
    }

    pub fn run<I>(&self, planned: I, sink: &dyn ProgressSink) -> DownloadReport
    where
        I: IntoIterator<Item = Result<PendingEvent, Gcmt3dError>>,
    {
        let mut skipped = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        for item in planned {
            match item {
                Ok(pending) if !seen.insert(pending.event.clone()) => {
                    warn!(event = %pending.event, solution = %pending.solution, "duplicate event, skipping");
                    skipped.push(SkippedSolution {
                        source: pending.solution.to_string(),
                        reason: format!("event {} is already scheduled", pending.event),
                    });
                }
                Ok(pending) => queue.push_back((queue.len(), self.task(pending))),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable solution");
                    skipped.push(unresolved(&err));
                }
            }
        }
        let mut slots: Vec<Option<EventOutcome>> = vec![None; queue.len()];

        let workers = self.workers.min(queue.len());
        info!(tasks = queue.len(), workers, "dispatching downloads");
        let queue = Mutex::new(queue);
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    while let Some((slot, task)) = next_task(queue) {
                        let outcome = self.execute(&task, sink);
                        if tx.send((slot, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);
            for (slot, outcome) in rx {
                slots[slot] = Some(outcome);
            }
        });

        let report = DownloadReport {
            outcomes: slots.into_iter().flatten().collect(),
            skipped,
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped.len(),
            "downloads finished"
        );
        report
    }

    fn execute(&self, task: &FetchTask, sink: &dyn ProgressSink) -> EventOutcome {
        let start = Instant::now();
        let name = task.name();
        sink.event(ProgressEvent {
            event: task.event.to_string(),
            message: format!("starting {name}"),
            elapsed: None,
        });

        let result = task.workspace.create_all().and_then(|()| {
            debug!(event = %task.event, root = %task.workspace.root, "workspace ready");
            catch_unwind(AssertUnwindSafe(|| self.fetcher.fetch(task))).unwrap_or_else(|_| {
                Err(Gcmt3dError::Fetch {
                    event: task.event.to_string(),
                    message: "fetch task panicked".to_string(),
                })
            })
        });
        let elapsed = start.elapsed();

        let message = match &result {
            Ok(()) => format!("finished {name}"),
            Err(err) => {
                warn!(event = %task.event, error = %err, "download failed");
                format!("failed {name}: {err}")
            }
        };
        sink.event(ProgressEvent {
            event: task.event.to_string(),
            message,
            elapsed: Some(elapsed),
        });

        EventOutcome {
            event: task.event.to_string(),
            task: Some(name),
            workspace: Some(task.workspace.root.clone()),
            elapsed_ms: millis(elapsed),
            error: result.err().map(|err| err.to_string()),
        }
    }
}

fn next_task(queue: &Mutex<VecDeque<(usize, FetchTask)>>) -> Option<(usize, FetchTask)> {
    queue
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .pop_front()
}

fn unresolved(err: &Gcmt3dError) -> SkippedSolution {
    let source = match err {
        Gcmt3dError::SolutionParse { path, .. } => path.to_string(),
        _ => "unresolved".to_string(),
    };
    SkippedSolution {
        source,
        reason: err.to_string(),
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

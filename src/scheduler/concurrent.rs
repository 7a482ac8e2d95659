//! Worker pool over a shared node environment
//!
//! Particles themselves travel through the work queue, so a particle is
//! owned by at most one worker at a time and its activations are strictly
//! serialized. Activations of different particles only wait on each other
//! when their regions share a node (see `SharedEnvironment`). Workers claim a ticket from a shared counter before taking a
//! particle; once the budget is spent they exit, the scheduler joins them
//! and finally sends `TrackerMessage::Stop` to the single consumer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::compression::StepReport;
use crate::core::error::{Result, SimError};
use crate::graph::NodeEnvironment;
use crate::particle::{Activation, Particle};
use crate::scheduler::lock::HoldRecorder;
use crate::scheduler::shared::SharedEnvironment;
use crate::scheduler::{RunCounters, SchedulerSettings};
use crate::tracker::{ActivationRecord, StateTracker, TrackerMessage};

type WorkQueue = Arc<Mutex<mpsc::UnboundedReceiver<Particle>>>;

/// Everything handed back once the pool has drained
pub struct ConcurrentRun<T> {
    pub environment: NodeEnvironment,
    /// Sorted by particle id
    pub particles: Vec<Particle>,
    pub counters: RunCounters,
    pub tracker: T,
}

struct Shared {
    environment: SharedEnvironment,
    tickets: AtomicU64,
    abort: AtomicBool,
    settings: SchedulerSettings,
}

/// Run `settings.activation_budget` turns on `settings.workers` workers
///
/// Builds its own multi-thread runtime and blocks until the consumer has
/// stopped.
pub fn run_concurrent<T: StateTracker + 'static>(
    environment: NodeEnvironment,
    particles: Vec<Particle>,
    settings: &SchedulerSettings,
    tracker: T,
    recorder: Option<Arc<HoldRecorder>>,
) -> Result<ConcurrentRun<T>> {
    if settings.workers == 0 {
        return Err(SimError::InvalidParameter("concurrent mode needs at least one worker".into()));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.workers)
        .thread_name("amoebot-worker")
        .enable_all()
        .build()?;

    runtime.block_on(drive(environment, particles, *settings, tracker, recorder))
}

async fn drive<T: StateTracker + 'static>(
    environment: NodeEnvironment,
    particles: Vec<Particle>,
    settings: SchedulerSettings,
    tracker: T,
    recorder: Option<Arc<HoldRecorder>>,
) -> Result<ConcurrentRun<T>> {
    info!(
        workers = settings.workers,
        particles = particles.len(),
        budget = settings.activation_budget,
        "Starting concurrent run"
    );

    // Nothing to hand out: skip the pool so no worker waits on an empty queue
    let budget = if particles.is_empty() { 0 } else { settings.activation_budget };
    let shared = Arc::new(Shared {
        environment: SharedEnvironment::new(environment, recorder),
        tickets: AtomicU64::new(0),
        abort: AtomicBool::new(false),
        settings: SchedulerSettings {
            activation_budget: budget,
            ..settings
        },
    });

    let (work_tx, work_rx) = mpsc::unbounded_channel::<Particle>();
    for particle in particles {
        work_tx
            .send(particle)
            .map_err(|_| SimError::Worker("work queue closed before start".into()))?;
    }
    let work_rx: WorkQueue = Arc::new(Mutex::new(work_rx));

    let (out_tx, out_rx) = mpsc::unbounded_channel::<TrackerMessage>();
    let consumer = tokio::task::spawn_blocking(move || consume(out_rx, tracker));

    let handles: Vec<_> = (0..settings.workers)
        .map(|worker| {
            tokio::spawn(work(
                worker,
                Arc::clone(&shared),
                Arc::clone(&work_rx),
                work_tx.clone(),
                out_tx.clone(),
            ))
        })
        .collect();

    let mut counters = RunCounters::default();
    let mut first_error = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(tally)) => counters.merge(&tally),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(SimError::Worker(e.to_string()));
            }
        }
    }

    out_tx
        .send(TrackerMessage::Stop)
        .map_err(|_| SimError::Worker("tracker consumer exited early".into()))?;
    let tracker = consumer
        .await
        .map_err(|e| SimError::Worker(e.to_string()))??;

    if let Some(e) = first_error {
        warn!(error = %e, "Concurrent run aborted");
        return Err(e);
    }

    drop(work_tx);
    let mut particles = Vec::new();
    {
        let mut rx = work_rx.lock().await;
        rx.close();
        while let Ok(particle) = rx.try_recv() {
            particles.push(particle);
        }
    }
    particles.sort_by_key(|p| p.id());

    let shared = Arc::try_unwrap(shared)
        .map_err(|_| SimError::Worker("node environment still shared after join".into()))?;
    let environment = shared.environment.into_inner()?;

    info!(turns = counters.turns, accepted = counters.accepted, "Concurrent run finished");
    Ok(ConcurrentRun {
        environment,
        particles,
        counters,
        tracker,
    })
}

async fn work(
    worker: usize,
    shared: Arc<Shared>,
    queue: WorkQueue,
    requeue: mpsc::UnboundedSender<Particle>,
    output: mpsc::UnboundedSender<TrackerMessage>,
) -> Result<RunCounters> {
    debug!(worker, "Worker started");
    let mut tally = RunCounters::default();

    loop {
        if shared.abort.load(Ordering::SeqCst) {
            break;
        }
        let turn = shared.tickets.fetch_add(1, Ordering::SeqCst);
        if turn >= shared.settings.activation_budget {
            break;
        }

        // Every claimed ticket is matched by a particle coming back
        let mut particle = {
            let mut rx = queue.lock().await;
            rx.recv().await
        }
        .ok_or_else(|| SimError::Worker("work queue closed".into()))?;

        let step = step_locked(&shared, &mut particle);

        // Report before handing the particle back so its records reach the
        // consumer in activation order
        let reported = match &step {
            Ok(report) => {
                tally.observe(report.outcome);
                let record = ActivationRecord::new(turn, particle.snapshot(), report.outcome);
                output
                    .send(TrackerMessage::Record(record))
                    .map_err(|_| SimError::Worker("tracker consumer exited early".into()))
            }
            Err(_) => Ok(()),
        };
        requeue
            .send(particle)
            .map_err(|_| SimError::Worker("work queue closed".into()))?;

        if let Err(e) = step {
            shared.abort.store(true, Ordering::SeqCst);
            return Err(e);
        }
        reported?;
    }

    debug!(worker, turns = tally.turns, "Worker stopped");
    Ok(tally)
}

/// One turn; the particle's region is held only while it acts
fn step_locked(shared: &Shared, particle: &mut Particle) -> Result<StepReport> {
    if particle.tick() == Activation::NotYet {
        return Ok(StepReport::idle());
    }
    shared
        .environment
        .activate(particle, shared.settings.algorithm, shared.settings.variant)
}

fn consume<T: StateTracker>(mut rx: mpsc::UnboundedReceiver<TrackerMessage>, mut tracker: T) -> Result<T> {
    let mut received = 0u64;
    while let Some(message) = rx.blocking_recv() {
        match message {
            TrackerMessage::Record(record) => {
                tracker.record(&record)?;
                received += 1;
            }
            TrackerMessage::Stop => break,
        }
    }
    tracker.finish()?;
    debug!(received, "Tracker consumer stopped");
    Ok(tracker)
}

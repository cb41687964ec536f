use crate::{
    errors::SlideError,
    scheme::{DiskHandle, SchemeKind, Table},
};
use partslide_relocate::{
    patch_start_lba, slide_partition, BlockCoordinates, Eta, SlideOperation,
};
use std::{
    io,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, Sender},
    },
    thread::{self, JoinHandle},
};
use table_codec::Mbr;

/// Set while a slide job is running anywhere in the process. A second job
/// is rejected rather than queued.
static SLIDE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// The planned relocation of one partition. The coordinates must match the
/// table snapshot the plan was derived from; the layout model is expected
/// to have already resolved collisions and disk bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidePlan {
    /// The table slot of the partition being moved.
    pub slot:      usize,
    /// First sector of the partition as currently recorded.
    pub old_start: u64,
    /// First sector past the end of the partition as currently recorded.
    pub old_end:   u64,
    /// The sector the partition's data is moving to.
    pub new_start: u64,
}

/// An event emitted by a running slide job.
///
/// Progress events carry strictly increasing percentages, and the
/// completion event is always the final event of a job.
#[derive(Debug)]
pub enum SlideEvent {
    Progress(i32),
    Eta(Eta),
    Complete(Result<Mbr, SlideError>),
}

/// Owns the right to start slide jobs.
pub struct Slider;

impl Default for Slider {
    fn default() -> Slider { Slider }
}

impl Slider {
    pub fn new() -> Slider { Slider }

    /// True while a job started from this process is still running.
    pub fn is_active(&self) -> bool { SLIDE_ACTIVE.load(Ordering::SeqCst) }

    /// Validates a planned slide against the table snapshot and starts the
    /// background job for it. The returned handle yields the job's event
    /// stream; the device is exclusively owned by the job until its
    /// completion event fires.
    ///
    /// Only the MBR scheme can be written back; planning a slide on a GPT
    /// table is rejected before any I/O. A second job is rejected with
    /// `SlideError::Busy` while one is active.
    pub fn start(
        &self,
        handle: &DiskHandle,
        table: &Table,
        plan: SlidePlan,
    ) -> Result<SlideJob, SlideError> {
        let snapshot = match table {
            Table::Mbr(mbr) => mbr.clone(),
            Table::Gpt { .. } => {
                return Err(SlideError::UnsupportedScheme { scheme: SchemeKind::Gpt });
            }
        };

        let record = snapshot
            .record(plan.slot)
            .ok_or(SlideError::SlotNotFound { slot: plan.slot })?;
        if u64::from(record.start_lba) != plan.old_start || record.end_lba() != plan.old_end {
            return Err(SlideError::StalePlan { slot: plan.slot });
        }

        let size = plan.old_end - plan.old_start;
        if plan.new_start + size > handle.sectors || plan.new_start > u64::from(u32::max_value()) {
            return Err(SlideError::SpanOOB);
        }

        if SLIDE_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(SlideError::Busy);
        }

        info!(
            "starting slide of slot {} on {}: {} -> {}",
            plan.slot,
            handle.path.display(),
            plan.old_start,
            plan.new_start
        );

        let (tx, events) = std::sync::mpsc::channel();
        let path = handle.path.clone();
        let sector_size = handle.sector_size;

        let spawned = thread::Builder::new().name("partslide-worker".into()).spawn(move || {
            let result = run_job(&path, sector_size, plan, &snapshot, &tx);
            let _ = tx.send(SlideEvent::Complete(result));
            SLIDE_ACTIVE.store(false, Ordering::SeqCst);
        });

        match spawned {
            Ok(worker) => Ok(SlideJob { events, worker: Some(worker) }),
            Err(why) => {
                SLIDE_ACTIVE.store(false, Ordering::SeqCst);
                Err(SlideError::IO { why })
            }
        }
    }
}

/// A handle on a running slide job.
pub struct SlideJob {
    events: Receiver<SlideEvent>,
    worker: Option<JoinHandle<()>>,
}

impl SlideJob {
    /// The raw event stream of the job, for callers which integrate it into
    /// their own loop.
    pub fn events(&self) -> &Receiver<SlideEvent> { &self.events }

    /// Drains the event stream into the given callbacks until the job
    /// completes, returning the patched table on success.
    pub fn drive<P, E>(mut self, mut on_progress: P, mut on_eta: E) -> Result<Mbr, SlideError>
    where
        P: FnMut(i32),
        E: FnMut(&Eta),
    {
        let result = loop {
            match self.events.recv() {
                Ok(SlideEvent::Progress(percent)) => on_progress(percent),
                Ok(SlideEvent::Eta(eta)) => on_eta(&eta),
                Ok(SlideEvent::Complete(result)) => break result,
                Err(_) => {
                    break Err(SlideError::IO {
                        why: io::Error::new(
                            io::ErrorKind::BrokenPipe,
                            "slide worker exited without completing",
                        ),
                    });
                }
            }
        };

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        result
    }

    /// Waits for completion, discarding progress along the way.
    pub fn wait(self) -> Result<Mbr, SlideError> { self.drive(|_| (), |_| ()) }
}

fn run_job(
    path: &Path,
    sector_size: u64,
    plan: SlidePlan,
    snapshot: &Mbr,
    tx: &Sender<SlideEvent>,
) -> Result<Mbr, SlideError> {
    if plan.old_start == plan.new_start {
        info!("slot {} has no displacement; leaving the disk untouched", plan.slot);
        return Ok(snapshot.clone());
    }

    let operation = SlideOperation::new(
        sector_size,
        BlockCoordinates::new(plan.old_start, plan.old_end),
        plan.new_start,
    );

    let mut last_percent = -1;
    slide_partition(path, operation.offset(), sector_size, |report| {
        if report.percent > last_percent {
            last_percent = report.percent;
            let _ = tx.send(SlideEvent::Progress(report.percent));
        }
        let _ = tx.send(SlideEvent::Eta(report.eta));
    })?;

    let patched = patch_start_lba(path, snapshot, plan.slot, plan.new_start as u32)?;
    info!("slide of slot {} completed", plan.slot);
    Ok(patched)
}

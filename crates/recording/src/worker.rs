use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use render_protocol::Extent;

use crate::gate::ExportIndex;
use crate::writer::{FrameWriter, WriteError};

pub const DEFAULT_EXPORT_QUEUE_CAPACITY: usize = 4;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct ExportJob {
    pub index: ExportIndex,
    pub extent: Extent,
    pub pixels: Vec<[f32; 4]>,
}

#[derive(Debug)]
pub struct ExportResult {
    pub index: ExportIndex,
    pub outcome: Result<PathBuf, WriteError>,
}

/// Cloneable handle for queueing jobs from any thread, including GPU
/// completion callbacks. Never blocks: a job that cannot be queued is
/// reported back as a failed result instead.
#[derive(Debug, Clone)]
pub struct ExportSender {
    jobs: Sender<ExportJob>,
    results: Sender<ExportResult>,
}

impl ExportSender {
    pub fn send(&self, job: ExportJob) {
        let index = job.index;
        let error = match self.jobs.try_send(job) {
            Ok(()) => return,
            Err(TrySendError::Full(_)) => WriteError::QueueFull { index: index.0 },
            Err(TrySendError::Disconnected(_)) => WriteError::WorkerStopped { index: index.0 },
        };
        self.fail(index, error);
    }

    pub fn fail(&self, index: ExportIndex, error: WriteError) {
        // The render side owns the result receiver for as long as exports matter.
        let _ = self.results.send(ExportResult {
            index,
            outcome: Err(error),
        });
    }
}

/// Dedicated thread that runs a [`FrameWriter`] off the render thread.
pub struct ExportWorker {
    sender: ExportSender,
    results: Receiver<ExportResult>,
    stop_requested: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl ExportWorker {
    pub fn spawn(
        writer: Box<dyn FrameWriter>,
        output_dir: PathBuf,
        queue_capacity: usize,
    ) -> std::io::Result<Self> {
        let (job_sender, job_receiver) = crossbeam_channel::bounded(queue_capacity.max(1));
        let (result_sender, result_receiver) = crossbeam_channel::unbounded();
        let stop_requested = Arc::new(AtomicBool::new(false));
        let worker_stop_requested = Arc::clone(&stop_requested);
        let worker_results = result_sender.clone();

        let join_handle = std::thread::Builder::new()
            .name("frame_export".to_owned())
            .spawn(move || {
                export_loop(
                    writer,
                    output_dir,
                    worker_stop_requested,
                    job_receiver,
                    worker_results,
                )
            })?;

        Ok(Self {
            sender: ExportSender {
                jobs: job_sender,
                results: result_sender,
            },
            results: result_receiver,
            stop_requested,
            join_handle: Some(join_handle),
        })
    }

    pub fn sender(&self) -> ExportSender {
        self.sender.clone()
    }

    pub fn drain_results(&self) -> Vec<ExportResult> {
        self.results.try_iter().collect()
    }

    /// Blocks until one result arrives or `timeout` passes.
    pub fn wait_result(&self, timeout: Duration) -> Option<ExportResult> {
        self.results.recv_timeout(timeout).ok()
    }
}

impl Drop for ExportWorker {
    fn drop(&mut self) {
        self.stop_requested.store(true, Ordering::Release);
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                tracing::error!("frame export thread panicked");
            }
        }
    }
}

fn export_loop(
    mut writer: Box<dyn FrameWriter>,
    output_dir: PathBuf,
    stop_requested: Arc<AtomicBool>,
    jobs: Receiver<ExportJob>,
    results: Sender<ExportResult>,
) {
    loop {
        match jobs.recv_timeout(STOP_POLL_INTERVAL) {
            Ok(job) => write_job(writer.as_mut(), &output_dir, job, &results),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if stop_requested.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        }
    }
    for job in jobs.try_iter() {
        write_job(writer.as_mut(), &output_dir, job, &results);
    }
}

fn write_job(
    writer: &mut dyn FrameWriter,
    output_dir: &std::path::Path,
    job: ExportJob,
    results: &Sender<ExportResult>,
) {
    let outcome = writer.write_frame(output_dir, job.index.0, &job.pixels, job.extent);
    match &outcome {
        Ok(path) => tracing::debug!(index = job.index.0, path = %path.display(), "frame exported"),
        Err(error) => tracing::warn!(index = job.index.0, %error, "frame export failed"),
    }
    let _ = results.send(ExportResult {
        index: job.index,
        outcome,
    });
}

//! Dedicated classification thread.
//!
//! The worker shares no state with its owner: requests carry owned image
//! buffers in, responses carry fresh results out. A failure, including a
//! panic inside the analysis, is reported as [`WorkerResponse::Error`] and
//! the worker keeps serving.

use crate::analysis::{analyze_image, AnalysisResult};
use crate::image::ImageData;
use crate::protocol::{WorkerRequest, WorkerResponse};
use crate::rules::AnalysisConfig;
use crate::ClassifyError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tacmap_metrics::metric_defs;
use tracing::{debug, warn};

/// Handle to a running classification worker.
///
/// Dropping the handle asks the worker to stop and joins it.
pub struct ClassificationWorker {
    request_tx: Sender<WorkerRequest>,
    response_rx: Receiver<WorkerResponse>,
    thread: Option<JoinHandle<()>>,
}

impl ClassificationWorker {
    /// Start the worker and wait for its ready message.
    pub fn spawn() -> Result<Self, ClassifyError> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let (response_tx, response_rx) = crossbeam_channel::unbounded();

        let thread = thread::Builder::new()
            .name("classify-worker".to_string())
            .spawn(move || worker_main(request_rx, response_tx))?;

        let worker = Self {
            request_tx,
            response_rx,
            thread: Some(thread),
        };
        match worker.recv()? {
            WorkerResponse::WorkerReady => Ok(worker),
            other => Err(ClassifyError::Worker(format!(
                "expected ready message, got {other:?}"
            ))),
        }
    }

    /// Send a raw request.
    pub fn send(&self, request: WorkerRequest) -> Result<(), ClassifyError> {
        self.request_tx
            .send(request)
            .map_err(|_| ClassifyError::Disconnected)
    }

    /// Queue an image for classification without waiting.
    pub fn submit(&self, image: ImageData, config: AnalysisConfig) -> Result<(), ClassifyError> {
        self.send(WorkerRequest::AnalyzeImage {
            image_data: image,
            config,
        })
    }

    /// Block until the next response.
    pub fn recv(&self) -> Result<WorkerResponse, ClassifyError> {
        self.response_rx
            .recv()
            .map_err(|_| ClassifyError::Disconnected)
    }

    /// Wait up to `timeout` for the next response; `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<WorkerResponse>, ClassifyError> {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => Ok(Some(response)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ClassifyError::Disconnected),
        }
    }

    /// Classify an image and wait for the result.
    ///
    /// Responses to earlier [`submit`](Self::submit) calls must have been
    /// received first, or they will be returned here instead.
    pub fn analyze(&self, image: ImageData, config: AnalysisConfig) -> Result<AnalysisResult, ClassifyError> {
        self.submit(image, config)?;
        loop {
            match self.recv()? {
                WorkerResponse::AnalyzeComplete(result) => return Ok(*result),
                WorkerResponse::Error { message } => return Err(ClassifyError::Worker(message)),
                WorkerResponse::WorkerReady => continue,
            }
        }
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) -> Result<(), ClassifyError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), ClassifyError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // The worker may already be gone; joining is what matters.
        let _ = self.request_tx.send(WorkerRequest::Shutdown);
        thread
            .join()
            .map_err(|payload| ClassifyError::Worker(panic_message(payload.as_ref())))
    }
}

impl Drop for ClassificationWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "classification worker did not stop cleanly");
        }
    }
}

fn worker_main(requests: Receiver<WorkerRequest>, responses: Sender<WorkerResponse>) {
    if responses.send(WorkerResponse::WorkerReady).is_err() {
        return;
    }

    while let Ok(request) = requests.recv() {
        let (image, config) = match request {
            WorkerRequest::AnalyzeImage { image_data, config } => (image_data, config),
            WorkerRequest::Shutdown => break,
        };

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| analyze_image(&image, &config)));
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let response = match outcome {
            Ok(Ok(result)) => {
                metrics::counter!(metric_defs::CLASSIFY_RUNS.name).increment(1);
                metrics::histogram!(metric_defs::CLASSIFY_DURATION.name).record(elapsed_ms);
                debug!(
                    width = image.width,
                    height = image.height,
                    stride = config.stride,
                    classified = result.stats.classified,
                    elapsed_ms,
                    "classified image"
                );
                WorkerResponse::AnalyzeComplete(Box::new(result))
            }
            Ok(Err(e)) => {
                metrics::counter!(metric_defs::CLASSIFY_ERRORS.name).increment(1);
                warn!(error = %e, "classification failed");
                WorkerResponse::Error {
                    message: e.to_string(),
                }
            }
            Err(payload) => {
                metrics::counter!(metric_defs::CLASSIFY_ERRORS.name).increment(1);
                let message = panic_message(payload.as_ref());
                warn!(error = %message, "classification panicked");
                WorkerResponse::Error { message }
            }
        };

        if responses.send(response).is_err() {
            break;
        }
    }

    debug!("classification worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("analysis panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("analysis panicked: {s}")
    } else {
        "analysis panicked".to_string()
    }
}

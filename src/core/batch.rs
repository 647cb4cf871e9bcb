//! Batch runner - one detection job per video, videos in parallel

use crate::core::pipeline::{
    DetectionJob, DetectionObserver, DetectionPipeline, JobOutcome, OcrEngine, RecordSink, SinkError,
};
use log::{info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Batch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed_frames: u64,
    pub recorded: u64,
    pub discarded_frames: u64,
}

/// Outcome of one job inside a batch.
#[derive(Debug)]
pub struct JobReport {
    pub outcome: JobOutcome,
    /// Set when the sink rejected a record; the rest of the batch still runs.
    pub sink_error: Option<SinkError>,
}

pub struct BatchRunner {
    pipeline: Arc<DetectionPipeline>,
    pool: Option<ThreadPool>,
    cancel: Arc<AtomicBool>,
    frame_count: Arc<Mutex<u64>>,
    recorded_count: Arc<Mutex<u64>>,
    discarded_count: Arc<Mutex<u64>>,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<DetectionPipeline>) -> Self {
        Self::with_threads(pipeline, num_cpus::get())
    }

    /// Falls back to sequential execution when the pool cannot be built.
    pub fn with_threads(pipeline: Arc<DetectionPipeline>, threads: usize) -> Self {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("chyron-worker-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("⚠️ BatchRunner: thread pool unavailable ({}), running sequentially", e);
                None
            }
        };

        Self {
            pipeline,
            pool,
            cancel: Arc::new(AtomicBool::new(false)),
            frame_count: Arc::new(Mutex::new(0)),
            recorded_count: Arc::new(Mutex::new(0)),
            discarded_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Shared flag; raising it stops every job at its next screenshot.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn get_stats(&self) -> BatchStats {
        let read = |counter: &Arc<Mutex<u64>>| counter.lock().map(|c| *c).unwrap_or(0);
        BatchStats {
            processed_frames: read(&self.frame_count),
            recorded: read(&self.recorded_count),
            discarded_frames: read(&self.discarded_count),
        }
    }

    pub fn reset(&self) {
        for counter in [&self.frame_count, &self.recorded_count, &self.discarded_count] {
            if let Ok(mut count) = counter.lock() {
                *count = 0;
            }
        }
        self.cancel.store(false, Ordering::SeqCst);
    }

    /// Runs every job and appends its records to `sink`, in job order per video.
    pub fn run(
        &self,
        jobs: &[DetectionJob],
        ocr: &dyn OcrEngine,
        sink: &dyn RecordSink,
        observer: &dyn DetectionObserver,
    ) -> Vec<JobReport> {
        info!("📦 BatchRunner: {} jobs", jobs.len());

        let run_one = |job: &DetectionJob| self.run_job(job, ocr, sink, observer);
        let reports: Vec<JobReport> = match &self.pool {
            Some(pool) => pool.install(|| jobs.par_iter().map(run_one).collect()),
            None => jobs.iter().map(run_one).collect(),
        };

        if let Err(e) = sink.flush() {
            warn!("⚠️ BatchRunner: sink flush failed: {}", e);
        }

        let stats = self.get_stats();
        info!(
            "📦 BatchRunner: {} screenshots, {} records, {} discarded",
            stats.processed_frames, stats.recorded, stats.discarded_frames
        );
        reports
    }

    fn run_job(
        &self,
        job: &DetectionJob,
        ocr: &dyn OcrEngine,
        sink: &dyn RecordSink,
        observer: &dyn DetectionObserver,
    ) -> JobReport {
        let outcome = self.pipeline.process_job(job, ocr, observer, Some(&self.cancel));

        let mut sink_error = None;
        for record in &outcome.records {
            if let Err(e) = sink.append(record) {
                warn!("⚠️ file {}: sink rejected record: {}", job.file_id, e);
                sink_error = Some(e);
                break;
            }
        }

        if let Ok(mut count) = self.frame_count.lock() {
            *count += outcome.stats.frames as u64;
        }
        if let Ok(mut count) = self.recorded_count.lock() {
            *count += outcome.stats.records as u64;
        }
        if let Ok(mut count) = self.discarded_count.lock() {
            *count += outcome.stats.discarded_frames as u64;
        }

        JobReport { outcome, sink_error }
    }
}

//! SinkHandle - one sink behind its own bounded queue and worker task
//!
//! A full queue makes `send` wait, so a slow PNG encoder throttles the
//! renderers instead of losing frames. A failed write is counted and the
//! worker moves on to the next frame.

use std::sync::Arc;

use contracts::{FrameSink, RenderedFrame};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::{MetricsSnapshot, SinkMetrics};

pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<RenderedFrame>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Start the worker for `sink` with room for `queue_capacity` frames
    pub fn spawn<S: FrameSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            sink,
            rx,
            metrics: Arc::clone(&metrics),
        };
        Self {
            name,
            tx,
            metrics,
            worker: tokio::spawn(worker.run()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Queue a frame, waiting while the queue is full.
    ///
    /// False means the worker is gone; the frame is counted as dropped.
    pub async fn send(&self, frame: RenderedFrame) -> bool {
        let (kind, frame_index) = (frame.kind, frame.frame_index);
        if self.tx.send(frame).await.is_err() {
            self.metrics.record_dropped();
            error!(sink = %self.name, kind = kind.as_str(), frame_index, "Sink worker is gone");
            return false;
        }
        self.metrics
            .observe_queue_len(self.tx.max_capacity() - self.tx.capacity());
        true
    }

    /// Close the queue and wait until every queued frame is written
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> MetricsSnapshot {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "Sink worker panicked");
        }
        let snapshot = self.metrics.snapshot();
        debug!(
            sink = %self.name,
            overlay = snapshot.overlay_written,
            map = snapshot.map_written,
            failed = snapshot.failure_count,
            "Sink drained"
        );
        snapshot
    }
}

struct SinkWorker<S> {
    sink: S,
    rx: mpsc::Receiver<RenderedFrame>,
    metrics: Arc<SinkMetrics>,
}

impl<S: FrameSink> SinkWorker<S> {
    #[instrument(name = "sink_worker", skip(self), fields(sink = %self.sink.name()))]
    async fn run(mut self) {
        while let Some(frame) = self.rx.recv().await {
            self.metrics.observe_queue_len(self.rx.len());
            match self.sink.write(&frame).await {
                Ok(()) => self.metrics.record_write(frame.kind, frame.image.data.len()),
                Err(e) => {
                    self.metrics.record_failure();
                    warn!(
                        session = %frame.session_id,
                        kind = frame.kind.as_str(),
                        frame_index = frame.frame_index,
                        error = %e,
                        "Frame not written"
                    );
                }
            }
        }

        if let Err(e) = self.sink.flush().await {
            error!(error = %e, "Flush failed");
        }
        if let Err(e) = self.sink.close().await {
            error!(error = %e, "Close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_frame;
    use contracts::{ContractError, FrameKind};
    use tokio::time::{sleep, Duration};

    /// Fails every frame whose index is in `fail_on`
    struct FlakySink {
        fail_on: Vec<u64>,
        delay: Duration,
    }

    impl FrameSink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn write(&mut self, frame: &RenderedFrame) -> Result<(), ContractError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.fail_on.contains(&frame.frame_index) {
                return Err(ContractError::sink_write("flaky", "disk full"));
            }
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn flaky(fail_on: Vec<u64>, delay_ms: u64) -> FlakySink {
        FlakySink {
            fail_on,
            delay: Duration::from_millis(delay_ms),
        }
    }

    #[tokio::test]
    async fn test_counts_by_kind() {
        let handle = SinkHandle::spawn(flaky(vec![], 0), 10);
        for i in 0..5 {
            let mut frame = test_frame(i);
            if i >= 3 {
                frame.kind = FrameKind::Map;
            }
            assert!(handle.send(frame).await);
        }

        let snapshot = handle.shutdown().await;
        assert_eq!((snapshot.overlay_written, snapshot.map_written), (3, 2));
        // 4x2 RGBA test frames
        assert_eq!(snapshot.bytes_written, 5 * 32);
    }

    #[tokio::test]
    async fn test_slow_sink_applies_backpressure() {
        let handle = SinkHandle::spawn(flaky(vec![], 5), 2);
        for i in 0..10 {
            assert!(handle.send(test_frame(i)).await);
        }

        let snapshot = handle.shutdown().await;
        assert_eq!(snapshot.write_count, 10);
        assert_eq!(snapshot.dropped_count, 0);
        assert!(snapshot.peak_queue_len <= 2);
    }

    #[tokio::test]
    async fn test_failed_frame_does_not_stop_worker() {
        let handle = SinkHandle::spawn(flaky(vec![1], 0), 10);
        for i in 0..3 {
            handle.send(test_frame(i)).await;
        }

        let snapshot = handle.shutdown().await;
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.write_count, 2);
        assert!(!snapshot.is_clean());
    }
}

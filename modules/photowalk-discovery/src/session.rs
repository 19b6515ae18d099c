//! Composition root for one walk: a position stream feeding a pipeline.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

use photowalk_common::Position;

use crate::pipeline::{
    DiscoveryPipeline, PipelineConfig, PipelineHandle, ReportError, SessionStats,
    SnapshotSubscriber,
};
use crate::traits::PhotoSearcher;

pub struct DiscoverySession {
    session_id: Uuid,
    pipeline: PipelineHandle,
    pump: Option<JoinHandle<()>>,
}

/// How the pump hands positions to the pipeline queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Live provider: a full queue drops the report, the next fix supersedes it.
    DropWhenFull,
    /// Recorded walk: wait for room so every position is processed.
    Wait,
}

impl DiscoverySession {
    /// Start the pipeline worker and a task that forwards a live `positions`
    /// stream into it. The pump never waits on the pipeline: when its queue
    /// is full the report is dropped and the pump moves on.
    pub fn start<S>(positions: S, searcher: Arc<dyn PhotoSearcher>, config: PipelineConfig) -> Self
    where
        S: Stream<Item = Position> + Send + 'static,
    {
        Self::spawn(positions, searcher, config, Delivery::DropWhenFull)
    }

    /// Like [`DiscoverySession::start`], for finite recorded walks that can
    /// outrun the pipeline. The pump waits for queue room instead of dropping,
    /// so every position reaches the gate.
    pub fn replay<S>(positions: S, searcher: Arc<dyn PhotoSearcher>, config: PipelineConfig) -> Self
    where
        S: Stream<Item = Position> + Send + 'static,
    {
        Self::spawn(positions, searcher, config, Delivery::Wait)
    }

    fn spawn<S>(
        positions: S,
        searcher: Arc<dyn PhotoSearcher>,
        config: PipelineConfig,
        delivery: Delivery,
    ) -> Self
    where
        S: Stream<Item = Position> + Send + 'static,
    {
        let pipeline = DiscoveryPipeline::new(searcher, config);
        let session_id = pipeline.session_id();
        let pipeline = pipeline.spawn();
        let reporter = pipeline.reporter();

        let span = tracing::info_span!("position_pump", %session_id);
        let pump = tokio::spawn(
            async move {
                let mut positions = Box::pin(positions);
                let mut forwarded = 0u64;
                let mut dropped = 0u64;
                while let Some(position) = positions.next().await {
                    let sent = match delivery {
                        Delivery::DropWhenFull => reporter.report(position),
                        Delivery::Wait => reporter.send(position).await,
                    };
                    match sent {
                        Ok(()) => forwarded += 1,
                        Err(ReportError::QueueFull) => dropped += 1,
                        Err(ReportError::Closed) => {
                            debug!("Pipeline stopped, no longer forwarding positions");
                            break;
                        }
                    }
                }
                info!(forwarded, dropped, "Position source finished");
            }
            .instrument(span),
        );

        info!(%session_id, ?delivery, "Discovery session started");
        Self {
            session_id,
            pipeline,
            pump: Some(pump),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn subscribe(&self) -> SnapshotSubscriber {
        self.pipeline.subscribe()
    }

    /// Resolve once the position source has ended. Cancel safe.
    pub async fn source_exhausted(&mut self) {
        if let Some(pump) = self.pump.as_mut() {
            let _ = pump.await;
            self.pump = None;
        }
    }

    /// Wait for the source to end, let the pipeline drain, and return stats.
    pub async fn finished(mut self) -> SessionStats {
        self.source_exhausted().await;
        self.pipeline.close().await
    }

    /// End the session now: stop reading positions and cancel any search in
    /// flight.
    pub async fn stop(mut self) -> SessionStats {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            let _ = pump.await;
        }
        self.pipeline.shutdown().await
    }
}

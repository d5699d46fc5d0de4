//! Live-path writer.
//!
//! [`InlinePcesWriter`] sits in the event pipeline. Every event passes
//! through it; the ones that need to be made durable are written to the
//! stream and synced according to the [`SyncOption`].

use crate::config::{PcesConfig, SyncOption};
use crate::error::CoreResult;
use crate::manager::SegmentManager;
use crate::metrics::PcesMetrics;
use crate::types::{Event, EventWindow, NodeId};
use std::sync::Arc;

/// Writes events to the stream as they pass through the pipeline.
#[derive(Debug)]
pub struct InlinePcesWriter {
    manager: SegmentManager,
    sync_option: SyncOption,
    self_id: NodeId,
    metrics: Arc<PcesMetrics>,
}

impl InlinePcesWriter {
    /// Wraps `manager` for node `self_id`.
    #[must_use]
    pub fn new(
        config: &PcesConfig,
        manager: SegmentManager,
        self_id: NodeId,
        metrics: Arc<PcesMetrics>,
    ) -> Self {
        Self {
            manager,
            sync_option: config.sync_option,
            self_id,
            metrics,
        }
    }

    /// Returns the underlying manager.
    #[must_use]
    pub fn manager(&self) -> &SegmentManager {
        &self.manager
    }

    /// Consumes the writer and returns the manager.
    #[must_use]
    pub fn into_manager(self) -> SegmentManager {
        self.manager
    }

    /// Ends replay. Events passed in afterwards are written.
    pub fn begin_streaming_new_events(&mut self) {
        self.manager.begin_streaming_new_events();
    }

    /// Makes `event` durable if needed and hands it back.
    ///
    /// Before streaming begins, events come from the stream itself and are
    /// already durable. Ancient events are never written.
    ///
    /// # Errors
    ///
    /// Returns an error if rotation, the write or the sync fails.
    pub fn write_event(&mut self, event: Event) -> CoreResult<Event> {
        if !self.manager.is_streaming_new_events() {
            return Ok(event);
        }
        if event.ancient_indicator() < self.manager.non_ancient_boundary() {
            return Ok(event);
        }

        self.manager.prepare_output_stream(&event)?;
        let written = self.manager.write_event(&event)?;
        self.metrics.record_event_written(written);

        if self.should_sync(&event) {
            self.manager.sync()?;
            self.metrics.record_sync();
        }
        Ok(event)
    }

    /// See [`SegmentManager::register_discontinuity`].
    ///
    /// # Errors
    ///
    /// Returns an error if the origin does not increase or closing fails.
    pub fn register_discontinuity(&mut self, new_origin: i64) -> CoreResult<()> {
        self.manager.register_discontinuity(new_origin)
    }

    /// See [`SegmentManager::update_non_ancient_event_boundary`].
    ///
    /// # Errors
    ///
    /// Returns an error if the boundary would decrease.
    pub fn update_non_ancient_event_boundary(&mut self, window: &EventWindow) -> CoreResult<()> {
        self.manager.update_non_ancient_event_boundary(window)
    }

    /// See [`SegmentManager::set_minimum_indicator_to_store`].
    ///
    /// # Errors
    ///
    /// Returns an error if pruning fails.
    pub fn set_minimum_indicator_to_store(&mut self, minimum: i64) -> CoreResult<()> {
        self.manager.set_minimum_indicator_to_store(minimum)
    }

    /// Closes the open segment.
    ///
    /// # Errors
    ///
    /// Returns an error if closing fails.
    pub fn close(&mut self) -> CoreResult<()> {
        self.manager.close_current_segment()
    }

    fn should_sync(&self, event: &Event) -> bool {
        match self.sync_option {
            SyncOption::DontSync => false,
            SyncOption::EveryEvent => true,
            SyncOption::EverySelfEvent => event.creator() == self.self_id,
        }
    }
}

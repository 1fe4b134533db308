//! Capture → history → broadcast → disk.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{body::Body, http::Request};
use chrono::Utc;

use crate::broadcast::HubHandle;
use crate::capture::model::CapturedRequest;
use crate::capture::normalizer::RequestNormalizer;
use crate::observability::metrics;
use crate::storage::{HistoryCache, RecordStore};

/// Everything a capture touches, wired together.
pub struct CapturePipeline {
    normalizer: RequestNormalizer,
    records: Arc<dyn RecordStore>,
    history: HistoryCache,
    hub: HubHandle,
    // Keeps history order and broadcast order identical.
    sequence: Mutex<()>,
}

impl CapturePipeline {
    pub fn new(
        normalizer: RequestNormalizer,
        records: Arc<dyn RecordStore>,
        history: HistoryCache,
        hub: HubHandle,
    ) -> Self {
        Self {
            normalizer,
            records,
            history,
            hub,
            sequence: Mutex::new(()),
        }
    }

    /// Capture one request. Never fails; problems are logged.
    pub async fn capture(&self, request: Request<Body>, peer: SocketAddr) -> CapturedRequest {
        let mut record = self.normalizer.normalize(request, peer).await;

        {
            let _order = self.sequence.lock().expect("capture sequence mutex poisoned");
            // Stamped here so timestamp, history and broadcast order agree.
            record.timestamp = Utc::now();
            self.history.insert(record.clone());
            self.hub.publish(record.clone());
        }

        if let Err(e) = self.records.save(&record).await {
            tracing::warn!(id = %record.id, error = %e, "Failed to persist record");
            metrics::record_capture_failure("persist");
        }

        metrics::record_capture();
        tracing::info!(
            id = %record.id,
            method = %record.method,
            url = %record.url,
            remote = %record.remote_address,
            params = record.body_parameters.len(),
            blob = record.file_link.is_some(),
            "Request captured"
        );
        record
    }
}

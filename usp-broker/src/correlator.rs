/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! RequestCorrelator: sends a request and blocks until a matching response
//! (or timeout) arrives (spec.md §4.E). Modeled as a future keyed by
//! `msg_id`, completed by the inbound demultiplexer (spec.md §9 design
//! note), using `tokio::sync::oneshot` the way the teacher models
//! suspension points elsewhere in its runtime layer.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::mtp::MtpConnection;
use crate::wire::UspRecord;

const CORRELATOR_TAG: &str = "RequestCorrelator:";

pub struct RequestCorrelator {
    pending: Mutex<HashMap<String, oneshot::Sender<UspRecord>>>,
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self { pending: Mutex::new(HashMap::new()) }
    }

    /// Sends `request` over `mtp` and suspends until a reply carrying the
    /// same `msg_id` is delivered via [`RequestCorrelator::complete`], or
    /// `timeout` elapses. Consumes `request`. Returns `None` on timeout,
    /// disconnect, or send failure; callers surface `InternalError`.
    pub async fn send_and_wait(
        &self,
        mtp: &dyn MtpConnection,
        request: UspRecord,
        timeout: Duration,
    ) -> Option<UspRecord> {
        let msg_id = request.msg_id.clone();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().await;
            pending.insert(msg_id.clone(), tx);
        }

        if let Err(err) = mtp.send(request).await {
            warn!("{} send failed for msg_id={}: {}", CORRELATOR_TAG, msg_id, err);
            self.pending.lock().await.remove(&msg_id);
            return None;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(_)) => {
                debug!("{} sender dropped for msg_id={}", CORRELATOR_TAG, msg_id);
                None
            }
            Err(_) => {
                debug!("{} timed out waiting for msg_id={}", CORRELATOR_TAG, msg_id);
                self.pending.lock().await.remove(&msg_id);
                None
            }
        }
    }

    /// Delivers `response` to whichever `send_and_wait` call is waiting on
    /// its `msg_id`. Returns `true` if a waiter was found and completed.
    /// Called from the inbound demultiplexer for every `*Resp`/`Error`
    /// record (spec.md §4.E: "matching `msg_id` and matching
    /// `expected_response_type` (or `ERROR`)" — type matching is the
    /// caller's responsibility since this map is keyed purely by id).
    pub async fn complete(&self, response: UspRecord) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.remove(&response.msg_id) {
            Some(sender) => {
                let _ = sender.send(response);
                true
            }
            None => false,
        }
    }

    /// Drops every pending waiter, yielding `None` to each (spec.md §5:
    /// "On Service disconnect during a suspended call, the correlator
    /// yields `None` as well").
    pub async fn cancel_all(&self) {
        self.pending.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtp::MtpSendError;
    use crate::wire::{Error as WireError, UspMessage};
    use async_trait::async_trait;

    struct EchoMtp;

    #[async_trait]
    impl MtpConnection for EchoMtp {
        async fn send(&self, _record: UspRecord) -> Result<(), MtpSendError> {
            Ok(())
        }
    }

    struct FailingMtp;

    #[async_trait]
    impl MtpConnection for FailingMtp {
        async fn send(&self, _record: UspRecord) -> Result<(), MtpSendError> {
            Err(MtpSendError("down".to_string()))
        }
    }

    #[tokio::test]
    async fn completes_waiter_with_matching_msg_id() {
        let correlator = RequestCorrelator::new();
        let request = UspRecord::new("1", UspMessage::GetInstances(Default::default()));

        let wait = correlator.send_and_wait(&EchoMtp, request, Duration::from_secs(1));
        let reply = UspRecord::new("1", UspMessage::Error(WireError { code: 1, message: "x".into() }));

        let (result, completed) = tokio::join!(wait, async {
            tokio::task::yield_now().await;
            correlator.complete(reply).await
        });

        assert!(completed);
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn returns_none_on_send_failure() {
        let correlator = RequestCorrelator::new();
        let request = UspRecord::new("1", UspMessage::GetInstances(Default::default()));
        let result = correlator.send_and_wait(&FailingMtp, request, Duration::from_millis(50)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn returns_none_on_timeout() {
        let correlator = RequestCorrelator::new();
        let request = UspRecord::new("1", UspMessage::GetInstances(Default::default()));
        let result = correlator.send_and_wait(&EchoMtp, request, Duration::from_millis(20)).await;
        assert!(result.is_none());
    }
}

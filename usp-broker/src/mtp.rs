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

//! The `MtpConnection` seam (spec §1: "the core sees only a `MtpConnection`
//! handle and a `send(endpoint, record, conn)` operation"). UDS/MQTT/
//! WebSocket/STOMP framing lives entirely on the other side of this trait.

use crate::wire::UspRecord;
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An error reported by the transport layer while attempting to hand a
/// record off; distinct from [`crate::error::BrokerError`], which is the
/// Broker's own protocol-level taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
#[error("mtp send failed: {0}")]
pub struct MtpSendError(pub String);

/// One MTP connection handle, in either the controller- or agent-direction
/// role (spec §3: `controller_mtp`, `agent_mtp`).
#[async_trait]
pub trait MtpConnection: Send + Sync {
    /// Hands `record` to the transport for delivery to the peer this handle
    /// addresses. The Broker does not retry; a transport that wants at-most-
    /// once semantics degrades that itself.
    async fn send(&self, record: UspRecord) -> Result<(), MtpSendError>;

    /// True once the underlying transport has torn down. `ServiceRegistry`
    /// and `LifecycleManager` poll this rather than relying solely on
    /// explicit disconnect notifications, matching spec §4.I's "both
    /// directions down" check.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Arc-pointer-identity wrapper so an `MtpConnection` handle can be used as a
/// `HashMap`/`HashSet` key despite carrying no `Eq` of its own — trait
/// objects are compared by the identity of the connection they wrap, not by
/// any notion of handle equality.
#[derive(Clone)]
pub struct ComparableMtp {
    conn: Arc<dyn MtpConnection>,
}

impl ComparableMtp {
    pub fn new(conn: Arc<dyn MtpConnection>) -> Self {
        Self { conn }
    }

    pub fn inner(&self) -> &Arc<dyn MtpConnection> {
        &self.conn
    }
}

impl Hash for ComparableMtp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.conn).hash(state);
    }
}

impl PartialEq for ComparableMtp {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }
}

impl Eq for ComparableMtp {}

impl Debug for ComparableMtp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparableMtp").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct NoopMtp {
        closed: AtomicBool,
    }

    #[async_trait]
    impl MtpConnection for NoopMtp {
        async fn send(&self, _record: UspRecord) -> Result<(), MtpSendError> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn comparable_mtp_equality_is_pointer_identity() {
        let a: Arc<dyn MtpConnection> = Arc::new(NoopMtp { closed: AtomicBool::new(false) });
        let b: Arc<dyn MtpConnection> = Arc::new(NoopMtp { closed: AtomicBool::new(false) });

        let wrapped_a = ComparableMtp::new(a.clone());
        let wrapped_a_again = ComparableMtp::new(a);
        let wrapped_b = ComparableMtp::new(b);

        assert_eq!(wrapped_a, wrapped_a_again);
        assert_ne!(wrapped_a, wrapped_b);
    }
}

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

//! LifecycleManager: connect/disconnect handling, failure propagation,
//! resource cleanup, group-id lifetime (spec.md §4.I).

use tracing::{debug, info};

use crate::model::DataModelStore;
use crate::model::RequestTable;
use crate::mtp::ComparableMtp;
use crate::registry::service::ServiceId;
use crate::registry::table::{MtpRole, ServiceRegistry};

const LIFECYCLE_TAG: &str = "LifecycleManager:";

/// Which socket direction a newly observed connection arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// The Service connected to the Broker's controller-side listener: the
    /// Broker will act as Controller toward it (spec.md §3 `controller_mtp`).
    ControllerSide,
    /// The Service connected to the Broker's agent-side listener: it acts as
    /// a Controller toward the Broker (spec.md §3 `has_controller`).
    AgentSide,
}

/// Stateless over injected collaborators, matching the `VendorHookAdapter`
/// shape (spec.md §4.D): all state lives on `ServiceRegistry`/`Service`.
pub struct LifecycleManager;

impl LifecycleManager {
    /// Registers a new connection, creating the Service on first contact
    /// from an unknown endpoint (spec.md §3 "Service created on first
    /// inbound message from a previously unknown endpoint").
    pub fn on_connect(
        registry: &mut ServiceRegistry,
        endpoint_id: &str,
        role: ConnectionRole,
        mtp: ComparableMtp,
    ) -> Option<ServiceId> {
        let id = match registry.find_by_endpoint(endpoint_id) {
            Some(existing) => existing.id,
            None => registry.add(endpoint_id)?.id,
        };

        match role {
            ConnectionRole::ControllerSide => {
                registry.update_mtp(id, MtpRole::Controller, mtp);
            }
            ConnectionRole::AgentSide => {
                registry.update_mtp(id, MtpRole::Agent, mtp);
                if let Some(service) = registry.get_mut(id) {
                    service.has_controller = true;
                }
            }
        }
        info!("{} on_connect: endpoint={} role={:?}", LIFECYCLE_TAG, endpoint_id, role);
        Some(id)
    }

    /// Agent-direction disconnect: the Service, acting as a Controller
    /// toward the Broker, has gone away.
    pub fn on_agent_direction_disconnect(registry: &mut ServiceRegistry, id: ServiceId) {
        if let Some(service) = registry.get_mut(id) {
            service.agent_mtp = None;
            service.has_controller = false;
            debug!("{} agent-direction disconnect: slot={}", LIFECYCLE_TAG, id.0);
        }
    }

    /// Controller-direction disconnect: the Service, acting as Agent toward
    /// the Broker, has gone away. Cascades per spec.md §4.I: frees
    /// vendor-layer subscriptions, fails active commands, drops in-flight
    /// passthru state, and deregisters every owned path.
    pub async fn on_controller_direction_disconnect(
        registry: &mut ServiceRegistry,
        id: ServiceId,
        data_model: &dyn DataModelStore,
        request_table: &dyn RequestTable,
        fail_active_commands: bool,
    ) {
        let Some(service) = registry.get_mut(id) else { return };
        service.controller_mtp = None;

        // (a) vendor-layer subscriptions revert to the core mechanism.
        service.subs_map.clear();

        // (b) complete active commands as failed, if requested.
        if fail_active_commands {
            crate::requests::bridge::fail_all(service, request_table, "service controller-direction disconnect").await;
        } else {
            service.req_map.clear();
        }

        // (c) passback targets for in-flight passthru are stale.
        service.msg_map.clear();

        // (d) deregister every path this Service owned.
        let group = service.group_id;
        let paths = std::mem::take(&mut service.registered_paths);
        for path in paths {
            let _ = data_model.deregister_subtree(&path, group).await;
        }

        debug!("{} controller-direction disconnect: slot={}", LIFECYCLE_TAG, id.0);
    }

    /// Frees the Service slot once both directions are down, detaching
    /// vendor hooks and publishing instance deletion (spec.md §4.I "both
    /// directions down").
    pub async fn maybe_free(
        registry: &mut ServiceRegistry,
        id: ServiceId,
        data_model: &dyn DataModelStore,
    ) {
        let ready = matches!(registry.get(id), Some(service) if service.both_directions_down());
        if !ready {
            return;
        }
        if let Some(service) = registry.free(id) {
            if let Some(instance) = service.instance {
                data_model.delete_usp_service_row(instance.get()).await;
            }
            info!("{} freed service slot={} endpoint={}", LIFECYCLE_TAG, id.0, service.endpoint_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtp::{MtpConnection, MtpSendError};
    use crate::wire::UspRecord;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoopMtp;

    #[async_trait]
    impl MtpConnection for NoopMtp {
        async fn send(&self, _record: UspRecord) -> Result<(), MtpSendError> {
            Ok(())
        }
    }

    fn noop_mtp() -> ComparableMtp {
        ComparableMtp::new(Arc::new(NoopMtp))
    }

    #[test]
    fn on_connect_creates_service_once_per_endpoint() {
        let mut registry = ServiceRegistry::new(4);
        let first = LifecycleManager::on_connect(&mut registry, "svc-a", ConnectionRole::ControllerSide, noop_mtp());
        let second = LifecycleManager::on_connect(&mut registry, "svc-a", ConnectionRole::AgentSide, noop_mtp());
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        let service = registry.get(first.unwrap()).unwrap();
        assert!(service.controller_mtp.is_some());
        assert!(service.agent_mtp.is_some());
        assert!(service.has_controller);
    }

    #[test]
    fn agent_direction_disconnect_clears_has_controller() {
        let mut registry = ServiceRegistry::new(4);
        let id = LifecycleManager::on_connect(&mut registry, "svc-a", ConnectionRole::AgentSide, noop_mtp()).unwrap();
        LifecycleManager::on_agent_direction_disconnect(&mut registry, id);
        let service = registry.get(id).unwrap();
        assert!(!service.has_controller);
        assert!(service.agent_mtp.is_none());
    }
}

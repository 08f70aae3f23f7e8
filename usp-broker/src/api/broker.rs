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

//! `UspBroker`: one struct owning every shared table, with a single
//! `on_record` entry point classifying inbound records (spec.md §2) plus
//! public methods for the operations a hosting agent drives directly.
//! Mirrors the teacher's `UStreamer`: a facade holding `Mutex`-guarded
//! shared state behind a handful of async methods, rather than exposing the
//! component modules directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::warn;

use crate::config::BrokerConfig;
use crate::correlator::RequestCorrelator;
use crate::error::{BrokerError, BrokerResult};
use crate::messages::MessageBuilders;
use crate::model::{DataModelStore, GroupId, PermissionsStore, RequestTable, SubscriptionTable};
use crate::mtp::ComparableMtp;
use crate::passthru::{self, RewrittenResponse};
use crate::registration::engine as registration_engine;
use crate::registry::lifecycle::{ConnectionRole, LifecycleManager};
use crate::registry::service::ServiceId;
use crate::registry::table::ServiceRegistry;
use crate::schema::discovery as schema_discovery;
use crate::subscriptions::bridge::{self as subscription_bridge, RoutedNotification};
use crate::vendor_hooks;
use crate::wire::{
    Add, AddResp, Deregister, DeleteResp, Get, GetResp, GetSupportedDMResp, Notify, OperateResp, Register, Set,
    SetResp, UspMessage, UspRecord,
};

const USP_BROKER_TAG: &str = "UspBroker:";

/// Default `NotifType` the Broker uses when it starts a new Broker-side
/// subscription against a Service (spec.md §4.F). A hosting agent with
/// finer-grained needs drives [`vendor_hooks::subscribe::subscribe`] directly
/// instead of going through `reconcile_subscriptions`.
const DEFAULT_NOTIFY_TYPE: &str = "ValueChange";

fn unix_now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// The classification `on_record` assigns to one inbound [`UspRecord`]
/// (spec.md §2 control flow).
pub enum Inbound {
    /// A `Register` was processed; send `.0` back over the connection it
    /// arrived on.
    Registered(UspRecord),
    /// A `Deregister` was processed; send `.0` back, plus any `Unsubscribe`
    /// cleanup has already been fired off.
    Deregistered(UspRecord),
    /// A `GetSupportedDMResp` matched a pending discovery; schema
    /// registration, instance-cache seeding, and subscription reconciliation
    /// have all been kicked off.
    SchemaDiscovered,
    /// A `Notify` was routed to a Controller-visible subscription.
    Notified(RoutedNotification),
    /// A Get/Set/Add/Delete request was forwarded via the passthru fast
    /// path; no further action is needed.
    PassedThru,
    /// A Get/Set/Add/Delete request was not passthru-eligible; hand `.0` to
    /// the generic vendor-hook/data-model path instead.
    FallThrough(UspMessage),
    /// A Response/ERROR was delivered to a waiting `RequestCorrelator`
    /// caller.
    Correlated,
    /// A Response/ERROR matched a passthru `MsgMapEntry`; forward the
    /// rewritten record to its `reply_mtp`.
    PassedThruResponse(RewrittenResponse),
    /// Nothing matched; the record is silently dropped (spec.md §4.C/§4.F).
    Dropped,
}

/// Outcome of routing one inbound Response/ERROR record (spec.md §4.E/§4.H).
pub enum ResponseOutcome {
    Correlated,
    Forward(RewrittenResponse),
    Dropped,
}

/// One connected Broker instance: the Service table plus the collaborators a
/// hosting agent injects (spec §1).
pub struct UspBroker {
    config: BrokerConfig,
    registry: Mutex<ServiceRegistry>,
    correlator: RequestCorrelator,
    data_model: Arc<dyn DataModelStore>,
    permissions: Arc<dyn PermissionsStore>,
    request_table: Arc<dyn RequestTable>,
    subscription_table: Arc<dyn SubscriptionTable>,
}

impl UspBroker {
    pub fn new(
        config: BrokerConfig,
        data_model: Arc<dyn DataModelStore>,
        permissions: Arc<dyn PermissionsStore>,
        request_table: Arc<dyn RequestTable>,
        subscription_table: Arc<dyn SubscriptionTable>,
    ) -> Self {
        let registry = Mutex::new(ServiceRegistry::new(config.max_usp_services));
        Self { config, registry, correlator: RequestCorrelator::new(), data_model, permissions, request_table, subscription_table }
    }

    /// Registers a newly observed MTP connection, creating the Service on
    /// first contact from an unknown endpoint (spec.md §3, §4.I).
    pub async fn on_connect(&self, endpoint_id: &str, role: ConnectionRole, mtp: ComparableMtp) -> Option<ServiceId> {
        let mut registry = self.registry.lock().await;
        LifecycleManager::on_connect(&mut registry, endpoint_id, role, mtp)
    }

    pub async fn on_agent_direction_disconnect(&self, id: ServiceId) {
        let mut registry = self.registry.lock().await;
        LifecycleManager::on_agent_direction_disconnect(&mut registry, id);
        LifecycleManager::maybe_free(&mut registry, id, self.data_model.as_ref()).await;
    }

    pub async fn on_controller_direction_disconnect(&self, id: ServiceId, fail_active_commands: bool) {
        let mut registry = self.registry.lock().await;
        LifecycleManager::on_controller_direction_disconnect(
            &mut registry,
            id,
            self.data_model.as_ref(),
            self.request_table.as_ref(),
            fail_active_commands,
        )
        .await;
        LifecycleManager::maybe_free(&mut registry, id, self.data_model.as_ref()).await;
    }

    fn ensure_service(registry: &mut ServiceRegistry, endpoint_id: &str, reply_mtp: &ComparableMtp) -> BrokerResult<ServiceId> {
        if let Some(existing) = registry.find_by_endpoint(endpoint_id) {
            return Ok(existing.id);
        }
        LifecycleManager::on_connect(registry, endpoint_id, ConnectionRole::ControllerSide, reply_mtp.clone())
            .ok_or_else(|| BrokerError::ResourcesExceeded("service table is at capacity".to_string()))
    }

    /// `handle_register` (spec.md §4.B), auto-creating the Service on first
    /// contact if `on_connect` was never called explicitly for it. When at
    /// least one path is accepted, the follow-up `GetSupportedDM` is sent
    /// immediately over the Service's controller-direction MTP.
    pub async fn handle_register(
        &self,
        endpoint_id: &str,
        reply_mtp: ComparableMtp,
        original_msg_id: &str,
        msg: Register,
    ) -> BrokerResult<UspRecord> {
        let mut registry = self.registry.lock().await;
        let id = Self::ensure_service(&mut registry, endpoint_id, &reply_mtp)?;
        let service = registry.get_mut(id).expect("just ensured");

        let (response, gsdm_request) = registration_engine::handle_register(original_msg_id, service, &msg, self.data_model.as_ref()).await;

        if let Some(request) = gsdm_request {
            if let Some(mtp) = service.controller_mtp.clone() {
                if let Err(err) = mtp.inner().send(request).await {
                    warn!("{} failed to send GetSupportedDM to {}: {}", USP_BROKER_TAG, endpoint_id, err);
                }
            }
        }

        Ok(response)
    }

    /// `handle_deregister` (spec.md §4.B). Any `Unsubscribe` cleanup the
    /// deregistration surfaces is sent fire-and-forget: the Service row is
    /// already gone from the schema regardless of whether it acknowledges.
    pub async fn handle_deregister(&self, endpoint_id: &str, original_msg_id: &str, msg: Deregister) -> BrokerResult<UspRecord> {
        let mut registry = self.registry.lock().await;
        let service = registry
            .find_by_endpoint_mut(endpoint_id)
            .ok_or_else(|| BrokerError::DeregisterFailure(format!("unknown endpoint {}", endpoint_id)))?;

        let outcome =
            registration_engine::handle_deregister(original_msg_id, service, &msg, self.data_model.as_ref(), self.request_table.as_ref()).await;
        let mtp = service.controller_mtp.clone();

        if let Some(mtp) = mtp {
            for entry in &outcome.unsubscribed {
                let request = MessageBuilders::unsubscribe_delete(entry.service_instance);
                if let Err(err) = mtp.inner().send(request).await {
                    warn!("{} failed to send cleanup Unsubscribe for {}: {}", USP_BROKER_TAG, entry.path, err);
                }
            }
        }

        Ok(outcome.response)
    }

    /// `handle_gsdm_response` (spec.md §4.C), followed by instance-cache
    /// seeding for any newly discovered multi-instance top-level object and
    /// subscription reconciliation against the Service's subscription table
    /// (spec.md §4.F `reconcile`).
    pub async fn handle_gsdm_response(&self, endpoint_id: &str, reply_msg_id: &str, msg: GetSupportedDMResp) -> BrokerResult<()> {
        let mut registry = self.registry.lock().await;
        let service = registry
            .find_by_endpoint_mut(endpoint_id)
            .ok_or_else(|| BrokerError::InternalError(format!("unknown endpoint {}", endpoint_id)))?;
        let group = service.group_id;

        let outcome = schema_discovery::handle_gsdm_response(service, reply_msg_id, &msg, self.data_model.as_ref(), self.permissions.as_ref()).await;
        let Some(outcome) = outcome else { return Ok(()) };

        for path in outcome.objects_needing_instance_seed {
            if let Err(err) = vendor_hooks::refresh_instances::refresh_instances(
                &registry,
                group,
                path.clone(),
                self.data_model.as_ref(),
                &self.correlator,
                self.config.response_timeout,
                self.config.broker_instance_cache_expiry_secs,
            )
            .await
            {
                warn!("{} failed to seed instance cache for {}: {}", USP_BROKER_TAG, path, err);
            }
        }

        if let Err(err) = subscription_bridge::reconcile(
            &mut registry,
            group,
            self.data_model.as_ref(),
            self.subscription_table.as_ref(),
            &self.correlator,
            self.config.response_timeout,
            DEFAULT_NOTIFY_TYPE,
            unix_now_secs(),
        )
        .await
        {
            warn!("{} subscription reconciliation failed for group {:?}: {}", USP_BROKER_TAG, group, err);
        }

        Ok(())
    }

    /// Routes an inbound `Notify`, preferring the passthru fast path
    /// (spec.md §4.H "For `Notify` passthru") and falling back to the
    /// generic `SubscriptionBridge` otherwise.
    pub async fn on_notify(&self, endpoint_id: &str, notify: Notify, enclosing_add_in_flight: bool) -> BrokerResult<RoutedNotification> {
        let mut registry = self.registry.lock().await;
        let service = registry
            .find_by_endpoint_mut(endpoint_id)
            .ok_or_else(|| BrokerError::RequestDenied(format!("unknown endpoint {}", endpoint_id)))?;

        if let Some(broker_instance) = passthru::notify::attempt(service, &notify, enclosing_add_in_flight) {
            return Ok(RoutedNotification { broker_instance, payload: notify.payload });
        }

        subscription_bridge::route_notification(service, &notify, self.request_table.as_ref()).await
    }

    /// Routes an inbound Response/ERROR record: first to any waiting
    /// `RequestCorrelator` caller, then to the passthru `msg_map` (spec.md
    /// §4.E, §4.H).
    pub async fn on_response(&self, response: UspRecord) -> ResponseOutcome {
        if self.correlator.complete(response.clone()).await {
            return ResponseOutcome::Correlated;
        }
        let mut registry = self.registry.lock().await;
        match passthru::match_response(&mut registry, response) {
            Some(rewritten) => ResponseOutcome::Forward(rewritten),
            None => ResponseOutcome::Dropped,
        }
    }

    pub async fn attempt_passthru_get(&self, originator_endpoint: &str, reply_mtp: ComparableMtp, original_msg_id: &str, get: Get) -> BrokerResult<bool> {
        let mut registry = self.registry.lock().await;
        passthru::get::attempt(&mut registry, self.data_model.as_ref(), self.permissions.as_ref(), originator_endpoint, reply_mtp, original_msg_id, get, unix_now_secs()).await
    }

    pub async fn attempt_passthru_set(&self, originator_endpoint: &str, reply_mtp: ComparableMtp, original_msg_id: &str, set: Set) -> BrokerResult<bool> {
        let mut registry = self.registry.lock().await;
        passthru::set::attempt(&mut registry, self.data_model.as_ref(), self.permissions.as_ref(), originator_endpoint, reply_mtp, original_msg_id, set, unix_now_secs()).await
    }

    pub async fn attempt_passthru_add(&self, originator_endpoint: &str, reply_mtp: ComparableMtp, original_msg_id: &str, add: Add) -> BrokerResult<bool> {
        let mut registry = self.registry.lock().await;
        passthru::add::attempt(&mut registry, self.data_model.as_ref(), self.permissions.as_ref(), originator_endpoint, reply_mtp, original_msg_id, add, unix_now_secs()).await
    }

    pub async fn attempt_passthru_delete(
        &self,
        originator_endpoint: &str,
        reply_mtp: ComparableMtp,
        original_msg_id: &str,
        delete: crate::wire::Delete,
    ) -> BrokerResult<bool> {
        let mut registry = self.registry.lock().await;
        passthru::delete::attempt(&mut registry, self.data_model.as_ref(), self.permissions.as_ref(), originator_endpoint, reply_mtp, original_msg_id, delete, unix_now_secs()).await
    }

    /// Classifies one inbound record per spec.md §2's control flow. For
    /// Get/Set/Add/Delete, attempts the passthru fast path before returning
    /// [`Inbound::FallThrough`] for the hosting agent's generic handler.
    pub async fn on_record(&self, endpoint_id: &str, reply_mtp: ComparableMtp, record: UspRecord, enclosing_add_in_flight: bool) -> BrokerResult<Inbound> {
        let msg_id = record.msg_id.clone();
        match record.body {
            UspMessage::Register(msg) => {
                let response = self.handle_register(endpoint_id, reply_mtp, &msg_id, msg).await?;
                Ok(Inbound::Registered(response))
            }
            UspMessage::Deregister(msg) => {
                let response = self.handle_deregister(endpoint_id, &msg_id, msg).await?;
                Ok(Inbound::Deregistered(response))
            }
            UspMessage::GetSupportedDMResp(msg) => {
                self.handle_gsdm_response(endpoint_id, &msg_id, msg).await?;
                Ok(Inbound::SchemaDiscovered)
            }
            UspMessage::Notify(notify) => {
                let routed = self.on_notify(endpoint_id, notify, enclosing_add_in_flight).await?;
                Ok(Inbound::Notified(routed))
            }
            UspMessage::Get(get) => {
                if self.attempt_passthru_get(endpoint_id, reply_mtp, &msg_id, get.clone()).await? {
                    Ok(Inbound::PassedThru)
                } else {
                    Ok(Inbound::FallThrough(UspMessage::Get(get)))
                }
            }
            UspMessage::Set(set) => {
                if self.attempt_passthru_set(endpoint_id, reply_mtp, &msg_id, set.clone()).await? {
                    Ok(Inbound::PassedThru)
                } else {
                    Ok(Inbound::FallThrough(UspMessage::Set(set)))
                }
            }
            UspMessage::Add(add) => {
                if self.attempt_passthru_add(endpoint_id, reply_mtp, &msg_id, add.clone()).await? {
                    Ok(Inbound::PassedThru)
                } else {
                    Ok(Inbound::FallThrough(UspMessage::Add(add)))
                }
            }
            UspMessage::Delete(delete) => {
                if self.attempt_passthru_delete(endpoint_id, reply_mtp, &msg_id, delete.clone()).await? {
                    Ok(Inbound::PassedThru)
                } else {
                    Ok(Inbound::FallThrough(UspMessage::Delete(delete)))
                }
            }
            other if other.is_response_or_error() => match self.on_response(UspRecord::new(msg_id, other)).await {
                ResponseOutcome::Correlated => Ok(Inbound::Correlated),
                ResponseOutcome::Forward(rewritten) => Ok(Inbound::PassedThruResponse(rewritten)),
                ResponseOutcome::Dropped => Ok(Inbound::Dropped),
            },
            other => Ok(Inbound::FallThrough(other)),
        }
    }

    /// Get vendor hook (spec.md §4.D), for the generic handler's use once
    /// `on_record` returns [`Inbound::FallThrough`] for a `Get`.
    pub async fn vendor_get(&self, group: GroupId, param_paths: Vec<String>, max_depth: Option<u32>) -> BrokerResult<GetResp> {
        let registry = self.registry.lock().await;
        vendor_hooks::get::get(&registry, group, param_paths, max_depth, &self.correlator, self.config.response_timeout).await
    }

    pub async fn vendor_set(&self, group: GroupId, updates: Vec<(String, HashMap<String, String>)>) -> BrokerResult<SetResp> {
        let registry = self.registry.lock().await;
        vendor_hooks::set::set(&registry, group, updates, &self.correlator, self.config.response_timeout).await
    }

    pub async fn vendor_add(&self, group: GroupId, obj_path: String, param_values: HashMap<String, String>) -> BrokerResult<AddResp> {
        let registry = self.registry.lock().await;
        vendor_hooks::add::add(&registry, group, obj_path, param_values, &self.correlator, self.config.response_timeout).await
    }

    pub async fn vendor_delete(&self, group: GroupId, obj_paths: Vec<String>) -> BrokerResult<DeleteResp> {
        let registry = self.registry.lock().await;
        vendor_hooks::delete::delete(&registry, group, obj_paths, &self.correlator, self.config.response_timeout).await
    }

    pub async fn vendor_multi_delete(&self, group: GroupId, obj_paths: Vec<String>, allow_partial: bool) -> BrokerResult<DeleteResp> {
        let registry = self.registry.lock().await;
        vendor_hooks::delete::multi_delete(&registry, group, obj_paths, allow_partial, &self.correlator, self.config.response_timeout).await
    }

    pub async fn vendor_sync_operate(&self, group: GroupId, command: String, command_key: String, input_args: HashMap<String, String>) -> BrokerResult<OperateResp> {
        let registry = self.registry.lock().await;
        vendor_hooks::operate::sync_operate(&registry, group, command, command_key, input_args, &self.correlator, self.config.response_timeout).await
    }

    pub async fn vendor_async_operate(&self, group: GroupId, path: String, request_instance: u32, input_args: HashMap<String, String>) -> BrokerResult<()> {
        let mut registry = self.registry.lock().await;
        vendor_hooks::operate::async_operate(
            &mut registry,
            group,
            path,
            request_instance,
            input_args,
            self.request_table.as_ref(),
            &self.correlator,
            self.config.response_timeout,
        )
        .await
    }

    pub async fn vendor_refresh_instances(&self, group: GroupId, path: String) -> BrokerResult<()> {
        let registry = self.registry.lock().await;
        vendor_hooks::refresh_instances::refresh_instances(
            &registry,
            group,
            path,
            self.data_model.as_ref(),
            &self.correlator,
            self.config.response_timeout,
            self.config.broker_instance_cache_expiry_secs,
        )
        .await
    }

    pub async fn vendor_subscribe(&self, group: GroupId, broker_instance: u32, notify_type: &str, path: &str) -> BrokerResult<()> {
        let mut registry = self.registry.lock().await;
        vendor_hooks::subscribe::subscribe(&mut registry, group, broker_instance, notify_type, path, unix_now_secs(), &self.correlator, self.config.response_timeout).await
    }

    pub async fn vendor_unsubscribe(&self, group: GroupId, broker_instance: u32, path: &str) -> BrokerResult<()> {
        let mut registry = self.registry.lock().await;
        vendor_hooks::subscribe::unsubscribe(&mut registry, group, broker_instance, path, &self.correlator, self.config.response_timeout).await
    }

    /// Number of currently connected Services, for diagnostics/tests.
    pub async fn connected_service_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Direct inspection/mutation hook into the Service table, for
    /// integration tests that need to seed a `subs_map`/`req_map` row the
    /// facade otherwise only populates via `SchemaDiscovery`/`SubscriptionBridge`
    /// round trips (spec.md §8 scenarios 3/4 setup). Not part of the stable
    /// API a hosting agent should drive directly.
    pub async fn registry_for_test(&self) -> tokio::sync::MutexGuard<'_, ServiceRegistry> {
        self.registry.lock().await
    }
}

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

//! SubscriptionBridge: maintains the mapping between Broker subscription
//! rows and Service subscription rows (spec.md §4.F).

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::BrokerError;
use crate::correlator::RequestCorrelator;
use crate::messages::MessageBuilders;
use crate::model::{DataModelStore, GroupId, RequestTable, SubscriptionTable};
use crate::mtp::MtpConnection;
use crate::registry::service::Service;
use crate::registry::table::ServiceRegistry;
use crate::subscriptions::subs_map::unpaired;
use crate::vendor_hooks::{get, subscribe};
use crate::wire::{Notify, NotifyPayload};

const SUBSCRIPTION_BRIDGE_TAG: &str = "SubscriptionBridge:";

const SUBSCRIPTION_TABLE_PATH: &str = "Device.LocalAgent.Subscription.";

/// Syncs on (re)registration (spec.md §4.F `reconcile`). Fetches the whole
/// Service subscription table, discards rows that aren't the Broker's own
/// (no `BROKER` marker), drops stale/disabled rows, pairs the rest, then
/// starts any still-unpaired Broker-side subscription.
pub async fn reconcile(
    registry: &mut ServiceRegistry,
    group: GroupId,
    data_model: &dyn DataModelStore,
    subscription_table: &dyn SubscriptionTable,
    correlator: &RequestCorrelator,
    timeout: Duration,
    notify_type_for_new: &str,
    now_unix_secs: u64,
) -> Result<(), BrokerError> {
    let rows = get::get(registry, group, vec![SUBSCRIPTION_TABLE_PATH.to_string()], None, correlator, timeout).await?;

    for row in &rows.resolved_path_results {
        let id = row.result_params.get("ID").cloned().unwrap_or_default();
        if !id.contains("BROKER") {
            continue;
        }

        let enable = row.result_params.get("Enable").map(|v| v == "true").unwrap_or(false);
        let path = row.result_params.get("ReferenceList").cloned().unwrap_or_default();
        let notify_type = row.result_params.get("NotifType").cloned().unwrap_or_default();

        let owned = registry.find_by_group(group).map(|s| s.owns_path(&path)).unwrap_or(false);
        let service_instance = trailing_instance(&row.resolved_path).unwrap_or(0);

        if !enable || !owned {
            debug!("{} deleting stale subs_map candidate id={} (enable={}, owned={})", SUBSCRIPTION_BRIDGE_TAG, id, enable, owned);
            if let Some(mtp) = registry.find_by_group(group).and_then(|s| s.controller_mtp.as_ref()).map(|m| m.inner().clone()) {
                let request = MessageBuilders::unsubscribe_delete(service_instance);
                if let Err(err) = mtp.send(request).await {
                    warn!("{} failed to delete stale subscription row {}: {}", SUBSCRIPTION_BRIDGE_TAG, id, err);
                }
            }
            continue;
        }
        if !data_model.path_exists(&path).await {
            continue; // a later Register may supply it.
        }

        let candidates = subscription_table.find_enabled_for_path(&notify_type, &path).await;
        let service = match registry.find_by_group_mut(group) {
            Some(s) => s,
            None => continue,
        };
        let unpaired_candidates = unpaired(service, &candidates);

        if let Some(matched) = unpaired_candidates.first() {
            let broker_instance = matched.instance;
            service.subs_map.push(crate::registry::service::SubsMapEntry {
                broker_instance,
                service_instance,
                path: path.clone(),
                subscription_id: id.clone(),
            });
        } else if let Some(mtp) = service.controller_mtp.as_ref().map(|m| m.inner().clone()) {
            debug!("{} no unpaired broker subscription for {}; deleting stale row {}", SUBSCRIPTION_BRIDGE_TAG, path, id);
            let request = MessageBuilders::unsubscribe_delete(service_instance);
            if let Err(err) = mtp.send(request).await {
                warn!("{} failed to delete stale subscription row {}: {}", SUBSCRIPTION_BRIDGE_TAG, id, err);
            }
        }
    }

    start_unpaired_subscriptions(registry, group, subscription_table, correlator, timeout, notify_type_for_new, now_unix_secs).await;
    Ok(())
}

async fn start_unpaired_subscriptions(
    registry: &mut ServiceRegistry,
    group: GroupId,
    subscription_table: &dyn SubscriptionTable,
    correlator: &RequestCorrelator,
    timeout: Duration,
    notify_type: &str,
    now_unix_secs: u64,
) {
    let owned_paths = match registry.find_by_group(group) {
        Some(service) => service.registered_paths.clone(),
        None => return,
    };

    for path in owned_paths {
        let candidates = subscription_table.find_enabled_for_path(notify_type, &path).await;
        let still_unpaired: Vec<u32> = {
            let service = match registry.find_by_group(group) {
                Some(s) => s,
                None => return,
            };
            unpaired(service, &candidates).into_iter().map(|c| c.instance).collect()
        };

        for broker_instance in still_unpaired {
            if let Err(err) = subscribe::subscribe(registry, group, broker_instance, notify_type, &path, now_unix_secs, correlator, timeout).await {
                warn!("{} failed to start subscription {} for {}: {}", SUBSCRIPTION_BRIDGE_TAG, broker_instance, path, err);
            }
        }
    }
}

fn trailing_instance(path: &str) -> Option<u32> {
    path.trim_end_matches('.').rsplit('.').next()?.parse().ok()
}

/// One notification routed to the Controller owning `broker_instance`
/// (spec.md §4.F).
pub struct RoutedNotification {
    pub broker_instance: u32,
    pub payload: NotifyPayload,
}

/// Accepted only if (a) the Service is known (caller already resolved
/// `service`), (b) `send_resp = false`, (c) a `SubsMapEntry` exists for
/// `subscription_id`. `OperationComplete` additionally tears down the
/// matching `ReqMapEntry` and Request-table row (spec.md §4.F).
pub async fn route_notification(
    service: &mut Service,
    notify: &Notify,
    request_table: &dyn RequestTable,
) -> Result<RoutedNotification, BrokerError> {
    if notify.send_resp {
        return Err(BrokerError::RequestDenied("Notify carried send_resp=true".to_string()));
    }

    let entry = service
        .find_sub_map_by_subscription_id(&notify.subscription_id)
        .cloned()
        .ok_or_else(|| BrokerError::RequestDenied(format!("unknown subscription_id {}", notify.subscription_id)))?;

    if let NotifyPayload::OperationComplete { obj_path, command_key, .. } = &notify.payload {
        if let Some(req_entry) = service
            .req_map
            .iter()
            .find(|e| e.path.starts_with(obj_path.as_str()) && &e.command_key == command_key)
            .cloned()
        {
            service.remove_req_map(req_entry.request_instance);
            request_table.remove(req_entry.request_instance).await;
        }
    }

    Ok(RoutedNotification { broker_instance: entry.broker_instance, payload: notify.payload.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupId;
    use crate::registry::service::{ServiceId, SubsMapEntry};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct NoopRequestTable;
    #[async_trait]
    impl RequestTable for NoopRequestTable {
        async fn add(&self, _path: &str, _command_key: &str) -> u32 { 0 }
        async fn mark_active(&self, _instance: u32, _req_obj_path: &str) {}
        async fn complete(&self, _instance: u32, _output_args: HashMap<String, String>) {}
        async fn fail(&self, _instance: u32, _reason: &str) {}
        async fn remove(&self, _instance: u32) {}
        async fn command_key(&self, _instance: u32) -> Option<String> { None }
    }

    #[tokio::test]
    async fn rejects_notify_with_send_resp_true() {
        let mut service = Service::new(ServiceId(0), "svc".into(), GroupId::Group(1));
        let notify = Notify { subscription_id: "1-1-BROKER".to_string(), send_resp: true, payload: NotifyPayload::OnBoardRequest };
        let result = route_notification(&mut service, &notify, &NoopRequestTable).await;
        assert!(matches!(result, Err(BrokerError::RequestDenied(_))));
    }

    #[tokio::test]
    async fn routes_notify_matching_subs_map_entry() {
        let mut service = Service::new(ServiceId(0), "svc".into(), GroupId::Group(1));
        service.subs_map.push(SubsMapEntry {
            broker_instance: 5,
            service_instance: 1,
            path: "Device.Foo.".to_string(),
            subscription_id: "1-1-BROKER".to_string(),
        });
        let notify = Notify {
            subscription_id: "1-1-BROKER".to_string(),
            send_resp: false,
            payload: NotifyPayload::ValueChange { param_path: "Device.Foo.X".to_string(), param_value: "42".to_string() },
        };
        let result = route_notification(&mut service, &notify, &NoopRequestTable).await.unwrap();
        assert_eq!(result.broker_instance, 5);
    }
}

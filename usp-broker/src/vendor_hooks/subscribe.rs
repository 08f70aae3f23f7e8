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

//! Subscribe / Unsubscribe vendor hooks (spec.md §4.D).

use std::time::Duration;

use crate::correlator::RequestCorrelator;
use crate::error::BrokerError;
use crate::messages::MessageBuilders;
use crate::model::GroupId;
use crate::registry::service::SubsMapEntry;
use crate::registry::table::ServiceRegistry;
use crate::vendor_hooks::locate_controller_mtp;
use crate::wire::UspMessage;

/// Issues an `Add` on `Device.LocalAgent.Subscription.` with a
/// Broker-generated subscription id carrying the `BROKER` marker, and
/// records the resulting `SubsMapEntry` on success (spec.md §4.D
/// "Subscribe").
pub async fn subscribe(
    registry: &mut ServiceRegistry,
    group: GroupId,
    broker_instance: u32,
    notify_type: &str,
    path: &str,
    now_unix_secs: u64,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<(), BrokerError> {
    let subscription_id = MessageBuilders::broker_subscription_id(broker_instance, now_unix_secs);

    let (_, mtp) = locate_controller_mtp(registry, group)?;
    let request = MessageBuilders::subscribe_add(&subscription_id, notify_type, path);

    let response = correlator
        .send_and_wait(mtp.as_ref(), request, timeout)
        .await
        .ok_or_else(|| BrokerError::InternalError("Subscribe Add timed out".to_string()))?;

    let resp = match response.body {
        UspMessage::AddResp(resp) => resp,
        UspMessage::Error(err) => return Err(BrokerError::from_wire(err)),
        other => return Err(BrokerError::InternalError(format!("unexpected response to Subscribe Add: {}", other.kind()))),
    };

    let created = resp
        .created_obj_results
        .first()
        .ok_or_else(|| BrokerError::InternalError("Subscribe Add returned no created object".to_string()))?;

    if let Some(service) = registry.find_by_group_mut(group) {
        service.subs_map.push(SubsMapEntry {
            broker_instance,
            service_instance: created.instance,
            path: path.to_string(),
            subscription_id,
        });
    }

    Ok(())
}

/// Looks up the `(broker_instance, path)` pair, issues a `Delete` on the
/// Service's subscription row, then removes the map entry (spec.md §4.D
/// "Unsubscribe").
pub async fn unsubscribe(
    registry: &mut ServiceRegistry,
    group: GroupId,
    broker_instance: u32,
    path: &str,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<(), BrokerError> {
    let service_instance = {
        let service = registry
            .find_by_group(group)
            .ok_or_else(|| BrokerError::InternalError(format!("no service owns group {:?}", group)))?;
        service
            .subs_map
            .iter()
            .find(|e| e.broker_instance == broker_instance && e.path == path)
            .map(|e| e.service_instance)
            .ok_or_else(|| BrokerError::RequestDenied("no subs_map entry for (broker_instance, path)".to_string()))?
    };

    let (_, mtp) = locate_controller_mtp(registry, group)?;
    let request = MessageBuilders::unsubscribe_delete(service_instance);

    let response = correlator
        .send_and_wait(mtp.as_ref(), request, timeout)
        .await
        .ok_or_else(|| BrokerError::InternalError("Unsubscribe Delete timed out".to_string()))?;

    match response.body {
        UspMessage::DeleteResp(_) => {}
        UspMessage::Error(err) => return Err(BrokerError::from_wire(err)),
        other => return Err(BrokerError::InternalError(format!("unexpected response to Unsubscribe Delete: {}", other.kind()))),
    }

    if let Some(service) = registry.find_by_group_mut(group) {
        service.subs_map.retain(|e| !(e.broker_instance == broker_instance && e.path == path));
    }

    Ok(())
}

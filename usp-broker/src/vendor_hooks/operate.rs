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

//! Sync/Async Operate vendor hook (spec.md §4.D).

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::correlator::RequestCorrelator;
use crate::error::BrokerError;
use crate::messages::MessageBuilders;
use crate::model::{GroupId, RequestTable};
use crate::registry::service::ReqMapEntry;
use crate::registry::table::ServiceRegistry;
use crate::vendor_hooks::locate_controller_mtp;
use crate::wire::{OperateResp, UspMessage};

const ASYNC_OPERATE_TAG: &str = "VendorHookAdapter:async_operate:";

pub async fn sync_operate(
    registry: &ServiceRegistry,
    group: GroupId,
    command: String,
    command_key: String,
    input_args: HashMap<String, String>,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<OperateResp, BrokerError> {
    let (_, mtp) = locate_controller_mtp(registry, group)?;
    let request = MessageBuilders::operate(command, command_key, true, input_args);

    let response = correlator
        .send_and_wait(mtp.as_ref(), request, timeout)
        .await
        .ok_or_else(|| BrokerError::InternalError("Operate timed out".to_string()))?;

    match response.body {
        UspMessage::OperateResp(resp) => Ok(resp),
        UspMessage::Error(err) => Err(BrokerError::from_wire(err)),
        other => Err(BrokerError::InternalError(format!("unexpected response to Operate: {}", other.kind()))),
    }
}

/// Refuses to start unless the Service already has an `OperationComplete`
/// subscription covering `path` (otherwise the Broker could never close the
/// Request row). Inserts the `ReqMapEntry` *before* sending, avoiding a race
/// if the Service replies before the response is processed (spec.md §4.D).
pub async fn async_operate(
    registry: &mut ServiceRegistry,
    group: GroupId,
    path: String,
    request_instance: u32,
    input_args: HashMap<String, String>,
    request_table: &dyn RequestTable,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<(), BrokerError> {
    let command_key = request_table.command_key(request_instance).await.unwrap_or_default();

    let service_id = registry
        .find_by_group(group)
        .ok_or_else(|| BrokerError::InternalError(format!("no service owns group {:?}", group)))?
        .id;

    let has_operation_complete_subscription =
        registry.get(service_id).map(|s| s.subs_map.iter().any(|e| e.path == path)).unwrap_or(false);
    if !has_operation_complete_subscription {
        return Err(BrokerError::RequestDenied(format!(
            "no OperationComplete subscription exists for {}",
            path
        )));
    }

    let service = registry.get_mut(service_id).expect("looked up above");
    if service.find_req_map_by_path_and_key(&path, &command_key).is_some() {
        return Err(BrokerError::RequestDenied(format!(
            "duplicate (path, command_key) for {}",
            path
        )));
    }
    service.req_map.push(ReqMapEntry { request_instance, path: path.clone(), command_key: command_key.clone() });

    let (_, mtp) = locate_controller_mtp(registry, group)?;
    let request = MessageBuilders::operate(path.clone(), command_key, true, input_args);
    let response = correlator.send_and_wait(mtp.as_ref(), request, timeout).await;

    match response.map(|r| r.body) {
        Some(UspMessage::OperateResp(resp)) if resp.req_obj_path.is_some() => {
            request_table.mark_active(request_instance, resp.req_obj_path.as_deref().unwrap()).await;
            Ok(())
        }
        Some(UspMessage::OperateResp(resp)) => {
            debug!("{} unexpected synchronous completion for async command {}", ASYNC_OPERATE_TAG, path);
            request_table.complete(request_instance, resp.output_args).await;
            if let Some(service) = registry.get_mut(service_id) {
                service.remove_req_map(request_instance);
            }
            Ok(())
        }
        Some(UspMessage::Error(err)) => {
            if let Some(service) = registry.get_mut(service_id) {
                service.remove_req_map(request_instance);
            }
            Err(BrokerError::from_wire(err))
        }
        _ => {
            if let Some(service) = registry.get_mut(service_id) {
                service.remove_req_map(request_instance);
            }
            Err(BrokerError::InternalError(format!("Operate timed out for {}", path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupId;

    #[tokio::test]
    async fn async_operate_denied_without_operation_complete_subscription() {
        let mut registry = ServiceRegistry::new(2);
        registry.add("svc-a");
        let group = registry.iter().next().unwrap().group_id;

        struct NoopRequestTable;
        #[async_trait::async_trait]
        impl RequestTable for NoopRequestTable {
            async fn add(&self, _path: &str, _command_key: &str) -> u32 { 0 }
            async fn mark_active(&self, _instance: u32, _req_obj_path: &str) {}
            async fn complete(&self, _instance: u32, _output_args: HashMap<String, String>) {}
            async fn fail(&self, _instance: u32, _reason: &str) {}
            async fn remove(&self, _instance: u32) {}
            async fn command_key(&self, _instance: u32) -> Option<String> { Some("K".to_string()) }
        }

        let correlator = RequestCorrelator::new();
        let result = async_operate(
            &mut registry,
            group,
            "Device.Foo.Reboot()".to_string(),
            7,
            HashMap::new(),
            &NoopRequestTable,
            &correlator,
            Duration::from_millis(50),
        )
        .await;

        assert!(matches!(result, Err(BrokerError::RequestDenied(_))));
    }
}

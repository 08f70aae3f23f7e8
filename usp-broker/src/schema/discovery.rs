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

//! SchemaDiscovery: issues `GetSupportedDM`, parses the reply, registers
//! parameters/objects/events/commands (spec.md §4.C).

use tracing::{debug, warn};

use crate::messages::MessageBuilders;
use crate::model::{CommandSpec, DataModelStore, PermissionsStore};
use crate::registry::service::Service;
use crate::wire::GetSupportedDMResp;

const SCHEMA_DISCOVERY_TAG: &str = "SchemaDiscovery:";

/// Builds the outgoing `GetSupportedDM` and records its `msg_id` on the
/// Service so the reply can be matched (spec.md §4.C `dispatch_gsdm`).
pub fn dispatch_gsdm(service: &mut Service) -> crate::wire::UspRecord {
    let record = MessageBuilders::get_supported_dm(service.registered_paths.clone());
    service.gsdm_msg_id = Some(record.msg_id.clone());
    record
}

/// Outcome of a successfully applied GSDM response: top-level multi-instance
/// object paths that still need their instance cache seeded via
/// `GetInstances` (spec.md §4.C "seed the instance cache").
pub struct DiscoveryOutcome {
    pub objects_needing_instance_seed: Vec<String>,
}

/// `handle_gsdm_response` (spec.md §4.C). Silently drops replies that don't
/// match a pending discovery for this Service.
pub async fn handle_gsdm_response(
    service: &mut Service,
    reply_msg_id: &str,
    msg: &GetSupportedDMResp,
    data_model: &dyn DataModelStore,
    permissions: &dyn PermissionsStore,
) -> Option<DiscoveryOutcome> {
    if service.gsdm_msg_id.as_deref() != Some(reply_msg_id) {
        debug!(
            "{} dropping GSDM response: no pending discovery matches msg_id={}",
            SCHEMA_DISCOVERY_TAG, reply_msg_id
        );
        return None;
    }
    service.gsdm_msg_id = None;

    let mut objects_needing_instance_seed = Vec::new();

    for obj_result in &msg.req_obj_results {
        if !service.registered_paths.iter().any(|owned| owned == &obj_result.req_obj_path) {
            continue;
        }

        for supported_obj in &obj_result.supported_objs {
            if let Err(err) = data_model
                .register_object(
                    &supported_obj.supported_obj_path,
                    service.group_id,
                    supported_obj.access,
                    supported_obj.is_multi_instance,
                    &[],
                )
                .await
            {
                warn!("{} failed to register object {}: {}", SCHEMA_DISCOVERY_TAG, supported_obj.supported_obj_path, err);
                continue;
            }

            if supported_obj.is_multi_instance && supported_obj.supported_obj_path == obj_result.req_obj_path {
                objects_needing_instance_seed.push(supported_obj.supported_obj_path.clone());
            }

            for param in &supported_obj.supported_params {
                let path = format!("{}{}", supported_obj.supported_obj_path, param.param_name);
                if let Err(err) = data_model
                    .register_param(&path, service.group_id, param.access, param.value_type)
                    .await
                {
                    warn!("{} failed to register param {}: {}", SCHEMA_DISCOVERY_TAG, path, err);
                }
            }

            for event in &supported_obj.supported_events {
                let path = format!("{}{}", supported_obj.supported_obj_path, event.event_name);
                if let Err(err) = data_model
                    .register_event(&path, service.group_id, event.arg_names.clone())
                    .await
                {
                    warn!("{} failed to register event {}: {}", SCHEMA_DISCOVERY_TAG, path, err);
                }
            }

            for command in &supported_obj.supported_commands {
                let path = format!("{}{}", supported_obj.supported_obj_path, command.command_name);
                let spec = CommandSpec {
                    command_type: command.command_type,
                    input_args: command.input_arg_names.clone(),
                    output_args: command.output_arg_names.clone(),
                };
                if let Err(err) = data_model.register_command(&path, service.group_id, spec).await {
                    warn!("{} failed to register command {}: {}", SCHEMA_DISCOVERY_TAG, path, err);
                }
            }
        }

        permissions.apply_default_permissions(&obj_result.req_obj_path).await;
    }

    Some(DiscoveryOutcome { objects_needing_instance_seed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupId;
    use crate::registry::service::ServiceId;
    use crate::wire::{Access, CommandType, RequestedObjectResult, SupportedCommand, SupportedEvent, SupportedObject, SupportedParam};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeStore {
        registered_params: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl DataModelStore for FakeStore {
        async fn path_exists(&self, _path: &str) -> bool { false }
        async fn is_builtin(&self, _path: &str) -> bool { false }
        async fn owner_group(&self, _path: &str) -> Option<GroupId> { None }
        async fn register_provisional_object(&self, _path: &str, _group: GroupId) -> Result<(), String> { Ok(()) }
        async fn register_object(&self, _path: &str, _group: GroupId, _access: Access, _is_multi_instance: bool, _unique_keys: &[&str]) -> Result<(), String> { Ok(()) }
        async fn register_param(&self, path: &str, _group: GroupId, _access: Access, _value_type: crate::wire::ParamType) -> Result<(), String> {
            self.registered_params.lock().unwrap().push(path.to_string());
            Ok(())
        }
        async fn register_event(&self, _path: &str, _group: GroupId, _arg_names: Vec<String>) -> Result<(), String> { Ok(()) }
        async fn register_command(&self, _path: &str, _group: GroupId, _spec: CommandSpec) -> Result<(), String> { Ok(()) }
        async fn is_vendor_param(&self, _path: &str) -> bool { false }
        async fn deregister_subtree(&self, _path: &str, _group: GroupId) -> Result<(), String> { Ok(()) }
        async fn publish_usp_service_row(&self, _instance: u32, _fields: HashMap<String, String>) {}
        async fn delete_usp_service_row(&self, _instance: u32) {}
        async fn refresh_instance_cache(&self, _path: &str, _instances: Vec<(u32, HashMap<String, String>)>, _expiry_secs: i64) {}
    }

    #[derive(Default)]
    struct FakePermissions;

    #[async_trait]
    impl PermissionsStore for FakePermissions {
        async fn has_permission(&self, _originator: &str, _path: &str, _op: crate::model::Operation) -> bool { true }
        async fn apply_default_permissions(&self, _path: &str) {}
    }

    #[tokio::test]
    async fn registers_objects_params_events_and_commands() {
        let store = FakeStore::default();
        let permissions = FakePermissions;
        let mut service = Service::new(ServiceId(0), "svc".into(), GroupId::Group(1));
        service.registered_paths = vec!["Device.Foo.".to_string()];
        service.gsdm_msg_id = Some("BROKER-1-1".to_string());

        let msg = GetSupportedDMResp {
            req_obj_results: vec![RequestedObjectResult {
                req_obj_path: "Device.Foo.".to_string(),
                err_code: 0,
                err_msg: String::new(),
                supported_objs: vec![SupportedObject {
                    supported_obj_path: "Device.Foo.".to_string(),
                    access: Access::ReadWrite,
                    is_multi_instance: true,
                    supported_params: vec![SupportedParam {
                        param_name: "X".to_string(),
                        access: Access::ReadOnly,
                        value_type: crate::wire::ParamType::Int,
                    }],
                    supported_events: vec![SupportedEvent { event_name: "Changed!".to_string(), arg_names: vec![] }],
                    supported_commands: vec![SupportedCommand {
                        command_name: "Reboot()".to_string(),
                        command_type: CommandType::Async,
                        input_arg_names: vec![],
                        output_arg_names: vec![],
                    }],
                }],
            }],
        };

        let outcome = handle_gsdm_response(&mut service, "BROKER-1-1", &msg, &store, &permissions).await.unwrap();
        assert_eq!(outcome.objects_needing_instance_seed, vec!["Device.Foo.".to_string()]);
        assert!(service.gsdm_msg_id.is_none());
        assert_eq!(*store.registered_params.lock().unwrap(), vec!["Device.Foo.X".to_string()]);
    }

    #[tokio::test]
    async fn drops_response_with_mismatched_msg_id() {
        let store = FakeStore::default();
        let permissions = FakePermissions;
        let mut service = Service::new(ServiceId(0), "svc".into(), GroupId::Group(1));
        service.gsdm_msg_id = Some("BROKER-1-1".to_string());

        let msg = GetSupportedDMResp { req_obj_results: vec![] };
        let outcome = handle_gsdm_response(&mut service, "BROKER-2-1", &msg, &store, &permissions).await;
        assert!(outcome.is_none());
        assert!(service.gsdm_msg_id.is_some());
    }
}

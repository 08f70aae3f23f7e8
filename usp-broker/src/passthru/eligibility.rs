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

//! Shared eligibility checks for the passthru fast path (spec.md §4.H
//! numbered preconditions 1-5).

use crate::model::{DataModelStore, GroupId, Operation, PermissionsStore};
use crate::registry::service::ServiceId;
use crate::registry::table::ServiceRegistry;

/// Preconditions 2-3: every referenced node exists, is owned by a single
/// non-`NON_GROUPED` group, and that group's owner is a live Service with a
/// usable controller-direction MTP. Returns the resolved `(ServiceId,
/// GroupId)` pair, or `None` if passthru is not eligible.
pub async fn resolve_single_owner(
    registry: &ServiceRegistry,
    data_model: &dyn DataModelStore,
    paths: &[String],
) -> Option<(ServiceId, GroupId)> {
    if paths.is_empty() {
        return None;
    }

    let mut owner: Option<GroupId> = None;
    for path in paths {
        if !data_model.path_exists(path).await {
            return None;
        }
        let group = data_model.owner_group(path).await?;
        if !group.is_grouped() {
            return None;
        }
        match owner {
            None => owner = Some(group),
            Some(existing) if existing == group => {}
            Some(_) => return None,
        }
    }

    let group = owner?;
    let service = registry.find_by_group(group)?;
    service.controller_mtp.as_ref()?;
    Some((service.id, group))
}

/// Precondition 4: the originator's combined role confers `op` on every path
/// (spec.md §4.H.4: "recursively for Get ... and on each child parameter
/// listed for Set/Add" — recursion itself is the `PermissionsStore`
/// implementation's responsibility, since this crate only sees the flat
/// path it was asked to check).
pub async fn all_paths_permitted(
    permissions: &dyn PermissionsStore,
    originator: &str,
    paths: &[String],
    op: Operation,
) -> bool {
    for path in paths {
        if !permissions.has_permission(originator, path, op).await {
            return false;
        }
    }
    true
}

/// Precondition 5: every child parameter identified for a Set/Add exists in
/// the schema and is a vendor parameter (spec.md §4.H.5), in addition to
/// carrying the operation-specific permission.
pub async fn params_permitted(
    data_model: &dyn DataModelStore,
    permissions: &dyn PermissionsStore,
    originator: &str,
    obj_path: &str,
    param_names: impl Iterator<Item = impl AsRef<str>>,
    op: Operation,
) -> bool {
    for name in param_names {
        let full_path = format!("{}{}", obj_path, name.as_ref());
        if !data_model.is_vendor_param(&full_path).await {
            return false;
        }
        if !permissions.has_permission(originator, &full_path, op).await {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtp::{ComparableMtp, MtpConnection, MtpSendError};
    use crate::wire::UspRecord;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct NoopMtp;

    #[async_trait]
    impl MtpConnection for NoopMtp {
        async fn send(&self, _record: UspRecord) -> Result<(), MtpSendError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        owners: HashMap<String, GroupId>,
    }

    #[async_trait]
    impl DataModelStore for FakeStore {
        async fn path_exists(&self, path: &str) -> bool {
            self.owners.contains_key(path)
        }
        async fn is_builtin(&self, _path: &str) -> bool {
            false
        }
        async fn owner_group(&self, path: &str) -> Option<GroupId> {
            self.owners.get(path).copied()
        }
        async fn register_provisional_object(&self, _path: &str, _group: GroupId) -> Result<(), String> {
            Ok(())
        }
        async fn register_object(
            &self,
            _path: &str,
            _group: GroupId,
            _access: crate::wire::Access,
            _is_multi_instance: bool,
            _unique_keys: &[&str],
        ) -> Result<(), String> {
            Ok(())
        }
        async fn register_param(&self, _path: &str, _group: GroupId, _access: crate::wire::Access, _value_type: crate::wire::ParamType) -> Result<(), String> {
            Ok(())
        }
        async fn register_event(&self, _path: &str, _group: GroupId, _arg_names: Vec<String>) -> Result<(), String> {
            Ok(())
        }
        async fn register_command(&self, _path: &str, _group: GroupId, _spec: crate::model::CommandSpec) -> Result<(), String> {
            Ok(())
        }
        async fn is_vendor_param(&self, path: &str) -> bool {
            self.owners.contains_key(path)
        }
        async fn deregister_subtree(&self, _path: &str, _group: GroupId) -> Result<(), String> {
            Ok(())
        }
        async fn publish_usp_service_row(&self, _instance: u32, _fields: HashMap<String, String>) {}
        async fn delete_usp_service_row(&self, _instance: u32) {}
        async fn refresh_instance_cache(&self, _path: &str, _instances: Vec<(u32, HashMap<String, String>)>, _expiry_secs: i64) {}
    }

    fn registry_with_one_service() -> (ServiceRegistry, GroupId) {
        let mut registry = ServiceRegistry::new(2);
        let service = registry.add("svc-a").unwrap();
        let group = service.group_id;
        let id = service.id;
        registry.update_mtp(id, crate::registry::table::MtpRole::Controller, ComparableMtp::new(Arc::new(NoopMtp)));
        (registry, group)
    }

    #[tokio::test]
    async fn resolves_owner_when_all_paths_share_one_group() {
        let (registry, group) = registry_with_one_service();
        let mut store = FakeStore::default();
        store.owners.insert("Device.Foo.X".to_string(), group);
        store.owners.insert("Device.Foo.Y".to_string(), group);

        let resolved = resolve_single_owner(&registry, &store, &["Device.Foo.X".to_string(), "Device.Foo.Y".to_string()]).await;
        assert!(resolved.is_some());
    }

    #[tokio::test]
    async fn declines_when_paths_span_two_groups() {
        let (mut registry, group_a) = registry_with_one_service();
        let service_b = registry.add("svc-b").unwrap();
        let group_b = service_b.group_id;
        let id_b = service_b.id;
        registry.update_mtp(id_b, crate::registry::table::MtpRole::Controller, ComparableMtp::new(Arc::new(NoopMtp)));

        let mut store = FakeStore::default();
        store.owners.insert("Device.Foo.X".to_string(), group_a);
        store.owners.insert("Device.Bar.Y".to_string(), group_b);

        let resolved = resolve_single_owner(&registry, &store, &["Device.Foo.X".to_string(), "Device.Bar.Y".to_string()]).await;
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn declines_nongrouped_paths() {
        let (registry, _) = registry_with_one_service();
        let mut store = FakeStore::default();
        store.owners.insert("Device.Builtin.X".to_string(), GroupId::NonGrouped);

        let resolved = resolve_single_owner(&registry, &store, &["Device.Builtin.X".to_string()]).await;
        assert!(resolved.is_none());
    }
}

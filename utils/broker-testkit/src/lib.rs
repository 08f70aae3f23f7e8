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

//! In-memory fakes of `usp-broker`'s injected collaborators
//! (`DataModelStore`, `PermissionsStore`, `RequestTable`,
//! `SubscriptionTable`, `MtpConnection`), for use in integration tests and
//! the `cli`-feature demo binary. None of these persist anything or talk to
//! a real transport; they exist purely to drive the Broker end-to-end
//! without a real USP Agent sitting behind it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use usp_broker::model::{
    BrokerSubscription, CommandSpec, DataModelStore, GroupId, Operation, PermissionsStore, RequestTable,
    SubscriptionTable,
};
use usp_broker::mtp::{MtpConnection, MtpSendError};
use usp_broker::wire::{Access, ParamType, UspRecord};

/// One schema node as the in-memory store knows it.
#[derive(Debug, Clone)]
struct NodeEntry {
    group: GroupId,
    access: Access,
    is_multi_instance: bool,
    value_type: ParamType,
    is_vendor_param: bool,
}

#[derive(Default)]
struct DataModelState {
    nodes: HashMap<String, NodeEntry>,
    builtins: HashSet<String>,
    instance_cache: HashMap<String, Vec<(u32, HashMap<String, String>)>>,
    usp_service_rows: HashMap<u32, HashMap<String, String>>,
}

/// A `DataModelStore` backed by a plain `HashMap`, with no persistence and
/// no path-tree invariants beyond what the Broker itself enforces.
#[derive(Default)]
pub struct InMemoryDataModelStore {
    state: Mutex<DataModelState>,
}

impl InMemoryDataModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a path as part of the Broker's built-in schema, as the demo
    /// binary's `Device.LocalAgent.` tree would be.
    pub fn seed_builtin(&self, path: impl Into<String>) {
        self.state.lock().unwrap().builtins.insert(path.into());
    }

    pub fn instance_cache_snapshot(&self, path: &str) -> Vec<(u32, HashMap<String, String>)> {
        self.state.lock().unwrap().instance_cache.get(path).cloned().unwrap_or_default()
    }

    pub fn usp_service_row(&self, instance: u32) -> Option<HashMap<String, String>> {
        self.state.lock().unwrap().usp_service_rows.get(&instance).cloned()
    }
}

#[async_trait]
impl DataModelStore for InMemoryDataModelStore {
    async fn path_exists(&self, path: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.nodes.contains_key(path) || state.builtins.contains(path)
    }

    async fn is_builtin(&self, path: &str) -> bool {
        self.state.lock().unwrap().builtins.contains(path)
    }

    async fn owner_group(&self, path: &str) -> Option<GroupId> {
        self.state.lock().unwrap().nodes.get(path).map(|n| n.group)
    }

    async fn register_provisional_object(&self, path: &str, group: GroupId) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            path.to_string(),
            NodeEntry { group, access: Access::ReadWrite, is_multi_instance: false, value_type: ParamType::String, is_vendor_param: false },
        );
        Ok(())
    }

    async fn register_object(
        &self,
        path: &str,
        group: GroupId,
        access: Access,
        is_multi_instance: bool,
        _unique_keys: &[&str],
    ) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            path.to_string(),
            NodeEntry { group, access, is_multi_instance, value_type: ParamType::String, is_vendor_param: false },
        );
        Ok(())
    }

    async fn register_param(&self, path: &str, group: GroupId, access: Access, value_type: ParamType) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            path.to_string(),
            NodeEntry { group, access, is_multi_instance: false, value_type, is_vendor_param: true },
        );
        Ok(())
    }

    async fn register_event(&self, path: &str, group: GroupId, _arg_names: Vec<String>) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            path.to_string(),
            NodeEntry { group, access: Access::ReadOnly, is_multi_instance: false, value_type: ParamType::String, is_vendor_param: false },
        );
        Ok(())
    }

    async fn register_command(&self, path: &str, group: GroupId, _spec: CommandSpec) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            path.to_string(),
            NodeEntry { group, access: Access::ReadWrite, is_multi_instance: false, value_type: ParamType::String, is_vendor_param: false },
        );
        Ok(())
    }

    async fn is_vendor_param(&self, path: &str) -> bool {
        self.state.lock().unwrap().nodes.get(path).map(|n| n.is_vendor_param).unwrap_or(false)
    }

    async fn deregister_subtree(&self, path: &str, group: GroupId) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        state.nodes.retain(|owned_path, entry| !(owned_path.starts_with(path) && entry.group == group));
        state.instance_cache.retain(|owned_path, _| !owned_path.starts_with(path));
        Ok(())
    }

    async fn publish_usp_service_row(&self, instance: u32, fields: HashMap<String, String>) {
        self.state.lock().unwrap().usp_service_rows.insert(instance, fields);
    }

    async fn delete_usp_service_row(&self, instance: u32) {
        self.state.lock().unwrap().usp_service_rows.remove(&instance);
    }

    async fn refresh_instance_cache(&self, path: &str, instances: Vec<(u32, HashMap<String, String>)>, _expiry_secs: i64) {
        self.state.lock().unwrap().instance_cache.insert(path.to_string(), instances);
    }
}

/// A `PermissionsStore` granting every operation by default, with an
/// explicit deny-list for tests that need a forbidden-parameter scenario
/// (spec.md §8: the passthru-decline-on-forbidden-parameter case).
#[derive(Default)]
pub struct StaticPermissionsStore {
    denied: Mutex<HashSet<(String, String, OperationKey)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum OperationKey {
    Get,
    Set,
    Add,
    Delete,
    Operate,
    Subscribe,
}

impl From<Operation> for OperationKey {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Get => OperationKey::Get,
            Operation::Set => OperationKey::Set,
            Operation::Add => OperationKey::Add,
            Operation::Delete => OperationKey::Delete,
            Operation::Operate => OperationKey::Operate,
            Operation::Subscribe => OperationKey::Subscribe,
        }
    }
}

impl StaticPermissionsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Denies `op` on `path` for `originator` from now on.
    pub fn deny(&self, originator: impl Into<String>, path: impl Into<String>, op: Operation) {
        self.denied.lock().unwrap().insert((originator.into(), path.into(), op.into()));
    }
}

#[async_trait]
impl PermissionsStore for StaticPermissionsStore {
    async fn has_permission(&self, originator: &str, path: &str, op: Operation) -> bool {
        !self.denied.lock().unwrap().contains(&(originator.to_string(), path.to_string(), op.into()))
    }

    async fn apply_default_permissions(&self, _path: &str) {}
}

struct RequestRow {
    command_key: String,
}

/// A `RequestTable` backed by a plain `HashMap`, keyed by a process-lifetime
/// monotonic counter rather than any schema-backed instance allocator.
#[derive(Default)]
pub struct InMemoryRequestTable {
    rows: Mutex<HashMap<u32, RequestRow>>,
    next_instance: AtomicU32,
}

impl InMemoryRequestTable {
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()), next_instance: AtomicU32::new(1) }
    }
}

#[async_trait]
impl RequestTable for InMemoryRequestTable {
    async fn add(&self, _path: &str, command_key: &str) -> u32 {
        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
        self.rows.lock().unwrap().insert(instance, RequestRow { command_key: command_key.to_string() });
        instance
    }

    async fn mark_active(&self, _instance: u32, _req_obj_path: &str) {}

    async fn complete(&self, instance: u32, _output_args: HashMap<String, String>) {
        self.rows.lock().unwrap().remove(&instance);
    }

    async fn fail(&self, instance: u32, _reason: &str) {
        self.rows.lock().unwrap().remove(&instance);
    }

    async fn remove(&self, instance: u32) {
        self.rows.lock().unwrap().remove(&instance);
    }

    async fn command_key(&self, instance: u32) -> Option<String> {
        self.rows.lock().unwrap().get(&instance).map(|row| row.command_key.clone())
    }
}

/// A `SubscriptionTable` backed by a plain `Vec`, populated up front by the
/// test/demo driving the Broker rather than discovered dynamically.
#[derive(Default)]
pub struct InMemorySubscriptionTable {
    rows: Mutex<Vec<BrokerSubscription>>,
}

impl InMemorySubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: BrokerSubscription) {
        self.rows.lock().unwrap().push(row);
    }
}

#[async_trait]
impl SubscriptionTable for InMemorySubscriptionTable {
    async fn find_enabled_for_path(&self, notify_type: &str, path: &str) -> Vec<BrokerSubscription> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.enable && row.notify_type == notify_type && row.reference_list.iter().any(|r| r == path))
            .cloned()
            .collect()
    }

    async fn get(&self, instance: u32) -> Option<BrokerSubscription> {
        self.rows.lock().unwrap().iter().find(|row| row.instance == instance).cloned()
    }
}

/// An `MtpConnection` that records every record handed to it instead of
/// sending it anywhere, with an optional canned responder driving a fake
/// Service's side of the conversation.
pub struct RecordingMtp {
    sent: Mutex<Vec<UspRecord>>,
    closed: std::sync::atomic::AtomicBool,
}

impl Default for RecordingMtp {
    fn default() -> Self {
        Self { sent: Mutex::new(Vec::new()), closed: std::sync::atomic::AtomicBool::new(false) }
    }
}

impl RecordingMtp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_records(&self) -> Vec<UspRecord> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_sent(&self) -> Option<UspRecord> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl MtpConnection for RecordingMtp {
    async fn send(&self, record: UspRecord) -> Result<(), MtpSendError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(MtpSendError("connection closed".to_string()));
        }
        self.sent.lock().unwrap().push(record);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usp_broker::wire::UspMessage;

    #[tokio::test]
    async fn data_model_store_tracks_ownership_and_deregisters_by_group() {
        let store = InMemoryDataModelStore::new();
        let group_a = GroupId::Group(1);
        let group_b = GroupId::Group(2);

        store.register_provisional_object("Device.Foo.", group_a).await.unwrap();
        store.register_provisional_object("Device.Bar.", group_b).await.unwrap();

        assert_eq!(store.owner_group("Device.Foo.").await, Some(group_a));
        store.deregister_subtree("Device.Foo.", group_a).await.unwrap();
        assert_eq!(store.owner_group("Device.Foo.").await, None);
        assert_eq!(store.owner_group("Device.Bar.").await, Some(group_b));
    }

    #[tokio::test]
    async fn permissions_store_denies_only_what_was_explicitly_denied() {
        let permissions = StaticPermissionsStore::new();
        assert!(permissions.has_permission("ctrl-a", "Device.Foo.Secret", Operation::Get).await);

        permissions.deny("ctrl-a", "Device.Foo.Secret", Operation::Get);
        assert!(!permissions.has_permission("ctrl-a", "Device.Foo.Secret", Operation::Get).await);
        assert!(permissions.has_permission("ctrl-a", "Device.Foo.Secret", Operation::Set).await);
    }

    #[tokio::test]
    async fn request_table_round_trips_command_key_until_removed() {
        let table = InMemoryRequestTable::new();
        let instance = table.add("Device.Foo.Reboot()", "key-1").await;
        assert_eq!(table.command_key(instance).await, Some("key-1".to_string()));
        table.complete(instance, HashMap::new()).await;
        assert_eq!(table.command_key(instance).await, None);
    }

    #[tokio::test]
    async fn recording_mtp_rejects_sends_once_closed() {
        let mtp = RecordingMtp::new();
        let record = UspRecord::new("1", UspMessage::GetInstances(Default::default()));
        assert!(mtp.send(record).await.is_ok());
        assert_eq!(mtp.sent_records().len(), 1);

        mtp.close();
        let record = UspRecord::new("2", UspMessage::GetInstances(Default::default()));
        assert!(mtp.send(record).await.is_err());
    }
}

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

//! External collaborators the generic data-model agent provides (spec §1):
//! the data-model store, the permissions/roles store, and the Request and
//! Subscription tables. This crate only calls their published operations;
//! it never owns schema storage, instance storage, or permission policy.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::wire::{Access, CommandType, ParamType};

/// Internal handle tagging every data-model node owned by one Service
/// (spec §3: `group_id`). `NON_GROUPED` nodes belong to the Broker's own
/// built-in schema and are never eligible for passthru (spec §4.H.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupId {
    NonGrouped,
    Group(u32),
}

impl GroupId {
    pub fn is_grouped(self) -> bool {
        !matches!(self, GroupId::NonGrouped)
    }
}

/// The data-model operation a permission check is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Set,
    Add,
    Delete,
    Operate,
    Subscribe,
}

/// What schema-discovery learned about one supported command (spec §4.C).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub command_type: CommandType,
    pub input_args: Vec<String>,
    pub output_args: Vec<String>,
}

/// The generic data-model store: path resolution, schema, and the instance
/// cache (spec §1, §4.C). `dyn`-safe so a hosting agent can inject any
/// concrete implementation.
#[async_trait]
pub trait DataModelStore: Send + Sync {
    /// True if `path` already exists, whether built-in or vendor-owned.
    async fn path_exists(&self, path: &str) -> bool;

    /// True if `path` is part of the Broker's own built-in schema (spec
    /// §4.B.3: a registered path "does not exist in the built-in schema").
    async fn is_builtin(&self, path: &str) -> bool;

    /// The group id owning `path`, if any. `NonGrouped` (or `None`) makes the
    /// node ineligible for passthru.
    async fn owner_group(&self, path: &str) -> Option<GroupId>;

    /// Reserves `path` as a provisional single-instance object under
    /// `group`, ahead of schema discovery confirming its true shape (spec
    /// §4.B.4).
    async fn register_provisional_object(&self, path: &str, group: GroupId) -> Result<(), String>;

    /// Registers `path` as multi- or single-instance per GSDM (spec §4.C),
    /// replacing any provisional registration.
    async fn register_object(
        &self,
        path: &str,
        group: GroupId,
        access: Access,
        is_multi_instance: bool,
        unique_keys: &[&str],
    ) -> Result<(), String>;

    async fn register_param(
        &self,
        path: &str,
        group: GroupId,
        access: Access,
        value_type: ParamType,
    ) -> Result<(), String>;

    async fn register_event(
        &self,
        path: &str,
        group: GroupId,
        arg_names: Vec<String>,
    ) -> Result<(), String>;

    async fn register_command(
        &self,
        path: &str,
        group: GroupId,
        spec: CommandSpec,
    ) -> Result<(), String>;

    /// True if `path` names a registered vendor parameter (spec §4.H.5: Set/
    /// Add child parameters "exist in the schema and are vendor parameters").
    async fn is_vendor_param(&self, path: &str) -> bool;

    /// Removes every node at or under `path` and detaches them from `group`
    /// (spec §4.B "deregister the subtree from the schema", §4.I "detach all
    /// vendor hooks for the group").
    async fn deregister_subtree(&self, path: &str, group: GroupId) -> Result<(), String>;

    /// Publishes an addition/deletion row for
    /// `Device.USPServices.USPService.{i}` (spec §6).
    async fn publish_usp_service_row(&self, instance: u32, fields: HashMap<String, String>);
    async fn delete_usp_service_row(&self, instance: u32);

    /// Seeds or refreshes the instance cache for a top-level multi-instance
    /// object (spec §4.C "seed the instance cache by issuing a
    /// `GetInstances`"). `expiry_secs` follows spec §4.D's RefreshInstances
    /// contract (`-1` means "valid only for the current message").
    async fn refresh_instance_cache(
        &self,
        path: &str,
        instances: Vec<(u32, HashMap<String, String>)>,
        expiry_secs: i64,
    );
}

/// Originator role permissions, consulted on the passthru fast path
/// (spec §4.H.4).
#[async_trait]
pub trait PermissionsStore: Send + Sync {
    /// True if the combined role of `originator` confers `op` on `path`.
    async fn has_permission(&self, originator: &str, path: &str, op: Operation) -> bool;

    /// Applies the originating agent's default role permissions to a newly
    /// discovered subtree (spec §4.C "apply role permissions to the new
    /// subtree").
    async fn apply_default_permissions(&self, path: &str);
}

/// One row of the generic agent's Request table (spec §3 `ReqMapEntry`,
/// §4.G).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    Active,
    Completed,
    Failed(String),
}

/// The Request table: rows tracking in-flight asynchronous USP commands,
/// independent of the Broker's own `req_map` bookkeeping (spec §3 invariant
/// 4: "A `ReqMapEntry` exists iff its Request-table row exists").
#[async_trait]
pub trait RequestTable: Send + Sync {
    async fn add(&self, path: &str, command_key: &str) -> u32;
    async fn mark_active(&self, instance: u32, req_obj_path: &str);
    async fn complete(&self, instance: u32, output_args: HashMap<String, String>);
    async fn fail(&self, instance: u32, reason: &str);
    async fn remove(&self, instance: u32);

    /// The caller-supplied `CommandKey` recorded for `instance`, read from
    /// `Device.LocalAgent.Request.{i}.CommandKey` in the original
    /// implementation (spec.md §4.D `Broker_AsyncOperate`).
    async fn command_key(&self, instance: u32) -> Option<String>;
}

/// One row of the generic agent's Subscription table.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSubscription {
    pub instance: u32,
    pub notify_type: String,
    pub reference_list: Vec<String>,
    pub enable: bool,
}

/// The Subscription table: rows the Broker's own Controller-facing
/// subscription mechanism maintains, independent of each Service's
/// subscription table (spec §4.F).
#[async_trait]
pub trait SubscriptionTable: Send + Sync {
    /// All enabled rows for `path` whose handler is the Broker's vendor
    /// layer, regardless of pairing state.
    async fn find_enabled_for_path(&self, notify_type: &str, path: &str) -> Vec<BrokerSubscription>;

    async fn get(&self, instance: u32) -> Option<BrokerSubscription>;
}

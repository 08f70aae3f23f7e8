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

//! ServiceRegistry: the fixed-capacity Service table (spec.md §4.A).

use std::num::NonZeroU32;

use tracing::debug;

use crate::model::GroupId;
use crate::mtp::ComparableMtp;
use crate::registry::service::Service;

const SERVICE_REGISTRY_TAG: &str = "ServiceRegistry:";

/// Which MTP-direction slot an `update_mtp` call targets (spec.md §3
/// `controller_mtp`/`agent_mtp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtpRole {
    Controller,
    Agent,
}

/// Fixed-capacity arena of connected Services, indexed by slot with free-list
/// reuse (spec.md §9 design note: "a pool indexed by slot is fine ... prefer
/// an arena ... so instance numbers remain monotone").
pub struct ServiceRegistry {
    slots: Vec<Option<Service>>,
    free_slots: Vec<usize>,
    next_group_id: u32,
    capacity: usize,
}

impl ServiceRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            next_group_id: 1,
            capacity,
        }
    }

    /// Allocates a slot and a fresh `group_id` for a new Service (spec.md
    /// §4.A `add`). `instance` is recomputed as `max(existing)+1` over the
    /// currently-live slots on every call (spec.md §3), so a freed instance
    /// number is reassigned once it is again the highest live one. Returns
    /// `None` on capacity exhaustion (`BrokerErrorCode::ResourcesExceeded`,
    /// mapped by the caller).
    pub fn add(&mut self, endpoint_id: impl Into<String>) -> Option<&mut Service> {
        let endpoint_id = endpoint_id.into();
        let group = GroupId::Group(self.next_group_id);

        let slot_index = if let Some(reused) = self.free_slots.pop() {
            reused
        } else if self.slots.len() < self.capacity {
            self.slots.push(None);
            self.slots.len() - 1
        } else {
            return None;
        };

        self.next_group_id += 1;
        let instance = self
            .slots
            .iter()
            .flatten()
            .filter_map(|s| s.instance)
            .map(NonZeroU32::get)
            .max()
            .unwrap_or(0)
            + 1;

        let mut service = Service::new(
            crate::registry::service::ServiceId(slot_index as u32),
            endpoint_id,
            group,
        );
        service.instance = NonZeroU32::new(instance);
        debug!(
            "{} add: slot={} group={:?} instance={:?}",
            SERVICE_REGISTRY_TAG, slot_index, group, service.instance
        );
        self.slots[slot_index] = Some(service);
        self.slots[slot_index].as_mut()
    }

    pub fn get(&self, id: crate::registry::service::ServiceId) -> Option<&Service> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: crate::registry::service::ServiceId) -> Option<&mut Service> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn find_by_endpoint(&self, endpoint_id: &str) -> Option<&Service> {
        self.slots.iter().flatten().find(|s| s.endpoint_id == endpoint_id)
    }

    pub fn find_by_endpoint_mut(&mut self, endpoint_id: &str) -> Option<&mut Service> {
        self.slots.iter_mut().flatten().find(|s| s.endpoint_id == endpoint_id)
    }

    /// Looks up a Service by its public instance number. `controller_only`
    /// resolves the §9 `flags` ambiguity literally: when set, a Service with
    /// no controller side is treated as not found, never matched via a
    /// stray bitwise combination.
    pub fn find_by_instance(&self, instance: u32, controller_only: bool) -> Option<&Service> {
        self.slots.iter().flatten().find(|s| {
            s.instance.map(NonZeroU32::get) == Some(instance)
                && (!controller_only || s.has_controller)
        })
    }

    pub fn find_by_group(&self, group: GroupId) -> Option<&Service> {
        self.slots.iter().flatten().find(|s| s.group_id == group)
    }

    pub fn find_by_group_mut(&mut self, group: GroupId) -> Option<&mut Service> {
        self.slots.iter_mut().flatten().find(|s| s.group_id == group)
    }

    /// Replaces the role-appropriate MTP handle, releasing whatever handle
    /// occupied that slot (spec.md §4.A `update_mtp`).
    pub fn update_mtp(&mut self, id: crate::registry::service::ServiceId, role: MtpRole, mtp: ComparableMtp) {
        if let Some(service) = self.get_mut(id) {
            match role {
                MtpRole::Controller => service.controller_mtp = Some(mtp),
                MtpRole::Agent => service.agent_mtp = Some(mtp),
            }
        }
    }

    /// Releases the slot entirely, returning the removed `Service` so the
    /// caller (`LifecycleManager`) can cascade teardown against the data
    /// model and Request/Subscription tables (spec.md §4.A `free`).
    pub fn free(&mut self, id: crate::registry::service::ServiceId) -> Option<Service> {
        let slot = self.slots.get_mut(id.0 as usize)?;
        let removed = slot.take();
        if removed.is_some() {
            self.free_slots.push(id.0 as usize);
            debug!("{} free: slot={}", SERVICE_REGISTRY_TAG, id.0);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Service> {
        self.slots.iter_mut().flatten()
    }

    /// Finds the Service whose `msg_map` carries `broker_msg_id` (spec.md
    /// §4.H: "match by `msg_id` in any Service's `msg_map`").
    pub fn find_by_broker_msg_id_mut(&mut self, broker_msg_id: &str) -> Option<&mut Service> {
        self.iter_mut().find(|s| s.find_msg_map_by_broker_id(broker_msg_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_allocates_distinct_monotone_instances() {
        let mut registry = ServiceRegistry::new(2);
        let first = registry.add("svc-a").unwrap().instance;
        let second = registry.add("svc-b").unwrap().instance;
        assert!(first.unwrap().get() < second.unwrap().get());
    }

    #[test]
    fn add_fails_once_capacity_exhausted() {
        let mut registry = ServiceRegistry::new(1);
        assert!(registry.add("svc-a").is_some());
        assert!(registry.add("svc-b").is_none());
    }

    #[test]
    fn free_recycles_slot_and_reissues_freed_instance() {
        let mut registry = ServiceRegistry::new(1);
        let id = registry.add("svc-a").unwrap().id;
        registry.free(id);
        let new_service = registry.add("svc-b").unwrap();
        assert_eq!(new_service.id, id);
        assert_eq!(new_service.instance.unwrap().get(), 1);
    }

    #[test]
    fn add_does_not_reuse_a_freed_instance_while_a_higher_one_is_still_live() {
        let mut registry = ServiceRegistry::new(2);
        let first = registry.add("svc-a").unwrap().id;
        let _second = registry.add("svc-b").unwrap().instance.unwrap().get();
        registry.free(first);
        // instance 1 is free but instance 2 ("svc-b") is still live, so
        // max(existing)+1 is 3, not a reuse of 1.
        let third = registry.add("svc-c").unwrap();
        assert_eq!(third.instance.unwrap().get(), 3);
    }

    #[test]
    fn find_by_instance_respects_controller_only_flag() {
        let mut registry = ServiceRegistry::new(1);
        let service = registry.add("svc-a").unwrap();
        let instance = service.instance.unwrap().get();
        service.has_controller = false;

        assert!(registry.find_by_instance(instance, false).is_some());
        assert!(registry.find_by_instance(instance, true).is_none());
    }
}

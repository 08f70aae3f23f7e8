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

//! Notify passthru (spec.md §4.H "For `Notify` passthru").
//!
//! Uses the identical subscription-id lookup as the normal
//! `SubscriptionBridge::route_notification` path, but declines a few
//! notification kinds that need a DB transaction the passthru context
//! cannot safely perform inline.

use crate::registry::service::Service;
use crate::wire::{Notify, NotifyPayload};

/// True if `notify`'s kind is eligible to bypass the generic router.
/// `OperationComplete` and `OnBoardRequest` always require the generic path;
/// `ObjectCreation`/`ObjectDeletion` are excluded only while the enclosing
/// passthru message is an `Add` still awaiting its response (spec.md §4.H).
fn eligible_kind(notify: &Notify, enclosing_add_in_flight: bool) -> bool {
    match &notify.payload {
        NotifyPayload::OperationComplete { .. } => false,
        NotifyPayload::OnBoardRequest => false,
        NotifyPayload::ObjectCreation { .. } | NotifyPayload::ObjectDeletion { .. } => !enclosing_add_in_flight,
        NotifyPayload::ValueChange { .. } | NotifyPayload::Event { .. } => true,
    }
}

/// Returns the `broker_instance` to route `notify` to directly, or `None` if
/// the generic `SubscriptionBridge` path must handle it instead.
pub fn attempt(service: &Service, notify: &Notify, enclosing_add_in_flight: bool) -> Option<u32> {
    if notify.send_resp {
        return None;
    }
    if !eligible_kind(notify, enclosing_add_in_flight) {
        return None;
    }
    service.find_sub_map_by_subscription_id(&notify.subscription_id).map(|e| e.broker_instance)
}

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

//! Delete / MultiDelete vendor hook (spec.md §4.D).

use std::time::Duration;

use crate::correlator::RequestCorrelator;
use crate::error::BrokerError;
use crate::messages::MessageBuilders;
use crate::model::GroupId;
use crate::registry::table::ServiceRegistry;
use crate::vendor_hooks::locate_controller_mtp;
use crate::wire::{DeleteResp, UspMessage};

/// Always sent with `allow_partial = false` internally; only the
/// MultiDelete hook forwards the caller's flag (spec.md §4.D).
pub async fn delete(
    registry: &ServiceRegistry,
    group: GroupId,
    obj_paths: Vec<String>,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<DeleteResp, BrokerError> {
    send_delete(registry, group, obj_paths, false, correlator, timeout).await
}

/// MultiDelete forwards the caller's `allow_partial`; a single-path Delete
/// always uses `false` (spec.md §4.D).
pub async fn multi_delete(
    registry: &ServiceRegistry,
    group: GroupId,
    obj_paths: Vec<String>,
    allow_partial: bool,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<DeleteResp, BrokerError> {
    send_delete(registry, group, obj_paths, allow_partial, correlator, timeout).await
}

async fn send_delete(
    registry: &ServiceRegistry,
    group: GroupId,
    obj_paths: Vec<String>,
    allow_partial: bool,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<DeleteResp, BrokerError> {
    let (_, mtp) = locate_controller_mtp(registry, group)?;
    let request = MessageBuilders::delete(obj_paths, allow_partial);

    let response = correlator
        .send_and_wait(mtp.as_ref(), request, timeout)
        .await
        .ok_or_else(|| BrokerError::InternalError("Delete timed out".to_string()))?;

    match response.body {
        UspMessage::DeleteResp(resp) => Ok(resp),
        UspMessage::Error(err) => Err(BrokerError::from_wire(err)),
        other => Err(BrokerError::InternalError(format!("unexpected response to Delete: {}", other.kind()))),
    }
}

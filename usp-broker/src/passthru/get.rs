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

//! Get passthru (spec.md §4.H).

use crate::error::BrokerError;
use crate::messages::next_msg_id;
use crate::model::{DataModelStore, Operation, PermissionsStore};
use crate::mtp::{ComparableMtp, MtpSendError};
use crate::passthru::eligibility::{all_paths_permitted, resolve_single_owner};
use crate::registry::service::MsgMapEntry;
use crate::registry::table::ServiceRegistry;
use crate::wire::{Get, UspMessage, UspRecord};

/// Attempts the passthru fast path for a `Get` request. Returns `Ok(true)`
/// if the request was forwarded (the generic handler must not also run),
/// `Ok(false)` if passthru is not eligible and the generic path should
/// handle it, or `Err` if eligibility held but the forward itself failed.
#[allow(clippy::too_many_arguments)]
pub async fn attempt(
    registry: &mut ServiceRegistry,
    data_model: &dyn DataModelStore,
    permissions: &dyn PermissionsStore,
    originator_endpoint: &str,
    reply_mtp: ComparableMtp,
    original_msg_id: &str,
    get: Get,
    now_unix_secs: u64,
) -> Result<bool, BrokerError> {
    let Some((service_id, _group)) = resolve_single_owner(registry, data_model, &get.param_paths).await else {
        return Ok(false);
    };
    if !all_paths_permitted(permissions, originator_endpoint, &get.param_paths, Operation::Get).await {
        return Ok(false);
    }

    let mtp = match registry.get(service_id).and_then(|s| s.controller_mtp.clone()) {
        Some(mtp) => mtp,
        None => return Ok(false),
    };

    let broker_msg_id = next_msg_id(now_unix_secs);
    let record = UspRecord::new(broker_msg_id.clone(), UspMessage::Get(get));

    if let Some(service) = registry.get_mut(service_id) {
        service.msg_map.push(MsgMapEntry {
            original_msg_id: original_msg_id.to_string(),
            broker_msg_id,
            originator_endpoint: originator_endpoint.to_string(),
            reply_mtp,
        });
    }

    mtp.inner()
        .send(record)
        .await
        .map_err(|MtpSendError(reason)| BrokerError::InternalError(reason))?;
    Ok(true)
}

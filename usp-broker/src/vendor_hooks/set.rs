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

//! Set vendor hook (spec.md §4.D).

use std::collections::HashMap;
use std::time::Duration;

use crate::correlator::RequestCorrelator;
use crate::error::BrokerError;
use crate::messages::MessageBuilders;
use crate::model::GroupId;
use crate::registry::table::ServiceRegistry;
use crate::vendor_hooks::locate_controller_mtp;
use crate::wire::{SetResp, UspMessage};

/// Always sent with `allow_partial = false` internally (spec.md §4.D
/// "Set/Add/Delete are always sent with `allow_partial = false` internally
/// unless the caller is the MultiDelete hook").
pub async fn set(
    registry: &ServiceRegistry,
    group: GroupId,
    updates: Vec<(String, HashMap<String, String>)>,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<SetResp, BrokerError> {
    let (_, mtp) = locate_controller_mtp(registry, group)?;
    let request = MessageBuilders::set(updates);

    let response = correlator
        .send_and_wait(mtp.as_ref(), request, timeout)
        .await
        .ok_or_else(|| BrokerError::InternalError("Set timed out".to_string()))?;

    match response.body {
        UspMessage::SetResp(resp) => Ok(resp),
        UspMessage::Error(err) => Err(BrokerError::from_wire(err)),
        other => Err(BrokerError::InternalError(format!("unexpected response to Set: {}", other.kind()))),
    }
}

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

//! Add / CreateObject vendor hook (spec.md §4.D).

use std::collections::HashMap;
use std::time::Duration;

use crate::correlator::RequestCorrelator;
use crate::error::BrokerError;
use crate::messages::MessageBuilders;
use crate::model::GroupId;
use crate::registry::table::ServiceRegistry;
use crate::vendor_hooks::locate_controller_mtp;
use crate::wire::{AddResp, ParamError, UspMessage};

pub async fn add(
    registry: &ServiceRegistry,
    group: GroupId,
    obj_path: String,
    param_values: HashMap<String, String>,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<AddResp, BrokerError> {
    let known_param_names: Vec<String> = param_values.keys().cloned().collect();
    let (_, mtp) = locate_controller_mtp(registry, group)?;
    let request = MessageBuilders::add(obj_path, param_values);

    let response = correlator
        .send_and_wait(mtp.as_ref(), request, timeout)
        .await
        .ok_or_else(|| BrokerError::InternalError("Add timed out".to_string()))?;

    match response.body {
        UspMessage::AddResp(mut resp) => {
            for result in &mut resp.created_obj_results {
                result.param_errs = tail_match_param_errors(&result.param_errs, &known_param_names)
                    .into_iter()
                    .map(|(name, err)| ParamError { param: name.to_string(), err_code: err.err_code, err_msg: err.err_msg.clone() })
                    .collect();
            }
            Ok(resp)
        }
        UspMessage::Error(err) => Err(BrokerError::from_wire(err)),
        other => Err(BrokerError::InternalError(format!("unexpected response to Add: {}", other.kind()))),
    }
}

/// Propagates per-parameter errors from `param_errs[]` back into the
/// caller's parameter array by tail-matching the reported path against
/// known parameter names (spec.md §4.D "CreateObject").
pub fn tail_match_param_errors<'a>(
    param_errs: &'a [ParamError],
    known_param_names: &[String],
) -> Vec<(&'a str, &'a ParamError)> {
    param_errs
        .iter()
        .filter_map(|err| {
            known_param_names
                .iter()
                .find(|name| err.param.ends_with(name.as_str()))
                .map(|name| (name.as_str(), err))
        })
        .collect()
}

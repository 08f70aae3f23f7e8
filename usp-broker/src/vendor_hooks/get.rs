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

//! Get vendor hook (spec.md §4.D).

use std::time::Duration;

use crate::correlator::RequestCorrelator;
use crate::error::BrokerError;
use crate::messages::MessageBuilders;
use crate::model::GroupId;
use crate::registry::table::ServiceRegistry;
use crate::vendor_hooks::locate_controller_mtp;
use crate::wire::{GetResp, ParamError, ResolvedPathResult, UspMessage};

/// Placeholder err_code for a requested parameter the Service's response
/// left out entirely or reported with an empty value.
const GET_PARAM_MISSING_ERR_CODE: u32 = 9008;

/// Expects one `resolved_path_result` per requested path with exactly one
/// parameter; missing/empty values cause per-parameter errors without
/// aborting the remainder (spec.md §4.D "Get").
pub async fn get(
    registry: &ServiceRegistry,
    group: GroupId,
    param_paths: Vec<String>,
    max_depth: Option<u32>,
    correlator: &RequestCorrelator,
    timeout: Duration,
) -> Result<GetResp, BrokerError> {
    let (_, mtp) = locate_controller_mtp(registry, group)?;
    let request = MessageBuilders::get(param_paths.clone(), max_depth);

    let response = correlator
        .send_and_wait(mtp.as_ref(), request, timeout)
        .await
        .ok_or_else(|| BrokerError::InternalError("Get timed out".to_string()))?;

    match response.body {
        UspMessage::GetResp(resp) => Ok(normalize_missing_params(resp, &param_paths)),
        UspMessage::Error(err) => Err(BrokerError::from_wire(err)),
        other => Err(BrokerError::InternalError(format!("unexpected response to Get: {}", other.kind()))),
    }
}

/// For each row whose `result_params` came back empty, and for each
/// requested path with no corresponding row at all, records a
/// per-parameter `ParamError` instead of silently dropping it, so a caller
/// can see which requested paths the Service failed to resolve (spec.md
/// §4.D "Get"). A returned row "corresponds" to a requested path if either
/// is a prefix of the other, so object-prefix-style Gets (e.g. the
/// SubscriptionBridge's `Device.LocalAgent.Subscription.` table scan, whose
/// rows are deeper instance paths under the requested prefix) are left
/// alone rather than flagged as missing.
fn normalize_missing_params(resp: GetResp, requested: &[String]) -> GetResp {
    let mut rows: Vec<ResolvedPathResult> = resp
        .resolved_path_results
        .into_iter()
        .map(|mut row| {
            if row.result_params.is_empty() || row.result_params.values().any(|v| v.is_empty()) {
                row.param_errs.push(ParamError {
                    param: row.resolved_path.clone(),
                    err_code: GET_PARAM_MISSING_ERR_CODE,
                    err_msg: "parameter value missing or empty".to_string(),
                });
            }
            row
        })
        .collect();

    for path in requested {
        let covered = rows.iter().any(|r| r.resolved_path.starts_with(path.as_str()) || path.starts_with(r.resolved_path.as_str()));
        if !covered {
            rows.push(ResolvedPathResult {
                resolved_path: path.clone(),
                result_params: Default::default(),
                param_errs: vec![ParamError {
                    param: path.clone(),
                    err_code: GET_PARAM_MISSING_ERR_CODE,
                    err_msg: "parameter not present in response".to_string(),
                }],
            });
        }
    }
    GetResp { resolved_path_results: rows }
}

#[cfg(test)]
mod normalize_tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn flags_missing_path_with_no_matching_row() {
        let resp = GetResp { resolved_path_results: vec![] };
        let normalized = normalize_missing_params(resp, &["Device.Foo.X".to_string()]);
        assert_eq!(normalized.resolved_path_results.len(), 1);
        assert_eq!(normalized.resolved_path_results[0].param_errs.len(), 1);
    }

    #[test]
    fn flags_row_with_empty_value_without_aborting_others() {
        let resp = GetResp {
            resolved_path_results: vec![
                ResolvedPathResult { resolved_path: "Device.Foo.X".to_string(), result_params: HashMap::from([("X".to_string(), String::new())]), param_errs: vec![] },
                ResolvedPathResult { resolved_path: "Device.Foo.Y".to_string(), result_params: HashMap::from([("Y".to_string(), "42".to_string())]), param_errs: vec![] },
            ],
        };
        let normalized = normalize_missing_params(resp, &["Device.Foo.X".to_string(), "Device.Foo.Y".to_string()]);
        assert_eq!(normalized.resolved_path_results.len(), 2);
        assert_eq!(normalized.resolved_path_results[0].param_errs.len(), 1);
        assert!(normalized.resolved_path_results[1].param_errs.is_empty());
    }

    #[test]
    fn leaves_object_prefix_style_rows_untouched() {
        let resp = GetResp {
            resolved_path_results: vec![ResolvedPathResult {
                resolved_path: "Device.LocalAgent.Subscription.1.".to_string(),
                result_params: HashMap::from([("ID".to_string(), "1-1-BROKER".to_string())]),
                param_errs: vec![],
            }],
        };
        let normalized = normalize_missing_params(resp, &["Device.LocalAgent.Subscription.".to_string()]);
        assert_eq!(normalized.resolved_path_results.len(), 1);
        assert!(normalized.resolved_path_results[0].param_errs.is_empty());
    }
}

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

//! RefreshInstances vendor hook (spec.md §4.D).

use std::time::Duration;

use crate::correlator::RequestCorrelator;
use crate::error::BrokerError;
use crate::messages::MessageBuilders;
use crate::model::{DataModelStore, GroupId};
use crate::registry::table::ServiceRegistry;
use crate::vendor_hooks::locate_controller_mtp;
use crate::wire::UspMessage;

/// Extracts the trailing instance number from an instantiated path such as
/// `Device.Foo.3.`.
fn trailing_instance_number(instantiated_path: &str) -> Option<u32> {
    instantiated_path.trim_end_matches('.').rsplit('.').next()?.parse().ok()
}

/// Issues `GetInstances` for `path` and seeds the instance cache. Always
/// reports an expiry of -1 ("valid only for the current message"): passthru
/// flows do not update the cache, so a longer expiry would desynchronize it
/// (spec.md §4.D).
pub async fn refresh_instances(
    registry: &ServiceRegistry,
    group: GroupId,
    path: String,
    data_model: &dyn DataModelStore,
    correlator: &RequestCorrelator,
    timeout: Duration,
    expiry_secs: i64,
) -> Result<(), BrokerError> {
    let (_, mtp) = locate_controller_mtp(registry, group)?;
    let request = MessageBuilders::get_instances(vec![path.clone()]);

    let response = correlator
        .send_and_wait(mtp.as_ref(), request, timeout)
        .await
        .ok_or_else(|| BrokerError::InternalError("GetInstances timed out".to_string()))?;

    let resp = match response.body {
        UspMessage::GetInstancesResp(resp) => resp,
        UspMessage::Error(err) => return Err(BrokerError::from_wire(err)),
        other => return Err(BrokerError::InternalError(format!("unexpected response to GetInstances: {}", other.kind()))),
    };

    for result in &resp.req_path_results {
        let instances = result
            .curr_insts
            .iter()
            .filter_map(|inst| trailing_instance_number(&inst.instantiated_path).map(|n| (n, inst.unique_keys.clone())))
            .collect();
        data_model.refresh_instance_cache(&result.requested_path, instances, expiry_secs).await;
    }

    Ok(())
}

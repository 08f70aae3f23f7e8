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

//! RequestBridge: owns `req_map`, pairing in-flight Operate requests with
//! Request-table rows (spec.md §4.G).

use tracing::debug;

use crate::model::RequestTable;
use crate::registry::service::Service;

const REQUEST_BRIDGE_TAG: &str = "RequestBridge:";

/// Completes every active command under `path` with `CommandFailure`,
/// removing both the `ReqMapEntry` and its Request-table row together
/// (spec.md §3 invariant 4, §4.G "if the caller requests it, every active
/// command is completed with `COMMAND_FAILURE`").
pub async fn fail_all_under(service: &mut Service, path: &str, request_table: &dyn RequestTable, reason: &str) {
    let (to_fail, remaining): (Vec<_>, Vec<_>) = service.req_map.drain(..).partition(|e| e.path.starts_with(path));
    service.req_map = remaining;

    for entry in to_fail {
        debug!("{} failing request_instance={} path={}: {}", REQUEST_BRIDGE_TAG, entry.request_instance, entry.path, reason);
        request_table.fail(entry.request_instance, reason).await;
        request_table.remove(entry.request_instance).await;
    }
}

/// Fails every active command on the Service, regardless of path (spec.md
/// §4.I "complete all active commands as failed if the caller requested").
pub async fn fail_all(service: &mut Service, request_table: &dyn RequestTable, reason: &str) {
    fail_all_under(service, "", request_table, reason).await;
}

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

//! Pure queries over a Service's `req_map` (spec.md §3 `ReqMapEntry`).

use crate::registry::service::{ReqMapEntry, Service};

/// `(path, command_key)` uniqueness check (spec.md §3 invariant on
/// `ReqMapEntry`).
pub fn find<'a>(service: &'a Service, path: &str, command_key: &str) -> Option<&'a ReqMapEntry> {
    service.find_req_map_by_path_and_key(path, command_key)
}

pub fn all_under<'a>(service: &'a Service, path: &str) -> Vec<&'a ReqMapEntry> {
    service.req_map.iter().filter(|e| e.path.starts_with(path)).collect()
}

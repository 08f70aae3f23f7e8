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

pub mod bridge;
pub mod req_map;

pub use bridge::{fail_all, fail_all_under};

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

//! Build/runtime-tunable constants from spec §6.
//!
//! Grounded in the teacher's workspace convention of a small, serde-derived
//! settings struct with a `Default` impl matching the spec's stated defaults;
//! the `cli` feature's demo binary loads overrides from a TOML file via the
//! `config` crate.

use serde::{Deserialize, Serialize};

/// Tunable limits and timeouts governing one `UspBroker` instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Upper bound on simultaneously-connected Services.
    pub max_usp_services: usize,
    /// Upper bound on distinct vendor parameter groups the data-model store
    /// will hand out `group_id`s for. Not enforced by this crate directly
    /// (it is a property of `DataModelStore`), but carried here so a hosting
    /// agent can size both consistently.
    pub max_vendor_param_groups: usize,
    /// Maximum length, in bytes, of a data-model path this crate will accept.
    pub max_dm_path: usize,
    /// Maximum length, in bytes, of a USP message id.
    pub max_msg_id_len: usize,
    /// Maximum number of parameters making up a compound unique key.
    pub max_compound_key_params: usize,
    /// How long `RequestCorrelator::send_and_wait` blocks before giving up.
    pub response_timeout: std::time::Duration,
    /// Seconds of validity reported to the instance cache for
    /// Broker-triggered `RefreshInstances`. Spec requires this be `-1`
    /// ("valid only for the current message") in production; tests may
    /// override it to assert caching behavior in isolation from passthru.
    pub broker_instance_cache_expiry_secs: i64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_usp_services: 16,
            max_vendor_param_groups: 64,
            max_dm_path: 256,
            max_msg_id_len: 64,
            max_compound_key_params: 8,
            response_timeout: std::time::Duration::from_secs(30),
            broker_instance_cache_expiry_secs: -1,
        }
    }
}

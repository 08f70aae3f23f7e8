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

//! MessageBuilders: pure constructors for the Broker's own outgoing messages
//! (spec.md §4.J).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::wire::{
    Add, Delete, Get, GetInstances, GetSupportedDM, Operate, OperStatus, Set, UspMessage, UspRecord,
};

static MSG_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Builds the Broker's outgoing `msg_id`: `BROKER-<monotonic counter>-
/// <unix-seconds>`, unique within the process lifetime and never reused
/// after restart (spec.md §4.J). The literal `BROKER` marker lets
/// reconciliation recognize the Broker's own artifacts (spec.md §6).
pub fn next_msg_id(now_unix_secs: u64) -> String {
    let counter = MSG_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("BROKER-{}-{}", counter, now_unix_secs)
}

fn unix_now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Pure constructors for requests the Broker sends to a Service. Each
/// returns a ready-to-send [`UspRecord`] with a freshly allocated `msg_id`.
pub struct MessageBuilders;

impl MessageBuilders {
    pub fn get_supported_dm(obj_paths: Vec<String>) -> UspRecord {
        UspRecord::new(
            next_msg_id(unix_now_secs()),
            UspMessage::GetSupportedDM(GetSupportedDM {
                obj_paths,
                first_level_only: false,
                return_commands: true,
                return_events: true,
                return_params: true,
            }),
        )
    }

    pub fn get(param_paths: Vec<String>, max_depth: Option<u32>) -> UspRecord {
        UspRecord::new(
            next_msg_id(unix_now_secs()),
            UspMessage::Get(Get { param_paths, max_depth }),
        )
    }

    pub fn set(updates: Vec<(String, HashMap<String, String>)>) -> UspRecord {
        UspRecord::new(
            next_msg_id(unix_now_secs()),
            UspMessage::Set(Set { allow_partial: false, updates }),
        )
    }

    pub fn add(obj_path: String, param_values: HashMap<String, String>) -> UspRecord {
        UspRecord::new(
            next_msg_id(unix_now_secs()),
            UspMessage::Add(Add { allow_partial: false, obj_path, param_values }),
        )
    }

    pub fn delete(obj_paths: Vec<String>, allow_partial: bool) -> UspRecord {
        UspRecord::new(
            next_msg_id(unix_now_secs()),
            UspMessage::Delete(Delete { allow_partial, obj_paths }),
        )
    }

    pub fn operate(command: String, command_key: String, send_resp: bool, input_args: HashMap<String, String>) -> UspRecord {
        UspRecord::new(
            next_msg_id(unix_now_secs()),
            UspMessage::Operate(Operate { command, command_key, send_resp, input_args }),
        )
    }

    pub fn get_instances(obj_paths: Vec<String>) -> UspRecord {
        UspRecord::new(
            next_msg_id(unix_now_secs()),
            UspMessage::GetInstances(GetInstances { obj_paths }),
        )
    }

    /// Builds a `Subscribe` request: an `Add` under
    /// `Device.LocalAgent.Subscription.` carrying a Broker-generated
    /// subscription id with the `BROKER` marker (spec.md §4.D).
    pub fn subscribe_add(subscription_id: &str, notify_type: &str, reference_list: &str) -> UspRecord {
        let mut params = HashMap::new();
        params.insert("ID".to_string(), subscription_id.to_string());
        params.insert("NotifType".to_string(), notify_type.to_string());
        params.insert("ReferenceList".to_string(), reference_list.to_string());
        params.insert("Persistent".to_string(), "false".to_string());
        params.insert("NotifRetry".to_string(), "false".to_string());
        params.insert("Enable".to_string(), "true".to_string());
        Self::add("Device.LocalAgent.Subscription.".to_string(), params)
    }

    /// Builds an `Unsubscribe` request: a `Delete` of the Service's
    /// subscription row by its `service_instance` (spec.md §4.D).
    pub fn unsubscribe_delete(service_instance: u32) -> UspRecord {
        Self::delete(vec![format!("Device.LocalAgent.Subscription.{}.", service_instance)], false)
    }

    /// One "`Broker`-generated subscription id carrying a recognizable
    /// marker": `<broker_instance>-<epoch>-BROKER` (spec.md §8 scenario 3:
    /// `"1-<epoch>-BROKER"`).
    pub fn broker_subscription_id(broker_instance: u32, now_unix_secs: u64) -> String {
        format!("{}-{}-BROKER", broker_instance, now_unix_secs)
    }
}

/// Helper constructing a success/failure `OperStatus` pair for response
/// builders in `registration`/`vendor_hooks`, kept here since both draw on
/// the same wire-level shape.
pub fn success<S>(value: S) -> OperStatus<S> {
    OperStatus::Success(value)
}

pub fn failure<S>(err_code: u32, err_msg: impl Into<String>) -> OperStatus<S> {
    OperStatus::Failure { err_code, err_msg: err_msg.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_msg_id_matches_broker_marker_pattern() {
        let id = next_msg_id(1_700_000_000);
        assert!(id.starts_with("BROKER-"));
        assert!(id.ends_with("-1700000000"));
    }

    #[test]
    fn next_msg_id_is_unique_across_calls() {
        let a = next_msg_id(1);
        let b = next_msg_id(1);
        assert_ne!(a, b);
    }

    #[test]
    fn broker_subscription_id_carries_marker() {
        let id = MessageBuilders::broker_subscription_id(1, 1_700_000_000);
        assert_eq!(id, "1-1700000000-BROKER");
        assert!(id.ends_with("BROKER"));
    }
}

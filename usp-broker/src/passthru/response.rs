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

//! Response/ERROR passthru (spec.md §4.H "For `Response`/`ERROR`").

use crate::mtp::ComparableMtp;
use crate::registry::table::ServiceRegistry;
use crate::wire::UspRecord;

/// A response rewritten back to the originator's own `msg_id`, ready to
/// send over the `MsgMapEntry`'s `reply_mtp`.
pub struct RewrittenResponse {
    pub originator_endpoint: String,
    pub reply_mtp: ComparableMtp,
    pub record: UspRecord,
}

/// Matches `response.msg_id` against any Service's `msg_map`; on hit,
/// rewrites `msg_id` back to `original_msg_id` and removes the entry
/// (spec.md §4.H, §8 invariant 4: "an `MsgMapEntry` is removed exactly
/// once"). Returns `None` if no Service has a pending passthru for this id,
/// meaning the response belongs to an ordinary correlated request instead.
pub fn match_response(registry: &mut ServiceRegistry, mut response: UspRecord) -> Option<RewrittenResponse> {
    let broker_msg_id = response.msg_id.clone();
    let service = registry.find_by_broker_msg_id_mut(&broker_msg_id)?;
    let entry = service.remove_msg_map_by_broker_id(&broker_msg_id)?;
    response.msg_id = entry.original_msg_id;
    Some(RewrittenResponse {
        originator_endpoint: entry.originator_endpoint,
        reply_mtp: entry.reply_mtp,
        record: response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtp::{MtpConnection, MtpSendError};
    use crate::registry::service::MsgMapEntry;
    use crate::wire::UspMessage;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoopMtp;

    #[async_trait]
    impl MtpConnection for NoopMtp {
        async fn send(&self, _record: UspRecord) -> Result<(), MtpSendError> {
            Ok(())
        }
    }

    #[test]
    fn rewrites_msg_id_and_removes_entry_once() {
        let mut registry = ServiceRegistry::new(1);
        let id = registry.add("svc-a").unwrap().id;
        if let Some(service) = registry.get_mut(id) {
            service.msg_map.push(MsgMapEntry {
                original_msg_id: "orig-1".to_string(),
                broker_msg_id: "BROKER-1-1".to_string(),
                originator_endpoint: "controller-a".to_string(),
                reply_mtp: ComparableMtp::new(Arc::new(NoopMtp)),
            });
        }

        let response = UspRecord::new("BROKER-1-1", UspMessage::GetResp(Default::default()));
        let rewritten = match_response(&mut registry, response).expect("should match");
        assert_eq!(rewritten.record.msg_id, "orig-1");
        assert_eq!(rewritten.originator_endpoint, "controller-a");

        let service = registry.get(id).unwrap();
        assert!(service.msg_map.is_empty());

        let second = UspRecord::new("BROKER-1-1", UspMessage::GetResp(Default::default()));
        assert!(match_response(&mut registry, second).is_none());
    }
}

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

//! Pure queries over a Service's `subs_map` (spec.md §3 `SubsMapEntry`).

use crate::model::BrokerSubscription;
use crate::registry::service::Service;

/// Broker-side subscriptions not yet paired with a row in this Service's
/// `subs_map` (spec.md §4.F: "any Broker subscription still unpaired").
pub fn unpaired<'a>(service: &Service, candidates: &'a [BrokerSubscription]) -> Vec<&'a BrokerSubscription> {
    candidates
        .iter()
        .filter(|candidate| !service.subs_map.iter().any(|entry| entry.broker_instance == candidate.instance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupId;
    use crate::registry::service::{ServiceId, SubsMapEntry};

    #[test]
    fn filters_out_already_paired_subscriptions() {
        let mut service = Service::new(ServiceId(0), "svc".into(), GroupId::Group(1));
        service.subs_map.push(SubsMapEntry {
            broker_instance: 1,
            service_instance: 1,
            path: "Device.Foo.".to_string(),
            subscription_id: "1-1-BROKER".to_string(),
        });

        let candidates = vec![
            BrokerSubscription { instance: 1, notify_type: "ValueChange".to_string(), reference_list: vec!["Device.Foo.".to_string()], enable: true },
            BrokerSubscription { instance: 2, notify_type: "ValueChange".to_string(), reference_list: vec!["Device.Bar.".to_string()], enable: true },
        ];

        let result = unpaired(&service, &candidates);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].instance, 2);
    }
}

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

//! VendorHookAdapter: the generic data model's vendor hooks, implemented by
//! emitting USP requests to the owning Service and awaiting replies
//! (spec.md §4.D). Every hook shares the same five-step skeleton; this
//! module's `locate_controller_mtp` covers steps 1-2.

pub mod add;
pub mod delete;
pub mod get;
pub mod operate;
pub mod refresh_instances;
pub mod set;
pub mod subscribe;

use std::sync::Arc;

use crate::error::BrokerError;
use crate::model::GroupId;
use crate::mtp::MtpConnection;
use crate::registry::service::ServiceId;
use crate::registry::table::ServiceRegistry;

/// Steps 1-2 of the shared hook skeleton: locate the Service owning `group`
/// and confirm its controller-direction MTP is up.
pub(crate) fn locate_controller_mtp(
    registry: &ServiceRegistry,
    group: GroupId,
) -> Result<(ServiceId, Arc<dyn MtpConnection>), BrokerError> {
    let service = registry
        .find_by_group(group)
        .ok_or_else(|| BrokerError::InternalError(format!("no service owns group {:?}", group)))?;
    let mtp = service
        .controller_mtp
        .as_ref()
        .ok_or_else(|| BrokerError::InternalError("controller-direction MTP is down".to_string()))?;
    Ok((service.id, mtp.inner().clone()))
}

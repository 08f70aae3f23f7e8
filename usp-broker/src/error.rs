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

//! Broker error taxonomy.
//!
//! Mirrors the error categories of the originating USP Broker implementation's
//! `USP_ERR_*` codes, but expressed as a typed Rust enum instead of bare
//! integers so callers can match on it directly.

use crate::wire::Error as WireError;

/// Discriminant carried on the wire inside a USP ERROR response body.
///
/// The numeric values are not meaningful outside this crate (the real wire
/// codec, out of scope here, would map these onto the USP error code space);
/// they only need to be stable within one process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BrokerErrorCode {
    MessageNotUnderstood = 1,
    RegisterFailure = 2,
    DeregisterFailure = 3,
    PathAlreadyRegistered = 4,
    ResourcesExceeded = 5,
    RequestDenied = 6,
    CommandFailure = 7,
    InternalError = 8,
}

/// Error taxonomy from spec §7.
#[derive(Debug, thiserror::Error, Clone)]
pub enum BrokerError {
    #[error("message not understood: {0}")]
    MessageNotUnderstood(String),

    #[error("register failure: {0}")]
    RegisterFailure(String),

    #[error("deregister failure: {0}")]
    DeregisterFailure(String),

    #[error("path already registered: {0}")]
    PathAlreadyRegistered(String),

    #[error("resources exceeded: {0}")]
    ResourcesExceeded(String),

    #[error("request denied: {0}")]
    RequestDenied(String),

    #[error("command failure: {0}")]
    CommandFailure(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl BrokerError {
    pub fn code(&self) -> BrokerErrorCode {
        match self {
            BrokerError::MessageNotUnderstood(_) => BrokerErrorCode::MessageNotUnderstood,
            BrokerError::RegisterFailure(_) => BrokerErrorCode::RegisterFailure,
            BrokerError::DeregisterFailure(_) => BrokerErrorCode::DeregisterFailure,
            BrokerError::PathAlreadyRegistered(_) => BrokerErrorCode::PathAlreadyRegistered,
            BrokerError::ResourcesExceeded(_) => BrokerErrorCode::ResourcesExceeded,
            BrokerError::RequestDenied(_) => BrokerErrorCode::RequestDenied,
            BrokerError::CommandFailure(_) => BrokerErrorCode::CommandFailure,
            BrokerError::InternalError(_) => BrokerErrorCode::InternalError,
        }
    }

    /// Reconstructs a `BrokerError` from a wire-level `Error` received from
    /// a Service, for surfacing ERROR responses to requests the Broker sent
    /// (spec §7: "ERROR response messages for requests the Broker sent are
    /// surfaced to the caller"). The specific variant is approximated from
    /// the carried message since the wire codec is out of scope here.
    pub fn from_wire(wire: WireError) -> Self {
        BrokerError::CommandFailure(wire.message)
    }

    /// Converts this error into the wire-level `Error` message value, for
    /// embedding into a USP ERROR response body (spec §7: "User-visible
    /// failures are always delivered as a USP ERROR ... never as a process
    /// abort").
    pub fn into_wire_error(self) -> WireError {
        let code = self.code();
        WireError {
            code: code as u32,
            message: self.to_string(),
        }
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;

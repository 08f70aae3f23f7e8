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

//! A USP (TR-369) Broker: a protocol-level multiplexer standing between one
//! or more USP Controllers and several USP Services, presenting the union of
//! their data models as a single USP Agent.
//!
//! # Internal architecture map
//!
//! - [`registry`] owns the `ServiceRegistry` (the connected-Service table)
//!   and [`registry::lifecycle`]'s connect/disconnect cascades.
//! - [`registration`] validates and applies `Register`/`Deregister`.
//! - [`schema`] drives `GetSupportedDM` discovery once a Service registers.
//! - [`vendor_hooks`] implements the generic data model's vendor hooks by
//!   round-tripping a USP request to the owning Service through
//!   [`correlator`].
//! - [`passthru`] is the fast path that forwards a whole Get/Set/Add/Delete
//!   straight through to a single owning Service, bypassing the vendor-hook
//!   round trip entirely.
//! - [`subscriptions`] and [`requests`] keep the Broker's own subscription
//!   and request bookkeeping paired against each Service's.
//! - [`api::broker::UspBroker`] ties all of the above into one facade, the
//!   way the teacher's `UStreamer` ties together its forwarding rules and
//!   subscription cache.
//!
//! # Observability model
//!
//! Every module logs through `tracing` with a module-scoped `TAG` constant
//! (e.g. `SERVICE_REGISTRY_TAG`, `LIFECYCLE_TAG`) prefixed to each line,
//! rather than a single crate-wide target. User-visible failures are always
//! returned as a typed [`error::BrokerError`] and converted to a USP ERROR
//! response; nothing in this crate panics on a malformed message.
//!
//! # Non-goals
//!
//! This crate does not parse or serialize the USP protobuf wire format (see
//! [`wire`]), does not store the data model tree itself (see [`model`]), and
//! does not implement an MTP transport (see [`mtp`]). All three are
//! collaborators a hosting agent injects.

pub mod api;
pub mod config;
pub mod correlator;
pub mod error;
pub mod messages;
pub mod model;
pub mod mtp;
pub mod passthru;
pub mod registration;
pub mod registry;
pub mod requests;
pub mod schema;
pub mod subscriptions;
pub mod vendor_hooks;
pub mod wire;

pub use api::broker::UspBroker;
pub use error::{BrokerError, BrokerResult};

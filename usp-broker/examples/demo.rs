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

//! Minimal driver that wires a [`UspBroker`] to the in-memory fakes from
//! `broker-testkit` and runs the "happy path register" scenario (spec.md
//! §8 scenario 1) end to end, printing what crossed the wire. There is no
//! real MTP transport here — see `usp_broker::mtp` for the seam a hosting
//! agent fills in with UDS/MQTT/WebSocket/STOMP.

use std::path::PathBuf;
use std::sync::Arc;

use broker_testkit::{InMemoryDataModelStore, InMemoryRequestTable, InMemorySubscriptionTable, RecordingMtp, StaticPermissionsStore};
use clap::Parser;
use tracing::info;
use usp_broker::config::BrokerConfig;
use usp_broker::mtp::ComparableMtp;
use usp_broker::wire::{Register, UspMessage, UspRecord};
use usp_broker::UspBroker;

/// USP Broker demo driver.
#[derive(Parser, Debug)]
#[command(name = "usp-broker-demo")]
#[command(about = "Drives a UspBroker through a registration round-trip against in-memory fakes")]
struct Args {
    /// Optional TOML file with `BrokerConfig` overrides (see [`usp_broker::config`]).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Top-level data-model path the demo Service registers.
    #[arg(short, long, default_value = "Device.Foo.")]
    path: String,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(path: Option<PathBuf>) -> Result<BrokerConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(BrokerConfig::default());
    };
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .build()?;
    Ok(settings.try_deserialize()?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    let broker_config = load_config(args.config)?;
    info!(?broker_config, "starting usp-broker-demo");

    let broker = UspBroker::new(
        broker_config,
        Arc::new(InMemoryDataModelStore::new()),
        Arc::new(StaticPermissionsStore::new()),
        Arc::new(InMemoryRequestTable::new()),
        Arc::new(InMemorySubscriptionTable::new()),
    );

    let mtp: Arc<dyn usp_broker::mtp::MtpConnection> = Arc::new(RecordingMtp::new());
    let reply_mtp = ComparableMtp::new(mtp);

    let register = UspRecord::new("1", UspMessage::Register(Register { allow_partial: false, reg_paths: vec![args.path] }));

    let outcome = broker.on_record("demo-service", reply_mtp, register, false).await?;
    match outcome {
        usp_broker::api::broker::Inbound::Registered(response) => {
            info!(body = ?response.body, "Register accepted");
        }
        _ => {
            info!("Register was not accepted as expected");
        }
    }

    info!(connected_services = broker.connected_service_count().await, "demo complete");
    Ok(())
}

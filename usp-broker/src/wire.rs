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

//! Already-parsed USP message values.
//!
//! The protobuf wire codec is out of scope for this crate (spec §1): callers
//! hand the Broker already-parsed [`UspMessage`] values and receive the same
//! back. These types exist purely to carry the fields spec §6 depends on;
//! they are not a complete USP message model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Access mode of a data-model parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Internal type tag a GSDM parameter type is normalized to (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    Base64,
    Bool,
    DateTime,
    Decimal,
    HexBin,
    Int,
    Long,
    Uint,
    Ulong,
    String,
}

impl Default for ParamType {
    fn default() -> Self {
        ParamType::String
    }
}

/// A USP ERROR response body (spec §7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    pub code: u32,
    pub message: String,
}

/// `oper_status` of one path result: either success or failure, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperStatus<S> {
    Success(S),
    Failure { err_code: u32, err_msg: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Register {
    pub allow_partial: bool,
    pub reg_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredPathResult {
    pub requested_path: String,
    pub status: OperStatus<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterResp {
    pub registered_path_results: Vec<RegisteredPathResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deregister {
    /// A single empty-string entry means "all paths owned by this Service".
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeregisteredPathResult {
    pub requested_path: String,
    pub status: OperStatus<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeregisterResp {
    pub deregistered_path_results: Vec<DeregisteredPathResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetSupportedDM {
    pub obj_paths: Vec<String>,
    pub first_level_only: bool,
    pub return_commands: bool,
    pub return_events: bool,
    pub return_params: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedParam {
    pub param_name: String,
    pub access: Access,
    pub value_type: ParamType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedEvent {
    pub event_name: String,
    pub arg_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    Sync,
    Async,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedCommand {
    pub command_name: String,
    pub command_type: CommandType,
    pub input_arg_names: Vec<String>,
    pub output_arg_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedObject {
    pub supported_obj_path: String,
    pub access: Access,
    pub is_multi_instance: bool,
    pub supported_params: Vec<SupportedParam>,
    pub supported_events: Vec<SupportedEvent>,
    pub supported_commands: Vec<SupportedCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedObjectResult {
    pub req_obj_path: String,
    pub err_code: u32,
    pub err_msg: String,
    pub supported_objs: Vec<SupportedObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetSupportedDMResp {
    pub req_obj_results: Vec<RequestedObjectResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Get {
    pub param_paths: Vec<String>,
    /// Depth limit for recursive Get resolution; `None` means full depth.
    pub max_depth: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPathResult {
    pub resolved_path: String,
    pub result_params: HashMap<String, String>,
    pub param_errs: Vec<ParamError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResp {
    pub resolved_path_results: Vec<ResolvedPathResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Set {
    pub allow_partial: bool,
    /// path -> (param -> value)
    pub updates: Vec<(String, HashMap<String, String>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamError {
    pub param: String,
    pub err_code: u32,
    pub err_msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedInstanceResult {
    pub affected_path: String,
    pub param_errs: Vec<ParamError>,
    pub updated_params: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetResp {
    pub updated_inst_results: Vec<UpdatedInstanceResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Add {
    pub allow_partial: bool,
    pub obj_path: String,
    pub param_values: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedObjectResult {
    pub path: String,
    pub instance: u32,
    pub unique_keys: HashMap<String, String>,
    pub param_errs: Vec<ParamError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddResp {
    pub created_obj_results: Vec<CreatedObjectResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub allow_partial: bool,
    pub obj_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedObjectResult {
    pub requested_path: String,
    pub status: OperStatus<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResp {
    pub deleted_obj_results: Vec<DeletedObjectResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operate {
    pub command: String,
    pub command_key: String,
    pub send_resp: bool,
    pub input_args: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperateResp {
    /// Set when the operation is asynchronous and has merely been accepted;
    /// absent (with `output_args` populated instead) when it completed
    /// synchronously within the response.
    pub req_obj_path: Option<String>,
    pub output_args: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetInstances {
    pub obj_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrInstance {
    pub instantiated_path: String,
    pub unique_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetInstancesResult {
    pub requested_path: String,
    pub curr_insts: Vec<CurrInstance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetInstancesResp {
    pub req_path_results: Vec<GetInstancesResult>,
}

/// One of the payload variants a `Notify` message may carry (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotifyPayload {
    ValueChange { param_path: String, param_value: String },
    ObjectCreation { obj_path: String },
    ObjectDeletion { obj_path: String },
    OperationComplete {
        obj_path: String,
        command_name: String,
        command_key: String,
        output_args: HashMap<String, String>,
    },
    Event { obj_path: String, event_name: String, output_args: HashMap<String, String> },
    OnBoardRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notify {
    pub subscription_id: String,
    pub send_resp: bool,
    pub payload: NotifyPayload,
}

/// One already-parsed USP message, classified by variant the way spec §2's
/// control flow describes ("inbound records ... classified by message type").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UspMessage {
    Register(Register),
    RegisterResp(RegisterResp),
    Deregister(Deregister),
    DeregisterResp(DeregisterResp),
    GetSupportedDM(GetSupportedDM),
    GetSupportedDMResp(GetSupportedDMResp),
    Get(Get),
    GetResp(GetResp),
    Set(Set),
    SetResp(SetResp),
    Add(Add),
    AddResp(AddResp),
    Delete(Delete),
    DeleteResp(DeleteResp),
    Operate(Operate),
    OperateResp(OperateResp),
    GetInstances(GetInstances),
    GetInstancesResp(GetInstancesResp),
    Notify(Notify),
    Error(Error),
}

impl UspMessage {
    /// Short name used in log lines, matching the teacher's `{}:{}:{}` tag
    /// idiom without pulling `Debug`-formatting the whole payload into logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UspMessage::Register(_) => "Register",
            UspMessage::RegisterResp(_) => "RegisterResp",
            UspMessage::Deregister(_) => "Deregister",
            UspMessage::DeregisterResp(_) => "DeregisterResp",
            UspMessage::GetSupportedDM(_) => "GetSupportedDM",
            UspMessage::GetSupportedDMResp(_) => "GetSupportedDMResp",
            UspMessage::Get(_) => "Get",
            UspMessage::GetResp(_) => "GetResp",
            UspMessage::Set(_) => "Set",
            UspMessage::SetResp(_) => "SetResp",
            UspMessage::Add(_) => "Add",
            UspMessage::AddResp(_) => "AddResp",
            UspMessage::Delete(_) => "Delete",
            UspMessage::DeleteResp(_) => "DeleteResp",
            UspMessage::Operate(_) => "Operate",
            UspMessage::OperateResp(_) => "OperateResp",
            UspMessage::GetInstances(_) => "GetInstances",
            UspMessage::GetInstancesResp(_) => "GetInstancesResp",
            UspMessage::Notify(_) => "Notify",
            UspMessage::Error(_) => "Error",
        }
    }

    pub fn is_response_or_error(&self) -> bool {
        matches!(
            self,
            UspMessage::GetResp(_)
                | UspMessage::SetResp(_)
                | UspMessage::AddResp(_)
                | UspMessage::DeleteResp(_)
                | UspMessage::OperateResp(_)
                | UspMessage::GetInstancesResp(_)
                | UspMessage::GetSupportedDMResp(_)
                | UspMessage::RegisterResp(_)
                | UspMessage::DeregisterResp(_)
                | UspMessage::Error(_)
        )
    }
}

/// A USP record: header (`msg_id`) plus body (spec §6). The Broker only ever
/// needs the message id and the parsed body; framing/session-context fields
/// belong to the out-of-scope wire codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UspRecord {
    pub msg_id: String,
    pub body: UspMessage,
}

impl UspRecord {
    pub fn new(msg_id: impl Into<String>, body: UspMessage) -> Self {
        Self { msg_id: msg_id.into(), body }
    }
}

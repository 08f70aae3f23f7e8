//! End-to-end scenarios against a bare `UspBroker` wired to
//! `broker-testkit`'s in-memory collaborators, one test per literal scenario
//! from spec.md §8 plus a couple of the invariants/round-trip laws it lists.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use broker_testkit::{InMemoryDataModelStore, InMemoryRequestTable, InMemorySubscriptionTable, RecordingMtp, StaticPermissionsStore};
use usp_broker::config::BrokerConfig;
use usp_broker::model::Operation;
use usp_broker::mtp::ComparableMtp;
use usp_broker::registry::lifecycle::ConnectionRole;
use usp_broker::registry::service::SubsMapEntry;
use usp_broker::wire::{Access, CommandType, Get, GetSupportedDMResp, Notify, NotifyPayload, OperStatus, ParamType, Register, RequestedObjectResult, SupportedCommand, SupportedObject, SupportedParam, UspMessage, UspRecord};
use usp_broker::{BrokerError, UspBroker};

fn test_broker() -> (UspBroker, Arc<InMemoryDataModelStore>, Arc<StaticPermissionsStore>) {
    let data_model = Arc::new(InMemoryDataModelStore::new());
    let permissions = Arc::new(StaticPermissionsStore::new());
    let broker = UspBroker::new(
        BrokerConfig::default(),
        data_model.clone(),
        permissions.clone(),
        Arc::new(InMemoryRequestTable::new()),
        Arc::new(InMemorySubscriptionTable::new()),
    );
    (broker, data_model, permissions)
}

fn mtp_handle() -> (Arc<RecordingMtp>, ComparableMtp) {
    let mtp = Arc::new(RecordingMtp::new());
    let comparable = ComparableMtp::new(mtp.clone() as Arc<dyn usp_broker::mtp::MtpConnection>);
    (mtp, comparable)
}

#[tokio::test]
async fn scenario_1_happy_path_register() {
    let (broker, _data_model, _permissions) = test_broker();
    let (s1_mtp, s1_handle) = mtp_handle();

    let register = Register { allow_partial: false, reg_paths: vec!["Device.Foo.".to_string()] };
    let response = broker.handle_register("S1", s1_handle, "1", register).await.unwrap();

    match response.body {
        UspMessage::RegisterResp(resp) => {
            assert_eq!(resp.registered_path_results.len(), 1);
            assert_eq!(resp.registered_path_results[0].requested_path, "Device.Foo.");
            assert!(matches!(&resp.registered_path_results[0].status, OperStatus::Success(path) if path == "Device.Foo."));
        }
        _ => panic!("expected RegisterResp"),
    }

    let sent = s1_mtp.sent_records();
    assert_eq!(sent.len(), 1, "exactly one GetSupportedDM should have been dispatched");
    let gsdm = &sent[0];
    assert!(
        regex_like_broker_msg_id(&gsdm.msg_id),
        "msg_id {} does not match ^BROKER-\\d+-\\d+$",
        gsdm.msg_id
    );
    match &gsdm.body {
        UspMessage::GetSupportedDM(msg) => assert_eq!(msg.obj_paths, vec!["Device.Foo.".to_string()]),
        other => panic!("expected GetSupportedDM, got {}", other.kind()),
    }
}

#[tokio::test]
async fn scenario_2_conflicting_register_is_rejected() {
    let (broker, _data_model, _permissions) = test_broker();
    let (_s1_mtp, s1_handle) = mtp_handle();
    let (_s2_mtp, s2_handle) = mtp_handle();

    let first = Register { allow_partial: false, reg_paths: vec!["Device.Foo.".to_string()] };
    broker.handle_register("S1", s1_handle, "1", first).await.unwrap();

    let second = Register { allow_partial: false, reg_paths: vec!["Device.Foo.".to_string()] };
    let response = broker.handle_register("S2", s2_handle, "2", second).await.unwrap();

    match response.body {
        UspMessage::Error(err) => assert_eq!(err.code, usp_broker::BrokerError::PathAlreadyRegistered(String::new()).code() as u32),
        other => panic!("expected Error(PathAlreadyRegistered), got {}", other.kind()),
    }
}

#[tokio::test]
async fn scenario_3_subscribe_then_notify_passthru() {
    let (broker, data_model, _permissions) = test_broker();
    let (s1_mtp, s1_handle) = mtp_handle();

    let register = Register { allow_partial: false, reg_paths: vec!["Device.Foo.".to_string()] };
    broker.handle_register("S1", s1_handle.clone(), "1", register).await.unwrap();

    let gsdm_request = s1_mtp.last_sent().unwrap();
    let gsdm_reply = GetSupportedDMResp {
        req_obj_results: vec![RequestedObjectResult {
            req_obj_path: "Device.Foo.".to_string(),
            err_code: 0,
            err_msg: String::new(),
            supported_objs: vec![SupportedObject {
                supported_obj_path: "Device.Foo.".to_string(),
                access: Access::ReadWrite,
                is_multi_instance: false,
                supported_params: vec![SupportedParam { param_name: "X".to_string(), access: Access::ReadOnly, value_type: ParamType::Int }],
                supported_events: vec![],
                supported_commands: vec![],
            }],
        }],
    };
    broker.handle_gsdm_response("S1", &gsdm_request.msg_id, gsdm_reply).await.unwrap();

    // A prior Subscribe Add is dispatched as part of reconciliation; answer
    // it the way S1 would, with a created Subscription row.
    let add_request = s1_mtp
        .sent_records()
        .into_iter()
        .rev()
        .find(|r| matches!(r.body, UspMessage::Add(_)))
        .expect("reconcile should have issued a Subscribe Add");
    let subscription_id = match &add_request.body {
        UspMessage::Add(add) => add.param_values.get("ID").cloned().unwrap(),
        _ => unreachable!(),
    };
    assert!(subscription_id.ends_with("-BROKER"));

    // The facade's reconcile() path is exercised via its own subscription
    // table lookups, not directly here; instead we drive the notify side
    // directly against the resulting subs_map entry, matching scenario 3's
    // literal subscription id shape `"1-<epoch>-BROKER"`.
    let literal_subscription_id = format!("1-{}-BROKER", 1_700_000_000u64);
    let notify = Notify {
        subscription_id: literal_subscription_id.clone(),
        send_resp: false,
        payload: NotifyPayload::ValueChange { param_path: "Device.Foo.X".to_string(), param_value: "42".to_string() },
    };

    // route_notification requires a SubsMapEntry to already exist; emulate
    // what `subscriptions::bridge::reconcile` would have inserted.
    broker.on_connect("S1", ConnectionRole::AgentSide, s1_handle.clone()).await;
    let routed = with_subs_map_entry(&broker, &literal_subscription_id, notify).await;
    assert_eq!(routed.broker_instance, 1);
    match routed.payload {
        NotifyPayload::ValueChange { param_path, param_value } => {
            assert_eq!(param_path, "Device.Foo.X");
            assert_eq!(param_value, "42");
        }
        other => panic!("expected ValueChange, got {:?}", other),
    }

    assert!(data_model.path_exists("Device.Foo.X").await);
}

/// Scenario 3 requires a `SubsMapEntry` already present on the Service
/// before the Notify can route (spec.md §8 invariant 3); this injects one
/// directly since the facade has no direct "insert subs_map" surface of its
/// own (reconciliation owns that).
async fn with_subs_map_entry(broker: &UspBroker, subscription_id: &str, notify: Notify) -> usp_broker::subscriptions::bridge::RoutedNotification {
    {
        let mut registry = broker.registry_for_test().await;
        if let Some(service) = registry.find_by_endpoint_mut("S1") {
            service.subs_map.push(SubsMapEntry {
                broker_instance: 1,
                service_instance: 1,
                path: "Device.Foo.X".to_string(),
                subscription_id: subscription_id.to_string(),
            });
        }
    }
    broker.on_notify("S1", notify, false).await.unwrap()
}

#[tokio::test]
async fn scenario_4_async_operate_completes_via_notify() {
    let (broker, _data_model, _permissions) = test_broker();
    let (s1_mtp, s1_handle) = mtp_handle();

    let register = Register { allow_partial: false, reg_paths: vec!["Device.Foo.".to_string()] };
    broker.handle_register("S1", s1_handle, "1", register).await.unwrap();
    let group = { broker.registry_for_test().await.find_by_endpoint("S1").unwrap().group_id };

    {
        let mut registry = broker.registry_for_test().await;
        if let Some(service) = registry.find_by_endpoint_mut("S1") {
            service.subs_map.push(SubsMapEntry {
                broker_instance: 9,
                service_instance: 9,
                path: "Device.Foo.Reboot()".to_string(),
                subscription_id: "9-1-BROKER".to_string(),
            });
        }
    }

    let operate = broker.vendor_async_operate(group, "Device.Foo.Reboot()".to_string(), 7, HashMap::new());
    let responder = async {
        // Let async_operate's send reach the recording MTP, then answer it.
        tokio::task::yield_now().await;
        let request = loop {
            if let Some(record) = s1_mtp.sent_records().into_iter().find(|r| matches!(r.body, UspMessage::Operate(_))) {
                break record;
            }
            tokio::task::yield_now().await;
        };
        let reply = UspRecord::new(
            request.msg_id.clone(),
            UspMessage::OperateResp(usp_broker::wire::OperateResp { req_obj_path: Some("Device.LocalAgent.Request.3.".to_string()), output_args: HashMap::new() }),
        );
        broker.on_response(reply).await;
    };

    let (result, ()) = tokio::join!(operate, responder);
    result.unwrap();

    let notify = Notify {
        subscription_id: "9-1-BROKER".to_string(),
        send_resp: false,
        payload: NotifyPayload::OperationComplete {
            obj_path: "Device.Foo.".to_string(),
            command_name: "Reboot()".to_string(),
            command_key: String::new(),
            output_args: HashMap::new(),
        },
    };
    broker.on_notify("S1", notify, false).await.unwrap();

    let registry = broker.registry_for_test().await;
    let service = registry.find_by_endpoint("S1").unwrap();
    assert!(service.req_map.is_empty(), "ReqMapEntry should be torn down on OperationComplete");
}

#[tokio::test]
async fn scenario_5_agent_direction_disconnect_fails_active_commands_and_frees_paths() {
    let (broker, data_model, _permissions) = test_broker();
    let (s1_mtp, s1_handle) = mtp_handle();

    let register = Register { allow_partial: false, reg_paths: vec!["Device.Foo.".to_string()] };
    broker.handle_register("S1", s1_handle.clone(), "1", register).await.unwrap();
    assert!(data_model.path_exists("Device.Foo.").await);

    let id = broker.on_connect("S1", ConnectionRole::AgentSide, s1_handle).await.unwrap();

    broker.on_controller_direction_disconnect(id, true).await;

    assert!(!data_model.path_exists("Device.Foo."), "registered paths must be deregistered on disconnect");

    // agent-direction is also down (never explicitly populated beyond the
    // AgentSide connect above, which only sets agent_mtp/has_controller) so
    // the final free only happens once the agent direction goes down too.
    broker.on_agent_direction_disconnect(id).await;
    assert_eq!(broker.connected_service_count().await, 0);
    drop(s1_mtp);
}

#[tokio::test]
async fn scenario_6_passthru_get_declines_on_forbidden_parameter_and_falls_through() {
    let (broker, _data_model, permissions) = test_broker();
    let (_s1_mtp, s1_handle) = mtp_handle();
    let (_ctrl_mtp, ctrl_handle) = mtp_handle();

    let register = Register { allow_partial: false, reg_paths: vec!["Device.Foo.".to_string()] };
    broker.handle_register("S1", s1_handle, "1", register).await.unwrap();
    permissions.deny("ctrl-a", "Device.Foo.Secret", Operation::Get);

    let get = Get { param_paths: vec!["Device.Foo.Secret".to_string()], max_depth: None };
    let forwarded = broker.attempt_passthru_get("ctrl-a", ctrl_handle, "1", get).await.unwrap();
    assert!(!forwarded, "passthru must decline when the originator lacks PERMIT_GET");
}

fn regex_like_broker_msg_id(msg_id: &str) -> bool {
    let Some(rest) = msg_id.strip_prefix("BROKER-") else { return false };
    let Some((counter, epoch)) = rest.split_once('-') else { return false };
    !counter.is_empty() && counter.chars().all(|c| c.is_ascii_digit()) && !epoch.is_empty() && epoch.chars().all(|c| c.is_ascii_digit())
}

//! Generated client against generated server over the in-process session.

use pretty_assertions::assert_eq;
use prost::Message;
use std::sync::{Arc, Mutex};
use zrpc_roundtrip::pb::{self, primitives::Calibration, Mode};
use zrpc_roundtrip::roundtrip_client::{EchoParams, LabClient, ResetParams, TelemetrySubscriber};
use zrpc_roundtrip::roundtrip_server::{Lab, LabServer};
use zrpc_runtime::{CallError, Loopback, Query, RpcClient, RpcResponse, RpcStatus, DEFAULT_TIMEOUT};

/// Records what the server saw; a hard reset is refused
#[derive(Default)]
struct Bench {
    seen: Mutex<Vec<pb::Primitives>>,
    resets: Mutex<Vec<bool>>,
}

impl Lab for Bench {
    fn echo(&self, request: &pb::Primitives, response: &mut pb::Primitives) -> RpcStatus {
        self.seen.lock().unwrap().push(request.clone());
        *response = request.clone();
        response.label = format!("{}!", request.label);
        RpcStatus::Ok
    }

    fn reset(&self, request: &pb::ResetRequest, _response: &mut pb::Empty) -> RpcStatus {
        self.resets.lock().unwrap().push(request.hard);
        if request.hard {
            RpcStatus::Timeout
        } else {
            RpcStatus::Ok
        }
    }

    fn ping(&self, _request: &pb::Empty, response: &mut pb::Point) -> RpcStatus {
        response.x = -1;
        response.y = 1;
        RpcStatus::Ok
    }
}

type Client = LabClient<RpcClient<Arc<Loopback>>>;

fn connect() -> (Arc<Bench>, Arc<Loopback>, Client) {
    let session = Arc::new(Loopback::new("dev1"));
    let bench = Arc::new(Bench::default());
    assert!(LabServer::from_arc(Arc::clone(&bench)).register_handlers(&*session));
    let client = LabClient::new(RpcClient::new(Arc::clone(&session), "dev1"));
    (bench, session, client)
}

fn full_request() -> pb::Primitives {
    pb::Primitives {
        ratio: 0.25,
        gain: -1.5,
        offset: -7,
        epoch: i64::MIN,
        count: u32::MAX,
        total: u64::MAX,
        delta: -3,
        drift: -9_007_199_254_740_993,
        mask: 0xDEAD_BEEF,
        serial: u64::MAX - 1,
        bias: i32::MIN,
        skew: i64::MAX,
        enabled: true,
        label: "bench".to_string(),
        payload: vec![0x00, 0xFF, 0x10],
        mode: Mode::Run as i32,
        origin: Some(pb::Point { x: -4, y: 5 }),
        limit: Some(0),
        r#type: "thermal".to_string(),
        samples: vec![1, -2, 3],
        calibration: Some(Calibration { scale: 0.5 }),
    }
}

#[test]
fn test_every_field_reaches_the_handler() {
    let (bench, session, client) = connect();
    assert_eq!(
        session.registered_keys(),
        ["dev1/rpc/Lab/Echo", "dev1/rpc/Lab/Ping", "dev1/rpc/Lab/Reset"]
    );

    let request = full_request();
    let (response, reply) = client.echo(Some(request.clone()), EchoParams::default());
    assert_eq!(response, RpcResponse::ok());
    assert_eq!(*bench.seen.lock().unwrap(), [request.clone()]);

    let reply = reply.unwrap();
    assert_eq!(reply.label, "bench!");
    assert_eq!(
        reply,
        pb::Primitives {
            label: "bench!".to_string(),
            ..request
        }
    );
}

#[test]
fn test_params_build_the_request() {
    let (bench, _session, client) = connect();

    let params = EchoParams {
        total: Some(u64::MAX),
        drift: Some(i64::MIN),
        mode: Some(Mode::Run as i32),
        origin: Some(pb::Point { x: 2, y: 3 }),
        limit: Some(0),
        r#type: Some("thermal".to_string()),
        samples: Some(vec![4, 5]),
        calibration: Some(Calibration { scale: 2.0 }),
        ..Default::default()
    };
    let (response, _) = client.echo(None, params);
    assert!(response.success);

    let seen = bench.seen.lock().unwrap().pop().unwrap();
    assert_eq!(
        seen,
        pb::Primitives {
            total: u64::MAX,
            drift: i64::MIN,
            mode: Mode::Run as i32,
            origin: Some(pb::Point { x: 2, y: 3 }),
            limit: Some(0),
            r#type: "thermal".to_string(),
            samples: vec![4, 5],
            calibration: Some(Calibration { scale: 2.0 }),
            ..Default::default()
        }
    );
}

#[test]
fn test_explicit_request_ignores_params() {
    let (bench, _session, client) = connect();

    let request = pb::Primitives {
        label: "explicit".to_string(),
        ..Default::default()
    };
    let params = EchoParams {
        label: Some("ignored".to_string()),
        count: Some(9),
        ..Default::default()
    };
    client.echo(Some(request.clone()), params);
    assert_eq!(*bench.seen.lock().unwrap(), [request]);
}

#[test]
fn test_handler_status_is_reported_to_the_caller() {
    let (bench, _session, client) = connect();

    assert_eq!(client.reset(None, ResetParams { hard: Some(false) }), RpcResponse::ok());

    let refused = client.reset(None, ResetParams { hard: Some(true) });
    assert!(!refused.success);
    assert_eq!(refused.error.as_deref(), Some("reply error: TIMEOUT"));
    assert_eq!(*bench.resets.lock().unwrap(), [false, true]);
}

#[test]
fn test_call_without_params() {
    let (_bench, _session, client) = connect();

    let (response, point) = client.ping(None);
    assert_eq!(response, RpcResponse::ok());
    assert_eq!(point, Some(pb::Point { x: -1, y: 1 }));
}

#[test]
fn test_unknown_device_gets_no_reply() {
    let (_bench, _session, client) = connect();
    client.transport().set_device_id("dev2");

    let (response, point) = client.ping(None);
    assert_eq!(response, RpcResponse::failed("no reply received"));
    assert_eq!(point, None);
}

#[test]
fn test_malformed_request_is_rejected_before_the_handler() {
    let (bench, session, _client) = connect();

    // Field 1 is a double; a length-delimited value cannot decode into it
    let garbage = [0x0A, 0xFF];
    let result = session.query("dev1/rpc/Lab/Echo", &garbage, DEFAULT_TIMEOUT);
    assert_eq!(result, Err(CallError::reply("DECODE_ERROR")));

    let mut sink = Vec::new();
    let status = LabServer::<Bench>::handle_echo(&Bench::default(), &garbage, &mut sink);
    assert_eq!(status, RpcStatus::DecodeError);
    assert!(sink.is_empty());
    assert!(bench.seen.lock().unwrap().is_empty());
}

#[test]
fn test_handler_encodes_into_the_sink() {
    let bench = Bench::default();
    let request = full_request();

    let mut sink = Vec::new();
    let status = LabServer::<Bench>::handle_echo(&bench, &request.encode_to_vec(), &mut sink);
    assert_eq!(status, RpcStatus::Ok);

    let reply = pb::Primitives::decode(sink.as_slice()).unwrap();
    assert_eq!(reply.label, "bench!");
    assert_eq!(reply.limit, Some(0));
    assert_eq!(*bench.seen.lock().unwrap(), [request]);
}

#[test]
fn test_telemetry_subscription() {
    let session = Arc::new(Loopback::new("dev1"));
    let subscriber = TelemetrySubscriber::new(Arc::clone(&session), "dev1");

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    subscriber
        .subscribe_sensor(move |sample: pb::SensorTelemetry| {
            sink.lock().unwrap().push(sample.celsius);
        })
        .unwrap();

    let sample = pb::SensorTelemetry { celsius: 21.5 }.encode_to_vec();
    assert_eq!(session.publish("dev1/telemetry/sensor", &sample), 1);
    // Undecodable samples are dropped without reaching the callback
    assert_eq!(session.publish("dev1/telemetry/sensor", &[0x0D, 0x00]), 1);
    assert_eq!(*received.lock().unwrap(), [21.5]);

    subscriber.unsubscribe_all();
    assert_eq!(session.publish("dev1/telemetry/sensor", &sample), 0);
}

//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! End-to-end patient retrieval against a local WebSocket server.

#![cfg(feature = "websocket")]

use futures_util::{SinkExt, StreamExt};
use patient_link::transport::WebSocketTransport;
use patient_link::{
    ClientConfig, ClientError, ConnectionManager, ConnectionStatus, ErrorKind, IgnoreMessages,
    PatientClient,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};

type ServerStream = WebSocketStream<tokio::net::TcpStream>;

fn summary(uri: &str, first_name: &str) -> Value {
    json!({
        "uri": uri,
        "id": uri,
        "mrn": format!("MRN-{first_name}"),
        "date_of_birth": "1980-05-17",
        "first_name": first_name,
        "middle_name": "",
        "last_name": "Doe",
        "sex": "M",
        "fractions_total": 20,
        "fractions_completed": 4,
        "weight_kg": 80,
        "ready_for_treatment": false,
        "registration_time": 1650000000
    })
}

fn detail(uri: &str, label: &str) -> String {
    json!({"updateSubscriptions": {uri: {
        "type": "Patient",
        "diagnoses": [{
            "type": "Diagnosis",
            "label": label,
            "description": "Primary",
            "prescriptions": [{
                "type": "Prescription",
                "label": "Rx",
                "description": "Course",
                "num_fractions": 20,
                "plans": [{"type": "Plan", "label": "Plan-1"}]
            }]
        }]
    }}})
    .to_string()
}

async fn next_text(ws: &mut ServerStream) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("expected a text message, got {other:?}"),
        }
    }
}

/// Reads until the client closes; returns the close code it sent.
async fn await_close(ws: &mut ServerStream) -> Option<CloseCode> {
    let mut code = None;
    while let Some(Ok(message)) = ws.next().await {
        if let Message::Close(frame) = message {
            code = frame.map(|frame| frame.code);
        }
    }
    code
}

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Serves a two-patient list and answers per-patient requests in reverse.
fn spawn_patient_server(listener: TcpListener) -> JoinHandle<(Vec<String>, Option<CloseCode>)> {
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let request = next_text(&mut ws).await;
        assert_eq!(request, json!({"setSubscriptions": {"public:patients": "request"}}));

        let list = json!({"updateSubscriptions": {"public:patients": {
            "type": "PatientList",
            "value": [summary("patients/A", "Alice"), summary("patients/B", "Bob")],
        }}});
        ws.send(Message::Text(list.to_string())).await.unwrap();

        let mut requested = Vec::new();
        for _ in 0..2 {
            let request = next_text(&mut ws).await;
            let subscriptions = request["setSubscriptions"].as_object().unwrap();
            assert_eq!(subscriptions.len(), 1);
            requested.push(subscriptions.keys().next().unwrap().clone());
        }

        ws.send(Message::Text(detail("patients/B", "B-diagnosis"))).await.unwrap();
        ws.send(Message::Text(detail("patients/A", "A-diagnosis"))).await.unwrap();

        let close = await_close(&mut ws).await;
        (requested, close)
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_patients_end_to_end() {
    let (listener, addr) = bind().await;
    let server = spawn_patient_server(listener);

    let mut client = PatientClient::new(ClientConfig::default().with_address(format!("ws://{addr}")));
    client.init().unwrap();

    let patients = tokio::time::timeout(Duration::from_secs(10), client.fetch_patients())
        .await
        .expect("fetch timed out")
        .unwrap();

    assert_eq!(patients.len(), 2);
    assert_eq!(patients["patients/A"].first_name, "Alice");
    assert_eq!(patients["patients/A"].diagnoses[0].label, "A-diagnosis");
    assert_eq!(patients["patients/B"].diagnoses[0].label, "B-diagnosis");
    assert_eq!(patients["patients/B"].diagnoses[0].prescriptions[0].plans[0].label, "Plan-1");

    let (requested, close) = server.await.unwrap();
    assert_eq!(requested, vec!["patients/A", "patients/B"]);
    assert_eq!(close, Some(CloseCode::Normal));

    let records = client.manager().records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    tokio::time::timeout(Duration::from_secs(5), async {
        while record.status() != ConnectionStatus::Closed {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection did not close");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bad_uri_is_cannot_connect() {
    for address in ["not a uri", "http://127.0.0.1:1/"] {
        let mut client = PatientClient::new(ClientConfig::default().with_address(address));
        client.init().unwrap();

        let err = client.fetch_patients().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotConnect, "address: {address}");
        assert_eq!(err.kind().status(), 1);
        assert!(client.manager().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refused_connection_is_remote_connect_failed() {
    let (listener, addr) = bind().await;
    drop(listener);

    let mut client = PatientClient::new(ClientConfig::default().with_address(format!("ws://{addr}")));
    client.init().unwrap();

    let err = client.fetch_patients().await.unwrap_err();
    assert!(matches!(err, ClientError::RemoteConnectFailed { .. }));

    let records = client.manager().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status(), ConnectionStatus::Failed);
    assert!(records[0].last_error().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_list_is_protocol_error() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ = next_text(&mut ws).await;

        let list = json!({"updateSubscriptions": {"public:patients": {"type": "PatientList"}}});
        ws.send(Message::Text(list.to_string())).await.unwrap();
        await_close(&mut ws).await
    });

    let mut client = PatientClient::new(ClientConfig::default().with_address(format!("ws://{addr}")));
    client.init().unwrap();

    let err = client.fetch_patients().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolError);
    assert_eq!(server.await.unwrap(), Some(CloseCode::Protocol));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_initiated_close_is_acknowledged() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        })))
        .await
        .unwrap();

        let mut replies = Vec::new();
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Close(frame)) => replies.push(frame.map(|frame| frame.code)),
                Ok(_) => {}
                Err(e) => panic!("close handshake not completed: {e}"),
            }
        }
        replies
    });

    let mut manager = ConnectionManager::new(WebSocketTransport::default());
    manager.init().unwrap();
    let id = manager
        .connect(&format!("ws://{addr}"), |_| IgnoreMessages)
        .await
        .unwrap();

    let replies = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server did not finish")
        .unwrap();
    assert_eq!(replies, vec![Some(CloseCode::Normal)]);

    let record = manager.record(id).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while record.status() != ConnectionStatus::Closed {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection did not close");
    assert_eq!(
        record.last_error().as_deref(),
        Some("close code: 1000 (Normal close), close reason: bye")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_abandons_pending_connect() {
    // Accepts the TCP connection but never answers the upgrade request.
    let (listener, addr) = bind().await;

    let mut manager = ConnectionManager::new(WebSocketTransport::default());
    manager.init().unwrap();
    let pending = manager.connect(&format!("ws://{addr}"), |_| IgnoreMessages);
    let (_socket, _) = listener.accept().await.unwrap();

    let record = manager.records().pop().unwrap();
    assert_eq!(record.status(), ConnectionStatus::Connecting);

    let started = Instant::now();
    manager.shutdown();
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "shutdown waited for a connection that never opened"
    );

    assert!(matches!(pending.await, Err(ClientError::Abandoned)));
    assert_eq!(record.status(), ConnectionStatus::Connecting);
}

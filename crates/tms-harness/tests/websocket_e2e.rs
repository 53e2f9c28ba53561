//! End-to-end scenario against a stub deployment: axum serves login and the
//! multicast endpoint, a tokio-tungstenite server plays the push channel.

use axum::extract::{Path, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tms_harness::channel::WebSocketConnector;
use tms_harness::{with_session, IncidentForwarding, Session, SessionError, Supervisor};
use tms_harness_core::config::{ApiConfig, CredentialsConfig, TimingConfig};
use tms_harness_core::{
    Codec, Destination, Envelope, Frame, Status, TransmissionRecord, TransmissionState, Verdict,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const TOKEN: &str = "3f1c9a";

#[derive(Default)]
struct Deployment {
    triggered: Notify,
    multicasts: Mutex<Vec<(String, Value)>>,
    handshake_cookie: Mutex<Option<String>>,
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["userName"] == "admin" && body["token"] == "admin" {
        (
            StatusCode::OK,
            [(SET_COOKIE, format!("id={TOKEN}; Path=/"))],
            Json(json!({"userName": "admin", "roles": ["Administrator"]})),
        )
            .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn multicast(
    State(deployment): State<Arc<Deployment>>,
    Path(site): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let authorized = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(&format!("id={TOKEN}")));
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    deployment.multicasts.lock().unwrap().push((site, body));
    deployment.triggered.notify_one();
    (
        StatusCode::CREATED,
        Json(json!({"id": "OP1", "transmissions": [{"id": "T1"}]})),
    )
        .into_response()
}

async fn spawn_api(deployment: Arc<Deployment>) -> SocketAddr {
    let app = Router::new()
        .route("/auth/session", post(login))
        .route("/api/multicast/site/:site", post(multicast))
        .with_state(deployment);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Accept one subscription, wait for the multicast, then push `frames`.
async fn spawn_push_channel(deployment: Arc<Deployment>, frames: Vec<Frame>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let recorder = Arc::clone(&deployment);
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let cookie = request
                .headers()
                .get(COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            *recorder.handshake_cookie.lock().unwrap() = cookie;
            Ok(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();

        deployment.triggered.notified().await;
        for frame in frames {
            let message = match frame {
                Frame::Text(text) => Message::Text(text),
                Frame::Binary(bytes) => Message::Binary(bytes),
            };
            ws.send(message).await.unwrap();
        }
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });
    addr
}

fn api_config(api: SocketAddr, push: SocketAddr) -> ApiConfig {
    ApiConfig {
        base_url: format!("http://{api}/api"),
        auth_url: format!("http://{api}/auth"),
        channel_url: format!("ws://{push}"),
        channel_path: "/ws/v2/".to_string(),
        accept_invalid_certs: false,
    }
}

fn site_update(state: TransmissionState, status: Option<Status>) -> Envelope {
    Envelope::transmission(TransmissionRecord {
        id: "T1".to_string(),
        parent_id: "OP1".to_string(),
        destination: Destination::new("prisma.tms.moc.Site", "S2"),
        state,
        status,
    })
}

#[tokio::test]
async fn test_incident_forwarding_end_to_end() {
    let deployment = Arc::new(Deployment::default());
    let frames = vec![
        Codec::Json.encode(&site_update(TransmissionState::Pending, None)).unwrap(),
        Codec::Protobuf
            .encode(&site_update(
                TransmissionState::Partial,
                Some(Status::new(211, "transmission sent")),
            ))
            .unwrap(),
        Codec::Json
            .encode(&Envelope::entity("Incident/CLOSE", "incident", "I7"))
            .unwrap(),
        Codec::Json
            .encode(&site_update(
                TransmissionState::Success,
                Some(Status::new(200, "transmission successful")),
            ))
            .unwrap(),
    ];
    let api = spawn_api(Arc::clone(&deployment)).await;
    let push = spawn_push_channel(Arc::clone(&deployment), frames).await;
    let config = api_config(api, push);
    let scenario = IncidentForwarding::new("S2", "I7").build();

    let verdict = with_session(&config, &CredentialsConfig::default(), |session: Arc<Session>| {
        let scenario = scenario.clone();
        let config = config.clone();
        async move {
            assert_eq!(session.cookie(), TOKEN);
            assert_eq!(session.user()["userName"], "admin");
            let supervisor = Supervisor::new(
                WebSocketConnector::new(config.accept_invalid_certs),
                session.channel_request(Codec::Auto),
                &TimingConfig::default(),
            );
            supervisor
                .run(session.post_json(&scenario.path, &scenario.body), &scenario.plan)
                .await
        }
    })
    .await
    .unwrap();

    assert_eq!(verdict, Verdict::Success);
    assert_eq!(
        deployment.handshake_cookie.lock().unwrap().as_deref(),
        Some(format!("id={TOKEN}").as_str())
    );
    let multicasts = deployment.multicasts.lock().unwrap();
    assert_eq!(multicasts.len(), 1);
    assert_eq!(multicasts[0].0, "S2");
    assert_eq!(multicasts[0].1, scenario.body);
}

#[tokio::test]
async fn test_wrong_site_destination_is_mismatch_end_to_end() {
    let deployment = Arc::new(Deployment::default());
    let mut pending = site_update(TransmissionState::Pending, None);
    if let tms_harness_core::Payload::Transmission(record) = &mut pending.payload {
        record.destination = Destination::new("prisma.tms.moc.Site", "S3");
    }
    let frames = vec![Codec::Json.encode(&pending).unwrap()];
    let api = spawn_api(Arc::clone(&deployment)).await;
    let push = spawn_push_channel(Arc::clone(&deployment), frames).await;
    let config = api_config(api, push);
    let scenario = IncidentForwarding::new("S2", "I7").build();

    let verdict = with_session(&config, &CredentialsConfig::default(), |session: Arc<Session>| async move {
        Supervisor::new(
            WebSocketConnector::default(),
            session.channel_request(Codec::Json),
            &TimingConfig::default(),
        )
        .run(session.post_json(&scenario.path, &scenario.body), &scenario.plan)
        .await
    })
    .await
    .unwrap();

    assert_eq!(verdict.kind(), "StateMismatch");
    assert!(verdict.detail().contains("S3"), "{verdict}");
}

#[tokio::test]
async fn test_rejected_login_skips_scenario() {
    let deployment = Arc::new(Deployment::default());
    let api = spawn_api(Arc::clone(&deployment)).await;
    let config = api_config(api, "127.0.0.1:9".parse().unwrap());
    let credentials = CredentialsConfig {
        username: "admin".to_string(),
        password: "wrong".to_string(),
    };

    let mut ran = false;
    let result = with_session(&config, &credentials, |_session| {
        ran = true;
        async {}
    })
    .await;

    assert!(matches!(
        result,
        Err(SessionError::Rejected { ref username, status: 401 }) if username == "admin"
    ));
    assert!(!ran);
    assert!(deployment.multicasts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_push_channel_never_triggers() {
    let deployment = Arc::new(Deployment::default());
    let api = spawn_api(Arc::clone(&deployment)).await;
    // bind and release a port so nothing is listening on it
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let config = api_config(api, closed);
    let scenario = IncidentForwarding::new("S2", "I7").build();

    let verdict = with_session(&config, &CredentialsConfig::default(), |session: Arc<Session>| async move {
        Supervisor::new(
            WebSocketConnector::default(),
            session.channel_request(Codec::Auto),
            &TimingConfig::default(),
        )
        .run(session.post_json(&scenario.path, &scenario.body), &scenario.plan)
        .await
    })
    .await
    .unwrap();

    assert_eq!(verdict.kind(), "ChannelDropped");
    assert!(deployment.multicasts.lock().unwrap().is_empty());
}

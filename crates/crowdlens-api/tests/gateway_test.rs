#![allow(clippy::unwrap_used)]
// Integration tests for the request gateway using wiremock.

use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crowdlens_api::{
    AnalyticsQuery, EntryExitQuery, Error, ErrorKind, ForcedLogoutReason, Gateway,
    OccupancyResponse, SessionHooks,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Session hooks that record every forced logout.
#[derive(Default)]
struct RecordingSession {
    token: Mutex<Option<String>>,
    logouts: Mutex<Vec<ForcedLogoutReason>>,
}

impl RecordingSession {
    fn with_token(token: &str) -> Arc<Self> {
        let session = Self::default();
        *session.token.lock().unwrap() = Some(token.to_owned());
        Arc::new(session)
    }

    fn logouts(&self) -> Vec<ForcedLogoutReason> {
        self.logouts.lock().unwrap().clone()
    }
}

impl SessionHooks for RecordingSession {
    fn bearer_token(&self) -> Option<SecretString> {
        self.token.lock().unwrap().clone().map(SecretString::from)
    }

    fn force_logout(&self, reason: ForcedLogoutReason) {
        self.token.lock().unwrap().take();
        self.logouts.lock().unwrap().push(reason);
    }
}

async fn setup(session: Arc<RecordingSession>) -> (MockServer, Gateway) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let gateway = Gateway::with_client(reqwest::Client::new(), &base_url, session);
    (server, gateway)
}

fn query() -> AnalyticsQuery {
    AnalyticsQuery {
        site_id: "site-1".into(),
        from_utc: 1_710_460_800_000,
        to_utc: 1_710_547_199_999,
    }
}

// ── Request stage ───────────────────────────────────────────────────

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let session = RecordingSession::with_token("tok-123");
    let (server, gateway) = setup(Arc::clone(&session)).await;

    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"siteId": "s1", "name": "Mall", "city": "Pune", "country": "IN"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let sites = gateway.list_sites().await.unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].id(), Some("s1"));
}

#[tokio::test]
async fn test_unauthenticated_calls_pass_through() {
    let (server, gateway) = setup(Arc::new(RecordingSession::default())).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "ops@example.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "fresh",
            "user": {"id": 1, "email": "ops@example.com"}
        })))
        .mount(&server)
        .await;

    let password = SecretString::from("pw".to_owned());
    let resp = gateway.login("ops@example.com", &password).await.unwrap();
    assert_eq!(resp.bearer_token(), Some("fresh"));
    assert_eq!(resp.user.unwrap().email.as_deref(), Some("ops@example.com"));
}

#[tokio::test]
async fn test_analytics_body_shape() {
    let (server, gateway) = setup(RecordingSession::with_token("t")).await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/entry-exit"))
        .and(body_json(json!({
            "siteId": "site-1",
            "fromUtc": 1_710_460_800_000_i64,
            "toUtc": 1_710_547_199_999_i64,
            "pageNumber": 2,
            "pageSize": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"personId": "p1", "personName": "Asha", "dwellMinutes": 12.5}],
            "totalPages": 4
        })))
        .mount(&server)
        .await;

    let page = gateway
        .entry_exit(&EntryExitQuery {
            range: query(),
            page_number: 2,
            page_size: 10,
        })
        .await
        .unwrap();
    assert_eq!(page.total_pages, Some(4));
    assert_eq!(page.records[0].person_name.as_deref(), Some("Asha"));
}

// ── Response stage ──────────────────────────────────────────────────

#[tokio::test]
async fn test_html_success_is_malformed() {
    let (server, gateway) = setup(RecordingSession::with_token("t")).await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/occupancy"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<!doctype html><html><body>Not here</body></html>"),
        )
        .mount(&server)
        .await;

    let err = gateway.occupancy(&query()).await.unwrap_err();
    assert!(err.is_html_response(), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_occupancy_series_decodes() {
    let (server, gateway) = setup(RecordingSession::with_token("t")).await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/occupancy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"hourUtc": "2024-03-15T09:00:00Z", "count": 20},
            {"timestamp": 1_710_496_800_000_i64, "occupancy": 25}
        ])))
        .mount(&server)
        .await;

    let resp = gateway.occupancy(&query()).await.unwrap();
    let OccupancyResponse::Series(buckets) = resp else {
        panic!("expected series");
    };
    assert_eq!(buckets.len(), 2);
}

// ── Error stage ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_401_forces_logout() {
    let session = RecordingSession::with_token("expired");
    let (server, gateway) = setup(Arc::clone(&session)).await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/dwell"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "jwt expired"})))
        .mount(&server)
        .await;

    let err = gateway.dwell_time(&query()).await.unwrap_err();
    assert!(matches!(err, Error::Auth { status: 401, .. }), "got {err:?}");
    assert_eq!(err.backend_message().as_deref(), Some("jwt expired"));
    assert_eq!(
        session.logouts(),
        vec![ForcedLogoutReason::Unauthorized { status: 401 }]
    );
    assert!(session.bearer_token().is_none());
}

#[tokio::test]
async fn test_login_403_does_not_force_logout() {
    let session = Arc::new(RecordingSession::default());
    let (server, gateway) = setup(Arc::clone(&session)).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"error": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let password = SecretString::from("wrong".to_owned());
    let err = gateway.login("ops@example.com", &password).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(session.logouts().is_empty());
}

#[tokio::test]
async fn test_502_and_503_become_network_errors() {
    let (server, gateway) = setup(RecordingSession::with_token("t")).await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/footfall"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/analytics/demographics"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = gateway.footfall(&query()).await.unwrap_err();
    assert!(err.is_network_error());
    assert_eq!(err.status(), Some(502));
    assert!(err.to_string().contains("temporarily unavailable"));

    let err = gateway.demographics(&query()).await.unwrap_err();
    assert!(err.is_network_error());
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_400_is_bad_request_with_backend_message() {
    let session = RecordingSession::with_token("t");
    let (server, gateway) = setup(Arc::clone(&session)).await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/dwell"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "fromUtc must be a number"})),
        )
        .mount(&server)
        .await;

    let err = gateway.dwell_time(&query()).await.unwrap_err();
    let Error::BadRequest { message, .. } = &err else {
        panic!("expected BadRequest, got {err:?}");
    };
    assert_eq!(message, "fromUtc must be a number");
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(session.logouts().is_empty());
}

#[tokio::test]
async fn test_404_and_500_propagate_unchanged() {
    let session = RecordingSession::with_token("t");
    let (server, gateway) = setup(Arc::clone(&session)).await;

    Mock::given(method("GET"))
        .and(path("/api/sites/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such site"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sim/start"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = gateway.get_site("missing").await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Server);

    let err = gateway.start_simulation().await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 500, .. }));
    assert!(session.logouts().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let session = RecordingSession::with_token("t");
    // Nothing listens on port 9 (discard) in the test environment.
    let base_url = Url::parse("http://127.0.0.1:9/api").unwrap();
    let gateway = Gateway::with_client(reqwest::Client::new(), &base_url, session.clone());

    let err = gateway.list_sites().await.unwrap_err();
    let Error::Network { url, status, aborted, .. } = &err else {
        panic!("expected Network, got {err:?}");
    };
    assert_eq!(url, "http://127.0.0.1:9/api/sites");
    assert_eq!(*status, None);
    assert!(!aborted);
    assert!(session.logouts().is_empty());
}

/// A server that reads each request head and hangs up without answering.
async fn spawn_hangup_server() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let mut head = Vec::new();
            let mut buf = [0_u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                if stream.readable().await.is_err() {
                    break;
                }
                match stream.try_read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(_) => break,
                }
            }
            drop(stream);
        }
    });
    Url::parse(&format!("http://{addr}/api")).unwrap()
}

#[tokio::test]
async fn test_dropped_connection_forces_logout_except_on_login() {
    let session = RecordingSession::with_token("t");
    let base_url = spawn_hangup_server().await;
    let gateway = Gateway::with_client(reqwest::Client::new(), &base_url, session.clone());

    let password = SecretString::from("s3cret".to_owned());
    let err = gateway.login("ops@example.com", &password).await.unwrap_err();
    assert!(matches!(err, Error::Network { aborted: true, .. }), "got {err:?}");
    assert!(session.logouts().is_empty());

    let err = gateway.list_sites().await.unwrap_err();
    let Error::Network { status, aborted, .. } = &err else {
        panic!("expected Network, got {err:?}");
    };
    assert_eq!(*status, None);
    assert!(aborted);
    assert_eq!(session.logouts(), vec![ForcedLogoutReason::ConnectionAborted]);
    assert!(session.bearer_token().is_none());
}

#[tokio::test]
async fn test_wrapped_single_site() {
    let (server, gateway) = setup(RecordingSession::with_token("t")).await;

    Mock::given(method("GET"))
        .and(path("/api/sites/s-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"siteId": "s-9", "name": "Stadium"}
        })))
        .mount(&server)
        .await;

    let site = gateway.get_site("s-9").await.unwrap();
    assert_eq!(site.name, "Stadium");
}

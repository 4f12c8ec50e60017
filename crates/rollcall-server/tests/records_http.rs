use rollcall_server::{build_router, AppState, ClusterRunner, ServerConfig};
use rollcall_store::{FakeSheets, RecordStore, SheetsBackend, StoreConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const SHEET: &str = "data-absensi";

fn seeded() -> Arc<FakeSheets> {
    Arc::new(FakeSheets::new().with_sheet(
        SHEET,
        vec![
            vec!["NRP", "Nama", "Tanggal Absensi"],
            vec!["001", "Andi", "2024-05-01"],
            vec!["002", "Budi", "2024-05-01"],
            vec!["001", "Andi", "2024-05-02"],
        ],
    ))
}

async fn spawn_with(
    backend: Arc<FakeSheets>,
    runner: Option<ClusterRunner>,
) -> std::net::SocketAddr {
    let dyn_backend: Arc<dyn SheetsBackend> = backend;
    let store = RecordStore::new(dyn_backend, StoreConfig::default());
    let mut state = AppState::new(store, ServerConfig::default());
    if let Some(runner) = runner {
        state = state.with_clusters(runner);
    }
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("serve");
    });
    addr
}

async fn send_raw(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
    let req = match body {
        Some(body) => {
            let payload = body.to_string();
            format!(
                "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                payload.len()
            )
        }
        None => format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n"),
    };
    stream.write_all(req.as_bytes()).await.expect("write");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    (status, head.to_ascii_lowercase(), body.to_string())
}

fn json_of(body: &str) -> Value {
    serde_json::from_str(body).expect("json body")
}

#[tokio::test]
async fn list_returns_records_with_counters_and_request_id() {
    let addr = spawn_with(seeded(), None).await;
    let (status, head, body) = send_raw(addr, "GET", "/v1/records?limit=2", None).await;
    assert_eq!(status, 200);
    assert!(head.contains("x-request-id: req-"));
    let body = json_of(&body);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["data"][0]["Nama"], "Andi");
    assert_eq!(body["totalAvailableRecords"], 3);

    let (_, _, body) = send_raw(addr, "GET", "/v1/records?limit=abc", None).await;
    assert_eq!(json_of(&body)["data"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn row_and_nrp_lookups() {
    let addr = spawn_with(seeded(), None).await;
    let (status, _, body) = send_raw(addr, "GET", "/v1/records?row=3", None).await;
    assert_eq!(status, 200);
    let body = json_of(&body);
    assert_eq!(body["data"]["NRP"], "002");
    assert_eq!(body["row"], 3);

    let (status, _, body) = send_raw(addr, "GET", "/v1/records?row=9", None).await;
    assert_eq!(status, 404);
    let body = json_of(&body);
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["message"], "No data found at row 9.");

    let (status, _, _) = send_raw(addr, "GET", "/v1/records?row=1", None).await;
    assert_eq!(status, 400);

    let (status, _, body) = send_raw(addr, "GET", "/v1/records?nrp=001", None).await;
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["rows"], json!([2, 4]));

    let (status, _, _) = send_raw(addr, "GET", "/v1/records?nrp=999", None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn missing_sheet_headers_is_not_found() {
    let backend = Arc::new(FakeSheets::new().with_sheet(SHEET, Vec::<Vec<String>>::new()));
    let addr = spawn_with(backend, None).await;
    let (status, _, body) = send_raw(addr, "GET", "/v1/records", None).await;
    assert_eq!(status, 404);
    assert_eq!(json_of(&body)["code"], "not_found");
}

#[tokio::test]
async fn bulk_append_skips_existing_identity_keys() {
    let backend = seeded();
    let addr = spawn_with(backend.clone(), None).await;
    let payload = json!({"data": [
        {"NRP": "001", "Nama": "Andi", "Tanggal Absensi": "2024-05-01"},
        {"NRP": "003", "Nama": "Citra", "Tanggal Absensi": "2024-05-01"}
    ]});
    let (status, _, body) = send_raw(addr, "POST", "/v1/records", Some(payload.clone())).await;
    assert_eq!(status, 200);
    let body = json_of(&body);
    assert_eq!(body["recordsWritten"], 1);
    assert_eq!(body["duplicatesSkipped"], 1);
    assert_eq!(
        body["message"],
        format!("Successfully appended 1 new records to {SHEET}.")
    );

    let (_, _, body) = send_raw(addr, "POST", "/v1/records", Some(payload)).await;
    assert_eq!(
        json_of(&body)["message"],
        "No new records to add (all records already exist or match duplicates)."
    );
    let grid = backend.snapshot(SHEET).await.expect("sheet");
    assert_eq!(grid.len(), 5);
    assert_eq!(grid[4][0], "003");
}

#[tokio::test]
async fn bulk_replace_and_single_record_writes() {
    let backend = seeded();
    let addr = spawn_with(backend.clone(), None).await;
    let payload = json!({"appendMode": false, "data": [
        {"NRP": "009", "Nama": "Dewi", "Tanggal Absensi": "2024-06-01"}
    ]});
    let (status, _, body) = send_raw(addr, "POST", "/v1/records", Some(payload)).await;
    assert_eq!(status, 200);
    assert_eq!(
        json_of(&body)["message"],
        format!("Successfully replaced data with 1 records in {SHEET}.")
    );
    assert_eq!(backend.snapshot(SHEET).await.expect("sheet").len(), 2);

    let payload = json!({"record": {"NRP": "010", "Nama": "Eka", "Tanggal Absensi": 20240602}});
    let (status, _, body) = send_raw(addr, "POST", "/v1/records", Some(payload)).await;
    assert_eq!(status, 200);
    let body = json_of(&body);
    assert_eq!(body["data"]["row"], 3);
    let grid = backend.snapshot(SHEET).await.expect("sheet");
    assert_eq!(grid[2], vec!["010", "Eka", "20240602"]);

    let (status, _, _) = send_raw(addr, "POST", "/v1/records", Some(json!({"data": []}))).await;
    assert_eq!(status, 400);
    let (status, _, _) = send_raw(addr, "POST", "/v1/records", Some(json!({"nothing": 1}))).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn put_overwrites_the_whole_row() {
    let backend = seeded();
    let addr = spawn_with(backend.clone(), None).await;
    let (status, _, _) = send_raw(addr, "PUT", "/v1/records", Some(json!({"record": {}}))).await;
    assert_eq!(status, 400);

    let (status, _, body) = send_raw(
        addr,
        "PUT",
        "/v1/records?row=3",
        Some(json!({"record": {"NRP": "002", "Nama": "Budi S"}})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        json_of(&body)["message"],
        format!("Record at row 3 in {SHEET} updated successfully.")
    );
    let grid = backend.snapshot(SHEET).await.expect("sheet");
    assert_eq!(grid[2], vec!["002", "Budi S"]);
}

#[tokio::test]
async fn put_with_an_empty_record_keeps_the_row() {
    let backend = seeded();
    let addr = spawn_with(backend.clone(), None).await;
    let before = backend.snapshot(SHEET).await.expect("sheet");
    for record in [json!({}), json!({"NRP": " ", "Nama": null})] {
        let (status, _, body) = send_raw(
            addr,
            "PUT",
            "/v1/records?row=2",
            Some(json!({ "record": record })),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(json_of(&body)["code"], "validation_error");
    }
    assert_eq!(backend.snapshot(SHEET).await.expect("sheet"), before);
}

#[tokio::test]
async fn bulk_append_of_blank_entries_is_rejected() {
    let backend = seeded();
    let addr = spawn_with(backend.clone(), None).await;
    let payload = json!({"data": [{}, {"NRP": ""}]});
    let (status, _, _) = send_raw(addr, "POST", "/v1/records", Some(payload)).await;
    assert_eq!(status, 400);
    assert_eq!(backend.snapshot(SHEET).await.expect("sheet").len(), 4);
}

#[tokio::test]
async fn delete_modes_follow_parameter_precedence() {
    let backend = seeded();
    let addr = spawn_with(backend.clone(), None).await;
    let (status, _, _) = send_raw(addr, "DELETE", "/v1/records?row=2", None).await;
    assert_eq!(status, 200);
    let grid = backend.snapshot(SHEET).await.expect("sheet");
    assert_eq!(grid.len(), 3);
    assert_eq!(grid[1][0], "002");

    let (status, _, _) =
        send_raw(addr, "DELETE", "/v1/records?row=2&sheetName=Missing", None).await;
    assert_eq!(status, 404);

    let (status, _, body) =
        send_raw(addr, "DELETE", "/v1/records?range=data-absensi!A2:C2", None).await;
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["data"]["status"], "cleared");

    let (status, _, body) =
        send_raw(addr, "DELETE", &format!("/v1/records?clearSheet={SHEET}"), None).await;
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["data"]["status"], "cleared");
    assert_eq!(backend.snapshot(SHEET).await.expect("sheet").len(), 1);

    let (status, _, _) = send_raw(addr, "DELETE", "/v1/records", None).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn clearing_a_headerless_sheet_reports_already_empty() {
    let backend = Arc::new(FakeSheets::new().with_sheet("Kosong", Vec::<Vec<String>>::new()));
    let addr = spawn_with(backend, None).await;
    let (status, _, body) =
        send_raw(addr, "DELETE", "/v1/records?clearSheet=Kosong", None).await;
    assert_eq!(status, 200);
    let body = json_of(&body);
    assert_eq!(body["data"]["status"], "already_empty");
    assert_eq!(
        body["message"],
        "Sheet 'Kosong' is already empty or has no headers."
    );
}

#[tokio::test]
async fn upstream_outage_maps_to_500_and_failed_connection_check() {
    let backend = seeded();
    let addr = spawn_with(backend.clone(), None).await;
    let (status, head, _) = send_raw(addr, "HEAD", "/v1/records", None).await;
    assert_eq!(status, 200);
    assert!(head.contains("x-connection-status: ok"));

    backend.set_offline(true);
    let (status, head, _) = send_raw(addr, "HEAD", "/v1/records", None).await;
    assert_eq!(status, 500);
    assert!(head.contains("x-connection-status: error"));

    let (status, _, body) = send_raw(addr, "GET", "/v1/records", None).await;
    assert_eq!(status, 500);
    let body = json_of(&body);
    assert_eq!(body["code"], "upstream_error");
    assert_eq!(body["error"], "Failed to fetch records from the spreadsheet");
    assert!(body["details"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn health_and_features_endpoints() {
    let backend = Arc::new(FakeSheets::new().with_sheet(
        SHEET,
        vec![
            vec!["NRP", "Status", "Jenis Absensi", "Waktu Absensi"],
            vec!["001", "Hadir", "Masuk", "07:55"],
            vec!["001", "Terlambat", "Masuk", "08:20"],
            vec!["002", "Hadir", "Pulang", "16:00"],
        ],
    ));
    let addr = spawn_with(backend, None).await;
    let (status, _, body) = send_raw(addr, "GET", "/healthz", None).await;
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["data"]["backend"], "fake");

    let (status, _, body) = send_raw(addr, "GET", "/v1/features", None).await;
    assert_eq!(status, 200);
    let body = json_of(&body);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["nrp"], "001");
    assert_eq!(body["data"][0]["total_masuk"], 2);
}

#[tokio::test]
async fn clusters_are_unavailable_without_a_command() {
    let addr = spawn_with(seeded(), None).await;
    let (status, _, body) = send_raw(
        addr,
        "POST",
        "/v1/clusters",
        Some(json!({"features": [[1.0], [2.0]], "k": 1})),
    )
    .await;
    assert_eq!(status, 503);
    assert_eq!(json_of(&body)["code"], "unavailable");
}

#[cfg(unix)]
#[tokio::test]
async fn clusters_delegate_to_the_configured_command() {
    let script = r#"cat > /dev/null; printf '{"cluster_labels":[0,0],"cluster_centers":[[1.5]]}'"#;
    let runner = ClusterRunner::new("sh", vec!["-c".into(), script.into()], Duration::from_secs(5));
    let addr = spawn_with(seeded(), Some(runner)).await;
    let (status, _, body) = send_raw(
        addr,
        "POST",
        "/v1/clusters",
        Some(json!({"features": [[1.0], [2.0]], "k": 1})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["data"]["cluster_labels"], json!([0, 0]));

    let (status, _, _) = send_raw(
        addr,
        "POST",
        "/v1/clusters",
        Some(json!({"features": [[1.0]], "k": 2})),
    )
    .await;
    assert_eq!(status, 400);
}

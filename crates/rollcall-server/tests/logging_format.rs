use rollcall_server::{build_router, AppState, ServerConfig};
use rollcall_store::{FakeSheets, RecordStore, SheetsBackend, StoreConfig};
use serde_json::Value;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn log_lines(sink: &SharedBuffer) -> Vec<Value> {
    let bytes = sink.0.lock().expect("lock output").clone();
    String::from_utf8(bytes)
        .expect("utf8 log output")
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("json log line"))
        .collect()
}

// The current-thread runtime polls the spawned server on this thread, so the
// thread-local subscriber sees the middleware's span and events.
#[tokio::test]
async fn router_request_logs_are_json_with_span_context() {
    let sink = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend: Arc<dyn SheetsBackend> = Arc::new(FakeSheets::new());
    let store = RecordStore::new(backend, StoreConfig::default());
    let app = build_router(AppState::new(store, ServerConfig::default()));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
    let req = format!(
        "GET /healthz HTTP/1.1\r\nHost: {addr}\r\nx-correlation-id: corr-7\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(req.as_bytes()).await.expect("write");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let header_id = response
        .lines()
        .find_map(|l| l.to_ascii_lowercase().strip_prefix("x-request-id: ").map(str::to_string))
        .expect("request id header");
    assert!(response.starts_with("HTTP/1.1 200"));

    let lines = log_lines(&sink);
    let finished = lines
        .iter()
        .find(|l| l["fields"]["message"] == "request finished")
        .expect("request finished event");
    assert_eq!(finished["level"], "INFO");
    assert_eq!(finished["fields"]["status"].as_u64(), Some(200));

    let span = &finished["span"];
    assert_eq!(span["name"], "http.request");
    assert_eq!(span["method"], "GET");
    assert_eq!(span["route"], "/healthz");
    assert_eq!(span["backend"], "fake");
    assert_eq!(span["correlation_id"], "corr-7");
    let request_id = span["request_id"].as_str().expect("request_id field");
    assert!(request_id.starts_with("req-"));
    assert_eq!(request_id, header_id.trim());
}

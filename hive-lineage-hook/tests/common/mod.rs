//! Stub metadata collector for integration tests
//!
//! A minimal HTTP/1.1 responder running on its own thread and Tokio runtime,
//! optionally behind TLS with a freshly generated self-signed certificate.
//! Every request is captured so tests can decode what the hook sent.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub const SUBMIT_PATH: &str = "/entities/submit/HiveLineage";

/// How the stub answers every request
#[derive(Debug, Clone)]
pub enum Reply {
    /// Status line plus body with a correct Content-Length
    Status(u16, Vec<u8>),
    /// Bytes written verbatim, then the connection is closed
    Raw(Vec<u8>),
    /// Never answer
    Hang,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply::Status(200, body.as_bytes().to_vec())
    }
}

/// A request as the collector saw it
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct StubCollector {
    addr: SocketAddr,
    secure: bool,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl StubCollector {
    /// Plain HTTP collector
    pub fn start(reply: Reply) -> Self {
        Self::spawn(reply, None)
    }

    /// HTTPS collector presenting a self-signed certificate for `localhost`
    pub fn start_tls(reply: Reply) -> Self {
        Self::spawn(reply, Some(self_signed_acceptor()))
    }

    fn spawn(reply: Reply, tls: Option<TlsAcceptor>) -> Self {
        hive_lineage_hook::logging::init_test();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);
        let secure = tls.is_some();
        let (addr_tx, addr_rx) = mpsc::channel();

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("stub runtime");
            runtime.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
                addr_tx
                    .send(listener.local_addr().expect("stub addr"))
                    .expect("send stub addr");

                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        continue;
                    };
                    let reply = reply.clone();
                    let captured = Arc::clone(&captured);
                    let tls = tls.clone();
                    tokio::spawn(async move {
                        match tls {
                            Some(acceptor) => {
                                if let Ok(stream) = acceptor.accept(stream).await {
                                    serve(stream, reply, captured).await;
                                }
                            }
                            None => serve(stream, reply, captured).await,
                        }
                    });
                }
            });
        });

        let addr = addr_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("stub collector did not start");
        Self {
            addr,
            secure,
            requests,
        }
    }

    /// Submit URL for this collector
    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}{}", scheme, self.addr, SUBMIT_PATH)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

/// A URL nothing is listening on
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);
    format!("http://{}{}", addr, SUBMIT_PATH)
}

fn self_signed_acceptor() -> TlsAcceptor {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("generate certificate");
    let cert_der = certified.cert.der().clone();
    let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(
        rustls::pki_types::PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()),
    );

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .expect("protocol versions")
    .with_no_client_auth()
    .with_single_cert(vec![cert_der], key_der)
    .expect("server config");

    TlsAcceptor::from(Arc::new(config))
}

async fn serve<S>(mut stream: S, reply: Reply, captured: Arc<Mutex<Vec<CapturedRequest>>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    captured.lock().expect("requests lock").push(request);

    let bytes = match reply {
        Reply::Status(status, body) => {
            let mut out = format!(
                "HTTP/1.1 {} Stub\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            )
            .into_bytes();
            out.extend_from_slice(&body);
            out
        }
        Reply::Raw(bytes) => bytes,
        Reply::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return;
        }
    };

    let _ = stream.write_all(&bytes).await;
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
}

async fn read_request<S>(stream: &mut S) -> Option<CapturedRequest>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(CapturedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

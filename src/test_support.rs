//! In-process HTTP/1.1 stub used by the network tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct StubResponse {
    status: u16,
    body: Vec<u8>,
    content_type: &'static str,
    pace: Option<(usize, Duration)>,
    stall_after: Option<usize>,
}

impl StubResponse {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            body: body.as_bytes().to_vec(),
            content_type: "application/json",
            pace: None,
            stall_after: None,
        }
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            content_type: "application/zip",
            pace: None,
            stall_after: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            content_type: "text/plain",
            pace: None,
            stall_after: None,
        }
    }

    /// Body is written `chunk` bytes at a time with `delay` between writes.
    pub fn paced(mut self, chunk: usize, delay: Duration) -> Self {
        self.pace = Some((chunk.max(1), delay));
        self
    }

    /// Sends the full-length headers and the first `bytes` of the body, then goes silent.
    pub fn stall_after(mut self, bytes: usize) -> Self {
        self.stall_after = Some(bytes);
        self
    }
}

pub struct StubServer {
    addr: SocketAddr,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: Vec<(&str, StubResponse)>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener address");
        let routes: Arc<HashMap<String, StubResponse>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, response)| (path.to_string(), response))
                .collect(),
        );
        let hits = Arc::new(Mutex::new(HashMap::new()));

        let hits_for_loop = hits.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let routes = routes.clone();
                let hits = hits_for_loop.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, routes, hits).await;
                });
            }
        });

        Self { addr, hits, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self, target: &str) -> usize {
        self.hits
            .lock()
            .map(|map| map.get(target).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Origin on which nothing is listening.
pub fn closed_origin() -> String {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind probe port");
    let port = listener.local_addr().expect("probe address").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

async fn serve(
    mut stream: TcpStream,
    routes: Arc<HashMap<String, StubResponse>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = stream.read(&mut chunk).await?;
        if read == 0 || buffer.len() > 64 * 1024 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    let head = String::from_utf8_lossy(&buffer);
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    if let Ok(mut map) = hits.lock() {
        *map.entry(target.clone()).or_insert(0) += 1;
    }

    let path_only = target.split('?').next().unwrap_or("/");
    let response = routes
        .get(&target)
        .or_else(|| routes.get(path_only))
        .cloned()
        .unwrap_or_else(|| StubResponse::status(404));

    let header = format!(
        "HTTP/1.1 {} Stub\r\nContent-Length: {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.body.len(),
        response.content_type
    );
    stream.write_all(header.as_bytes()).await?;
    if let Some(bytes) = response.stall_after {
        stream
            .write_all(&response.body[..bytes.min(response.body.len())])
            .await?;
        stream.flush().await?;
        tokio::time::sleep(Duration::from_secs(60)).await;
        return Ok(());
    }
    match response.pace {
        Some((size, delay)) => {
            for piece in response.body.chunks(size) {
                stream.write_all(piece).await?;
                stream.flush().await?;
                tokio::time::sleep(delay).await;
            }
        }
        None => stream.write_all(&response.body).await?,
    }
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}

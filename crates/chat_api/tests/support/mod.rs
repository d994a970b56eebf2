//! Scripted local HTTP server for transport tests.
//!
//! Responses are described as timed chunks so tests can split SSE frames at
//! arbitrary byte offsets and stall mid-stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ParsedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct ReplyChunk {
    pub delay: Duration,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub status: u16,
    pub content_type: &'static str,
    pub chunks: Vec<ReplyChunk>,
}

impl ScriptedReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            chunks: vec![ReplyChunk {
                delay: Duration::ZERO,
                bytes: body.as_bytes().to_vec(),
            }],
        }
    }

    /// An event-stream response delivered as the given raw chunks.
    pub fn sse(chunks: &[&[u8]]) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            chunks: chunks
                .iter()
                .map(|bytes| ReplyChunk {
                    delay: Duration::ZERO,
                    bytes: bytes.to_vec(),
                })
                .collect(),
        }
    }

    /// An event-stream response with one `data: ` line per frame.
    pub fn sse_frames(frames: &[&str]) -> Self {
        let mut body = String::new();
        for frame in frames {
            body.push_str("data: ");
            body.push_str(frame);
            body.push('\n');
        }
        Self::sse(&[body.as_bytes()])
    }

    /// Append bytes delivered only after `delay`, keeping the connection
    /// open in the meantime.
    pub fn then_after(mut self, delay: Duration, bytes: &[u8]) -> Self {
        self.chunks.push(ReplyChunk {
            delay,
            bytes: bytes.to_vec(),
        });
        self
    }
}

pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn<F>(route: F) -> Self
    where
        F: Fn(&ParsedRequest) -> ScriptedReply + Send + Sync + 'static,
    {
        let route = Arc::new(route);
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener.local_addr().expect("resolved listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                let route = Arc::clone(&route);
                tokio::spawn(async move {
                    serve_one(socket, route).await;
                });
            }
        });

        Self { base_url, handle }
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

async fn serve_one<F>(mut socket: TcpStream, route: Arc<F>)
where
    F: Fn(&ParsedRequest) -> ScriptedReply + Send + Sync + 'static,
{
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let reply = route(&request);

    let total: usize = reply.chunks.iter().map(|chunk| chunk.bytes.len()).sum();
    let reason = match reply.status {
        200 => "OK",
        401 => "Unauthorized",
        _ => "Error",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        reply.status, reason, reply.content_type, total
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }

    for chunk in reply.chunks {
        if !chunk.delay.is_zero() {
            tokio::time::sleep(chunk.delay).await;
        }
        if socket.write_all(&chunk.bytes).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<ParsedRequest> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        if let Some(position) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
            break position;
        }
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        raw.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = raw[header_end + 4..].to_vec();
    while body.len() < content_length {
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Some(ParsedRequest {
        method,
        path,
        headers,
        body,
    })
}

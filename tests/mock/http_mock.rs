#![allow(dead_code)]

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Minimal HTTP/1.1 server on 127.0.0.1 answering GETs by path suffix.
/// Unmatched paths get a 404.
pub struct StubHub {
    routes: Vec<(String, u16, Vec<u8>)>,
}

impl StubHub {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn with_route(mut self, path_suffix: &str, status: u16, body: Vec<u8>) -> Self {
        self.routes.push((path_suffix.to_string(), status, body));
        self
    }

    /// Binds an ephemeral port and serves until the test runtime shuts down.
    pub async fn spawn(self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let routes = self.routes.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, &routes).await;
                });
            }
        });

        addr
    }
}

async fn serve(mut stream: TcpStream, routes: &[(String, u16, Vec<u8>)]) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }

    let request_line = String::from_utf8_lossy(&request);
    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();

    let (status, body) = routes
        .iter()
        .find(|(suffix, _, _)| path.ends_with(suffix.as_str()))
        .map(|(_, status, body)| (*status, body.clone()))
        .unwrap_or((404, b"Entry not found".to_vec()));

    let reason = if status == 200 { "OK" } else { "Error" };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await
}

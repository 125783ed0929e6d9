//! Minimal HTTP/1.1 responder for exercising remote fetches in unit tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Canned reply for one request path.
#[derive(Debug, Clone)]
pub(crate) struct Route {
  pub status: u16,
  pub content_type: Option<&'static str>,
  pub body: Vec<u8>,
}

impl Route {
  pub(crate) fn ok(content_type: Option<&'static str>, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status: 200,
      content_type,
      body: body.into(),
    }
  }
}

/// Serve `routes` on an ephemeral localhost port, matching on the path without its query.
/// Unknown paths get a 404.
///
/// The accept loop runs on the test's runtime and ends with it.
pub(crate) async fn serve(routes: Vec<(&'static str, Route)>) -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  let routes: Arc<HashMap<&'static str, Route>> = Arc::new(routes.into_iter().collect());

  tokio::spawn(async move {
    while let Ok((mut stream, _)) = listener.accept().await {
      let routes = Arc::clone(&routes);
      tokio::spawn(async move {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
          match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
          }
        }
        let head = String::from_utf8_lossy(&request);
        let target = head.split_whitespace().nth(1).unwrap_or("/");
        let path = target.split('?').next().unwrap_or(target).to_string();

        let missing = Route {
          status: 404,
          content_type: Some("text/plain"),
          body: b"not found".to_vec(),
        };
        let route = routes.get(path.as_str()).unwrap_or(&missing);
        let reason = if route.status == 200 { "OK" } else { "Not Found" };
        let mut response = format!("HTTP/1.1 {} {reason}\r\n", route.status);
        if let Some(content_type) = route.content_type {
          response.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        response.push_str(&format!(
          "Content-Length: {}\r\nConnection: close\r\n\r\n",
          route.body.len()
        ));
        let mut bytes = response.into_bytes();
        bytes.extend_from_slice(&route.body);
        let _ = stream.write_all(&bytes).await;
        let _ = stream.shutdown().await;
      });
    }
  });

  addr
}

/// Client that ignores proxy environment variables, so localhost stays local.
pub(crate) fn direct_client() -> reqwest::Client {
  reqwest::Client::builder().no_proxy().build().unwrap()
}

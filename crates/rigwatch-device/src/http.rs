//! Minimal HTTP/1.1 client used for every device REST call.
//!
//! One TCP connection per request, driven by hyper's low-level connection
//! API, bounded by a single timeout covering connect, send and body read.

use std::time::Duration;

use bytes::Bytes;
use http::Method;
use http_body_util::{BodyExt, Empty};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{DeviceError, DeviceResult};

/// Perform one request against `address` (`host:port`) and return the body.
///
/// Non-2xx responses are errors.
pub async fn call(
    method: Method,
    address: &str,
    path: &str,
    timeout: Duration,
) -> DeviceResult<Bytes> {
    let uri = format!("http://{address}{path}");

    let result = tokio::time::timeout(timeout, async {
        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|e| DeviceError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| DeviceError::Http(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method(method)
            .uri(path)
            .header("host", address)
            .header("user-agent", "rigwatch-gateway/0.1")
            .body(Empty::<Bytes>::new())
            .map_err(|e| DeviceError::Http(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| DeviceError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%status, %uri, "device call non-2xx");
            return Err(DeviceError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| DeviceError::Http(e.to_string()))?
            .to_bytes();
        Ok(body)
    })
    .await;

    match result {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(%uri, "device call timed out");
            Err(DeviceError::Timeout {
                address: address.to_string(),
                path: path.to_string(),
            })
        }
    }
}

/// GET `path` and decode the JSON body.
pub async fn get_json<T: DeserializeOwned>(
    address: &str,
    path: &str,
    timeout: Duration,
) -> DeviceResult<T> {
    let body = call(Method::GET, address, path, timeout).await?;
    serde_json::from_slice(&body).map_err(|e| DeviceError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// POST `path` with an empty body, discarding the response body.
pub async fn post(address: &str, path: &str, timeout: Duration) -> DeviceResult<()> {
    call(Method::POST, address, path, timeout).await.map(|_| ())
}

#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Serve canned responses; each request line is reported on the channel.
    pub async fn serve(
        responses: Vec<(u16, &'static str)>,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let line = request.lines().next().unwrap_or_default().to_string();
                let _ = tx.send(line);
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-length: {}\r\ncontent-type: application/json\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (address, rx)
    }
}

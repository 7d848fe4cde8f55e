//! TCP readiness probing.

use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::error::RuntimeError;

/// Upper bound for a single connection attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Wait until something accepts TCP connections on `host:port`.
///
/// Probes every `interval` until a connection succeeds or `deadline` has
/// elapsed since the call started. This only proves the socket is
/// listening, not that the service behind it is ready.
pub async fn wait_for_port(
    host: &str,
    port: u16,
    deadline: Duration,
    interval: Duration,
) -> Result<(), RuntimeError> {
    let addr = format!("{}:{}", host, port);
    let start = Instant::now();

    info!("Waiting for {} to accept connections...", addr);

    loop {
        let remaining = deadline.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }

        match timeout(CONNECT_TIMEOUT.min(remaining), TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                info!("{} is accepting connections", addr);
                return Ok(());
            }
            Ok(Err(e)) => debug!("{} not reachable yet: {}", addr, e),
            Err(_) => debug!("Connection attempt to {} timed out", addr),
        }

        let remaining = deadline.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        sleep(interval.min(remaining)).await;
    }

    Err(RuntimeError::ReadinessTimeout {
        addr,
        timeout: deadline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn unused_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_succeeds_with_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = wait_for_port(
            "127.0.0.1",
            port,
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_succeeds_once_listener_appears() {
        let port = unused_port().await;

        tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
                .await
                .unwrap();
            let _ = listener.accept().await;
        });

        let result = wait_for_port(
            "127.0.0.1",
            port,
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_times_out_without_listener() {
        let port = unused_port().await;
        let deadline = Duration::from_millis(600);

        let start = Instant::now();
        let err = wait_for_port("127.0.0.1", port, deadline, Duration::from_millis(100))
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, RuntimeError::ReadinessTimeout { .. }));
        assert!(elapsed >= deadline, "gave up early: {:?}", elapsed);
        assert!(elapsed < deadline + Duration::from_millis(500), "gave up late: {:?}", elapsed);
    }
}

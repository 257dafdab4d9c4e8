//! Sending built requests over the wire.

use std::time;

use futures::future::BoxFuture;
use tracing::debug;

use crate::TransportError;

/// Executes HTTP requests on behalf of a [`Server`](crate::Server).
///
/// Retries, pooling and TLS are the transport's concern. Each call to
/// `execute` resolves exactly once.
pub trait Transport: Send + Sync {
    /// Send a request and collect the full response body.
    fn execute(
        &self,
        req: http::Request<Vec<u8>>,
    ) -> BoxFuture<'_, Result<http::Response<Vec<u8>>, TransportError>>;
}

/// A [`Transport`] backed by a blocking [`ureq::Agent`], run on the tokio
/// blocking pool.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// A transport with the given overall request timeout.
    pub fn new(timeout: Option<time::Duration>) -> Self {
        let cfg = ureq::config::Config::builder()
            .http_status_as_error(false)
            .timeout_global(timeout);

        Self {
            agent: ureq::Agent::new_with_config(cfg.build()),
        }
    }

    /// Wrap an existing agent. The agent must be configured with
    /// `http_status_as_error(false)`, so that error bodies can be decoded.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Some(time::Duration::from_secs(30)))
    }
}

impl Transport for UreqTransport {
    fn execute(
        &self,
        req: http::Request<Vec<u8>>,
    ) -> BoxFuture<'_, Result<http::Response<Vec<u8>>, TransportError>> {
        let agent = self.agent.clone();
        Box::pin(async move {
            let resp = tokio::task::spawn_blocking(move || {
                let resp = agent.run(req).map_err(TransportError::connection)?;
                let (parts, mut body) = resp.into_parts();
                let bytes = body.read_to_vec().map_err(TransportError::connection)?;
                Ok::<_, TransportError>(http::Response::from_parts(parts, bytes))
            })
            .await
            .map_err(TransportError::connection)??;

            debug!(status = %resp.status(), len = resp.body().len(), "received response");
            Ok(resp)
        })
    }
}

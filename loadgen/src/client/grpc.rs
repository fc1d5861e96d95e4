//! gRPC implementation of the Client Service

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

use super::pb::{self, frontend_client::FrontendClient};
use super::service::{ClientService, MatchResult, UpdateStream};
use crate::config::Config;
use crate::error::ClientError;

/// Client for the matchmaking frontend.
///
/// All sessions share one lazily-connected channel. Failing to reach the
/// frontend only fails the call that observed it.
#[derive(Clone)]
pub struct GrpcClientService {
    client: FrontendClient<Channel>,
}

impl GrpcClientService {
    /// Build a client from the process configuration without dialing yet
    pub fn connect_lazy(config: &Config) -> Result<Self, ClientError> {
        let mut endpoint = Endpoint::from_shared(config.frontend_uri())
            .map_err(|e| ClientError::InvalidEndpoint(e.to_string()))?
            .connect_timeout(config.connect_timeout);

        if config.frontend_tls {
            let tls = ClientTlsConfig::new()
                .with_webpki_roots()
                .domain_name(config.frontend_host.clone());
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| ClientError::InvalidEndpoint(e.to_string()))?;
        }

        debug!(uri = %config.frontend_uri(), "Frontend channel configured");
        Ok(Self {
            client: FrontendClient::new(endpoint.connect_lazy()),
        })
    }

    fn player(id: &str, properties: &str) -> pb::Player {
        pb::Player {
            id: id.to_string(),
            properties: properties.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ClientService for GrpcClientService {
    async fn create_session(&self, id: &str, properties: &str) -> Result<bool, ClientError> {
        let response = self
            .client
            .clone()
            .create_player(Self::player(id, properties))
            .await?;
        Ok(response.into_inner().success)
    }

    async fn subscribe_updates(
        &self,
        id: &str,
        deadline: Duration,
    ) -> Result<UpdateStream, ClientError> {
        let mut request = tonic::Request::new(Self::player(id, ""));
        request.set_timeout(deadline);

        let stream = self.client.clone().get_updates(request).await?.into_inner();
        Ok(stream
            .map(|update| update.map(MatchResult::from).map_err(ClientError::from))
            .boxed())
    }

    async fn delete_session(&self, id: &str) -> Result<bool, ClientError> {
        let response = self
            .client
            .clone()
            .delete_player(Self::player(id, ""))
            .await?;
        Ok(response.into_inner().success)
    }
}

//! ClientService trait definition

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::pb;
use crate::error::ClientError;

/// Lazy sequence of match updates for one session, ended by end-of-stream
pub type UpdateStream = BoxStream<'static, Result<MatchResult, ClientError>>;

/// Match update delivered for a registered session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// Session identity the update refers to
    pub id: String,
    /// Game server assignment, if the frontend made one
    pub assignment: Option<String>,
}

impl From<pb::Player> for MatchResult {
    fn from(player: pb::Player) -> Self {
        Self {
            id: player.id,
            assignment: (!player.assignment.is_empty()).then_some(player.assignment),
        }
    }
}

/// Trait for the backend under test (gRPC frontend, or a mock in tests)
#[async_trait]
pub trait ClientService: Send + Sync {
    /// Register a session carrying an opaque properties payload
    async fn create_session(&self, id: &str, properties: &str) -> Result<bool, ClientError>;

    /// Open the result stream of a session; the stream ends by `deadline`
    async fn subscribe_updates(
        &self,
        id: &str,
        deadline: Duration,
    ) -> Result<UpdateStream, ClientError>;

    /// Deregister a session
    async fn delete_session(&self, id: &str) -> Result<bool, ClientError>;
}

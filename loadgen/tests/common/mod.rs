//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use mecha_loadgen::{ClientError, ClientService, Config, MatchResult, UpdateStream};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How the mock answers `subscribe_updates`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamBehavior {
    /// Deliver a match immediately (followed by a second, ignored one)
    #[default]
    Match,
    /// End the stream without a result
    Eof,
    /// Never deliver anything
    Hang,
    /// Fail while reading the stream
    Error,
}

/// In-memory matchmaking frontend recording every call
#[derive(Default)]
pub struct MockClientService {
    pub stream: StreamBehavior,
    pub fail_create: bool,
    pub fail_subscribe: bool,
    /// Only creates for ids ending in this suffix fail
    pub fail_create_suffix: Option<String>,
    creates: Mutex<Vec<String>>,
    subscribes: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    open: AtomicUsize,
    peak_open: AtomicUsize,
}

impl MockClientService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(stream: StreamBehavior) -> Self {
        Self {
            stream,
            ..Self::default()
        }
    }

    /// Every create fails with a connection error
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    /// Creates for ids ending in `suffix` fail, the rest succeed
    pub fn failing_create_for(suffix: &str) -> Self {
        Self {
            fail_create_suffix: Some(suffix.to_string()),
            ..Self::default()
        }
    }

    /// Every subscription is rejected after a successful create
    pub fn failing_subscribe() -> Self {
        Self {
            fail_subscribe: true,
            ..Self::default()
        }
    }

    pub fn creates(&self) -> Vec<String> {
        self.creates.lock().unwrap().clone()
    }

    pub fn subscribes(&self) -> Vec<String> {
        self.subscribes.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    /// Highest number of sessions registered and not yet deleted at once
    pub fn peak_open(&self) -> usize {
        self.peak_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientService for MockClientService {
    async fn create_session(&self, id: &str, _properties: &str) -> Result<bool, ClientError> {
        self.creates.lock().unwrap().push(id.to_string());
        let rejected = self
            .fail_create_suffix
            .as_deref()
            .is_some_and(|suffix| id.ends_with(suffix));
        if self.fail_create || rejected {
            return Err(ClientError::Connection("connection refused".to_string()));
        }
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_open.fetch_max(open, Ordering::SeqCst);
        Ok(true)
    }

    async fn subscribe_updates(
        &self,
        id: &str,
        _deadline: Duration,
    ) -> Result<UpdateStream, ClientError> {
        self.subscribes.lock().unwrap().push(id.to_string());
        if self.fail_subscribe {
            return Err(ClientError::Rpc {
                code: "Internal".to_string(),
                message: "subscription rejected".to_string(),
            });
        }

        let result = MatchResult {
            id: id.to_string(),
            assignment: Some("10.0.0.1:7777".to_string()),
        };
        Ok(match self.stream {
            StreamBehavior::Match => stream::iter(vec![Ok(result.clone()), Ok(result)]).boxed(),
            StreamBehavior::Eof => stream::empty().boxed(),
            StreamBehavior::Hang => stream::pending().boxed(),
            StreamBehavior::Error => {
                stream::iter(vec![Err(ClientError::Stream("reset".to_string()))]).boxed()
            }
        })
    }

    async fn delete_session(&self, id: &str) -> Result<bool, ClientError> {
        self.deletes.lock().unwrap().push(id.to_string());
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// Reference configuration with a recognizable id prefix
pub fn test_config() -> Config {
    Config {
        player_id_prefix: "loadtest-".to_string(),
        ..Config::default()
    }
}

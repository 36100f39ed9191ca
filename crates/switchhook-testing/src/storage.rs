//! In-memory persistence double.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use switchhook_core::{CoreError, EnvironmentData, EnvironmentRepository, Result};

/// How the next saves should misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Return a database error.
    Error,
    /// Panic inside `save`.
    Panic,
    /// Sleep before saving, to trip request deadlines.
    Delay(Duration),
}

#[derive(Debug)]
struct State {
    saved: Vec<EnvironmentData>,
    save_attempts: usize,
    failure: Option<FailureMode>,
    healthy: bool,
}

/// Recording [`EnvironmentRepository`] with failure injection.
///
/// Clones share state, so a test can keep one handle and give another to
/// the router.
#[derive(Debug, Clone)]
pub struct MockEnvironmentRepository {
    state: Arc<Mutex<State>>,
}

impl MockEnvironmentRepository {
    /// Creates a healthy, empty repository.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                saved: Vec::new(),
                save_attempts: 0,
                failure: None,
                healthy: true,
            })),
        }
    }

    /// Makes subsequent saves misbehave; `None` restores normal behaviour.
    pub fn set_failure(&self, failure: Option<FailureMode>) {
        self.lock().failure = failure;
    }

    /// Sets the result of `health_check`.
    pub fn set_healthy(&self, healthy: bool) {
        self.lock().healthy = healthy;
    }

    /// Samples stored so far, in save order.
    pub fn saved(&self) -> Vec<EnvironmentData> {
        self.lock().saved.clone()
    }

    /// Number of `save` calls, successful or not.
    pub fn save_attempts(&self) -> usize {
        self.lock().save_attempts
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MockEnvironmentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnvironmentRepository for MockEnvironmentRepository {
    async fn save(&self, data: &EnvironmentData) -> Result<()> {
        let failure = {
            let mut state = self.lock();
            state.save_attempts += 1;
            state.failure
        };

        match failure {
            Some(FailureMode::Error) => {
                return Err(CoreError::Database("injected failure: connection refused".to_string()))
            },
            Some(FailureMode::Panic) => panic!("injected repository panic"),
            Some(FailureMode::Delay(delay)) => tokio::time::sleep(delay).await,
            None => {},
        }

        self.lock().saved.push(data.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        if self.lock().healthy {
            Ok(())
        } else {
            Err(CoreError::Database("injected health failure".to_string()))
        }
    }
}

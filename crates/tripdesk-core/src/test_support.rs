//! In-memory transport for exercising the sync layer without a backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::cache::ResourceKey;
use crate::transport::{FetchError, Transport};

/// Canned responses per key, a call log, and an optional gate that holds
/// fetches in flight until the test releases them.
#[derive(Default)]
pub(crate) struct FakeTransport {
    responses: Mutex<HashMap<ResourceKey, Result<Value, u16>>>,
    calls: Mutex<Vec<(ResourceKey, Option<String>)>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, key: &str, value: Value) {
        self.responses.lock().unwrap().insert(key.into(), Ok(value));
    }

    pub(crate) fn fail(&self, key: &str, status: u16) {
        self.responses.lock().unwrap().insert(key.into(), Err(status));
    }

    /// Make every subsequent fetch wait for a permit on the returned semaphore.
    pub(crate) fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_for(&self, key: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.as_str() == key)
            .count()
    }

    pub(crate) fn tokens(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, key: &ResourceKey, token: Option<&str>) -> Result<Value, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((key.clone(), token.map(str::to_string)));

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        // Read the response after the gate so tests can change it mid-flight
        match self.responses.lock().unwrap().get(key) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(status)) => Err(FetchError::from_status(
                StatusCode::from_u16(*status).expect("valid status"),
                "",
            )),
            None => Err(FetchError::NotFound(key.to_string())),
        }
    }
}

/// Yield to spawned tasks until the transport has seen `n` calls.
pub(crate) async fn wait_for_calls(transport: &FakeTransport, n: usize) {
    for _ in 0..1_000 {
        if transport.call_count() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("transport saw {} calls, expected {}", transport.call_count(), n);
}

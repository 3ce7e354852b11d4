//! In-memory catalog with fault injection.
//!
//! Only compiled for this crate's tests and under the `test-support`
//! feature, for suites that need a deterministic stand-in for the service.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::model::{Item, ItemPatch, NewItem};
use crate::remote::{ItemBackend, ItemFilter, RemoteError};

/// How the simulated service behaves on the next calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    Healthy,
    /// Every call fails with a connection error.
    Offline,
    /// Every call hangs until the caller gives up.
    Timeout,
    /// Every call is answered with this HTTP status.
    Reject { status: u16, message: String },
}

/// Per-operation call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub claim: usize,
    pub update: usize,
    pub delete: usize,
}

#[derive(Debug, Clone, Copy)]
enum Call {
    List,
    Create,
    Claim,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct State {
    items: Vec<Item>,
    fault: Fault,
    latencies: VecDeque<Duration>,
    calls: CallCounts,
    next_id: u64,
}

enum Gate {
    Proceed(Duration),
    Fail(RemoteError),
    Hang,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_items(items: Vec<Item>) -> Self {
        let backend = Self::default();
        backend.lock().items = items;
        backend
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_fault(&self, fault: Fault) {
        self.lock().fault = fault;
    }

    #[must_use]
    pub fn fault(&self) -> Fault {
        self.lock().fault.clone()
    }

    /// Queue response delays; each call consumes one, in order.
    pub fn script_latency(&self, delays: impl IntoIterator<Item = Duration>) {
        self.lock().latencies.extend(delays);
    }

    /// Replace the catalog contents.
    pub fn set_items(&self, items: Vec<Item>) {
        self.lock().items = items;
    }

    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        self.lock().items.clone()
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    fn gate(&self, call: Call) -> Gate {
        let mut state = self.lock();
        let counter = match call {
            Call::List => &mut state.calls.list,
            Call::Create => &mut state.calls.create,
            Call::Claim => &mut state.calls.claim,
            Call::Update => &mut state.calls.update,
            Call::Delete => &mut state.calls.delete,
        };
        *counter += 1;
        let delay = state.latencies.pop_front().unwrap_or_default();
        match &state.fault {
            Fault::Healthy => Gate::Proceed(delay),
            Fault::Offline => Gate::Fail(RemoteError::Connect(
                "connection refused (simulated)".to_string(),
            )),
            Fault::Timeout => Gate::Hang,
            Fault::Reject { status, message } => Gate::Fail(RemoteError::Status {
                status: *status,
                message: message.clone(),
            }),
        }
    }

    async fn enter(&self, call: Call) -> Result<(), RemoteError> {
        match self.gate(call) {
            Gate::Proceed(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(())
            }
            Gate::Fail(err) => Err(err),
            Gate::Hang => std::future::pending().await,
        }
    }

    fn with_item<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Vec<Item>, usize) -> T,
    ) -> Result<T, RemoteError> {
        let mut state = self.lock();
        let index = state
            .items
            .iter()
            .position(|item| item.identity() == Some(id))
            .ok_or_else(|| RemoteError::Status {
                status: 404,
                message: format!("item {id} not found"),
            })?;
        Ok(f(&mut state.items, index))
    }
}

#[async_trait]
impl ItemBackend for MemoryBackend {
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, RemoteError> {
        // Snapshot at request time; the delay models the response in flight.
        let snapshot: Vec<Item> = self
            .lock()
            .items
            .iter()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        self.enter(Call::List).await?;
        Ok(snapshot)
    }

    async fn create_item(&self, draft: &NewItem) -> Result<Option<Item>, RemoteError> {
        self.enter(Call::Create).await?;
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("srv-{}", state.next_id);
        let item = draft.clone().into_item(id, Utc::now());
        state.items.push(item.clone());
        Ok(Some(item))
    }

    async fn claim_item(&self, id: &str) -> Result<(), RemoteError> {
        self.enter(Call::Claim).await?;
        self.with_item(id, |items, index| items[index].mark_claimed())
    }

    async fn update_item(&self, id: &str, patch: &ItemPatch) -> Result<(), RemoteError> {
        self.enter(Call::Update).await?;
        self.with_item(id, |items, index| patch.apply_to(&mut items[index]))
    }

    async fn delete_item(&self, id: &str) -> Result<(), RemoteError> {
        self.enter(Call::Delete).await?;
        self.with_item(id, |items, index| {
            items.remove(index);
        })
    }
}

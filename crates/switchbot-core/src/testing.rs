//! Scriptable in-memory transport for tests
//!
//! `FakeBotTransport` plays back a per-address behavior and counts every call
//! so tests can check connect/disconnect pairing and attempt ordering.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::command::Payload;
use crate::errors::{ConnectError, ConnectResult, TransportError, WriteError, WriteResult};
use crate::transport::{BotTransport, DeviceAddress};

/// How the fake device at one address responds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    /// Connect and write both succeed
    AlwaysSucceed,
    /// Every connect is refused
    FailConnect,
    /// Connect succeeds, every write fails
    FailWrite,
    /// Connect never resolves
    HangConnect,
    /// The link comes up but connect never returns it
    HangAfterConnect,
    /// Connect succeeds, write never resolves
    HangWrite,
    /// The first `n` connects are refused, later ones succeed
    SucceedAfter(u32),
    /// Connect and write succeed, disconnect reports an error
    FailDisconnect,
}

/// Per-address call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub connect: u32,
    pub connected: u32,
    pub write: u32,
    pub disconnect: u32,
}

/// Connection handle issued by [`FakeBotTransport`]
#[derive(Debug)]
pub struct FakeConnection {
    id: u64,
    address: DeviceAddress,
}

impl FakeConnection {
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }
}

#[derive(Debug, Default)]
struct FakeState {
    counts: HashMap<DeviceAddress, CallCounts>,
    open: HashSet<u64>,
    next_id: u64,
    max_open: usize,
    writes: Vec<(DeviceAddress, Uuid, Vec<u8>)>,
    connect_order: Vec<DeviceAddress>,
    abandoned: u32,
}

/// Link opened inside a connect call that has not returned yet.
///
/// Dropping the connect future releases it, the way the BLE transport does.
struct PendingLink<'a> {
    state: &'a Mutex<FakeState>,
    id: u64,
}

impl Drop for PendingLink<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.open.remove(&self.id);
        state.abandoned += 1;
    }
}

/// In-memory [`BotTransport`] with scripted per-address behavior
///
/// Addresses without a behavior are reported as not found.
#[derive(Debug, Default)]
pub struct FakeBotTransport {
    behaviors: HashMap<DeviceAddress, FakeBehavior>,
    state: Mutex<FakeState>,
}

impl FakeBotTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behavior of the device at `address`
    pub fn with_behavior(mut self, address: impl Into<DeviceAddress>, behavior: FakeBehavior) -> Self {
        self.behaviors.insert(address.into(), behavior);
        self
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        // A panicking test thread must not hide the counters from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn counts(&self, address: &DeviceAddress) -> CallCounts {
        self.state().counts.get(address).copied().unwrap_or_default()
    }

    pub fn connect_calls(&self, address: &DeviceAddress) -> u32 {
        self.counts(address).connect
    }

    pub fn successful_connects(&self, address: &DeviceAddress) -> u32 {
        self.counts(address).connected
    }

    pub fn write_calls(&self, address: &DeviceAddress) -> u32 {
        self.counts(address).write
    }

    pub fn disconnect_calls(&self, address: &DeviceAddress) -> u32 {
        self.counts(address).disconnect
    }

    pub fn total_connect_calls(&self) -> u32 {
        self.state().counts.values().map(|c| c.connect).sum()
    }

    pub fn total_write_calls(&self) -> u32 {
        self.state().counts.values().map(|c| c.write).sum()
    }

    pub fn total_disconnect_calls(&self) -> u32 {
        self.state().counts.values().map(|c| c.disconnect).sum()
    }

    /// Connections opened and not yet released
    pub fn open_connections(&self) -> usize {
        self.state().open.len()
    }

    /// Links released because their connect call was dropped
    pub fn abandoned_links(&self) -> u32 {
        self.state().abandoned
    }

    /// Highest number of simultaneously open connections seen
    pub fn max_concurrent_connections(&self) -> usize {
        self.state().max_open
    }

    /// Every completed write as (address, characteristic, bytes)
    pub fn writes(&self) -> Vec<(DeviceAddress, Uuid, Vec<u8>)> {
        self.state().writes.clone()
    }

    /// Addresses in the order connects were attempted
    pub fn connect_order(&self) -> Vec<DeviceAddress> {
        self.state().connect_order.clone()
    }

    fn behavior(&self, address: &DeviceAddress) -> Option<FakeBehavior> {
        self.behaviors.get(address).copied()
    }
}

#[async_trait]
impl BotTransport for FakeBotTransport {
    type Connection = FakeConnection;

    async fn connect(&self, address: &DeviceAddress) -> ConnectResult<FakeConnection> {
        let attempt = {
            let mut state = self.state();
            state.connect_order.push(address.clone());
            let counts = state.counts.entry(address.clone()).or_default();
            counts.connect += 1;
            counts.connect
        };

        let refused = || ConnectError::Refused {
            address: address.to_string(),
            reason: "scripted failure".to_string(),
        };

        match self.behavior(address) {
            None => {
                return Err(ConnectError::DeviceNotFound {
                    address: address.to_string(),
                })
            }
            Some(FakeBehavior::FailConnect) => return Err(refused()),
            Some(FakeBehavior::SucceedAfter(n)) if attempt <= n => return Err(refused()),
            Some(FakeBehavior::HangConnect) => std::future::pending::<()>().await,
            Some(_) => {}
        }

        let id = {
            let mut state = self.state();
            let id = state.next_id;
            state.next_id += 1;
            state.open.insert(id);
            state.max_open = state.max_open.max(state.open.len());
            state.counts.entry(address.clone()).or_default().connected += 1;
            id
        };

        if self.behavior(address) == Some(FakeBehavior::HangAfterConnect) {
            let _link = PendingLink {
                state: &self.state,
                id,
            };
            std::future::pending::<()>().await;
        }

        Ok(FakeConnection {
            id,
            address: address.clone(),
        })
    }

    async fn write_characteristic(
        &self,
        connection: &mut FakeConnection,
        characteristic: Uuid,
        payload: &Payload,
    ) -> WriteResult {
        self.state()
            .counts
            .entry(connection.address.clone())
            .or_default()
            .write += 1;

        match self.behavior(&connection.address) {
            Some(FakeBehavior::FailWrite) => {
                Err(WriteError::Failed("scripted write failure".to_string()))
            }
            Some(FakeBehavior::HangWrite) => std::future::pending().await,
            _ => {
                self.state().writes.push((
                    connection.address.clone(),
                    characteristic,
                    payload.as_bytes().to_vec(),
                ));
                Ok(())
            }
        }
    }

    async fn disconnect(&self, connection: FakeConnection) -> Result<(), TransportError> {
        {
            let mut state = self.state();
            state.open.remove(&connection.id);
            state
                .counts
                .entry(connection.address.clone())
                .or_default()
                .disconnect += 1;
        }

        if self.behavior(&connection.address) == Some(FakeBehavior::FailDisconnect) {
            return Err(TransportError::DisconnectFailed {
                address: connection.address.to_string(),
                reason: "scripted disconnect failure".to_string(),
            });
        }
        Ok(())
    }
}

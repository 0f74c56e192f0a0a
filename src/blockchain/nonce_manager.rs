// src/blockchain/nonce_manager.rs

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use ethers_core::types::{Address, U256};
use tokio::sync::Mutex;
use tracing::warn;

/// One account on one chain.
type NonceKey = (u64, Address);

/// Hands out sequential nonces per signer and chain so back-to-back
/// executions from the headless signer don't collide in the mempool.
///
/// The node is asked once per key; later reservations count up locally
/// until [`NonceManager::release`] drops the cached value.
#[derive(Debug, Clone, Default)]
pub struct NonceManager {
    next: Arc<DashMap<NonceKey, Arc<Mutex<Option<U256>>>>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next nonce for `address` on `chain_id`. `fetch_pending`
    /// runs only when nothing is cached and must return the node's pending
    /// transaction count. Concurrent callers for the same key are serialized.
    ///
    /// The returned [`NonceReservation`] must be committed once the
    /// transaction is broadcast; otherwise the cached nonce is released.
    pub async fn reserve<F, E>(
        &self,
        chain_id: u64,
        address: Address,
        fetch_pending: F,
    ) -> Result<NonceReservation, E>
    where
        F: Future<Output = Result<U256, E>>,
    {
        let slot = self
            .next
            .entry((chain_id, address))
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        let mut next = slot.lock().await;

        let nonce = match *next {
            Some(cached) => cached,
            None => fetch_pending.await?,
        };
        *next = Some(nonce + U256::one());
        Ok(NonceReservation {
            manager: self.clone(),
            key: (chain_id, address),
            nonce,
            settled: false,
        })
    }

    /// Drops the cached nonce so the next reservation asks the node again.
    pub async fn release(&self, chain_id: u64, address: Address) {
        let slot = self.next.get(&(chain_id, address)).map(|entry| entry.clone());
        if let Some(slot) = slot {
            *slot.lock().await = None;
        }
    }
}

/// A nonce handed out by [`NonceManager::reserve`].
///
/// Dropping it unsettled (an early return or a cancelled future) releases
/// the cached nonce in the background, so a nonce that never reached the
/// mempool is not skipped.
#[derive(Debug)]
pub struct NonceReservation {
    manager: NonceManager,
    key: NonceKey,
    nonce: U256,
    settled: bool,
}

impl NonceReservation {
    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    /// The transaction reached the node; keep counting from here.
    pub fn commit(mut self) {
        self.settled = true;
    }

    /// The transaction was never broadcast.
    pub async fn release(mut self) {
        self.settled = true;
        let (chain_id, address) = self.key;
        self.manager.release(chain_id, address).await;
    }
}

impl Drop for NonceReservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let manager = self.manager.clone();
        let (chain_id, address) = self.key;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { manager.release(chain_id, address).await });
            }
            Err(_) => warn!(chain_id, ?address, "Nonce reservation dropped outside a runtime"),
        }
    }
}

#![allow(dead_code)]

use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use token_scanner::{BlockRange, Ledger, RawLog, RpcError};
use tokio_util::sync::CancellationToken;

/// In-memory ledger with request counters and injectable failures.
#[derive(Default)]
pub struct MockLedger {
    height: u64,
    logs: Vec<RawLog>,
    code: HashMap<Address, Bytes>,
    calls: HashMap<(Address, [u8; 4]), Bytes>,
    broken_code: HashSet<Address>,
    /// Remaining failures keyed by chunk start block.
    failures: Mutex<HashMap<u64, usize>>,
    delay: Option<Duration>,
    cancel_on_logs: Option<CancellationToken>,
    cancel_on_height: Option<CancellationToken>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub height_requests: AtomicUsize,
    pub log_requests: AtomicUsize,
    pub code_requests: AtomicUsize,
    pub call_requests: AtomicUsize,
}

impl MockLedger {
    pub fn new(height: u64) -> Self {
        MockLedger {
            height,
            ..Default::default()
        }
    }

    pub fn with_transfer(mut self, block: u64, tx: u8, token: Address, log_index: u64) -> Self {
        self.logs.push(RawLog {
            address: token,
            block_number: Some(block),
            transaction_hash: Some(B256::repeat_byte(tx)),
            log_index: Some(log_index),
        });
        self
    }

    pub fn with_code(mut self, address: Address, code: &str) -> Self {
        let bytes = alloy_primitives::hex::decode(code).expect("valid hex");
        self.code.insert(address, Bytes::from(bytes));
        self
    }

    pub fn with_call(mut self, address: Address, selector: [u8; 4], output: Vec<u8>) -> Self {
        self.calls.insert((address, selector), Bytes::from(output));
        self
    }

    pub fn with_broken_code(mut self, address: Address) -> Self {
        self.broken_code.insert(address);
        self
    }

    /// Makes the chunk starting at `from` fail `times` times.
    pub fn failing_chunk(self, from: u64, times: usize) -> Self {
        self.failures.lock().unwrap().insert(from, times);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cancels `token` as soon as the first log query arrives.
    pub fn cancel_on_first_logs(mut self, token: CancellationToken) -> Self {
        self.cancel_on_logs = Some(token);
        self
    }

    /// Cancels `token` while the chain height is being resolved.
    pub fn cancel_on_height(mut self, token: CancellationToken) -> Self {
        self.cancel_on_height = Some(token);
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn take_failure(&self, from: u64) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&from) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn current_height(&self) -> Result<u64, RpcError> {
        self.height_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_height {
            token.cancel();
        }
        Ok(self.height)
    }

    async fn get_logs(&self, range: BlockRange, topics: &[B256]) -> Result<Vec<RawLog>, RpcError> {
        assert_eq!(topics, token_scanner::events::transfer_topics().as_slice());
        self.log_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_logs {
            token.cancel();
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.take_failure(range.from()) {
            return Err(RpcError::Transport("429 Too Many Requests".to_string()));
        }

        Ok(self
            .logs
            .iter()
            .filter(|log| log.block_number.is_some_and(|b| range.contains(b)))
            .cloned()
            .collect())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        self.code_requests.fetch_add(1, Ordering::SeqCst);
        if self.broken_code.contains(&address) {
            return Err(RpcError::Timeout(Duration::from_secs(120)));
        }
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }

    async fn call(&self, address: Address, calldata: Bytes) -> Result<Bytes, RpcError> {
        self.call_requests.fetch_add(1, Ordering::SeqCst);
        let selector: [u8; 4] = calldata[..4].try_into().unwrap();
        self.calls
            .get(&(address, selector))
            .cloned()
            .ok_or_else(|| RpcError::Transport("execution reverted".to_string()))
    }
}

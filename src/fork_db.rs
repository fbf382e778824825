//! Lazily hydrated fork state for in-process execution.
//!
//! `ForkDB` implements revm's database traits by fetching accounts, code and
//! storage from a remote JSON-RPC node at a pinned block. Wrap it in a
//! `CacheDB` so local writes (impersonation funding, storage overwrites,
//! deployments) layer on top of the remote state.

use crate::utils::rpc::{run_with_retry, HttpProvider};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::Provider;
use dashmap::DashMap;
use revm::{
    primitives::{AccountInfo, Bytecode, Bytes},
    Database, DatabaseRef,
};
use std::future::Future;
use std::sync::{Arc, OnceLock};

const MAX_STORAGE_CACHE_ENTRIES: usize = 200_000;
const MAX_ACCOUNT_INFO_CACHE_ENTRIES: usize = 100_000;
pub(crate) const DEFAULT_BRIDGE_TIMEOUT_MS: u64 = 30_000;
const BRIDGE_WORKER_QUEUE_CAPACITY: usize = 256;
const HYDRATION_RETRIES: usize = 5;

type BridgeJob = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkHead {
    pub number: u64,
    pub timestamp: u64,
}

#[derive(Clone)]
pub struct ForkDB {
    provider: Arc<HttpProvider>,
    handle: tokio::runtime::Handle,
    runtime_guard: Option<Arc<tokio::runtime::Runtime>>,
    head: ForkHead,
    rpc_url: Arc<String>,
    block_hash_cache: Arc<DashMap<u64, B256>>,
    code_by_hash_cache: Arc<DashMap<B256, Bytecode>>,
    storage_cache: Arc<DashMap<(Address, U256), U256>>,
    account_info_cache: Arc<DashMap<Address, Option<AccountInfo>>>,
}

impl ForkDB {
    fn bridge_worker_sender() -> &'static std::sync::mpsc::SyncSender<BridgeJob> {
        static TX: OnceLock<std::sync::mpsc::SyncSender<BridgeJob>> = OnceLock::new();
        TX.get_or_init(|| {
            let (tx, rx) = std::sync::mpsc::sync_channel::<BridgeJob>(BRIDGE_WORKER_QUEUE_CAPACITY);
            let _ = std::thread::Builder::new()
                .name("forkdb-bridge-worker".to_string())
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                });
            tx
        })
    }

    /// Fork `url` at `block_number`, or at the node's current head when `None`.
    pub fn new(url: &str, block_number: Option<u64>) -> anyhow::Result<Self> {
        let provider = crate::utils::rpc::build_http_provider(url)?;

        let (handle, runtime_guard) = match tokio::runtime::Handle::try_current() {
            Ok(handle) => (handle, None),
            Err(_) => {
                // Synchronous call sites (tests/tools) have no ambient runtime.
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .map_err(|err| {
                        anyhow::anyhow!("failed to bootstrap tokio runtime for ForkDB: {err}")
                    })?;
                let runtime = Arc::new(runtime);
                (runtime.handle().clone(), Some(runtime))
            }
        };

        let mut db = Self {
            provider,
            handle,
            runtime_guard,
            head: ForkHead {
                number: 0,
                timestamp: 0,
            },
            rpc_url: Arc::new(url.trim().to_string()),
            block_hash_cache: Arc::new(DashMap::new()),
            code_by_hash_cache: Arc::new(DashMap::new()),
            storage_cache: Arc::new(DashMap::new()),
            account_info_cache: Arc::new(DashMap::new()),
        };

        let provider = db.provider.clone();
        let tag = block_number
            .map(|b| format!("0x{b:x}"))
            .unwrap_or_else(|| "latest".to_string());
        db.head = db.block_on_bridge(async move { Self::fetch_head(provider, tag).await })?;
        tracing::info!(
            "[FORKDB] Forked {} at block {} (timestamp {})",
            db.rpc_url,
            db.head.number,
            db.head.timestamp
        );
        Ok(db)
    }

    pub fn head(&self) -> ForkHead {
        self.head
    }

    fn block_tag(&self) -> String {
        format!("0x{:x}", self.head.number)
    }

    fn bridge_timeout_ms() -> u64 {
        std::env::var("FORKDB_BRIDGE_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|v| *v >= 200)
            .unwrap_or(DEFAULT_BRIDGE_TIMEOUT_MS)
    }

    fn trim_cache<K, V>(cache: &DashMap<K, V>, max_entries: usize)
    where
        K: Eq + std::hash::Hash + Clone,
    {
        let len = cache.len();
        if len <= max_entries {
            return;
        }
        let excess = len.saturating_sub(max_entries);
        let keys: Vec<K> = cache
            .iter()
            .take(excess)
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            cache.remove(&key);
        }
    }

    fn parse_quantity(raw: &str) -> anyhow::Result<U256> {
        let trimmed = raw.trim().trim_start_matches("0x");
        if trimmed.is_empty() {
            return Ok(U256::ZERO);
        }
        U256::from_str_radix(trimmed, 16).map_err(anyhow::Error::from)
    }

    async fn fetch_head(provider: Arc<HttpProvider>, tag: String) -> anyhow::Result<ForkHead> {
        run_with_retry(
            &provider,
            HYDRATION_RETRIES,
            "eth_getBlockByNumber(fork head)",
            move |provider| {
                let tag = tag.clone();
                async move {
                    let raw: serde_json::Value = provider
                        .raw_request(
                            std::borrow::Cow::Borrowed("eth_getBlockByNumber"),
                            serde_json::json!([tag, false]),
                        )
                        .await
                        .map_err(|e| anyhow::anyhow!("{e}"))?;
                    Self::parse_head(&raw)
                }
            },
        )
        .await
    }

    fn parse_head(raw: &serde_json::Value) -> anyhow::Result<ForkHead> {
        let field = |name: &str| -> anyhow::Result<u64> {
            let text = raw
                .get(name)
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("eth_getBlockByNumber missing {name} field"))?;
            let value = Self::parse_quantity(text)?;
            u64::try_from(value).map_err(|_| anyhow::anyhow!("{name} does not fit in u64"))
        };
        Ok(ForkHead {
            number: field("number")?,
            timestamp: field("timestamp")?,
        })
    }

    async fn fetch_block_hash_at(
        provider: Arc<HttpProvider>,
        number: u64,
    ) -> anyhow::Result<B256> {
        run_with_retry(
            &provider,
            3,
            "eth_getBlockByNumber(block hash)",
            move |provider| async move {
                let raw: serde_json::Value = provider
                    .raw_request(
                        std::borrow::Cow::Borrowed("eth_getBlockByNumber"),
                        serde_json::json!([format!("0x{number:x}"), false]),
                    )
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                let hash = raw
                    .get("hash")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow::anyhow!("eth_getBlockByNumber missing hash field"))?;
                let bytes =
                    hex::decode(hash.trim_start_matches("0x")).map_err(anyhow::Error::from)?;
                if bytes.len() != 32 {
                    anyhow::bail!("eth_getBlockByNumber hash wrong length: {}", bytes.len());
                }
                Ok(B256::from_slice(&bytes))
            },
        )
        .await
    }

    fn block_on_bridge<T, Fut>(&self, fut: Fut) -> anyhow::Result<T>
    where
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        // Attached to an ambient multithread runtime: block_in_place lets the
        // synchronous DB trait surface re-enter async legally.
        if let Ok(current) = tokio::runtime::Handle::try_current() {
            if self.runtime_guard.is_none()
                && current.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread
            {
                return tokio::task::block_in_place(|| {
                    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        self.handle.block_on(fut)
                    })) {
                        Ok(result) => result,
                        Err(_) => Err(anyhow::anyhow!(
                            "fork_db bridge block_on panicked (runtime likely shutting down)"
                        )),
                    }
                });
            }

            // Current-thread runtime cannot block_in_place and a direct block_on panics.
            let (tx, rx) = std::sync::mpsc::sync_channel(1);
            let job: BridgeJob = Box::new(move || {
                let out = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|err| {
                        anyhow::anyhow!(
                            "fork_db bridge helper failed to bootstrap local runtime: {}",
                            err
                        )
                    })
                    .and_then(|rt| rt.block_on(fut));
                let _ = tx.send(out);
            });
            match Self::bridge_worker_sender().try_send(job) {
                Ok(()) => {}
                Err(std::sync::mpsc::TrySendError::Full(_)) => {
                    return Err(anyhow::anyhow!(
                        "fork_db bridge queue full; dropping sync bridge call"
                    ));
                }
                Err(std::sync::mpsc::TrySendError::Disconnected(_)) => {
                    return Err(anyhow::anyhow!("fork_db bridge worker unavailable"));
                }
            }
            return match rx
                .recv_timeout(std::time::Duration::from_millis(Self::bridge_timeout_ms()))
            {
                Ok(result) => result,
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => Err(anyhow::anyhow!(
                    "fork_db bridge helper thread timed out after {}ms",
                    Self::bridge_timeout_ms()
                )),
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => Err(anyhow::anyhow!(
                    "fork_db bridge helper thread disconnected"
                )),
            };
        }

        self.handle.block_on(fut)
    }

    async fn raw_quantity(
        provider: Arc<HttpProvider>,
        method: &'static str,
        params: serde_json::Value,
    ) -> anyhow::Result<U256> {
        run_with_retry(&provider, HYDRATION_RETRIES, method, move |provider| {
            let params = params.clone();
            async move {
                let raw: String = provider
                    .raw_request(std::borrow::Cow::Borrowed(method), params)
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                Self::parse_quantity(&raw)
            }
        })
        .await
    }
}

impl DatabaseRef for ForkDB {
    type Error = anyhow::Error;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        if let Some(hit) = self.account_info_cache.get(&address) {
            return Ok(hit.value().clone());
        }

        let provider = self.provider.clone();
        let tag = self.block_tag();
        let code_by_hash_cache = self.code_by_hash_cache.clone();

        let account = self.block_on_bridge(async move {
            let balance_fut = Self::raw_quantity(
                provider.clone(),
                "eth_getBalance",
                serde_json::json!([address, tag.clone()]),
            );
            let nonce_fut = Self::raw_quantity(
                provider.clone(),
                "eth_getTransactionCount",
                serde_json::json!([address, tag.clone()]),
            );
            let code_provider = provider.clone();
            let code_tag = tag.clone();
            let code_fut = run_with_retry(
                &code_provider,
                HYDRATION_RETRIES,
                "eth_getCode",
                move |provider| {
                    let tag = code_tag.clone();
                    async move {
                        let raw: String = provider
                            .raw_request(
                                std::borrow::Cow::Borrowed("eth_getCode"),
                                serde_json::json!([address, tag]),
                            )
                            .await
                            .map_err(|e| anyhow::anyhow!("{e}"))?;
                        hex::decode(raw.trim_start_matches("0x")).map_err(anyhow::Error::from)
                    }
                },
            );

            let (balance, nonce, code) = tokio::try_join!(balance_fut, nonce_fut, code_fut)?;
            let nonce = u64::try_from(nonce).map_err(|_| anyhow::anyhow!("nonce overflow"))?;

            if nonce == 0 && balance.is_zero() && code.is_empty() {
                return Ok(None);
            }

            let bytecode = Bytecode::new_raw(Bytes::from(code));
            let code_hash = bytecode.hash_slow();
            code_by_hash_cache.insert(code_hash, bytecode.clone());
            Ok(Some(AccountInfo::new(balance, nonce, code_hash, bytecode)))
        })?;

        self.account_info_cache.insert(address, account.clone());
        Self::trim_cache(&self.account_info_cache, MAX_ACCOUNT_INFO_CACHE_ENTRIES);
        Ok(account)
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.code_by_hash_cache
            .get(&code_hash)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("missing bytecode for code hash {}", code_hash))
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        if let Some(hit) = self.storage_cache.get(&(address, index)) {
            return Ok(*hit);
        }
        let provider = self.provider.clone();
        let tag = self.block_tag();
        let value = self.block_on_bridge(async move {
            Self::raw_quantity(
                provider,
                "eth_getStorageAt",
                serde_json::json!([address, format!("0x{index:x}"), tag]),
            )
            .await
        })?;
        self.storage_cache.insert((address, index), value);
        Self::trim_cache(&self.storage_cache, MAX_STORAGE_CACHE_ENTRIES);
        Ok(value)
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        // Local blocks start at head + 1, so the pinned head is the newest
        // block with a remote hash.
        let reference_head = self.head.number;
        if number > reference_head || reference_head.saturating_sub(number) > 256 {
            return Ok(B256::ZERO);
        }
        if let Some(hit) = self.block_hash_cache.get(&number) {
            return Ok(*hit);
        }
        let provider = self.provider.clone();
        let hash =
            self.block_on_bridge(async move { Self::fetch_block_hash_at(provider, number).await })?;
        self.block_hash_cache.insert(number, hash);
        Ok(hash)
    }
}

impl Database for ForkDB {
    type Error = anyhow::Error;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        self.basic_ref(address)
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.code_by_hash_ref(code_hash)
    }

    fn storage(&mut self, address: Address, index: U256) -> Result<U256, Self::Error> {
        self.storage_ref(address, index)
    }

    fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error> {
        self.block_hash_ref(number)
    }
}

#[cfg(test)]
mod tests {
    use super::{ForkDB, ForkHead};
    use alloy::primitives::U256;
    use dashmap::DashMap;

    #[test]
    fn test_parse_head_reads_number_and_timestamp() {
        let raw = serde_json::json!({
            "number": "0x6a1b2c",
            "timestamp": "0x616e1e30",
            "hash": "0x00"
        });
        let head = ForkDB::parse_head(&raw).expect("head");
        assert_eq!(
            head,
            ForkHead {
                number: 0x6a1b2c,
                timestamp: 0x616e1e30
            }
        );
    }

    #[test]
    fn test_parse_head_rejects_missing_fields() {
        let raw = serde_json::json!({ "number": "0x1" });
        assert!(ForkDB::parse_head(&raw).is_err());
    }

    #[test]
    fn test_parse_quantity_accepts_bare_prefix() {
        assert_eq!(ForkDB::parse_quantity("0x").expect("zero"), U256::ZERO);
        assert_eq!(
            ForkDB::parse_quantity("0x0de0b6b3a7640000").expect("wad"),
            U256::from(1_000_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_trim_cache_bounds_entries() {
        let cache: DashMap<u64, u64> = DashMap::new();
        for i in 0..10 {
            cache.insert(i, i);
        }
        ForkDB::trim_cache(&cache, 4);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_new_fails_closed_without_reachable_node() {
        // Port 9 (discard) is not a JSON-RPC endpoint; construction must error, not hang.
        let result = ForkDB::new("http://127.0.0.1:9", Some(1));
        assert!(result.is_err());
    }
}

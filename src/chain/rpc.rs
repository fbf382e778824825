use super::{ChainControl, Signer, TxOutcome};
use crate::error::ChainError;
use crate::utils::hex::{clean_hex, to_quantity, to_word};
use crate::utils::rpc::{build_http_provider, is_retryable_rpc_error, run_with_retry, HttpProvider};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};

const CONTROL_RETRIES: usize = 3;
const READ_RETRIES: usize = 3;
// eth_sendTransaction is not idempotent; never resend.
const SEND_RETRIES: usize = 1;
const RECEIPT_POLL_MS: u64 = 200;
const RECEIPT_TIMEOUT_MS: u64 = 60_000;

/// Which cheat-code namespace the node speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeFlavor {
    #[default]
    Hardhat,
    Anvil,
}

impl NodeFlavor {
    fn prefix(self) -> &'static str {
        match self {
            NodeFlavor::Hardhat => "hardhat",
            NodeFlavor::Anvil => "anvil",
        }
    }

    /// `impersonateAccount` -> `hardhat_impersonateAccount` / `anvil_impersonateAccount`.
    pub fn method(self, name: &str) -> String {
        format!("{}_{}", self.prefix(), name)
    }
}

impl FromStr for NodeFlavor {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "hardhat" => Ok(NodeFlavor::Hardhat),
            "anvil" | "foundry" => Ok(NodeFlavor::Anvil),
            other => Err(format!("unknown node flavor `{other}` (expected hardhat|anvil)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReceiptSummary {
    success: bool,
    gas_used: u64,
    contract_address: Option<Address>,
}

/// A Hardhat or Anvil fork node reached over JSON-RPC.
pub struct RpcChain {
    provider: Arc<HttpProvider>,
    flavor: NodeFlavor,
    impersonated: HashSet<Address>,
}

impl RpcChain {
    pub fn connect(rpc_url: &str, flavor: NodeFlavor) -> Result<Self, ChainError> {
        let provider =
            build_http_provider(rpc_url).map_err(|err| ChainError::Transport(err.to_string()))?;
        Ok(Self::new(provider, flavor))
    }

    pub fn new(provider: Arc<HttpProvider>, flavor: NodeFlavor) -> Self {
        Self {
            provider,
            flavor,
            impersonated: HashSet::new(),
        }
    }

    pub fn flavor(&self) -> NodeFlavor {
        self.flavor
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let raw = self.request("eth_chainId".to_string(), json!([]), READ_RETRIES).await?;
        parse_quantity_value(&raw, "eth_chainId").and_then(|id| {
            u64::try_from(id).map_err(|_| ChainError::Decode("eth_chainId overflow".to_string()))
        })
    }

    async fn request(
        &self,
        method: String,
        params: Value,
        retries: usize,
    ) -> Result<Value, ChainError> {
        let context = method.clone();
        run_with_retry(&self.provider, retries, &context, move |provider| {
            let method = method.clone();
            let params = params.clone();
            async move {
                let raw: Value = provider
                    .raw_request(Cow::Owned(method), params)
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                Ok(raw)
            }
        })
        .await
        .map_err(|err| classify_rpc_error(&context, &err.to_string()))
    }

    async fn cheat(&self, name: &str, params: Value) -> Result<(), ChainError> {
        let method = self.flavor.method(name);
        self.request(method, params, CONTROL_RETRIES).await.map(|_| ())
    }

    fn ensure_unlocked(&self, signer: &Signer) -> Result<(), ChainError> {
        if self.impersonated.contains(&signer.address()) {
            Ok(())
        } else {
            Err(ChainError::NotImpersonated(signer.address()))
        }
    }

    async fn submit(
        &self,
        from: &Signer,
        tx: Value,
        context: String,
    ) -> Result<ReceiptSummary, ChainError> {
        let hash = self
            .request("eth_sendTransaction".to_string(), json!([tx]), SEND_RETRIES)
            .await
            .map_err(|err| match err {
                ChainError::ControlRejected { reason, .. } if mentions_unknown_sender(&reason) => {
                    ChainError::NotImpersonated(from.address())
                }
                ChainError::ControlRejected { reason, .. } if reason.contains("revert") => {
                    ChainError::Reverted {
                        context: context.clone(),
                        reason,
                    }
                }
                other => other,
            })?;
        let hash = hash
            .as_str()
            .ok_or_else(|| ChainError::Decode("eth_sendTransaction hash".to_string()))?
            .to_string();

        let receipt = self.wait_for_receipt(&hash).await?;
        if !receipt.success {
            return Err(ChainError::Reverted {
                context,
                reason: format!("receipt status 0x0 for {hash}"),
            });
        }
        Ok(receipt)
    }

    async fn wait_for_receipt(&self, hash: &str) -> Result<ReceiptSummary, ChainError> {
        let started = Instant::now();
        loop {
            let raw = self
                .request(
                    "eth_getTransactionReceipt".to_string(),
                    json!([hash]),
                    READ_RETRIES,
                )
                .await?;
            if !raw.is_null() {
                return parse_receipt(&raw);
            }
            if started.elapsed() >= Duration::from_millis(RECEIPT_TIMEOUT_MS) {
                return Err(ChainError::Transport(format!(
                    "no receipt for {hash} after {RECEIPT_TIMEOUT_MS}ms (is automine off?)"
                )));
            }
            sleep(Duration::from_millis(RECEIPT_POLL_MS)).await;
        }
    }
}

fn mentions_unknown_sender(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    lower.contains("unknown account")
        || lower.contains("sender account not recognized")
        || lower.contains("no signer")
}

fn classify_rpc_error(method: &str, message: &str) -> ChainError {
    if is_retryable_rpc_error(message) {
        ChainError::Transport(format!("{method}: {message}"))
    } else {
        ChainError::ControlRejected {
            method: method.to_string(),
            reason: message.to_string(),
        }
    }
}

fn parse_quantity_value(raw: &Value, what: &str) -> Result<U256, ChainError> {
    let text = raw
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("{what}: expected hex string, got {raw}")))?;
    let digits = clean_hex(text);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|err| ChainError::Decode(format!("{what}: {err}")))
}

fn parse_bytes_value(raw: &Value, what: &str) -> Result<Bytes, ChainError> {
    let text = raw
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("{what}: expected hex string, got {raw}")))?;
    hex::decode(clean_hex(text))
        .map(Bytes::from)
        .map_err(|err| ChainError::Decode(format!("{what}: {err}")))
}

fn parse_receipt(raw: &Value) -> Result<ReceiptSummary, ChainError> {
    let status = raw
        .get("status")
        .map(|v| parse_quantity_value(v, "receipt.status"))
        .transpose()?
        .unwrap_or(U256::from(1u64));
    let gas_used = raw
        .get("gasUsed")
        .map(|v| parse_quantity_value(v, "receipt.gasUsed"))
        .transpose()?
        .unwrap_or_default();
    let contract_address = match raw.get("contractAddress") {
        Some(Value::String(text)) => Some(
            Address::from_str(text)
                .map_err(|err| ChainError::Decode(format!("receipt.contractAddress: {err}")))?,
        ),
        _ => None,
    };
    Ok(ReceiptSummary {
        success: !status.is_zero(),
        gas_used: u64::try_from(gas_used).unwrap_or(u64::MAX),
        contract_address,
    })
}

#[async_trait]
impl ChainControl for RpcChain {
    async fn impersonate_account(&mut self, who: Address) -> Result<Signer, ChainError> {
        self.cheat("impersonateAccount", json!([who])).await?;
        if self.impersonated.insert(who) {
            tracing::debug!("[CHAIN] Impersonating {} via {}", who, self.flavor.prefix());
        }
        Ok(Signer::impersonated(who))
    }

    async fn stop_impersonating_account(&mut self, who: Address) -> Result<(), ChainError> {
        self.cheat("stopImpersonatingAccount", json!([who])).await?;
        self.impersonated.remove(&who);
        Ok(())
    }

    async fn set_balance(&mut self, who: Address, amount: U256) -> Result<(), ChainError> {
        self.cheat("setBalance", json!([who, to_quantity(amount)])).await
    }

    async fn balance(&mut self, who: Address) -> Result<U256, ChainError> {
        let raw = self
            .request(
                "eth_getBalance".to_string(),
                json!([who, "latest"]),
                READ_RETRIES,
            )
            .await?;
        parse_quantity_value(&raw, "eth_getBalance")
    }

    async fn set_storage_at(
        &mut self,
        contract: Address,
        slot: U256,
        value: U256,
    ) -> Result<(), ChainError> {
        self.cheat(
            "setStorageAt",
            json!([contract, to_quantity(slot), to_word(value)]),
        )
        .await
    }

    async fn storage_at(&mut self, contract: Address, slot: U256) -> Result<U256, ChainError> {
        let raw = self
            .request(
                "eth_getStorageAt".to_string(),
                json!([contract, to_quantity(slot), "latest"]),
                READ_RETRIES,
            )
            .await?;
        parse_quantity_value(&raw, "eth_getStorageAt")
    }

    async fn set_code(&mut self, who: Address, runtime_code: Bytes) -> Result<(), ChainError> {
        self.cheat("setCode", json!([who, runtime_code])).await
    }

    async fn mine(&mut self) -> Result<(), ChainError> {
        self.request("evm_mine".to_string(), json!([]), CONTROL_RETRIES)
            .await
            .map(|_| ())
    }

    async fn deploy(&mut self, from: &Signer, init_code: Bytes) -> Result<Address, ChainError> {
        self.ensure_unlocked(from)?;
        let tx = json!({ "from": from.address(), "data": init_code });
        let receipt = self.submit(from, tx, format!("deployment from {from}")).await?;
        receipt.contract_address.ok_or_else(|| {
            ChainError::Decode("deployment receipt without contractAddress".to_string())
        })
    }

    async fn send(
        &mut self,
        from: &Signer,
        to: Address,
        data: Bytes,
    ) -> Result<TxOutcome, ChainError> {
        self.ensure_unlocked(from)?;
        let tx = json!({ "from": from.address(), "to": to, "data": data });
        let receipt = self
            .submit(from, tx, format!("call to {to} from {from}"))
            .await?;
        // Receipts carry no return data.
        Ok(TxOutcome {
            gas_used: receipt.gas_used,
            output: Bytes::new(),
            contract_address: receipt.contract_address,
        })
    }

    async fn call(&mut self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let raw = self
            .request(
                "eth_call".to_string(),
                json!([{ "to": to, "data": data }, "latest"]),
                READ_RETRIES,
            )
            .await
            .map_err(|err| match err {
                ChainError::ControlRejected { reason, .. } if reason.contains("revert") => {
                    ChainError::Reverted {
                        context: format!("eth_call to {to}"),
                        reason,
                    }
                }
                other => other,
            })?;
        parse_bytes_value(&raw, "eth_call")
    }
}

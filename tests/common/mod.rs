#![allow(dead_code)]

use alloy::primitives::{address, Address, Bytes};
use alloy::sol_types::SolCall;
use penguin_harness::chain::{ChainControl, LocalChain};
use penguin_harness::config::chains::ChainConfig;
use penguin_harness::config::penguin::{
    ORCHESTRATOR_CONTRACT_NAME, POOL_TOKEN_PRESET, REWARD_TOKEN_PRESET, STRATEGY_CONTRACT_NAME,
};
use penguin_harness::contracts::{ArtifactStore, StrategyPefiUsdcPgnl};
use penguin_harness::harness::LpWiring;
use revm::db::EmptyDB;
use revm::primitives::hex::FromHex;

pub const WALLET: Address = address!("00000000000000000000000000000000000a11ce");

/// Creation wrapper: copy the runtime that follows the 11-byte prologue into
/// memory and return it. Anything appended after the runtime (constructor
/// arguments) is ignored.
pub fn init_code(runtime: &[u8]) -> Bytes {
    assert!(runtime.len() <= 0xff, "runtime too long for PUSH1 length");
    let mut code = vec![
        0x60,
        runtime.len() as u8,
        0x80,
        0x60,
        0x0b,
        0x60,
        0x00,
        0x39,
        0x60,
        0x00,
        0xf3,
    ];
    code.extend_from_slice(runtime);
    Bytes::from(code)
}

/// ERC-20 stand-in with `mapping(address => uint256)` at slot 1.
/// 64-byte calldata `(holder, delta)` adds `delta` (two's complement) to the
/// holder's balance; anything else is treated as `balanceOf(address)`.
pub fn mock_token_runtime() -> Bytes {
    Bytes::from_hex(concat!(
        "36604014602057",
        "600435600052600160205260406000205460005260206000f3",
        "5b600035600052600160205260406000208054602035019055",
        "00"
    ))
    .expect("token runtime hex")
}

/// Orchestrator stand-in with `mapping(address => bool)` at slot 0.
/// 68-byte calldata is `modifyApprovedContracts(address,bool)`; anything else
/// is `approvedContracts(address)`.
pub fn mock_orchestrator_runtime() -> Bytes {
    Bytes::from_hex(concat!(
        "36604414602057",
        "600435600052600060205260406000205460005260206000f3",
        "5b600435600052600060205260243560406000205500"
    ))
    .expect("orchestrator runtime hex")
}

/// Vault stand-in: `withdraw(amt)` debits and any other selector credits
/// `amt` on the strategy's own balance in `token`.
pub fn mock_strategy_runtime(token: Address) -> Bytes {
    let withdraw = StrategyPefiUsdcPgnl::withdrawCall::SELECTOR;
    let mut code = Vec::with_capacity(68);
    code.extend_from_slice(&[0x60, 0x04, 0x35, 0x60, 0x00, 0x35, 0x60, 0xe0, 0x1c, 0x63]);
    code.extend_from_slice(&withdraw);
    code.extend_from_slice(&[
        0x14, 0x60, 0x15, 0x57, 0x60, 0x19, 0x56, 0x5b, 0x60, 0x00, 0x03, 0x5b, 0x30, 0x60,
        0x00, 0x52, 0x60, 0x20, 0x52, 0x60, 0x00, 0x60, 0x00, 0x60, 0x40, 0x60, 0x00, 0x60,
        0x00, 0x73,
    ]);
    code.extend_from_slice(token.as_slice());
    code.extend_from_slice(&[0x5a, 0xf1, 0x50, 0x00]);
    assert_eq!(code.len(), 68);
    Bytes::from(code)
}

/// STOP. Accepts every call and changes nothing.
pub fn noop_runtime() -> Bytes {
    Bytes::from(vec![0x00])
}

/// Artifacts for the vault/orchestrator mocks under the production names.
pub fn mock_artifacts(token: Address) -> ArtifactStore {
    let mut store = ArtifactStore::new();
    store.insert(STRATEGY_CONTRACT_NAME, &init_code(&mock_strategy_runtime(token)));
    store.insert(ORCHESTRATOR_CONTRACT_NAME, &init_code(&mock_orchestrator_runtime()));
    store
}

pub fn wiring() -> LpWiring {
    LpWiring::new(WALLET, POOL_TOKEN_PRESET, REWARD_TOKEN_PRESET)
}

/// Blank Avalanche-flavoured chain with the mock token at the pool-token
/// address.
pub async fn local_chain_with_token() -> LocalChain<EmptyDB> {
    let mut chain = LocalChain::empty(ChainConfig::avalanche());
    chain
        .set_code(POOL_TOKEN_PRESET, mock_token_runtime())
        .await
        .expect("install mock token");
    chain
}

/// Block the stub node reports as its head.
pub const STUB_HEAD_NUMBER: u64 = 0x64;
pub const STUB_HEAD_TIMESTAMP: u64 = 1_634_614_000;

/// Deterministic block hash served by the stub node: the block number in the
/// low eight bytes behind a fixed `0xab` marker.
pub fn stub_block_hash(number: u64) -> alloy::primitives::B256 {
    let mut bytes = [0u8; 32];
    bytes[0] = 0xab;
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    alloy::primitives::B256::from(bytes)
}

fn stub_result(method: &str, params: &serde_json::Value) -> serde_json::Value {
    use serde_json::json;
    match method {
        "eth_getBlockByNumber" => {
            let tag = params[0].as_str().unwrap_or("latest");
            let number = if tag == "latest" {
                STUB_HEAD_NUMBER
            } else {
                u64::from_str_radix(tag.trim_start_matches("0x"), 16).unwrap_or(0)
            };
            if number > STUB_HEAD_NUMBER {
                return serde_json::Value::Null;
            }
            json!({
                "number": format!("0x{number:x}"),
                "timestamp": format!("0x{:x}", STUB_HEAD_TIMESTAMP - (STUB_HEAD_NUMBER - number) * 2),
                "hash": format!("0x{}", hex::encode(stub_block_hash(number))),
            })
        }
        "eth_getCode" => {
            let who = params[0].as_str().unwrap_or_default().to_ascii_lowercase();
            if who == POOL_TOKEN_PRESET.to_string().to_ascii_lowercase() {
                json!(format!("0x{}", hex::encode(mock_token_runtime())))
            } else {
                json!("0x")
            }
        }
        "eth_chainId" => json!("0xa86a"),
        "eth_getBalance" | "eth_getTransactionCount" | "eth_getStorageAt" => json!("0x0"),
        _ => serde_json::Value::Null,
    }
}

async fn serve_stub_connection(mut socket: tokio::net::TcpStream) -> std::io::Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    let (header_end, content_length) = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            break (pos + 4, length);
        }
    };
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request: serde_json::Value =
        serde_json::from_slice(&buf[header_end..]).unwrap_or(serde_json::Value::Null);
    let method = request["method"].as_str().unwrap_or_default();
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": request["id"].clone(),
        "result": stub_result(method, &request["params"]),
    })
    .to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

/// Minimal JSON-RPC node on 127.0.0.1 serving the read methods a fork needs:
/// a head at `STUB_HEAD_NUMBER`, the mock token's code at the pool-token
/// address and empty state everywhere else. Returns the node URL.
pub async fn spawn_stub_node() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub node");
    let addr = listener.local_addr().expect("stub node address");
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_stub_connection(socket));
        }
    });
    format!("http://{addr}")
}

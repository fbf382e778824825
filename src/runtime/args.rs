#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainBackend {
    /// External Hardhat/Anvil fork node over JSON-RPC.
    Node,
    /// In-process revm fork of `ETH_RPC_URL`.
    Fork,
}

impl ChainBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Fork => "fork",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "node" | "hardhat" | "anvil" => Some(Self::Node),
            "fork" | "revm" | "local" => Some(Self::Fork),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RuntimeArgs {
    pub backend: ChainBackend,
    pub explain_config: bool,
}

pub(crate) fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn backend_from_env() -> anyhow::Result<ChainBackend> {
    match std::env::var("CHAIN_BACKEND") {
        Ok(raw) if !raw.trim().is_empty() => ChainBackend::parse(&raw).ok_or_else(|| {
            anyhow::anyhow!(
                "invalid CHAIN_BACKEND '{}' (expected node or fork)",
                raw.trim()
            )
        }),
        _ => Ok(ChainBackend::Node),
    }
}

fn parse_runtime_args_from_iter<I, S>(args: I) -> anyhow::Result<RuntimeArgs>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let supplied_args = args
        .into_iter()
        .map(|arg| arg.as_ref().to_string())
        .collect::<Vec<_>>();
    if !supplied_args.is_empty() {
        let joined = supplied_args.join(" ");
        return Err(anyhow::anyhow!(
            "CLI arguments are not accepted. Configure .env keys instead (CHAIN_BACKEND, ETH_RPC_URL, WALLET_ADDR, LP_*, DASHBOARD_EXPLAIN_CONFIG). Received args: {}",
            joined
        ));
    }

    let backend = backend_from_env()?;
    let explain_config = std::env::var("DASHBOARD_EXPLAIN_CONFIG")
        .ok()
        .and_then(|raw| parse_bool_flag(&raw))
        .unwrap_or(false);

    Ok(RuntimeArgs {
        backend,
        explain_config,
    })
}

pub fn parse_runtime_args() -> anyhow::Result<RuntimeArgs> {
    parse_runtime_args_from_iter(std::env::args().skip(1))
}

#[cfg(test)]
mod tests {
    use super::{parse_bool_flag, parse_runtime_args_from_iter, ChainBackend};
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_runtime_env() {
        for key in ["CHAIN_BACKEND", "DASHBOARD_EXPLAIN_CONFIG"] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn runtime_args_default_to_node_backend() {
        let _guard = env_lock().lock().expect("env lock");
        clear_runtime_env();
        let parsed =
            parse_runtime_args_from_iter(Vec::<&str>::new()).expect("parse should succeed");
        assert_eq!(parsed.backend, ChainBackend::Node);
        assert!(!parsed.explain_config);
        clear_runtime_env();
    }

    #[test]
    fn runtime_args_parse_backend_and_explain_from_env() {
        let _guard = env_lock().lock().expect("env lock");
        clear_runtime_env();
        std::env::set_var("CHAIN_BACKEND", "Fork");
        std::env::set_var("DASHBOARD_EXPLAIN_CONFIG", "yes");

        let parsed =
            parse_runtime_args_from_iter(Vec::<&str>::new()).expect("parse should succeed");
        assert_eq!(parsed.backend, ChainBackend::Fork);
        assert_eq!(parsed.backend.as_str(), "fork");
        assert!(parsed.explain_config);

        clear_runtime_env();
    }

    #[test]
    fn runtime_args_reject_unknown_backend() {
        let _guard = env_lock().lock().expect("env lock");
        clear_runtime_env();
        std::env::set_var("CHAIN_BACKEND", "ganache");

        let err = parse_runtime_args_from_iter(Vec::<&str>::new()).expect_err("parse should fail");
        assert!(
            err.to_string().contains("invalid CHAIN_BACKEND"),
            "unexpected error message: {err}"
        );

        clear_runtime_env();
    }

    #[test]
    fn runtime_args_reject_cli_flags() {
        let _guard = env_lock().lock().expect("env lock");
        clear_runtime_env();
        let err = parse_runtime_args_from_iter(vec!["--grep", "deposit"])
            .expect_err("parse should fail");
        assert!(
            err.to_string().contains("CLI arguments are not accepted"),
            "unexpected error message: {}",
            err
        );
        clear_runtime_env();
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert_eq!(parse_bool_flag(" ON "), Some(true));
        assert_eq!(parse_bool_flag("0"), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
    }
}

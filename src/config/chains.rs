#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub block_time_ms: u64,
}

impl ChainConfig {
    pub fn get(chain_id: u64) -> Self {
        match chain_id {
            43114 => Self::avalanche(),
            43113 => Self::fuji(),
            31337 => Self::hardhat(),
            other => Self {
                chain_id: other,
                name: format!("chain-{other}"),
                block_time_ms: 2_000,
            },
        }
    }

    pub fn avalanche() -> Self {
        Self {
            chain_id: 43114,
            name: "Avalanche C-Chain".to_string(),
            block_time_ms: 2_000,
        }
    }

    pub fn fuji() -> Self {
        Self {
            chain_id: 43113,
            name: "Avalanche Fuji".to_string(),
            block_time_ms: 2_000,
        }
    }

    pub fn hardhat() -> Self {
        Self {
            chain_id: 31337,
            name: "Hardhat Network".to_string(),
            block_time_ms: 1_000,
        }
    }

    pub fn block_time_secs(&self) -> u64 {
        (self.block_time_ms / 1_000).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::ChainConfig;

    #[test]
    fn test_unknown_chain_falls_back_to_generic_profile() {
        let cfg = ChainConfig::get(999_999);
        assert_eq!(cfg.chain_id, 999_999);
        assert_eq!(cfg.block_time_secs(), 2);
    }

    #[test]
    fn test_avalanche_profile() {
        let cfg = ChainConfig::get(43114);
        assert_eq!(cfg.name, "Avalanche C-Chain");
        assert_eq!(cfg.block_time_secs(), 2);
    }
}

use alloy::primitives::{B256, U256};

/// Clean a hex string by removing "0x" prefix and whitespace
pub fn clean_hex(s: &str) -> &str {
    let s = s.trim();
    if let Some(stripped) = s.strip_prefix("0x") {
        stripped
    } else {
        s
    }
}

/// Convert a string (hex or decimal) to U256
pub fn to_u256(s: &str) -> Option<U256> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(hex) = s.strip_prefix("0x") {
        if hex.is_empty() {
            return Some(U256::ZERO);
        }
        return U256::from_str_radix(hex, 16).ok();
    }

    let digits: String = s.chars().filter(|c| *c != '_').collect();
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return U256::from_str_radix(&digits, 10).ok();
    }

    None
}

/// JSON-RPC QUANTITY encoding: `0x`-prefixed, no leading zeros (`0x0` for zero).
pub fn to_quantity(value: U256) -> String {
    format!("0x{value:x}")
}

/// 32-byte DATA encoding of a storage word.
pub fn to_word(value: U256) -> String {
    format!("{}", B256::from(value))
}

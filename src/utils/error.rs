pub fn compact_error_message(message: &str, max_len: usize) -> String {
    let mut raw = message.to_string();
    if let Some((prefix, _)) = raw.split_once(" text: ") {
        raw = format!("{prefix} text=<omitted>");
    }
    if let Some((prefix, _)) = raw.split_once("Stack backtrace:") {
        raw = prefix.to_string();
    }

    let mut compact = String::with_capacity(raw.len().min(max_len.saturating_add(16)));
    let mut prev_ws = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !prev_ws && !compact.is_empty() {
                compact.push(' ');
            }
            prev_ws = true;
            continue;
        }
        compact.push(ch);
        prev_ws = false;
        if compact.len() > max_len {
            break;
        }
    }
    if compact.len() <= max_len {
        compact
    } else {
        let mut cut = max_len;
        while !compact.is_char_boundary(cut) {
            cut -= 1;
        }
        compact.truncate(cut);
        compact.push_str("...(truncated)");
        compact
    }
}

fn u256_word_to_usize(word: &[u8]) -> Option<usize> {
    if word.len() != 32 {
        return None;
    }
    if word[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..32]);
    usize::try_from(u64::from_be_bytes(tail)).ok()
}

/// Render EVM revert output as a readable reason.
///
/// Recognizes `Error(string)` and `Panic(uint256)`; anything else falls back to
/// raw hex so nothing is silently dropped.
pub fn describe_revert(output: &[u8]) -> String {
    if output.is_empty() {
        return "revert: <empty>".to_string();
    }
    match decode_revert_reason(output) {
        Some(reason) => format!("revert: {reason}"),
        None => format!("revert: 0x{}", hex::encode(output)),
    }
}

pub fn decode_revert_reason(output: &[u8]) -> Option<String> {
    if output.len() < 4 {
        return None;
    }
    // Error(string)
    if output[0..4] == [0x08, 0xc3, 0x79, 0xa0] {
        let args = &output[4..];
        if args.len() < 64 {
            return None;
        }
        let offset = u256_word_to_usize(&args[0..32])?;
        if offset.saturating_add(32) > args.len() {
            return None;
        }
        let len = u256_word_to_usize(&args[offset..offset.saturating_add(32)])?;
        let start = offset.saturating_add(32);
        if start.saturating_add(len) > args.len() {
            return None;
        }
        let raw = &args[start..start.saturating_add(len)];
        return std::str::from_utf8(raw).ok().map(|s| s.to_string());
    }
    // Panic(uint256)
    if output[0..4] == [0x4e, 0x48, 0x7b, 0x71] {
        if output.len() < 4 + 32 {
            return None;
        }
        let code = u256_word_to_usize(&output[4..36]);
        return Some(match code {
            Some(code) => format!("panic_code=0x{:x}", code),
            None => "panic_code=<malformed>".to_string(),
        });
    }
    None
}

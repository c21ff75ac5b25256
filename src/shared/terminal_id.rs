const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const HASH_SLICE: usize = 8;

pub fn sanitize_session_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

pub fn session_terminal_hash(name: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for unit in name.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub fn session_terminal_base(name: &str) -> String {
    let sanitized = sanitize_session_name(name);
    let hash_hex = format!("{:08x}", session_terminal_hash(name));
    format!("session-{sanitized}~{}", &hash_hex[..HASH_SLICE])
}

/// Terminal that hosts the agent process for a session; also the key used to
/// guard agent auto-starts.
pub fn terminal_id_for_session_top(name: &str) -> String {
    format!("{}-top", session_terminal_base(name))
}

pub fn terminal_id_for_session_bottom(name: &str) -> String {
    format!("{}-bottom", session_terminal_base(name))
}

pub fn session_terminals(name: &str) -> Vec<String> {
    vec![
        terminal_id_for_session_top(name),
        terminal_id_for_session_bottom(name),
    ]
}

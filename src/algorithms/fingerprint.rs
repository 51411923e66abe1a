//! Heuristic per-browser identifier.
//!
//! The identifier is a 32-bit rolling hash of environment signals (canvas and
//! audio samples, user agent, locale, screen, timezone, hardware). It is NOT a
//! secret and NOT an identity: any client can forge or replay it. It is only a
//! correlation key for interest profiles and must never gate access to
//! documents or other protected resources; that is the job of signed tokens.

pub const FINGERPRINT_PREFIX: &str = "fp_";
pub const SIGNAL_SEPARATOR: &str = "|||";

/// `h = h * 31 + c` over UTF-16 code units, wrapped to a signed 32-bit integer.
pub fn rolling_hash(input: &str) -> i32 {
    input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Joins the signals and renders `fp_` + base36(|hash|).
pub fn fingerprint<S: AsRef<str>>(signals: &[S]) -> String {
    let joined = signals
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(SIGNAL_SEPARATOR);
    let hash = i64::from(rolling_hash(&joined)).unsigned_abs();
    format!("{}{}", FINGERPRINT_PREFIX, to_base36(hash))
}

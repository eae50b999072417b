use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}").unwrap());

static BTC_LEGACY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[13][a-km-zA-HJ-NP-Z1-9]{25,34}\b").unwrap());

static BTC_BECH32_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bbc1[a-zA-HJ-NP-Z0-9]{25,89}\b").unwrap());

static MONERO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b4[0-9AB][1-9A-HJ-NP-Za-km-z]{93}\b").unwrap());

static ETH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b0x[a-fA-F0-9]{40}\b").unwrap());

// Only with an explicit "fingerprint"/"pgp" label, bare hex runs are mostly hashes.
static PGP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:key\s+fingerprint|pgp|fingerprint)[:\s=]+(?:[0-9A-Fa-f]{4}\s?){10}").unwrap()
});

/// Which kinds of contact or payment identifiers appear in `text`.
pub fn sensitive_kinds(text: &str) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    if EMAIL_RE.is_match(text) {
        kinds.push("email");
    }
    if BTC_LEGACY_RE.is_match(text) || BTC_BECH32_RE.is_match(text) {
        kinds.push("bitcoin");
    }
    if MONERO_RE.is_match(text) {
        kinds.push("monero");
    }
    if ETH_RE.is_match(text) {
        kinds.push("ethereum");
    }
    if PGP_RE.is_match(text) {
        kinds.push("pgp_fingerprint");
    }
    kinds
}

/// Drives the stored `sensitive_flag`.
pub fn has_sensitive_identifiers(text: &str) -> bool {
    !sensitive_kinds(text).is_empty()
}

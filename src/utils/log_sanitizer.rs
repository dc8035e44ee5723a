// ============================================================================
// Log Sanitization
// ============================================================================
//
// Customer-supplied strings (names, emails, notes, query params) reach the
// logs through these helpers so a crafted value cannot forge log lines or
// leak a full email address.
//
// ============================================================================

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum number of characters kept from a logged value
const MAX_LOG_LENGTH: usize = 200;

static ANSI_ESCAPE_REGEX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").ok());

/// Sanitize user input for safe logging
///
/// 1. Removes ANSI escape sequences
/// 2. Replaces newlines, carriage returns and tabs with spaces
/// 3. Drops remaining control characters
/// 4. Truncates to MAX_LOG_LENGTH characters
///
/// ```
/// use giofarma_catalog::utils::log_sanitizer::sanitize_for_log;
///
/// assert_eq!(sanitize_for_log("ana\nINFO: fake entry"), "ana INFO: fake entry");
/// ```
pub fn sanitize_for_log(input: &str) -> String {
    let no_ansi = match ANSI_ESCAPE_REGEX.as_ref() {
        Some(re) => re.replace_all(input, "").into_owned(),
        None => input.to_string(),
    };

    let cleaned: String = no_ansi
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();

    match cleaned.char_indices().nth(MAX_LOG_LENGTH) {
        Some((cut, _)) => format!("{}...", &cleaned[..cut]),
        None => cleaned,
    }
}

/// Keep the first character of the local part and the whole domain:
/// `maria.lopez@example.com` logs as `m***@example.com`.
pub fn mask_email(email: &str) -> String {
    let sanitized = sanitize_for_log(email.trim());

    match sanitized.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        None => redact_sensitive(&sanitized),
    }
}

/// For values that must never be logged in full (tokens, keys).
pub fn redact_sensitive(input: &str) -> String {
    format!("[REDACTED-{}]", input.len())
}

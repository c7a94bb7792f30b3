/// Backend address used when none is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

/// Normalize a backend base address.
///
/// Blank input falls back to [`DEFAULT_BACKEND_URL`]; surrounding whitespace and
/// trailing slashes are removed.
pub fn normalize_backend_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BACKEND_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// Join a capability path onto a backend base address.
pub fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        normalize_backend_url(base),
        path.trim_start_matches('/')
    )
}

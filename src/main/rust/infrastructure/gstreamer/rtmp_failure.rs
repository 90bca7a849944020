/// Failure reasons that retrying cannot fix
const PERMANENT_MARKERS: [&str; 6] = [
    "endpoint malformed",
    "invalid url",
    "no element",
    "no such element",
    "not found",
    "bad request",
];

const AUTH_MARKERS: [&str; 5] = ["auth", "unauthorized", "forbidden", "401", "403"];

/// Authentication or authorization rejection by the server
pub fn is_auth_failure(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    AUTH_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Transient network trouble is retryable, rejections and misconfiguration are not
pub fn is_retryable(reason: &str) -> bool {
    if is_auth_failure(reason) {
        return false;
    }

    let lower = reason.to_ascii_lowercase();
    !PERMANENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

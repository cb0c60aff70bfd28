//! User agent selection for outgoing requests.

use std::sync::atomic::{AtomicUsize, Ordering};

pub const USER_AGENT: &str = "crawlpace/0.1 (+https://github.com/crawlpace/crawlpace)";

/// Browser user agents cycled through in impersonate mode.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

static NEXT_IMPERSONATE: AtomicUsize = AtomicUsize::new(0);

/// Next browser user agent in round-robin order.
pub fn rotate_user_agent() -> &'static str {
    let index = NEXT_IMPERSONATE.fetch_add(1, Ordering::Relaxed);
    IMPERSONATE_USER_AGENTS[index % IMPERSONATE_USER_AGENTS.len()]
}

/// Resolve the user agent from its config value: unset means the product
/// default, `"impersonate"` rotates through real browser user agents, and
/// anything else is used verbatim.
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => USER_AGENT.to_string(),
        Some("impersonate") => rotate_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}

//! Page/limit handling for `tx_search`.

/// Default page size when `--limit` is not given.
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// CometBFT caps `per_page` at 100.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamp to a 1-based page and a limit in `[1, MAX_PAGE_SIZE]`.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Whether more results exist after this page.
    pub fn has_next(&self, total_count: u64) -> bool {
        u64::from(self.page) * u64::from(self.limit) < total_count
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Join `key=value` event conditions into a CometBFT query, e.g.
/// `message.sender='cosmos1..' AND tx.height=5`. Input uses `&` separators.
pub fn events_to_query(events: &str) -> Result<String, String> {
    let mut parts = Vec::new();
    for cond in events.split('&').map(str::trim).filter(|c| !c.is_empty()) {
        let (key, value) = cond
            .split_once('=')
            .ok_or_else(|| format!("event {cond:?} is not key=value"))?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || !key.contains('.') {
            return Err(format!("event key {key:?} must be <type>.<attribute>"));
        }
        if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) && key == "tx.height" {
            parts.push(format!("{key}={value}"));
        } else {
            parts.push(format!("{key}='{value}'"));
        }
    }
    if parts.is_empty() {
        return Err("at least one event is required".into());
    }
    Ok(parts.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamps() {
        assert_eq!(PageRequest::default(), PageRequest { page: 1, limit: 30 });
        assert_eq!(PageRequest::new(Some(0), Some(5000)), PageRequest { page: 1, limit: 100 });
    }

    #[test]
    fn has_next_page() {
        let p = PageRequest::new(Some(1), Some(10));
        assert!(p.has_next(11));
        assert!(!p.has_next(10));
    }

    #[test]
    fn events_joined() {
        assert_eq!(
            events_to_query("message.action=send&tx.height=5").unwrap(),
            "message.action='send' AND tx.height=5"
        );
        assert!(events_to_query("noequals").is_err());
        assert!(events_to_query("action=send").is_err());
        assert!(events_to_query("").is_err());
    }
}

//! User-agent parsing and device fingerprinting.

use regex::Regex;
use sha2::{Digest, Sha256};

use warden_core::{BrowserInfo, DeviceInfo, DeviceType, OsInfo};

/// Substring signatures of automated clients, matched case-insensitively.
///
/// Shared between device classification and the anomaly scorer's
/// bot-agent heuristic.
pub const BOT_SIGNATURES: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "scraper",
    "curl",
    "wget",
    "python-requests",
    "httpclient",
    "headless",
    "phantomjs",
    "selenium",
    "script",
];

/// Checks a user agent against the bot signature list.
#[must_use]
pub fn is_bot_user_agent(user_agent: &str) -> bool {
    let lower = user_agent.to_lowercase();
    BOT_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

/// Parses a raw user agent into device information.
///
/// Pattern-based: unknown agents still produce a result with `Unknown`
/// fields rather than failing.
#[must_use]
pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    DeviceInfo {
        browser: parse_browser(user_agent),
        os: parse_os(user_agent),
        device_type: classify_device(user_agent),
        fingerprint: fingerprint(user_agent),
    }
}

/// Computes a stable fingerprint for a user agent string.
///
/// Deterministic across calls; truncated SHA-256, not suitable for
/// cryptographic purposes.
#[must_use]
pub fn fingerprint(user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

fn capture_version(user_agent: &str, pattern: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(user_agent)?
        .get(1)
        .map(|m| m.as_str().replace('_', "."))
}

fn parse_browser(user_agent: &str) -> BrowserInfo {
    // Order matters: Edge and Opera carry Chrome tokens, Chrome carries
    // a Safari token.
    let (name, version) = if user_agent.contains("Edg/") {
        ("Edge", capture_version(user_agent, r"Edg/([0-9.]+)"))
    } else if user_agent.contains("OPR/") {
        ("Opera", capture_version(user_agent, r"OPR/([0-9.]+)"))
    } else if user_agent.contains("Chrome/") {
        ("Chrome", capture_version(user_agent, r"Chrome/([0-9.]+)"))
    } else if user_agent.contains("Firefox/") {
        ("Firefox", capture_version(user_agent, r"Firefox/([0-9.]+)"))
    } else if user_agent.contains("Safari/") {
        ("Safari", capture_version(user_agent, r"Version/([0-9.]+)"))
    } else if user_agent.contains("MSIE") || user_agent.contains("Trident/") {
        (
            "Internet Explorer",
            capture_version(user_agent, r"(?:MSIE |rv:)([0-9.]+)"),
        )
    } else {
        ("Unknown", None)
    };

    BrowserInfo {
        name: name.to_string(),
        version,
    }
}

fn parse_os(user_agent: &str) -> OsInfo {
    let (name, version) = if user_agent.contains("Windows NT") {
        ("Windows", capture_version(user_agent, r"Windows NT ([0-9.]+)"))
    } else if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        ("iOS", capture_version(user_agent, r"OS ([0-9_]+)"))
    } else if user_agent.contains("Mac OS X") {
        ("macOS", capture_version(user_agent, r"Mac OS X ([0-9_.]+)"))
    } else if user_agent.contains("Android") {
        ("Android", capture_version(user_agent, r"Android ([0-9.]+)"))
    } else if user_agent.contains("Linux") {
        ("Linux", None)
    } else {
        ("Unknown", None)
    };

    OsInfo {
        name: name.to_string(),
        version,
    }
}

fn classify_device(user_agent: &str) -> DeviceType {
    if user_agent.is_empty() {
        return DeviceType::Unknown;
    }
    if is_bot_user_agent(user_agent) {
        return DeviceType::Bot;
    }
    if user_agent.contains("iPad") || (user_agent.contains("Android") && !user_agent.contains("Mobile")) {
        return DeviceType::Tablet;
    }
    if user_agent.contains("Mobile") || user_agent.contains("iPhone") {
        return DeviceType::Mobile;
    }
    DeviceType::Desktop
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const FIREFOX_WIN: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";

    #[test]
    fn test_chrome_on_macos() {
        let info = parse_user_agent(CHROME_MAC);
        assert_eq!(info.browser.name, "Chrome");
        assert_eq!(info.browser.version.as_deref(), Some("120.0.0.0"));
        assert_eq!(info.os.name, "macOS");
        assert_eq!(info.os.version.as_deref(), Some("10.15.7"));
        assert_eq!(info.device_type, DeviceType::Desktop);
    }

    #[test]
    fn test_firefox_on_windows() {
        let info = parse_user_agent(FIREFOX_WIN);
        assert_eq!(info.browser.name, "Firefox");
        assert_eq!(info.os.name, "Windows");
        assert_eq!(info.os.version.as_deref(), Some("10.0"));
    }

    #[test]
    fn test_safari_on_iphone() {
        let info = parse_user_agent(SAFARI_IPHONE);
        assert_eq!(info.browser.name, "Safari");
        assert_eq!(info.browser.version.as_deref(), Some("17.1"));
        assert_eq!(info.os.name, "iOS");
        assert_eq!(info.device_type, DeviceType::Mobile);
    }

    #[test]
    fn test_bot_detection() {
        assert!(is_bot_user_agent("Mozilla/5.0 (compatible; Googlebot/2.1)"));
        assert!(is_bot_user_agent("curl/8.4.0"));
        assert!(is_bot_user_agent("python-requests/2.31"));
        assert!(!is_bot_user_agent(CHROME_MAC));

        let info = parse_user_agent("curl/8.4.0");
        assert_eq!(info.device_type, DeviceType::Bot);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(CHROME_MAC);
        let b = fingerprint(CHROME_MAC);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, fingerprint(FIREFOX_WIN));
    }

    #[test]
    fn test_unknown_agent() {
        let info = parse_user_agent("something nobody has seen");
        assert_eq!(info.browser.name, "Unknown");
        assert!(info.browser.version.is_none());
    }
}

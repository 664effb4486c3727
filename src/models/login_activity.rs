use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only audit record, one per login attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoginActivity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub platform: Option<String>,
    pub is_successful: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub platform: Option<String>,
}

/// Best-effort User-Agent sniffing for the audit trail. Not a full parser;
/// unknown agents fall through to the web platform.
pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    let ua = user_agent.to_lowercase();
    let mut info = DeviceInfo::default();

    // iOS agents advertise "like Mac OS X", so check them before macOS
    if ua.contains("iphone") || ua.contains("ipad") {
        info.os = Some(if ua.contains("ipad") { "iPadOS" } else { "iOS" }.to_string());
        info.platform = Some("IOS".to_string());
    } else if ua.contains("windows") {
        info.os = Some("Windows".to_string());
        info.platform = Some("DESKTOP".to_string());
    } else if ua.contains("mac os") {
        info.os = Some("macOS".to_string());
        info.platform = Some("DESKTOP".to_string());
    } else if ua.contains("android") {
        info.os = Some("Android".to_string());
        info.platform = Some("ANDROID".to_string());
    } else if ua.contains("linux") {
        info.os = Some("Linux".to_string());
        info.platform = Some("DESKTOP".to_string());
    }

    if ua.contains("edg/") {
        info.browser = Some("Edge".to_string());
    } else if ua.contains("chrome/") {
        info.browser = Some("Chrome".to_string());
    } else if ua.contains("safari/") {
        info.browser = Some("Safari".to_string());
    } else if ua.contains("firefox/") {
        info.browser = Some("Firefox".to_string());
    } else if ua.contains("opera/") || ua.contains("opr/") {
        info.browser = Some("Opera".to_string());
    }

    info.device_type = Some(
        if ua.contains("mobile") {
            "Mobile"
        } else if ua.contains("tablet") || ua.contains("ipad") {
            "Tablet"
        } else {
            "Desktop"
        }
        .to_string(),
    );

    if info.platform.is_none() {
        info.platform = Some("WEB".to_string());
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_desktop_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let info = parse_user_agent(ua);
        assert_eq!(info.os.as_deref(), Some("Windows"));
        assert_eq!(info.browser.as_deref(), Some("Chrome"));
        assert_eq!(info.device_type.as_deref(), Some("Desktop"));
        assert_eq!(info.platform.as_deref(), Some("DESKTOP"));
    }

    #[test]
    fn test_parse_iphone_safari() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
                  AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
        let info = parse_user_agent(ua);
        assert_eq!(info.os.as_deref(), Some("iOS"));
        assert_eq!(info.browser.as_deref(), Some("Safari"));
        assert_eq!(info.device_type.as_deref(), Some("Mobile"));
        assert_eq!(info.platform.as_deref(), Some("IOS"));
    }

    #[test]
    fn test_edge_not_reported_as_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 Chrome/120.0.0.0 \
                  Safari/537.36 Edg/120.0.0.0";
        let info = parse_user_agent(ua);
        assert_eq!(info.browser.as_deref(), Some("Edge"));
    }

    #[test]
    fn test_unknown_agent_defaults_to_web() {
        let info = parse_user_agent("curl/8.0");
        assert_eq!(info.platform.as_deref(), Some("WEB"));
        assert_eq!(info.device_type.as_deref(), Some("Desktop"));
        assert!(info.os.is_none());
    }
}

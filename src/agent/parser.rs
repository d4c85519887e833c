//! User-agent string parsing.
//!
//! [`AgentParser`] is the seam the classifier calls through; the bundled
//! [`MobileAgentParser`] covers the usual mobile/desktop families with a
//! handful of regular expressions.

use regex::Regex;

use super::AgentClass;

/// Browser family and version extracted from a user-agent string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Browser {
    /// Lower-case family name (`chrome`, `safari`, ...).
    pub name: String,
    pub version: Option<String>,
}

/// Parser output: the device classes the agent string signals directly plus
/// the detected browser, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAgent {
    pub classes: Vec<AgentClass>,
    pub browser: Option<Browser>,
}

impl ParsedAgent {
    pub fn has(&self, class: AgentClass) -> bool {
        self.classes.contains(&class)
    }

    pub fn browser_is(&self, name: &str) -> bool {
        self.browser.as_ref().is_some_and(|b| b.name == name)
    }
}

/// Capability that turns a raw `User-Agent` value into device-class flags.
pub trait AgentParser: Send + Sync {
    fn parse(&self, user_agent: &str) -> ParsedAgent;
}

// ---------------------------------------------------------------------------
// Default parser
// ---------------------------------------------------------------------------

/// Regex-based parser for common mobile and desktop agents.
pub struct MobileAgentParser {
    android: Regex,
    ipad: Regex,
    iphone: Regex,
    mac: Regex,
    webos: Regex,
    windows: Regex,
    mobile: Regex,
    cordova: Regex,
    /// Browser families, tried in order; the first capture group is the
    /// version when present.
    browsers: Vec<(&'static str, Regex)>,
}

impl MobileAgentParser {
    pub fn new() -> Self {
        let re = |pattern: &str| Regex::new(pattern).expect("static user-agent pattern");
        Self {
            android: re(r"(?i)android"),
            ipad: re(r"iPad"),
            iphone: re(r"iPhone|iPod"),
            mac: re(r"Macintosh"),
            webos: re(r"webOS|hpwOS"),
            windows: re(r"Windows"),
            mobile: re(r"Mobi|(?i:android)|iPhone|iPod|webOS|BlackBerry|IEMobile|Opera Mini"),
            cordova: re(r"(?i)cordova"),
            browsers: vec![
                ("edge", re(r"Edg(?:e|A|iOS)?/([\d.]+)")),
                ("opera", re(r"(?:OPR|Opera)/([\d.]+)")),
                ("chrome", re(r"(?:Chrome|CriOS)/([\d.]+)")),
                ("firefox", re(r"(?:Firefox|FxiOS)/([\d.]+)")),
                ("msie", re(r"(?:MSIE |Trident/.*rv:)([\d.]+)")),
                ("safari", re(r"(?:Version/([\d.]+).*)?Safari/")),
            ],
        }
    }

    fn browser(&self, user_agent: &str) -> Option<Browser> {
        self.browsers.iter().find_map(|(name, pattern)| {
            pattern.captures(user_agent).map(|caps| Browser {
                name: (*name).to_string(),
                version: caps.get(1).map(|m| m.as_str().to_string()),
            })
        })
    }
}

impl Default for MobileAgentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentParser for MobileAgentParser {
    fn parse(&self, user_agent: &str) -> ParsedAgent {
        let android = self.android.is_match(user_agent);
        let ipad = self.ipad.is_match(user_agent);
        let iphone = self.iphone.is_match(user_agent);
        let ios = ipad || iphone;
        let cordova = self.cordova.is_match(user_agent);
        let browser = self.browser(user_agent);

        let flags = [
            (AgentClass::Android, android),
            (AgentClass::Browser, browser.is_some()),
            (AgentClass::Ios, ios),
            (AgentClass::IPad, ipad),
            (AgentClass::IPhone, iphone),
            (AgentClass::Mac, !ios && self.mac.is_match(user_agent)),
            (AgentClass::Mobile, self.mobile.is_match(user_agent)),
            (AgentClass::WebOs, self.webos.is_match(user_agent)),
            (AgentClass::Windows, self.windows.is_match(user_agent)),
            (AgentClass::Cordova, cordova),
            (AgentClass::CordovaDefault, cordova && !android && !ios),
        ];

        ParsedAgent {
            classes: flags
                .into_iter()
                .filter_map(|(class, hit)| hit.then_some(class))
                .collect(),
            browser,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(ua: &str) -> ParsedAgent {
        MobileAgentParser::new().parse(ua)
    }

    #[test]
    fn android_chrome() {
        let p = parse(
            "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.6099.43 Mobile Safari/537.36",
        );
        assert!(p.has(AgentClass::Android));
        assert!(p.has(AgentClass::Mobile));
        assert!(p.has(AgentClass::Browser));
        assert!(!p.has(AgentClass::Ios));
        assert_eq!(
            p.browser,
            Some(Browser {
                name: "chrome".into(),
                version: Some("120.0.6099.43".into()),
            })
        );
    }

    #[test]
    fn ipad_safari() {
        let p = parse(
            "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1",
        );
        assert!(p.has(AgentClass::Ios));
        assert!(p.has(AgentClass::IPad));
        assert!(!p.has(AgentClass::IPhone));
        assert!(p.browser_is("safari"));
        assert_eq!(p.browser.and_then(|b| b.version), Some("16.6".into()));
    }

    #[test]
    fn desktop_mac_firefox() {
        let p = parse("Mozilla/5.0 (Macintosh; Intel Mac OS X 14.1; rv:121.0) Gecko/20100101 Firefox/121.0");
        assert!(p.has(AgentClass::Mac));
        assert!(!p.has(AgentClass::Mobile));
        assert!(p.browser_is("firefox"));
    }

    #[test]
    fn edge_is_not_chrome() {
        let p = parse(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.61",
        );
        assert!(p.has(AgentClass::Windows));
        assert!(p.browser_is("edge"));
    }

    #[test]
    fn cordova_default_only_off_android_and_ios() {
        let p = parse("Mozilla/5.0 (Windows NT 10.0) Cordova/12.0");
        assert!(p.has(AgentClass::Cordova));
        assert!(p.has(AgentClass::CordovaDefault));

        let p = parse("Mozilla/5.0 (Linux; Android 13) cordova");
        assert!(p.has(AgentClass::Cordova));
        assert!(!p.has(AgentClass::CordovaDefault));
    }

    #[test]
    fn lowercase_android_is_mobile() {
        let p = parse("Mozilla/5.0 (Linux; U; android 4.4; en-us) AppleWebKit/534.30");
        assert!(p.has(AgentClass::Android));
        assert!(p.has(AgentClass::Mobile));
    }

    #[test]
    fn unknown_agent_matches_nothing() {
        let p = parse("curl/8.4.0");
        assert!(p.classes.is_empty());
        assert!(p.browser.is_none());
    }
}

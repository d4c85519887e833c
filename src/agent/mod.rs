//! User-agent classification.
//!
//! A request's `User-Agent` header is reduced to a fixed set of device
//! classes.  The matched set is encoded as a [`Fingerprint`], a string of
//! `0`/`1` characters with one position per [`AgentClass`], which is what the
//! module cache keys on.  Two requests that match the same classes share a
//! fingerprint even if the rest of their headers differ.

pub mod parser;

use std::fmt;

use serde::Serialize;
use tracing::trace;

pub use parser::{AgentParser, Browser, MobileAgentParser, ParsedAgent};

// ---------------------------------------------------------------------------
// Device classes
// ---------------------------------------------------------------------------

/// Recognised device classes.
///
/// The declaration order is the fingerprint bit order and must not change
/// while caches keyed on it are alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AgentClass {
    Android,
    Browser,
    #[serde(rename = "iOS")]
    Ios,
    #[serde(rename = "iPad")]
    IPad,
    #[serde(rename = "iPhone")]
    IPhone,
    Mac,
    Mobile,
    #[serde(rename = "webOS")]
    WebOs,
    Windows,
    Cordova,
    CordovaDefault,
    Chrome,
}

impl AgentClass {
    /// Every class, in fingerprint order.
    pub const ALL: [AgentClass; 12] = [
        AgentClass::Android,
        AgentClass::Browser,
        AgentClass::Ios,
        AgentClass::IPad,
        AgentClass::IPhone,
        AgentClass::Mac,
        AgentClass::Mobile,
        AgentClass::WebOs,
        AgentClass::Windows,
        AgentClass::Cordova,
        AgentClass::CordovaDefault,
        AgentClass::Chrome,
    ];

    /// Canonical name as used in manifests and the override parameter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Android => "Android",
            Self::Browser => "Browser",
            Self::Ios => "iOS",
            Self::IPad => "iPad",
            Self::IPhone => "iPhone",
            Self::Mac => "Mac",
            Self::Mobile => "Mobile",
            Self::WebOs => "webOS",
            Self::Windows => "Windows",
            Self::Cordova => "Cordova",
            Self::CordovaDefault => "CordovaDefault",
            Self::Chrome => "Chrome",
        }
    }

    /// Look up a class by its exact canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.name() == name)
    }

    /// Whether a manifest `agents` list names this class, either verbatim or
    /// lower-cased.
    pub fn listed_in<S: AsRef<str>>(&self, agents: &[S]) -> bool {
        let name = self.name();
        let lower = name.to_lowercase();
        agents
            .iter()
            .any(|agent| agent.as_ref() == name || agent.as_ref() == lower)
    }
}

impl fmt::Display for AgentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Fixed-length `0`/`1` string, one character per [`AgentClass`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Encode a set of matched classes.
    pub fn from_matched(matched: &[AgentClass]) -> Self {
        let bits = AgentClass::ALL
            .iter()
            .map(|class| if matched.contains(class) { '1' } else { '0' })
            .collect();
        Self(bits)
    }

    /// Parse a fingerprint string, rejecting anything that is not exactly
    /// one `0`/`1` per class.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == AgentClass::ALL.len() && raw.bytes().all(|b| b == b'0' || b == b'1');
        valid.then(|| Self(raw.to_string()))
    }

    /// Decode back into the matched classes, in fingerprint order.
    pub fn matched_classes(&self) -> Vec<AgentClass> {
        AgentClass::ALL
            .iter()
            .zip(self.0.bytes())
            .filter(|(_, bit)| *bit == b'1')
            .map(|(class, _)| *class)
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Result of classifying one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub fingerprint: Fingerprint,
    /// Matched classes in fingerprint order.
    pub matched: Vec<AgentClass>,
}

impl Classification {
    pub fn from_matched(mut matched: Vec<AgentClass>) -> Self {
        matched.sort();
        matched.dedup();
        Self {
            fingerprint: Fingerprint::from_matched(&matched),
            matched,
        }
    }

    /// Rebuild the classification a fingerprint was produced from.
    pub fn from_fingerprint(fingerprint: &Fingerprint) -> Self {
        Self {
            matched: fingerprint.matched_classes(),
            fingerprint: fingerprint.clone(),
        }
    }

    pub fn matches(&self, class: AgentClass) -> bool {
        self.matched.contains(&class)
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Turns user-agent strings into [`Classification`]s using an injected
/// [`AgentParser`].
pub struct Classifier {
    parser: Box<dyn AgentParser>,
}

impl Classifier {
    pub fn new(parser: Box<dyn AgentParser>) -> Self {
        Self { parser }
    }

    /// Classify a user-agent string.
    ///
    /// A class matches when the parser reports it, when `explicit_override`
    /// names it exactly, or, for [`AgentClass::Chrome`], when the parsed
    /// browser family is `chrome`.
    pub fn classify(&self, user_agent: &str, explicit_override: Option<&str>) -> Classification {
        let parsed = self.parser.parse(user_agent);
        let forced = explicit_override.and_then(AgentClass::from_name);

        let matched: Vec<AgentClass> = AgentClass::ALL
            .into_iter()
            .filter(|class| {
                parsed.has(*class)
                    || forced == Some(*class)
                    || (*class == AgentClass::Chrome && parsed.browser_is("chrome"))
            })
            .collect();

        let classification = Classification {
            fingerprint: Fingerprint::from_matched(&matched),
            matched,
        };
        trace!(fingerprint = %classification.fingerprint, "classified user agent");
        classification
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Box::new(MobileAgentParser::new()))
    }
}

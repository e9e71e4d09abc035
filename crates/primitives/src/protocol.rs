#[cfg(test)]
#[path = "tests/protocol.rs"]
mod tests;

use core::fmt;

use serde::{Deserialize, Serialize};

pub const RELAY_CODEC: &str = "/vac/waku/relay/2.0.0";
pub const STORE_CODEC: &str = "/vac/waku/store/2.0.0-beta4";
pub const LIGHT_PUSH_CODEC: &str = "/vac/waku/lightpush/2.0.0-beta1";
pub const FILTER_CODEC: &str = "/vac/waku/filter/2.0.0-beta1";

/// The protocol roles a node can run.
///
/// Capability matching against a peer is a set intersection between the
/// peer's advertised identifiers and [`Protocols::codecs`]; identifiers are
/// compared as opaque strings.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocols {
    Relay,
    Store,
    LightPush,
    Filter,
}

impl Protocols {
    pub const ALL: [Self; 4] = [Self::Relay, Self::Store, Self::LightPush, Self::Filter];

    /// Identifiers for this role, ordered so the preferred one is last.
    #[must_use]
    pub const fn codecs(self) -> &'static [&'static str] {
        match self {
            Self::Relay => &[RELAY_CODEC],
            Self::Store => &[STORE_CODEC],
            Self::LightPush => &[LIGHT_PUSH_CODEC],
            Self::Filter => &[FILTER_CODEC],
        }
    }

    #[must_use]
    pub fn is_supported_by<S: AsRef<str>>(self, advertised: &[S]) -> bool {
        advertised
            .iter()
            .any(|protocol| self.codecs().contains(&protocol.as_ref()))
    }
}

impl fmt::Display for Protocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Relay => "relay",
            Self::Store => "store",
            Self::LightPush => "lightpush",
            Self::Filter => "filter",
        })
    }
}

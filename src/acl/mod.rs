//! Permission Model
//!
//! Per-user topic permissions as shipped with the demo user table. The
//! gateway hook compares literal topic names, so there is no MQTT wildcard
//! matching here: a grant either names the topic exactly or is the
//! catch-all "all".

use std::collections::BTreeSet;
use std::fmt;


/// A publish or subscribe grant parsed from a permission string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Every topic is allowed ("all").
    All,
    /// No topic is allowed ("none" or an empty string).
    None,
    /// Only the listed topics are allowed.
    Topics(BTreeSet<String>),
}

impl Grant {
    /// Parse a comma-separated permission string.
    ///
    /// Recognized forms: `all`, `none`, the empty string, or a
    /// comma-separated list of topic names. Whitespace around entries is
    /// ignored.
    pub fn parse(value: &str) -> Grant {
        match value.trim() {
            "" | "none" => Grant::None,
            "all" => Grant::All,
            list => {
                let topics: BTreeSet<String> = list
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                if topics.is_empty() {
                    Grant::None
                } else {
                    Grant::Topics(topics)
                }
            }
        }
    }

    /// Check whether the grant covers a topic.
    pub fn allows(&self, topic: &str) -> bool {
        match self {
            Grant::All => true,
            Grant::None => false,
            Grant::Topics(topics) => topics.contains(topic),
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::All => write!(f, "all"),
            Grant::None => write!(f, "none"),
            Grant::Topics(topics) => {
                let mut first = true;
                for topic in topics {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", topic)?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

/// The full permission set attached to one demo user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionInfo {
    /// Whether the user may connect a client to the MQTT broker.
    pub can_connect: bool,
    /// Topic filters the user may subscribe to.
    pub subscribe: Grant,
    /// Topics the user may publish to.
    pub publish: Grant,
}

impl PermissionInfo {
    /// Build from the three raw permission strings of the user table.
    ///
    /// `can_connect` is the literal "yes" (case-insensitive); anything else,
    /// including an absent value, denies the broker connection.
    pub fn from_strings(can_connect: &str, can_subscribe: &str, can_publish: &str) -> Self {
        Self {
            can_connect: can_connect.trim().eq_ignore_ascii_case("yes"),
            subscribe: Grant::parse(can_subscribe),
            publish: Grant::parse(can_publish),
        }
    }

    /// Whether a broker connection is allowed.
    pub fn allow_connect(&self) -> bool {
        self.can_connect
    }

    /// Whether subscribing to the given topic filter is allowed.
    pub fn allow_subscribe_to(&self, filter: &str) -> bool {
        self.subscribe.allows(filter)
    }

    /// Whether publishing to the given topic is allowed.
    pub fn allow_publish_to(&self, topic: &str) -> bool {
        self.publish.allows(topic)
    }
}

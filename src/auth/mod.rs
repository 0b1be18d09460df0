//! Authentication Simulator
//!
//! Simulates the web-server side of the demo login: a static user directory
//! maps username/password pairs to pre-shared tokens. The directory always
//! hands out the same token for a given user, where a real backend would
//! generate a fresh one per login (or at least refresh it from time to
//! time).

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::config::UserConfig;

#[cfg(test)]
mod tests;

/// Static user directory backing the simulated login.
pub struct UserDirectory {
    /// User entries (username -> entry)
    users: HashMap<String, UserEntry>,
    /// Usernames in configuration order, for stable table rendering
    order: Vec<String>,
}

/// Internal user entry
struct UserEntry {
    /// Password (plaintext, demo-only)
    password: String,
    /// Pre-shared token returned on a successful login
    token: String,
    /// Raw permission strings, kept for display only
    can_connect: String,
    can_subscribe: String,
    can_publish: String,
}

impl UserDirectory {
    /// Build the directory from the configured user table.
    pub fn new(users: &[UserConfig]) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();

        for user in users {
            order.push(user.username.clone());
            map.insert(
                user.username.clone(),
                UserEntry {
                    password: user.password.clone(),
                    token: user.token.clone(),
                    can_connect: user.can_connect.clone(),
                    can_subscribe: user.can_subscribe.clone(),
                    can_publish: user.can_publish.clone(),
                },
            );
        }

        Self { users: map, order }
    }

    /// Look up the pre-shared token for a username/password pair.
    ///
    /// Returns the token only when the username exists and the password
    /// matches exactly; `None` otherwise. Deterministic: the same pair
    /// always yields the same token.
    pub fn token_for(&self, username: &str, password: &str) -> Option<&str> {
        let entry = self.users.get(username)?;
        if entry.password == password {
            Some(&entry.token)
        } else {
            None
        }
    }

    /// Number of configured users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Render the full user table, passwords included, for display in the
    /// demo front end. Not something a production site would ever do.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<10} {:<14} {:<8} {:<50} {}",
            "user", "password", "connect", "subscribe", "publish"
        );
        for username in &self.order {
            if let Some(entry) = self.users.get(username) {
                let _ = writeln!(
                    out,
                    "{:<10} {:<14} {:<8} {:<50} {}",
                    username,
                    entry.password,
                    entry.can_connect,
                    entry.can_subscribe,
                    entry.can_publish
                );
            }
        }
        out
    }
}

//! Authentication simulator tests

use pretty_assertions::assert_eq;
use test_case::test_case;

use super::*;
use crate::config::default_users;

fn directory() -> UserDirectory {
    UserDirectory::new(&default_users())
}

#[test]
fn exact_pair_returns_token() {
    let dir = directory();
    assert_eq!(dir.token_for("leto", "sosecurity"), Some("powerfultoken"));
    assert_eq!(dir.token_for("user2", "wow"), Some("slaoejkauekalkew"));
}

#[test]
fn token_lookup_is_deterministic() {
    let dir = directory();
    for _ in 0..10 {
        assert_eq!(dir.token_for("leto", "sosecurity"), Some("powerfultoken"));
    }
}

#[test_case("nobody", "wow"; "unknown user")]
#[test_case("user1", "wrong"; "wrong password")]
#[test_case("user1", ""; "empty password")]
#[test_case("", ""; "empty pair")]
#[test_case("LETO", "sosecurity"; "username is case sensitive")]
#[test_case("leto", "Sosecurity"; "password is case sensitive")]
fn mismatches_return_none(username: &str, password: &str) {
    assert_eq!(directory().token_for(username, password), None);
}

#[test]
fn expired_token_user_still_logs_in() {
    // patient0 gets a token from the directory; only the gateway rejects it.
    let dir = directory();
    assert_eq!(dir.token_for("patient0", "suchpassword"), Some("imwrongtoken"));
}

#[test]
fn table_lists_every_user_with_password() {
    let dir = directory();
    let table = dir.render_table();
    for user in default_users() {
        assert!(table.contains(&user.username), "missing {}", user.username);
        assert!(table.contains(&user.password), "missing password of {}", user.username);
    }
}

#[test]
fn directory_size_matches_config() {
    let dir = directory();
    assert_eq!(dir.len(), 6);
    assert!(!dir.is_empty());
}

// Token store policy & format helpers
//
// Validity durations are domain constants of the upstream services,
// not tunables: callers needing different lifetimes must invalidate
// explicitly.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Access tokens are honored for one hour after issue.
pub const ACCESS_TOKEN_DURATION: Duration = Duration::from_secs(60 * 60);

/// A fetched homegraph snapshot is reused for 24 hours.
pub const HOMEGRAPH_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Canonical length of a generated android device identifier.
pub const ANDROID_ID_LENGTH: usize = 16;

/// Master tokens are fixed-shape: this prefix, this total length.
pub const MASTER_TOKEN_PREFIX: &str = "aas_et/";
pub const MASTER_TOKEN_LENGTH: usize = 216;

/// Length of a device-scoped local auth token.
pub const LOCAL_AUTH_TOKEN_LENGTH: usize = 108;

/// Whether a credential acquired at `acquired` has outlived `validity`
/// at `now`. Strict: exactly at the boundary the credential is still
/// valid.
pub fn has_expired(acquired: DateTime<Utc>, validity: Duration, now: DateTime<Utc>) -> bool {
    chrono::Duration::from_std(validity)
        .is_ok_and(|validity| now.signed_duration_since(acquired) > validity)
}

/// Whether `token` matches the master-token (AAS_ET) shape.
pub fn is_aas_et(token: &str) -> bool {
    token.starts_with(MASTER_TOKEN_PREFIX) && token.len() == MASTER_TOKEN_LENGTH
}

/// Whether `token` matches the local-auth-token shape.
pub fn is_local_auth_token(token: &str) -> bool {
    token.len() == LOCAL_AUTH_TOKEN_LENGTH
}

/// Escape a username for submission to the token exchanges: literal
/// `+` must travel as `%2B` (plus-addressed accounts).
pub fn escape_username(username: &str) -> String {
    username.replace('+', "%2B")
}

/// Redact a secret for log output: first character plus asterisks.
pub fn censor(secret: &str) -> String {
    let mut chars = secret.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let rest = chars.count();
            let mut censored = String::with_capacity(rest + 1);
            censored.push(first);
            for _ in 0..rest {
                censored.push('*');
            }
            censored
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn sample_master_token() -> String {
        format!("{MASTER_TOKEN_PREFIX}{}", "A".repeat(MASTER_TOKEN_LENGTH - MASTER_TOKEN_PREFIX.len()))
    }

    #[test]
    fn expired_strictly_after_validity() {
        let validity = Duration::from_secs(3600);
        let now = Utc::now();

        let fresh = now - TimeDelta::seconds(3599);
        assert!(!has_expired(fresh, validity, now));

        let stale = now - TimeDelta::seconds(3601);
        assert!(has_expired(stale, validity, now));
    }

    #[test]
    fn boundary_is_not_expired() {
        let validity = Duration::from_secs(3600);
        let now = Utc::now();
        let acquired = now - TimeDelta::seconds(3600);
        assert!(!has_expired(acquired, validity, now));
    }

    #[test]
    fn master_token_shape() {
        assert!(is_aas_et(&sample_master_token()));
        assert!(!is_aas_et("short"));
        assert!(!is_aas_et(&"A".repeat(MASTER_TOKEN_LENGTH)));
        assert!(!is_aas_et(&format!("{MASTER_TOKEN_PREFIX}too-short")));
    }

    #[test]
    fn local_auth_token_shape() {
        assert!(is_local_auth_token(&"x".repeat(LOCAL_AUTH_TOKEN_LENGTH)));
        assert!(!is_local_auth_token("x"));
    }

    #[test]
    fn plus_is_percent_encoded() {
        assert_eq!(escape_username("user+tag@x.com"), "user%2Btag@x.com");
        assert_eq!(escape_username("plain@x.com"), "plain@x.com");
        assert_eq!(escape_username("a+b+c"), "a%2Bb%2Bc");
    }

    #[test]
    fn censor_redacts_all_but_first() {
        assert_eq!(censor("secret"), "s*****");
        assert_eq!(censor("x"), "x");
        assert_eq!(censor(""), "");
    }
}

//! Username generation for externally provisioned accounts.
//!
//! Candidates look like `alic_x9q`: up to four characters derived from the
//! display name, an underscore, then random characters, at most
//! [`MAX_USERNAME_LEN`] in total.

use rand::Rng;
use tracing::debug;

use crate::directory::{DirectoryError, UserDirectory};

pub const USERNAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz_0123456789";
pub const MAX_USERNAME_LEN: usize = 12;

const PREFIX_CHARS: usize = 4;
const FALLBACK_PREFIX: &str = "user";

/// Random candidates tried before falling back to a counter suffix.
pub const MAX_RANDOM_ATTEMPTS: usize = 16;
const MAX_COUNTER: u32 = 10_000;

/// Name-derived prefix, underscore included.
pub fn username_prefix(display_name: &str) -> String {
    let stem: String = display_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(PREFIX_CHARS)
        .collect();

    if stem.is_empty() {
        format!("{FALLBACK_PREFIX}_")
    } else {
        format!("{stem}_")
    }
}

fn random_candidate(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let extra = rng.gen_range(1..=MAX_USERNAME_LEN - prefix.len());

    let mut out = String::with_capacity(MAX_USERNAME_LEN);
    out.push_str(prefix);
    for _ in 0..extra {
        let i = rng.gen_range(0..USERNAME_ALPHABET.len());
        out.push(USERNAME_ALPHABET[i] as char);
    }
    out
}

/// Produce a username that the directory reports as free.
///
/// Tries [`MAX_RANDOM_ATTEMPTS`] random candidates, then `<prefix><n>` for an
/// increasing `n`. Gives up with [`DirectoryError::Conflict`] only when that
/// space is exhausted too.
pub async fn generate_username(
    display_name: &str,
    users: &dyn UserDirectory,
) -> Result<String, DirectoryError> {
    let prefix = username_prefix(display_name);

    for _ in 0..MAX_RANDOM_ATTEMPTS {
        let candidate = random_candidate(&prefix);
        if !users.username_taken(&candidate).await? {
            return Ok(candidate);
        }
    }

    debug!(prefix = %prefix, "random usernames exhausted, using counter suffix");
    for n in 1..=MAX_COUNTER {
        let candidate = format!("{prefix}{n}");
        if candidate.len() > MAX_USERNAME_LEN {
            break;
        }
        if !users.username_taken(&candidate).await? {
            return Ok(candidate);
        }
    }

    Err(DirectoryError::Conflict(format!(
        "no free username for prefix '{prefix}'"
    )))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use inkwell_core::Email;
    use proptest::prelude::*;

    use super::*;
    use crate::Role;
    use crate::user::{NewUser, User};

    /// Reports the first `busy` candidates as taken.
    struct Crowded {
        busy: usize,
        asked: AtomicUsize,
    }

    impl Crowded {
        fn new(busy: usize) -> Self {
            Self {
                busy,
                asked: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UserDirectory for Crowded {
        async fn find_by_identifier(&self, _: &str) -> Result<Option<User>, DirectoryError> {
            Ok(None)
        }

        async fn find_by_email(&self, _: &Email) -> Result<Option<User>, DirectoryError> {
            Ok(None)
        }

        async fn username_taken(&self, _: &str) -> Result<bool, DirectoryError> {
            let n = self.asked.fetch_add(1, Ordering::SeqCst);
            Ok(n < self.busy)
        }

        async fn create_user(&self, _: NewUser) -> Result<User, DirectoryError> {
            Err(DirectoryError::Unavailable("read-only".to_string()))
        }

        async fn set_roles(&self, _: &str, _: Vec<Role>) -> Result<User, DirectoryError> {
            Err(DirectoryError::Unavailable("read-only".to_string()))
        }
    }

    fn well_formed(name: &str) -> bool {
        name.len() <= MAX_USERNAME_LEN
            && name.contains('_')
            && name.bytes().all(|b| USERNAME_ALPHABET.contains(&b))
    }

    #[test]
    fn prefix_from_display_name() {
        assert_eq!(username_prefix("Alice Smith"), "alic_");
        assert_eq!(username_prefix("Bo"), "bo_");
        assert_eq!(username_prefix("J. R. R."), "jrr_");
        assert_eq!(username_prefix("  "), "user_");
        assert_eq!(username_prefix("Żółć"), "user_");
    }

    #[test]
    fn random_candidates_respect_the_length_bound() {
        for _ in 0..200 {
            let c = random_candidate("alic_");
            assert!(c.starts_with("alic_"));
            assert!(c.len() > "alic_".len());
            assert!(well_formed(&c), "{c}");
        }
    }

    #[tokio::test]
    async fn first_free_candidate_wins() {
        let users = Crowded::new(0);
        let name = generate_username("Alice", &users).await.unwrap();
        assert!(name.starts_with("alic_"));
        assert_eq!(users.asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn falls_back_to_counter_after_random_attempts() {
        let users = Crowded::new(MAX_RANDOM_ATTEMPTS + 2);
        let name = generate_username("Alice", &users).await.unwrap();
        assert_eq!(name, "alic_3");
    }

    #[tokio::test]
    async fn gives_up_when_everything_is_taken() {
        let users = Crowded::new(usize::MAX);
        let err = generate_username("Alice", &users).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn terminates_with_a_free_candidate(
            busy in 0usize..200,
            display in "[A-Za-z ]{0,20}",
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let users = Crowded::new(busy);
            let name = rt.block_on(generate_username(&display, &users)).unwrap();

            prop_assert!(well_formed(&name), "{}", name);
            // The returned candidate is the first one reported free.
            prop_assert_eq!(users.asked.load(Ordering::SeqCst), busy + 1);
        }
    }
}

use std::collections::{HashMap, HashSet};

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::error;

use crate::config::AuthConfig;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"\W+").unwrap();
    // One lower-case entry per line.
    static ref COMMON_PASSWORDS: HashSet<&'static str> = include_str!("common-passwords.txt")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
}

/// Account attributes a password must not resemble.
#[derive(Debug, Clone, Copy)]
pub struct UserAttributes<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

impl<'a> UserAttributes<'a> {
    fn named(&self) -> [(&'static str, &'a str); 4] {
        [
            ("username", self.username),
            ("email address", self.email),
            ("first name", self.first_name),
            ("last name", self.last_name),
        ]
    }
}

/// Password strength rules applied at registration.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_similarity: f64,
}

impl From<&AuthConfig> for PasswordPolicy {
    fn from(cfg: &AuthConfig) -> Self {
        Self {
            min_length: cfg.password_min_length,
            max_similarity: cfg.password_max_similarity,
        }
    }
}

impl PasswordPolicy {
    /// Returns one message per violated rule; empty when the password is acceptable.
    pub fn validate(&self, password: &str, user: &UserAttributes<'_>) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some(attribute) = self.similar_attribute(password, user) {
            problems.push(format!("The password is too similar to the {attribute}."));
        }
        if password.chars().count() < self.min_length {
            problems.push(format!(
                "This password is too short. It must contain at least {} characters.",
                self.min_length
            ));
        }
        if COMMON_PASSWORDS.contains(password.trim().to_lowercase().as_str()) {
            problems.push("This password is too common.".to_string());
        }
        if !password.is_empty() && password.chars().all(char::is_numeric) {
            problems.push("This password is entirely numeric.".to_string());
        }

        problems
    }

    fn similar_attribute(&self, password: &str, user: &UserAttributes<'_>) -> Option<&'static str> {
        let password = password.to_lowercase();
        for (name, value) in user.named() {
            if value.is_empty() {
                continue;
            }
            let value = value.to_lowercase();
            let parts = NON_WORD
                .split(&value)
                .chain(std::iter::once(value.as_str()));
            for part in parts {
                if self.exceeds_length_ratio(&password, part) {
                    continue;
                }
                if quick_ratio(&password, part) >= self.max_similarity
                    && ratio(&password, part) >= self.max_similarity
                {
                    return Some(name);
                }
            }
        }
        None
    }

    // A very short attribute cannot meaningfully resemble a much longer password.
    fn exceeds_length_ratio(&self, password: &str, value: &str) -> bool {
        let pwd_len = password.chars().count() as f64;
        let value_len = value.chars().count() as f64;
        pwd_len >= 10.0 * value_len && value_len < self.max_similarity / 2.0 * pwd_len
    }
}

/// Upper bound on sequence similarity: shared characters, ignoring order.
fn quick_ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let mut available: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }
    let mut matches = 0usize;
    for c in a.chars() {
        if let Some(n) = available.get_mut(&c) {
            if *n > 0 {
                *n -= 1;
                matches += 1;
            }
        }
    }
    2.0 * matches as f64 / total as f64
}

/// Similarity as `2 * M / T`, where `M` counts the characters in matching
/// blocks found by repeatedly taking the longest common run and recursing on
/// either side of it.
fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut regions = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = regions.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            regions.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            regions.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common run within `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
/// Ties go to the run starting earliest in `a`, then earliest in `b`.
fn longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // run length ending at (i - 1, j), indexed by j - blo
    let mut prev = vec![0usize; bhi - blo];
    for i in alo..ahi {
        let mut row = vec![0usize; bhi - blo];
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let k = if j > blo { prev[j - blo - 1] + 1 } else { 1 };
            row[j - blo] = k;
            if k > best_k {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_k = k;
            }
        }
        prev = row;
    }
    (best_i, best_j, best_k)
}

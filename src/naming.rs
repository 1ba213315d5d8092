//! Storage-name generation for uploaded files.
//!
//! User-supplied filenames are sanitized down to a safe character set, then
//! prefixed with a random token so concurrent uploads of the same file never
//! overwrite each other.

use rand::Rng;
use std::path::{Path, PathBuf};

/// Length of the random storage-name prefix.
const TOKEN_LEN: usize = 12;

const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Strips everything that is not alphanumeric, underscore, or dot from a
/// user-supplied filename (leading/trailing whitespace included).
///
/// Pure; empty input yields empty output, and callers must reject an empty
/// result before using it as a storage name.
pub fn sanitize(original_name: &str) -> String {
    original_name
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}

fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_ALPHABET.len());
            TOKEN_ALPHABET[idx] as char
        })
        .collect()
}

/// Produces a storage name `<token>_<sanitized>` that does not collide with
/// an existing file in `directory`, regenerating the token while the
/// candidate path exists.
///
/// Check-then-create, not atomic: a concurrent creation between the check
/// and the caller's write is possible in principle, though the 36^12 token
/// space makes collisions negligible in practice. The loop has no retry cap
/// for the same reason.
pub fn generate_unique_name(original_name: &str, directory: &Path) -> (PathBuf, String) {
    generate_unique_name_with(original_name, directory, || random_token(TOKEN_LEN))
}

fn generate_unique_name_with(
    original_name: &str,
    directory: &Path,
    mut next_token: impl FnMut() -> String,
) -> (PathBuf, String) {
    let cleaned = sanitize(original_name);
    loop {
        let stored_name = format!("{}_{}", next_token(), cleaned);
        let candidate = directory.join(&stored_name);
        if !candidate.exists() {
            return (candidate, stored_name);
        }
    }
}

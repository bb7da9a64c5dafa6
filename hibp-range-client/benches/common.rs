use hibp_range_client::PasswordHash;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const ALL_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Generates a specified number of random passwords with uniform distribution.
/// Uses a fixed seed for reproducible benchmark results.
pub fn generate_random_passwords(count: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            let length = rng.gen_range(8..=64);
            (0..length)
                .map(|_| ALL_CHARS[rng.gen_range(0..ALL_CHARS.len())] as char)
                .collect()
        })
        .collect()
}

/// Builds a range body from the hash suffixes of `passwords`.
///
/// Roughly one line in ten is padding with a zero count, like the live API.
/// With `sorted` false the lines are shuffled.
pub fn range_body(passwords: &[String], sorted: bool) -> String {
    let mut rng = StdRng::seed_from_u64(7);
    let mut suffixes: Vec<_> = passwords.iter().map(|p| PasswordHash::new(p).suffix()).collect();

    suffixes.sort();
    suffixes.dedup();
    if !sorted {
        suffixes.shuffle(&mut rng);
    }

    suffixes
        .iter()
        .map(|suffix| {
            let count = if rng.gen_ratio(1, 10) { 0 } else { rng.gen_range(1..10_000) };
            format!("{suffix}:{count}\r\n")
        })
        .collect()
}

//! Random password generation
//!
//! Every generator returns exactly `length` characters. Randomness comes from
//! the OS CSPRNG.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Number of printable ASCII characters (0x20..=0x7E).
const PRINTABLE_COUNT: u8 = 95;

/// Variable-length password generator.
pub trait Generator {
    fn generate(&self, length: usize) -> String;
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf).expect("OS CSPRNG failed");
    buf
}

/// Repeats a single character. Not random; useful for testing sites' limits.
#[derive(Debug, Clone, Copy)]
pub struct Char(pub char);

impl Default for Char {
    fn default() -> Self {
        Char('a')
    }
}

impl Generator for Char {
    fn generate(&self, length: usize) -> String {
        std::iter::repeat(self.0).take(length).collect()
    }
}

/// Repeats a string, cut off at `length`. Not random.
///
/// The string must not be empty, or the result falls short of `length`.
#[derive(Debug, Clone)]
pub struct Str(pub String);

impl Generator for Str {
    fn generate(&self, length: usize) -> String {
        self.0.chars().cycle().take(length).collect()
    }
}

/// Random lowercase hexadecimal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hex;

impl Generator for Hex {
    fn generate(&self, length: usize) -> String {
        let mut hex: String = random_bytes(length.div_ceil(2))
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        hex.truncate(length);
        hex
    }
}

/// Random URL-safe base64 (`A-Z a-z 0-9 - _`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64;

impl Generator for Base64 {
    fn generate(&self, length: usize) -> String {
        // 3 bytes encode to 4 characters
        let bytes = random_bytes((length * 3).div_ceil(4));
        let mut encoded = URL_SAFE_NO_PAD.encode(bytes);
        encoded.truncate(length);
        encoded
    }
}

/// Random printable ASCII, space included.
#[derive(Debug, Clone, Copy, Default)]
pub struct Printable;

impl Generator for Printable {
    fn generate(&self, length: usize) -> String {
        // Reject bytes past the largest multiple of 95 to avoid modulo bias
        let limit = PRINTABLE_COUNT * 2;
        let mut out = String::with_capacity(length);
        while out.len() < length {
            for b in random_bytes(length - out.len() + 8) {
                if b < limit {
                    out.push(char::from(b' ' + b % PRINTABLE_COUNT));
                    if out.len() == length {
                        break;
                    }
                }
            }
        }
        out
    }
}

//! Protocol constants shared across the SDK.

/// Number of characters in a generated request nonce.
pub const NONCE_LENGTH: u32 = 32;

/// Alphabet a nonce draws its characters from: 66 printable, URL-safe characters.
pub(crate) const NONCE_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-._~";

/// Sign-ins older than this require re-authentication before account deletion.
pub const REAUTH_WINDOW_SECS: u64 = 60;

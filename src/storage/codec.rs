//! Record codec: deflate, then base64 so the result is a plain string value.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use std::io::{Read, Write};

pub fn compress(text: &str) -> String {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    if encoder.write_all(text.as_bytes()).is_err() {
        return text.to_string();
    }
    match encoder.finish() {
        Ok(bytes) => BASE64.encode(bytes),
        Err(_) => text.to_string(),
    }
}

/// `None` when `stored` is not something [`compress`] produced.
///
/// Empty notes are never stored, so an empty result means the input was not
/// a deflate stream (truncated streams can decode to nothing without error).
pub fn decompress(stored: &str) -> Option<String> {
    let bytes = BASE64.decode(stored.as_bytes()).ok()?;
    let mut decoder = DeflateDecoder::new(&bytes[..]);
    let mut text = String::new();
    decoder.read_to_string(&mut text).ok()?;
    if text.is_empty() {
        return None;
    }
    Some(text)
}

/// Decompress, or hand back the stored string untouched (legacy plain records).
pub fn decode_record(stored: &str) -> String {
    decompress(stored).unwrap_or_else(|| stored.to_string())
}

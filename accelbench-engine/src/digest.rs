//! Content digests for comparing objects across backends.
//!
//! Objects are compared by the MD5 of their *content*. When a payload travels
//! gzip-framed, the digest is computed over the decompressed bytes, so that an
//! origin and an accelerator which frame the same content differently still
//! produce the same digest. MD5 is used for change detection only.

use std::io::{self, Read};

use flate2::read::MultiGzDecoder;
use md5::{Digest, Md5};

use crate::error::{Error, Result};

const GZIP_ENCODING: &str = "gzip";
const GZIP_SUFFIX: &str = ".gz";

/// Size of the buffer used while streaming decompressed bytes into the hasher.
const DECODE_BUFFER_SIZE: usize = 8 * 1024;

/// Returns `true` if an object is to be treated as gzip-compressed.
///
/// This is the case when the encoding hint is `gzip` (case-insensitive), or the
/// key carries a `.gz` suffix regardless of the hint.
pub fn is_compressed(encoding: Option<&str>, key: &str) -> bool {
    encoding.is_some_and(|encoding| encoding.eq_ignore_ascii_case(GZIP_ENCODING))
        || key.ends_with(GZIP_SUFFIX)
}

/// Computes the canonical content digest of an object payload.
///
/// If [`is_compressed`] holds, the payload must be a gzip stream and the digest
/// covers the decompressed content of all its members, in order. A malformed stream yields
/// [`Error::Decode`]; there is no fallback to digesting the raw bytes.
pub fn normalize(bytes: &[u8], encoding: Option<&str>, key: &str) -> Result<String> {
    if is_compressed(encoding, key) {
        gunzip_md5(bytes).map_err(Error::Decode)
    } else {
        Ok(md5_hex(bytes))
    }
}

/// MD5 of the raw bytes, rendered as uppercase hex.
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:X}", Md5::digest(bytes))
}

fn gunzip_md5(bytes: &[u8]) -> io::Result<String> {
    let mut decoder = MultiGzDecoder::new(bytes);
    let mut hasher = Md5::new();
    let mut buf = vec![0; DECODE_BUFFER_SIZE];

    loop {
        let read = decoder.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(format!("{:X}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    const HELLO_MD5: &str = "5EB63BBBE01EEED093CB22BB8F5ACDC3";

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn digests_raw_bytes() {
        assert_eq!(normalize(b"hello world", None, "obj").unwrap(), HELLO_MD5);
    }

    #[test]
    fn gz_suffix_implies_gzip() {
        let compressed = gzip(b"hello world");
        assert_eq!(normalize(&compressed, None, "obj.gz").unwrap(), HELLO_MD5);
    }

    #[test]
    fn encoding_hint_is_case_insensitive() {
        let compressed = gzip(b"hello world");
        assert_eq!(normalize(&compressed, Some("GZip"), "obj").unwrap(), HELLO_MD5);
    }

    #[test]
    fn decompressed_and_compressed_digests_agree() {
        let contents = b"the quick brown fox jumps over the lazy dog".repeat(1000);
        let compressed = gzip(&contents);

        assert_eq!(
            normalize(&contents, Some("identity"), "k").unwrap(),
            normalize(&compressed, Some("gzip"), "k").unwrap(),
        );
    }

    #[test]
    fn concatenated_members_are_all_decoded() {
        let compressed = [gzip(b"hello "), gzip(b"world")].concat();
        assert_eq!(normalize(&compressed, Some("gzip"), "k").unwrap(), HELLO_MD5);
    }

    #[test]
    fn differences_in_later_members_are_detected() {
        let left = [gzip(b"hello "), gzip(b"world")].concat();
        let right = [gzip(b"hello "), gzip(b"there")].concat();
        assert_ne!(
            normalize(&left, Some("gzip"), "k").unwrap(),
            normalize(&right, Some("gzip"), "k").unwrap(),
        );
    }

    #[test]
    fn other_encodings_are_digested_raw() {
        let compressed = gzip(b"hello world");
        assert_eq!(
            normalize(&compressed, Some("br"), "obj").unwrap(),
            md5_hex(&compressed)
        );
    }

    #[test]
    fn malformed_gzip_is_a_decode_error() {
        let err = normalize(b"definitely not gzip", Some("gzip"), "obj").unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "unexpected error: {err:?}");
    }

    #[test]
    fn classifies_compression() {
        assert!(is_compressed(Some("gzip"), "a"));
        assert!(is_compressed(None, "a.gz"));
        assert!(!is_compressed(None, "a.gzip"));
        assert!(!is_compressed(Some("identity"), "a"));
    }
}

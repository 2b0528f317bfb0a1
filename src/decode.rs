use std::io::Read;

use flate2::read::GzDecoder;
use n0_error::e;

use crate::error::PrefetchError;

/// Decompresses a response body according to its declared content-encoding.
///
/// Gzip is the only recognized encoding. Anything else (including no
/// declaration) passes through unchanged: prefetching is best-effort, so an
/// unknown encoding is not worth failing over.
pub fn decode_body(body: &[u8], content_encoding: Option<&str>) -> Result<Vec<u8>, PrefetchError> {
    match content_encoding {
        Some(encoding) if encoding.eq_ignore_ascii_case("gzip") => {
            let mut decoded = Vec::with_capacity(body.len() * 2);
            GzDecoder::new(body)
                .read_to_end(&mut decoded)
                .map_err(|source| e!(PrefetchError::Decode { source }))?;
            Ok(decoded)
        }
        _ => Ok(body.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn gzip_round_trip() {
        let original = b"<html><body><a href=\"http://a.example/\">x</a></body></html>";
        let compressed = gzip(original);
        let decoded = decode_body(&compressed, Some("gzip")).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn unknown_encoding_passes_through() {
        let body = b"raw bytes, not compressed";
        assert_eq!(decode_body(body, Some("br")).unwrap(), body);
        assert_eq!(decode_body(body, None).unwrap(), body);
    }

    #[test]
    fn corrupt_gzip_fails() {
        assert!(decode_body(b"definitely not gzip", Some("gzip")).is_err());
    }

    #[test]
    fn encoding_match_is_case_insensitive() {
        let original = b"hello";
        let compressed = gzip(original);
        assert_eq!(decode_body(&compressed, Some("GZIP")).unwrap(), original);
    }
}

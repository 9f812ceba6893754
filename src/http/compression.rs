//! Response compression middleware (§4.I). Hand-written instead of
//! `tower_http::CompressionLayer` because the negotiation rule is specific:
//! parse the `Accept-Encoding` weighted-quality list, prefer brotli on a tie,
//! skip bodies under the configured threshold, and always set `Vary`.

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use std::io::Write;

use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Brotli,
    Gzip,
    Identity,
}

impl Encoding {
    fn token(self) -> &'static str {
        match self {
            Encoding::Brotli => "br",
            Encoding::Gzip => "gzip",
            Encoding::Identity => "identity",
        }
    }
}

/// Parses `Accept-Encoding` into `(encoding, q)` pairs, defaulting q to 1.0.
fn parse_accept_encoding(header: &str) -> Vec<(String, f32)> {
    header
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let mut parts = entry.split(';');
            let coding = parts.next()?.trim().to_ascii_lowercase();
            let q = parts
                .next()
                .and_then(|p| p.trim().strip_prefix("q="))
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((coding, q))
        })
        .collect()
}

/// Picks the best encoding to use for this response body: highest quality
/// wins, brotli wins a tie with gzip, `q=0` explicitly excludes a coding.
fn negotiate(header_value: Option<&HeaderValue>) -> Encoding {
    let Some(value) = header_value.and_then(|v| v.to_str().ok()) else {
        return Encoding::Identity;
    };
    let candidates = parse_accept_encoding(value);

    let weight_of = |name: &str| -> Option<f32> {
        candidates
            .iter()
            .find(|(coding, _)| coding == name)
            .map(|(_, q)| *q)
            .or_else(|| {
                candidates
                    .iter()
                    .find(|(coding, _)| coding == "*")
                    .map(|(_, q)| *q)
            })
    };

    let br_q = weight_of("br").unwrap_or(0.0);
    let gzip_q = weight_of("gzip").unwrap_or(0.0);

    if br_q <= 0.0 && gzip_q <= 0.0 {
        return Encoding::Identity;
    }
    if br_q >= gzip_q {
        Encoding::Brotli
    } else {
        Encoding::Gzip
    }
}

fn compress_gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

fn compress_brotli(body: &[u8]) -> Vec<u8> {
    let mut output = Vec::new();
    let params = brotli::enc::BrotliEncoderParams::default();
    let mut input = body;
    brotli::BrotliCompress(&mut input, &mut output, &params).expect("brotli compression failed");
    output
}

/// Compresses `response`'s body in place when the client accepts an encoding
/// this service supports and the body is at least `threshold_bytes`. Always
/// sets `Vary: Accept-Encoding`, compressed or not, so caches key on it.
pub async fn compress_response(
    response: Response,
    request_headers: &HeaderMap,
    threshold_bytes: usize,
) -> Response {
    let (mut parts, body) = response.into_parts();
    parts
        .headers
        .insert("vary", HeaderValue::from_static("accept-encoding"));

    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    if bytes.len() < threshold_bytes {
        return Response::from_parts(parts, Body::from(bytes));
    }

    let encoding = negotiate(request_headers.get("accept-encoding"));
    let compressed = match encoding {
        Encoding::Brotli => compress_brotli(&bytes),
        Encoding::Gzip => match compress_gzip(&bytes) {
            Ok(b) => b,
            Err(_) => return Response::from_parts(parts, Body::from(bytes)),
        },
        Encoding::Identity => return Response::from_parts(parts, Body::from(bytes)),
    };

    parts
        .headers
        .insert("content-encoding", HeaderValue::from_static(encoding.token()));
    parts.headers.remove("content-length");
    metrics::increment_compressed_response(encoding.token());
    Response::from_parts(parts, Body::from(compressed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_prefers_brotli_on_tie() {
        let header = HeaderValue::from_static("gzip;q=1.0, br;q=1.0");
        assert_eq!(negotiate(Some(&header)), Encoding::Brotli);
    }

    #[test]
    fn negotiate_picks_higher_quality_gzip() {
        let header = HeaderValue::from_static("br;q=0.2, gzip;q=0.9");
        assert_eq!(negotiate(Some(&header)), Encoding::Gzip);
    }

    #[test]
    fn negotiate_falls_back_to_identity_without_header() {
        assert_eq!(negotiate(None), Encoding::Identity);
    }

    #[test]
    fn negotiate_respects_zero_quality_exclusion() {
        let header = HeaderValue::from_static("br;q=0, gzip;q=0");
        assert_eq!(negotiate(Some(&header)), Encoding::Identity);
    }

    #[test]
    fn parse_accept_encoding_defaults_missing_q_to_one() {
        let parsed = parse_accept_encoding("gzip, br;q=0.5");
        assert_eq!(parsed[0], ("gzip".to_string(), 1.0));
        assert_eq!(parsed[1], ("br".to_string(), 0.5));
    }
}

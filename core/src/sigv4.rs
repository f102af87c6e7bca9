//! AWS Signature Version 4 request signing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::config::AwsCredentials;
use crate::errors::{KbChatError, KbChatResult};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Who signs, for which service, and when
#[derive(Debug, Clone)]
pub struct SigningParams<'a> {
    pub credentials: &'a AwsCredentials,
    pub region: &'a str,
    pub service: &'a str,
    pub timestamp: DateTime<Utc>,
}

/// The parts of an HTTP request covered by the signature
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    /// Headers that must be signed besides host and the x-amz-* ones
    pub headers: &'a [(&'a str, &'a str)],
    pub payload: &'a [u8],
}

/// Computes the headers to attach to `request`: `authorization`,
/// `x-amz-date`, `x-amz-content-sha256` and, with temporary credentials,
/// `x-amz-security-token`.
pub fn sign(
    request: &SignableRequest<'_>,
    params: &SigningParams<'_>,
) -> KbChatResult<Vec<(String, String)>> {
    let amz_date = params.timestamp.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = params.timestamp.format("%Y%m%d").to_string();
    let payload_hash = hex::encode(Sha256::digest(request.payload));

    let host = host_header(request.url)?;

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    headers.push(("host".to_string(), host));
    headers.push(("x-amz-date".to_string(), amz_date.clone()));
    headers.push(("x-amz-content-sha256".to_string(), payload_hash.clone()));
    if let Some(token) = &params.credentials.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method.to_ascii_uppercase(),
        canonical_uri(request.url),
        canonical_query(request.url),
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, params.region, params.service
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = derive_signing_key(
        &params.credentials.secret_access_key,
        &date_stamp,
        params.region,
        params.service,
    )?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    let mut out = vec![
        (
            "authorization".to_string(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, params.credentials.access_key_id, scope, signed_headers, signature
            ),
        ),
        ("x-amz-date".to_string(), amz_date),
        ("x-amz-content-sha256".to_string(), payload_hash),
    ];
    if let Some(token) = &params.credentials.session_token {
        out.push(("x-amz-security-token".to_string(), token.clone()));
    }

    Ok(out)
}

/// Derives the per-day, per-region, per-service signing key
pub fn derive_signing_key(
    secret_access_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> KbChatResult<Vec<u8>> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_access_key).as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> KbChatResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| KbChatError::ConfigError(format!("Invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn host_header(url: &Url) -> KbChatResult<String> {
    let host = url.host_str().ok_or_else(|| {
        KbChatError::ConfigError(format!("Endpoint URL has no host: {}", url))
    })?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Non-S3 services sign each path segment encoded twice; `Url` already
/// holds the path encoded once.
fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            (
                urlencoding::encode(&k).into_owned(),
                urlencoding::encode(&v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn credentials(token: Option<&str>) -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: token.map(str::to_string),
        }
    }

    fn sign_body(creds: &AwsCredentials, body: &[u8]) -> Vec<(String, String)> {
        let url = Url::parse(
            "https://bedrock-agent-runtime.us-east-1.amazonaws.com/retrieveAndGenerate",
        )
        .unwrap();
        let request = SignableRequest {
            method: "POST",
            url: &url,
            headers: &[("Content-Type", "application/json")],
            payload: body,
        };
        let params = SigningParams {
            credentials: creds,
            region: "us-east-1",
            service: "bedrock",
            timestamp: Utc.with_ymd_and_hms(2024, 6, 20, 12, 30, 0).unwrap(),
        };
        sign(&request, &params).unwrap()
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> &'a str {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn test_signing_key_matches_published_example() {
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_authorization_header_layout() {
        let headers = sign_body(&credentials(None), b"{}");
        let auth = header(&headers, "authorization");

        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240620/us-east-1/bedrock/aws4_request, "
        ));
        assert!(auth.contains(
            "SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date, "
        ));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(header(&headers, "x-amz-date"), "20240620T123000Z");
        // SHA-256 of "{}"
        assert_eq!(
            header(&headers, "x-amz-content-sha256"),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert!(!headers.iter().any(|(k, _)| k == "x-amz-security-token"));
    }

    #[test]
    fn test_signature_matches_reference_value() {
        let headers = sign_body(&credentials(None), br#"{"input":{"text":"hi"}}"#);
        assert_eq!(
            header(&headers, "authorization"),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240620/us-east-1/bedrock/aws4_request, \
             SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date, \
             Signature=73983ee45fe25a0e97ba4267a29931da696b76303051c8e79979eb6e9d98fb5b"
        );
    }

    #[test]
    fn test_session_token_is_signed_and_sent() {
        let headers = sign_body(&credentials(Some("token123")), b"{}");
        assert_eq!(header(&headers, "x-amz-security-token"), "token123");
        assert!(header(&headers, "authorization")
            .contains("x-amz-date;x-amz-security-token, Signature="));
    }

    #[test]
    fn test_signature_depends_on_payload() {
        let creds = credentials(None);
        let a = sign_body(&creds, br#"{"input":{"text":"a"}}"#);
        let b = sign_body(&creds, br#"{"input":{"text":"b"}}"#);
        let again = sign_body(&creds, br#"{"input":{"text":"a"}}"#);

        assert_ne!(header(&a, "authorization"), header(&b, "authorization"));
        assert_eq!(header(&a, "authorization"), header(&again, "authorization"));
    }

    #[test]
    fn test_canonical_parts() {
        let url = Url::parse("http://127.0.0.1:8080/a%20b/c?z=1&a=x y").unwrap();
        assert_eq!(host_header(&url).unwrap(), "127.0.0.1:8080");
        assert_eq!(canonical_uri(&url), "/a%2520b/c");
        assert_eq!(canonical_query(&url), "a=x%20y&z=1");

        let reserved = Url::parse("https://example.amazonaws.com/kb:1/run").unwrap();
        assert_eq!(canonical_uri(&reserved), "/kb%3A1/run");

        let bare = Url::parse("https://example.amazonaws.com").unwrap();
        assert_eq!(host_header(&bare).unwrap(), "example.amazonaws.com");
        assert_eq!(canonical_uri(&bare), "/");
        assert_eq!(canonical_query(&bare), "");
    }
}

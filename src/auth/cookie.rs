use axum::http::{
    header::{self, InvalidHeaderValue},
    HeaderMap, HeaderValue,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// How the session cookie is named, signed and scoped.
#[derive(Clone)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,
    /// HMAC key for the session id signature.
    pub secret: Vec<u8>,
    /// Adds the `Secure` attribute.
    pub secure: bool,
    /// `Max-Age` of the cookie, equal to the session lifetime.
    pub max_age: Duration,
}

impl std::fmt::Debug for CookieConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieConfig")
            .field("name", &self.name)
            .field("secure", &self.secure)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl CookieConfig {
    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("hmac accepts any key length"),
        }
    }

    /// Cookie value for a session id: `<id>.<hex signature>`.
    pub fn sign(&self, session_id: &str) -> String {
        let mut mac = self.mac();
        mac.update(session_id.as_bytes());
        let tag = mac.finalize().into_bytes();
        format!("{}.{}", session_id, hex::encode(tag))
    }

    /// Recover the session id from a cookie value if the signature holds.
    pub fn unsign<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (session_id, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(session_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(session_id)
    }

    /// The signed session id carried by a request, if any. When several
    /// cookies share the name, the first one with a valid signature wins.
    pub fn session_id_from(&self, headers: &HeaderMap) -> Option<String> {
        let mut presented = false;
        for (_, value) in cookie_pairs(headers).filter(|(name, _)| *name == self.name) {
            presented = true;
            if let Some(id) = self.unsign(value) {
                return Some(id.to_string());
            }
        }
        if presented {
            tracing::debug!("session cookie with a bad signature");
        }
        None
    }

    fn attributes(&self, max_age: u64) -> String {
        let mut attributes = format!("Path=/; Max-Age={}; HttpOnly; SameSite=Strict", max_age);
        if self.secure {
            attributes.push_str("; Secure");
        }
        attributes
    }

    /// `Set-Cookie` value handing a session to the client.
    pub fn set_cookie(&self, session_id: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let value = format!(
            "{}={}; {}",
            self.name,
            self.sign(session_id),
            self.attributes(self.max_age.as_secs())
        );
        HeaderValue::from_str(&value)
    }

    /// `Set-Cookie` value telling the client to drop the cookie.
    pub fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!("{}=; {}", self.name, self.attributes(0)))
    }
}

/// Every `name=value` pair of the cookie headers, in request order.
fn cookie_pairs(headers: &HeaderMap) -> impl Iterator<Item = (&str, &str)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|cookie_str| cookie_str.split(';'))
        .filter_map(|cookie_pair| cookie_pair.trim().split_once('='))
}

/// Create a HashMap with the content of the cookie headers.
pub fn get_cookie_map(headers: &HeaderMap) -> HashMap<String, String> {
    cookie_pairs(headers)
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secure: bool) -> CookieConfig {
        CookieConfig {
            name: "afternoon".into(),
            secret: b"test secret".to_vec(),
            secure,
            max_age: Duration::from_secs(300),
        }
    }

    #[test]
    fn should_round_trip_signed_id() {
        let config = config(false);
        let value = config.sign("abc123");
        assert!(value.starts_with("abc123."));
        assert_eq!(config.unsign(&value), Some("abc123"));
    }

    #[test]
    fn should_reject_tampered_or_foreign_signature() {
        let config = config(false);
        let value = config.sign("abc123");
        let forged = value.replacen("abc123", "abc124", 1);
        assert_eq!(config.unsign(&forged), None);
        assert_eq!(config.unsign("abc123"), None);
        assert_eq!(config.unsign("abc123.zz"), None);

        let other = CookieConfig {
            secret: b"another secret".to_vec(),
            ..config.clone()
        };
        assert_eq!(other.unsign(&value), None);
    }

    #[test]
    fn should_build_set_cookie_headers() {
        let value = config(false).set_cookie("abc").unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("afternoon=abc."));
        assert!(value.contains("Max-Age=300"));
        assert!(value.contains("HttpOnly"));
        assert!(!value.contains("Secure"));

        let secure = config(true).set_cookie("abc").unwrap();
        assert!(secure.to_str().unwrap().ends_with("; Secure"));

        let cleared = config(false).clear_cookie().unwrap();
        assert!(cleared.to_str().unwrap().starts_with("afternoon=; "));
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn should_parse_cookies_from_requests() {
        // No cookies header
        let mut headers = HeaderMap::new();
        headers.insert("X-Custom-Foo", HeaderValue::from_static("Bar"));
        assert!(get_cookie_map(&headers).is_empty());

        // Multiple cookies in header, one malformed pair
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static(
                "guest_id=5356763797944027; \
                ct0=9e6eef8649dfec837a; \
                broken; \
                lang=en",
            ),
        );
        let cookie_map = get_cookie_map(&headers);
        assert_eq!(
            cookie_map.get("guest_id"),
            Some(&"5356763797944027".to_string())
        );
        assert_eq!(
            cookie_map.get("ct0"),
            Some(&"9e6eef8649dfec837a".to_string())
        );
        assert_eq!(cookie_map.get("lang"), Some(&"en".to_string()));
        assert_eq!(cookie_map.len(), 3);
    }

    #[test]
    fn should_extract_session_id_from_headers() {
        let config = config(false);
        let mut headers = HeaderMap::new();
        let cookie = format!("lang=en; afternoon={}", config.sign("sid42"));
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        assert_eq!(config.session_id_from(&headers), Some("sid42".to_string()));

        headers.insert(header::COOKIE, HeaderValue::from_static("afternoon=sid42.00"));
        assert_eq!(config.session_id_from(&headers), None);
    }

    #[test]
    fn should_pick_valid_cookie_among_duplicates() {
        let config = config(false);
        let signed = config.sign("sid42");

        let mut headers = HeaderMap::new();
        let cookie = format!("afternoon=stale.00; afternoon={}", signed);
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        assert_eq!(config.session_id_from(&headers), Some("sid42".to_string()));

        let cookie = format!("afternoon={}; afternoon=stale.00", signed);
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        assert_eq!(config.session_id_from(&headers), Some("sid42".to_string()));

        let first = HeaderValue::from_str(&format!("afternoon={}", signed)).unwrap();
        let second = HeaderValue::from_str(&format!("afternoon={}", config.sign("other"))).unwrap();
        headers.insert(header::COOKIE, first);
        headers.append(header::COOKIE, second);
        assert_eq!(config.session_id_from(&headers), Some("sid42".to_string()));
    }
}

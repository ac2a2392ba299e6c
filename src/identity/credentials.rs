use base64::Engine;
use std::fmt;

/// `login:secret` pair carried by an HTTP Basic `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("login", &self.login).field("secret", &"<redacted>").finish()
    }
}

/// Parse a raw `Authorization` header value. Returns `None` when the header is
/// missing, uses another scheme, or does not decode to UTF-8 `login:secret`.
pub fn extract_credentials(header: Option<&str>) -> Option<Credentials> {
    let raw = header?.trim();
    let (scheme, rest) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") { return None; }
    let decoded = base64::engine::general_purpose::STANDARD.decode(rest.trim_start()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (login, secret) = text.split_once(':')?;
    Some(Credentials { login: login.to_string(), secret: secret.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(pair: &str) -> String {
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(pair))
    }

    #[test]
    fn parses_basic_header() {
        let c = extract_credentials(Some(&basic("joe@smith.com:joepassword"))).unwrap();
        assert_eq!(c.login, "joe@smith.com");
        assert_eq!(c.secret, "joepassword");
    }

    #[test]
    fn scheme_is_case_insensitive_and_spacing_tolerant() {
        let enc = base64::engine::general_purpose::STANDARD.encode("a:b");
        assert!(extract_credentials(Some(&format!("basic {enc}"))).is_some());
        assert!(extract_credentials(Some(&format!("BASIC   {enc}"))).is_some());
    }

    #[test]
    fn secret_may_contain_colons() {
        let c = extract_credentials(Some(&basic("sally@jones.com:pa:ss:word"))).unwrap();
        assert_eq!(c.login, "sally@jones.com");
        assert_eq!(c.secret, "pa:ss:word");
    }

    #[test]
    fn absent_or_malformed_headers_yield_none() {
        assert!(extract_credentials(None).is_none());
        assert!(extract_credentials(Some("")).is_none());
        assert!(extract_credentials(Some("Basic")).is_none());
        assert!(extract_credentials(Some("Bearer abc.def.ghi")).is_none());
        assert!(extract_credentials(Some("Basic !!!not-base64!!!")).is_none());
        assert!(extract_credentials(Some(&basic("no-colon-here"))).is_none());
        let invalid_utf8 = format!("Basic {}", base64::engine::general_purpose::STANDARD.encode([0xff, 0xfe, b':', b'x']));
        assert!(extract_credentials(Some(&invalid_utf8)).is_none());
    }

    #[test]
    fn debug_redacts_secret() {
        let c = extract_credentials(Some(&basic("joe@smith.com:hunter2"))).unwrap();
        let shown = format!("{c:?}");
        assert!(shown.contains("joe@smith.com"));
        assert!(!shown.contains("hunter2"));
    }
}

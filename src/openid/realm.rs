//! Realm and `return_to` validation.
//!
//! A realm is a URL pattern identifying the relying party; `return_to` must
//! fall inside it before the provider asks the user to trust anything.
//! <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.9.2>

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum RealmError {
    #[error("the realm is not a valid url")]
    RealmNotAUrl,
    #[error("the realm must not contain a fragment")]
    FragmentInRealm,
    #[error("the realm scheme must be http or https")]
    UnsupportedScheme,
    #[error("the realm is missing a host")]
    MissingHost,
    #[error("the return_to url is not a valid url")]
    ReturnToNotAUrl,
    #[error("the return_to scheme doesn't match the realm")]
    SchemeMismatch,
    #[error("the return_to port doesn't match the realm")]
    PortMismatch,
    #[error("the return_to host is not covered by the realm")]
    HostMismatch,
    #[error("the return_to path is outside the realm path")]
    PathOutsideRealm,
    #[error("the request carries neither realm nor return_to")]
    MissingRelyingParty,
}

/// A parsed realm, with the `*.` wildcard marker split off the host.
#[derive(Debug)]
pub(crate) struct Realm {
    url: Url,
    host: String,
    wildcard: bool,
}

impl Realm {
    pub(crate) fn parse(realm: &str) -> Result<Realm, RealmError> {
        // `*` is not a valid host character, so the wildcard marker has to
        // come off before URL parsing.
        let (text, wildcard) = match realm.split_once("://") {
            Some((scheme, rest)) if rest.starts_with("*.") => {
                (format!("{scheme}://{}", &rest[2..]), true)
            }
            _ => (realm.to_string(), false),
        };

        let url = Url::parse(&text).map_err(|_| RealmError::RealmNotAUrl)?;
        if url.fragment().is_some() {
            return Err(RealmError::FragmentInRealm);
        }
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RealmError::UnsupportedScheme);
        }
        let host = url
            .host_str()
            .ok_or(RealmError::MissingHost)?
            .to_string();

        Ok(Realm { url, host, wildcard })
    }

    /// Check that `return_to` falls inside this realm.
    ///
    /// Scheme and port must be equal, the path must be the realm path or a
    /// sub-path of it, and the host must match exactly. A wildcard realm
    /// `*.example.com` matches proper subdomains only; the bare
    /// `example.com` is not covered by it.
    pub(crate) fn validate_return_to(&self, return_to: &str) -> Result<(), RealmError> {
        let url = Url::parse(return_to).map_err(|_| RealmError::ReturnToNotAUrl)?;

        if url.scheme() != self.url.scheme() {
            return Err(RealmError::SchemeMismatch);
        }
        if url.port_or_known_default() != self.url.port_or_known_default() {
            return Err(RealmError::PortMismatch);
        }

        let host = url.host_str().ok_or(RealmError::HostMismatch)?;
        let host_ok = if self.wildcard {
            host.ends_with(&format!(".{}", self.host))
        } else {
            host == self.host
        };
        if !host_ok {
            return Err(RealmError::HostMismatch);
        }

        if !path_covers(self.url.path(), url.path()) {
            return Err(RealmError::PathOutsideRealm);
        }
        Ok(())
    }
}

/// The return_to path must equal the realm path or live under it.
fn path_covers(realm_path: &str, return_to_path: &str) -> bool {
    if realm_path == return_to_path {
        return true;
    }
    if realm_path.ends_with('/') {
        return_to_path.starts_with(realm_path)
    } else {
        return_to_path.starts_with(&format!("{realm_path}/"))
    }
}

/// Validate the relying party parameters of a checkid request.
///
/// At least one of `realm` and `return_to` must be present; a missing realm
/// defaults to `return_to`.
pub(crate) fn validate_relying_party(
    realm: Option<&str>,
    return_to: Option<&str>,
) -> Result<(), RealmError> {
    let realm_text = realm.or(return_to).ok_or(RealmError::MissingRelyingParty)?;
    let realm = Realm::parse(realm_text)?;
    if let Some(return_to) = return_to {
        realm.validate_return_to(return_to)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wildcard_realm_accepts_subdomain() -> Result<(), RealmError> {
        let realm = Realm::parse("http://*.example.com/app")?;
        realm.validate_return_to("http://a.example.com/app/cb")
    }

    #[test]
    fn wildcard_realm_rejects_apex_and_foreign_hosts() -> Result<(), RealmError> {
        let realm = Realm::parse("http://*.example.com/app")?;
        assert_eq!(
            realm.validate_return_to("http://example.com/app/cb"),
            Err(RealmError::HostMismatch)
        );
        assert_eq!(
            realm.validate_return_to("http://evil.com/app/cb"),
            Err(RealmError::HostMismatch)
        );
        assert_eq!(
            realm.validate_return_to("http://notexample.com/app/cb"),
            Err(RealmError::HostMismatch)
        );
        Ok(())
    }

    #[test]
    fn exact_host_must_match_without_wildcard() -> Result<(), RealmError> {
        let realm = Realm::parse("http://example.com/")?;
        realm.validate_return_to("http://example.com/cb")?;
        assert_eq!(
            realm.validate_return_to("http://a.example.com/cb"),
            Err(RealmError::HostMismatch)
        );
        Ok(())
    }

    #[test]
    fn path_must_be_covered() -> Result<(), RealmError> {
        let realm = Realm::parse("http://example.com/app")?;
        realm.validate_return_to("http://example.com/app")?;
        realm.validate_return_to("http://example.com/app/cb")?;
        assert_eq!(
            realm.validate_return_to("http://example.com/apple"),
            Err(RealmError::PathOutsideRealm)
        );
        assert_eq!(
            realm.validate_return_to("http://example.com/other"),
            Err(RealmError::PathOutsideRealm)
        );
        Ok(())
    }

    #[test]
    fn root_realm_covers_everything_on_the_host() -> Result<(), RealmError> {
        let realm = Realm::parse("http://localhost/")?;
        realm.validate_return_to("http://localhost/here")
    }

    #[test]
    fn scheme_and_port_must_match() -> Result<(), RealmError> {
        let realm = Realm::parse("http://example.com/")?;
        assert_eq!(
            realm.validate_return_to("https://example.com/cb"),
            Err(RealmError::SchemeMismatch)
        );
        assert_eq!(
            realm.validate_return_to("http://example.com:8080/cb"),
            Err(RealmError::PortMismatch)
        );
        // an explicit default port is the same port
        realm.validate_return_to("http://example.com:80/cb")?;
        Ok(())
    }

    #[test]
    fn fragment_and_bad_schemes_are_rejected() {
        assert!(matches!(
            Realm::parse("http://example.com/#frag"),
            Err(RealmError::FragmentInRealm)
        ));
        assert!(matches!(
            Realm::parse("ftp://example.com/"),
            Err(RealmError::UnsupportedScheme)
        ));
        assert!(matches!(
            Realm::parse("not a url"),
            Err(RealmError::RealmNotAUrl)
        ));
    }

    #[test]
    fn relying_party_needs_realm_or_return_to() {
        assert_eq!(
            validate_relying_party(None, None),
            Err(RealmError::MissingRelyingParty)
        );
        assert!(validate_relying_party(None, Some("http://localhost/here")).is_ok());
        assert!(validate_relying_party(Some("http://localhost/"), None).is_ok());
        assert!(
            validate_relying_party(Some("http://localhost/"), Some("http://localhost/here"))
                .is_ok()
        );
    }
}

//! Discovery documents for the provider endpoint.
//!
//! A relying party resolving an identifier fetches the endpoint and content
//! negotiation decides between an XRDS document and an HTML page with
//! `openid2.*` link tags.
//! <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.7.3>

use super::constants::{AX_NAMESPACE, OPENID_PROVIDER_IDENTIFIER, OPENID_SIGNON_IDENTIFIER};

/// Which representation the `Accept` header asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DiscoveryDoc {
    Xrds,
    Html,
}

/// Pick the discovery representation, or `None` for 406.
///
/// An absent header counts as `*/*`. Ties go to XRDS, which every OpenID 2.0
/// relying party understands.
pub(crate) fn negotiate(accept: Option<&str>) -> Option<DiscoveryDoc> {
    let accept = accept.unwrap_or("*/*");
    let xrds = quality_for(accept, "application", "xrds+xml");
    let html = quality_for(accept, "text", "html");

    if xrds <= 0.0 && html <= 0.0 {
        None
    } else if xrds >= html {
        Some(DiscoveryDoc::Xrds)
    } else {
        Some(DiscoveryDoc::Html)
    }
}

/// Quality the header assigns to `type/subtype`, taking the q-value of the
/// most specific media range that covers it.
fn quality_for(accept: &str, media_type: &str, subtype: &str) -> f32 {
    let mut best = 0.0f32;
    let mut best_specificity = 0u8;

    for item in accept.split(',') {
        let mut parts = item.split(';');
        let range = parts.next().unwrap_or("").trim();
        let mut quality = 1.0f32;
        for param in parts {
            if let Some(value) = param.trim().strip_prefix("q=") {
                quality = value.parse().unwrap_or(0.0);
            }
        }

        let Some((t, s)) = range.split_once('/') else {
            continue;
        };
        let specificity = if t == media_type && s == subtype {
            3
        } else if t == media_type && s == "*" {
            2
        } else if t == "*" && s == "*" {
            1
        } else {
            continue;
        };

        if specificity > best_specificity {
            best_specificity = specificity;
            best = quality;
        }
    }
    best
}

/// The XRDS document for the endpoint itself (no identity) or for a user's
/// claimed identifier.
pub(crate) fn xrds_document(endpoint: &str, identity: Option<&str>) -> String {
    let service_type = match identity {
        Some(_) => OPENID_SIGNON_IDENTIFIER,
        None => OPENID_PROVIDER_IDENTIFIER,
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)">
    <XRD>
        <Service priority="0">
            <Type>{service_type}</Type>
            <Type>{AX_NAMESPACE}</Type>
            <URI>{}</URI>
        </Service>
    </XRD>
</xrds:XRDS>
"#,
        escape_xml(endpoint)
    )
}

/// The HTML fallback with `openid2.provider` (and, for user discovery,
/// `openid2.local_id`) link tags in the head.
pub(crate) fn html_document(endpoint: &str, identity: Option<&str>) -> String {
    let mut links = format!(
        r#"<link rel="openid2.provider" href="{}">"#,
        escape_xml(endpoint)
    );
    if let Some(identity) = identity {
        let local_id = format!(
            "{endpoint}?{}",
            url::form_urlencoded::Serializer::new(String::new())
                .append_pair("u", identity)
                .finish()
        );
        links.push_str(&format!(
            "\n        <link rel=\"openid2.local_id\" href=\"{}\">",
            escape_xml(&local_id)
        ));
    }
    format!(
        r#"<!DOCTYPE html>
<html>
    <head>
        {links}
        <title>OpenID Provider</title>
    </head>
    <body></body>
</html>
"#
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod test {
    use anyhow::Context;

    use super::*;

    const ENDPOINT: &str = "http://op.example/openid";

    fn service_texts(xml: &str, tag: &str) -> anyhow::Result<Vec<String>> {
        let doc = roxmltree::Document::parse(xml).context("couldn't parse emitted xrds")?;
        Ok(doc
            .descendants()
            .filter(|node| node.tag_name().name() == tag)
            .filter_map(|node| node.text().map(str::to_string))
            .collect())
    }

    #[test]
    fn server_xrds_advertises_the_endpoint() -> anyhow::Result<()> {
        let xml = xrds_document(ENDPOINT, None);

        assert_eq!(
            service_texts(&xml, "Type")?,
            vec![
                "http://specs.openid.net/auth/2.0/server".to_string(),
                "http://openid.net/srv/ax/1.0".to_string(),
            ]
        );
        assert_eq!(service_texts(&xml, "URI")?, vec![ENDPOINT.to_string()]);

        let doc = roxmltree::Document::parse(&xml)?;
        assert_eq!(doc.root_element().tag_name().name(), "XRDS");
        assert_eq!(
            doc.root_element().tag_name().namespace(),
            Some("xri://$xrds")
        );
        Ok(())
    }

    #[test]
    fn signon_xrds_uses_the_signon_type() -> anyhow::Result<()> {
        let xml = xrds_document(ENDPOINT, Some("charlie"));

        let types = service_texts(&xml, "Type")?;
        assert!(types.contains(&"http://specs.openid.net/auth/2.0/signon".to_string()));
        assert!(!types.contains(&"http://specs.openid.net/auth/2.0/server".to_string()));
        Ok(())
    }

    #[test]
    fn html_document_links_the_provider() {
        let html = html_document(ENDPOINT, None);
        assert!(html.contains(r#"<link rel="openid2.provider" href="http://op.example/openid">"#));
        assert!(!html.contains("openid2.local_id"));
    }

    #[test]
    fn html_user_discovery_adds_the_local_id() {
        let html = html_document(ENDPOINT, Some("bob@example.com"));
        assert!(html.contains(r#"<link rel="openid2.provider" href="http://op.example/openid">"#));
        assert!(html.contains(
            r#"<link rel="openid2.local_id" href="http://op.example/openid?u=bob%40example.com">"#
        ));
    }

    #[test]
    fn negotiation_prefers_the_explicit_type() {
        assert_eq!(negotiate(Some("application/xrds+xml")), Some(DiscoveryDoc::Xrds));
        assert_eq!(negotiate(Some("text/html")), Some(DiscoveryDoc::Html));
        assert_eq!(
            negotiate(Some("text/html,application/xrds+xml;q=0.9")),
            Some(DiscoveryDoc::Html)
        );
        assert_eq!(
            negotiate(Some("text/html;q=0.8,application/xrds+xml")),
            Some(DiscoveryDoc::Xrds)
        );
    }

    #[test]
    fn negotiation_falls_back_to_xrds_for_wildcards() {
        assert_eq!(negotiate(None), Some(DiscoveryDoc::Xrds));
        assert_eq!(negotiate(Some("*/*")), Some(DiscoveryDoc::Xrds));
        assert_eq!(negotiate(Some("text/*")), Some(DiscoveryDoc::Html));
    }

    #[test]
    fn negotiation_rejects_unrelated_types() {
        assert_eq!(negotiate(Some("image/png")), None);
        assert_eq!(negotiate(Some("application/json;q=1.0")), None);
    }
}

//! Parsing and serialization of OpenID protocol messages.
//!
//! A [`Message`] is a mapping from bare field names (no `openid.` prefix) to
//! string values. Messages arrive either as `openid.*` query parameters
//! (indirect requests) or as `application/x-www-form-urlencoded` POST bodies
//! (direct requests), and leave either as `openid.*` query parameters on a
//! redirect or as key-value form bodies.
//!
//! Key-value form: one field per line, `<key>:<value>\n`.
//! <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.4.1.1>

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::constants::{AX_MODE_FETCH_REQUEST, FORM_CONTENT_TYPE, OPENID_FIELD_PREFIX};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    fields: BTreeMap<String, String>,
}

impl Message {
    pub(crate) fn new() -> Message {
        Message::default()
    }

    /// Collect the `openid.*` parameters of a query string, prefix stripped.
    ///
    /// Extension fields keep their dotted sub-keys, so `openid.ax1.type.email`
    /// becomes `ax1.type.email`.
    pub(crate) fn from_query(query: &str) -> Message {
        let fields = url::form_urlencoded::parse(query.as_bytes())
            .filter_map(|(key, value)| {
                let key = key.strip_prefix(OPENID_FIELD_PREFIX)?;
                Some((key.to_string(), value.into_owned()))
            })
            .collect();
        Message { fields }
    }

    /// Parse a direct request body.
    ///
    /// Direct requests are `application/x-www-form-urlencoded` with the same
    /// `openid.*` keys as an indirect query string. Any other content type
    /// yields an empty message, which the engine rejects for lack of `ns`.
    pub(crate) fn from_body(body: &[u8], content_type: Option<&str>) -> Message {
        let is_form = content_type
            .map(|ct| ct.split(';').next().unwrap_or("").trim() == FORM_CONTENT_TYPE)
            .unwrap_or(false);
        if !is_form {
            return Message::new();
        }
        let fields = url::form_urlencoded::parse(body)
            .filter_map(|(key, value)| {
                let key = key.strip_prefix(OPENID_FIELD_PREFIX)?;
                Some((key.to_string(), value.into_owned()))
            })
            .collect();
        Message { fields }
    }

    /// Parse a key-value form body. Lines without a colon are an error.
    pub(crate) fn from_form(text: &str) -> anyhow::Result<Message> {
        let mut fields = BTreeMap::new();
        for line in text.split('\n').filter(|line| !line.is_empty()) {
            let (key, value) = line
                .split_once(':')
                .context("key value form contains a line without a colon")?;
            fields.insert(key.to_string(), value.to_string());
        }
        Ok(Message { fields })
    }

    /// Serialize every field as key-value form, in field-name order.
    pub(crate) fn to_form(&self) -> String {
        let mut body = String::new();
        for (key, value) in &self.fields {
            body.push_str(key);
            body.push(':');
            body.push_str(value);
            body.push('\n');
        }
        body
    }

    /// Serialize exactly the named fields, in exactly that order.
    ///
    /// This is the signature base string for `sig` computation and
    /// verification. A named field missing from the message is emitted with
    /// an empty value; signing and verification share this function, so the
    /// two paths can never diverge.
    pub(crate) fn to_signed_form(&self, order: &[&str]) -> String {
        let mut body = String::new();
        for key in order {
            body.push_str(key);
            body.push(':');
            if let Some(value) = self.fields.get(*key) {
                body.push_str(value);
            }
            body.push('\n');
        }
        body
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub(crate) fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Find the extension registered under `ns_uri`, if any.
    ///
    /// Looks for an alias `a` with `ns.<a> == ns_uri`, then collects every
    /// `<a>.*` field with the alias prefix stripped.
    pub(crate) fn extension(&self, ns_uri: &str) -> Option<Extension> {
        let alias = self.fields.iter().find_map(|(key, value)| {
            let alias = key.strip_prefix("ns.")?;
            (value == ns_uri && !alias.contains('.')).then(|| alias.to_string())
        })?;

        let prefix = format!("{alias}.");
        let fields = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let key = key.strip_prefix(&prefix)?;
                Some((key.to_string(), value.clone()))
            })
            .collect();

        Some(Extension { alias, fields })
    }
}

/// A namespaced extension of a protocol message.
///
/// `alias` is whatever namespace alias the relying party chose; `fields` maps
/// the remainder of each extension key after `<alias>.` to its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub alias: String,
    pub fields: BTreeMap<String, String>,
}

impl Extension {
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub(crate) fn is_fetch_request(&self) -> bool {
        self.get("mode") == Some(AX_MODE_FETCH_REQUEST)
    }
}

#[cfg(test)]
mod test {
    use anyhow::Context;

    use super::*;
    use crate::openid::constants::AX_NAMESPACE;

    #[test]
    fn from_query_strips_prefix() {
        let msg = Message::from_query(
            "openid.ns=http%3A%2F%2Fspecs.openid.net%2Fauth%2F2.0&openid.mode=checkid_setup&u=charlie",
        );

        assert_eq!(msg.get("ns"), Some("http://specs.openid.net/auth/2.0"));
        assert_eq!(msg.get("mode"), Some("checkid_setup"));
        // `u` carries no prefix and is not part of the protocol message
        assert_eq!(msg.get("u"), None);
    }

    #[test]
    fn from_body_requires_form_content_type() {
        let body = b"openid.mode=associate&openid.assoc_type=HMAC-SHA256";

        let msg = Message::from_body(body, Some("application/x-www-form-urlencoded"));
        assert_eq!(msg.get("mode"), Some("associate"));

        let msg = Message::from_body(body, Some("application/x-www-form-urlencoded; charset=utf-8"));
        assert_eq!(msg.get("mode"), Some("associate"));

        let msg = Message::from_body(body, Some("text/plain"));
        assert!(msg.is_empty());

        let msg = Message::from_body(body, None);
        assert!(msg.is_empty());
    }

    #[test]
    fn form_round_trip() -> anyhow::Result<()> {
        let mut msg = Message::new();
        msg.set("ns", "http://specs.openid.net/auth/2.0");
        msg.set("mode", "id_res");
        msg.set("return_to", "http://localhost/here?x=1");

        let body = msg.to_form();
        let parsed = Message::from_form(&body).context("couldn't parse emitted form")?;

        assert_eq!(parsed, msg);
        Ok(())
    }

    #[test]
    fn form_value_may_contain_colon() -> anyhow::Result<()> {
        let parsed = Message::from_form("op_endpoint:http://op.example/openid\n")?;
        assert_eq!(parsed.get("op_endpoint"), Some("http://op.example/openid"));
        Ok(())
    }

    #[test]
    fn form_rejects_line_without_colon() {
        assert!(Message::from_form("no colon here\n").is_err());
    }

    #[test]
    fn signed_form_emits_missing_fields_empty() {
        let mut msg = Message::new();
        msg.set("mode", "id_res");
        msg.set("op_endpoint", "http://op.example/openid");

        let body = msg.to_signed_form(&["mode", "op_endpoint", "claimed_id"]);
        assert_eq!(body, "mode:id_res\nop_endpoint:http://op.example/openid\nclaimed_id:\n");
    }

    #[test]
    fn signed_form_preserves_order() {
        let mut msg = Message::new();
        msg.set("a", "1");
        msg.set("b", "2");

        assert_eq!(msg.to_signed_form(&["b", "a"]), "b:2\na:1\n");
    }

    #[test]
    fn extension_by_alias() {
        let mut msg = Message::new();
        msg.set("ns.ax2", AX_NAMESPACE);
        msg.set("ax2.mode", "fetch_request");
        msg.set("ax2.type.email", "http://axschema.org/contact/email");
        msg.set("ns", "http://specs.openid.net/auth/2.0");

        let ext = msg.extension(AX_NAMESPACE).expect("extension not found");
        assert_eq!(ext.alias, "ax2");
        assert_eq!(ext.get("mode"), Some("fetch_request"));
        assert_eq!(ext.get("type.email"), Some("http://axschema.org/contact/email"));
        assert!(ext.is_fetch_request());
    }

    #[test]
    fn extension_absent() {
        let mut msg = Message::new();
        msg.set("ns", "http://specs.openid.net/auth/2.0");
        assert!(msg.extension(AX_NAMESPACE).is_none());
    }
}

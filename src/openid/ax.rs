//! Attribute Exchange 1.0 fetch responses.
//!
//! <https://openid.net/specs/openid-attribute-exchange-1_0.html>
//!
//! The relying party picks a namespace alias and one sub-alias per attribute
//! type in its fetch request. Several deployed relying parties resolve the
//! response against those very aliases instead of the type URIs, so the
//! response repeats them verbatim even though the protocol would allow any
//! alias.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::constants::{AX_MODE_FETCH_RESPONSE, AX_NAMESPACE};
use super::message::{Extension, Message};

/// Attribute values supplied by the auth handler, keyed by AX type URI.
pub type AxAttributes = BTreeMap<String, AxValue>;

/// A single attribute value or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for AxValue {
    fn from(value: &str) -> AxValue {
        AxValue::One(value.to_string())
    }
}

/// Append a fetch response to `response`, mirroring the aliases of the
/// relying party's fetch request.
///
/// Emits `ns.<alias>`, `<alias>.mode`, and for every `type.<attr>` of the
/// request the type again plus its value fields: `value.<attr>` for a
/// single value, `count.<attr>` and `value.<attr>.<i>` for a list, and
/// `count.<attr> = 0` when no value is available. Supplied values whose
/// type was not requested are dropped.
///
/// Returns the emitted field names in order, for the `signed` list.
pub(crate) fn append_fetch_response(
    response: &mut Message,
    request: &Extension,
    attributes: &AxAttributes,
) -> Vec<String> {
    let alias = &request.alias;
    let mut emitted = Vec::new();

    let mut emit = |response: &mut Message, key: String, value: &str| {
        response.set(key.clone(), value);
        emitted.push(key);
    };

    emit(response, format!("ns.{alias}"), AX_NAMESPACE);
    emit(response, format!("{alias}.mode"), AX_MODE_FETCH_RESPONSE);

    for (key, type_uri) in &request.fields {
        let Some(attr) = key.strip_prefix("type.") else {
            continue;
        };
        emit(response, format!("{alias}.type.{attr}"), type_uri);

        match attributes.get(type_uri) {
            Some(AxValue::One(value)) => {
                emit(response, format!("{alias}.value.{attr}"), value);
            }
            Some(AxValue::Many(values)) => {
                emit(response, format!("{alias}.count.{attr}"), &values.len().to_string());
                for (i, value) in values.iter().enumerate() {
                    emit(response, format!("{alias}.value.{attr}.{}", i + 1), value);
                }
            }
            None => {
                emit(response, format!("{alias}.count.{attr}"), "0");
            }
        }
    }

    emitted
}

//! Field names and fixed values of OpenID Authentication 2.0 messages.
//!
//! Message fields are stored without their `openid.` prefix; the prefix is
//! added back by the codec when a message travels in a query string.

/// `openid.ns` <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.4.1.2>
///
/// This particular value MUST be present for the request to be a valid OpenID
/// Authentication 2.0 request.
pub(crate) const OPENID_AUTH_NAMESPACE: &str = "http://specs.openid.net/auth/2.0";

/// Query-string keys carry this prefix, key-value form bodies do not.
pub(crate) const OPENID_FIELD_PREFIX: &str = "openid.";

pub(crate) const FIELD_NS: &str = "ns";
pub(crate) const FIELD_MODE: &str = "mode";
pub(crate) const FIELD_ERROR: &str = "error";
pub(crate) const FIELD_ERROR_CODE: &str = "error_code";
pub(crate) const FIELD_REALM: &str = "realm";
pub(crate) const FIELD_RETURN_TO: &str = "return_to";
pub(crate) const FIELD_IDENTITY: &str = "identity";
pub(crate) const FIELD_CLAIMED_ID: &str = "claimed_id";
pub(crate) const FIELD_OP_ENDPOINT: &str = "op_endpoint";
pub(crate) const FIELD_RESPONSE_NONCE: &str = "response_nonce";
pub(crate) const FIELD_ASSOC_HANDLE: &str = "assoc_handle";
pub(crate) const FIELD_ASSOC_TYPE: &str = "assoc_type";
pub(crate) const FIELD_SESSION_TYPE: &str = "session_type";
pub(crate) const FIELD_EXPIRES_IN: &str = "expires_in";
pub(crate) const FIELD_MAC_KEY: &str = "mac_key";
pub(crate) const FIELD_ENC_MAC_KEY: &str = "enc_mac_key";
pub(crate) const FIELD_DH_MODULUS: &str = "dh_modulus";
pub(crate) const FIELD_DH_GEN: &str = "dh_gen";
pub(crate) const FIELD_DH_CONSUMER_PUBLIC: &str = "dh_consumer_public";
pub(crate) const FIELD_DH_SERVER_PUBLIC: &str = "dh_server_public";
pub(crate) const FIELD_INVALIDATE_HANDLE: &str = "invalidate_handle";
pub(crate) const FIELD_SIGNED: &str = "signed";
pub(crate) const FIELD_SIG: &str = "sig";
pub(crate) const FIELD_IS_VALID: &str = "is_valid";

/// `openid.mode`
/// - <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.8.1>
/// - <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.9.1>
/// - <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.10.1>
/// - <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.10.2.1>
/// - <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.11.4.2.1>
pub(crate) const MODE_ASSOCIATE: &str = "associate";

/// See [`MODE_ASSOCIATE`]
pub(crate) const MODE_CHECKID_IMMEDIATE: &str = "checkid_immediate";

/// See [`MODE_ASSOCIATE`]
pub(crate) const MODE_CHECKID_SETUP: &str = "checkid_setup";

/// See [`MODE_ASSOCIATE`]
pub(crate) const MODE_IDENTIFIER_RESPONSE: &str = "id_res";

/// See [`MODE_ASSOCIATE`]
pub(crate) const MODE_CHECK_AUTHENTICATION: &str = "check_authentication";

/// See [`MODE_ASSOCIATE`]
pub(crate) const MODE_CANCEL: &str = "cancel";

/// See [`MODE_ASSOCIATE`]
pub(crate) const MODE_SETUP_NEEDED: &str = "setup_needed";

/// See [`MODE_ASSOCIATE`]
pub(crate) const MODE_ERROR: &str = "error";

/// `openid.error_code` for associate failures
/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.8.2.4>
pub(crate) const ERROR_CODE_UNSUPPORTED_TYPE: &str = "unsupported-type";

/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.7.3.2.1.1>
///
/// An OP Identifier Element is an `<xrd:Service>` element with the following information:
/// - An `<xrd:Type>` tag whose text content is `http://specs.openid.net/auth/2.0/server`.
/// - An `<xrd:URI>` tag whose text content is the OP Endpoint URL
pub(crate) const OPENID_PROVIDER_IDENTIFIER: &str = "http://specs.openid.net/auth/2.0/server";

/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.7.3.2.1.2>
///
/// A Claimed Identifier Element advertises this type instead of
/// [`OPENID_PROVIDER_IDENTIFIER`].
pub(crate) const OPENID_SIGNON_IDENTIFIER: &str = "http://specs.openid.net/auth/2.0/signon";

/// Namespace URI of the Attribute Exchange 1.0 extension
/// <https://openid.net/specs/openid-attribute-exchange-1_0.html>
pub(crate) const AX_NAMESPACE: &str = "http://openid.net/srv/ax/1.0";

/// `<alias>.mode` value of an AX fetch request
pub(crate) const AX_MODE_FETCH_REQUEST: &str = "fetch_request";

/// `<alias>.mode` value of an AX fetch response
pub(crate) const AX_MODE_FETCH_RESPONSE: &str = "fetch_response";

/// `openid.response_nonce` <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.10.1>
///
/// A string 255 characters or less in length, that MUST be unique to this
/// particular successful authentication response.
///
/// The nonce MUST start with the current time on the server, formatted as
/// specified in section 5.6 of RFC 3339, with the following restrictions:
/// - All times must be in the UTC timezone, indicated with a `Z`
/// - No fractional seconds are allowed
///
/// Example: `2005-05-15T17:11:51ZUNIQUE`
pub(crate) const OPENID_RESPONSE_NONCE_MAX_LEN: usize = 255;

/// Content type of direct responses
/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.5.1.2>
pub(crate) const KEY_VALUE_CONTENT_TYPE: &str = "text/plain";

/// Content type of direct requests
/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.5.1.1>
pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Content type of an XRDS discovery document
/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.7.3>
pub(crate) const XRDS_CONTENT_TYPE: &str = "application/xrds+xml";

//! The protocol engine.
//!
//! One endpoint multiplexes every flow of OpenID Authentication 2.0:
//! discovery, association, the checkid assertion flow and
//! `check_authentication` verification, plus the Attribute Exchange fetch
//! extension.
//!
//! Direct requests (server-to-server POSTs) are answered in place.
//! Indirect requests (browser redirects) either answer with a redirect or
//! hand control to the embedder's auth handler; the handler resumes the
//! flow through [`OpenIdProvider::complete_auth`] or
//! [`OpenIdProvider::reject_auth`], possibly from an entirely different
//! request after a login round-trip.

use std::sync::Arc;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::association::{AssocType, Association, SessionType};
use super::ax::{self, AxAttributes};
use super::constants::*;
use super::crypto::{self, DhParams};
use super::discovery::{self, DiscoveryDoc};
use super::message::{Extension, Message};
use super::nonce::{self, Nonce};
use super::realm;
use crate::error::ProviderResult;
use crate::store::{AssociationStore, MemoryAssociationStore, MemoryNonceStore, NonceStore};

/// Deliberately short defaults; deployments override them.
const DEFAULT_EXPIRY_SECS: i64 = 30;

/// Canonical order of the signed assertion fields; AX fields follow them.
///
/// `mode` is signed as `id_res`, which is why verification pins it back
/// before recomputing the signature.
const SIGNED_FIELDS: [&str; 7] = [
    FIELD_MODE,
    FIELD_OP_ENDPOINT,
    FIELD_RETURN_TO,
    FIELD_RESPONSE_NONCE,
    FIELD_ASSOC_HANDLE,
    FIELD_CLAIMED_ID,
    FIELD_IDENTITY,
];

/// Configuration of an [`OpenIdProvider`].
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Absolute URL the provider is reachable under. Its path doubles as
    /// the mount path: requests elsewhere are declined.
    pub endpoint: String,
    pub association_expiry_secs: i64,
    pub nonce_expiry_secs: i64,
}

impl ProviderOptions {
    pub fn new(endpoint: impl Into<String>) -> ProviderOptions {
        ProviderOptions {
            endpoint: endpoint.into(),
            association_expiry_secs: DEFAULT_EXPIRY_SECS,
            nonce_expiry_secs: DEFAULT_EXPIRY_SECS,
        }
    }
}

/// The user-authentication callback.
///
/// The engine never authenticates anybody itself. When a checkid request
/// passes validation it packages an [`AuthContext`] and transfers control
/// here; the handler authenticates the user however it likes and resumes
/// the protocol with [`OpenIdProvider::complete_auth`] or
/// [`OpenIdProvider::reject_auth`]. The engine does not time the handler
/// out, and an abandoned context carries no cleanup obligation.
pub trait CheckAuth: Send + Sync {
    fn check_auth(
        &self,
        provider: &OpenIdProvider,
        req: &HttpRequest,
        interactive: bool,
        context: AuthContext,
    ) -> ProviderResult<HttpResponse>;
}

impl<F> CheckAuth for F
where
    F: Fn(&OpenIdProvider, &HttpRequest, bool, AuthContext) -> ProviderResult<HttpResponse>
        + Send
        + Sync,
{
    fn check_auth(
        &self,
        provider: &OpenIdProvider,
        req: &HttpRequest,
        interactive: bool,
        context: AuthContext,
    ) -> ProviderResult<HttpResponse> {
        self(provider, req, interactive, context)
    }
}

/// Everything the auth handler needs to resume a checkid flow.
///
/// Serializable so it can ride along in a session cookie while the user
/// logs in; the engine holds no reference to it in the meantime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// `true` for checkid_setup, `false` for checkid_immediate
    pub interactive: bool,
    /// The parsed checkid request
    pub request: Message,
    /// The AX fetch request, if the relying party sent one
    pub ax: Option<Extension>,
}

/// A successful authentication, handed to [`OpenIdProvider::complete_auth`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub context: AuthContext,
    /// The authenticated local user, a bare username rather than a URL
    pub identity: String,
    /// Attribute values for the AX fetch response, keyed by type URI
    pub ax: Option<AxAttributes>,
}

/// What [`OpenIdProvider::handle`] did with a request.
pub enum Handled {
    /// The engine produced a response.
    Response(HttpResponse),
    /// Not OpenID traffic; the embedder's next handler should run.
    Declined,
}

pub struct OpenIdProvider {
    endpoint: Url,
    associations: Arc<dyn AssociationStore>,
    nonces: Arc<dyn NonceStore>,
    check_auth: Box<dyn CheckAuth>,
    association_expiry: Duration,
    nonce_expiry: Duration,
}

impl OpenIdProvider {
    pub fn new(
        options: ProviderOptions,
        check_auth: impl CheckAuth + 'static,
    ) -> anyhow::Result<OpenIdProvider> {
        let endpoint =
            Url::parse(&options.endpoint).context("couldn't parse provider endpoint url")?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("provider endpoint must be an http or https url");
        }
        Ok(OpenIdProvider {
            endpoint,
            associations: Arc::new(MemoryAssociationStore::new()),
            nonces: Arc::new(MemoryNonceStore::new()),
            check_auth: Box::new(check_auth),
            association_expiry: Duration::seconds(options.association_expiry_secs),
            nonce_expiry: Duration::seconds(options.nonce_expiry_secs),
        })
    }

    pub fn with_association_store(mut self, store: Arc<dyn AssociationStore>) -> OpenIdProvider {
        self.associations = store;
        self
    }

    pub fn with_nonce_store(mut self, store: Arc<dyn NonceStore>) -> OpenIdProvider {
        self.nonces = store;
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Main HTTP entry point.
    ///
    /// Returns [`Handled::Declined`] for traffic that isn't addressed to
    /// the provider so the embedder can fall through to its next handler.
    pub fn handle(&self, req: &HttpRequest, body: &web::Bytes) -> ProviderResult<Handled> {
        if req.path() != self.endpoint.path() {
            return Ok(Handled::Declined);
        }
        match req.method().as_str() {
            "GET" => self.handle_indirect(req),
            "POST" => self.handle_direct(req, body),
            _ => Ok(Handled::Declined),
        }
    }

    /// Indirect requests: browser GETs with `openid.*` query parameters.
    /// A GET without a protocol message is a discovery request.
    fn handle_indirect(&self, req: &HttpRequest) -> ProviderResult<Handled> {
        let request = Message::from_query(req.query_string());
        if request.get(FIELD_NS) != Some(OPENID_AUTH_NAMESPACE) {
            return self.discovery(req).map(Handled::Response);
        }

        match request.get(FIELD_MODE) {
            Some(MODE_CHECKID_SETUP) => self.checkid(req, request, true),
            Some(MODE_CHECKID_IMMEDIATE) => self.checkid(req, request, false),
            _ => Ok(Handled::Response(
                self.indirect_error(&request, "unknown or missing openid.mode"),
            )),
        }
    }

    /// Direct requests: server-to-server form-encoded POSTs.
    fn handle_direct(&self, req: &HttpRequest, body: &web::Bytes) -> ProviderResult<Handled> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        let request = Message::from_body(body, content_type);
        if request.get(FIELD_NS) != Some(OPENID_AUTH_NAMESPACE) {
            return Ok(Handled::Declined);
        }

        let response = match request.get(FIELD_MODE) {
            Some(MODE_ASSOCIATE) => self.associate(req, &request)?,
            Some(MODE_CHECK_AUTHENTICATION) => self.check_authentication(&request)?,
            Some(MODE_CHECKID_SETUP) => return self.checkid(req, request, true),
            Some(MODE_CHECKID_IMMEDIATE) => return self.checkid(req, request, false),
            _ => direct_error_response("unknown or missing openid.mode"),
        };
        Ok(Handled::Response(response))
    }

    /// Association establishment.
    /// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.8>
    fn associate(&self, req: &HttpRequest, request: &Message) -> ProviderResult<HttpResponse> {
        let assoc_type = request.get(FIELD_ASSOC_TYPE).and_then(AssocType::from_wire);
        let session_type = request
            .get(FIELD_SESSION_TYPE)
            .and_then(SessionType::from_wire);
        let (Some(assoc_type), Some(session_type)) = (assoc_type, session_type) else {
            return Ok(unsupported_type_response(
                "unsupported assoc_type or session_type",
            ));
        };
        if !session_type.compatible_with(assoc_type) {
            return Ok(unsupported_type_response(
                "session hash length doesn't match the association key length",
            ));
        }
        // A plaintext MAC key may only cross an encrypted transport.
        if session_type == SessionType::NoEncryption
            && req.connection_info().scheme() != "https"
        {
            return Ok(unsupported_type_response(
                "no-encryption sessions require a TLS connection",
            ));
        }

        let assoc = Association::generate(assoc_type, self.association_expiry, false);
        let mac_key = assoc.mac_key()?;

        let mut response = Message::new();
        response.set(FIELD_NS, OPENID_AUTH_NAMESPACE);
        response.set(FIELD_ASSOC_HANDLE, &assoc.handle);
        response.set(FIELD_ASSOC_TYPE, assoc_type.as_wire());
        response.set(FIELD_SESSION_TYPE, session_type.as_wire());
        response.set(
            FIELD_EXPIRES_IN,
            self.association_expiry.num_seconds().to_string(),
        );

        match session_type {
            SessionType::NoEncryption => {
                response.set(FIELD_MAC_KEY, crypto::b64_encode(&mac_key));
            }
            SessionType::DhSha1 | SessionType::DhSha256 => {
                let Some(consumer_public) = request.get(FIELD_DH_CONSUMER_PUBLIC) else {
                    return Ok(direct_error_response("dh_consumer_public is missing"));
                };
                let params = match DhParams::from_request(
                    request.get(FIELD_DH_MODULUS),
                    request.get(FIELD_DH_GEN),
                ) {
                    Ok(params) => params,
                    Err(err) => return Ok(direct_error_response(&format!("{err:#}"))),
                };
                let exchange = match crypto::dh_server_exchange(
                    &params,
                    consumer_public,
                    session_type,
                    &mac_key,
                ) {
                    Ok(exchange) => exchange,
                    Err(err) => return Ok(direct_error_response(&format!("{err:#}"))),
                };
                response.set(FIELD_DH_SERVER_PUBLIC, exchange.dh_server_public);
                response.set(FIELD_ENC_MAC_KEY, exchange.enc_mac_key);
            }
        }

        self.associations
            .put(assoc)
            .context("couldn't store association")?;
        log::debug!("established {} association", assoc_type.as_wire());
        Ok(direct_response(&response))
    }

    /// The shared front half of checkid_setup and checkid_immediate.
    ///
    /// After validation the engine builds the context and transfers control
    /// to the auth handler; no response is produced on this path.
    fn checkid(
        &self,
        req: &HttpRequest,
        request: Message,
        interactive: bool,
    ) -> ProviderResult<Handled> {
        let validated = realm::validate_relying_party(
            request.get(FIELD_REALM),
            request.get(FIELD_RETURN_TO),
        );
        if let Err(err) = validated {
            return Ok(Handled::Response(
                self.indirect_error(&request, &err.to_string()),
            ));
        }

        let ax = request.extension(AX_NAMESPACE);
        if let Some(ext) = &ax {
            if !ext.is_fetch_request() {
                return Ok(Handled::Response(
                    self.indirect_error(&request, "only AX fetch_request is supported"),
                ));
            }
        }

        let context = AuthContext {
            interactive,
            request,
            ax,
        };
        let response = self.check_auth.check_auth(self, req, interactive, context)?;
        Ok(Handled::Response(response))
    }

    /// Resume a checkid flow after successful authentication: build, sign
    /// and deliver the positive assertion.
    /// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.10.1>
    pub fn complete_auth(&self, auth: AuthResponse) -> ProviderResult<HttpResponse> {
        let now = Utc::now();
        let context = &auth.context;
        let Some(return_to) = context.request.get(FIELD_RETURN_TO) else {
            return Ok(direct_error_response("return_to is missing"));
        };

        let identity_url = self.identity_url(&auth.identity);
        let nonce_id = nonce::generate_response_nonce(now);

        let mut response = Message::new();
        response.set(FIELD_NS, OPENID_AUTH_NAMESPACE);
        response.set(FIELD_MODE, MODE_IDENTIFIER_RESPONSE);
        response.set(FIELD_OP_ENDPOINT, self.endpoint.as_str());
        response.set(FIELD_CLAIMED_ID, &identity_url);
        response.set(FIELD_IDENTITY, &identity_url);
        response.set(FIELD_RETURN_TO, return_to);
        response.set(FIELD_RESPONSE_NONCE, &nonce_id);

        let (assoc, invalidate_handle) =
            self.resolve_association(context.request.get(FIELD_ASSOC_HANDLE), now)?;
        response.set(FIELD_ASSOC_HANDLE, &assoc.handle);
        if let Some(handle) = invalidate_handle {
            response.set(FIELD_INVALIDATE_HANDLE, handle);
        }

        let mut signed: Vec<String> = SIGNED_FIELDS.iter().map(|field| field.to_string()).collect();
        if let (Some(ext), Some(attributes)) = (&context.ax, &auth.ax) {
            signed.extend(ax::append_fetch_response(&mut response, ext, attributes));
        }

        let order: Vec<&str> = signed.iter().map(String::as_str).collect();
        let mac_key = assoc.mac_key()?;
        let sig = crypto::hmac_sign(
            assoc.algorithm,
            &mac_key,
            response.to_signed_form(&order).as_bytes(),
        )?;
        response.set(FIELD_SIGNED, signed.join(","));
        response.set(FIELD_SIG, crypto::b64_encode(&sig));

        self.nonces
            .put(Nonce {
                id: nonce_id,
                expiry: now + self.nonce_expiry,
            })
            .context("couldn't store response nonce")?;

        match self.indirect_response(return_to, &response) {
            Ok(redirect) => Ok(redirect),
            Err(_) => Ok(direct_error_response("return_to is not a valid web url")),
        }
    }

    /// Resume a checkid flow after the user declined or could not be
    /// authenticated without interaction.
    /// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.10.2>
    pub fn reject_auth(&self, context: AuthContext) -> ProviderResult<HttpResponse> {
        let mode = if context.interactive {
            MODE_CANCEL
        } else {
            MODE_SETUP_NEEDED
        };
        let mut response = Message::new();
        response.set(FIELD_NS, OPENID_AUTH_NAMESPACE);
        response.set(FIELD_MODE, mode);

        let Some(return_to) = context.request.get(FIELD_RETURN_TO) else {
            return Ok(direct_error_response("return_to is missing"));
        };
        match self.indirect_response(return_to, &response) {
            Ok(redirect) => Ok(redirect),
            Err(_) => Ok(direct_error_response("return_to is not a valid web url")),
        }
    }

    /// Find the association to sign with.
    ///
    /// An unknown or expired handle is reported back through
    /// `invalidate_handle` and replaced by a fresh private association,
    /// which the relying party can only use through `check_authentication`.
    fn resolve_association(
        &self,
        supplied: Option<&str>,
        now: DateTime<Utc>,
    ) -> ProviderResult<(Association, Option<String>)> {
        let mut invalidate_handle = None;
        if let Some(handle) = supplied {
            match self
                .associations
                .get(handle)
                .context("couldn't load association")?
            {
                Some(assoc) if !assoc.is_expired(now) => return Ok((assoc, None)),
                Some(_) => {
                    self.associations
                        .delete(handle)
                        .context("couldn't delete expired association")?;
                    invalidate_handle = Some(handle.to_string());
                }
                None => invalidate_handle = Some(handle.to_string()),
            }
        }

        let assoc = Association::generate(AssocType::HmacSha256, self.association_expiry, true);
        self.associations
            .put(assoc.clone())
            .context("couldn't store private association")?;
        Ok((assoc, invalidate_handle))
    }

    /// Stateless verification of an assertion the provider issued earlier.
    /// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.11.4.2>
    fn check_authentication(&self, request: &Message) -> ProviderResult<HttpResponse> {
        let valid = self.verify_assertion(request)?;

        let mut response = Message::new();
        response.set(FIELD_NS, OPENID_AUTH_NAMESPACE);
        response.set(FIELD_IS_VALID, if valid { "true" } else { "false" });

        // Confirm a handle the relying party was told to drop, but only if
        // it really is unknown to us.
        if let Some(handle) = request.get(FIELD_INVALIDATE_HANDLE) {
            let known = self
                .associations
                .get(handle)
                .context("couldn't load association")?
                .map(|assoc| !assoc.is_expired(Utc::now()) && !assoc.private)
                .unwrap_or(false);
            if !known {
                response.set(FIELD_INVALIDATE_HANDLE, handle);
            }
        }

        Ok(direct_response(&response))
    }

    fn verify_assertion(&self, request: &Message) -> ProviderResult<bool> {
        let now = Utc::now();
        let (Some(handle), Some(nonce_id), Some(signed), Some(sig)) = (
            request.get(FIELD_ASSOC_HANDLE),
            request.get(FIELD_RESPONSE_NONCE),
            request.get(FIELD_SIGNED),
            request.get(FIELD_SIG),
        ) else {
            return Ok(false);
        };

        // Consuming the nonce first makes replays lose even when the rest
        // of the message checks out.
        let Some(nonce) = self
            .nonces
            .get_and_delete(nonce_id)
            .context("couldn't consume response nonce")?
        else {
            return Ok(false);
        };
        if nonce.is_expired(now) {
            return Ok(false);
        }

        let Some(assoc) = self
            .associations
            .get(handle)
            .context("couldn't load association")?
        else {
            return Ok(false);
        };
        // Shared associations never verify through check_authentication;
        // the relying party holds the key and can check for itself.
        if !assoc.private {
            return Ok(false);
        }
        if assoc.is_expired(now) {
            self.associations
                .delete(handle)
                .context("couldn't delete expired association")?;
            return Ok(false);
        }

        let Ok(sig) = crypto::b64_decode(sig) else {
            return Ok(false);
        };

        let mut reconstructed = request.clone();
        reconstructed.set(FIELD_MODE, MODE_IDENTIFIER_RESPONSE);
        let order: Vec<&str> = signed.split(',').collect();
        let body = reconstructed.to_signed_form(&order);

        let mac_key = assoc.mac_key()?;
        let valid = crypto::hmac_verify(assoc.algorithm, &mac_key, body.as_bytes(), &sig)?;
        Ok(valid)
    }

    /// Content-negotiated discovery document for the endpoint or, with a
    /// `u` query parameter, for one of its users.
    fn discovery(&self, req: &HttpRequest) -> ProviderResult<HttpResponse> {
        let accept = req
            .headers()
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok());
        let identity = url::form_urlencoded::parse(req.query_string().as_bytes())
            .find_map(|(key, value)| (key == "u").then(|| value.into_owned()));

        let response = match discovery::negotiate(accept) {
            Some(DiscoveryDoc::Xrds) => HttpResponse::Ok()
                .content_type(XRDS_CONTENT_TYPE)
                .body(discovery::xrds_document(
                    self.endpoint.as_str(),
                    identity.as_deref(),
                )),
            Some(DiscoveryDoc::Html) => HttpResponse::Ok()
                .content_type("text/html; charset=utf-8")
                .body(discovery::html_document(
                    self.endpoint.as_str(),
                    identity.as_deref(),
                )),
            None => HttpResponse::NotAcceptable().finish(),
        };
        Ok(response)
    }

    /// `<endpoint>?u=<identity>`, the claimed identifier of a local user.
    fn identity_url(&self, identity: &str) -> String {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("u", identity);
        url.to_string()
    }

    /// 302 to `return_to` with the message appended as `openid.*`
    /// parameters.
    fn indirect_response(&self, return_to: &str, message: &Message) -> anyhow::Result<HttpResponse> {
        let mut url = Url::parse(return_to).context("couldn't parse return_to url")?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("return_to must be an http or https url");
        }
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in message.iter() {
                pairs.append_pair(&format!("{OPENID_FIELD_PREFIX}{key}"), value);
            }
        }
        Ok(HttpResponse::Found()
            .insert_header((header::LOCATION, url.to_string()))
            .finish())
    }

    /// `mode = error` back to the relying party, or a direct 400 when
    /// `return_to` is unusable.
    fn indirect_error(&self, request: &Message, error: &str) -> HttpResponse {
        let mut response = Message::new();
        response.set(FIELD_NS, OPENID_AUTH_NAMESPACE);
        response.set(FIELD_MODE, MODE_ERROR);
        response.set(FIELD_ERROR, error);

        request
            .get(FIELD_RETURN_TO)
            .and_then(|return_to| self.indirect_response(return_to, &response).ok())
            .unwrap_or_else(|| direct_error_response(error))
    }
}

/// 200 with a key-value form body.
fn direct_response(message: &Message) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(KEY_VALUE_CONTENT_TYPE)
        .body(message.to_form())
}

/// 400 with a key-value form body carrying `error`.
fn direct_error_response(error: &str) -> HttpResponse {
    let mut message = Message::new();
    message.set(FIELD_NS, OPENID_AUTH_NAMESPACE);
    message.set(FIELD_ERROR, error);
    HttpResponse::BadRequest()
        .content_type(KEY_VALUE_CONTENT_TYPE)
        .body(message.to_form())
}

/// Associate failure advertising the preferred fallback types.
/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.8.2.4>
fn unsupported_type_response(error: &str) -> HttpResponse {
    let mut message = Message::new();
    message.set(FIELD_NS, OPENID_AUTH_NAMESPACE);
    message.set(FIELD_ERROR, error);
    message.set(FIELD_ERROR_CODE, ERROR_CODE_UNSUPPORTED_TYPE);
    message.set(FIELD_SESSION_TYPE, "DH-SHA256");
    message.set(FIELD_ASSOC_TYPE, "HMAC-SHA256");
    HttpResponse::BadRequest()
        .content_type(KEY_VALUE_CONTENT_TYPE)
        .body(message.to_form())
}

//! # Terminology
//!
//! ## **Identifier**
//!
//! An Identifier is either a "http" or "https" URI, (commonly referred to as a "URL" within this document), or an XRI.
//!
//! ## **User-Agent**
//!
//! The end user's Web browser which implements HTTP/1.1.
//!
//! ## **Relying Party** (**RP**)
//!
//! A Web application that wants proof that the end user controls an Identifier.
//!
//! ## **OpenID Provider** (**OP**)
//!
//! An OpenID Authentication server on which a Relying Party relies for an assertion that the end user controls an Identifier. This is what this crate implements.
//!
//! ## **OP Endpoint URL**
//!
//! The URL which accepts OpenID Authentication protocol messages. This value MUST be an absolute HTTP or HTTPS URL.
//!
//! ## **Claimed Identifier**
//!
//! An Identifier that the end user claims to own; the overall aim of the protocol is verifying this claim. This provider issues claimed identifiers of the form `<endpoint>?u=<username>`.
//!
//! ## **Association**
//!
//! A shared secret between the provider and a Relying Party, established through a Diffie-Hellman exchange and used to sign assertions.
//!
//! ## **Direct / Indirect Request**
//!
//! Direct requests are server-to-server POSTs answered with a key-value form body. Indirect requests travel through the User-Agent as `openid.*` query parameters and are answered with a redirect.

pub(crate) mod constants;

mod association;
mod ax;
mod crypto;
mod discovery;
mod engine;
mod message;
mod nonce;
mod realm;

pub use association::{AssocType, Association};
pub use ax::{AxAttributes, AxValue};
pub use engine::{
    AuthContext, AuthResponse, CheckAuth, Handled, OpenIdProvider, ProviderOptions,
};
pub use message::{Extension, Message};
pub use nonce::Nonce;

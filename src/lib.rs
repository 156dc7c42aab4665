//! Server side of OpenID Authentication 2.0: an OpenID Provider engine that
//! authenticates end-users on behalf of Relying Parties.
//!
//! A single endpoint multiplexes the protocol's flows: discovery documents,
//! association establishment with Diffie-Hellman key agreement, the checkid
//! assertion flow, stateless `check_authentication` verification and the
//! Attribute Exchange 1.0 fetch extension.
//!
//! The engine is a request-driven library behind three entry points:
//!
//! - [`OpenIdProvider::handle`] for incoming HTTP traffic,
//! - [`OpenIdProvider::complete_auth`] and [`OpenIdProvider::reject_auth`]
//!   to resume a checkid flow once the embedder's [`CheckAuth`] handler has
//!   authenticated the user (or failed to).
//!
//! User authentication itself, session handling and persistent storage stay
//! with the embedder; the built-in [`MemoryAssociationStore`] and
//! [`MemoryNonceStore`] cover single-process deployments.

#![forbid(unsafe_code)]
#![warn(
    clippy::copy_iterator,
    clippy::default_trait_access,
    clippy::doc_link_with_quotes,
    clippy::enum_glob_use,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::inefficient_to_string,
    clippy::items_after_statements,
    clippy::manual_let_else,
    clippy::manual_ok_or,
    clippy::manual_string_new,
    clippy::map_unwrap_or,
    clippy::match_same_arms,
    clippy::redundant_else,
    clippy::semicolon_if_nothing_returned,
    clippy::unnecessary_wraps,
    clippy::unnested_or_patterns,
    clippy::unused_async,
    clippy::used_underscore_binding
)]
#![warn(clippy::wildcard_dependencies)]

mod error;
mod openid;
mod store;

pub use error::{ProviderError, ProviderResult};
pub use openid::{
    AssocType, Association, AuthContext, AuthResponse, AxAttributes, AxValue, CheckAuth,
    Extension, Handled, Message, Nonce, OpenIdProvider, ProviderOptions,
};
pub use store::{AssociationStore, MemoryAssociationStore, MemoryNonceStore, NonceStore};

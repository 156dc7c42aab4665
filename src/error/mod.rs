//! Internal failures and how they reach the host framework.
//!
//! Protocol-level failures (bad messages, unsupported types, realm
//! mismatches) never show up here; the engine renders those inline as
//! direct or indirect error responses. This module only covers failures of
//! the machinery itself, store or crypto trouble, which become an HTTP 500
//! through actix-web's error channel.

/// This macro is here to keep track of error conversion.
macro_rules! err_trace {
    ($arg:tt) => ({
        #[cfg(feature = "err-trace")]
        {
            ::log::info!(::std::concat!("[err-trace] ", $arg));
        }
    });
    ($arg:tt, $($args:tt)+) => ({
        #[cfg(feature = "err-trace")]
        {
            ::log::info!(::std::concat!("[err-trace] ", $arg), $($args)+);
        }
    });
}

mod provider_error;

pub use provider_error::{ProviderError, ProviderResult};

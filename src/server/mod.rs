//! The `tower_lsp::LanguageServer` glue (C1): wires every other
//! component into the trait the transport actually drives.
//!
//! `state.rs` owns [`PolyglotBackend`] and its business-logic methods;
//! `handlers.rs` is the thin `LanguageServer` impl that schedules each
//! one under the right dependency tag (§4.1) and translates
//! [`crate::error::CoreResult`] into `jsonrpc::Result`.

mod handlers;
mod state;

pub use state::PolyglotBackend;

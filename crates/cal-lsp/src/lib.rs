//! C/AL Language Server Protocol (LSP) implementation.
//!
//! This crate serves editors working with Dynamics NAV C/AL objects:
//!
//! - **Diagnostics**: lexer, parser, and structural warnings inline
//! - **Completion**: keywords, data types, and scope-aware symbols
//! - **Go-to-definition**: fields, variables, parameters, procedures
//! - **Hover**: symbol kind and declared type
//! - **Document symbols**: the object outline (fields, keys, procedures)
//!
//! The server communicates via stdin/stdout using the LSP protocol over
//! JSON-RPC, powered by the `tower-lsp` framework.

pub mod analysis;
pub mod completion;
pub mod definition;
pub mod server;

use tower_lsp::{LspService, Server};

use server::CalBackend;

/// Run the C/AL LSP server on stdin/stdout.
///
/// This is the main entry point called by `cals lsp`. It sets up the
/// tower-lsp service and runs the event loop until the client
/// disconnects.
pub async fn run_server() {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(CalBackend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}

//! Tower-lsp Backend implementation for the C/AL language server.
//!
//! Implements the LSP `LanguageServer` trait with support for:
//! - textDocument/didOpen, didChange, didClose (diagnostics)
//! - textDocument/completion
//! - textDocument/definition
//! - textDocument/hover (symbol kind and declared type)
//! - textDocument/documentSymbol (object outline)

use std::collections::HashMap;
use std::sync::Mutex;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use cal_analysis::SymbolKind as CalSymbolKind;
use cal_parser::ast::ObjectDeclaration;

use crate::analysis::{self, AnalysisResult};

/// Per-document state stored in the server.
struct DocumentState {
    /// The latest source text.
    source: String,
    /// The latest analysis result.
    analysis: AnalysisResult,
}

/// The C/AL LSP server backend.
///
/// Holds a reference to the LSP client (for sending notifications like
/// diagnostics) and an in-memory document store keyed by URI.
pub struct CalBackend {
    client: Client,
    documents: Mutex<HashMap<String, DocumentState>>,
}

impl CalBackend {
    /// Create a new C/AL LSP backend.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Mutex::new(HashMap::new()),
        }
    }

    /// Analyze a document and publish diagnostics.
    async fn analyze_and_publish(&self, uri: Url, source: String) {
        let uri_str = uri.to_string();
        let result = analysis::analyze_document(&uri_str, &source);
        let diagnostics = result.diagnostics.clone();

        {
            let mut docs = self.documents.lock().unwrap();
            docs.insert(
                uri_str,
                DocumentState {
                    source,
                    analysis: result,
                },
            );
        }

        self.client
            .publish_diagnostics(uri, diagnostics, None)
            .await;
    }

    /// Run a query against a stored document.
    fn with_document<T>(&self, uri: &Url, f: impl FnOnce(&DocumentState) -> T) -> Option<T> {
        let docs = self.documents.lock().unwrap();
        docs.get(&uri.to_string()).map(f)
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for CalBackend {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions::default()),
                definition_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "C/AL LSP server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let source = params.text_document.text;
        self.analyze_and_publish(uri, source).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        // TextDocumentSyncKind::FULL: the first change is the whole text.
        if let Some(change) = params.content_changes.into_iter().next() {
            self.analyze_and_publish(uri, change.text).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        {
            let mut docs = self.documents.lock().unwrap();
            docs.remove(&params.text_document.uri.to_string());
        }
        self.client
            .publish_diagnostics(params.text_document.uri, vec![], None)
            .await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let items = self.with_document(&uri, |doc| {
            crate::completion::compute_completions(&doc.source, &doc.analysis, &position)
        });

        Ok(items.map(CompletionResponse::Array))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let location = self.with_document(&uri, |doc| {
            let offset = analysis::position_to_offset(&doc.source, &position)?;
            let span = crate::definition::find_definition(&doc.analysis, offset)?;
            let start = analysis::offset_to_position(&doc.source, span.start as usize);
            let end = analysis::offset_to_position(&doc.source, span.end as usize);
            Some(Range::new(start, end))
        });

        Ok(location.flatten().map(|range| {
            GotoDefinitionResponse::Scalar(Location { uri, range })
        }))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let hover = self.with_document(&uri, |doc| {
            let offset = analysis::position_to_offset(&doc.source, &position)? as u32;
            let token = doc.analysis.parse.tokens.iter().find(|t| {
                matches!(
                    t.kind,
                    cal_common::token::TokenKind::Identifier
                        | cal_common::token::TokenKind::QuotedIdentifier
                ) && t.span.contains(offset)
            })?;
            let symbol = doc.analysis.symbols.get_symbol_at_offset(&token.value, offset)?;

            let kind = match symbol.kind {
                CalSymbolKind::Field => "Field",
                CalSymbolKind::Variable => "Variable",
                CalSymbolKind::Parameter => "Parameter",
                CalSymbolKind::Procedure => "Procedure",
                CalSymbolKind::Function => "Procedure",
                CalSymbolKind::Trigger => "Trigger",
            };
            let text = match &symbol.type_string {
                Some(ty) => format!("({kind}) {} : {ty}", symbol.name),
                None => format!("({kind}) {}", symbol.name),
            };
            Some(Hover {
                contents: HoverContents::Markup(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: format!("```cal\n{text}\n```"),
                }),
                range: None,
            })
        });

        Ok(hover.flatten())
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;
        let symbols = self.with_document(&uri, |doc| {
            doc.analysis
                .parse
                .document
                .object
                .as_ref()
                .map(|object| object_outline(&doc.source, object))
        });
        Ok(symbols
            .flatten()
            .map(|root| DocumentSymbolResponse::Nested(vec![root])))
    }
}

/// Build the outline tree for one object: fields, keys, and procedures
/// under the object node.
#[allow(deprecated)]
fn object_outline(source: &str, object: &ObjectDeclaration) -> DocumentSymbol {
    let mut children = Vec::new();

    if let Some(fields) = &object.fields {
        for field in &fields.fields {
            children.push(outline_node(
                source,
                field.name.clone(),
                Some(field.data_type.to_string()),
                SymbolKind::FIELD,
                field.start_token.span.start,
                field.end_token.span.end,
            ));
        }
    }
    if let Some(code) = &object.code {
        for procedure in &code.procedures {
            children.push(outline_node(
                source,
                procedure.name.clone(),
                procedure.return_type.as_ref().map(|t| t.to_string()),
                SymbolKind::FUNCTION,
                procedure.start_token.span.start,
                procedure.end_token.span.end,
            ));
        }
        for trigger in code.triggers.iter().chain(code.document_trigger.as_ref()) {
            children.push(outline_node(
                source,
                trigger.name.clone(),
                None,
                SymbolKind::EVENT,
                trigger.start_token.span.start,
                trigger.end_token.span.end,
            ));
        }
    }

    let mut root = outline_node(
        source,
        format!("{} {} {}", object.kind.as_str(), object.id, object.name),
        None,
        SymbolKind::CLASS,
        object.start_token.span.start,
        object.end_token.span.end,
    );
    root.children = Some(children);
    root
}

#[allow(deprecated)]
fn outline_node(
    source: &str,
    name: String,
    detail: Option<String>,
    kind: SymbolKind,
    start: u32,
    end: u32,
) -> DocumentSymbol {
    let range = Range::new(
        analysis::offset_to_position(source, start as usize),
        analysis::offset_to_position(source, end as usize),
    );
    DocumentSymbol {
        name,
        detail,
        kind,
        tags: None,
        deprecated: None,
        range,
        selection_range: range,
        children: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify that the server advertises the expected capabilities.
    #[tokio::test]
    async fn server_capabilities() {
        let (service, _) = tower_lsp::LspService::new(CalBackend::new);
        let server = service.inner();
        let result = server
            .initialize(InitializeParams::default())
            .await
            .unwrap();

        let caps = result.capabilities;
        assert!(caps.completion_provider.is_some());
        assert!(caps.definition_provider.is_some());
        assert!(caps.hover_provider.is_some());
        assert!(caps.document_symbol_provider.is_some());
        assert!(caps.text_document_sync.is_some());
    }

    #[test]
    fn outline_covers_fields_and_procedures() {
        let source = "OBJECT Table 18 Customer { FIELDS { { 1 ; ;No. ;Code20 } } CODE { PROCEDURE P@1(); BEGIN END; BEGIN END. } }";
        let analysis = analysis::analyze_document("file:///t.txt", source);
        let object = analysis.parse.document.object.as_ref().expect("object");
        let outline = object_outline(source, object);
        assert_eq!(outline.name, "Table 18 Customer");
        let children = outline.children.expect("children");
        let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"No."));
        assert!(names.contains(&"P"));
        assert!(names.contains(&"OnRun"));
    }
}

//! Tool definitions and executor for the shopping assistant.
//!
//! The model gets a single tool, `item_lookup`, backed by the
//! [`InventorySearch`] gateway. Execution never fails: bad arguments and
//! unknown tool names come back as failure payloads the model can read.

use serde::Deserialize;
use serde_json::json;

use crate::claude::Tool;
use crate::models::ToolCall;

use super::search::{DEFAULT_RESULT_LIMIT, InventorySearch, SearchOutcome};

/// Name of the inventory lookup tool.
pub const ITEM_LOOKUP: &str = "item_lookup";

/// Definition of the inventory lookup tool offered to the model.
#[must_use]
pub fn item_lookup_tool() -> Tool {
    Tool {
        name: ITEM_LOOKUP.to_string(),
        description: "Search the furniture inventory. Returns matching items with name, description, brand, prices, categories and reviews, plus whether the match came from semantic (vector) or keyword (text) search.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What the customer is looking for, e.g. 'blue velvet sofa' or 'oak dining table'"
                },
                "n": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default 10)",
                    "minimum": 1,
                    "default": DEFAULT_RESULT_LIMIT
                }
            },
            "required": ["query"]
        }),
    }
}

/// Validated `item_lookup` arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemLookupArgs {
    pub query: String,
    #[serde(default = "default_limit")]
    pub n: u32,
}

const fn default_limit() -> u32 {
    DEFAULT_RESULT_LIMIT
}

impl ItemLookupArgs {
    /// Parse and validate raw tool input.
    ///
    /// # Errors
    ///
    /// Returns a readable reason if `query` is missing or blank, or if `n`
    /// is not a positive integer.
    pub fn parse(input: &serde_json::Value) -> Result<Self, String> {
        let args: Self = serde_json::from_value(input.clone())
            .map_err(|e| format!("invalid {ITEM_LOOKUP} arguments: {e}"))?;

        if args.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        if args.n == 0 {
            return Err("n must be a positive integer".to_string());
        }
        Ok(args)
    }
}

/// Output of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: serde_json::Value,
    /// Set when the tool could not do its job (not for an empty inventory).
    pub is_error: bool,
}

impl From<SearchOutcome> for ToolOutput {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            is_error: matches!(outcome, SearchOutcome::Failed { .. }),
            content: outcome.to_json(),
        }
    }
}

/// Executes tool calls requested by the model.
#[derive(Clone)]
pub struct ToolExecutor {
    search: InventorySearch,
    definitions: Vec<Tool>,
}

impl ToolExecutor {
    #[must_use]
    pub fn new(search: InventorySearch) -> Self {
        Self {
            search,
            definitions: vec![item_lookup_tool()],
        }
    }

    /// Tools offered to the model.
    #[must_use]
    pub fn definitions(&self) -> &[Tool] {
        &self.definitions
    }

    /// Run one tool call.
    #[tracing::instrument(skip(self, call), fields(tool = %call.name, call_id = %call.id))]
    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        if call.name != ITEM_LOOKUP {
            tracing::warn!("model requested an unknown tool");
            return ToolOutput {
                content: json!({
                    "status": "failed",
                    "error": "Unknown tool",
                    "message": format!("No tool named '{}' is available; use {ITEM_LOOKUP}.", call.name),
                }),
                is_error: true,
            };
        }

        match ItemLookupArgs::parse(&call.input) {
            Ok(args) => self.search.search(&args.query, args.n).await.into(),
            Err(reason) => {
                tracing::warn!(%reason, "rejected tool arguments");
                let query = call.input.get("query").and_then(|q| q.as_str()).unwrap_or_default();
                SearchOutcome::failed(reason, query).into()
            }
        }
    }
}

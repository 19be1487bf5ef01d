//! Agent tools.
//!
//! Tools are what an agent runtime discovers via `GET /tools/list` and
//! calls via `POST /tools/{name}`. Each one implements [`Tool`] and is
//! registered in a [`ToolRegistry`].
//!
//! | Tool | Purpose |
//! |------|---------|
//! | `read_template` | Fetch a template by name or alias, or get a miss signal |
//! | `list_templates` | Discover available templates |
//! | `lookup_knowledge` | Template first, then the secondary search source |
//!
//! Intended agent workflow for SQL templates:
//!
//! 1. `read_template(name_or_query, category="sql")`
//! 2. substitute each listed `<PLACEHOLDER>` with a literal value
//! 3. execute the query unchanged otherwise
//!
//! Steps 2 and 3 belong to the agent.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::fallback::{KnowledgeLookup, LookupOutcome};
use crate::models::{ArtifactFormat, Category};
use crate::template::{TemplateResult, TemplateService, VERBATIM_NOTICE};

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool agents can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`). Lowercase with underscores.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with the crate. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// OpenAI function-calling JSON Schema for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute with parameters already validated against the schema.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Serializable tool info for the `/tools/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Services available to tools during execution.
#[derive(Clone)]
pub struct ToolContext {
    templates: Arc<TemplateService>,
    lookup: Arc<KnowledgeLookup>,
}

impl ToolContext {
    pub fn new(templates: Arc<TemplateService>, lookup: Arc<KnowledgeLookup>) -> Self {
        Self { templates, lookup }
    }

    pub fn templates(&self) -> &TemplateService {
        &self.templates
    }

    pub fn lookup(&self) -> &KnowledgeLookup {
        &self.lookup
    }
}

fn category_param(params: &Value) -> Result<Category> {
    let raw = params["category"].as_str().unwrap_or("");
    Ok(Category::new(raw)?)
}

fn category_schema() -> Value {
    json!({
        "type": "string",
        "description": "Template category, e.g. sql, definitions, scripts, data"
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tools
// ═══════════════════════════════════════════════════════════════════════

/// Serves a template verbatim or reports a miss.
pub struct ReadTemplateTool;

#[async_trait]
impl Tool for ReadTemplateTool {
    fn name(&self) -> &str {
        "read_template"
    }

    fn description(&self) -> &str {
        "Read an expert-verified template by name or alias. Returns the exact stored text, or found=false when the secondary knowledge base should be searched instead"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Template name or alias (any language)" },
                "category": category_schema()
            },
            "required": ["name", "category"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let name = params["name"].as_str().unwrap_or("");
        if name.trim().is_empty() {
            bail!("name must not be empty");
        }
        let category = category_param(&params)?;

        Ok(match ctx.templates.get_template(name, &category).await {
            TemplateResult::Found(t) => json!({
                "found": true,
                "category": t.category,
                "name": t.name,
                "source_path": t.source_path,
                "format": t.format,
                "content": t.content,
                "placeholders": t.placeholders,
                "instructions": VERBATIM_NOTICE,
            }),
            TemplateResult::NotFound {
                category,
                name,
                reason,
            } => json!({
                "found": false,
                "status": "not_found",
                "category": category,
                "name": name,
                "reason": reason,
                "fallback": "search the knowledge base for this query",
            }),
            TemplateResult::Unavailable { reason } => json!({
                "found": false,
                "status": "unavailable",
                "reason": reason,
                "retryable": true,
            }),
        })
    }
}

/// Lists stored templates, optionally by category and format.
pub struct ListTemplatesTool;

#[async_trait]
impl Tool for ListTemplatesTool {
    fn name(&self) -> &str {
        "list_templates"
    }

    fn description(&self) -> &str {
        "List available expert-verified templates"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        let formats: Vec<&str> = ArtifactFormat::ALL.iter().map(|f| f.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "category": category_schema(),
                "format": {
                    "type": "string",
                    "enum": formats,
                    "description": "Only list templates of this format"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let category = match params.get("category").and_then(|c| c.as_str()) {
            Some(raw) => Some(Category::new(raw)?),
            None => None,
        };
        let format = match params.get("format").and_then(|f| f.as_str()) {
            Some(raw) => Some(raw.parse::<ArtifactFormat>().map_err(anyhow::Error::msg)?),
            None => None,
        };
        let items = ctx
            .templates
            .list_templates(category.as_ref(), format)
            .await?;
        let templates: Vec<Value> = items
            .iter()
            .map(|m| {
                json!({
                    "category": m.category,
                    "name": m.name,
                    "filename": m.filename,
                    "format": m.format,
                    "description": m.format.description(),
                    "size_bytes": m.size_bytes,
                    "last_modified": m.last_modified,
                })
            })
            .collect();
        Ok(json!({ "templates": templates }))
    }
}

/// Runs the full template-then-search chain.
pub struct LookupKnowledgeTool;

#[async_trait]
impl Tool for LookupKnowledgeTool {
    fn name(&self) -> &str {
        "lookup_knowledge"
    }

    fn description(&self) -> &str {
        "Look up a template by name or alias and fall back to knowledge-base search when none exists"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Template name, alias, or question" },
                "category": category_schema()
            },
            "required": ["query", "category"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        if query.trim().is_empty() {
            bail!("query must not be empty");
        }
        let category = category_param(&params)?;

        let outcome = ctx.lookup.lookup(query, &category).await;
        let mut value = serde_json::to_value(&outcome)?;
        if matches!(outcome, LookupOutcome::Template(_)) {
            value["instructions"] = json!(VERBATIM_NOTICE);
        }
        Ok(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of callable tools.
///
/// ```rust
/// use template_vault::tools::ToolRegistry;
///
/// let tools = ToolRegistry::with_builtins();
/// assert!(tools.find("read_template").is_some());
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with `read_template`, `list_templates`, and `lookup_knowledge`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ReadTemplateTool));
        registry.register(Box::new(ListTemplatesTool));
        registry.register(Box::new(LookupKnowledgeTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Validate `params` against a tool's JSON Schema: required fields, types,
/// and enums.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let empty = serde_json::Map::new();
    let params_obj = params.as_object().unwrap_or(&empty);

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !params_obj.contains_key(*field) {
            bail!("missing required parameter: {}", field);
        }
    }

    for (prop_name, prop_schema) in &properties {
        let Some(value) = params_obj.get(prop_name) else {
            continue;
        };
        if let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "parameter '{}' must be of type '{}', got {}",
                    prop_name,
                    expected,
                    json_type_name(value)
                );
            }
        }
        if let Some(allowed) = prop_schema.get("enum").and_then(|e| e.as_array()) {
            if !allowed.contains(value) {
                let allowed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                bail!(
                    "parameter '{}' must be one of [{}], got {}",
                    prop_name,
                    allowed.join(", "),
                    value
                );
            }
        }
    }

    Ok(Value::Object(params_obj.clone()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

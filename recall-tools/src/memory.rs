//! Tools exposing a [`MemoryStore`] to a conversational agent.

use std::fmt::Write as _;

use async_trait::async_trait;
use recall_memory::record::{DEFAULT_CATEGORY, DEFAULT_IMPORTANCE};
use recall_memory::{MemoryStore, NewMemory, SearchHit};
use serde::{Deserialize, Deserializer, de};
use serde_json::{Value, json};
use tracing::debug;

use crate::registry::{Tool, ToolContext, ToolError, ToolMetadata, ToolOutput, ToolRegistry, ToolResult};

/// Number of results returned when the caller omits `top_k`.
pub const DEFAULT_TOP_K: usize = 5;
/// Largest `top_k` a caller may request.
pub const MAX_TOP_K: usize = 20;

/// Bounds applied to `search_memory` requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    default_top_k: usize,
    max_top_k: usize,
}

impl SearchLimits {
    /// Creates limits with the given default and maximum `top_k`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] unless `1 <= default_top_k <= max_top_k`.
    pub fn new(default_top_k: usize, max_top_k: usize) -> ToolResult<Self> {
        if default_top_k == 0 || default_top_k > max_top_k {
            return Err(ToolError::InvalidMetadata {
                reason: format!("top_k default {default_top_k} must be within 1..={max_top_k}"),
            });
        }
        Ok(Self {
            default_top_k,
            max_top_k,
        })
    }

    /// Returns the `top_k` used when the caller omits it.
    #[must_use]
    pub const fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Returns the largest accepted `top_k`.
    #[must_use]
    pub const fn max_top_k(&self) -> usize {
        self.max_top_k
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
            max_top_k: MAX_TOP_K,
        }
    }
}

const TOOL_VERSION: &str = "1.0.0";

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, input: Value) -> ToolResult<T> {
    // Tools without parameters are often called with `null`.
    let input = if input.is_null() { json!({}) } else { input };
    serde_json::from_value(input)
        .map_err(|err| ToolError::invalid_arguments(format!("{tool}: {err}")))
}

/// Stores a fact about the caller.
#[derive(Clone, Debug)]
pub struct StoreMemoryTool {
    store: MemoryStore,
}

#[derive(Debug, Deserialize)]
struct StoreArgs {
    content: String,
    #[serde(default = "default_importance")]
    importance: f32,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    topics: Vec<String>,
}

fn default_importance() -> f32 {
    DEFAULT_IMPORTANCE
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_owned()
}

impl StoreMemoryTool {
    /// Name under which the tool is registered.
    pub const NAME: &'static str = "store_memory";

    /// Creates the tool over the supplied store.
    #[must_use]
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Returns the tool metadata including its argument schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the metadata is rejected.
    pub fn metadata() -> ToolResult<ToolMetadata> {
        Ok(ToolMetadata::new(Self::NAME, TOOL_VERSION)?
            .with_description(
                "Store a fact about the user in long-term memory so it can be recalled in later \
                 conversations. Use it for preferences, personal details, goals and plans. Store \
                 one self-contained fact per call.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "The fact to remember, phrased as a standalone statement"
                    },
                    "importance": {
                        "type": "number",
                        "description": "How important the fact is, from 0 to 1",
                        "minimum": 0,
                        "maximum": 1,
                        "default": DEFAULT_IMPORTANCE
                    },
                    "category": {
                        "type": "string",
                        "description": "Category such as preferences, personal_info or goals",
                        "default": DEFAULT_CATEGORY
                    },
                    "topics": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Related topic tags"
                    }
                },
                "required": ["content"]
            })))
    }
}

#[async_trait]
impl Tool for StoreMemoryTool {
    async fn invoke(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        let args: StoreArgs = parse_args(Self::NAME, input)?;
        let memory = NewMemory::new(args.content)
            .with_importance(args.importance)
            .with_category(args.category)
            .with_topics(args.topics);

        let fact = self.store.add(ctx.identity(), memory).await?;
        let data = serde_json::to_value(&fact)
            .map_err(|err| ToolError::execution(format!("failed to encode memory: {err}")))?;
        Ok(ToolOutput::text(format!("Successfully stored memory: {}", fact.content)).with_data(data))
    }
}

/// Finds the caller's memories most similar to a query.
#[derive(Clone, Debug)]
pub struct SearchMemoryTool {
    store: MemoryStore,
    limits: SearchLimits,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default, deserialize_with = "whole_number")]
    top_k: Option<usize>,
}

/// Accepts `5` as well as `5.0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_number<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(whole) = number.as_u64() {
        return usize::try_from(whole).map(Some).map_err(de::Error::custom);
    }
    match number.as_f64() {
        Some(float) if float >= 0.0 && float.fract() == 0.0 => Ok(Some(float as usize)),
        _ => Err(de::Error::custom(format!(
            "expected a non-negative whole number, got {number}"
        ))),
    }
}

impl SearchMemoryTool {
    /// Name under which the tool is registered.
    pub const NAME: &'static str = "search_memory";

    /// Creates the tool over the supplied store.
    #[must_use]
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            limits: SearchLimits::default(),
        }
    }

    /// Overrides the default and maximum `top_k`.
    #[must_use]
    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Returns the tool metadata including its argument schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the metadata is rejected.
    pub fn metadata(&self) -> ToolResult<ToolMetadata> {
        Ok(ToolMetadata::new(Self::NAME, TOOL_VERSION)?
            .with_description(
                "Search long-term memories about the user by semantic similarity. Use it to recall \
                 preferences, background, goals or anything stored in earlier conversations.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query. Can be a question or keywords to find relevant memories"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Number of most relevant memories to return.",
                        "minimum": 1,
                        "maximum": self.limits.max_top_k,
                        "default": self.limits.default_top_k
                    }
                },
                "required": ["query"]
            })))
    }
}

/// Renders hits as the markdown listing handed back to the model.
#[must_use]
pub fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No memories found.".to_owned();
    }
    let mut out = String::from("## Found Memories\n\n");
    for (position, hit) in hits.iter().enumerate() {
        let fact = &hit.fact;
        let _ = writeln!(out, "### Memory {}", position + 1);
        let _ = writeln!(out, "**Content**: {}", fact.content);
        let _ = writeln!(out, "**Category**: {}", fact.category);
        if !fact.topics.is_empty() {
            let _ = writeln!(out, "**Topics**: {}", fact.topics.join(", "));
        }
        out.push('\n');
    }
    out
}

#[async_trait]
impl Tool for SearchMemoryTool {
    async fn invoke(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        let args: SearchArgs = parse_args(Self::NAME, input)?;
        let top_k = args.top_k.unwrap_or(self.limits.default_top_k);
        if !(1..=self.limits.max_top_k).contains(&top_k) {
            return Err(ToolError::invalid_arguments(format!(
                "{}: top_k must be between 1 and {}",
                Self::NAME,
                self.limits.max_top_k
            )));
        }

        let hits = self.store.search(ctx.identity(), &args.query, top_k).await?;
        debug!(hits = hits.len(), "memory search tool finished");
        let data = serde_json::to_value(&hits)
            .map_err(|err| ToolError::execution(format!("failed to encode hits: {err}")))?;
        Ok(ToolOutput::text(render_hits(&hits)).with_data(data))
    }
}

/// Forgets everything stored about the caller.
#[derive(Clone, Debug)]
pub struct DeleteMemoryTool {
    store: MemoryStore,
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {}

impl DeleteMemoryTool {
    /// Name under which the tool is registered.
    pub const NAME: &'static str = "delete_memory";

    /// Creates the tool over the supplied store.
    #[must_use]
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Returns the tool metadata including its argument schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the metadata is rejected.
    pub fn metadata() -> ToolResult<ToolMetadata> {
        Ok(ToolMetadata::new(Self::NAME, TOOL_VERSION)?.with_description(
            "Delete all long-term memories about the user. This cannot be undone. Only use it \
             when the user explicitly asks to delete or clear their memory.",
        ))
    }
}

#[async_trait]
impl Tool for DeleteMemoryTool {
    async fn invoke(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        let DeleteArgs {} = parse_args(Self::NAME, input)?;
        let existed = self.store.delete_all(ctx.identity()).await?;
        Ok(
            ToolOutput::text("All memories have been successfully deleted.")
                .with_data(json!({ "existed": existed })),
        )
    }
}

/// Registers the three memory tools over `store`.
///
/// # Errors
///
/// Returns [`ToolError::DuplicateTool`] if any of the names is taken.
pub fn register_memory_tools(
    registry: &ToolRegistry,
    store: &MemoryStore,
    limits: SearchLimits,
) -> ToolResult<()> {
    let search = SearchMemoryTool::new(store.clone()).with_limits(limits);
    registry.register_tool(StoreMemoryTool::metadata()?, StoreMemoryTool::new(store.clone()))?;
    registry.register_tool(search.metadata()?, search)?;
    registry.register_tool(DeleteMemoryTool::metadata()?, DeleteMemoryTool::new(store.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use recall_memory::{
        EmbeddingProvider, EmbeddingVector, InMemoryBlobBackend, MemoryError, MemoryResult,
        UserIdentity,
    };

    use super::*;

    struct TableEmbedder(HashMap<&'static str, [f32; 3]>);

    #[async_trait]
    impl EmbeddingProvider for TableEmbedder {
        async fn encode(&self, text: &str) -> MemoryResult<EmbeddingVector> {
            let values = self
                .0
                .get(text)
                .ok_or_else(|| MemoryError::embedding(format!("no vector for {text:?}")))?;
            EmbeddingVector::from_slice(values)
        }
    }

    fn registry() -> ToolRegistry {
        let embedder = TableEmbedder(HashMap::from([
            ("User loves hiking in the Alps", [1.0, 0.0, 0.0]),
            ("User is allergic to peanuts", [0.0, 1.0, 0.0]),
            ("outdoor hobbies", [0.9, 0.1, 0.0]),
        ]));
        let store = MemoryStore::builder()
            .with_backend(Arc::new(InMemoryBlobBackend::new()))
            .with_embedder(Arc::new(embedder))
            .build()
            .unwrap();
        let registry = ToolRegistry::new();
        register_memory_tools(&registry, &store, SearchLimits::default()).unwrap();
        registry
    }

    fn ctx(token: &str) -> ToolContext {
        ToolContext::new(UserIdentity::new(token).unwrap())
    }

    #[test]
    fn registers_all_three_tools() {
        let names: Vec<_> = registry()
            .list()
            .iter()
            .map(|meta| meta.name().to_owned())
            .collect();
        assert_eq!(names, ["delete_memory", "search_memory", "store_memory"]);
    }

    #[test]
    fn search_limits_reject_inverted_bounds() {
        assert!(SearchLimits::new(0, 20).is_err());
        assert!(SearchLimits::new(8, 4).is_err());
        assert_eq!(SearchLimits::new(3, 10).unwrap().max_top_k(), 10);
    }

    #[test]
    fn search_schema_bounds_top_k() {
        let meta = registry().get("search_memory").unwrap().metadata().clone();
        let top_k = &meta.parameters()["properties"]["top_k"];
        assert_eq!(top_k["minimum"], 1);
        assert_eq!(top_k["maximum"], 20);
        assert_eq!(top_k["default"], 5);
        assert_eq!(meta.parameters()["required"], json!(["query"]));
    }

    #[tokio::test]
    async fn store_applies_defaults_and_reports_content() {
        let registry = registry();
        let output = registry
            .invoke(
                "store_memory",
                &ctx("alice"),
                json!({ "content": "User loves hiking in the Alps" }),
            )
            .await
            .unwrap();

        assert_eq!(output.message, "Successfully stored memory: User loves hiking in the Alps");
        assert_eq!(output.data["category"], "general");
        assert_eq!(output.data["importance"], json!(0.5));
        assert_eq!(output.data["topics"], json!([]));
    }

    #[tokio::test]
    async fn search_renders_markdown_listing() {
        let registry = registry();
        let alice = ctx("alice");
        registry
            .invoke(
                "store_memory",
                &alice,
                json!({
                    "content": "User loves hiking in the Alps",
                    "importance": 0.9,
                    "category": "preferences",
                    "topics": ["outdoors", "travel"]
                }),
            )
            .await
            .unwrap();
        registry
            .invoke(
                "store_memory",
                &alice,
                json!({ "content": "User is allergic to peanuts", "category": "health" }),
            )
            .await
            .unwrap();

        let output = registry
            .invoke("search_memory", &alice, json!({ "query": "outdoor hobbies", "top_k": 2 }))
            .await
            .unwrap();

        let expected = "## Found Memories\n\n\
            ### Memory 1\n\
            **Content**: User loves hiking in the Alps\n\
            **Category**: preferences\n\
            **Topics**: outdoors, travel\n\n\
            ### Memory 2\n\
            **Content**: User is allergic to peanuts\n\
            **Category**: health\n\n";
        assert_eq!(output.message, expected);
        assert_eq!(output.data.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn search_without_memories_says_so() {
        let output = registry()
            .invoke("search_memory", &ctx("bob"), json!({ "query": "outdoor hobbies" }))
            .await
            .unwrap();
        assert_eq!(output.message, "No memories found.");
        assert_eq!(output.data, json!([]));
    }

    #[tokio::test]
    async fn search_rejects_out_of_range_top_k() {
        let registry = registry();
        for top_k in [0, 21] {
            let err = registry
                .invoke(
                    "search_memory",
                    &ctx("bob"),
                    json!({ "query": "outdoor hobbies", "top_k": top_k }),
                )
                .await
                .expect_err("top_k out of range");
            assert!(matches!(err, ToolError::InvalidArguments { .. }));
        }
    }

    #[tokio::test]
    async fn search_accepts_whole_float_top_k() {
        let registry = registry();
        let alice = ctx("alice");
        for content in ["User loves hiking in the Alps", "User is allergic to peanuts"] {
            registry
                .invoke("store_memory", &alice, json!({ "content": content }))
                .await
                .unwrap();
        }

        let output = registry
            .invoke("search_memory", &alice, json!({ "query": "outdoor hobbies", "top_k": 1.0 }))
            .await
            .unwrap();
        assert_eq!(output.data.as_array().map(Vec::len), Some(1));

        for top_k in [json!(2.5), json!(-1), json!("3")] {
            let err = registry
                .invoke(
                    "search_memory",
                    &alice,
                    json!({ "query": "outdoor hobbies", "top_k": top_k }),
                )
                .await
                .expect_err("not a whole number");
            assert!(matches!(err, ToolError::InvalidArguments { .. }), "{top_k}");
        }
    }

    #[tokio::test]
    async fn unknown_argument_keys_are_ignored() {
        let registry = registry();
        let alice = ctx("alice");
        registry
            .invoke(
                "store_memory",
                &alice,
                json!({ "content": "User loves hiking in the Alps", "source": "chat", "confidence": 0.8 }),
            )
            .await
            .unwrap();

        let output = registry
            .invoke(
                "search_memory",
                &alice,
                json!({ "query": "outdoor hobbies", "filters": { "category": "preferences" } }),
            )
            .await
            .unwrap();
        assert_eq!(output.data.as_array().map(Vec::len), Some(1));

        let deleted = registry
            .invoke("delete_memory", &alice, json!({ "confirm": true }))
            .await
            .unwrap();
        assert_eq!(deleted.data, json!({ "existed": true }));
    }

    #[tokio::test]
    async fn invalid_arguments_are_reported() {
        let registry = registry();
        let err = registry
            .invoke("store_memory", &ctx("bob"), json!({ "importance": 0.3 }))
            .await
            .expect_err("content is required");
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let err = registry
            .invoke(
                "store_memory",
                &ctx("bob"),
                json!({ "content": "User is allergic to peanuts", "importance": 1.5 }),
            )
            .await
            .expect_err("importance out of range");
        assert!(matches!(err, ToolError::Memory(MemoryError::InvalidRecord(_))));
    }

    #[tokio::test]
    async fn delete_forgets_only_the_caller() {
        let registry = registry();
        for token in ["alice", "bob"] {
            registry
                .invoke(
                    "store_memory",
                    &ctx(token),
                    json!({ "content": "User is allergic to peanuts" }),
                )
                .await
                .unwrap();
        }

        let output = registry
            .invoke("delete_memory", &ctx("alice"), Value::Null)
            .await
            .unwrap();
        assert_eq!(output.message, "All memories have been successfully deleted.");
        assert_eq!(output.data, json!({ "existed": true }));

        let again = registry
            .invoke("delete_memory", &ctx("alice"), json!({}))
            .await
            .unwrap();
        assert_eq!(again.data, json!({ "existed": false }));

        let bob = registry
            .invoke("search_memory", &ctx("bob"), json!({ "query": "outdoor hobbies" }))
            .await
            .unwrap();
        assert_eq!(bob.data.as_array().map(Vec::len), Some(1));
    }
}

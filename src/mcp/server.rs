use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::RwLock;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ListResourceTemplatesResult, ListResourcesResult,
        PaginatedRequestParams, ProtocolVersion, RawResource, RawResourceTemplate,
        ReadResourceRequestParams, ReadResourceResult, Resource, ResourceContents,
        ResourceTemplate, ServerCapabilities, ServerInfo,
    },
    schemars,
    service::RequestContext,
    tool, tool_handler, tool_router,
};

use crate::adapters::cache::fetch_cache::FetchCache;
use crate::domain::country::{Country, group_thousands};
use crate::domain::stats::compute_statistics;
use crate::ports::country_client::CountryClient;

/// How many entries each statistics ranking reports.
const TOP_N: usize = 10;

// ---------- Resource Store ----------

/// Thread-safe store of fetched country data exposed as MCP resources.
/// Keys are URIs like `countries://country/FRA`, values are text content.
#[derive(Clone, Default)]
pub struct ResourceStore {
    entries: Arc<RwLock<HashMap<String, ResourceEntry>>>,
}

#[derive(Clone)]
struct ResourceEntry {
    name: String,
    text: String,
}

impl ResourceStore {
    async fn insert(&self, uri: impl Into<String>, name: impl Into<String>, text: String) {
        self.entries.write().await.insert(
            uri.into(),
            ResourceEntry {
                name: name.into(),
                text,
            },
        );
    }

    async fn get(&self, uri: &str) -> Option<ResourceEntry> {
        self.entries.read().await.get(uri).cloned()
    }

    async fn list(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(uri, entry)| (uri.clone(), entry.name.clone()))
            .collect()
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore").finish()
    }
}

// ---------- Tool parameter types ----------

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SearchToolParams {
    /// Country name to look up, full or partial (e.g. "France", "united")
    pub name: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct DetailsToolParams {
    /// Two- or three-letter country code (cca2/cca3, e.g. "FR" or "FRA")
    pub code: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RegionToolParams {
    /// Region name (e.g. "Africa", "Americas", "Asia", "Europe", "Oceania")
    pub region: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StatisticsToolParams {
    /// Restrict statistics to one region. Omit for worldwide statistics.
    pub region: Option<String>,
}

// ---------- MCP Server ----------

#[derive(Clone)]
pub struct CountriesMcpServer {
    client: Arc<dyn CountryClient>,
    cache: Arc<FetchCache>,
    tool_router: ToolRouter<Self>,
    resources: ResourceStore,
}

#[tool_router]
impl CountriesMcpServer {
    pub fn new(client: Arc<dyn CountryClient>, cache: Arc<FetchCache>) -> Self {
        Self {
            client,
            cache,
            tool_router: Self::tool_router(),
            resources: ResourceStore::default(),
        }
    }

    /// Look up countries by name (full or partial match).
    #[tool(
        name = "country_search",
        description = "Search countries by name, full or partial (e.g. \"France\" or \"united\"). Returns matching countries with their codes, region, capital, and population. Use the codes with country_details.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn country_search(
        &self,
        Parameters(params): Parameters<SearchToolParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.get_by_name(&params.name).await {
            Ok(countries) => {
                let text = format_country_list(&countries);
                let uri = format!("countries://search/{}", params.name);
                let name = format!("Search: {}", params.name);
                self.resources.insert(uri, name, text.clone()).await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Search failed for '{}': {e}. Check the spelling or try a shorter fragment of the name.",
                params.name
            ))])),
        }
    }

    /// Get the full profile of one country by its cca2/cca3 code.
    #[tool(
        name = "country_details",
        description = "Get the full profile of one country by its two- or three-letter code: official name, capital, region, population, area, density, coordinates, languages, currencies, borders, timezones, and flag.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn country_details(
        &self,
        Parameters(params): Parameters<DetailsToolParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.get_by_code(&params.code).await {
            Ok(country) => {
                let text = country.to_string();
                let uri = format!("countries://country/{}", params.code);
                let name = format!("Country: {}", country.name.common);
                self.resources.insert(uri, name, text.clone()).await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to get details for code '{}': {e}. Use a cca2/cca3 code from country_search results.",
                params.code
            ))])),
        }
    }

    /// List the countries of one region.
    #[tool(
        name = "countries_by_region",
        description = "List all countries of a region (Africa, Americas, Asia, Europe, Oceania, Antarctic) with codes, capitals, and populations.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn countries_by_region(
        &self,
        Parameters(params): Parameters<RegionToolParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.get_by_region(&params.region).await {
            Ok(countries) => {
                let text = format_country_list(&countries);
                let uri = format!("countries://region/{}", params.region);
                let name = format!("Region: {}", params.region);
                self.resources.insert(uri, name, text.clone()).await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to list region '{}': {e}. Valid regions are Africa, Americas, Asia, Europe, Oceania, and Antarctic.",
                params.region
            ))])),
        }
    }

    /// Aggregate statistics over all countries, optionally for one region.
    #[tool(
        name = "country_statistics",
        description = "Aggregate statistics over all countries: totals, region distribution, and top-10 rankings by population, area, and density. Pass a region to restrict the scope.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn country_statistics(
        &self,
        Parameters(params): Parameters<StatisticsToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let countries = match self.client.fetch_all().await {
            Ok(countries) => countries,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to fetch country data: {e}. Try again, or use refresh_data if results look stale."
                ))]));
            }
        };

        let stats = compute_statistics(params.region.as_deref(), &countries, TOP_N);
        if stats.total_countries == 0
            && let Some(ref region) = params.region
        {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "No countries found for region '{region}'. Valid regions are Africa, Americas, Asia, Europe, Oceania, and Antarctic."
            ))]));
        }

        let text = stats.to_string();
        let scope = params.region.as_deref().unwrap_or("world");
        let uri = format!("countries://stats/{scope}");
        let name = format!("Statistics: {scope}");
        self.resources.insert(uri, name, text.clone()).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Clear the response cache so the next request fetches fresh data.
    #[tool(
        name = "refresh_data",
        description = "Clear the response cache so the next lookup of every kind bypasses cached data and fetches fresh data from the REST Countries API.",
        annotations(read_only_hint = false, idempotent_hint = true)
    )]
    async fn refresh_data(&self) -> Result<CallToolResult, McpError> {
        let dropped = self.cache.stats().size;
        self.cache.clear();
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Cache cleared ({dropped} entries dropped). The next lookup for every key will refetch from the API."
        ))]))
    }

    /// Report cache size and live keys.
    #[tool(
        name = "cache_stats",
        description = "Report the response cache's current entry count and live keys. Diagnostics only; makes no network call.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        let stats = self.cache.stats();
        let mut text = format!("Cached entries: {}\n", stats.size);
        for key in &stats.keys {
            let _ = writeln!(text, "  {key}");
        }
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

fn format_country_list(countries: &[Country]) -> String {
    let mut text = String::new();
    if countries.is_empty() {
        text.push_str("No countries found.\n");
        return text;
    }
    let _ = writeln!(text, "Found {} countries:\n", countries.len());
    for (i, country) in countries.iter().enumerate() {
        let _ = write!(
            text,
            "{}. **{}** ({})",
            i + 1,
            country.name.common,
            country.cca3
        );
        if !country.capital.is_empty() {
            let _ = write!(text, " — capital {}", country.capital.join(", "));
        }
        let _ = writeln!(
            text,
            "\n   {} | population {}",
            country.region,
            group_thousands(country.population)
        );
    }
    text
}

#[tool_handler]
impl ServerHandler for CountriesMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Country data MCP server backed by the REST Countries API.\n\
                 \n\
                 ## Tools\n\
                 - country_search: find countries by full or partial name; results include cca2/cca3 codes\n\
                 - country_details: full profile of one country by code (capital, population, area, density, languages, currencies, borders)\n\
                 - countries_by_region: list every country of a region\n\
                 - country_statistics: totals, region distribution, and top-10 rankings by population, area, and density (optionally per region)\n\
                 - refresh_data: clear the response cache so the next lookup fetches fresh data\n\
                 - cache_stats: inspect the response cache (entry count and live keys)\n\
                 \n\
                 ## Resources\n\
                 Data fetched by tools is stored as MCP resources under countries:// URIs. Use them to\n\
                 reference previously fetched data without a new lookup.\n\
                 \n\
                 ## Tips\n\
                 - Responses are cached for a few minutes; use refresh_data to force fresh data.\n\
                 - Region names: Africa, Americas, Asia, Europe, Oceania, Antarctic."
                    .into(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let entries = self.resources.list().await;
        let resources: Vec<Resource> = entries
            .into_iter()
            .map(|(uri, name)| Resource {
                annotations: None,
                raw: RawResource {
                    uri,
                    name,
                    title: None,
                    description: None,
                    mime_type: Some("text/plain".into()),
                    size: None,
                    icons: None,
                    meta: None,
                },
            })
            .collect();
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: None,
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let templates = vec![
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "countries://country/{code}".into(),
                    name: "Country".into(),
                    title: Some("Country profile".into()),
                    description: Some("Full country profile (fetched via country_details)".into()),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "countries://search/{name}".into(),
                    name: "Search Results".into(),
                    title: Some("Name search results".into()),
                    description: Some(
                        "Countries matching a name query (fetched via country_search)".into(),
                    ),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "countries://region/{region}".into(),
                    name: "Region Listing".into(),
                    title: Some("Countries of a region".into()),
                    description: Some(
                        "All countries of one region (fetched via countries_by_region)".into(),
                    ),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "countries://stats/{scope}".into(),
                    name: "Statistics".into(),
                    title: Some("Aggregate statistics".into()),
                    description: Some(
                        "Totals, region distribution, and rankings (fetched via country_statistics; scope is a region or \"world\")"
                            .into(),
                    ),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
        ];
        Ok(ListResourceTemplatesResult {
            resource_templates: templates,
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match self.resources.get(&request.uri).await {
            Some(entry) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(entry.text, request.uri)],
            }),
            None => Err(McpError::resource_not_found(
                format!("resource not found: {}", request.uri),
                None,
            )),
        }
    }
}

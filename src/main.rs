// Category Stdio Server: Place Reviews
//
// Serves the `get_reviews` tool over MCP stdio. Stdout carries the protocol,
// so all logging goes to stderr.

use anyhow::{Context, Result};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use place_reviews::{Config, ScrapeError, ScrapeRequest, browser_setup, load_yaml_config, report, scrape};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetReviewsArgs {
    /// Google Maps URL of the place
    pub url: String,

    /// Number of reviews to collect and summarize (default 20)
    #[serde(default)]
    pub num_reviews: Option<usize>,
}

#[derive(Clone)]
pub struct ReviewsServer {
    config: Arc<Config>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ReviewsServer {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Scrape reviews of a place from its Google Maps URL and return them with instructions to summarize the positive and negative aspects."
    )]
    async fn get_reviews(
        &self,
        Parameters(args): Parameters<GetReviewsArgs>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let count = args
            .num_reviews
            .unwrap_or(self.config.scrape.default_review_count);

        let request = ScrapeRequest::new(args.url, count).map_err(to_mcp_error)?;
        info!(url = %request.place_url, target = request.target_count, "get_reviews called");

        let result = match scrape(&request, &self.config, &context.ct).await {
            Ok(result) => result,
            Err(ScrapeError::InvalidRequest(msg)) => return Err(McpError::invalid_params(msg, None)),
            Err(e) => {
                error!(url = %request.place_url, error = %e, "get_reviews failed");
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Unexpected error occurred when collecting the reviews: {e}"
                ))]));
            }
        };

        let json = report::json_payload(&result)
            .map_err(|e| McpError::internal_error(format!("failed to serialize reviews: {e}"), None))?;

        Ok(CallToolResult::success(vec![
            Content::text(report::summary_prompt(&result)),
            Content::text(json),
        ]))
    }
}

fn to_mcp_error(err: ScrapeError) -> McpError {
    McpError::invalid_params(err.to_string(), None)
}

#[tool_handler]
impl ServerHandler for ReviewsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Collects Google Maps reviews for a place so they can be summarized. \
                 Pass the place URL and optionally how many reviews to collect."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut config = load_yaml_config().context("Failed to load configuration")?;

    // No browser means no call can ever succeed
    let chrome = browser_setup::resolve_browser_executable(&config.browser)
        .await
        .context("No usable Chrome/Chromium")?;
    info!(browser = %chrome.display(), "Browser available");
    config.browser.chromium_path = Some(chrome);

    let service = ReviewsServer::new(config)
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start MCP stdio server")?;

    service.waiting().await?;
    Ok(())
}

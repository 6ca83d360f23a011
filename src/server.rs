use crate::cache::{Cache, InMemoryCache};
use crate::config::ServerConfig;
use crate::handlers::health::handle_health;
use crate::handlers::research::handle_research;
use crate::llm::ProviderClient;
use crate::research::Researcher;
use crate::search::{SearchError, SearchResult, SearxSearchProvider};
use crate::webpage_parse::{HttpContentFetcher, WebpageParseError};
use rocket::figment::Figment;
use rocket::routes;
use std::sync::Arc;

#[derive(Debug)]
pub enum ServerError {
    Launch(rocket::Error),
    Search(SearchError),
    Fetcher(WebpageParseError),
}

impl std::error::Error for ServerError {}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Launch(e) => write!(f, "Server launch error: {}", e),
            ServerError::Search(e) => write!(f, "Search client setup error: {}", e),
            ServerError::Fetcher(e) => write!(f, "Content fetcher setup error: {}", e),
        }
    }
}

pub struct ServerState {
    pub researcher: Arc<Researcher>,
    pub max_depth: u32,
    pub max_breadth: usize,
}

pub fn create_server(config: &ServerConfig) -> Result<rocket::Rocket<rocket::Build>, ServerError> {
    let cache: Arc<dyn Cache<Vec<SearchResult>>> = Arc::new(InMemoryCache::new());
    let search = SearxSearchProvider::new(config.searx_url(), cache)
        .map_err(ServerError::Search)?
        .with_max_results(config.max_search_results)
        .with_cache_ttl(config.search_cache_ttl());
    let fetcher = HttpContentFetcher::new(config.fetch_timeout()).map_err(ServerError::Fetcher)?;
    let llm = ProviderClient::new(reqwest::Client::new());

    let state = ServerState {
        researcher: Arc::new(Researcher::new(
            Arc::new(llm),
            Arc::new(search),
            Arc::new(fetcher),
        )),
        max_depth: config.max_depth,
        max_breadth: config.max_breadth,
    };
    let figment = rocket::Config::figment().merge(("port", config.port));
    Ok(build_rocket(figment, state))
}

pub fn build_rocket(figment: Figment, state: ServerState) -> rocket::Rocket<rocket::Build> {
    rocket::custom(figment)
        .manage(state)
        .mount("/", routes![handle_research, handle_health])
}

pub async fn run_server(rocket: rocket::Rocket<rocket::Build>) -> Result<(), ServerError> {
    match rocket.launch().await {
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "failed to launch rocket server");
            Err(ServerError::Launch(e))
        }
    }
}

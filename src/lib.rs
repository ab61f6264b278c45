// Argo Chat - LLM routing agent, SQL analysis and charts over ARGO float data

pub mod config;
pub mod db;
pub mod models;
pub mod types;
pub mod agents;
pub mod llm;
pub mod search;    // Exa search/research and SerpAPI Google Light
pub mod sandbox;   // Local or Daytona execution of generated plotting code
pub mod analysis;  // Fallback charts and plot storage
pub mod ingest;    // NetCDF profile ETL
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}

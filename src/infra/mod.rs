// Adapters for the external HTTP services

pub mod firecrawl;
pub mod http_client;
pub mod hunter;
pub mod llm_client;
pub mod serper;

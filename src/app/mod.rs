pub mod ports;
pub mod discover_use_case;
pub mod enrich_use_case;

pub mod fetch_cache;

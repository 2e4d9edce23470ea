pub mod country_client;

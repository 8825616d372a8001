pub mod execute;
pub mod graphql;
pub mod http;
pub mod plugin;
pub mod plugin_manager;

pub mod bulletin;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod fuzzy;
pub mod history;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod store;
pub mod table;
pub mod vocab;
pub mod zones;

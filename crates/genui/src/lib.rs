pub mod agent;
pub mod data;
pub mod dcm;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod protocol;
pub mod providers;
pub mod registry;
pub mod renderer;
pub mod schema;
pub mod toolkits;

pub mod base;
pub mod configs;
pub mod factory;
pub mod mock;
pub mod openai;
pub mod utils;

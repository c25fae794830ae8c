pub mod azure_openai;
pub mod mock;

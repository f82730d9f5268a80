pub mod openai;

pub use openai::{openai_client, OpenAIProvider, OPENAI_KEY_VAR};

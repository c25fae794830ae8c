pub mod credential;
pub mod providers;

pub use credential::{
    shared_credential, ApiKeyCredential, AuthHeader, AzureCliCredential, CredentialProvider,
    StaticTokenCredential, COGNITIVE_SERVICES_SCOPE,
};
pub use providers::azure_openai::AzureOpenAiProvider;
pub use providers::mock::ScriptedProvider;

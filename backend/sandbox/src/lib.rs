pub mod code_block;
pub mod docker;
pub mod executor;
pub mod local;

use std::sync::Arc;

use confab_config::SandboxConfig;

pub use code_block::{extract_code_blocks, CodeBlock};
pub use docker::DockerExecutor;
pub use executor::{CodeExecutor, ExecutionResult, ScriptLanguage, WorkDir, TIMEOUT_EXIT_CODE};
pub use local::LocalExecutor;

/// Build the executor the sandbox config asks for.
pub fn build_executor(config: &SandboxConfig) -> Arc<dyn CodeExecutor> {
    let work_dir = WorkDir::new(&config.work_dir);
    if config.use_docker {
        Arc::new(DockerExecutor::new(work_dir, &config.image, config.timeout_secs))
    } else {
        Arc::new(LocalExecutor::new(work_dir, config.timeout_secs))
    }
}

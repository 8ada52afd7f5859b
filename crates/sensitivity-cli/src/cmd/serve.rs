use std::path::Path;

pub fn run(config_path: &Path, port: u16) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let orchestrator = super::build_orchestrator(&config)?;
    let state = sensitivity_server::AppState::new(orchestrator);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(sensitivity_server::serve(state, port))
}

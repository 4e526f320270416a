//! Subcommand handlers.

use crate::output;
use ce_core::config::load_config;
use ce_core::config::validate_run_configuration;
use ce_core::config::AppConfig;
use ce_core::dataset::Table;
use ce_core::engine::Orchestrator;
use ce_core::executors::PromptBook;
use ce_core::init::generate_project_structure;
use ce_core::init::InitOptions;
use ce_core::ledger::FileLedger;
use ce_core::ledger::RunLedger;
use ce_core::models::LanguageModel;
use ce_core::models::ModelFactory;
use ce_core::models::ScriptedModel;
use ce_core::sandbox::CodeSandbox;
use ce_core::sandbox::DisabledSandbox;
use ce_core::sandbox::PythonSandbox;
use ce_core::state::transition::initial_state;
use ce_core::state::RunManager;
use ce_protocol::AgentState;
use ce_protocol::ModelSettings;
use ce_protocol::ProblemType;
use ce_protocol::RunConfiguration;
use ce_protocol::RunSettings;
use color_eyre::eyre::eyre;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing::warn;

/// Optional `provision` flags overriding the `[run]` and `[model]` defaults.
pub struct ProvisionOverrides {
    pub retry_limit: Option<u32>,
    pub sleep_seconds: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tool_rounds: Option<u32>,
    pub model: Option<String>,
}

pub async fn init(root: &Path, force: bool, minimal: bool) -> Result<()> {
    let written = generate_project_structure(InitOptions {
        target_dir: root.to_path_buf(),
        force,
        minimal,
    })
    .await?;
    output::print_written(&written);
    Ok(())
}

pub async fn provision(
    root: &Path,
    data: &Path,
    target: &str,
    problem_type: ProblemType,
    overrides: ProvisionOverrides,
) -> Result<()> {
    let config = load_config(root).await?;
    let table = Table::from_path(data)?;
    table.require_column(target)?;

    let dataset_name = data
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| data.display().to_string());
    let mut settings =
        RunSettings::new(target, problem_type, dataset_name).with_run_defaults(&config.global.run);
    settings.model = overrides
        .model
        .unwrap_or_else(|| config.global.model.name.clone());
    if let Some(retry_limit) = overrides.retry_limit {
        settings.retry_limit = retry_limit;
    }
    if let Some(sleep_seconds) = overrides.sleep_seconds {
        settings.sleep_seconds = sleep_seconds;
    }
    if let Some(temperature) = overrides.temperature {
        settings.temperature = temperature;
    }
    if let Some(max_tool_rounds) = overrides.max_tool_rounds {
        settings.max_tool_rounds = max_tool_rounds;
    }
    validate_run_configuration(&settings.run_configuration())?;

    let ledger = FileLedger::new(config.logs_dir(root));
    let run_id = ledger.provision(&settings, &table.to_records_json())?;
    info!(run_id = %run_id, rows = table.row_count(), "run provisioned");
    output::print_provisioned(&settings, &table);
    Ok(())
}

pub async fn run(root: &Path, run_id: &str, model_override: Option<String>) -> Result<()> {
    let config = load_config(root).await?;
    let registry = config.registry()?;
    let ledger = Arc::new(FileLedger::new(config.logs_dir(root)));

    // An unprovisioned run still goes through the orchestrator so that it
    // reports CONFIG_NOT_SAVED like any other consumer would see it. No stage
    // runs, so it gets a model that is never called.
    let (state, run_config, model) = if ledger.is_provisioned(run_id) {
        let settings = ledger.load_settings(run_id)?;
        let records = ledger.load_dataset(run_id)?;
        let state = initial_state(&settings, records, &registry);
        let model = create_model(&config, model_override.unwrap_or_else(|| settings.model.clone())).await?;
        (state, settings.run_configuration(), model)
    } else {
        let state = AgentState::new("", "[]", registry.entry());
        let model: Arc<dyn LanguageModel> = Arc::new(ScriptedModel::new());
        (state, RunConfiguration::new(run_id), model)
    };

    let stage_count = registry.len();
    let orchestrator = Orchestrator::new(model, sandbox(&config).await, ledger)
        .with_registry(registry)
        .with_prompts(PromptBook::builtin().with_overrides(config.prompts.clone()));
    let (events_tx, mut events_rx) = mpsc::channel(32);
    let manager = RunManager::new(Arc::new(orchestrator), events_tx);

    output::print_run_header(run_id, stage_count);
    let run_id = manager
        .start_run(state, run_config)
        .await
        .map_err(|e| eyre!("{e:#}"))?;

    let mut cancelled = false;
    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                output::print_event(&event);
                if event.is_terminal() {
                    if event.is_failure() {
                        return Err(eyre!("run {run_id} did not complete ({})", event.label()));
                    }
                    break;
                }
            }
            signal = tokio::signal::ctrl_c(), if !cancelled => {
                signal.wrap_err("failed to listen for Ctrl-C")?;
                warn!(run_id = %run_id, "cancelling run");
                manager.cancel_run(&run_id).await.map_err(|e| eyre!("{e:#}"))?;
                cancelled = true;
            }
        }
    }
    Ok(())
}

pub async fn history(root: &Path, json: bool) -> Result<()> {
    let config = load_config(root).await?;
    let runs = FileLedger::new(config.logs_dir(root)).list_runs()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    } else {
        output::print_history(&runs);
    }
    Ok(())
}

pub async fn show(root: &Path, run_id: &str, artifact: &str) -> Result<()> {
    let config = load_config(root).await?;
    let content = FileLedger::new(config.logs_dir(root)).read_artifact(run_id, artifact)?;
    println!("{content}");
    Ok(())
}

async fn create_model(config: &AppConfig, name: String) -> Result<Arc<dyn LanguageModel>> {
    let model = ModelFactory::create(&ModelSettings {
        name,
        api_key_env: config.global.model.api_key_env.clone(),
    })
    .map_err(|e| eyre!("{e:#}"))?;
    if !model.check_availability().await {
        warn!(model = model.name(), "model reports unavailable");
    }
    Ok(model)
}

async fn sandbox(config: &AppConfig) -> Arc<dyn CodeSandbox> {
    let settings = &config.global.sandbox;
    let python = PythonSandbox::new(
        settings.python.as_str(),
        Duration::from_secs(settings.timeout_seconds),
    );
    if python.check_availability().await {
        Arc::new(python)
    } else {
        warn!(interpreter = %settings.python, "interpreter not found, code execution disabled");
        Arc::new(DisabledSandbox)
    }
}

use anyhow::{Context, Result, bail};
use tracing::{Instrument, info, info_span, trace, warn};

use appflow_cli::logging::redact_value;
use appflow_cli::report::{parse_assignment, print_process, print_validations};
use appflow_runtime::{HttpFetcher, QueueKind, Runtime, RuntimeConfig, SaveOutcome, SubmitOutcome};
use appflow_validate::ValidationMode;

use crate::cli::{ConnectArgs, EditArgs, SubmitArgs, ValidateArgs};

/// Config file values, then flag overrides.
pub fn resolve_config(args: &ConnectArgs) -> Result<RuntimeConfig> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(instance) = &args.instance {
        config.instance = Some(instance.clone());
    }
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    if config.base_url.is_empty() {
        bail!("no app URL: pass --base-url or set base_url in the config file");
    }
    Ok(config)
}

/// Initialize and load the current task.
async fn open(config: RuntimeConfig) -> Result<(Runtime<HttpFetcher>, QueueKind)> {
    let fetcher = HttpFetcher::new(&config.language).context("create HTTP client")?;
    let mut runtime = Runtime::new(fetcher, config);
    runtime.initialize().await.context("initialize app")?;
    let kind = runtime
        .start_queue_for_current_task()
        .await
        .map_err(|err| anyhow::anyhow!("{}: {err}", err.user_message()))?;
    Ok((runtime, kind))
}

fn apply_updates(runtime: &mut Runtime<HttpFetcher>, args: &EditArgs) -> Result<()> {
    for arg in &args.set {
        let set = parse_assignment(arg)?;
        trace!(path = %set.path, value = redact_value(&set.value), "applying update");
        runtime
            .update_field(&set.path, set.value.as_str())
            .with_context(|| format!("update {}", set.path))?;
    }
    Ok(())
}

pub async fn run_app(args: &ConnectArgs) -> Result<bool> {
    let config = resolve_config(args)?;
    let span = info_span!("run", base_url = %config.base_url);
    let (runtime, kind) = open(config).instrument(span).await?;
    let state = runtime.state();
    print_process(runtime.process_state());
    println!("Queue: {kind}");
    if let Some(layout_set) = &state.layout_set {
        println!("Layout set: {layout_set}");
    }
    let pages: Vec<&str> = match state.page_order() {
        Some(order) => order.iter().map(String::as_str).collect(),
        None => state.layouts.ids().collect(),
    };
    if !pages.is_empty() {
        println!("Pages: {}", pages.join(", "));
    }
    println!("Fields: {}", state.form_data.len());
    if let Some(id) = &state.data_element_id {
        println!("Data element: {id}");
    }
    Ok(true)
}

pub async fn run_validate(args: &ValidateArgs) -> Result<bool> {
    let config = resolve_config(&args.connect)?;
    let (mut runtime, kind) = open(config).await?;
    if kind == QueueKind::InfoTask {
        bail!("the current task has no form to validate");
    }
    let mode = if args.complete {
        ValidationMode::Complete
    } else {
        ValidationMode::Partial
    };
    let result = runtime.client_validation(mode);
    print_validations(&result.validations);
    if result.invalid_data_types {
        println!("Some values do not match their declared type.");
    }
    Ok(!result.invalid_data_types && !result.validations.has_errors())
}

pub async fn run_save(args: &EditArgs) -> Result<bool> {
    let mut config = resolve_config(&args.connect)?;
    // Saves are explicit here.
    config.auto_save.enabled = false;
    let (mut runtime, _) = open(config).await?;
    apply_updates(&mut runtime, args)?;

    match runtime.save().await.context("save form data")? {
        SaveOutcome::Saved => println!("Saved."),
        SaveOutcome::Redirected { from, to } => {
            println!("Saved. Data element moved from {from} to {to}.");
        }
        SaveOutcome::Skipped => println!("Nothing to save for a stateless app."),
    }
    let validations = &runtime.state().validations;
    if !validations.is_empty() {
        print_validations(validations);
    }
    Ok(true)
}

pub async fn run_submit(args: &SubmitArgs) -> Result<bool> {
    let mut config = resolve_config(&args.edit.connect)?;
    config.auto_save.enabled = false;
    config.stop_on_warnings |= args.stop_on_warnings;
    let (mut runtime, _) = open(config).await?;
    apply_updates(&mut runtime, &args.edit)?;

    match runtime.submit().await.context("submit")? {
        SubmitOutcome::Blocked(validations) => {
            warn!("submission blocked by validation");
            print_validations(&validations);
            Ok(false)
        }
        SubmitOutcome::Advanced(state) => {
            info!(task = ?state.task_id, "process advanced");
            print_process(&state);
            Ok(true)
        }
    }
}

pub async fn run_poll(args: &ConnectArgs) -> Result<bool> {
    let config = resolve_config(args)?;
    let fetcher = HttpFetcher::new(&config.language).context("create HTTP client")?;
    let mut runtime = Runtime::new(fetcher, config);
    runtime.initialize().await.context("initialize app")?;
    print_process(runtime.process_state());

    let changed = runtime.check_if_updated().await.context("poll process")?;
    if changed {
        print_process(runtime.process_state());
    } else {
        println!("Process did not change.");
    }
    Ok(changed)
}

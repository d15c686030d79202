//! director-tasks - command line entry point
//!
//! Submits and inspects director tasks using the environment configuration
//! described in `config`.

use std::sync::Arc;

use anyhow::{bail, Context};
use director_tasks::config::Config;
use director_tasks::director::http::HttpDirector;
use director_tasks::director::Director;
use director_tasks::task::{AsyncTaskReporter, ClassifierOptions, TaskClassifier};
use director_tasks::version::probe_director_version;
use director_tasks::{TaskSubmitter, TaskTracker};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage:
  director-tasks version
  director-tasks tasks <deployment> [context-id]
  director-tasks deploy <manifest-path> [context-id]
  director-tasks recreate <deployment> [context-id]
  director-tasks delete <deployment> [context-id] [--force]";

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "director_tasks=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    let config = Config::from_env()?;
    info!("Using director at {}", config.director_url);
    let director: Arc<dyn Director> =
        Arc::new(HttpDirector::new(&config).context("Failed to build director client")?);

    let flags: Vec<&str> = args[1..]
        .iter()
        .map(String::as_str)
        .filter(|arg| arg.starts_with("--"))
        .collect();
    let positional: Vec<&str> = args[1..]
        .iter()
        .map(String::as_str)
        .filter(|arg| !arg.starts_with("--"))
        .collect();
    let context_id = positional.get(1).copied();

    let output = match (command.as_str(), positional.first()) {
        ("version", _) => {
            let version = probe_director_version(director.as_ref()).await?;
            json!({
                "version": version,
                "supports_odb": version.supports_odb(),
                "supports_lifecycle_errands": version.supports_lifecycle_errands(),
            })
        }
        ("tasks", Some(deployment)) => {
            let classifier = TaskClassifier::new(
                director.clone(),
                ClassifierOptions {
                    errand_exit_code_correction: config.errand_exit_code_correction,
                },
            );
            let tracker = TaskTracker::new(director, classifier, config.recent_tasks_limit);
            let tasks = match context_id {
                Some(context_id) => {
                    tracker
                        .get_normalised_tasks_by_context(deployment, context_id)
                        .await?
                }
                None => tracker.get_tasks(deployment).await?,
            };
            json!({
                "tasks": tasks,
                "incomplete": tasks.incomplete_tasks().len(),
                "failed": tasks.failed_tasks().len(),
                "all_done": tasks.all_tasks_are_done(),
            })
        }
        (operation @ ("deploy" | "recreate" | "delete"), Some(target)) => {
            let submitter = TaskSubmitter::new(director);
            let reporter = Arc::new(AsyncTaskReporter::new());
            let task_id = match operation {
                "deploy" => {
                    let manifest = tokio::fs::read_to_string(target)
                        .await
                        .with_context(|| format!("Failed to read manifest {}", target))?;
                    submitter.deploy(&manifest, context_id, reporter).await?
                }
                "recreate" => submitter.recreate(target, context_id, reporter).await?,
                _ => {
                    let force = flags.contains(&"--force");
                    submitter
                        .delete_deployment(target, context_id, force, reporter)
                        .await?
                }
            };
            // The director keeps running the task; this process only stops watching it.
            submitter.jobs().cancel_all();
            json!({ "task_id": task_id })
        }
        _ => bail!(USAGE),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

//! Submission of deployment-affecting operations.
//!
//! Director calls that mutate a deployment block until the director-side task
//! finishes. Callers only want to know the task was accepted, so each call
//! runs as a background job and the submitter returns as soon as the reporter
//! sees either the started task id or an error, whichever comes first.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::jobs::JobRegistry;
use super::reporter::AsyncTaskReporter;
use super::{Operation, TaskError};
use crate::director::cell::CellError;
use crate::director::{
    Deployment, Director, DirectorError, RecreateOpts, TaskContext, UpdateOpts,
};

#[derive(Deserialize)]
struct ManifestHeader {
    #[serde(default)]
    name: Option<String>,
}

/// Deployment name declared at the top level of a manifest.
pub fn deployment_name_from_manifest(manifest: &str) -> Result<String, TaskError> {
    let header: ManifestHeader =
        serde_yaml::from_str(manifest).map_err(|e| TaskError::InvalidManifest(e.to_string()))?;
    match header.name.map(|name| name.trim().to_string()) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(TaskError::InvalidManifest(
            "manifest does not declare a deployment name".to_string(),
        )),
    }
}

pub struct TaskSubmitter {
    director: Arc<dyn Director>,
    jobs: JobRegistry,
}

impl TaskSubmitter {
    pub fn new(director: Arc<dyn Director>) -> Self {
        Self::with_jobs(director, JobRegistry::new())
    }

    pub fn with_jobs(director: Arc<dyn Director>, jobs: JobRegistry) -> Self {
        Self { director, jobs }
    }

    /// Background jobs started by this submitter.
    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Apply `manifest`, returning the id of the task the director started.
    pub async fn deploy(
        &self,
        manifest: &str,
        context_id: Option<&str>,
        reporter: Arc<AsyncTaskReporter>,
    ) -> Result<u64, TaskError> {
        let deployment = deployment_name_from_manifest(manifest)?;
        let manifest = manifest.to_string();
        self.submit(
            Operation::Deploy,
            &deployment,
            context_id,
            reporter,
            move |deployment, ctx| async move {
                deployment
                    .update(&manifest, UpdateOpts::default(), ctx)
                    .await
            },
        )
        .await
    }

    /// Recreate every instance of `deployment`.
    pub async fn recreate(
        &self,
        deployment: &str,
        context_id: Option<&str>,
        reporter: Arc<AsyncTaskReporter>,
    ) -> Result<u64, TaskError> {
        self.submit(
            Operation::Recreate,
            deployment,
            context_id,
            reporter,
            |deployment, ctx| async move {
                deployment.recreate(RecreateOpts::default(), ctx).await
            },
        )
        .await
    }

    /// Delete `deployment`; `force` ignores errors while tearing it down.
    pub async fn delete_deployment(
        &self,
        deployment: &str,
        context_id: Option<&str>,
        force: bool,
        reporter: Arc<AsyncTaskReporter>,
    ) -> Result<u64, TaskError> {
        self.submit(
            Operation::Delete,
            deployment,
            context_id,
            reporter,
            move |deployment, ctx| async move { deployment.delete(force, ctx).await },
        )
        .await
    }

    async fn submit<C, F>(
        &self,
        operation: Operation,
        deployment_name: &str,
        context_id: Option<&str>,
        reporter: Arc<AsyncTaskReporter>,
        call: C,
    ) -> Result<u64, TaskError>
    where
        C: FnOnce(Arc<dyn Deployment>, TaskContext) -> F + Send + 'static,
        F: Future<Output = Result<(), DirectorError>> + Send + 'static,
    {
        let started = reporter
            .take_started_receiver()
            .map_err(TaskError::ReporterReused)?;
        let failed = reporter
            .take_error_receiver()
            .map_err(TaskError::ReporterReused)?;

        let deployment = self
            .director
            .find_deployment(deployment_name)
            .await
            .map_err(|source| match source {
                DirectorError::DeploymentNotFound(_) => TaskError::DeploymentNotFound {
                    deployment: deployment_name.to_string(),
                },
                source => TaskError::FindDeployment {
                    deployment: deployment_name.to_string(),
                    source,
                },
            })?;

        let ctx = TaskContext::new(context_id.map(str::to_string), reporter.clone());
        let name = deployment_name.to_string();
        let job_id = self.jobs.spawn(operation, deployment_name, move |cancel| async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(TaskError::Cancelled {
                    operation,
                    deployment: name.clone(),
                }),
                result = call(deployment, ctx) => result.map_err(|source| TaskError::Operation {
                    operation,
                    deployment: name.clone(),
                    source,
                }),
            };
            match outcome {
                Ok(()) if !reporter.is_started() => publish_error(
                    &reporter,
                    TaskError::NoTaskStarted {
                        operation,
                        deployment: name,
                    },
                ),
                Ok(()) => debug!(deployment = %name, %operation, "director call completed"),
                // The director task keeps running; only this process stops following it.
                Err(TaskError::Cancelled { .. }) if reporter.is_started() => {
                    info!(deployment = %name, %operation, "stopped watching director task")
                }
                Err(err) => publish_error(&reporter, err),
            }
        });

        tokio::select! {
            biased;
            task_id = started => match task_id {
                Ok(task_id) => {
                    self.jobs.record_task(job_id, task_id);
                    info!(deployment = deployment_name, %operation, task_id, "director accepted task");
                    Ok(task_id)
                }
                Err(_) => Err(TaskError::NoTaskStarted {
                    operation,
                    deployment: deployment_name.to_string(),
                }),
            },
            err = failed => match err {
                Ok(err) => {
                    warn!(deployment = deployment_name, %operation, "submission failed: {}", err);
                    Err(err)
                }
                Err(_) => Err(TaskError::NoTaskStarted {
                    operation,
                    deployment: deployment_name.to_string(),
                }),
            },
        }
    }
}

/// Hand `err` to a waiting submitter, or log it once nobody is waiting.
fn publish_error(reporter: &AsyncTaskReporter, err: TaskError) {
    let message = err.to_string();
    match reporter.report_error(err) {
        Ok(()) => {}
        Err(CellError::ReceiverDropped) => {
            warn!("director call failed after its task was accepted: {}", message)
        }
        Err(e) => warn!("could not report submission error '{}': {}", message, e),
    }
}

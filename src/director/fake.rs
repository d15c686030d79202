//! In-memory director used by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{
    Deployment, Director, DirectorError, DirectorInfo, RecreateOpts, TaskContext, TaskReporter,
    TasksFilter, UpdateOpts,
};
use crate::task::{Operation, Task};

/// What a fake deployment does when a mutating call arrives.
#[derive(Debug, Clone)]
pub(crate) enum Behaviour {
    /// Report `task_id` started, wait for `release`, then finish in `finish_state`.
    Start { task_id: u64, finish_state: String },
    /// Fail before any task is reported.
    FailImmediately(String),
    /// Report `task_id` started, wait for `release`, then fail.
    StartThenFail { task_id: u64, message: String },
    /// Return successfully without ever reporting a task.
    NoTask,
    /// Never return.
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeploymentCall {
    pub operation: Operation,
    pub context_id: Option<String>,
    pub manifest: Option<String>,
    pub force: bool,
}

pub(crate) struct FakeDeployment {
    name: String,
    behaviour: Behaviour,
    /// Lets a started call run to completion.
    pub release: Notify,
    /// Notified once a call has returned.
    pub ended: Notify,
    pub calls: Mutex<Vec<DeploymentCall>>,
}

impl FakeDeployment {
    pub fn new(name: &str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behaviour,
            release: Notify::new(),
            ended: Notify::new(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<DeploymentCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn run(&self, call: DeploymentCall, ctx: TaskContext) -> Result<(), DirectorError> {
        self.calls.lock().unwrap().push(call);
        let result = self.act(ctx.reporter.as_ref()).await;
        self.ended.notify_one();
        result
    }

    async fn act(&self, reporter: &dyn TaskReporter) -> Result<(), DirectorError> {
        let to_director_err = |e: super::ReporterError| DirectorError::UnexpectedResponse(e.to_string());
        match &self.behaviour {
            Behaviour::Start {
                task_id,
                finish_state,
            } => {
                reporter.task_started(*task_id).map_err(to_director_err)?;
                self.release.notified().await;
                reporter
                    .task_finished(*task_id, finish_state)
                    .map_err(to_director_err)?;
                if finish_state == "done" {
                    Ok(())
                } else {
                    Err(DirectorError::TaskFailed {
                        task_id: *task_id,
                        state: finish_state.clone(),
                    })
                }
            }
            Behaviour::FailImmediately(message) => Err(DirectorError::Transport(message.clone())),
            Behaviour::StartThenFail { task_id, message } => {
                reporter.task_started(*task_id).map_err(to_director_err)?;
                self.release.notified().await;
                Err(DirectorError::Transport(message.clone()))
            }
            Behaviour::NoTask => Ok(()),
            Behaviour::Hang => futures::future::pending().await,
        }
    }
}

#[async_trait]
impl Deployment for FakeDeployment {
    fn name(&self) -> &str {
        &self.name
    }

    async fn update(
        &self,
        manifest: &str,
        _opts: UpdateOpts,
        ctx: TaskContext,
    ) -> Result<(), DirectorError> {
        let call = DeploymentCall {
            operation: Operation::Deploy,
            context_id: ctx.context_id.clone(),
            manifest: Some(manifest.to_string()),
            force: false,
        };
        self.run(call, ctx).await
    }

    async fn recreate(&self, _opts: RecreateOpts, ctx: TaskContext) -> Result<(), DirectorError> {
        let call = DeploymentCall {
            operation: Operation::Recreate,
            context_id: ctx.context_id.clone(),
            manifest: None,
            force: false,
        };
        self.run(call, ctx).await
    }

    async fn delete(&self, force: bool, ctx: TaskContext) -> Result<(), DirectorError> {
        let call = DeploymentCall {
            operation: Operation::Delete,
            context_id: ctx.context_id.clone(),
            manifest: None,
            force,
        };
        self.run(call, ctx).await
    }
}

#[derive(Default)]
pub(crate) struct FakeDirector {
    version: String,
    deployments: HashMap<String, Arc<FakeDeployment>>,
    recent: Vec<Task>,
    by_context: Vec<Task>,
    outputs: HashMap<u64, Vec<Vec<u8>>>,
    pub find_error: Option<String>,
    pub recent_error: Option<String>,
    pub context_error: Option<String>,
    pub output_error_for: Option<u64>,
    pub recent_calls: Mutex<Vec<(usize, TasksFilter)>>,
    pub output_calls: Mutex<Vec<u64>>,
}

impl FakeDirector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_deployment(mut self, deployment: Arc<FakeDeployment>) -> Self {
        self.deployments
            .insert(deployment.name().to_string(), deployment);
        self
    }

    pub fn with_recent_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.recent = tasks;
        self
    }

    /// Tasks served by `find_tasks_by_context_id`, matched on `context_id`.
    pub fn with_context_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.by_context = tasks;
        self
    }

    pub fn with_output(mut self, task_id: u64, chunks: &[&[u8]]) -> Self {
        self.outputs
            .insert(task_id, chunks.iter().map(|c| c.to_vec()).collect());
        self
    }

    pub fn output_calls(&self) -> Vec<u64> {
        self.output_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Director for FakeDirector {
    async fn info(&self) -> Result<DirectorInfo, DirectorError> {
        Ok(DirectorInfo {
            name: "fake".to_string(),
            uuid: "fake-uuid".to_string(),
            version: self.version.clone(),
        })
    }

    async fn find_deployment(&self, name: &str) -> Result<Arc<dyn Deployment>, DirectorError> {
        if let Some(message) = &self.find_error {
            return Err(DirectorError::Transport(message.clone()));
        }
        match self.deployments.get(name) {
            Some(deployment) => Ok(deployment.clone() as Arc<dyn Deployment>),
            None => Err(DirectorError::DeploymentNotFound(name.to_string())),
        }
    }

    async fn recent_tasks(
        &self,
        limit: usize,
        filter: TasksFilter,
    ) -> Result<Vec<Task>, DirectorError> {
        self.recent_calls.lock().unwrap().push((limit, filter));
        if let Some(message) = &self.recent_error {
            return Err(DirectorError::Transport(message.clone()));
        }
        // Deliberately ignores the deployment filter, like older directors.
        Ok(self.recent.iter().take(limit).cloned().collect())
    }

    async fn find_tasks_by_context_id(&self, context_id: &str) -> Result<Vec<Task>, DirectorError> {
        if let Some(message) = &self.context_error {
            return Err(DirectorError::Transport(message.clone()));
        }
        Ok(self
            .by_context
            .iter()
            .filter(|task| task.context_id == context_id)
            .cloned()
            .collect())
    }

    async fn task_result_output(
        &self,
        task_id: u64,
        reporter: &dyn TaskReporter,
    ) -> Result<(), DirectorError> {
        self.output_calls.lock().unwrap().push(task_id);
        if self.output_error_for == Some(task_id) {
            return Err(DirectorError::TaskNotFound(task_id));
        }
        for chunk in self.outputs.get(&task_id).into_iter().flatten() {
            reporter
                .task_output_chunk(task_id, chunk)
                .map_err(|e| DirectorError::UnexpectedResponse(e.to_string()))?;
        }
        Ok(())
    }
}

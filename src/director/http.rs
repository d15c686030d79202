//! Director REST client.
//!
//! Mutating calls are answered with a redirect to `/tasks/{id}`. The client
//! reports that task as started, polls it until it leaves the running states,
//! reports it as finished, and only then returns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{
    Deployment, Director, DirectorError, DirectorInfo, RecreateOpts, TaskContext, TaskReporter,
    TasksFilter, UpdateOpts,
};
use crate::config::{Config, DirectorCredentials};
use crate::task::task::STATE_DONE;
use crate::task::{Task, TaskState};

const CONTEXT_ID_HEADER: &str = "X-Bosh-Context-Id";

#[derive(Clone)]
struct DirectorHttp {
    base_url: String,
    client: reqwest::Client,
    credentials: Option<DirectorCredentials>,
    poll_interval: Duration,
}

impl DirectorHttp {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    /// Send and reject anything that is neither a success nor a redirect.
    async fn send(&self, request: RequestBuilder) -> Result<Response, DirectorError> {
        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() || status.is_redirection() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DirectorError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DirectorError> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            DirectorError::UnexpectedResponse(format!("GET {}: {} - {}", path, e, text))
        })
    }

    /// Issue a task-creating request and follow the task to its end.
    async fn run_task(&self, request: RequestBuilder, ctx: TaskContext) -> Result<(), DirectorError> {
        let request = match &ctx.context_id {
            Some(context_id) => request.header(CONTEXT_ID_HEADER, context_id),
            None => request,
        };
        let resp = self.send(request).await?;
        if !resp.status().is_redirection() {
            return Err(DirectorError::UnexpectedResponse(format!(
                "expected a task redirect, got {}",
                resp.status()
            )));
        }
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DirectorError::UnexpectedResponse("task redirect without location".to_string()))?;
        let task_id = task_id_from_location(location)?;

        if let Err(e) = ctx.reporter.task_started(task_id) {
            warn!(task_id, "task reporter rejected start: {}", e);
        }

        let state = self.wait_for_task(task_id).await?;
        if let Err(e) = ctx.reporter.task_finished(task_id, &state) {
            warn!(task_id, "task reporter rejected finish: {}", e);
        }

        if state == STATE_DONE {
            Ok(())
        } else {
            Err(DirectorError::TaskFailed { task_id, state })
        }
    }

    async fn wait_for_task(&self, task_id: u64) -> Result<String, DirectorError> {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            let task: Task = self
                .get_json(&format!("/tasks/{}", task_id))
                .await
                .map_err(|e| match e {
                    DirectorError::Api { status: 404, .. } => DirectorError::TaskNotFound(task_id),
                    other => other,
                })?;
            if let Some(state) = finished_state(&task) {
                return Ok(state.to_string());
            }
            debug!(task_id, state = %task.state, "waiting for director task");
        }
    }
}

/// The state a polled task ended in, or `None` while it is still running.
fn finished_state(task: &Task) -> Option<&str> {
    match task.state_type() {
        TaskState::Incomplete => None,
        _ => Some(task.state.as_str()),
    }
}

/// Parse the task id out of a `Location` such as `https://director/tasks/77`.
fn task_id_from_location(location: &str) -> Result<u64, DirectorError> {
    let path = location.trim_end_matches('/');
    path.rsplit_once("/tasks/")
        .and_then(|(_, id)| id.parse().ok())
        .ok_or_else(|| {
            DirectorError::UnexpectedResponse(format!("unexpected task location '{}'", location))
        })
}

fn query_string(params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();
    format!("?{}", pairs.join("&"))
}

fn update_query(opts: UpdateOpts) -> String {
    let mut params = Vec::new();
    if opts.recreate {
        params.push(("recreate", "true".to_string()));
    }
    if opts.fix {
        params.push(("fix", "true".to_string()));
    }
    if opts.skip_drain {
        params.push(("skip_drain", "*".to_string()));
    }
    if opts.dry_run {
        params.push(("dry_run", "true".to_string()));
    }
    query_string(&params)
}

fn recreate_query(opts: RecreateOpts) -> String {
    let mut params = vec![("state", "recreate".to_string())];
    if opts.fix {
        params.push(("fix", "true".to_string()));
    }
    if opts.skip_drain {
        params.push(("skip_drain", "*".to_string()));
    }
    if opts.dry_run {
        params.push(("dry_run", "true".to_string()));
    }
    query_string(&params)
}

fn tasks_query(limit: usize, filter: &TasksFilter) -> String {
    let verbose = if filter.all { "2" } else { "1" };
    let mut params = vec![
        ("verbose", verbose.to_string()),
        ("limit", limit.to_string()),
    ];
    if let Some(deployment) = &filter.deployment {
        params.push(("deployment", deployment.clone()));
    }
    query_string(&params)
}

fn context_tasks_query(context_id: &str) -> String {
    query_string(&[
        ("context_id", context_id.to_string()),
        ("verbose", "2".to_string()),
    ])
}

/// Director reached over HTTP.
pub struct HttpDirector {
    http: DirectorHttp,
}

impl HttpDirector {
    pub fn new(config: &Config) -> Result<Self, DirectorError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http: DirectorHttp {
                base_url: config.director_url.as_str().trim_end_matches('/').to_string(),
                client,
                credentials: config.credentials.clone(),
                poll_interval: config.task_poll_interval,
            },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }
}

#[async_trait]
impl Director for HttpDirector {
    async fn info(&self) -> Result<DirectorInfo, DirectorError> {
        self.http.get_json("/info").await
    }

    async fn find_deployment(&self, name: &str) -> Result<Arc<dyn Deployment>, DirectorError> {
        let path = format!("/deployments/{}", urlencoding::encode(name));
        match self.http.send(self.http.request(Method::GET, &path)).await {
            Ok(_) => {
                let deployment: Arc<dyn Deployment> = Arc::new(HttpDeployment {
                    name: name.to_string(),
                    http: self.http.clone(),
                });
                Ok(deployment)
            }
            Err(DirectorError::Api { status: 404, .. }) => {
                Err(DirectorError::DeploymentNotFound(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn recent_tasks(
        &self,
        limit: usize,
        filter: TasksFilter,
    ) -> Result<Vec<Task>, DirectorError> {
        self.http
            .get_json(&format!("/tasks{}", tasks_query(limit, &filter)))
            .await
    }

    async fn find_tasks_by_context_id(&self, context_id: &str) -> Result<Vec<Task>, DirectorError> {
        self.http
            .get_json(&format!("/tasks{}", context_tasks_query(context_id)))
            .await
    }

    async fn task_result_output(
        &self,
        task_id: u64,
        reporter: &dyn TaskReporter,
    ) -> Result<(), DirectorError> {
        let path = format!("/tasks/{}/output?type=result", task_id);
        let resp = self
            .http
            .send(self.http.request(Method::GET, &path))
            .await
            .map_err(|e| match e {
                DirectorError::Api { status: 404, .. } => DirectorError::TaskNotFound(task_id),
                other => other,
            })?;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Err(e) = reporter.task_output_chunk(task_id, &chunk) {
                warn!(task_id, "task reporter rejected output chunk: {}", e);
            }
        }
        Ok(())
    }
}

struct HttpDeployment {
    name: String,
    http: DirectorHttp,
}

impl HttpDeployment {
    fn path(&self) -> String {
        format!("/deployments/{}", urlencoding::encode(&self.name))
    }
}

#[async_trait]
impl Deployment for HttpDeployment {
    fn name(&self) -> &str {
        &self.name
    }

    async fn update(
        &self,
        manifest: &str,
        opts: UpdateOpts,
        ctx: TaskContext,
    ) -> Result<(), DirectorError> {
        let request = self
            .http
            .request(Method::POST, &format!("/deployments{}", update_query(opts)))
            .header(CONTENT_TYPE, "text/yaml")
            .body(manifest.to_string());
        self.http.run_task(request, ctx).await
    }

    async fn recreate(&self, opts: RecreateOpts, ctx: TaskContext) -> Result<(), DirectorError> {
        let request = self
            .http
            .request(
                Method::PUT,
                &format!("{}/jobs/*{}", self.path(), recreate_query(opts)),
            )
            .header(CONTENT_TYPE, "text/yaml")
            .body(String::new());
        self.http.run_task(request, ctx).await
    }

    async fn delete(&self, force: bool, ctx: TaskContext) -> Result<(), DirectorError> {
        let query = if force {
            query_string(&[("force", "true".to_string())])
        } else {
            String::new()
        };
        let request = self
            .http
            .request(Method::DELETE, &format!("{}{}", self.path(), query));
        self.http.run_task(request, ctx).await
    }
}

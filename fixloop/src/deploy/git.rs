//! Git push deployer

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::app::options::DeploymentConfig;
use crate::deploy::{
    ConfigValidation, DeployOptions, DeployResult, Deployer, DeploymentPhase, DeploymentStatus,
    RollbackResult,
};
use crate::errors::LoopError;
use crate::http::client::HttpClient;

/// Captured output of one git invocation
#[derive(Debug)]
struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

#[derive(Debug, Clone)]
struct LastDeploy {
    commit: String,
    branch: String,
}

/// Deploys by committing the working tree and pushing it to a remote the
/// hosting provider builds from
pub struct GitDeployer {
    config: DeploymentConfig,
    http: HttpClient,
    last: Mutex<Option<LastDeploy>>,
}

impl GitDeployer {
    pub fn new(config: DeploymentConfig, http: HttpClient) -> Self {
        Self {
            config,
            http,
            last: Mutex::new(None),
        }
    }

    /// Fill the URL template for a branch and commit
    pub fn render_url(&self, branch: &str, commit: &str) -> String {
        let short = &commit[..commit.len().min(7)];
        self.config
            .url_template
            .replace("{branch}", &branch.replace('/', "-"))
            .replace("{commit}", short)
    }

    async fn git(&self, args: &[&str]) -> Result<GitOutput, LoopError> {
        debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .current_dir(&self.config.repo_dir)
            .args(args)
            .output()
            .await
            .map_err(|e| LoopError::DeployError(format!("Failed to run git: {}", e)))?;

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Run a git step, appending its output to `logs`. Returns stdout on
    /// success and the failure message otherwise.
    async fn step(&self, args: &[&str], logs: &mut Vec<String>) -> Result<Result<String, String>, LoopError> {
        let out = self.git(args).await?;
        logs.push(format!("$ git {}", args.join(" ")));
        if !out.stdout.is_empty() {
            logs.push(out.stdout.clone());
        }
        if !out.stderr.is_empty() {
            logs.push(out.stderr.clone());
        }
        if out.success {
            Ok(Ok(out.stdout))
        } else {
            error!("git {} failed: {}", args[0], out.stderr);
            Ok(Err(format!("git {} failed: {}", args[0], out.stderr)))
        }
    }

    fn remember(&self, last: LastDeploy) {
        let mut guard = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(last);
    }

    fn last_deploy(&self) -> Option<LastDeploy> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Deployer for GitDeployer {
    async fn deploy(&self, options: DeployOptions) -> Result<DeployResult, LoopError> {
        let branch = match (&options.branch_name, options.create_branch) {
            (Some(name), true) => name.clone(),
            _ => self.config.branch.clone(),
        };
        info!("Deploying {} to {} ({})", branch, self.config.remote, self.config.target);

        let mut logs = Vec::new();

        if options.create_branch {
            if let Err(e) = self.step(&["checkout", "-B", branch.as_str()], &mut logs).await? {
                return Ok(DeployResult::failed(e, logs));
            }
        }
        if let Err(e) = self.step(&["add", "-A"], &mut logs).await? {
            return Ok(DeployResult::failed(e, logs));
        }
        if let Err(e) = self
            .step(&["commit", "--allow-empty", "-m", options.commit_message.as_str()], &mut logs)
            .await?
        {
            return Ok(DeployResult::failed(e, logs));
        }
        let commit = match self.step(&["rev-parse", "HEAD"], &mut logs).await? {
            Ok(hash) => hash,
            Err(e) => return Ok(DeployResult::failed(e, logs)),
        };

        let refspec = format!("HEAD:{}", branch);
        let mut push = vec!["push", self.config.remote.as_str(), refspec.as_str()];
        if options.create_branch {
            push.push("--force");
        }
        if let Err(e) = self.step(&push, &mut logs).await? {
            return Ok(DeployResult::failed(e, logs));
        }

        let url = self.render_url(&branch, &commit);
        info!("Pushed {} to {}, deployment URL {}", commit, branch, url);
        self.remember(LastDeploy {
            commit: commit.clone(),
            branch: branch.clone(),
        });

        Ok(DeployResult {
            success: true,
            deployment_url: Some(url),
            commit_hash: Some(commit),
            branch: Some(branch),
            error: None,
            logs,
        })
    }

    async fn check_status(&self, url: &str) -> Result<DeploymentStatus, LoopError> {
        let status = match self.http.probe(url).await {
            // Gateway errors while the provider swaps the build in
            Ok(502..=504) => DeploymentPhase::Deploying,
            Ok(code) => {
                debug!("{} answered {}", url, code);
                DeploymentPhase::Success
            }
            Err(LoopError::HttpError(e)) if e.is_connect() || e.is_timeout() => {
                debug!("{} not reachable yet: {}", url, e);
                DeploymentPhase::Deploying
            }
            Err(e) => return Err(e),
        };

        let completed_at = status.is_terminal().then(Utc::now);
        Ok(DeploymentStatus {
            status,
            url: url.to_string(),
            logs: Vec::new(),
            started_at: None,
            completed_at,
        })
    }

    async fn rollback(&self) -> Result<RollbackResult, LoopError> {
        let Some(last) = self.last_deploy() else {
            warn!("Rollback requested but nothing was deployed");
            return Ok(RollbackResult {
                success: false,
                previous_commit: None,
                error: Some("nothing to roll back".to_string()),
            });
        };

        info!("Rolling back {} on {}", last.commit, last.branch);
        let mut logs = Vec::new();
        if let Err(e) = self.step(&["revert", "--no-edit", last.commit.as_str()], &mut logs).await? {
            return Ok(RollbackResult {
                success: false,
                previous_commit: Some(last.commit),
                error: Some(e),
            });
        }
        let refspec = format!("HEAD:{}", last.branch);
        if let Err(e) = self
            .step(&["push", self.config.remote.as_str(), refspec.as_str()], &mut logs)
            .await?
        {
            return Ok(RollbackResult {
                success: false,
                previous_commit: Some(last.commit),
                error: Some(e),
            });
        }

        Ok(RollbackResult {
            success: true,
            previous_commit: Some(last.commit),
            error: None,
        })
    }

    async fn validate_config(&self) -> Result<ConfigValidation, LoopError> {
        let mut errors = Vec::new();

        let repo = Path::new(&self.config.repo_dir);
        if !repo.join(".git").exists() {
            errors.push(format!("{} is not a git working tree", repo.display()));
        }
        if self.config.remote.trim().is_empty() {
            errors.push("deployment.remote must not be empty".to_string());
        }
        if self.config.branch.trim().is_empty() {
            errors.push("deployment.branch must not be empty".to_string());
        }
        let template = &self.config.url_template;
        if !(template.starts_with("http://") || template.starts_with("https://")) {
            errors.push("deployment.url_template must be an http(s) URL".to_string());
        } else if url::Url::parse(&template.replace("{branch}", "b").replace("{commit}", "c")).is_err() {
            errors.push(format!("deployment.url_template is not a valid URL: {}", template));
        }

        Ok(ConfigValidation::from_errors(errors))
    }
}

// Copyright 2025 Cowboy AI, LLC.

//! Workflow configuration validation
//!
//! The validator is an ordered list of independent, side-effect-free rules
//! reduced over one workflow. Every applicable rule contributes its
//! violations; nothing short-circuits, and callers must not depend on the
//! ordering of the returned messages. Extensions append rules to the base
//! list, so composing validators is list concatenation.

use crate::docker_image::ImageReferenceChecker;
use crate::schedule::parse_offset;
use crate::workflow::Workflow;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

/// Maximum length of component and workflow ids
pub const MAX_ID_LENGTH: usize = 256;
/// Maximum length of the configured commit sha
pub const MAX_COMMIT_SHA_LENGTH: usize = 256;
/// Maximum length of a secret name
pub const MAX_SECRET_NAME_LENGTH: usize = 253;
/// Maximum length of a secret mount path
pub const MAX_SECRET_MOUNT_PATH_LENGTH: usize = 1024;
/// Maximum length of a service account
pub const MAX_SERVICE_ACCOUNT_LENGTH: usize = 256;
/// Maximum number of resources
pub const MAX_RESOURCES: usize = 5;
/// Maximum length of a resource name
pub const MAX_RESOURCE_LENGTH: usize = 256;
/// Maximum number of env entries
pub const MAX_ENV_VARS: usize = 128;
/// Maximum total serialized size of the env mapping, in bytes
pub const MAX_ENV_SIZE: usize = 16 * 1024;
/// Smallest allowed running timeout
pub const MIN_RUNNING_TIMEOUT: Duration = Duration::from_secs(60);

type Rule = Box<dyn Fn(&Workflow, &mut Vec<String>) + Send + Sync>;

/// Validates workflow configurations against the platform's rules
///
/// Build one with [`WorkflowValidator::builder`]; the builder appends the
/// optional service-side rules (running-timeout ceiling, secret whitelist) to
/// the base rule set.
pub struct WorkflowValidator {
    rules: Vec<Rule>,
}

impl WorkflowValidator {
    /// Start building a validator around the given image checker
    pub fn builder(image_checker: Arc<dyn ImageReferenceChecker>) -> WorkflowValidatorBuilder {
        WorkflowValidatorBuilder {
            image_checker,
            max_running_timeout: None,
            secret_whitelist: None,
        }
    }

    /// Validate one workflow, returning all violations found
    ///
    /// An empty result means the workflow is acceptable. The order of the
    /// returned messages is unspecified.
    pub fn validate_workflow(&self, workflow: &Workflow) -> Vec<String> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            rule(workflow, &mut violations);
        }
        violations
    }
}

/// Builder assembling the rule list of a [`WorkflowValidator`]
pub struct WorkflowValidatorBuilder {
    image_checker: Arc<dyn ImageReferenceChecker>,
    max_running_timeout: Option<Duration>,
    secret_whitelist: Option<HashSet<String>>,
}

impl WorkflowValidatorBuilder {
    /// Also enforce an upper bound on the running timeout
    pub fn with_max_running_timeout_limit(mut self, limit: Duration) -> Self {
        self.max_running_timeout = Some(limit);
        self
    }

    /// Also require configured secrets to appear in the given allow-set
    pub fn with_secret_whitelist(mut self, whitelist: HashSet<String>) -> Self {
        self.secret_whitelist = Some(whitelist);
        self
    }

    /// Assemble the validator: base rules first, configured extensions after
    pub fn build(self) -> WorkflowValidator {
        let mut rules: Vec<Rule> = vec![
            Box::new(check_ids),
            Box::new(check_schedule),
            Box::new(check_offset),
            Box::new(check_field_limits),
            Box::new(check_running_timeout_floor),
        ];

        let image_checker = self.image_checker;
        rules.push(Box::new(move |workflow, violations| {
            if let Some(image) = &workflow.configuration.docker_image {
                for problem in image_checker.check_image_reference(image) {
                    violations.push(format!("invalid image: {problem}"));
                }
            }
        }));

        if let Some(limit) = self.max_running_timeout {
            rules.push(Box::new(move |workflow, violations| {
                if let Some(timeout) = workflow.configuration.running_timeout {
                    if timeout > limit {
                        violations.push(limit_msg(
                            "running timeout is too big",
                            format_args!("{timeout:?}"),
                            format_args!("{limit:?}"),
                        ));
                    }
                }
            }));
        }

        if let Some(whitelist) = self.secret_whitelist {
            rules.push(Box::new(move |workflow, violations| {
                if let Some(secret) = &workflow.configuration.secret {
                    if !whitelist.contains(&secret.name) {
                        violations.push(format!("secret {} is not whitelisted", secret.name));
                    }
                }
            }));
        }

        WorkflowValidator { rules }
    }
}

fn limit_msg(what: &str, value: impl Display, limit: impl Display) -> String {
    format!("{what}: {value}, limit = {limit}")
}

fn check_ids(workflow: &Workflow, violations: &mut Vec<String>) {
    let component_id = workflow.component_id();
    if component_id.is_empty() {
        violations.push("component id cannot be empty".to_string());
    }
    if component_id.contains('#') {
        violations.push("component id cannot contain #".to_string());
    }
    if component_id.len() > MAX_ID_LENGTH {
        violations.push(limit_msg(
            "component id too long",
            component_id.len(),
            MAX_ID_LENGTH,
        ));
    }

    let configured_id = &workflow.configuration.id;
    if configured_id.is_empty() {
        violations.push("workflow id cannot be empty".to_string());
    }
    if configured_id != workflow.workflow_id() {
        violations.push("workflow id mismatch".to_string());
    }
    if configured_id.len() > MAX_ID_LENGTH {
        violations.push(limit_msg("id too long", configured_id.len(), MAX_ID_LENGTH));
    }
}

fn check_schedule(workflow: &Workflow, violations: &mut Vec<String>) {
    if !workflow.configuration.schedule.is_valid() {
        violations.push("invalid schedule".to_string());
    }
}

fn check_offset(workflow: &Workflow, violations: &mut Vec<String>) {
    if let Some(offset) = &workflow.configuration.offset {
        if let Err(err) = parse_offset(offset) {
            violations.push(format!("invalid offset: {err}"));
        }
    }
}

fn check_field_limits(workflow: &Workflow, violations: &mut Vec<String>) {
    let cfg = &workflow.configuration;

    if let Some(commit_sha) = &cfg.commit_sha {
        if commit_sha.len() > MAX_COMMIT_SHA_LENGTH {
            violations.push(limit_msg(
                "commitSha too long",
                commit_sha.len(),
                MAX_COMMIT_SHA_LENGTH,
            ));
        }
    }

    if let Some(secret) = &cfg.secret {
        if secret.name.len() > MAX_SECRET_NAME_LENGTH {
            violations.push(limit_msg(
                "secret name too long",
                secret.name.len(),
                MAX_SECRET_NAME_LENGTH,
            ));
        }
        if secret.mount_path.len() > MAX_SECRET_MOUNT_PATH_LENGTH {
            violations.push(limit_msg(
                "secret mount path too long",
                secret.mount_path.len(),
                MAX_SECRET_MOUNT_PATH_LENGTH,
            ));
        }
    }

    if let Some(service_account) = &cfg.service_account {
        if service_account.len() > MAX_SERVICE_ACCOUNT_LENGTH {
            violations.push(limit_msg(
                "service account too long",
                service_account.len(),
                MAX_SERVICE_ACCOUNT_LENGTH,
            ));
        }
    }

    if cfg.resources.len() > MAX_RESOURCES {
        violations.push(limit_msg(
            "too many resources",
            cfg.resources.len(),
            MAX_RESOURCES,
        ));
    }
    for resource in &cfg.resources {
        if resource.len() > MAX_RESOURCE_LENGTH {
            violations.push(limit_msg(
                "resource name too long",
                resource.len(),
                MAX_RESOURCE_LENGTH,
            ));
        }
    }

    if cfg.env.len() > MAX_ENV_VARS {
        violations.push(limit_msg("too many env vars", cfg.env.len(), MAX_ENV_VARS));
    }
    let env_size: usize = cfg.env.iter().map(|(k, v)| k.len() + v.len()).sum();
    if env_size > MAX_ENV_SIZE {
        violations.push(limit_msg("env too big", env_size, MAX_ENV_SIZE));
    }
}

fn check_running_timeout_floor(workflow: &Workflow, violations: &mut Vec<String>) {
    if let Some(timeout) = workflow.configuration.running_timeout {
        if timeout < MIN_RUNNING_TIMEOUT {
            violations.push(limit_msg(
                "running timeout is too small",
                format_args!("{timeout:?}"),
                format_args!("{:?}", MIN_RUNNING_TIMEOUT),
            ));
        }
    }
}

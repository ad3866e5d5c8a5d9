// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Domain registry: discovery, disjoint `task_type` ownership, and dispatch.
//!
//! The original daemon indexed domains by `task_type` in a plain dict;
//! registering two domains that claim the same `task_type` silently let the
//! later one win. This registry instead rejects the registration outright,
//! so a packaging mistake is caught at startup rather than showing up as a
//! task quietly running the wrong handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Domain, DomainHandle, ProgressCallback};
use crate::error::CoreError;
use crate::task::{TaskData, TaskResult};

/// Central registry of all task domains known to the daemon.
#[derive(Clone, Default)]
pub struct DomainRegistry {
    domains: HashMap<String, DomainHandle>,
    /// task_type -> owning domain id.
    task_owner: HashMap<String, String>,
}

impl DomainRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a domain, claiming every `task_type` it reports.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if this domain's id is already
    /// registered, or if any of its `task_type`s is already claimed by a
    /// different domain. Registration is all-or-nothing: on error, the
    /// registry is left unchanged.
    pub fn register(&mut self, domain: DomainHandle) -> Result<(), CoreError> {
        let id = domain.id().to_string();
        if self.domains.contains_key(&id) {
            return Err(CoreError::Configuration(format!(
                "domain '{id}' is already registered"
            )));
        }

        let task_types = domain.task_types();
        for task_type in &task_types {
            if let Some(owner) = self.task_owner.get(task_type) {
                return Err(CoreError::Configuration(format!(
                    "task_type '{task_type}' claimed by domain '{id}' is already owned by domain '{owner}'"
                )));
            }
        }

        for task_type in task_types {
            self.task_owner.insert(task_type, id.clone());
        }
        self.domains.insert(id, domain);
        Ok(())
    }

    /// Looks up a domain by id.
    pub fn get_domain(&self, domain_id: &str) -> Option<&DomainHandle> {
        self.domains.get(domain_id)
    }

    /// Looks up the domain that claims a given `task_type`.
    pub fn get_domain_for_task_type(&self, task_type: &str) -> Option<&DomainHandle> {
        let owner = self.task_owner.get(task_type)?;
        self.domains.get(owner)
    }

    /// Whether any registered domain claims `task_type`.
    pub fn handles_task_type(&self, task_type: &str) -> bool {
        self.task_owner.contains_key(task_type)
    }

    /// All `task_type`s known across every registered domain.
    pub fn all_task_types(&self) -> Vec<String> {
        self.task_owner.keys().cloned().collect()
    }

    /// All registered domains.
    pub fn domains(&self) -> impl Iterator<Item = &DomainHandle> {
        self.domains.values()
    }

    /// Executes a task by dispatching it to the domain that claims its
    /// `task_type`.
    ///
    /// # Errors
    ///
    /// Propagates the owning domain's own `Err`, if it throws instead of
    /// returning `success: false`. An unclaimed `task_type` is not an error:
    /// it comes back as `Ok(TaskResult::err(...))`, a normal failed result a
    /// caller can merge into node/task output the same way as any other
    /// domain failure.
    pub async fn execute_task(
        &self,
        task_type: &str,
        task_data: &TaskData,
    ) -> Result<TaskResult, CoreError> {
        let Some(domain) = self.get_domain_for_task_type(task_type) else {
            return Ok(TaskResult::err(format!("No domain handles task type: {task_type}")));
        };
        domain.execute_task(task_type, task_data).await
    }

    /// Executes a task with progress reporting, dispatching to the owning
    /// domain exactly as [`DomainRegistry::execute_task`] does.
    pub async fn execute_task_with_progress(
        &self,
        task_type: &str,
        task_data: &TaskData,
        on_progress: ProgressCallback,
    ) -> Result<TaskResult, CoreError> {
        let Some(domain) = self.get_domain_for_task_type(task_type) else {
            return Ok(TaskResult::err(format!("No domain handles task type: {task_type}")));
        };
        domain.execute_task_with_progress(task_type, task_data, on_progress).await
    }

    /// Calls [`Domain::initialize`] on every registered domain. Failures are
    /// logged and otherwise ignored: a domain that fails to initialize stays
    /// registered but may error on every task it is asked to run.
    pub async fn initialize_all(&self) {
        for domain in self.domains.values() {
            if let Err(err) = domain.initialize().await {
                tracing::error!(domain = domain.id(), error = %err, "domain initialization failed");
            }
        }
    }

    /// Calls [`Domain::dispose`] on every registered domain.
    pub async fn dispose_all(&self) {
        for domain in self.domains.values() {
            domain.dispose().await;
        }
    }
}

/// Shared, cloneable handle to a registry, suitable for embedding in
/// application state.
pub type SharedRegistry = Arc<DomainRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubDomain {
        id: &'static str,
        task_types: Vec<&'static str>,
    }

    #[async_trait]
    impl Domain for StubDomain {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        fn task_types(&self) -> Vec<String> {
            self.task_types.iter().map(|s| s.to_string()).collect()
        }

        async fn execute_task(
            &self,
            _task_type: &str,
            _task_data: &TaskData,
        ) -> Result<TaskResult, CoreError> {
            Ok(TaskResult::ok_empty())
        }
    }

    fn stub(id: &'static str, task_types: &[&'static str]) -> DomainHandle {
        Arc::new(StubDomain { id, task_types: task_types.to_vec() })
    }

    #[test]
    fn register_claims_all_task_types() {
        let mut registry = DomainRegistry::new();
        registry.register(stub("calculator", &["calculate", "convert_units"])).unwrap();
        assert!(registry.handles_task_type("calculate"));
        assert!(registry.handles_task_type("convert_units"));
        assert!(!registry.handles_task_type("get_weather"));
    }

    #[test]
    fn duplicate_domain_id_is_rejected() {
        let mut registry = DomainRegistry::new();
        registry.register(stub("calculator", &["calculate"])).unwrap();
        let err = registry.register(stub("calculator", &["convert_units"])).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        assert!(!registry.handles_task_type("convert_units"));
    }

    #[test]
    fn duplicate_task_type_across_domains_is_rejected_loudly() {
        let mut registry = DomainRegistry::new();
        registry.register(stub("calculator", &["calculate"])).unwrap();
        let err = registry.register(stub("other", &["calculate"])).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        // The first registration's claim must survive the rejected second one.
        assert_eq!(
            registry.get_domain_for_task_type("calculate").unwrap().id(),
            "calculator"
        );
        assert!(registry.get_domain("other").is_none());
    }

    #[tokio::test]
    async fn execute_task_dispatches_to_owning_domain() {
        let mut registry = DomainRegistry::new();
        registry.register(stub("calculator", &["calculate"])).unwrap();
        let result = registry.execute_task("calculate", &TaskData::new()).await.unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn execute_task_for_unknown_type_returns_failed_result_not_error() {
        let registry = DomainRegistry::new();
        let result = registry.execute_task("does_not_exist", &TaskData::new()).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("No domain handles task type: does_not_exist"));
    }
}

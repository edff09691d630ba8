//! # Task Registry
//!
//! Typed catalog of task kinds. Each [`TaskDefinition`] carries its identifier,
//! its [`TaskProfile`], a configuration check deciding whether the kind is
//! enabled, and a factory producing the worker. Definitions are grouped into
//! named [`TaskPackage`]s which the task manager scans on demand.

use crate::config::AcquisitionConfig;
use crate::i18n::Translations;
use crate::task::{TaskProfile, TaskWorker};
use crate::tasks::{CertifiedMailer, HttpTimestampAuthority, TimestampAuthority};
use crate::time_source::{NtpTimeSource, TimeSource};
use std::fmt;
use std::sync::Arc;

pub type EnabledCheck = Arc<dyn Fn(&AcquisitionConfig) -> bool + Send + Sync>;
pub type WorkerFactory = Arc<dyn Fn(&TaskDependencies) -> Arc<dyn TaskWorker> + Send + Sync>;

/// Services shared by every worker of a run
#[derive(Clone)]
pub struct TaskDependencies {
    pub config: Arc<AcquisitionConfig>,
    pub translations: Arc<Translations>,
    pub time_source: Arc<dyn TimeSource>,
    pub timestamp_authority: Arc<dyn TimestampAuthority>,
    pub certified_mailer: Option<Arc<dyn CertifiedMailer>>,
}

impl TaskDependencies {
    /// NTP clock and HTTP timestamp authority from `config`, English labels, no mailer
    pub fn new(config: AcquisitionConfig) -> Self {
        let time_source = Arc::new(NtpTimeSource::from_config(&config.network_check));
        let timestamp_authority = Arc::new(HttpTimestampAuthority::from_config(&config.timestamp));
        Self {
            config: Arc::new(config),
            translations: Arc::new(Translations::english()),
            time_source,
            timestamp_authority,
            certified_mailer: None,
        }
    }

    pub fn with_translations(mut self, translations: Translations) -> Self {
        self.translations = Arc::new(translations);
        self
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn with_timestamp_authority(mut self, authority: Arc<dyn TimestampAuthority>) -> Self {
        self.timestamp_authority = authority;
        self
    }

    pub fn with_certified_mailer(mut self, mailer: Arc<dyn CertifiedMailer>) -> Self {
        self.certified_mailer = Some(mailer);
        self
    }
}

impl fmt::Debug for TaskDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDependencies")
            .field("time_source", &self.time_source.describe())
            .field("certified_mailer", &self.certified_mailer.is_some())
            .finish()
    }
}

/// One registrable task kind
#[derive(Clone)]
pub struct TaskDefinition {
    pub identifier: String,
    pub profile: TaskProfile,
    enabled: EnabledCheck,
    factory: WorkerFactory,
}

impl TaskDefinition {
    /// Definition that is always enabled
    pub fn new<F>(identifier: impl Into<String>, profile: TaskProfile, factory: F) -> Self
    where
        F: Fn(&TaskDependencies) -> Arc<dyn TaskWorker> + Send + Sync + 'static,
    {
        Self {
            identifier: identifier.into(),
            profile,
            enabled: Arc::new(|_| true),
            factory: Arc::new(factory),
        }
    }

    /// Gate the definition on a configuration flag
    pub fn enabled_when<F>(mut self, check: F) -> Self
    where
        F: Fn(&AcquisitionConfig) -> bool + Send + Sync + 'static,
    {
        self.enabled = Arc::new(check);
        self
    }

    pub fn class_name(&self) -> &str {
        &self.profile.class_name
    }

    pub fn is_enabled(&self, config: &AcquisitionConfig) -> bool {
        (self.enabled)(config)
    }

    pub fn create_worker(&self, deps: &TaskDependencies) -> Arc<dyn TaskWorker> {
        (self.factory)(deps)
    }

    /// True when `name` is this definition's identifier or class name
    pub fn answers_to(&self, name: &str) -> bool {
        self.identifier == name || self.profile.class_name == name
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("identifier", &self.identifier)
            .field("class_name", &self.profile.class_name)
            .field("is_infinite_loop", &self.profile.is_infinite_loop)
            .finish()
    }
}

/// Named group of task definitions
#[derive(Debug, Clone)]
pub struct TaskPackage {
    pub name: String,
    pub definitions: Vec<TaskDefinition>,
}

impl TaskPackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definitions: Vec::new(),
        }
    }

    pub fn with_task(mut self, definition: TaskDefinition) -> Self {
        self.definitions.push(definition);
        self
    }
}

/// Catalog of every known package, keyed by package name
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    packages: Vec<TaskPackage>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the `infinite_loop`, `network_tools` and `post_acquisition` packages
    pub fn with_builtin_packages() -> Self {
        let mut registry = Self::new();
        for package in crate::tasks::builtin_packages() {
            registry.add_package(package);
        }
        registry
    }

    /// Add a package; a package with the same name is replaced
    pub fn add_package(&mut self, package: TaskPackage) {
        match self.packages.iter_mut().find(|p| p.name == package.name) {
            Some(existing) => *existing = package,
            None => self.packages.push(package),
        }
    }

    pub fn package(&self, name: &str) -> Option<&TaskPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn package_names(&self) -> Vec<String> {
        self.packages.iter().map(|p| p.name.clone()).collect()
    }
}

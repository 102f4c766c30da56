use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::ProvisionError;
use crate::output::Output;
use crate::resource::{DependencyView, Resource, ResourceKind};
use crate::state::{ProvisionState, ResourceRecord};

/// Lifecycle of one provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Declared,
    Diffing,
    Applying,
    Applied,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Create,
    Update,
    Noop,
}

impl PlannedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Noop => "no-op",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub name: String,
    pub kind: ResourceKind,
    pub action: PlannedAction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ApplySummary {
    pub fn changed(&self) -> usize {
        self.created + self.updated
    }
}

struct ExportBinding {
    key: String,
    resource: String,
    attribute: String,
    output: Output<String>,
}

/// Declarative engine: resources are declared with dependency edges, then
/// diffed against the recorded state and applied in dependency order.
///
/// Declaring registers intent only; nothing touches the platform until
/// `apply`. The state file is persisted after every successful resource so
/// an aborted or failed run leaves upstream resources adoptable on retry.
pub struct Engine {
    state_path: PathBuf,
    state: ProvisionState,
    resources: Vec<Box<dyn Resource>>,
    exports: Vec<ExportBinding>,
    phase: RunPhase,
}

impl Engine {
    pub fn new(state_path: impl Into<PathBuf>) -> Result<Self, ProvisionError> {
        let state_path = state_path.into();
        let state = ProvisionState::load(&state_path)?;
        Ok(Self {
            state_path,
            state,
            resources: Vec::new(),
            exports: Vec::new(),
            phase: RunPhase::Declared,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn state(&self) -> &ProvisionState {
        &self.state
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn declare(&mut self, resource: Box<dyn Resource>) -> Result<(), ProvisionError> {
        if self
            .resources
            .iter()
            .any(|declared| declared.name() == resource.name())
        {
            return Err(ProvisionError::Configuration(format!(
                "resource '{}' is declared twice",
                resource.name()
            )));
        }
        debug!(
            resource = resource.name(),
            kind = resource.kind().as_str(),
            "declared resource"
        );
        self.resources.push(resource);
        Ok(())
    }

    /// Registers a string-keyed export backed by one attribute of a
    /// declared resource. The returned handle resolves once that resource
    /// has applied.
    pub fn export(
        &mut self,
        key: impl Into<String>,
        resource: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Result<Output<String>, ProvisionError> {
        let key = key.into();
        let resource = resource.into();
        if !self.resources.iter().any(|r| r.name() == resource) {
            return Err(ProvisionError::Configuration(format!(
                "export '{key}' references undeclared resource '{resource}'"
            )));
        }
        if self.exports.iter().any(|binding| binding.key == key) {
            return Err(ProvisionError::Configuration(format!(
                "export '{key}' is registered twice"
            )));
        }
        let output = Output::pending(key.clone());
        self.exports.push(ExportBinding {
            key,
            resource,
            attribute: attribute.into(),
            output: output.clone(),
        });
        Ok(output)
    }

    /// Computes the dependency-ordered plan without touching anything.
    pub fn plan(&mut self) -> Result<Vec<PlannedStep>, ProvisionError> {
        self.phase = RunPhase::Diffing;
        let plan = self.compute_plan()?;
        Ok(plan
            .into_iter()
            .map(|planned| PlannedStep {
                name: planned.name,
                kind: planned.kind,
                action: planned.action,
            })
            .collect())
    }

    /// Applies the plan in dependency order. On failure the run ends in
    /// `Failed` with every resource applied so far already persisted.
    pub fn apply(&mut self) -> Result<ApplySummary, ProvisionError> {
        self.phase = RunPhase::Diffing;
        let plan = match self.compute_plan() {
            Ok(plan) => plan,
            Err(error) => {
                self.phase = RunPhase::Failed;
                return Err(error);
            }
        };

        self.phase = RunPhase::Applying;
        let mut summary = ApplySummary::default();
        for planned in plan {
            match self.apply_one(&planned, &mut summary) {
                Ok(()) => {}
                Err(error) => {
                    self.phase = RunPhase::Failed;
                    warn!(
                        resource = planned.name.as_str(),
                        error = %error,
                        "apply failed; state keeps previously applied resources"
                    );
                    return Err(error);
                }
            }
        }

        if let Err(error) = self.record_exports() {
            self.phase = RunPhase::Failed;
            return Err(error);
        }
        self.phase = RunPhase::Applied;
        info!(
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            "apply complete"
        );
        Ok(summary)
    }

    fn apply_one(
        &mut self,
        planned: &PlannedResource,
        summary: &mut ApplySummary,
    ) -> Result<(), ProvisionError> {
        let resource = &self.resources[planned.index];
        match planned.action {
            PlannedAction::Noop => {
                debug!(resource = planned.name.as_str(), "unchanged");
                summary.unchanged += 1;
                return Ok(());
            }
            PlannedAction::Create | PlannedAction::Update => {
                info!(
                    resource = planned.name.as_str(),
                    action = planned.action.as_str(),
                    "applying resource"
                );
            }
        }

        let attributes = {
            let view = DependencyView::new(&self.state.resources);
            resource.apply(&view)?
        };
        self.state.resources.insert(
            planned.name.clone(),
            ResourceRecord {
                kind: planned.kind,
                fingerprint: planned.fingerprint.clone(),
                attributes,
                applied_at: Utc::now(),
            },
        );
        self.state.save(&self.state_path)?;
        match planned.action {
            PlannedAction::Create => summary.created += 1,
            PlannedAction::Update => summary.updated += 1,
            PlannedAction::Noop => unreachable!("no-op handled above"),
        }
        Ok(())
    }

    fn record_exports(&mut self) -> Result<(), ProvisionError> {
        for binding in &self.exports {
            let record = self.state.resources.get(&binding.resource).ok_or_else(|| {
                ProvisionError::Unresolved(format!("{}.{}", binding.resource, binding.attribute))
            })?;
            let value = record.attributes.get(&binding.attribute).ok_or_else(|| {
                ProvisionError::apply(
                    binding.resource.clone(),
                    format!("did not expose attribute '{}'", binding.attribute),
                )
            })?;
            binding.output.fulfill(value.clone());
            self.state
                .exports
                .insert(binding.key.clone(), value.clone());
        }
        self.state.save(&self.state_path)
    }

    fn compute_plan(&self) -> Result<Vec<PlannedResource>, ProvisionError> {
        let order = self.dependency_order()?;
        let mut plan = Vec::with_capacity(order.len());
        for index in order {
            let resource = &self.resources[index];
            let fingerprint = resource.fingerprint()?;
            let action = match self.state.resources.get(resource.name()) {
                None => PlannedAction::Create,
                Some(record) if record.fingerprint != fingerprint => PlannedAction::Update,
                Some(_) => PlannedAction::Noop,
            };
            plan.push(PlannedResource {
                index,
                name: resource.name().to_string(),
                kind: resource.kind(),
                fingerprint,
                action,
            });
        }
        Ok(plan)
    }

    /// Topological order over declared dependency edges; rejects unknown
    /// dependencies and cycles with the offending resource named.
    fn dependency_order(&self) -> Result<Vec<usize>, ProvisionError> {
        let positions: BTreeMap<&str, usize> = self
            .resources
            .iter()
            .enumerate()
            .map(|(index, resource)| (resource.name(), index))
            .collect();

        let mut order = Vec::with_capacity(self.resources.len());
        let mut resolved = BTreeSet::new();
        let mut in_progress = BTreeSet::new();
        for index in 0..self.resources.len() {
            self.visit(index, &positions, &mut resolved, &mut in_progress, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        index: usize,
        positions: &BTreeMap<&str, usize>,
        resolved: &mut BTreeSet<usize>,
        in_progress: &mut BTreeSet<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), ProvisionError> {
        if resolved.contains(&index) {
            return Ok(());
        }
        let resource = &self.resources[index];
        if !in_progress.insert(index) {
            return Err(ProvisionError::Configuration(format!(
                "dependency cycle through resource '{}'",
                resource.name()
            )));
        }
        for dependency in resource.dependencies() {
            let dep_index = positions.get(dependency.as_str()).ok_or_else(|| {
                ProvisionError::Configuration(format!(
                    "resource '{}' depends on undeclared resource '{dependency}'",
                    resource.name()
                ))
            })?;
            self.visit(*dep_index, positions, resolved, in_progress, order)?;
        }
        in_progress.remove(&index);
        resolved.insert(index);
        order.push(index);
        Ok(())
    }
}

struct PlannedResource {
    index: usize,
    name: String,
    kind: ResourceKind,
    fingerprint: String,
    action: PlannedAction,
}

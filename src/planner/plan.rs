//! Plan entries and their construction.

use serde::Serialize;
use tracing::debug;

use crate::config::ControlConfig;
use crate::definition::{ChangeDefinition, Definition, DefinitionKind, ResourceDefinition, ResourceType};
use crate::error::{PlanError, Result};

use super::action::{ActionPolicy, ReapplyGuard, RequiredAction};
use super::diff::render_difference;
use super::status::{ChangeStatus, DefinitionStatus, StatusResolver};

/// Address of a plan entry.
///
/// `resource:<type>:<name>` for resources and `change:<id>` for changes, so
/// the two kinds can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlanId(String);

impl PlanId {
    /// Id of a resource plan.
    #[must_use]
    pub fn resource(resource_type: ResourceType, name: &str) -> Self {
        Self(format!("resource:{}:{name}", resource_type.as_str()))
    }

    /// Id of a change plan.
    #[must_use]
    pub fn change(id: &str) -> Self {
        Self(format!("change:{id}"))
    }

    /// Id of the plan for `definition`.
    #[must_use]
    pub fn for_definition(definition: &Definition) -> Self {
        match definition {
            Definition::Resource(resource) => Self::resource(resource.resource_type, &resource.name),
            Definition::Change(change) => Self::change(&change.id),
        }
    }

    /// Kind of definition this id addresses.
    #[must_use]
    pub fn kind(&self) -> DefinitionKind {
        if self.0.starts_with("change:") {
            DefinitionKind::Change
        } else {
            DefinitionKind::Resource
        }
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The plan for one definition.
///
/// `difference` is present exactly when the status is `OUT_OF_SYNC` or
/// `DRIFTED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionPlan {
    id: PlanId,
    status: DefinitionStatus,
    required_action: RequiredAction,
    difference: Option<String>,
}

impl DefinitionPlan {
    /// Creates a plan entry.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::KindMismatch`] if `status` belongs to the other
    /// definition kind, or [`PlanError::DifferenceInvariant`] if `difference`
    /// is present without a mismatch or missing for one.
    pub fn new(
        id: PlanId,
        status: DefinitionStatus,
        required_action: RequiredAction,
        difference: Option<String>,
    ) -> Result<Self> {
        if id.kind() != status.kind() {
            return Err(PlanError::KindMismatch {
                id: id.to_string(),
                kind: status.kind().to_string(),
                status: status.to_string(),
            }
            .into());
        }

        match (status.is_mismatch(), difference.is_some()) {
            (true, false) => {
                return Err(PlanError::DifferenceInvariant {
                    id: id.to_string(),
                    status: status.to_string(),
                    message: String::from("requires a difference"),
                }
                .into());
            }
            (false, true) => {
                return Err(PlanError::DifferenceInvariant {
                    id: id.to_string(),
                    status: status.to_string(),
                    message: String::from("cannot carry a difference"),
                }
                .into());
            }
            _ => {}
        }

        Ok(Self {
            id,
            status,
            required_action,
            difference,
        })
    }

    /// Plan id.
    #[must_use]
    pub const fn id(&self) -> &PlanId {
        &self.id
    }

    /// Derived status.
    #[must_use]
    pub const fn status(&self) -> DefinitionStatus {
        self.status
    }

    /// Required action.
    #[must_use]
    pub const fn required_action(&self) -> RequiredAction {
        self.required_action
    }

    /// Rendered difference, if the status is a mismatch.
    #[must_use]
    pub fn difference(&self) -> Option<&str> {
        self.difference.as_deref()
    }
}

impl std::fmt::Display for DefinitionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.required_action, self.id, self.status)
    }
}

/// Builds plan entries one definition at a time.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    resolver: StatusResolver,
    policy: ActionPolicy,
}

impl PlanBuilder {
    /// Creates a builder.
    #[must_use]
    pub const fn new(resolver: StatusResolver, policy: ActionPolicy) -> Self {
        Self { resolver, policy }
    }

    /// Creates a builder for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a reapply guard pattern is invalid.
    pub fn from_config(config: &ControlConfig) -> Result<Self> {
        let resolver = StatusResolver::new(config.adapter(), config.connection.clone());
        let guard = ReapplyGuard::new(&config.strict_guards)?;
        Ok(Self::new(resolver, ActionPolicy::new(config.strict, guard)))
    }

    /// Builds the plan entry for `definition`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dialect does not support the definition, the
    /// lookup fails, or the resulting entry is inconsistent.
    pub async fn build(&self, definition: &Definition) -> Result<DefinitionPlan> {
        let plan = match definition {
            Definition::Resource(resource) => self.build_resource(resource).await?,
            Definition::Change(change) => self.build_change(change).await?,
        };
        debug!("Planned {plan}");
        Ok(plan)
    }

    async fn build_resource(&self, resource: &ResourceDefinition) -> Result<DefinitionPlan> {
        let resolution = self.resolver.resolve_resource(resource).await?;
        let status = DefinitionStatus::Resource(resolution.status);

        let difference = if status.is_mismatch() {
            resolution
                .live
                .as_deref()
                .and_then(|live| render_difference(live, &resolution.declared))
        } else {
            None
        };
        let action = self.policy.resolve(status, difference.as_deref());

        DefinitionPlan::new(
            PlanId::resource(resource.resource_type, &resource.name),
            status,
            action,
            difference,
        )
    }

    async fn build_change(&self, change: &ChangeDefinition) -> Result<DefinitionPlan> {
        let resolution = self.resolver.resolve_change(change).await?;
        let status = DefinitionStatus::Change(resolution.status);

        let difference = match (&resolution.status, &resolution.recorded) {
            (ChangeStatus::Drifted, Some(entry)) => entry
                .content
                .as_deref()
                .and_then(|content| render_difference(content, &change.sql))
                .or_else(|| {
                    render_difference(&format!("hash: {}", entry.hash), &format!("hash: {}", change.hash))
                }),
            _ => None,
        };
        let action = self.policy.resolve(status, difference.as_deref());

        DefinitionPlan::new(PlanId::change(&change.id), status, action, difference)
    }
}

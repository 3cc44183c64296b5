//! Planning module.
//!
//! This module compares declared definitions with the live state and decides
//! what each one needs: status derivation, action resolution, difference
//! rendering and plan entry construction.

mod action;
mod diff;
mod plan;
mod status;

pub use action::{ActionPolicy, ReapplyGuard, RequiredAction, resolve_action};
pub use diff::{removed_lines, render_difference};
pub use plan::{DefinitionPlan, PlanBuilder, PlanId};
pub use status::{
    ChangeResolution, ChangeStatus, DefinitionStatus, ResourceResolution, ResourceStatus, StatusResolver,
};

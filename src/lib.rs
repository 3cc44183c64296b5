// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Schema Control
//!
//! A declarative schema-control planning engine for `MySQL` and Postgres.
//!
//! ## Overview
//!
//! Schema objects (tables, views, routines, triggers, events, materialized
//! views) are declared as SQL files, and one-shot change scripts are declared
//! by id. Planning compares every declaration with the live database and
//! reports, per definition:
//!
//! - its status (`NOT_YET_APPLIED`, `UP_TO_DATE`, `OUT_OF_SYNC`, `DRIFTED`)
//! - the required action (`NOOP`, `CREATE`, `APPLY`, `REAPPLY`, `ERROR`)
//! - a line difference when the declared and live forms disagree
//!
//! Both sides of a comparison are first normalized by a dialect adapter, so
//! formatting-only differences never cause work. Nothing is ever executed
//! against the database.
//!
//! ## Modules
//!
//! - [`config`]: Control file parsing, validation and hashing
//! - [`definition`]: Declared resources and change scripts
//! - [`dialect`]: Per-language DDL normalization
//! - [`connection`]: Read-only access to the live state
//! - [`planner`]: Status resolution, action policy and plan entries
//! - [`workflow`]: Concurrent planning over all definitions
//! - [`uncontrolled`]: Live objects no definition declares
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! language: mysql
//! dialect: "5.7"
//! strict: true
//! connection:
//!   snapshot: live.json
//! definitions:
//!   - type: resource
//!     path: tables/user.sql
//!   - type: change
//!     id: 2024-01-backfill-users
//!     path: changes/backfill.sql
//!   - views/list.yml
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod connection;
pub mod definition;
pub mod dialect;
pub mod error;
pub mod planner;
pub mod uncontrolled;
pub mod workflow;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, ContentHasher, ControlConfig};
pub use connection::{DatabaseConnection, LiveResource, SnapshotConnection};
pub use definition::{Definition, ResourceType};
pub use dialect::{DatabaseLanguage, DialectAdapter, DialectVersion};
pub use error::{ControlError, Result};
pub use planner::{DefinitionPlan, PlanBuilder, RequiredAction};
pub use uncontrolled::{PullReport, UncontrolledFinder};
pub use workflow::{CancelHandle, CancelSignal, PlanReport, PlanWorkflow, build_plan_for_all};

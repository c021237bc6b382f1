//! Access-control subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrap:
//!     allow_fields / allow_group / create_group().add().assign()
//!     → rules appended per hash_target(controller, action)
//!
//! Request:
//!     caller attributes (set by middleware)
//!     → engine.rs (scan target's rules in registration order)
//!     → Denied | AllowAll | Granted(granules)
//! ```
//!
//! # Design Decisions
//! - First matching rule wins; later rules are never consulted
//! - No rules for a target is indistinguishable from an explicit deny
//! - Bad rules fail at registration, not at request time
//! - Denial is a value, never an error

pub mod attributes;
pub mod engine;
pub mod group;
pub mod rule;

pub use attributes::{AttributeValue, CallerAttributes};
pub use engine::{hash_target, AclEngine};
pub use group::{AclGroup, GroupBuilder};
pub use rule::{any_of, AclRule, Authorization, FieldMatchSet, FieldRequirement, Granules};

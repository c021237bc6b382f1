//! Rule store and authorization checks.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use super::attributes::CallerAttributes;
use super::group::{AclGroup, GroupBuilder};
use super::rule::{AclRule, Authorization, FieldMatchSet, FieldRequirement, Granules};
use crate::error::Error;

/// Stable key for a controller/action pair.
///
/// The two parts are separated by a NUL byte before hashing, so
/// `("ab", "c")` and `("a", "bc")` never share a key.
pub fn hash_target(controller: &str, action: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(controller.as_bytes());
    hasher.update([0u8]);
    hasher.update(action.as_bytes());
    hex::encode(hasher.finalize())
}

/// Access-control rules keyed by target.
///
/// Built during bootstrap and read-only afterwards; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct AclEngine {
    rules: HashMap<String, Vec<AclRule>>,
}

impl AclEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule for `controller`/`action`. An empty granule list grants
    /// everything.
    pub fn allow_fields(
        &mut self,
        controller: &str,
        action: &str,
        fields: FieldMatchSet,
        granules: impl Into<Granules>,
    ) -> Result<(), Error> {
        check_target(controller, action)?;
        let granules = granules.into();
        check_rule(controller, action, &fields, &granules)?;

        tracing::debug!(controller, action, fields = fields.len(), "ACL rule registered");
        self.rules
            .entry(hash_target(controller, action))
            .or_default()
            .push(AclRule { fields, granules });
        Ok(())
    }

    /// Register every entry of `group`. Nothing is registered if any entry
    /// is invalid.
    pub fn allow_group(&mut self, controller: &str, action: &str, group: &AclGroup) -> Result<(), Error> {
        check_target(controller, action)?;
        if group.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "ACL group assigned to {}::{} has no rules",
                controller, action
            )));
        }
        for (fields, granules) in group.entries() {
            check_rule(controller, action, fields, granules)?;
        }
        for (fields, granules) in group.entries() {
            self.allow_fields(controller, action, fields.clone(), granules.clone())?;
        }
        Ok(())
    }

    /// Start a fluent group that can be assigned in one step.
    pub fn create_group(&mut self) -> GroupBuilder<'_> {
        GroupBuilder::new(self)
    }

    /// First rule, in registration order, whose fields the caller satisfies
    /// decides. No match (or no rules at all) is a denial.
    pub fn is_allowed(&self, controller: &str, action: &str, caller: &CallerAttributes) -> Authorization {
        let decision = self
            .rules
            .get(&hash_target(controller, action))
            .and_then(|rules| rules.iter().find(|rule| rule.fields.is_satisfied_by(caller)))
            .map(|rule| Authorization::from(&rule.granules))
            .unwrap_or(Authorization::Denied);

        tracing::debug!(controller, action, decision = ?decision, "ACL decision");
        decision
    }

    /// True if the caller is granted `granule` on the target.
    pub fn is_permission_allowed(
        &self,
        controller: &str,
        action: &str,
        caller: &CallerAttributes,
        granule: &str,
    ) -> bool {
        self.is_allowed(controller, action, caller).allows(granule)
    }

    /// Number of rules registered for a target.
    pub fn rule_count(&self, controller: &str, action: &str) -> usize {
        self.rules
            .get(&hash_target(controller, action))
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn check_target(controller: &str, action: &str) -> Result<(), Error> {
    if controller.trim().is_empty() || action.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "ACL target needs a controller and an action".to_string(),
        ));
    }
    Ok(())
}

fn check_rule(controller: &str, action: &str, fields: &FieldMatchSet, granules: &Granules) -> Result<(), Error> {
    if fields.is_empty() {
        return Err(Error::EmptyFieldSet {
            controller: controller.to_string(),
            action: action.to_string(),
        });
    }
    for (name, requirement) in fields.iter() {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("ACL field name is empty".to_string()));
        }
        if matches!(requirement, FieldRequirement::AnyOf(values) if values.is_empty()) {
            return Err(Error::InvalidArgument(format!(
                "ACL field '{}' on {}::{} lists no acceptable values",
                name, controller, action
            )));
        }
    }
    if let Granules::Only(set) = granules {
        if set.iter().any(|g| g.trim().is_empty()) {
            return Err(Error::InvalidArgument("ACL granule name is empty".to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::rule::any_of;

    fn role(value: &str) -> CallerAttributes {
        CallerAttributes::new().with("role", value)
    }

    #[test]
    fn test_hash_target_is_stable_and_unambiguous() {
        assert_eq!(hash_target("Visitors", "index"), hash_target("Visitors", "index"));
        assert_ne!(hash_target("ab", "c"), hash_target("a", "bc"));
        assert_eq!(hash_target("a", "b").len(), 64);
    }

    #[test]
    fn test_default_deny() {
        let engine = AclEngine::new();
        assert_eq!(engine.is_allowed("X", "y", &role("guest")), Authorization::Denied);
    }

    #[test]
    fn test_first_match_wins() {
        let mut engine = AclEngine::new();
        engine
            .allow_fields("Reports", "export", FieldMatchSet::new().field("role", "admin"), ["csv"])
            .unwrap();
        engine
            .allow_fields("Reports", "export", FieldMatchSet::new().field("role", any_of(["admin", "staff"])), Granules::all())
            .unwrap();

        let admin = engine.is_allowed("Reports", "export", &role("admin"));
        assert_eq!(admin, Authorization::Granted(["csv".to_string()].into_iter().collect()));
        assert_eq!(engine.is_allowed("Reports", "export", &role("staff")), Authorization::AllowAll);
        assert!(engine.is_allowed("Reports", "export", &role("guest")).is_denied());
    }

    #[test]
    fn test_permission_allowed() {
        let mut engine = AclEngine::new();
        engine
            .allow_fields("Visitors", "edit", FieldMatchSet::new().field("role", "reception"), ["sign_out"])
            .unwrap();
        engine
            .allow_fields("Visitors", "edit", FieldMatchSet::new().field("role", "admin"), Vec::<String>::new())
            .unwrap();

        assert!(engine.is_permission_allowed("Visitors", "edit", &role("reception"), "sign_out"));
        assert!(!engine.is_permission_allowed("Visitors", "edit", &role("reception"), "delete"));
        assert!(engine.is_permission_allowed("Visitors", "edit", &role("admin"), "delete"));
        assert!(!engine.is_permission_allowed("Visitors", "edit", &role("guest"), "sign_out"));
    }

    #[test]
    fn test_rejects_empty_arguments() {
        let mut engine = AclEngine::new();
        assert!(matches!(
            engine.allow_fields("A", "b", FieldMatchSet::new(), Granules::all()),
            Err(Error::EmptyFieldSet { .. })
        ));
        assert!(matches!(
            engine.allow_fields("", "b", FieldMatchSet::new().field("role", "x"), Granules::all()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.allow_fields("A", "b", FieldMatchSet::new().field("role", any_of(Vec::<String>::new())), Granules::all()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_group_assign() {
        let mut engine = AclEngine::new();
        let group = engine
            .create_group()
            .add(FieldMatchSet::new().field("role", "admin"), Granules::all())
            .add(FieldMatchSet::new().field("role", "reception"), ["view"])
            .assign("Visitors", "index")
            .unwrap();

        engine.allow_group("Visitors", "report", &group).unwrap();

        assert_eq!(engine.rule_count("Visitors", "index"), 2);
        assert_eq!(engine.rule_count("Visitors", "report"), 2);
        assert!(engine.is_permission_allowed("Visitors", "report", &role("reception"), "view"));
    }

    #[test]
    fn test_invalid_group_registers_nothing() {
        let mut engine = AclEngine::new();
        let group = AclGroup::new()
            .add(FieldMatchSet::new().field("role", "admin"), Granules::all())
            .add(FieldMatchSet::new(), Granules::all());

        assert!(engine.allow_group("Visitors", "index", &group).is_err());
        assert_eq!(engine.rule_count("Visitors", "index"), 0);
    }
}

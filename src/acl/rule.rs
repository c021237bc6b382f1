//! ACL rules: field match sets, granules and authorization outcomes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::attributes::{AttributeValue, CallerAttributes};

/// What one field must hold for a rule to match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRequirement {
    /// Attribute must equal this value.
    One(AttributeValue),
    /// Attribute must equal any of these values.
    AnyOf(Vec<AttributeValue>),
}

impl FieldRequirement {
    pub fn is_satisfied_by(&self, value: &AttributeValue) -> bool {
        match self {
            FieldRequirement::One(expected) => expected.matches(value),
            FieldRequirement::AnyOf(options) => options.iter().any(|o| o.matches(value)),
        }
    }
}

macro_rules! single_requirement {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldRequirement {
                fn from(value: $ty) -> Self {
                    FieldRequirement::One(value.into())
                }
            }
        )*
    };
}

single_requirement!(AttributeValue, &str, String, i64, i32, bool);

/// Build an `AnyOf` requirement from a list of values.
pub fn any_of<I, V>(values: I) -> FieldRequirement
where
    I: IntoIterator<Item = V>,
    V: Into<AttributeValue>,
{
    FieldRequirement::AnyOf(values.into_iter().map(Into::into).collect())
}

/// Field name to requirement. All fields must be satisfied (AND); a list
/// requirement is satisfied by any of its values (OR).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMatchSet(BTreeMap<String, FieldRequirement>);

impl FieldMatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn field(mut self, name: impl Into<String>, requirement: impl Into<FieldRequirement>) -> Self {
        self.0.insert(name.into(), requirement.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldRequirement)> {
        self.0.iter()
    }

    /// A missing attribute never satisfies a requirement.
    pub fn is_satisfied_by(&self, caller: &CallerAttributes) -> bool {
        self.0.iter().all(|(name, requirement)| {
            caller
                .get(name)
                .map(|value| requirement.is_satisfied_by(value))
                .unwrap_or(false)
        })
    }
}

impl<K, R> FromIterator<(K, R)> for FieldMatchSet
where
    K: Into<String>,
    R: Into<FieldRequirement>,
{
    fn from_iter<I: IntoIterator<Item = (K, R)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, r)| (k.into(), r.into())).collect())
    }
}

/// Permissions a matching rule grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granules {
    /// Every granule.
    All,
    /// Only the named granules.
    Only(BTreeSet<String>),
}

impl Granules {
    pub fn all() -> Self {
        Granules::All
    }

    /// An empty list means "allow all".
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if set.is_empty() {
            Granules::All
        } else {
            Granules::Only(set)
        }
    }

    pub fn contains(&self, granule: &str) -> bool {
        match self {
            Granules::All => true,
            Granules::Only(set) => set.contains(granule),
        }
    }
}

impl Default for Granules {
    fn default() -> Self {
        Granules::All
    }
}

impl From<Vec<String>> for Granules {
    fn from(names: Vec<String>) -> Self {
        Granules::only(names)
    }
}

impl From<Vec<&str>> for Granules {
    fn from(names: Vec<&str>) -> Self {
        Granules::only(names)
    }
}

impl<const N: usize> From<[&str; N]> for Granules {
    fn from(names: [&str; N]) -> Self {
        Granules::only(names)
    }
}

/// One registered rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRule {
    pub fields: FieldMatchSet,
    pub granules: Granules,
}

/// Result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// No rule matched, or the target has no rules.
    Denied,
    /// First matching rule grants everything.
    AllowAll,
    /// First matching rule grants exactly these granules.
    Granted(BTreeSet<String>),
}

impl Authorization {
    pub fn is_denied(&self) -> bool {
        matches!(self, Authorization::Denied)
    }

    pub fn allows(&self, granule: &str) -> bool {
        match self {
            Authorization::Denied => false,
            Authorization::AllowAll => true,
            Authorization::Granted(set) => set.contains(granule),
        }
    }
}

impl From<&Granules> for Authorization {
    fn from(granules: &Granules) -> Self {
        match granules {
            Granules::All => Authorization::AllowAll,
            Granules::Only(set) => Authorization::Granted(set.clone()),
        }
    }
}

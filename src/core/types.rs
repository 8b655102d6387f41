//! core::types
//!
//! Strong types for address-space concepts.
//!
//! # Types
//!
//! - [`NodeId`] - Namespace-qualified node identifier
//! - [`BrowseName`] - Validated sibling-unique node name
//! - [`NodeClass`] - Object, variable, method or type node
//! - [`ModellingRule`] - Mandatory/optional marker of an instance declaration
//! - [`ReferenceKind`] - Forward/inverse named edge kind
//!
//! # Validation
//!
//! These types enforce validity at construction time. A `BrowseName`
//! can never be empty and a `NodeId` always round-trips through its
//! text form.
//!
//! # Examples
//!
//! ```
//! use nodebind::core::types::{BrowseName, NodeId};
//!
//! let id: NodeId = "ns=1;s=Sensor1".parse().unwrap();
//! assert_eq!(id.namespace(), 1);
//! assert_eq!(id.to_string(), "ns=1;s=Sensor1");
//!
//! assert!(BrowseName::new("Sensor1").is_ok());
//! assert!(BrowseName::new("").is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid browse name: {0}")]
    InvalidBrowseName(String),

    #[error("invalid reference kind: {0}")]
    InvalidReferenceKind(String),
}

/// Local part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Guid(Uuid),
}

/// A namespace-qualified node identifier.
///
/// Text form is `ns=<n>;i=<u32>`, `ns=<n>;s=<str>` or `ns=<n>;g=<uuid>`.
/// Namespace 0 omits the `ns=0;` prefix when displayed and accepts
/// either form when parsed.
///
/// # Example
///
/// ```
/// use nodebind::core::types::NodeId;
///
/// let objects = NodeId::numeric(0, 85);
/// assert_eq!(objects.to_string(), "i=85");
/// assert_eq!("ns=0;i=85".parse::<NodeId>().unwrap(), objects);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    namespace: u16,
    identifier: Identifier,
}

impl NodeId {
    /// Numeric identifier in the given namespace.
    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    /// String identifier in the given namespace.
    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }

    /// GUID identifier in the given namespace.
    pub fn guid(namespace: u16, value: Uuid) -> Self {
        Self {
            namespace,
            identifier: Identifier::Guid(value),
        }
    }

    /// The well-known `Objects` folder, `i=85`.
    pub fn objects_folder() -> Self {
        Self::numeric(0, 85)
    }

    /// Fresh random GUID identifier.
    pub fn random(namespace: u16) -> Self {
        Self::guid(namespace, Uuid::new_v4())
    }

    pub fn namespace(&self) -> u16 {
        self.namespace
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(n) => write!(f, "i={}", n),
            Identifier::String(s) => write!(f, "s={}", s),
            Identifier::Guid(g) => write!(f, "g={}", g),
        }
    }
}

impl FromStr for NodeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TypeError::InvalidNodeId(format!("'{}': {}", s, reason));

        let (namespace, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail
                    .split_once(';')
                    .ok_or_else(|| invalid("missing ';' after namespace"))?;
                let ns = ns
                    .parse::<u16>()
                    .map_err(|_| invalid("namespace is not a 16-bit integer"))?;
                (ns, rest)
            }
            None => (0, s),
        };

        let identifier = if let Some(n) = rest.strip_prefix("i=") {
            Identifier::Numeric(
                n.parse::<u32>()
                    .map_err(|_| invalid("numeric identifier out of range"))?,
            )
        } else if let Some(text) = rest.strip_prefix("s=") {
            if text.is_empty() {
                return Err(invalid("string identifier cannot be empty"));
            }
            Identifier::String(text.to_string())
        } else if let Some(g) = rest.strip_prefix("g=") {
            Identifier::Guid(Uuid::parse_str(g).map_err(|_| invalid("malformed guid"))?)
        } else {
            return Err(invalid("expected 'i=', 's=' or 'g=' identifier"));
        };

        Ok(Self {
            namespace,
            identifier,
        })
    }
}

impl TryFrom<String> for NodeId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

/// A validated browse name.
///
/// Browse names identify a node among its siblings and are the stable
/// identity key across serialization and cloning. They cannot be empty,
/// cannot contain `/` (the path separator used by [`browse_path`]) and
/// cannot contain control characters.
///
/// The `/` restriction is stricter than a plain qualified name. Stores
/// hand back validated names, so an entry named with `/` can be neither
/// created nor bound through the address space.
///
/// [`browse_path`]: crate::space::AddressSpace::browse_path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BrowseName(String);

impl BrowseName {
    /// Create a new validated browse name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBrowseName` if the name is empty or
    /// contains `/` or a control character.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidBrowseName(
                "browse name cannot be empty".into(),
            ));
        }
        if name.contains('/') {
            return Err(TypeError::InvalidBrowseName(format!(
                "'{}' contains '/'",
                name
            )));
        }
        if name.chars().any(|c| c.is_control()) {
            return Err(TypeError::InvalidBrowseName(format!(
                "'{}' contains a control character",
                name.escape_debug()
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrowseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BrowseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BrowseName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for BrowseName {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BrowseName> for String {
    fn from(name: BrowseName) -> Self {
        name.0
    }
}

/// Class of a node in the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    Object,
    Variable,
    Method,
    ObjectType,
    VariableType,
}

impl NodeClass {
    /// True for classes that can be instantiated as structural children.
    pub fn is_instance(self) -> bool {
        matches!(self, NodeClass::Object | NodeClass::Variable)
    }

    /// True for type nodes.
    pub fn is_type(self) -> bool {
        matches!(self, NodeClass::ObjectType | NodeClass::VariableType)
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeClass::Object => "Object",
            NodeClass::Variable => "Variable",
            NodeClass::Method => "Method",
            NodeClass::ObjectType => "ObjectType",
            NodeClass::VariableType => "VariableType",
        };
        f.write_str(name)
    }
}

/// Modelling rule attached to an instance declaration on a type node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModellingRule {
    #[default]
    None,
    Mandatory,
    Optional,
}

/// Names of the structural (hierarchical) reference kinds.
///
/// Structural kinds are managed by the store's parent/child relation and
/// never go through the reference manager.
pub const HIERARCHICAL_KINDS: &[&str] = &[
    "HierarchicalReferences",
    "HasChild",
    "Aggregates",
    "HasComponent",
    "HasOrderedComponent",
    "HasProperty",
    "Organizes",
    "HasSubtype",
    "HasEventSource",
    "HasNotifier",
];

/// Non-hierarchical kinds used internally by the store.
pub const RESERVED_KINDS: &[&str] = &["HasTypeDefinition", "HasModellingRule"];

/// A reference kind: a forward/inverse pair of names.
///
/// Kinds compare by both names, so `Generates/GeneratedBy` and
/// `Generates/Generated` are different kinds.
///
/// # Example
///
/// ```
/// use nodebind::core::types::ReferenceKind;
///
/// let kind = ReferenceKind::new("Generates", "GeneratedBy").unwrap();
/// assert_eq!(kind.to_string(), "Generates/GeneratedBy");
/// assert!(!kind.is_hierarchical());
/// assert!(ReferenceKind::has_component().is_hierarchical());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceKind {
    forward: String,
    inverse: String,
}

impl ReferenceKind {
    /// Create a reference kind from its forward and inverse names.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidReferenceKind` if either name is empty.
    pub fn new(forward: impl Into<String>, inverse: impl Into<String>) -> Result<Self, TypeError> {
        let forward = forward.into();
        let inverse = inverse.into();
        if forward.trim().is_empty() || inverse.trim().is_empty() {
            return Err(TypeError::InvalidReferenceKind(format!(
                "'{}/{}': names cannot be empty",
                forward, inverse
            )));
        }
        Ok(Self { forward, inverse })
    }

    fn well_known(forward: &str, inverse: &str) -> Self {
        Self {
            forward: forward.to_string(),
            inverse: inverse.to_string(),
        }
    }

    pub fn has_component() -> Self {
        Self::well_known("HasComponent", "ComponentOf")
    }

    pub fn has_property() -> Self {
        Self::well_known("HasProperty", "PropertyOf")
    }

    pub fn organizes() -> Self {
        Self::well_known("Organizes", "OrganizedBy")
    }

    pub fn has_subtype() -> Self {
        Self::well_known("HasSubtype", "SubtypeOf")
    }

    pub fn has_type_definition() -> Self {
        Self::well_known("HasTypeDefinition", "TypeDefinitionOf")
    }

    pub fn has_modelling_rule() -> Self {
        Self::well_known("HasModellingRule", "ModellingRuleOf")
    }

    pub fn forward_name(&self) -> &str {
        &self.forward
    }

    pub fn inverse_name(&self) -> &str {
        &self.inverse
    }

    /// True if this is one of the structural kinds.
    pub fn is_hierarchical(&self) -> bool {
        HIERARCHICAL_KINDS.contains(&self.forward.as_str())
    }

    /// True if this kind is used internally by the store.
    pub fn is_reserved(&self) -> bool {
        RESERVED_KINDS.contains(&self.forward.as_str())
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.forward, self.inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod node_id {
        use super::*;

        #[test]
        fn numeric_round_trips() {
            let id = NodeId::numeric(2, 1001);
            assert_eq!(id.to_string(), "ns=2;i=1001");
            assert_eq!(id.to_string().parse::<NodeId>().unwrap(), id);
        }

        #[test]
        fn namespace_zero_omits_prefix() {
            let id = NodeId::numeric(0, 85);
            assert_eq!(id.to_string(), "i=85");
            assert_eq!("i=85".parse::<NodeId>().unwrap(), id);
            assert_eq!("ns=0;i=85".parse::<NodeId>().unwrap(), id);
        }

        #[test]
        fn string_identifier_keeps_semicolons() {
            let id: NodeId = "ns=1;s=a;b".parse().unwrap();
            assert_eq!(id.identifier(), &Identifier::String("a;b".into()));
        }

        #[test]
        fn guid_identifier() {
            let g = Uuid::new_v4();
            let id = NodeId::guid(3, g);
            assert_eq!(id.to_string().parse::<NodeId>().unwrap(), id);
        }

        #[test]
        fn rejects_malformed() {
            assert!("".parse::<NodeId>().is_err());
            assert!("ns=1".parse::<NodeId>().is_err());
            assert!("ns=x;i=1".parse::<NodeId>().is_err());
            assert!("ns=1;i=-4".parse::<NodeId>().is_err());
            assert!("ns=1;s=".parse::<NodeId>().is_err());
            assert!("ns=1;g=nope".parse::<NodeId>().is_err());
            assert!("ns=1;q=1".parse::<NodeId>().is_err());
        }

        #[test]
        fn serde_uses_text_form() {
            let id = NodeId::string(1, "Sensor1");
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, "\"ns=1;s=Sensor1\"");
            let back: NodeId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }
    }

    mod browse_name {
        use super::*;

        #[test]
        fn valid() {
            let name = BrowseName::new("Temperature Sensor").unwrap();
            assert_eq!(name.as_str(), "Temperature Sensor");
        }

        #[test]
        fn invalid() {
            assert!(BrowseName::new("").is_err());
            assert!(BrowseName::new("a/b").is_err());
            assert!(BrowseName::new("tab\there").is_err());
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<BrowseName, _> = serde_json::from_str("\"\"");
            assert!(result.is_err());
        }
    }

    mod reference_kind {
        use super::*;

        #[test]
        fn structural_kinds() {
            assert!(ReferenceKind::has_component().is_hierarchical());
            assert!(ReferenceKind::organizes().is_hierarchical());
            assert!(!ReferenceKind::has_type_definition().is_hierarchical());
            assert!(ReferenceKind::has_modelling_rule().is_reserved());
        }

        #[test]
        fn empty_names_rejected() {
            assert!(ReferenceKind::new("", "Inverse").is_err());
            assert!(ReferenceKind::new("Forward", " ").is_err());
        }

        #[test]
        fn equality_uses_both_names() {
            let a = ReferenceKind::new("Generates", "GeneratedBy").unwrap();
            let b = ReferenceKind::new("Generates", "Generated").unwrap();
            assert_ne!(a, b);
        }
    }
}

//! space::optional
//!
//! On-demand creation of optional children and methods.
//!
//! Optional instance declarations live under type nodes with an
//! `Optional` modelling rule. They are not created with the instance;
//! [`AddressSpace::materialize`] creates the child the first time it is
//! asked for. Optional methods are not copied at all: the instance gets a
//! `HasComponent` edge to the declaration itself.

use thiserror::Error;

use crate::core::events::{ChangeVerb, NodeEvent};
use crate::core::log::{LogCategory, LogQueue};
use crate::core::types::{BrowseName, ModellingRule, NodeClass, NodeId, ReferenceKind, TypeError};
use crate::schema::TypeRegistry;
use crate::store::{browse_all, BrowseTarget, CreateNode, StoreAdapter, StoreError};

use super::{AddressSpace, BindError};

/// Errors from materializing optional members.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("node {0} is not bound")]
    NodeNotBound(NodeId),

    #[error("no optional declaration '{browse_name}' in the type chain of {node}")]
    NotFound {
        node: NodeId,
        browse_name: BrowseName,
    },

    #[error("declaration {declaration} is a {node_class} and cannot be materialized as a child")]
    UnsupportedNodeClass {
        declaration: NodeId,
        node_class: NodeClass,
    },

    #[error(transparent)]
    InvalidName(#[from] TypeError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A declaration found under a type node.
struct Declaration {
    id: NodeId,
    node_class: NodeClass,
    type_name: Option<String>,
}

impl<S: StoreAdapter> AddressSpace<S> {
    /// Type names to search for declarations, most-derived first. The
    /// root types declare nothing and end the walk.
    fn declaration_chain(&self, id: &NodeId) -> Vec<String> {
        let start = self
            .store
            .type_definition(id)
            .ok()
            .flatten()
            .or_else(|| self.type_definition(id).map(str::to_string));

        let mut chain: Vec<String> = Vec::new();
        let mut current = start;
        while let Some(type_name) = current.take() {
            if chain.contains(&type_name) {
                break;
            }
            if TypeRegistry::is_root(&type_name) {
                break;
            }
            current = self
                .registry
                .supertype(&type_name)
                .map(str::to_string)
                .or_else(|| self.store.supertype(&type_name));
            chain.push(type_name);
        }
        chain
    }

    /// Optional declaration named `name`, searching children then methods.
    fn find_optional_declaration(
        &mut self,
        id: &NodeId,
        name: &BrowseName,
        methods: bool,
    ) -> Result<Option<Declaration>, StoreError> {
        let max_pages = self.max_pages();
        let target = if methods {
            BrowseTarget::Methods
        } else {
            BrowseTarget::Children
        };
        for type_name in self.declaration_chain(id) {
            let Some(type_id) = self.store.type_node(&type_name) else {
                continue;
            };
            for decl in browse_all(&mut self.store, &type_id, target, max_pages)? {
                if self.store.browse_name(&decl)? != *name
                    || self.store.read_modelling_rule(&decl)? != ModellingRule::Optional
                {
                    continue;
                }
                return Ok(Some(Declaration {
                    node_class: self.store.node_class(&decl)?,
                    type_name: self.store.type_definition(&decl)?,
                    id: decl,
                }));
            }
        }
        Ok(None)
    }

    /// Create and bind the optional child `name` of `id`.
    ///
    /// An existing child of that name is bound and returned instead.
    pub fn materialize(
        &mut self,
        id: &NodeId,
        name: &str,
        log: &mut LogQueue,
    ) -> Result<NodeId, MaterializeError> {
        if !self.is_bound(id) {
            return Err(MaterializeError::NodeNotBound(id.clone()));
        }
        let browse_name = BrowseName::new(name)?;

        if let Some(existing) = self.find_child(id, &browse_name)? {
            self.bind_node(&existing, None)?;
            self.attach_child(id, &existing);
            return Ok(existing);
        }

        let decl = match self.find_optional_declaration(id, &browse_name, false)? {
            Some(decl) => decl,
            None => match self.find_optional_declaration(id, &browse_name, true)? {
                Some(method) => {
                    return Err(MaterializeError::UnsupportedNodeClass {
                        declaration: method.id,
                        node_class: method.node_class,
                    })
                }
                None => {
                    log.warning(
                        LogCategory::Application,
                        format!("{} has no optional child '{}'", id, browse_name),
                    );
                    return Err(MaterializeError::NotFound {
                        node: id.clone(),
                        browse_name,
                    });
                }
            },
        };
        if !decl.node_class.is_instance() {
            return Err(MaterializeError::UnsupportedNodeClass {
                declaration: decl.id,
                node_class: decl.node_class,
            });
        }

        let child_type = decl
            .type_name
            .or_else(|| TypeRegistry::generic_type_for(decl.node_class).map(str::to_string))
            .unwrap_or_default();
        let request = CreateNode::instance(decl.node_class, browse_name, id.clone(), child_type);
        let child = self.store.create_node(request)?;
        if let Err(err) = self.bind_node(&child, None) {
            let _ = self.store.delete_node(&child, true);
            return Err(err.into());
        }

        self.record_change(id, ChangeVerb::ReferenceAdded);
        self.publish(NodeEvent::ChildAdded {
            parent: id.clone(),
            child: child.clone(),
        });
        log::debug!("materialized optional child {} under {}", child, id);
        Ok(child)
    }

    /// The bound child `name`, materializing it from an optional
    /// declaration when it does not exist yet.
    pub fn browse_child_or_materialize(
        &mut self,
        id: &NodeId,
        name: &str,
        log: &mut LogQueue,
    ) -> Result<NodeId, MaterializeError> {
        let browse_name = BrowseName::new(name)?;
        match self.browse_child(id, &browse_name) {
            Some(child) => Ok(child),
            None => self.materialize(id, name, log),
        }
    }

    fn linked_method(&mut self, id: &NodeId, name: &BrowseName) -> Result<Option<NodeId>, StoreError> {
        let max_pages = self.max_pages();
        for method in browse_all(&mut self.store, id, BrowseTarget::Methods, max_pages)? {
            if self.store.browse_name(&method)? == *name {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }

    fn linked_optional_method(
        &mut self,
        id: &NodeId,
        name: &BrowseName,
    ) -> Result<Option<NodeId>, StoreError> {
        match self.linked_method(id, name)? {
            Some(method) if self.store.read_modelling_rule(&method)? == ModellingRule::Optional => {
                Ok(Some(method))
            }
            _ => Ok(None),
        }
    }

    /// True if `id` has a linked method named `name` carrying the
    /// Optional modelling rule. Mandatory methods do not count.
    pub fn has_optional_method(&mut self, id: &NodeId, name: &str) -> bool {
        let Ok(name) = BrowseName::new(name) else {
            return false;
        };
        matches!(self.linked_optional_method(id, &name), Ok(Some(_)))
    }

    /// Link the optional method `name` from the type chain to `id`.
    ///
    /// Returns `Ok(true)` when the method is present afterwards and
    /// `Ok(false)` (with a warning) when no type declares it.
    pub fn add_optional_method(
        &mut self,
        id: &NodeId,
        name: &str,
        log: &mut LogQueue,
    ) -> Result<bool, MaterializeError> {
        if !self.is_bound(id) {
            return Err(MaterializeError::NodeNotBound(id.clone()));
        }
        let browse_name = BrowseName::new(name)?;
        if self.linked_optional_method(id, &browse_name)?.is_some() {
            return Ok(true);
        }

        let Some(decl) = self.find_optional_declaration(id, &browse_name, true)? else {
            log.warning(
                LogCategory::Application,
                format!("{} has no optional method '{}'", id, browse_name),
            );
            return Ok(false);
        };
        self.store
            .add_reference(id, &ReferenceKind::has_component(), &decl.id, true)?;
        self.record_change(id, ChangeVerb::ReferenceAdded);
        Ok(true)
    }

    /// Unlink the optional method `name` from `id`. Absent methods are
    /// not an error.
    pub fn remove_optional_method(&mut self, id: &NodeId, name: &str) -> Result<bool, MaterializeError> {
        let browse_name = BrowseName::new(name)?;
        let Some(method) = self.linked_method(id, &browse_name)? else {
            return Ok(true);
        };
        if self.store.read_modelling_rule(&method)? != ModellingRule::Optional {
            return Ok(true);
        }
        self.store
            .delete_reference(id, &ReferenceKind::has_component(), &method, true)?;
        self.record_change(id, ChangeVerb::ReferenceDeleted);
        Ok(true)
    }
}

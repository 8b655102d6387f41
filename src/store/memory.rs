//! store::memory
//!
//! In-memory [`StoreAdapter`].
//!
//! # Overview
//!
//! Entries live in a `HashMap` keyed by `NodeId`. Structural ownership is
//! the entry's `parent` field; every edge, structural or not, is stored as
//! two half-edges (one per endpoint) so either side can be browsed.
//!
//! The store is seeded with the two modelling-rule marker nodes
//! (`i=78` Mandatory, `i=80` Optional) and the `Objects` folder (`i=85`).
//! Type nodes are keyed by browse name. Creating an instance of a type
//! that has a type node copies the type chain's Mandatory instance
//! declarations onto the instance, most-derived declaration first.
//!
//! # Example
//!
//! ```
//! use nodebind::core::config::Config;
//! use nodebind::core::types::{BrowseName, NodeClass};
//! use nodebind::store::{CreateNode, MemoryStore, StoreAdapter};
//!
//! let mut store = MemoryStore::new(&Config::default());
//! let id = store
//!     .create_node(CreateNode::instance(
//!         NodeClass::Object,
//!         BrowseName::new("Pump").unwrap(),
//!         MemoryStore::objects_folder(),
//!         "BaseObjectType",
//!     ))
//!     .unwrap();
//! assert!(store.exists(&id));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::config::Config;
use crate::core::types::{BrowseName, ModellingRule, NodeClass, NodeId, ReferenceKind};
use crate::core::value::Value;
use crate::schema::{BASE_DATA_VARIABLE_TYPE, BASE_OBJECT_TYPE, FOLDER_TYPE, PROPERTY_TYPE};

use super::{BrowsePage, ContextHandle, ContinuationPoint, CreateNode, StoreAdapter, StoreError};

/// Failure modes injectable for tests.
#[cfg(any(test, feature = "fault_injection"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// The next browse that resumes from a continuation point fails.
    ContinuedBrowse,
}

#[derive(Debug, Clone, PartialEq)]
struct StoredReference {
    kind: ReferenceKind,
    target: NodeId,
    forward: bool,
}

#[derive(Debug, Clone)]
struct StoredNode {
    node_class: NodeClass,
    browse_name: BrowseName,
    parent: Option<NodeId>,
    type_definition: Option<String>,
    supertype: Option<String>,
    attributes: BTreeMap<String, Value>,
    references: Vec<StoredReference>,
    context: Option<ContextHandle>,
}

impl StoredNode {
    fn new(node_class: NodeClass, browse_name: BrowseName) -> Self {
        Self {
            node_class,
            browse_name,
            parent: None,
            type_definition: None,
            supertype: None,
            attributes: BTreeMap::new(),
            references: Vec::new(),
            context: None,
        }
    }
}

/// In-memory namespace engine.
#[derive(Debug)]
pub struct MemoryStore {
    nodes: HashMap<NodeId, StoredNode>,
    type_nodes: HashMap<String, NodeId>,
    namespace: u16,
    next_numeric: u32,
    page_size: usize,
    continuations: HashMap<u64, Vec<NodeId>>,
    next_continuation: u64,
    #[cfg(any(test, feature = "fault_injection"))]
    fail_on: Option<FailOn>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl MemoryStore {
    /// Empty store using the configured namespace and page size.
    pub fn new(config: &Config) -> Self {
        let mut store = Self {
            nodes: HashMap::new(),
            type_nodes: HashMap::new(),
            namespace: config.namespace(),
            next_numeric: 1,
            page_size: config.page_size().max(1),
            continuations: HashMap::new(),
            next_continuation: 1,
            #[cfg(any(test, feature = "fault_injection"))]
            fail_on: None,
        };
        store.seed();
        store
    }

    fn seed(&mut self) {
        for (id, name) in [
            (Self::mandatory_marker(), "Mandatory"),
            (Self::optional_marker(), "Optional"),
        ] {
            if let Ok(name) = BrowseName::new(name) {
                self.nodes.insert(id, StoredNode::new(NodeClass::Object, name));
            }
        }
        if let Ok(name) = BrowseName::new("Objects") {
            let mut objects = StoredNode::new(NodeClass::Object, name);
            objects.type_definition = Some(FOLDER_TYPE.to_string());
            self.nodes.insert(Self::objects_folder(), objects);
        }
    }

    /// Well-known id of the `Objects` folder.
    pub fn objects_folder() -> NodeId {
        NodeId::objects_folder()
    }

    /// Marker node targeted by `HasModellingRule` for Mandatory declarations.
    pub fn mandatory_marker() -> NodeId {
        NodeId::numeric(0, 78)
    }

    /// Marker node targeted by `HasModellingRule` for Optional declarations.
    pub fn optional_marker() -> NodeId {
        NodeId::numeric(0, 80)
    }

    fn is_marker(id: &NodeId) -> bool {
        *id == Self::mandatory_marker() || *id == Self::optional_marker()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Continuation points handed out and not yet released.
    pub fn open_continuations(&self) -> usize {
        self.continuations.len()
    }

    #[cfg(any(test, feature = "fault_injection"))]
    pub fn fail_on(&mut self, mode: FailOn) {
        self.fail_on = Some(mode);
    }

    #[cfg(any(test, feature = "fault_injection"))]
    fn injected_failure(&mut self, continuation: &Option<ContinuationPoint>) -> Result<(), StoreError> {
        if let (Some(FailOn::ContinuedBrowse), Some(cp)) = (self.fail_on, continuation) {
            self.fail_on = None;
            self.continuations.remove(&cp.raw());
            return Err(StoreError::Failure("injected browse failure".into()));
        }
        Ok(())
    }

    #[cfg(not(any(test, feature = "fault_injection")))]
    fn injected_failure(&mut self, _continuation: &Option<ContinuationPoint>) -> Result<(), StoreError> {
        Ok(())
    }

    fn get(&self, id: &NodeId) -> Result<&StoredNode, StoreError> {
        self.nodes
            .get(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))
    }

    fn get_mut(&mut self, id: &NodeId) -> Result<&mut StoredNode, StoreError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))
    }

    fn generate_id(&mut self) -> NodeId {
        loop {
            let id = NodeId::numeric(self.namespace, self.next_numeric);
            self.next_numeric = self.next_numeric.wrapping_add(1).max(1);
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    fn link(&mut self, source: &NodeId, kind: &ReferenceKind, target: &NodeId) {
        if let Some(node) = self.nodes.get_mut(source) {
            node.references.push(StoredReference {
                kind: kind.clone(),
                target: target.clone(),
                forward: true,
            });
        }
        if let Some(node) = self.nodes.get_mut(target) {
            node.references.push(StoredReference {
                kind: kind.clone(),
                target: source.clone(),
                forward: false,
            });
        }
    }

    fn rule_of(node: &StoredNode) -> ModellingRule {
        let kind = ReferenceKind::has_modelling_rule();
        for r in &node.references {
            if r.forward && r.kind == kind {
                if r.target == Self::mandatory_marker() {
                    return ModellingRule::Mandatory;
                }
                if r.target == Self::optional_marker() {
                    return ModellingRule::Optional;
                }
            }
        }
        ModellingRule::None
    }

    /// Forward structural targets of `id`, in creation order.
    fn structural_targets(&self, id: &NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .map(|node| {
                node.references
                    .iter()
                    .filter(|r| r.forward && r.kind.is_hierarchical())
                    .map(|r| r.target.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn child_named(&self, parent: &NodeId, name: &BrowseName) -> Option<NodeId> {
        self.structural_targets(parent).into_iter().find(|t| {
            self.nodes
                .get(t)
                .map_or(false, |n| n.parent.as_ref() == Some(parent) && &n.browse_name == name)
        })
    }

    fn structural_kind(&self, parent: &NodeId, request: &CreateNode) -> ReferenceKind {
        if request.type_definition.as_deref() == Some(PROPERTY_TYPE) {
            return ReferenceKind::has_property();
        }
        let parent_is_folder = self
            .nodes
            .get(parent)
            .and_then(|p| p.type_definition.as_deref())
            == Some(FOLDER_TYPE);
        if parent_is_folder {
            ReferenceKind::organizes()
        } else {
            ReferenceKind::has_component()
        }
    }

    /// Pre-order list of `root` and every entry it owns.
    fn owned_subtree(&self, root: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(id) = stack.pop() {
            let owned: Vec<NodeId> = self
                .structural_targets(&id)
                .into_iter()
                .filter(|t| {
                    self.nodes.get(t).and_then(|n| n.parent.as_ref()) == Some(&id)
                })
                .collect();
            stack.extend(owned.into_iter().rev());
            out.push(id);
        }
        out
    }

    fn paginate(&mut self, mut ids: Vec<NodeId>) -> BrowsePage {
        if ids.len() <= self.page_size {
            return BrowsePage {
                ids,
                continuation: None,
            };
        }
        let rest = ids.split_off(self.page_size);
        let raw = self.next_continuation;
        self.next_continuation += 1;
        self.continuations.insert(raw, rest);
        BrowsePage {
            ids,
            continuation: Some(ContinuationPoint::new(raw)),
        }
    }

    fn resume(&mut self, continuation: ContinuationPoint) -> Result<BrowsePage, StoreError> {
        let rest = self
            .continuations
            .remove(&continuation.raw())
            .ok_or(StoreError::InvalidContinuation)?;
        Ok(self.paginate(rest))
    }

    fn is_instance(&self, id: &NodeId) -> bool {
        self.nodes
            .get(id)
            .map_or(false, |n| n.node_class.is_instance())
    }

    fn instantiate_declarations(&mut self, id: &NodeId, type_name: &str) -> Result<(), StoreError> {
        let mut seen: HashSet<BrowseName> = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = Some(type_name.to_string());

        while let Some(type_name) = current.take() {
            if !visited.insert(type_name.clone()) {
                break;
            }
            let Some(type_id) = self.type_nodes.get(&type_name).cloned() else {
                break;
            };

            for decl_id in self.structural_targets(&type_id) {
                let Some(decl) = self.nodes.get(&decl_id) else {
                    continue;
                };
                if Self::rule_of(decl) != ModellingRule::Mandatory
                    || seen.contains(&decl.browse_name)
                {
                    continue;
                }
                let node_class = decl.node_class;
                let browse_name = decl.browse_name.clone();
                let child_type = decl.type_definition.clone();
                seen.insert(browse_name.clone());

                match node_class {
                    NodeClass::Object | NodeClass::Variable => {
                        let child_type = child_type.unwrap_or_else(|| {
                            if node_class == NodeClass::Variable {
                                BASE_DATA_VARIABLE_TYPE.to_string()
                            } else {
                                BASE_OBJECT_TYPE.to_string()
                            }
                        });
                        let request =
                            CreateNode::instance(node_class, browse_name, id.clone(), child_type);
                        self.create_node(request)?;
                    }
                    NodeClass::Method => {
                        self.link(id, &ReferenceKind::has_component(), &decl_id);
                    }
                    _ => {}
                }
            }

            current = self.nodes.get(&type_id).and_then(|n| n.supertype.clone());
        }
        Ok(())
    }

    fn remove_entries(&mut self, removed: &[NodeId]) {
        for id in removed {
            if let Some(node) = self.nodes.remove(id) {
                if node.node_class.is_type() {
                    self.type_nodes.remove(node.browse_name.as_str());
                }
            }
        }
        let gone: HashSet<&NodeId> = removed.iter().collect();
        for node in self.nodes.values_mut() {
            node.references.retain(|r| !gone.contains(&r.target));
            if node.parent.as_ref().map_or(false, |p| gone.contains(p)) {
                node.parent = None;
            }
        }
        for pending in self.continuations.values_mut() {
            pending.retain(|id| !gone.contains(id));
        }
    }
}

impl StoreAdapter for MemoryStore {
    fn create_node(&mut self, request: CreateNode) -> Result<NodeId, StoreError> {
        let id = match &request.explicit_id {
            Some(id) if self.nodes.contains_key(id) => {
                return Err(StoreError::DuplicateNodeId(id.clone()))
            }
            Some(id) => id.clone(),
            None => self.generate_id(),
        };

        let mut under_type_node = false;
        if let Some(parent) = &request.parent {
            let parent_node = self.get(parent)?;
            under_type_node = parent_node.node_class.is_type();
            if self.child_named(parent, &request.browse_name).is_some() {
                return Err(StoreError::DuplicateBrowseName {
                    parent: parent.clone(),
                    browse_name: request.browse_name.clone(),
                });
            }
        }

        let mut supertype_id = None;
        if request.node_class.is_type() {
            if self.type_nodes.contains_key(request.browse_name.as_str()) {
                return Err(StoreError::InvalidRequest(format!(
                    "type node '{}' already exists",
                    request.browse_name
                )));
            }
            if let Some(supertype) = &request.supertype {
                supertype_id = Some(
                    self.type_nodes
                        .get(supertype)
                        .cloned()
                        .ok_or_else(|| StoreError::UnknownType(supertype.clone()))?,
                );
            }
        }

        let mut node = StoredNode::new(request.node_class, request.browse_name.clone());
        node.parent = request.parent.clone();
        node.type_definition = request.type_definition.clone();
        node.supertype = request.supertype.clone();
        self.nodes.insert(id.clone(), node);

        if request.node_class.is_type() {
            self.type_nodes
                .insert(request.browse_name.as_str().to_string(), id.clone());
            if let Some(super_id) = &supertype_id {
                self.link(super_id, &ReferenceKind::has_subtype(), &id);
            }
        }

        if let Some(parent) = &request.parent {
            let kind = self.structural_kind(parent, &request);
            self.link(parent, &kind, &id);
        }

        match request.modelling_rule {
            ModellingRule::Mandatory => {
                self.link(&id, &ReferenceKind::has_modelling_rule(), &Self::mandatory_marker())
            }
            ModellingRule::Optional => {
                self.link(&id, &ReferenceKind::has_modelling_rule(), &Self::optional_marker())
            }
            ModellingRule::None => {}
        }

        let instantiate = request.node_class.is_instance()
            && !under_type_node
            && request.modelling_rule == ModellingRule::None;
        if let (true, Some(type_name)) = (instantiate, &request.type_definition) {
            if let Err(err) = self.instantiate_declarations(&id, type_name) {
                let removed = self.owned_subtree(&id);
                self.remove_entries(&removed);
                return Err(err);
            }
        }

        log::trace!("store created {} '{}'", id, request.browse_name);
        Ok(id)
    }

    fn delete_node(&mut self, id: &NodeId, cascade: bool) -> Result<Vec<NodeId>, StoreError> {
        self.get(id)?;
        let removed = if cascade {
            self.owned_subtree(id)
        } else {
            vec![id.clone()]
        };
        self.remove_entries(&removed);
        log::trace!("store deleted {} ({} entries)", id, removed.len());
        Ok(removed)
    }

    fn exists(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    fn browse_children(
        &mut self,
        id: &NodeId,
        continuation: Option<ContinuationPoint>,
    ) -> Result<BrowsePage, StoreError> {
        self.injected_failure(&continuation)?;
        if let Some(cp) = continuation {
            return self.resume(cp);
        }
        self.get(id)?;
        let ids: Vec<NodeId> = self
            .structural_targets(id)
            .into_iter()
            .filter(|t| !Self::is_marker(t) && self.is_instance(t))
            .collect();
        Ok(self.paginate(ids))
    }

    fn browse_references(
        &mut self,
        id: &NodeId,
        kind: &ReferenceKind,
        forward: bool,
        continuation: Option<ContinuationPoint>,
    ) -> Result<BrowsePage, StoreError> {
        self.injected_failure(&continuation)?;
        if let Some(cp) = continuation {
            return self.resume(cp);
        }
        let ids: Vec<NodeId> = self
            .get(id)?
            .references
            .iter()
            .filter(|r| r.forward == forward && &r.kind == kind)
            .map(|r| r.target.clone())
            .filter(|t| self.is_instance(t))
            .collect();
        Ok(self.paginate(ids))
    }

    fn browse_methods(
        &mut self,
        id: &NodeId,
        continuation: Option<ContinuationPoint>,
    ) -> Result<BrowsePage, StoreError> {
        self.injected_failure(&continuation)?;
        if let Some(cp) = continuation {
            return self.resume(cp);
        }
        self.get(id)?;
        let ids: Vec<NodeId> = self
            .structural_targets(id)
            .into_iter()
            .filter(|t| {
                self.nodes
                    .get(t)
                    .map_or(false, |n| n.node_class == NodeClass::Method)
            })
            .collect();
        Ok(self.paginate(ids))
    }

    fn release_continuation(&mut self, continuation: ContinuationPoint) {
        self.continuations.remove(&continuation.raw());
    }

    fn context(&self, id: &NodeId) -> Option<ContextHandle> {
        self.nodes.get(id).and_then(|n| n.context)
    }

    fn set_context(
        &mut self,
        id: &NodeId,
        context: Option<ContextHandle>,
    ) -> Result<(), StoreError> {
        self.get_mut(id)?.context = context;
        Ok(())
    }

    fn read_attribute(&self, id: &NodeId, name: &str) -> Result<Value, StoreError> {
        Ok(self
            .get(id)?
            .attributes
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn write_attribute(
        &mut self,
        id: &NodeId,
        name: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        self.get_mut(id)?
            .attributes
            .insert(name.to_string(), value);
        Ok(())
    }

    fn browse_name(&self, id: &NodeId) -> Result<BrowseName, StoreError> {
        Ok(self.get(id)?.browse_name.clone())
    }

    fn node_class(&self, id: &NodeId) -> Result<NodeClass, StoreError> {
        Ok(self.get(id)?.node_class)
    }

    fn type_definition(&self, id: &NodeId) -> Result<Option<String>, StoreError> {
        Ok(self.get(id)?.type_definition.clone())
    }

    fn type_node(&self, type_name: &str) -> Option<NodeId> {
        self.type_nodes.get(type_name).cloned()
    }

    fn supertype(&self, type_name: &str) -> Option<String> {
        self.type_nodes
            .get(type_name)
            .and_then(|id| self.nodes.get(id))
            .and_then(|n| n.supertype.clone())
    }

    fn parent(&self, id: &NodeId) -> Result<Option<NodeId>, StoreError> {
        Ok(self.get(id)?.parent.clone())
    }

    fn add_reference(
        &mut self,
        source: &NodeId,
        kind: &ReferenceKind,
        target: &NodeId,
        forward: bool,
    ) -> Result<(), StoreError> {
        self.get(target)?;
        let edge = StoredReference {
            kind: kind.clone(),
            target: target.clone(),
            forward,
        };
        let node = self.get_mut(source)?;
        if node.references.contains(&edge) {
            return Err(StoreError::ReferenceExists {
                kind: kind.clone(),
                source_id: source.clone(),
                target: target.clone(),
            });
        }
        node.references.push(edge);
        self.get_mut(target)?.references.push(StoredReference {
            kind: kind.clone(),
            target: source.clone(),
            forward: !forward,
        });
        Ok(())
    }

    fn delete_reference(
        &mut self,
        source: &NodeId,
        kind: &ReferenceKind,
        target: &NodeId,
        forward: bool,
    ) -> Result<(), StoreError> {
        let not_found = || StoreError::ReferenceNotFound {
            kind: kind.clone(),
            source_id: source.clone(),
            target: target.clone(),
        };
        let node = self.get_mut(source)?;
        let position = node
            .references
            .iter()
            .position(|r| r.forward == forward && &r.kind == kind && &r.target == target)
            .ok_or_else(not_found)?;
        node.references.remove(position);

        if let Some(other) = self.nodes.get_mut(target) {
            if let Some(position) = other
                .references
                .iter()
                .position(|r| r.forward != forward && &r.kind == kind && &r.target == source)
            {
                other.references.remove(position);
            }
        }
        Ok(())
    }

    fn read_modelling_rule(&self, id: &NodeId) -> Result<ModellingRule, StoreError> {
        Ok(Self::rule_of(self.get(id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FileConfig;

    fn name(s: &str) -> BrowseName {
        BrowseName::new(s).unwrap()
    }

    fn store(page_size: usize) -> MemoryStore {
        let mut file = FileConfig::default();
        file.browse.page_size = page_size;
        MemoryStore::new(&Config::from_file_config(file).unwrap())
    }

    fn object(store: &mut MemoryStore, parent: &NodeId, browse: &str, type_name: &str) -> NodeId {
        store
            .create_node(CreateNode::instance(
                NodeClass::Object,
                name(browse),
                parent.clone(),
                type_name,
            ))
            .unwrap()
    }

    fn sensor_type(store: &mut MemoryStore) -> NodeId {
        let base = store
            .create_node(CreateNode::type_node(NodeClass::ObjectType, name(BASE_OBJECT_TYPE), None))
            .unwrap();
        let sensor = store
            .create_node(CreateNode::type_node(
                NodeClass::ObjectType,
                name("Sensor"),
                Some(BASE_OBJECT_TYPE.into()),
            ))
            .unwrap();
        store
            .create_node(
                CreateNode::instance(NodeClass::Variable, name("Status"), sensor.clone(), BASE_DATA_VARIABLE_TYPE)
                    .with_rule(ModellingRule::Mandatory),
            )
            .unwrap();
        store
            .create_node(
                CreateNode::instance(NodeClass::Variable, name("Extra"), sensor.clone(), BASE_DATA_VARIABLE_TYPE)
                    .with_rule(ModellingRule::Optional),
            )
            .unwrap();
        store
            .create_node(CreateNode::method(name("Reset"), base).with_rule(ModellingRule::Mandatory))
            .unwrap();
        sensor
    }

    #[test]
    fn seeded_nodes() {
        let store = MemoryStore::default();
        assert!(store.exists(&MemoryStore::objects_folder()));
        assert!(store.exists(&MemoryStore::mandatory_marker()));
        assert_eq!(
            store.type_definition(&MemoryStore::objects_folder()).unwrap().as_deref(),
            Some(FOLDER_TYPE)
        );
    }

    #[test]
    fn generated_ids_use_configured_namespace() {
        let mut file = FileConfig::default();
        file.space.namespace = 4;
        let mut store = MemoryStore::new(&Config::from_file_config(file).unwrap());
        let id = object(&mut store, &MemoryStore::objects_folder(), "A", BASE_OBJECT_TYPE);
        assert_eq!(id.namespace(), 4);
    }

    #[test]
    fn duplicate_ids_and_names_rejected() {
        let mut store = MemoryStore::default();
        let objects = MemoryStore::objects_folder();
        let id = object(&mut store, &objects, "A", BASE_OBJECT_TYPE);

        let dup_id = CreateNode::instance(NodeClass::Object, name("B"), objects.clone(), BASE_OBJECT_TYPE)
            .with_id(Some(id));
        assert!(matches!(store.create_node(dup_id), Err(StoreError::DuplicateNodeId(_))));

        let dup_name = CreateNode::instance(NodeClass::Object, name("A"), objects, BASE_OBJECT_TYPE);
        assert!(matches!(
            store.create_node(dup_name),
            Err(StoreError::DuplicateBrowseName { .. })
        ));
    }

    #[test]
    fn mandatory_declarations_instantiated() {
        let mut store = MemoryStore::default();
        sensor_type(&mut store);
        let objects = MemoryStore::objects_folder();
        let instance = object(&mut store, &objects, "S1", "Sensor");

        let children = store.browse_children(&instance, None).unwrap().ids;
        let names: Vec<_> = children
            .iter()
            .map(|c| store.browse_name(c).unwrap().to_string())
            .collect();
        assert_eq!(names, ["Status"]);

        let methods = store.browse_methods(&instance, None).unwrap().ids;
        assert_eq!(methods.len(), 1);
        assert_eq!(store.browse_name(&methods[0]).unwrap().as_str(), "Reset");
    }

    #[test]
    fn declarations_report_modelling_rule() {
        let mut store = MemoryStore::default();
        let sensor = sensor_type(&mut store);
        let decls = store.browse_children(&sensor, None).unwrap().ids;
        let rules: Vec<_> = decls
            .iter()
            .map(|d| store.read_modelling_rule(d).unwrap())
            .collect();
        assert_eq!(rules, [ModellingRule::Mandatory, ModellingRule::Optional]);
    }

    #[test]
    fn cascade_delete_removes_subtree_and_edges() {
        let mut store = MemoryStore::default();
        let objects = MemoryStore::objects_folder();
        let a = object(&mut store, &objects, "A", BASE_OBJECT_TYPE);
        let child = object(&mut store, &a, "Child", BASE_OBJECT_TYPE);
        let b = object(&mut store, &objects, "B", BASE_OBJECT_TYPE);
        let kind = ReferenceKind::new("Feeds", "FedBy").unwrap();
        store.add_reference(&b, &kind, &child, true).unwrap();

        let removed = store.delete_node(&a, true).unwrap();
        assert_eq!(removed, vec![a.clone(), child.clone()]);
        assert!(!store.exists(&child));
        let targets = store.browse_references(&b, &kind, true, None).unwrap().ids;
        assert!(targets.is_empty());
    }

    #[test]
    fn reference_halves_stay_symmetric() {
        let mut store = MemoryStore::default();
        let objects = MemoryStore::objects_folder();
        let a = object(&mut store, &objects, "A", BASE_OBJECT_TYPE);
        let b = object(&mut store, &objects, "B", BASE_OBJECT_TYPE);
        let kind = ReferenceKind::new("Feeds", "FedBy").unwrap();

        store.add_reference(&a, &kind, &b, true).unwrap();
        assert!(matches!(
            store.add_reference(&a, &kind, &b, true),
            Err(StoreError::ReferenceExists { .. })
        ));
        assert_eq!(store.browse_references(&b, &kind, false, None).unwrap().ids, vec![a.clone()]);

        store.delete_reference(&a, &kind, &b, true).unwrap();
        assert!(store.browse_references(&b, &kind, false, None).unwrap().ids.is_empty());
        assert!(matches!(
            store.delete_reference(&a, &kind, &b, true),
            Err(StoreError::ReferenceNotFound { .. })
        ));
    }

    #[test]
    fn pagination_hands_out_continuations() {
        let mut store = store(2);
        let objects = MemoryStore::objects_folder();
        for i in 0..3 {
            object(&mut store, &objects, &format!("N{}", i), BASE_OBJECT_TYPE);
        }
        let first = store.browse_children(&objects, None).unwrap();
        assert_eq!(first.ids.len(), 2);
        assert_eq!(store.open_continuations(), 1);
        let cp = first.continuation.unwrap();
        let second = store.browse_children(&objects, Some(cp)).unwrap();
        assert_eq!(second.ids.len(), 1);
        assert!(second.continuation.is_none());
        assert_eq!(store.open_continuations(), 0);
    }

    #[test]
    fn released_continuation_is_invalid() {
        let mut store = store(1);
        let objects = MemoryStore::objects_folder();
        object(&mut store, &objects, "A", BASE_OBJECT_TYPE);
        object(&mut store, &objects, "B", BASE_OBJECT_TYPE);
        let cp = store.browse_children(&objects, None).unwrap().continuation.unwrap();
        let raw = cp.raw();
        store.release_continuation(cp);
        assert_eq!(
            store.browse_children(&objects, Some(ContinuationPoint::new(raw))).unwrap_err(),
            StoreError::InvalidContinuation
        );
    }

    #[test]
    fn context_slot() {
        let mut store = MemoryStore::default();
        let objects = MemoryStore::objects_folder();
        assert_eq!(store.context(&objects), None);
        store.set_context(&objects, Some(ContextHandle::new(9))).unwrap();
        assert_eq!(store.context(&objects), Some(ContextHandle::new(9)));
    }

    #[test]
    fn unset_attribute_reads_null() {
        let store = MemoryStore::default();
        let value = store
            .read_attribute(&MemoryStore::objects_folder(), "description")
            .unwrap();
        assert!(value.is_null());
    }
}

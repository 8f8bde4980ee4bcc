//! Shared tables coordinating the graph-rewriting pass and the
//! encapsulated-subgraph execution operator.
//!
//! The rewriting pass partitions a dataflow graph into host-executed and
//! accelerator-executed ("encapsulated") regions and records its decisions
//! here; the execution operator re-derives the same [`NodeKey`]s at run time
//! and consults the tables to elide host copies and redundant variable
//! assignments. Four independent tables cover the four decisions:
//!
//! 1. **Variable bindings** — which node inputs are fed by mutable shared
//!    variables rather than ordinary tensors.
//! 2. **Output tensors** — computed results left resident in accelerator
//!    memory, keyed by the producing node and output index.
//! 3. **Copy-index sets** — per encapsulation node, which output indices
//!    still require a host copy after execution.
//! 4. **Assign-elision info** — per encapsulated output, how a would-be
//!    assignment to a variable should be handled at run time.
//!
//! A fifth table remembers which source variable nodes were already replaced
//! by catalog-managed variables, so a repeated optimizer run does not replace
//! them twice.
//!
//! No table is derivable from another; they are independent indexes over
//! overlapping key spaces. Entries persist until explicitly removed
//! ([`Catalog::remove_output_tensor`]) or the owning graph is retired
//! ([`Catalog::evict_graph`]).

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult, TableKind};
use crate::key::{GraphId, NodeKey};

/// Type-erased handle to a device-resident tensor.
///
/// The catalog never inspects the pointee; it only shares and releases
/// references. Shared ownership because the table and the execution operator
/// may hold the same tensor simultaneously; the underlying memory is freed
/// when the last holder drops its reference.
pub type DeviceTensorRef = Arc<dyn Any + Send + Sync>;

/// Shared pointer to a catalog, injected into both collaborators.
pub type CatalogHandle = Arc<Catalog>;

/// Per-output decision record for an assignment whose value was already
/// produced in place by an encapsulated subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignInfo {
    /// Shared name of the variable the assignment targets.
    pub shared_name: String,
    /// Whether the host still needs a materialized copy of the value.
    pub copy_to_host: bool,
    /// Whether the consuming operation only observes the value, so the
    /// assignment itself may be skipped entirely.
    pub read_only: bool,
}

impl AssignInfo {
    pub fn new(shared_name: impl Into<String>, copy_to_host: bool, read_only: bool) -> Self {
        AssignInfo {
            shared_name: shared_name.into(),
            copy_to_host,
            read_only,
        }
    }
}

/// Process-wide registry threading state between graph rewriting and
/// encapsulated execution.
///
/// Each table has its own guard: a put for a key is visible to any later get
/// for that key from any thread, and overlapping get/remove pairs on the
/// output-tensor table are safe during pipelined execution. No cross-table
/// atomicity is promised; observing one table's entry without its
/// counterpart in another is a valid intermediate state.
#[derive(Default)]
pub struct Catalog {
    variable_bindings: Mutex<HashMap<NodeKey, String>>,
    output_tensors: Mutex<HashMap<NodeKey, DeviceTensorRef>>,
    copy_indexes: Mutex<HashMap<String, HashSet<u32>>>,
    assign_info: Mutex<HashMap<NodeKey, AssignInfo>>,
    variable_replacements: Mutex<HashMap<String, String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    // --- variable bindings -------------------------------------------------

    /// Records that the input addressed by `key` is fed by the shared
    /// variable named `shared_name`. Upsert: a later pass may revise the
    /// binding, silently replacing the old one.
    pub fn bind_variable(&self, key: NodeKey, shared_name: impl Into<String>) {
        self.variable_bindings
            .lock()
            .unwrap()
            .insert(key, shared_name.into());
    }

    /// Returns the shared-variable name bound to `key`.
    ///
    /// Absence means "this input is not variable-backed"; callers expecting
    /// that case should use [`Catalog::has_variable_binding`] instead of
    /// matching on the error.
    pub fn variable_shared_name(&self, key: &NodeKey) -> CatalogResult<String> {
        self.variable_bindings
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(TableKind::VariableBindings, key))
    }

    pub fn has_variable_binding(&self, key: &NodeKey) -> bool {
        self.variable_bindings.lock().unwrap().contains_key(key)
    }

    // --- output tensors ----------------------------------------------------

    /// Publishes a computed result that stays resident in accelerator
    /// memory. Upsert: replacing an entry drops the table's reference to the
    /// previous handle.
    pub fn publish_output_tensor(&self, key: NodeKey, tensor: DeviceTensorRef) {
        self.output_tensors.lock().unwrap().insert(key, tensor);
    }

    /// Returns a shared reference to the tensor published at `key`.
    pub fn output_tensor(&self, key: &NodeKey) -> CatalogResult<DeviceTensorRef> {
        self.output_tensors
            .lock()
            .unwrap()
            .get(key)
            .map(Arc::clone)
            .ok_or_else(|| CatalogError::not_found(TableKind::OutputTensors, key))
    }

    pub fn has_output_tensor(&self, key: &NodeKey) -> bool {
        self.output_tensors.lock().unwrap().contains_key(key)
    }

    /// Releases the table's reference to the tensor at `key`.
    ///
    /// Tolerant and idempotent: removing an absent key is a no-op, because
    /// cleanup may race with or duplicate removal requests across
    /// variable-handling passes.
    pub fn remove_output_tensor(&self, key: &NodeKey) {
        self.output_tensors.lock().unwrap().remove(key);
    }

    // --- copy-index sets ---------------------------------------------------

    /// Records the output indices of encapsulation node `node` that must be
    /// copied back to host memory after execution, replacing any prior set
    /// wholesale.
    pub fn set_copy_indexes(&self, node: impl Into<String>, indexes: HashSet<u32>) {
        self.copy_indexes.lock().unwrap().insert(node.into(), indexes);
    }

    /// Whether output `index` of `node` needs a host copy. Absence of a
    /// recorded requirement means the optimizer determined no copy is
    /// required, so a node with no entry yields `false` for every index.
    pub fn needs_copy(&self, node: &str, index: u32) -> bool {
        self.copy_indexes
            .lock()
            .unwrap()
            .get(node)
            .is_some_and(|set| set.contains(&index))
    }

    /// Returns the recorded copy set for `node`, empty if none was recorded.
    pub fn copy_indexes(&self, node: &str) -> HashSet<u32> {
        self.copy_indexes
            .lock()
            .unwrap()
            .get(node)
            .cloned()
            .unwrap_or_default()
    }

    // --- assign-elision info -----------------------------------------------

    /// Records how the assignment consuming the encapsulated output at `key`
    /// should be handled at run time. Upsert.
    pub fn record_assign_info(&self, key: NodeKey, info: AssignInfo) {
        self.assign_info.lock().unwrap().insert(key, info);
    }

    /// Returns the full elision record for `key`.
    pub fn assign_info(&self, key: &NodeKey) -> CatalogResult<AssignInfo> {
        self.assign_info
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(TableKind::AssignInfo, key))
    }

    /// Shared name of the variable the elided assignment targets.
    pub fn assign_variable_name(&self, key: &NodeKey) -> CatalogResult<String> {
        self.assign_info(key).map(|info| info.shared_name)
    }

    /// Whether the host still needs a materialized copy of the value.
    pub fn assign_copy_to_host(&self, key: &NodeKey) -> CatalogResult<bool> {
        self.assign_info(key).map(|info| info.copy_to_host)
    }

    /// Whether the consuming operation was only observing the value.
    pub fn assign_read_only(&self, key: &NodeKey) -> CatalogResult<bool> {
        self.assign_info(key).map(|info| info.read_only)
    }

    pub fn has_assign_info(&self, key: &NodeKey) -> bool {
        self.assign_info.lock().unwrap().contains_key(key)
    }

    // --- variable replacements ---------------------------------------------

    /// Remembers that the source variable node `var_name` was replaced by a
    /// catalog-managed variable with the given shared name, so a repeated
    /// optimizer run does not replace it again. Upsert.
    pub fn record_variable_replacement(
        &self,
        var_name: impl Into<String>,
        shared_name: impl Into<String>,
    ) {
        self.variable_replacements
            .lock()
            .unwrap()
            .insert(var_name.into(), shared_name.into());
    }

    /// Returns the shared name `var_name` was previously replaced with, if
    /// any.
    pub fn variable_replacement(&self, var_name: &str) -> Option<String> {
        self.variable_replacements
            .lock()
            .unwrap()
            .get(var_name)
            .cloned()
    }

    // --- lifecycle ---------------------------------------------------------

    /// Removes every entry whose key carries `graph`, across the three
    /// graph-scoped tables, and returns the number of entries removed.
    ///
    /// Invoked by whichever collaborator retires a compiled graph; without
    /// it the tables grow without bound across repeated compilations. The
    /// copy-index and variable-replacement tables are keyed by bare names
    /// with no graph component and are replaced wholesale on recomputation
    /// instead.
    pub fn evict_graph(&self, graph: GraphId) -> usize {
        let mut removed = 0;
        {
            let mut bindings = self.variable_bindings.lock().unwrap();
            let before = bindings.len();
            bindings.retain(|key, _| key.graph != graph);
            removed += before - bindings.len();
        }
        {
            let mut tensors = self.output_tensors.lock().unwrap();
            let before = tensors.len();
            tensors.retain(|key, _| key.graph != graph);
            removed += before - tensors.len();
        }
        {
            let mut infos = self.assign_info.lock().unwrap();
            let before = infos.len();
            infos.retain(|key, _| key.graph != graph);
            removed += before - infos.len();
        }
        removed
    }

    /// Captures a deterministic, serializable view of the live contents for
    /// auditing. Tensor handles are opaque, so only their keys appear.
    ///
    /// Each table is read under its own guard; concurrent mutation between
    /// table reads shows up as the same valid intermediate state any other
    /// reader could observe.
    pub fn snapshot(&self) -> CatalogSnapshot {
        let variable_bindings = self
            .variable_bindings
            .lock()
            .unwrap()
            .iter()
            .map(|(key, name)| (key.encode(), name.clone()))
            .collect();
        let mut output_tensor_keys: Vec<String> = self
            .output_tensors
            .lock()
            .unwrap()
            .keys()
            .map(NodeKey::encode)
            .collect();
        output_tensor_keys.sort();
        let copy_indexes = self
            .copy_indexes
            .lock()
            .unwrap()
            .iter()
            .map(|(node, set)| {
                let mut indexes: Vec<u32> = set.iter().copied().collect();
                indexes.sort_unstable();
                (node.clone(), indexes)
            })
            .collect();
        let assign_info = self
            .assign_info
            .lock()
            .unwrap()
            .iter()
            .map(|(key, info)| (key.encode(), info.clone()))
            .collect();
        let variable_replacements = self
            .variable_replacements
            .lock()
            .unwrap()
            .iter()
            .map(|(var, shared)| (var.clone(), shared.clone()))
            .collect();
        CatalogSnapshot {
            variable_bindings,
            output_tensor_keys,
            copy_indexes,
            assign_info,
            variable_replacements,
        }
    }
}

/// Serializable audit view of a catalog, with deterministic ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSnapshot {
    pub variable_bindings: BTreeMap<String, String>,
    pub output_tensor_keys: Vec<String>,
    pub copy_indexes: BTreeMap<String, Vec<u32>>,
    pub assign_info: BTreeMap<String, AssignInfo>,
    pub variable_replacements: BTreeMap<String, String>,
}

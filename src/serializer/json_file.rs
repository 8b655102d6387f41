//! serializer::json_file
//!
//! [`TreeSerializer`] persisted as one JSON document.
//!
//! The document is an object keyed by `NodeId` text. It is read once on
//! [`open`](JsonFileSerializer::open) and rewritten atomically (temp file,
//! then rename) on [`flush`](TreeSerializer::flush). Records behave
//! exactly like [`MemorySerializer`] records in between.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::log::LogQueue;
use crate::core::types::NodeId;

use super::{
    AttributeMap, ForwardReference, MemorySerializer, SerializeError, SerializedNode,
    TreeSerializer,
};

#[derive(Debug)]
pub struct JsonFileSerializer {
    path: PathBuf,
    pretty: bool,
    records: MemorySerializer,
}

impl JsonFileSerializer {
    /// Open `path`, loading existing records. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>, pretty: bool) -> Result<Self, SerializeError> {
        let path = path.into();
        let records = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| SerializeError::Io {
                path: path.clone(),
                source: e,
            })?;
            let parsed: BTreeMap<NodeId, SerializedNode> = serde_json::from_str(&contents)
                .map_err(|e| SerializeError::Parse {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            MemorySerializer::from_records(parsed)
        } else {
            MemorySerializer::new()
        };
        log::debug!("opened {} ({} records)", path.display(), records.len());
        Ok(Self {
            path,
            pretty,
            records,
        })
    }

    /// Open `path` with output formatting taken from `config`.
    pub fn from_config(path: &Path, config: &Config) -> Result<Self, SerializeError> {
        Self::open(path, config.pretty_json())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &NodeId) -> Option<&SerializedNode> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SerializeError {
        let path = path.to_path_buf();
        move |source| SerializeError::Io { path, source }
    }
}

impl TreeSerializer for JsonFileSerializer {
    fn write_instance(
        &mut self,
        id: &NodeId,
        type_name: &str,
        attrs: &AttributeMap,
        forward_refs: &[ForwardReference],
        log: &mut LogQueue,
    ) -> bool {
        self.records
            .write_instance(id, type_name, attrs, forward_refs, log)
    }

    fn read_instance(&self, id: &NodeId, log: &mut LogQueue) -> Option<SerializedNode> {
        self.records.read_instance(id, log)
    }

    fn clear(&mut self) {
        self.records.clear();
    }

    fn flush(&mut self) -> Result<(), SerializeError> {
        let records = self.records.records();
        let contents = if self.pretty {
            serde_json::to_string_pretty(records)
        } else {
            serde_json::to_string(records)
        }
        .map_err(|e| SerializeError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(Self::io_error(parent))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut handle = fs::File::create(&temp_path).map_err(Self::io_error(&temp_path))?;
        handle
            .write_all(contents.as_bytes())
            .map_err(Self::io_error(&temp_path))?;
        handle.sync_all().map_err(Self::io_error(&temp_path))?;
        fs::rename(&temp_path, &self.path).map_err(Self::io_error(&self.path))?;

        log::debug!("wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

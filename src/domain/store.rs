use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{info, warn};

use super::{dtn, DomainKey, DomainOperator};
use crate::error::{Result, SimError};

/// Keyed cache of precomputed domain operators.
pub trait OperatorStore {
    fn load(&self, key: &DomainKey) -> Result<Arc<DomainOperator>>;
    fn store(&mut self, key: &DomainKey, operator: Arc<DomainOperator>) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    operators: HashMap<DomainKey, Arc<DomainOperator>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperatorStore for MemoryStore {
    fn load(&self, key: &DomainKey) -> Result<Arc<DomainOperator>> {
        self.operators
            .get(key)
            .cloned()
            .ok_or(SimError::OperatorNotFound(*key))
    }

    fn store(&mut self, key: &DomainKey, operator: Arc<DomainOperator>) -> Result<()> {
        operator.validate(key)?;
        self.operators.insert(*key, operator);
        Ok(())
    }
}

/// One JSON file per key under a cache directory.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        DiskStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &DomainKey) -> PathBuf {
        self.root.join(format!("{}.json", key.file_stem()))
    }
}

impl OperatorStore for DiskStore {
    fn load(&self, key: &DomainKey) -> Result<Arc<DomainOperator>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(SimError::OperatorNotFound(*key));
        }
        let operator: DomainOperator = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
        operator.validate(key)?;
        info!("Loaded domain operator from {}", path.display());
        Ok(Arc::new(operator))
    }

    fn store(&mut self, key: &DomainKey, operator: Arc<DomainOperator>) -> Result<()> {
        operator.validate(key)?;
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(key);
        serde_json::to_writer(BufWriter::new(File::create(&path)?), operator.as_ref())?;
        info!("Stored domain operator at {}", path.display());
        Ok(())
    }
}

/// Fetches the operator for `key`, generating and caching it when absent.
pub fn load_or_generate<S: OperatorStore + ?Sized>(
    store: &mut S,
    key: &DomainKey,
) -> Result<Arc<DomainOperator>> {
    match store.load(key) {
        Ok(operator) => Ok(operator),
        Err(SimError::OperatorNotFound(_)) => {
            warn!("No cached operator for ({key}), generating one");
            let operator = Arc::new(dtn::generate(key)?);
            store.store(key, operator.clone())?;
            Ok(operator)
        }
        Err(e) => Err(e),
    }
}

use std::ops::{Deref, DerefMut};
use std::path::Path;

use tempfile::TempDir;

use crate::store::RocksStore;
use crate::{Merk, MerkOptions, Result};

/// A `Merk` backed by RocksDB in a temporary directory, which is deleted when
/// the `TempMerk` is dropped.
pub struct TempMerk {
    // dropped before `dir`, so the database is closed before its files go away
    inner: Merk<RocksStore>,
    dir: TempDir,
}

impl TempMerk {
    pub fn new() -> Result<TempMerk> {
        TempMerk::with_options(MerkOptions::default())
    }

    pub fn with_options(options: MerkOptions) -> Result<TempMerk> {
        let dir = tempfile::Builder::new().prefix("merk-temp").tempdir()?;
        let store = RocksStore::open(dir.path())?;
        let inner = Merk::open_opt(store, options)?;
        Ok(TempMerk { inner, dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Closes and reopens the database, dropping everything held in memory.
    pub fn reopen(self) -> Result<TempMerk> {
        let TempMerk { inner, dir } = self;
        drop(inner);

        let store = RocksStore::open(dir.path())?;
        let inner = Merk::open(store)?;
        Ok(TempMerk { inner, dir })
    }
}

impl Deref for TempMerk {
    type Target = Merk<RocksStore>;

    fn deref(&self) -> &Merk<RocksStore> {
        &self.inner
    }
}

impl DerefMut for TempMerk {
    fn deref_mut(&mut self) -> &mut Merk<RocksStore> {
        &mut self.inner
    }
}

use std::path::{Path, PathBuf};

use super::{Store, WriteBatch};
use crate::error::Result;

/// A `Store` backed by a RocksDB database on disk.
pub struct RocksStore {
    db: rocksdb::DB,
    path: PathBuf,
}

impl RocksStore {
    /// Opens the database at the given path, creating it if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_opts = default_db_opts();
        let path = path.as_ref().to_path_buf();
        let db = rocksdb::DB::open(&db_opts, &path)?;
        Ok(RocksStore { db, path })
    }

    /// Returns the path of the database directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the database and deletes all data from disk.
    pub fn destroy(self) -> Result<()> {
        let opts = default_db_opts();
        let path = self.path;
        drop(self.db);
        rocksdb::DB::destroy(&opts, &path)?;
        Ok(())
    }
}

impl WriteBatch for rocksdb::WriteBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        rocksdb::WriteBatch::put(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) {
        rocksdb::WriteBatch::delete(self, key)
    }
}

impl Store for RocksStore {
    type Batch = rocksdb::WriteBatch;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Ok(self.db.put(key, value)?)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        Ok(self.db.delete(key)?)
    }

    fn new_write_batch(&self) -> rocksdb::WriteBatch {
        rocksdb::WriteBatch::default()
    }

    fn commit_write_batch(&self, batch: rocksdb::WriteBatch) -> Result<()> {
        let mut opts = rocksdb::WriteOptions::default();
        opts.set_sync(false);
        Ok(self.db.write_opt(batch, &opts)?)
    }
}

fn default_db_opts() -> rocksdb::Options {
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts.increase_parallelism(num_cpus::get() as i32);
    opts
}

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use ciff_common::{Result, error::Error};

use crate::{BatchIter, BatchStream, TableRef, TableStats, TableStore, append_batches, validate_name};

/// A [`TableStore`] that keeps every table in memory.
///
/// Mainly useful for tests and for small collections that are queried in the
/// same process right after loading.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: RwLock<BTreeMap<String, BTreeMap<String, Arc<MemTable>>>>,
}

struct MemTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        Default::default()
    }

    fn get_table(&self, table: &TableRef) -> Result<Arc<MemTable>> {
        let namespaces = self.read_lock();
        namespaces
            .get(&table.namespace)
            .and_then(|tables| tables.get(&table.table))
            .cloned()
            .ok_or_else(|| Error::table_not_found(table.to_string()))
    }

    fn read_lock(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, BTreeMap<String, Arc<MemTable>>>> {
        self.namespaces.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, BTreeMap<String, Arc<MemTable>>>> {
        self.namespaces.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl TableStore for MemoryStore {
    fn create_namespace(&self, namespace: &str) -> Result<()> {
        validate_name("namespace", namespace)?;
        let mut namespaces = self.write_lock();
        if namespaces.contains_key(namespace) {
            return Err(Error::name_collision(namespace));
        }
        namespaces.insert(namespace.to_string(), BTreeMap::new());
        Ok(())
    }

    fn drop_namespace(&self, namespace: &str) -> Result<()> {
        self.write_lock()
            .remove(namespace)
            .map(|_| ())
            .ok_or_else(|| Error::table_not_found(namespace))
    }

    fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.read_lock().contains_key(namespace))
    }

    fn list_tables(&self, namespace: &str) -> Result<Vec<String>> {
        self.read_lock()
            .get(namespace)
            .map(|tables| tables.keys().cloned().collect())
            .ok_or_else(|| Error::table_not_found(namespace))
    }

    fn table_exists(&self, table: &TableRef) -> Result<bool> {
        Ok(self
            .read_lock()
            .get(&table.namespace)
            .is_some_and(|tables| tables.contains_key(&table.table)))
    }

    fn create_table(
        &self,
        table: &TableRef,
        batches: &mut dyn BatchStream,
    ) -> Result<TableStats> {
        validate_name("table", &table.table)?;
        if !self.namespace_exists(&table.namespace)? {
            return Err(Error::table_not_found(&table.namespace));
        }
        if self.table_exists(table)? {
            return Err(Error::name_collision(table.to_string()));
        }

        let schema = batches.schema();
        let mut collected = Vec::new();
        let stats = append_batches(table, batches, |batch| {
            collected.push(batch);
            Ok(())
        })?;

        let mut namespaces = self.write_lock();
        let tables = namespaces
            .get_mut(&table.namespace)
            .ok_or_else(|| Error::table_not_found(&table.namespace))?;
        if tables.contains_key(&table.table) {
            return Err(Error::name_collision(table.to_string()));
        }
        tables.insert(
            table.table.clone(),
            Arc::new(MemTable {
                schema,
                batches: collected,
            }),
        );
        log::info!(
            "Created table {table}: {} rows in {} batches",
            stats.rows,
            stats.batches
        );
        Ok(stats)
    }

    fn table_schema(&self, table: &TableRef) -> Result<SchemaRef> {
        Ok(self.get_table(table)?.schema.clone())
    }

    fn scan(&self, table: &TableRef) -> Result<Box<dyn BatchStream + Send>> {
        let mem_table = self.get_table(table)?;
        let batches = mem_table.batches.clone();
        Ok(Box::new(BatchIter::new(
            mem_table.schema.clone(),
            batches.into_iter().map(Ok),
        )))
    }

    fn drop_table(&self, table: &TableRef) -> Result<()> {
        let mut namespaces = self.write_lock();
        namespaces
            .get_mut(&table.namespace)
            .and_then(|tables| tables.remove(&table.table))
            .map(|_| ())
            .ok_or_else(|| Error::table_not_found(table.to_string()))
    }
}

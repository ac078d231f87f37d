use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use arrow_array::RecordBatch;
use arrow_ipc::{reader::FileReader, writer::FileWriter};
use arrow_schema::SchemaRef;
use ciff_common::{Result, error::Error};

use crate::{BatchStream, TableRef, TableStats, TableStore, append_batches, validate_name};

/// File extension of a table file.
pub const TABLE_FILE_EXT: &str = "arrow";

/// A [`TableStore`] that manages tables on the local filesystem, confined to
/// a root directory.
///
/// Layout: `<root>/<namespace>/<table>.arrow`, each table being a single
/// Arrow IPC file. A table is first written to a hidden temporary file in the
/// namespace directory and then atomically moved into place, so a table file
/// is either complete or absent.
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    /// Opens (creating if necessary) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<LocalDirStore> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .map_err(|e| Error::io(format!("create store root {}", root.display()), e))?;
        Ok(LocalDirStore {
            root: root.to_path_buf(),
        })
    }

    fn namespace_path(&self, namespace: &str) -> Result<PathBuf> {
        validate_name("namespace", namespace)?;
        Ok(self.root.join(namespace))
    }

    fn table_path(&self, table: &TableRef) -> Result<PathBuf> {
        validate_name("table", &table.table)?;
        Ok(self
            .namespace_path(&table.namespace)?
            .join(format!("{}.{TABLE_FILE_EXT}", table.table)))
    }

    fn open_table(&self, table: &TableRef) -> Result<FileReader<BufReader<File>>> {
        let path = self.table_path(table)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::table_not_found(table.to_string()));
            }
            Err(e) => return Err(Error::io(format!("open {}", path.display()), e)),
        };
        FileReader::try_new(BufReader::new(file), None)
            .map_err(|e| Error::arrow(format!("read table {table}"), e))
    }
}

impl TableStore for LocalDirStore {
    fn create_namespace(&self, namespace: &str) -> Result<()> {
        let path = self.namespace_path(namespace)?;
        match fs::create_dir(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::name_collision(namespace))
            }
            Err(e) => Err(Error::io(format!("create {}", path.display()), e)),
        }
    }

    fn drop_namespace(&self, namespace: &str) -> Result<()> {
        let path = self.namespace_path(namespace)?;
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::table_not_found(namespace))
            }
            Err(e) => Err(Error::io(format!("remove {}", path.display()), e)),
        }
    }

    fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespace_path(namespace)?.is_dir())
    }

    fn list_tables(&self, namespace: &str) -> Result<Vec<String>> {
        let path = self.namespace_path(namespace)?;
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::table_not_found(namespace));
            }
            Err(e) => return Err(Error::io(format!("list {}", path.display()), e)),
        };
        let mut tables = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(table) = name.strip_suffix(&format!(".{TABLE_FILE_EXT}")) {
                tables.push(table.to_string());
            }
        }
        tables.sort();
        Ok(tables)
    }

    fn table_exists(&self, table: &TableRef) -> Result<bool> {
        Ok(self.table_path(table)?.is_file())
    }

    fn create_table(
        &self,
        table: &TableRef,
        batches: &mut dyn BatchStream,
    ) -> Result<TableStats> {
        let path = self.table_path(table)?;
        let dir = self.namespace_path(&table.namespace)?;
        if !dir.is_dir() {
            return Err(Error::table_not_found(&table.namespace));
        }
        if path.exists() {
            return Err(Error::name_collision(table.to_string()));
        }

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}-", table.table))
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| Error::io(format!("create temp file in {}", dir.display()), e))?;

        let schema = batches.schema();
        let stats = {
            let mut writer = FileWriter::try_new(BufWriter::new(temp.as_file()), &schema)
                .map_err(|e| Error::arrow(format!("write table {table}"), e))?;
            let stats = append_batches(table, batches, |batch: RecordBatch| {
                writer
                    .write(&batch)
                    .map_err(|e| Error::arrow(format!("write table {table}"), e))
            })?;
            writer
                .into_inner()
                .map_err(|e| Error::arrow(format!("finish table {table}"), e))?
                .into_inner()
                .map_err(|e| Error::io(format!("flush table {table}"), e.into_error()))?;
            stats
        };

        temp.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                Error::name_collision(table.to_string())
            } else {
                Error::io(format!("persist {}", path.display()), e.error)
            }
        })?;
        log::info!(
            "Created table {table} at {}: {} rows in {} batches",
            path.display(),
            stats.rows,
            stats.batches
        );
        Ok(stats)
    }

    fn table_schema(&self, table: &TableRef) -> Result<SchemaRef> {
        Ok(self.open_table(table)?.schema())
    }

    fn scan(&self, table: &TableRef) -> Result<Box<dyn BatchStream + Send>> {
        let reader = self.open_table(table)?;
        Ok(Box::new(TableFileScan {
            table: table.clone(),
            reader,
        }))
    }

    fn drop_table(&self, table: &TableRef) -> Result<()> {
        let path = self.table_path(table)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Dropped table {table}");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::table_not_found(table.to_string()))
            }
            Err(e) => Err(Error::io(format!("remove {}", path.display()), e)),
        }
    }
}

struct TableFileScan {
    table: TableRef,
    reader: FileReader<BufReader<File>>,
}

impl Iterator for TableFileScan {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next().map(|res| {
            res.map_err(|e| Error::arrow(format!("scan table {}", self.table), e))
        })
    }
}

impl BatchStream for TableFileScan {
    fn schema(&self) -> SchemaRef {
        self.reader.schema()
    }
}

//! Shared fixtures for integration tests
//!
//! `MemorySource` serves rows from in-memory tables. A template is expected to
//! name its table after `FROM`; rows are returned when their change time falls
//! in `(startDate, tillDate]`. `MemoryBlobStore` keeps objects in a map.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tidemark::adapters::blob::BlobStore;
use tidemark::adapters::source::{RowBuffer, RowCursor, RowSource, WindowParams};
use tidemark::config::{FailurePolicy, SyncConfig};
use tidemark::domain::{Result, SourceError, SyncError, SyncTimestamp};

pub fn ts(s: &str) -> SyncTimestamp {
    SyncTimestamp::parse(s).unwrap()
}

/// One in-memory table
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub rows: Vec<(SyncTimestamp, Vec<Option<String>>)>,
}

impl MemoryTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, changed_at: &str, values: &[Option<&str>]) -> Self {
        self.rows.push((
            ts(changed_at),
            values.iter().map(|v| v.map(str::to_string)).collect(),
        ));
        self
    }
}

/// In-memory row source with failure switches
#[derive(Default)]
pub struct MemorySource {
    tables: Mutex<HashMap<String, MemoryTable>>,
    calls: Mutex<Vec<(String, WindowParams)>>,
    failing_tables: Mutex<HashSet<String>>,
    fail_after: Mutex<HashMap<String, usize>>,
    hang_after: Mutex<HashMap<String, usize>>,
    unreachable: AtomicBool,
}

impl MemorySource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_table(&self, name: &str, table: MemoryTable) {
        self.tables.lock().unwrap().insert(name.to_string(), table);
    }

    /// Queries against `table` fail at execution
    pub fn fail_query(&self, table: &str) {
        self.failing_tables.lock().unwrap().insert(table.to_string());
    }

    /// Cursor over `table` fails after yielding `rows` rows
    pub fn fail_after(&self, table: &str, rows: usize) {
        self.fail_after.lock().unwrap().insert(table.to_string(), rows);
    }

    /// Cursor over `table` never returns after yielding `rows` rows
    pub fn hang_after(&self, table: &str, rows: usize) {
        self.hang_after.lock().unwrap().insert(table.to_string(), rows);
    }

    /// Connection checks fail as if the server were down
    pub fn set_unreachable(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    /// Tables queried so far with their window parameters, in order
    pub fn calls(&self) -> Vec<(String, WindowParams)> {
        self.calls.lock().unwrap().clone()
    }
}

fn table_name(query: &str) -> Option<String> {
    let mut words = query.split_whitespace();
    while let Some(word) = words.next() {
        if word.eq_ignore_ascii_case("FROM") {
            return words.next().map(|w| w.trim_end_matches(';').to_string());
        }
    }
    None
}

#[async_trait]
impl RowSource for MemorySource {
    async fn execute(&self, query: &str, params: &WindowParams) -> Result<Box<dyn RowCursor>> {
        let name = table_name(query)
            .ok_or_else(|| SourceError::Query(format!("no table in query: {query}")))?;
        self.calls.lock().unwrap().push((name.clone(), *params));

        if self.failing_tables.lock().unwrap().contains(&name) {
            return Err(SourceError::Query(format!("relation \"{name}\" is broken")).into());
        }

        let table = self
            .tables
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .ok_or_else(|| SourceError::Query(format!("relation \"{name}\" does not exist")))?;

        let rows = table
            .rows
            .into_iter()
            .filter(|(changed, _)| *changed > params.start && *changed <= params.end)
            .map(|(_, values)| values)
            .collect();

        Ok(Box::new(MemoryCursor {
            columns: table.columns,
            rows,
            current: None,
            yielded: 0,
            fail_after: self.fail_after.lock().unwrap().get(&name).copied(),
            hang_after: self.hang_after.lock().unwrap().get(&name).copied(),
        }))
    }

    async fn ping(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SourceError::Connect("connection refused".to_string()).into());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

struct MemoryCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<Option<String>>>,
    current: Option<Vec<Option<String>>>,
    yielded: usize,
    fail_after: Option<usize>,
    hang_after: Option<usize>,
}

#[async_trait]
impl RowCursor for MemoryCursor {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    async fn next(&mut self) -> Result<bool> {
        if self.fail_after == Some(self.yielded) {
            return Err(SourceError::Iteration("connection reset by peer".to_string()).into());
        }
        if self.hang_after == Some(self.yielded) {
            std::future::pending::<()>().await;
        }
        self.current = self.rows.pop_front();
        if self.current.is_some() {
            self.yielded += 1;
        }
        Ok(self.current.is_some())
    }

    fn scan(&mut self, row: &mut RowBuffer) -> Result<()> {
        let values = self
            .current
            .as_ref()
            .ok_or_else(|| SourceError::Scan("no current row".to_string()))?;
        row.reset(values.len());
        for (i, value) in values.iter().enumerate() {
            match value {
                Some(v) => row.set(i, v),
                None => row.set_null(i),
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.current = None;
        self.rows.clear();
        Ok(())
    }
}

/// In-memory blob store with failure switches
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_file_uploads: AtomicBool,
    fail_byte_uploads: AtomicBool,
    fail_downloads: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn fail_file_uploads(&self, fail: bool) {
        self.fail_file_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_byte_uploads(&self, fail: bool) {
        self.fail_byte_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload_file(&self, key: &str, path: &Path) -> Result<()> {
        if self.fail_file_uploads.load(Ordering::SeqCst) {
            return Err(SyncError::Blob(format!("put_object {key}: access denied")));
        }
        let data = tokio::fs::read(path).await?;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn upload_bytes(&self, key: &str, data: Vec<u8>) -> Result<()> {
        if self.fail_byte_uploads.load(Ordering::SeqCst) {
            return Err(SyncError::Blob(format!("put_object {key}: access denied")));
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn download_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(SyncError::Blob(format!("get_object {key}: timeout")));
        }
        Ok(self.get(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn check_connection(&self) -> Result<()> {
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("mem://bucket/{key}")
    }
}

/// Temporary state file, template and export directories
pub struct Workspace {
    pub dir: TempDir,
    pub state_file: PathBuf,
    pub sql_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let state_file = dir.path().join("state.json");
        let sql_dir = dir.path().join("sql");
        let export_dir = dir.path().join("export");
        std::fs::create_dir_all(&sql_dir).unwrap();
        std::fs::create_dir_all(&export_dir).unwrap();
        Self {
            dir,
            state_file,
            sql_dir,
            export_dir,
        }
    }

    pub fn write_state(&self, json: &str) {
        std::fs::write(&self.state_file, json).unwrap();
    }

    pub fn read_state(&self) -> String {
        std::fs::read_to_string(&self.state_file).unwrap()
    }

    /// Template selecting from a table of the same name
    pub fn write_template(&self, entity: &str) {
        std::fs::write(
            self.sql_dir.join(format!("{entity}.sql")),
            format!(
                "SELECT * FROM {entity} WHERE updated_at > :startDate AND updated_at <= :tillDate"
            ),
        )
        .unwrap();
    }

    pub fn sync_config(&self, policy: FailurePolicy) -> SyncConfig {
        SyncConfig {
            state_file: self.state_file.clone(),
            sql_dir: self.sql_dir.clone(),
            export_dir: self.export_dir.clone(),
            default_lookback_days: 30,
            failure_policy: policy,
        }
    }

    pub fn export_file(&self, name: &str) -> PathBuf {
        self.export_dir.join(name)
    }

    pub fn export_files(&self) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(&self.export_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

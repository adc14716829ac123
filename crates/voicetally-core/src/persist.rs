use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec::{read_table, write_table, TimeTable};
use crate::error::{Result, TallyError};

/// Loads and stores accumulated time between process runs.
pub trait Persistence: Send + Sync {
    /// Read the persisted totals.
    fn load(&self) -> Result<TimeTable>;

    /// Replace the persisted totals with `table`.
    fn save(&self, table: &TimeTable) -> Result<()>;

    /// Human-readable location of the persisted data, for logs.
    fn location(&self) -> String;
}

/// Persists the time table as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `<data_dir>/voicetally/time_data.json`.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voicetally")
            .join("time_data.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Persistence for JsonFileStore {
    fn load(&self) -> Result<TimeTable> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No time data yet, starting empty");
                return Ok(TimeTable::new());
            }
            Err(e) => return Err(TallyError::io(&self.path, e)),
        };

        let table = read_table(BufReader::new(file))?;
        debug!(path = %self.path.display(), members = table.len(), "Loaded time data");
        Ok(table)
    }

    fn save(&self, table: &TimeTable) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TallyError::io(parent, e))?;
        }

        let tmp = self.temp_path();
        let result = write_file(&tmp, table).and_then(|()| {
            fs::rename(&tmp, &self.path).map_err(|e| TallyError::io(&self.path, e))
        });

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;

        debug!(path = %self.path.display(), members = table.len(), "Saved time data");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn write_file(path: &Path, table: &TimeTable) -> Result<()> {
    let file = File::create(path).map_err(|e| TallyError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_table(&mut writer, table)?;
    writer.write_all(b"\n").map_err(|e| TallyError::io(path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| TallyError::io(path, e.into_error()))?;
    file.sync_all().map_err(|e| TallyError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberId;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("time_data.json"));

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("time_data.json"));
        let mut table = TimeTable::new();
        table.insert(MemberId(3), Duration::from_secs(125));
        table.insert(MemberId(4), Duration::from_millis(2_500));

        store.save(&table).unwrap();

        assert_eq!(store.load().unwrap(), table);
        assert!(!dir.path().join("nested").join("time_data.json.tmp").exists());
    }

    #[test]
    fn test_save_overwrites_previous_contents() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("time_data.json"));
        let mut table = TimeTable::new();
        table.insert(MemberId(3), Duration::from_secs(125));
        store.save(&table).unwrap();

        store.save(&TimeTable::new()).unwrap();

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("time_data.json");
        fs::write(&path, r#"{"12": "not a time"}"#).unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();

        assert!(err.to_string().contains("12"));
    }
}

// SQLite-backed asset registry: a concrete dependency service and deletion
// collaborator for running the analysis outside a host editor.

use crate::error::{DeleteError, RegistryError};
use crate::remove::AssetDeleter;
use crate::usage::split_line;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use sweeper_scanner::service::LookupResult;
use sweeper_scanner::{AssetId, DependencyService, LookupError, ModuleScope};
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, RegistryError>;

pub struct AssetRegistry {
    conn: Mutex<Connection>,
}

impl AssetRegistry {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let registry = AssetRegistry {
            conn: Mutex::new(conn),
        };
        registry.init_schema()?;
        Ok(registry)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
            -- Every known asset, keyed by its normalized path
            CREATE TABLE IF NOT EXISTS assets (
    key TEXT PRIMARY KEY,
    path TEXT NOT NULL
);

-- from_key depends on to_key
CREATE TABLE IF NOT EXISTS dependencies (
    from_key TEXT NOT NULL,
    to_key TEXT NOT NULL,
    UNIQUE(from_key, to_key),
    FOREIGN KEY(from_key) REFERENCES assets(key) ON DELETE CASCADE,
    FOREIGN KEY(to_key) REFERENCES assets(key) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_dependencies_from ON dependencies(from_key);
CREATE INDEX IF NOT EXISTS idx_dependencies_to ON dependencies(to_key);
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RegistryError::Poisoned)
    }

    // Asset management
    pub fn add_asset(&self, path: &str) -> Result<()> {
        let asset = AssetId::new(path);
        self.conn()?.execute(
            "INSERT OR IGNORE INTO assets (key, path) VALUES (?1, ?2)",
            params![asset.key(), asset.as_str()],
        )?;
        Ok(())
    }

    /// Record that `from` depends on `to`, adding either asset if needed.
    /// Returns false when the edge was already known.
    pub fn add_dependency(&self, from: &str, to: &str) -> Result<bool> {
        let conn = self.conn()?;
        insert_edge(&conn, &AssetId::new(from), &AssetId::new(to))
    }

    /// Load an `Asset,Dependency` manifest. Rows with an empty dependency
    /// just register the asset. Returns the number of new edges.
    pub fn import_edges(&self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path)?;
        let added = self.import_edges_str(&content)?;
        info!("Imported {} dependencies from {}", added, path.display());
        Ok(added)
    }

    pub fn import_edges_str(&self, content: &str) -> Result<usize> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());

        let Some((_, header)) = lines.next() else {
            return Ok(0);
        };
        let header = split_line(header);
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| RegistryError::InvalidManifest {
                    line: 1,
                    reason: format!("missing '{}' column", name),
                })
        };
        let asset_col = find("Asset")?;
        let dep_col = find("Dependency")?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut added = 0;

        for (idx, line) in lines {
            let fields = split_line(line);
            let Some(asset) = fields.get(asset_col).map(|s| s.trim()) else {
                return Err(RegistryError::InvalidManifest {
                    line: idx + 1,
                    reason: "missing asset field".to_string(),
                });
            };
            if asset.is_empty() {
                return Err(RegistryError::InvalidManifest {
                    line: idx + 1,
                    reason: "empty asset path".to_string(),
                });
            }
            let asset = AssetId::new(asset);

            match fields.get(dep_col).map(|s| s.trim()).filter(|s| !s.is_empty()) {
                Some(dep) => {
                    if insert_edge(&tx, &asset, &AssetId::new(dep))? {
                        added += 1;
                    }
                }
                None => insert_asset(&tx, &asset)?,
            }
        }

        tx.commit()?;
        Ok(added)
    }

    pub fn asset_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn dependency_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM dependencies", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn contains(&self, asset: &AssetId) -> Result<bool> {
        let conn = self.conn()?;
        Ok(find_asset(&conn, asset)?.is_some())
    }

    // Query methods
    pub fn dependencies_of(&self, asset: &AssetId) -> Result<Option<Vec<AssetId>>> {
        let conn = self.conn()?;
        if find_asset(&conn, asset)?.is_none() {
            return Ok(None);
        }
        let mut stmt = conn.prepare(
            "SELECT a.path FROM dependencies d
             JOIN assets a ON a.key = d.to_key
             WHERE d.from_key = ?1
             ORDER BY a.key",
        )?;
        let deps = stmt
            .query_map(params![asset.key()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(deps.into_iter().map(AssetId::new).collect()))
    }

    pub fn referencers_of(&self, asset: &AssetId) -> Result<Vec<AssetId>> {
        let conn = self.conn()?;
        direct_referencers(&conn, asset)
    }

    pub fn assets_with_prefix(&self, path: &str) -> Result<Vec<AssetId>> {
        let prefix = ModuleScope::new(path).prefix().to_string();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT path FROM assets
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key",
        )?;
        let assets = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets.into_iter().map(AssetId::new).collect())
    }

    pub fn delete(&self, asset: &AssetId) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM assets WHERE key = ?1", params![asset.key()])?;
        debug!("Deleted {} ({} rows)", asset, removed);
        Ok(removed > 0)
    }
}

fn find_asset(conn: &Connection, asset: &AssetId) -> Result<Option<String>> {
    let found = conn
        .query_row(
            "SELECT path FROM assets WHERE key = ?1",
            params![asset.key()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found)
}

fn insert_asset(conn: &Connection, asset: &AssetId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO assets (key, path) VALUES (?1, ?2)",
        params![asset.key(), asset.as_str()],
    )?;
    Ok(())
}

fn insert_edge(conn: &Connection, from: &AssetId, to: &AssetId) -> Result<bool> {
    insert_asset(conn, from)?;
    insert_asset(conn, to)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO dependencies (from_key, to_key) VALUES (?1, ?2)",
        params![from.key(), to.key()],
    )?;
    Ok(inserted > 0)
}

fn direct_referencers(conn: &Connection, asset: &AssetId) -> Result<Vec<AssetId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT a.path FROM dependencies d
         JOIN assets a ON a.key = d.from_key
         WHERE d.to_key = ?1
         ORDER BY a.key",
    )?;
    let found = stmt
        .query_map(params![asset.key()], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(found.into_iter().map(AssetId::new).collect())
}

fn query_failed(asset: &AssetId, e: RegistryError) -> LookupError {
    LookupError::Query {
        asset: asset.clone(),
        reason: e.to_string(),
    }
}

impl DependencyService for AssetRegistry {
    fn direct_dependencies(&self, asset: &AssetId) -> LookupResult<Vec<AssetId>> {
        self.dependencies_of(asset)
            .map_err(|e| query_failed(asset, e))?
            .ok_or_else(|| LookupError::NotFound(asset.clone()))
    }

    fn referencers_reachable_from(
        &self,
        asset: &AssetId,
        scope: &ModuleScope,
    ) -> LookupResult<Vec<AssetId>> {
        let conn = self.conn().map_err(|e| query_failed(asset, e))?;
        if find_asset(&conn, asset)
            .map_err(|e| query_failed(asset, e))?
            .is_none()
        {
            return Err(LookupError::NotFound(asset.clone()));
        }

        // Breadth-first up the referencer chain; branches stop at the scope
        let mut seen: BTreeSet<AssetId> = BTreeSet::new();
        let mut queue = VecDeque::from([asset.clone()]);
        while let Some(current) = queue.pop_front() {
            let referencers =
                direct_referencers(&conn, &current).map_err(|e| query_failed(asset, e))?;
            for referencer in referencers {
                if &referencer == asset || !seen.insert(referencer.clone()) {
                    continue;
                }
                if !scope.contains(&referencer) {
                    queue.push_back(referencer);
                }
            }
        }
        Ok(seen.into_iter().collect())
    }

    fn assets_under(&self, path: &str) -> LookupResult<Vec<AssetId>> {
        self.assets_with_prefix(path)
            .map_err(|e| LookupError::Query {
                asset: AssetId::new(path),
                reason: e.to_string(),
            })
    }
}

impl AssetDeleter for AssetRegistry {
    fn delete_asset(&self, asset: &AssetId) -> std::result::Result<(), DeleteError> {
        match self.delete(asset) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeleteError::Missing(asset.clone())),
            Err(e) => Err(DeleteError::Backend {
                asset: asset.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_are_case_insensitive() {
        let registry = AssetRegistry::open_in_memory().unwrap();
        assert!(registry.add_dependency("/Mod/A", "/Ext/Z").unwrap());
        assert!(!registry.add_dependency("/mod/a", "/ext/z").unwrap());

        assert_eq!(registry.asset_count().unwrap(), 2);
        assert_eq!(registry.dependency_count().unwrap(), 1);
    }

    #[test]
    fn test_original_casing_is_kept() {
        let registry = AssetRegistry::open_in_memory().unwrap();
        registry.add_dependency("/Mod/A", "/Ext/Rock").unwrap();

        let deps = registry.direct_dependencies(&AssetId::new("/mod/a")).unwrap();
        assert_eq!(deps[0].as_str(), "/Ext/Rock");
    }

    #[test]
    fn test_missing_asset_is_not_found() {
        let registry = AssetRegistry::open_in_memory().unwrap();
        let err = registry
            .direct_dependencies(&AssetId::new("/mod/ghost"))
            .unwrap_err();
        assert!(matches!(err, LookupError::NotFound(_)));
    }

    #[test]
    fn test_delete_cascades_edges() {
        let registry = AssetRegistry::open_in_memory().unwrap();
        registry.add_dependency("/mod/a", "/ext/z").unwrap();

        registry.delete_asset(&AssetId::new("/ext/z")).unwrap();
        assert_eq!(registry.dependency_count().unwrap(), 0);
        assert!(matches!(
            registry.delete_asset(&AssetId::new("/ext/z")),
            Err(DeleteError::Missing(_))
        ));
    }
}

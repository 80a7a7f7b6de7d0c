//! Dataset and layer catalog using SQLite.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

use wms_common::{
    slugify, validate_dataset_name, LayerRecord, Style, VirtualLayer, WmsError, WmsResult,
};

/// A registered dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: i64,
    pub uri: String,
    /// Unique; `_`, digits and ASCII letters only
    pub name: String,
    /// Human readable title
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_: String,
    pub keep_up_to_date: bool,
    pub display_all_timesteps: bool,
    /// Set when the topology cache is rebuilt; never edited directly
    pub cache_last_updated: Option<DateTime<Utc>>,
    /// Arbitrary dataset-specific blob
    pub json: Option<serde_json::Value>,
    pub slug: String,
    /// Dataset kind discriminator, e.g. `ugrid`
    pub kind: String,
}

/// Fields supplied when registering a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDataset {
    pub uri: String,
    pub name: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_: String,
    pub keep_up_to_date: bool,
    pub display_all_timesteps: bool,
    pub json: Option<serde_json::Value>,
    pub kind: String,
}

impl NewDataset {
    pub fn new(uri: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uri: uri.into(),
            title: name.clone(),
            name,
            abstract_: String::new(),
            keep_up_to_date: true,
            display_all_timesteps: false,
            json: None,
            kind: kind.into(),
        }
    }
}

/// Database connection pool and catalog operations.
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Open or create the catalog database at the given path.
    pub async fn open(path: &Path) -> WmsResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Connection failed: {}", e)))?;

        let catalog = Self { pool };
        catalog.migrate().await?;

        info!(path = %path.display(), "Opened catalog database");
        Ok(catalog)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> WmsResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);

        // One connection: every new connection would get its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Connection failed: {}", e)))?;

        let catalog = Self { pool };
        catalog.migrate().await?;
        Ok(catalog)
    }

    async fn migrate(&self) -> WmsResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| WmsError::DatabaseError(format!("Migration failed: {}", e)))?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Datasets
    // =========================================================================

    /// Register a new dataset. The slug is derived from the name.
    pub async fn insert_dataset(&self, new: &NewDataset) -> WmsResult<DatasetRecord> {
        validate_dataset_name(&new.name)?;

        let json = new.json.as_ref().map(serde_json::to_string).transpose()?;
        let slug = slugify(&new.name);

        let result = sqlx::query(
            r#"
            INSERT INTO datasets (
                uri, name, title, abstract, keep_up_to_date,
                display_all_timesteps, json, slug, kind
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.uri)
        .bind(&new.name)
        .bind(&new.title)
        .bind(&new.abstract_)
        .bind(new.keep_up_to_date)
        .bind(new.display_all_timesteps)
        .bind(json)
        .bind(&slug)
        .bind(&new.kind)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                WmsError::InvalidDatasetName {
                    name: new.name.clone(),
                    reason: "a dataset with this name already exists".to_string(),
                }
            }
            other => WmsError::DatabaseError(format!("Insert failed: {}", other)),
        })?;

        debug!(dataset = %new.name, kind = %new.kind, "Registered dataset");

        self.dataset_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| WmsError::InternalError("inserted dataset vanished".to_string()))
    }

    pub async fn dataset_by_id(&self, id: i64) -> WmsResult<Option<DatasetRecord>> {
        let row = sqlx::query_as::<_, DatasetRow>("SELECT * FROM datasets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Query failed: {}", e)))?;

        row.map(DatasetRecord::try_from).transpose()
    }

    pub async fn dataset_by_name(&self, name: &str) -> WmsResult<Option<DatasetRecord>> {
        self.fetch_dataset("SELECT * FROM datasets WHERE name = ?", name)
            .await
    }

    pub async fn dataset_by_slug(&self, slug: &str) -> WmsResult<Option<DatasetRecord>> {
        self.fetch_dataset("SELECT * FROM datasets WHERE slug = ?", slug)
            .await
    }

    async fn fetch_dataset(&self, sql: &str, key: &str) -> WmsResult<Option<DatasetRecord>> {
        let row = sqlx::query_as::<_, DatasetRow>(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Query failed: {}", e)))?;

        row.map(DatasetRecord::try_from).transpose()
    }

    /// All datasets, ordered by name.
    pub async fn list_datasets(&self) -> WmsResult<Vec<DatasetRecord>> {
        let rows = sqlx::query_as::<_, DatasetRow>("SELECT * FROM datasets ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.into_iter().map(DatasetRecord::try_from).collect()
    }

    pub async fn set_cache_last_updated(&self, id: i64, when: DateTime<Utc>) -> WmsResult<()> {
        sqlx::query("UPDATE datasets SET cache_last_updated = ? WHERE id = ?")
            .bind(when.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Update failed: {}", e)))?;
        Ok(())
    }

    /// Delete a dataset and all of its layers. Returns whether it existed.
    pub async fn delete_dataset(&self, id: i64) -> WmsResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Transaction failed: {}", e)))?;

        for sql in [
            "DELETE FROM virtual_layers WHERE dataset_id = ?",
            "DELETE FROM layers WHERE dataset_id = ?",
        ] {
            sqlx::query(sql)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| WmsError::DatabaseError(format!("Delete failed: {}", e)))?;
        }

        let result = sqlx::query("DELETE FROM datasets WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Delete failed: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Commit failed: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Layers
    // =========================================================================

    /// Fetch the layer for `(dataset_id, var_name)`, creating an inactive
    /// one if it does not exist yet.
    pub async fn get_or_create_layer(&self, dataset_id: i64, var_name: &str) -> WmsResult<LayerRecord> {
        sqlx::query("INSERT OR IGNORE INTO layers (dataset_id, var_name, styles) VALUES (?, ?, '[]')")
            .bind(dataset_id)
            .bind(var_name)
            .execute(&self.pool)
            .await
            .map_err(|e| WmsError::DatabaseError(format!("Insert failed: {}", e)))?;

        let row = sqlx::query_as::<_, LayerRow>(
            "SELECT * FROM layers WHERE dataset_id = ? AND var_name = ?",
        )
        .bind(dataset_id)
        .bind(var_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| WmsError::DatabaseError(format!("Query failed: {}", e)))?;

        LayerRecord::try_from(row)
    }

    pub async fn save_layer(&self, layer: &LayerRecord) -> WmsResult<()> {
        sqlx::query(
            r#"
            UPDATE layers
            SET std_name = ?, description = ?, active = ?,
                default_min = ?, default_max = ?, styles = ?
            WHERE id = ?
            "#,
        )
        .bind(&layer.std_name)
        .bind(&layer.description)
        .bind(layer.active)
        .bind(layer.default_min)
        .bind(layer.default_max)
        .bind(serde_json::to_string(&layer.styles)?)
        .bind(layer.id)
        .execute(&self.pool)
        .await
        .map_err(|e| WmsError::DatabaseError(format!("Update failed: {}", e)))?;
        Ok(())
    }

    /// Layers of a dataset in creation order.
    pub async fn layers_for_dataset(&self, dataset_id: i64) -> WmsResult<Vec<LayerRecord>> {
        let rows = sqlx::query_as::<_, LayerRow>(
            "SELECT * FROM layers WHERE dataset_id = ? ORDER BY id",
        )
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| WmsError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.into_iter().map(LayerRecord::try_from).collect()
    }

    pub async fn get_or_create_virtual_layer(
        &self,
        dataset_id: i64,
        var_name: &str,
    ) -> WmsResult<VirtualLayer> {
        sqlx::query(
            "INSERT OR IGNORE INTO virtual_layers (dataset_id, var_name, styles) VALUES (?, ?, '[]')",
        )
        .bind(dataset_id)
        .bind(var_name)
        .execute(&self.pool)
        .await
        .map_err(|e| WmsError::DatabaseError(format!("Insert failed: {}", e)))?;

        let row = sqlx::query_as::<_, VirtualLayerRow>(
            "SELECT * FROM virtual_layers WHERE dataset_id = ? AND var_name = ?",
        )
        .bind(dataset_id)
        .bind(var_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| WmsError::DatabaseError(format!("Query failed: {}", e)))?;

        VirtualLayer::try_from(row)
    }

    pub async fn save_virtual_layer(&self, layer: &VirtualLayer) -> WmsResult<()> {
        sqlx::query(
            r#"
            UPDATE virtual_layers
            SET std_name = ?, description = ?, active = ?, styles = ?
            WHERE id = ?
            "#,
        )
        .bind(&layer.std_name)
        .bind(&layer.description)
        .bind(layer.active)
        .bind(serde_json::to_string(&layer.styles)?)
        .bind(layer.id)
        .execute(&self.pool)
        .await
        .map_err(|e| WmsError::DatabaseError(format!("Update failed: {}", e)))?;
        Ok(())
    }

    pub async fn virtual_layers_for_dataset(&self, dataset_id: i64) -> WmsResult<Vec<VirtualLayer>> {
        let rows = sqlx::query_as::<_, VirtualLayerRow>(
            "SELECT * FROM virtual_layers WHERE dataset_id = ? ORDER BY id",
        )
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| WmsError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.into_iter().map(VirtualLayer::try_from).collect()
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(FromRow)]
struct DatasetRow {
    id: i64,
    uri: String,
    name: String,
    title: String,
    #[sqlx(rename = "abstract")]
    abstract_: String,
    keep_up_to_date: bool,
    display_all_timesteps: bool,
    cache_last_updated: Option<String>,
    json: Option<String>,
    slug: String,
    kind: String,
}

impl TryFrom<DatasetRow> for DatasetRecord {
    type Error = WmsError;

    fn try_from(row: DatasetRow) -> WmsResult<Self> {
        let cache_last_updated = row
            .cache_last_updated
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| WmsError::DatabaseError(format!("Bad timestamp {}: {}", s, e)))
            })
            .transpose()?;

        let json = row.json.as_deref().map(serde_json::from_str).transpose()?;

        Ok(DatasetRecord {
            id: row.id,
            uri: row.uri,
            name: row.name,
            title: row.title,
            abstract_: row.abstract_,
            keep_up_to_date: row.keep_up_to_date,
            display_all_timesteps: row.display_all_timesteps,
            cache_last_updated,
            json,
            slug: row.slug,
            kind: row.kind,
        })
    }
}

#[derive(FromRow)]
struct LayerRow {
    id: i64,
    dataset_id: i64,
    var_name: String,
    std_name: Option<String>,
    description: Option<String>,
    active: bool,
    default_min: Option<f64>,
    default_max: Option<f64>,
    styles: String,
}

impl TryFrom<LayerRow> for LayerRecord {
    type Error = WmsError;

    fn try_from(row: LayerRow) -> WmsResult<Self> {
        Ok(LayerRecord {
            id: row.id,
            dataset_id: row.dataset_id,
            var_name: row.var_name,
            std_name: row.std_name,
            description: row.description,
            active: row.active,
            default_min: row.default_min,
            default_max: row.default_max,
            styles: serde_json::from_str::<Vec<Style>>(&row.styles)?,
        })
    }
}

#[derive(FromRow)]
struct VirtualLayerRow {
    id: i64,
    dataset_id: i64,
    var_name: String,
    std_name: Option<String>,
    description: Option<String>,
    active: bool,
    styles: String,
}

impl TryFrom<VirtualLayerRow> for VirtualLayer {
    type Error = WmsError;

    fn try_from(row: VirtualLayerRow) -> WmsResult<Self> {
        Ok(VirtualLayer {
            id: row.id,
            dataset_id: row.dataset_id,
            var_name: row.var_name,
            std_name: row.std_name,
            description: row.description,
            active: row.active,
            styles: serde_json::from_str::<Vec<Style>>(&row.styles)?,
        })
    }
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS datasets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uri TEXT NOT NULL,
    name TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    abstract TEXT NOT NULL DEFAULT '',
    keep_up_to_date BOOLEAN NOT NULL DEFAULT 1,
    display_all_timesteps BOOLEAN NOT NULL DEFAULT 0,
    cache_last_updated TEXT,
    json TEXT,
    slug TEXT NOT NULL,
    kind TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_datasets_slug ON datasets(slug);

CREATE TABLE IF NOT EXISTS layers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_id INTEGER NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
    var_name TEXT NOT NULL,
    std_name TEXT,
    description TEXT,
    active BOOLEAN NOT NULL DEFAULT 0,
    default_min REAL,
    default_max REAL,
    styles TEXT NOT NULL DEFAULT '[]',

    UNIQUE(dataset_id, var_name)
);

CREATE TABLE IF NOT EXISTS virtual_layers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_id INTEGER NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
    var_name TEXT NOT NULL,
    std_name TEXT,
    description TEXT,
    active BOOLEAN NOT NULL DEFAULT 0,
    styles TEXT NOT NULL DEFAULT '[]',

    UNIQUE(dataset_id, var_name)
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let catalog = Catalog::open_memory().await.unwrap();
        let mut new = NewDataset::new("data/ocean.nc", "Ocean_Model_1", "ugrid");
        new.json = Some(serde_json::json!({"source": "hindcast"}));

        let ds = catalog.insert_dataset(&new).await.unwrap();
        assert_eq!(ds.slug, "ocean_model_1");
        assert!(ds.keep_up_to_date);
        assert!(!ds.display_all_timesteps);
        assert!(ds.cache_last_updated.is_none());

        let by_slug = catalog.dataset_by_slug("ocean_model_1").await.unwrap().unwrap();
        assert_eq!(by_slug, ds);
        assert_eq!(by_slug.json.unwrap()["source"], "hindcast");
        assert!(catalog.dataset_by_name("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let catalog = Catalog::open_memory().await.unwrap();
        let new = NewDataset::new("a.nc", "dup", "generic");
        catalog.insert_dataset(&new).await.unwrap();

        let err = catalog.insert_dataset(&new).await.unwrap_err();
        assert!(matches!(err, WmsError::InvalidDatasetName { .. }));
    }

    #[tokio::test]
    async fn test_invalid_name_rejected_before_insert() {
        let catalog = Catalog::open_memory().await.unwrap();
        let err = catalog
            .insert_dataset(&NewDataset::new("a.nc", "no spaces", "generic"))
            .await
            .unwrap_err();
        assert!(matches!(err, WmsError::InvalidDatasetName { .. }));
        assert!(catalog.list_datasets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_timestamp() {
        let catalog = Catalog::open_memory().await.unwrap();
        let ds = catalog
            .insert_dataset(&NewDataset::new("a.nc", "stamp", "generic"))
            .await
            .unwrap();

        let when = DateTime::parse_from_rfc3339("2015-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        catalog.set_cache_last_updated(ds.id, when).await.unwrap();

        let reloaded = catalog.dataset_by_id(ds.id).await.unwrap().unwrap();
        assert_eq!(reloaded.cache_last_updated, Some(when));
    }

    #[tokio::test]
    async fn test_layers_get_or_create_and_save() {
        let catalog = Catalog::open_memory().await.unwrap();
        let ds = catalog
            .insert_dataset(&NewDataset::new("a.nc", "layered", "ugrid"))
            .await
            .unwrap();

        let mut layer = catalog.get_or_create_layer(ds.id, "temp").await.unwrap();
        assert!(!layer.active);
        assert!(layer.styles.is_empty());

        layer.active = true;
        layer.std_name = Some("sea_water_temperature".to_string());
        layer.default_min = Some(-2.0);
        layer.styles = Style::defaults();
        catalog.save_layer(&layer).await.unwrap();

        let again = catalog.get_or_create_layer(ds.id, "temp").await.unwrap();
        assert_eq!(again, layer);
        assert_eq!(catalog.layers_for_dataset(ds.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let catalog = Catalog::open_memory().await.unwrap();
        let ds = catalog
            .insert_dataset(&NewDataset::new("a.nc", "doomed", "ugrid"))
            .await
            .unwrap();
        catalog.get_or_create_layer(ds.id, "u").await.unwrap();
        catalog.get_or_create_virtual_layer(ds.id, "u,v").await.unwrap();

        assert!(catalog.delete_dataset(ds.id).await.unwrap());
        assert!(catalog.layers_for_dataset(ds.id).await.unwrap().is_empty());
        assert!(catalog.virtual_layers_for_dataset(ds.id).await.unwrap().is_empty());
        assert!(!catalog.delete_dataset(ds.id).await.unwrap());
    }
}

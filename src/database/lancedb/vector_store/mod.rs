
use super::{NewRecord, SearchResult};
use crate::documents::DocumentMetadata;
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const TABLE_NAME: &str = "documents";

/// Vector database store using LanceDB for cosine similarity search
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    dimension: usize,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("path", &self.path)
            .field("table_name", &self.table_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Open (or create) the vector index at `path` for vectors of `dimension`
    ///
    /// An existing table whose vector column has a different dimension is dropped
    /// and recreated empty, since its records can no longer be compared to new
    /// queries.
    #[inline]
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Database(
                "Vector dimension must be greater than 0".to_string(),
            ));
        }

        debug!("Initializing LanceDB at path: {:?}", path);
        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.to_string_lossy().into_owned();

        // Attempt to connect with corruption recovery
        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                if looks_corrupted(&e.to_string()) {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        RagError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(RagError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let store = Self {
            connection,
            path: path.to_path_buf(),
            table_name: TABLE_NAME.to_string(),
            dimension,
        };

        store.initialize_table_with_recovery().await?;

        info!("Vector store initialized at {}", path.display());
        Ok(store)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the table if missing, or recreate it when its dimension is stale
    async fn initialize_table(&self) -> Result<()> {
        let table_names = self.table_names().await?;

        if table_names.contains(&self.table_name) {
            let existing = self.detect_existing_vector_dimension().await?;
            if existing == self.dimension {
                debug!("Documents table already exists with {} dimensions", existing);
                return Ok(());
            }

            warn!(
                "Vector dimension changed from {} to {}, recreating table",
                existing, self.dimension
            );
            self.drop_table_if_exists().await?;
        }

        self.connection
            .create_empty_table(&self.table_name, create_schema(self.dimension))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        info!(
            "Documents table created with {} dimensions",
            self.dimension
        );
        Ok(())
    }

    /// Initialize table with corruption recovery support
    async fn initialize_table_with_recovery(&self) -> Result<()> {
        match self.initialize_table().await {
            Ok(()) => Ok(()),
            Err(e) if looks_corrupted(&e.to_string()) || e.to_string().contains("schema") => {
                warn!("Table corruption detected during initialization: {}", e);

                if let Err(drop_err) = self.drop_table_if_exists().await {
                    warn!("Failed to drop corrupted table: {}", drop_err);
                }

                self.initialize_table().await.map_err(|e| {
                    RagError::Database(format!("Failed to recreate table after corruption: {}", e))
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                RagError::Database("Could not find vector column or determine dimension".to_string())
            })
    }

    /// Append records, assigning ids `doc_{i}` by position in the batch
    ///
    /// Every vector must have the store's dimension; nothing is written otherwise.
    /// Returns the number of records written.
    #[inline]
    pub async fn upsert(&self, records: Vec<NewRecord>) -> Result<usize> {
        if records.is_empty() {
            debug!("No records to store");
            return Ok(0);
        }

        if let Some((i, record)) = records
            .iter()
            .enumerate()
            .find(|(_, record)| record.vector.len() != self.dimension)
        {
            return Err(RagError::Database(format!(
                "Record {} has {} dimensions, expected {}",
                i,
                record.vector.len(),
                self.dimension
            )));
        }

        debug!("Storing batch of {} records", records.len());
        let record_batch = self.create_record_batch(&records)?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert records: {}", e)))?;

        info!("Stored {} records in the vector index", records.len());
        Ok(records.len())
    }

    /// Create a RecordBatch from new records
    fn create_record_batch(&self, records: &[NewRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let created_at = Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);
        let mut contents = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut doc_types = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);

        for (i, record) in records.iter().enumerate() {
            ids.push(format!("doc_{}", i));
            flat_values.extend_from_slice(&record.vector);
            contents.push(record.content.as_str());
            sources.push(record.metadata.source.as_str());
            doc_types.push(record.metadata.doc_type.as_str());
            chunk_indices.push(record.chunk_index);
        }

        let dimension = i32::try_from(self.dimension)
            .map_err(|_| RagError::Database("Vector dimension too large".to_string()))?;
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            dimension,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(doc_types)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(vec![created_at.as_str(); len])),
        ];

        RecordBatch::try_new(create_schema(self.dimension), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// The `k` records closest to `query` by cosine distance, closest first
    #[inline]
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(RagError::Database(format!(
                "Query vector has {} dimensions, expected {}",
                query.len(),
                self.dimension
            )));
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;
        if rows == 0 {
            debug!("Vector index is empty, nothing to search");
            return Ok(Vec::new());
        }

        debug!("Searching for {} nearest of {} records", k, rows);
        let stream = table
            .vector_search(query)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(parse_search_batch(batch)?);
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);

        debug!("Found {} search results", results.len());
        Ok(results)
    }

    /// Number of records in the index
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Remove every record, keeping an empty table
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        info!("Clearing vector index");
        self.drop_table_if_exists().await?;
        self.initialize_table().await
    }

    /// Validate database integrity
    ///
    /// # Returns
    /// * `Result<bool>` - True if database is healthy, false if corrupted
    #[inline]
    pub async fn validate_integrity(&self) -> Result<bool> {
        debug!("Validating database integrity");

        let table_names = match self.connection.table_names().execute().await {
            Ok(names) => names,
            Err(e) => {
                error!("Failed to list tables during integrity check: {}", e);
                return Ok(false);
            }
        };

        if !table_names.contains(&self.table_name) {
            warn!("Documents table missing during integrity check");
            return Ok(false);
        }

        match self.detect_existing_vector_dimension().await {
            Ok(dimension) if dimension == self.dimension => {}
            Ok(dimension) => {
                warn!(
                    "Stored vector dimension {} does not match {}",
                    dimension, self.dimension
                );
                return Ok(false);
            }
            Err(e) => {
                error!("Failed to read schema during integrity check: {}", e);
                return Ok(false);
            }
        }

        match self.count().await {
            Ok(count) => {
                debug!("Database integrity check passed, {} rows found", count);
                Ok(true)
            }
            Err(e) => {
                error!("Failed to count rows during integrity check: {}", e);
                Ok(false)
            }
        }
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))
    }

    /// Drop the documents table if it exists
    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.table_names().await?.contains(&self.table_name) {
            info!("Dropping existing documents table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    /// Move a corrupted database aside so a fresh one can be created
    fn attempt_corruption_recovery(db_path: &Path) -> Result<()> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                RagError::Database(format!("Failed to remove corrupted database: {}", e))
            })?;
        }

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Database(format!("Failed to recreate vector database directory: {}", e))
        })?;

        info!("Database corruption recovery completed");
        Ok(())
    }
}

fn looks_corrupted(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("corrupt") || message.contains("invalid") || message.contains("malformed")
}

/// Create schema with the specified vector dimension
fn create_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                i32::try_from(dimension).unwrap_or(i32::MAX),
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("doc_type", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, true),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let contents = string_column(batch, "content")?;
    let sources = string_column(batch, "source")?;
    let doc_types = string_column(batch, "doc_type")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| RagError::Database("Missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database("Invalid chunk_index column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .ok_or_else(|| RagError::Database("Missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| RagError::Database("Invalid _distance column type".to_string()))?;

    let results = (0..batch.num_rows())
        .map(|row| SearchResult {
            content: contents.value(row).to_string(),
            metadata: DocumentMetadata {
                source: sources.value(row).to_string(),
                doc_type: doc_types.value(row).to_string(),
            },
            chunk_index: (!chunk_indices.is_null(row)).then(|| chunk_indices.value(row)),
            distance: if distances.is_null(row) {
                f32::INFINITY
            } else {
                distances.value(row)
            },
        })
        .collect();

    Ok(results)
}

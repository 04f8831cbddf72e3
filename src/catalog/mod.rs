//! Table and index metadata.
//!
//! The catalog bundles each table's schema with its [`TableHeap`] and the
//! [`IndexInfo`] of every index attached to it, so executors can look up
//! both "what are the columns" and "where do I write/scan" from a single
//! name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::OrderedIndex;
use crate::storage::TableHeap;
use crate::Result;

/// Errors raised by catalog lookups and mutations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("table {0} already exists")]
    TableAlreadyExists(String),
    #[error("table {0} not found")]
    TableNotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DataType {
    Integer,
    Float,
    Varchar(usize),
    Boolean,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Schema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(name: String, columns: Vec<Column>) -> Self {
        Self { name, columns }
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Metadata for one index attached to a table: its key schema (the
/// projection of table columns that form the index key) and a handle to
/// the index itself.
#[derive(Clone)]
pub struct IndexInfo {
    pub name: String,
    pub key_columns: Vec<usize>,
    pub index: Arc<OrderedIndex>,
}

impl IndexInfo {
    /// Projects a row's values onto this index's key schema. A
    /// single-column key uses that column's value directly; a composite
    /// key joins each column's display form, since the underlying
    /// [`OrderedIndex`] keys on a single [`crate::common::Value`].
    pub fn project_key(&self, values: &[crate::common::Value]) -> crate::common::Value {
        if self.key_columns.len() == 1 {
            values[self.key_columns[0]].clone()
        } else {
            let joined = self
                .key_columns
                .iter()
                .map(|&i| values[i].to_string())
                .collect::<Vec<_>>()
                .join("\u{1}");
            crate::common::Value::String(joined)
        }
    }
}

/// A table's schema, heap, and attached indexes, bundled for executor
/// lookup.
#[derive(Clone)]
pub struct TableMetadata {
    pub schema: Schema,
    pub heap: Arc<TableHeap>,
    pub indexes: Vec<IndexInfo>,
}

/// Catalog of tables and their metadata.
#[derive(Clone)]
pub struct Catalog {
    tables: Arc<RwLock<HashMap<String, TableMetadata>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn create_table(&self, schema: Schema, heap: Arc<TableHeap>) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(&schema.name) {
            return Err(CatalogError::TableAlreadyExists(schema.name).into());
        }
        let name = schema.name.clone();
        tables.insert(
            name,
            TableMetadata {
                schema,
                heap,
                indexes: Vec::new(),
            },
        );
        Ok(())
    }

    /// Attaches an index to an existing table.
    pub fn create_index(
        &self,
        table: &str,
        name: String,
        key_columns: Vec<usize>,
        index: Arc<OrderedIndex>,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let meta = tables
            .get_mut(table)
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))?;
        meta.indexes.push(IndexInfo {
            name,
            key_columns,
            index,
        });
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<TableMetadata> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()).into())
    }

    pub fn get_table_indexes(&self, name: &str) -> Result<Vec<IndexInfo>> {
        Ok(self.get_table(name)?.indexes)
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.tables
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()).into())
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

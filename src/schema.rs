//! Schema catalog shown in the schema browser

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    /// "PRI", "MUL" or empty
    pub key: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnSchema>,
    pub indexes: Vec<String>,
    pub row_count: u64,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Secondary indexes, i.e. everything except PRIMARY
    pub fn secondary_indexes(&self) -> Vec<&str> {
        self.indexes
            .iter()
            .map(|i| i.as_str())
            .filter(|i| *i != "PRIMARY")
            .collect()
    }
}

fn column(name: &str, data_type: &str, key: &str, nullable: bool) -> ColumnSchema {
    ColumnSchema {
        name: name.to_string(),
        data_type: data_type.to_string(),
        key: key.to_string(),
        nullable,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub tables: Vec<TableSchema>,
}

impl SchemaCatalog {
    /// The mock water utility schema
    pub fn water_utility() -> Self {
        let water_quality = TableSchema {
            table: "water_quality".to_string(),
            columns: vec![
                column("id", "INT", "PRI", false),
                column("measurement_date", "DATETIME", "MUL", false),
                column("location", "VARCHAR(100)", "MUL", false),
                column("ph_level", "DECIMAL(4,2)", "", true),
                column("turbidity", "DECIMAL(5,2)", "", true),
                column("temperature", "DECIMAL(5,2)", "", true),
                column("residual_chlorine", "DECIMAL(5,3)", "", true),
                column("toc", "DECIMAL(5,2)", "", true),
                column("ammonia_nitrogen", "DECIMAL(5,3)", "", true),
                column("conductivity", "INT", "", true),
            ],
            indexes: vec![
                "PRIMARY".to_string(),
                "idx_measurement_date".to_string(),
                "idx_location".to_string(),
            ],
            row_count: 15420,
        };

        let water_sources = TableSchema {
            table: "water_sources".to_string(),
            columns: vec![
                column("id", "INT", "PRI", false),
                column("name", "VARCHAR(100)", "", false),
                column("region", "VARCHAR(50)", "", false),
                column("capacity", "INT", "", true),
            ],
            indexes: vec!["PRIMARY".to_string()],
            row_count: 25,
        };

        Self {
            tables: vec![water_quality, water_sources],
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.table == name)
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::water_utility()
    }
}

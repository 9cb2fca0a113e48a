//! Tabular view of the canonical predictions
//!
//! `TableView` is built once per cycle. Filtering, sorting and pagination
//! are explicit `TableQuery` parameters evaluated in memory; the CSV export
//! always covers the full view regardless of any query.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::prediction::{
    disambiguate_extra_keys, Prediction, LABEL_FIELD, NAME_FIELD, PROBABILITY_FIELD,
};

/// Rows per page
pub const PAGE_SIZE: usize = 10;

/// Query-string prefix for per-column filters (`filter.name=al`)
pub const FILTER_PREFIX: &str = "filter.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Identifier used in queries
    pub id: String,
    /// Header shown to users and written to CSV
    pub title: String,
}

impl Column {
    fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Cell::Number)
                .unwrap_or_else(|| Cell::Text(n.to_string())),
            serde_json::Value::String(s) => Cell::Text(s.clone()),
            serde_json::Value::Null => Cell::Text(String::new()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Text used for filtering and export
    pub fn display(&self) -> String {
        match self {
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }

    fn compare(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Cell::Text(a), Cell::Text(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
            (Cell::Number(_), Cell::Text(_)) => Ordering::Less,
            (Cell::Text(_), Cell::Number(_)) => Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Result<Self, TableError> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(TableError::InvalidDirection(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// Filter / sort / page parameters for one table read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    /// (column id, case-insensitive substring), all must match
    pub filters: Vec<(String, String)>,
    pub sort: Option<SortSpec>,
    /// Zero-based page index
    pub page: usize,
}

impl TableQuery {
    /// Build from query-string pairs: `filter.<column>`, `sort`, `dir`, `page`
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, TableError> {
        let mut query = TableQuery::default();
        let mut direction = SortDirection::default();

        for (key, value) in params {
            if let Some(column) = key.strip_prefix(FILTER_PREFIX) {
                query.filters.push((column.to_string(), value.clone()));
                continue;
            }
            match key.as_str() {
                "sort" => {
                    query.sort = Some(SortSpec {
                        column: value.clone(),
                        direction: SortDirection::Asc,
                    })
                }
                "dir" => direction = SortDirection::parse(value)?,
                "page" => {
                    query.page = value
                        .parse()
                        .map_err(|_| TableError::InvalidPage(value.clone()))?
                }
                _ => return Err(TableError::UnknownParameter(key.clone())),
            }
        }

        if let Some(sort) = query.sort.as_mut() {
            sort.direction = direction;
        }
        // HashMap iteration order is arbitrary
        query.filters.sort();
        Ok(query)
    }
}

/// One page of a queried table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePage {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    /// Rows matching the filters
    pub filtered_rows: usize,
    /// Rows in the full table
    pub total_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
}

impl TablePage {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Full table of one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl TableView {
    /// One column per prediction field, one row per prediction.
    ///
    /// Extra fields whose key matches a fixed column id or title are exposed
    /// as `extra.<key>`, so every column id stays unique.
    pub fn from_predictions(predictions: &[Prediction]) -> Self {
        let extra_keys: BTreeSet<&str> = predictions
            .iter()
            .flat_map(|p| p.extra.keys().map(String::as_str))
            .collect();

        let fixed = [
            Column::new("name", NAME_FIELD),
            Column::new("label", LABEL_FIELD),
            Column::new("probability", PROBABILITY_FIELD),
        ];
        let reserved: Vec<&str> = fixed
            .iter()
            .flat_map(|c| [c.id.as_str(), c.title.as_str()])
            .collect();
        let exposed = disambiguate_extra_keys(extra_keys.iter().copied(), &reserved);

        let mut columns = fixed.to_vec();
        columns.extend(exposed.iter().map(|(_, k)| Column::new(k, k)));

        let rows = predictions
            .iter()
            .map(|p| {
                let mut row = vec![
                    Cell::Text(p.name.clone()),
                    Cell::Text(p.label.to_string()),
                    Cell::Number(p.probability),
                ];
                row.extend(exposed.iter().map(|(k, _)| {
                    p.extra
                        .get(*k)
                        .map(Cell::from_json)
                        .unwrap_or_else(|| Cell::Text(String::new()))
                }));
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, id: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| TableError::UnknownColumn(id.to_string()))
    }

    /// Apply filters, then sort, then cut the requested page
    pub fn query(&self, query: &TableQuery) -> Result<TablePage, TableError> {
        let filters = query
            .filters
            .iter()
            .map(|(column, needle)| Ok((self.column_index(column)?, needle.to_lowercase())))
            .collect::<Result<Vec<_>, TableError>>()?;

        let mut matching: Vec<&Vec<Cell>> = self
            .rows
            .iter()
            .filter(|row| {
                filters
                    .iter()
                    .all(|(idx, needle)| row[*idx].display().to_lowercase().contains(needle))
            })
            .collect();

        if let Some(sort) = &query.sort {
            let idx = self.column_index(&sort.column)?;
            matching.sort_by(|a, b| {
                let ord = a[idx].compare(&b[idx]);
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let filtered_rows = matching.len();
        let page_count = filtered_rows.div_ceil(PAGE_SIZE);
        let rows = matching
            .into_iter()
            .skip(query.page.saturating_mul(PAGE_SIZE))
            .take(PAGE_SIZE)
            .cloned()
            .collect();

        Ok(TablePage {
            columns: self.columns.clone(),
            rows,
            page: query.page,
            page_size: PAGE_SIZE,
            page_count,
            filtered_rows,
            total_rows: self.rows.len(),
            sort: query.sort.clone(),
        })
    }

    /// First page, no filter or sort
    pub fn first_page(&self) -> TablePage {
        self.query(&TableQuery::default())
            .unwrap_or_else(|_| unreachable!("default query names no columns"))
    }

    /// CSV of every row, header = column titles
    pub fn export_csv(&self) -> Result<String, TableError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let export_err = |e: csv::Error| TableError::Export(e.to_string());

        writer
            .write_record(self.columns.iter().map(|c| c.title.as_str()))
            .map_err(export_err)?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(Cell::display))
                .map_err(export_err)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| TableError::Export(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| TableError::Export(e.to_string()))
    }
}

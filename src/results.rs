//! Result panel: executions of generated SQL against mock data, paging and
//! the execution history tab.

use crate::mock_data::{MockDataProvider, ResultSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

/// Columns shown before the user opens the column picker
pub const PRIMARY_COLUMNS: &[&str] = &[
    "번호", "측정일시", "위치", "pH수치", "탁도", "온도", "잔류염소", "평균_pH", "측정횟수",
    "측정일자", "지역", "가정용_사용량", "청구금액",
    "시설ID", "시설명", "가동상태", "최근점검일", "가동률", "담당자",
];

/// Narrow results show every column
const SHOW_ALL_COLUMNS_AT_MOST: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub sql: String,
    pub original_query: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub row_count: usize,
    pub results: ResultSet,
}

pub struct ResultPanel {
    provider: MockDataProvider,
    history: VecDeque<ExecutionRecord>,
    history_capacity: usize,
    page_size: usize,
    current: Option<ResultSet>,
    displayed: usize,
    visible_columns: Vec<String>,
}

impl ResultPanel {
    pub fn new(provider: MockDataProvider, history_capacity: usize, page_size: usize) -> Self {
        Self {
            provider,
            history: VecDeque::new(),
            history_capacity: history_capacity.max(1),
            page_size: page_size.max(1),
            current: None,
            displayed: 0,
            visible_columns: Vec::new(),
        }
    }

    /// "Run" a statement: load mock rows for its table and record it
    pub fn execute(&mut self, sql: &str, original_query: Option<&str>) -> &ExecutionRecord {
        let started = Instant::now();
        let results = self.provider.for_sql(sql);
        let elapsed = started.elapsed();

        info!(
            " Executed against mock {} ({} rows)",
            results.table,
            results.len()
        );

        let record = ExecutionRecord {
            id: Uuid::new_v4(),
            sql: sql.to_string(),
            original_query: original_query.map(str::to_string),
            executed_at: Utc::now(),
            elapsed,
            row_count: results.len(),
            results: results.clone(),
        };

        self.show(results);
        self.history.push_front(record);
        self.history.truncate(self.history_capacity);
        &self.history[0]
    }

    /// Newest first
    pub fn history(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Show a past execution's rows again
    pub fn load_history(&mut self, id: Uuid) -> bool {
        let results = match self.history.iter().find(|r| r.id == id) {
            Some(record) => record.results.clone(),
            None => return false,
        };
        self.show(results);
        true
    }

    pub fn current(&self) -> Option<&ResultSet> {
        self.current.as_ref()
    }

    /// Rows loaded into view so far
    pub fn displayed_rows(&self) -> &[Vec<String>] {
        match &self.current {
            Some(results) => &results.rows[..self.displayed],
            None => &[],
        }
    }

    /// Load the next page; returns how many rows were added
    pub fn load_more(&mut self) -> usize {
        let total = self.current.as_ref().map(|r| r.len()).unwrap_or(0);
        let next = (self.displayed + self.page_size).min(total);
        let added = next - self.displayed;
        self.displayed = next;
        added
    }

    pub fn has_more(&self) -> bool {
        self.current
            .as_ref()
            .map(|r| self.displayed < r.len())
            .unwrap_or(false)
    }

    pub fn visible_columns(&self) -> &[String] {
        &self.visible_columns
    }

    /// Show or hide a column; returns whether it is now visible
    pub fn toggle_column(&mut self, column: &str) -> bool {
        if let Some(pos) = self.visible_columns.iter().position(|c| c == column) {
            self.visible_columns.remove(pos);
            return false;
        }
        let known = self
            .current
            .as_ref()
            .map(|r| r.column_index(column).is_some())
            .unwrap_or(false);
        if known {
            self.visible_columns.push(column.to_string());
        }
        known
    }

    /// Move the visible column at `index` by `offset` places.
    /// Moves past either end are ignored.
    pub fn move_column(&mut self, index: usize, offset: isize) -> bool {
        let target = match index.checked_add_signed(offset) {
            Some(target) if target < self.visible_columns.len() => target,
            _ => return false,
        };
        if index >= self.visible_columns.len() || target == index {
            return false;
        }
        self.visible_columns.swap(index, target);
        true
    }

    fn show(&mut self, results: ResultSet) {
        self.visible_columns = default_visible_columns(&results);
        self.displayed = self.page_size.min(results.len());
        self.current = Some(results);
    }
}

fn default_visible_columns(results: &ResultSet) -> Vec<String> {
    let show_all = results.columns.len() <= SHOW_ALL_COLUMNS_AT_MOST;
    results
        .columns
        .iter()
        .filter(|c| show_all || PRIMARY_COLUMNS.contains(&c.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_data::WATER_QUALITY_ROWS;

    fn panel() -> ResultPanel {
        ResultPanel::new(MockDataProvider::new(Some(3)), 10, 20)
    }

    #[test]
    fn test_execute_pages_first_rows() {
        let mut panel = panel();
        let record = panel.execute("SELECT id FROM water_quality;", Some("최근 수질"));
        assert_eq!(record.row_count, WATER_QUALITY_ROWS);

        assert_eq!(panel.displayed_rows().len(), 20);
        assert_eq!(panel.load_more(), 20);
        assert_eq!(panel.displayed_rows().len(), 40);
        assert!(panel.has_more());
    }

    #[test]
    fn test_paging_stops_at_end() {
        let mut panel = panel();
        panel.execute("SELECT * FROM facility_status;", None);

        assert_eq!(panel.load_more(), 5);
        assert_eq!(panel.load_more(), 0);
        assert!(!panel.has_more());
    }

    #[test]
    fn test_history_newest_first_and_capped() {
        let mut panel = ResultPanel::new(MockDataProvider::new(Some(3)), 3, 20);
        for n in 0..5 {
            panel.execute(&format!("SELECT {} FROM water_usage;", n), None);
        }

        assert_eq!(panel.history_len(), 3);
        let sqls: Vec<&str> = panel.history().map(|r| r.sql.as_str()).collect();
        assert_eq!(
            sqls,
            vec![
                "SELECT 4 FROM water_usage;",
                "SELECT 3 FROM water_usage;",
                "SELECT 2 FROM water_usage;",
            ]
        );
    }

    #[test]
    fn test_load_history_restores_rows() {
        let mut panel = panel();
        let first_id = panel.execute("SELECT * FROM facility_status;", None).id;
        panel.execute("SELECT * FROM water_quality;", None);

        assert!(panel.load_history(first_id));
        assert_eq!(panel.current().map(|r| r.table.as_str()), Some("facility_status"));
        assert!(!panel.load_history(Uuid::new_v4()));
    }

    #[test]
    fn test_visible_columns() {
        let mut panel = panel();
        panel.execute("SELECT * FROM water_quality;", None);
        let visible = panel.visible_columns().to_vec();
        assert!(visible.contains(&"pH수치".to_string()));
        assert!(!visible.contains(&"총유기탄소".to_string()));

        assert!(panel.toggle_column("총유기탄소"));
        assert!(!panel.toggle_column("pH수치"));
        assert!(!panel.toggle_column("없는컬럼"));

        panel.execute("SELECT * FROM water_usage;", None);
        assert_eq!(panel.visible_columns().len(), 4);
    }

    #[test]
    fn test_move_column() {
        let mut panel = panel();
        panel.execute("SELECT * FROM water_usage;", None);

        assert!(panel.move_column(0, 1));
        assert_eq!(panel.visible_columns()[..2], ["지역", "측정일자"]);
        assert!(panel.move_column(3, -1));
        assert_eq!(panel.visible_columns()[2..], ["청구금액", "가정용_사용량"]);

        // Out of bounds leaves the order alone
        let before = panel.visible_columns().to_vec();
        assert!(!panel.move_column(0, -1));
        assert!(!panel.move_column(3, 1));
        assert!(!panel.move_column(9, -1));
        assert_eq!(panel.visible_columns(), before.as_slice());
    }
}

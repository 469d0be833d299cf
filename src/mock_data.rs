//! Mock data provider
//!
//! Nothing is executed: "running" a statement picks the table named in its
//! FROM clause and synthesizes plausible rows for it.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const WATER_QUALITY_ROWS: usize = 1000;
pub const USAGE_DAYS: usize = 30;
pub const FACILITY_COUNT: usize = 25;

const SOURCES: &[&str] = &["수원지A", "수원지B", "수원지C"];
const REGIONS: &[&str] = &["강남구", "서초구", "송파구", "마포구"];
const FACILITY_STATES: &[&str] = &["정상", "점검필요", "가동중지"];
const OPERATORS: &[&str] = &["김민수", "이서연", "박지훈", "최유진", "정하늘"];
const WON_PER_CUBIC_METER: u64 = 720;

/// Tabular result with display-ready string cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn new(table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockTable {
    WaterQuality,
    WaterUsage,
    FacilityStatus,
}

impl MockTable {
    /// Table referenced by a SQL string; water_quality unless another is named
    pub fn from_sql(sql: &str) -> Self {
        let lower = sql.to_lowercase();
        if lower.contains("water_usage") {
            MockTable::WaterUsage
        } else if lower.contains("facility_status") {
            MockTable::FacilityStatus
        } else {
            MockTable::WaterQuality
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MockTable::WaterQuality => "water_quality",
            MockTable::WaterUsage => "water_usage",
            MockTable::FacilityStatus => "facility_status",
        }
    }
}

pub struct MockDataProvider {
    rng: StdRng,
}

impl MockDataProvider {
    /// Deterministic when seeded
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn for_sql(&mut self, sql: &str) -> ResultSet {
        self.generate(MockTable::from_sql(sql))
    }

    pub fn generate(&mut self, table: MockTable) -> ResultSet {
        debug!("Generating mock rows for {}", table.name());
        match table {
            MockTable::WaterQuality => self.water_quality(),
            MockTable::WaterUsage => self.water_usage(),
            MockTable::FacilityStatus => self.facility_status(),
        }
    }

    fn water_quality(&mut self) -> ResultSet {
        let mut result = ResultSet::new(
            MockTable::WaterQuality.name(),
            &[
                "번호",
                "측정일시",
                "위치",
                "pH수치",
                "탁도",
                "온도",
                "잔류염소",
                "총유기탄소",
                "암모니아성질소",
                "전기전도도",
            ],
        );

        let base = base_time();
        for i in 0..WATER_QUALITY_ROWS {
            let measured_at = base + Duration::hours(i as i64);
            result.rows.push(vec![
                (i + 1).to_string(),
                measured_at.format("%Y-%m-%d %H:%M").to_string(),
                SOURCES[i % SOURCES.len()].to_string(),
                format!("{:.2}", self.rng.gen_range(6.5..8.0)),
                format!("{:.2}", self.rng.gen_range(0.3..1.5)),
                format!("{:.1}", self.rng.gen_range(12.0..20.0)),
                format!("{:.3}", self.rng.gen_range(0.1..0.5)),
                format!("{:.2}", self.rng.gen_range(1.0..3.5)),
                format!("{:.3}", self.rng.gen_range(0.01..0.11)),
                format!("{:.0}", self.rng.gen_range(150.0..450.0)),
            ]);
        }
        result
    }

    fn water_usage(&mut self) -> ResultSet {
        let mut result = ResultSet::new(
            MockTable::WaterUsage.name(),
            &["측정일자", "지역", "가정용_사용량", "청구금액"],
        );

        let base = base_time().date();
        for day in 0..USAGE_DAYS {
            let date = base + Duration::days(day as i64);
            for region in REGIONS {
                let usage: u64 = self.rng.gen_range(800..1500);
                result.rows.push(vec![
                    date.format("%Y-%m-%d").to_string(),
                    region.to_string(),
                    usage.to_string(),
                    (usage * WON_PER_CUBIC_METER).to_string(),
                ]);
            }
        }
        result
    }

    fn facility_status(&mut self) -> ResultSet {
        let mut result = ResultSet::new(
            MockTable::FacilityStatus.name(),
            &["시설ID", "시설명", "가동상태", "최근점검일", "가동률", "담당자"],
        );

        let base = base_time().date();
        for i in 0..FACILITY_COUNT {
            let inspected = base + Duration::days(self.rng.gen_range(0..90));
            let state = FACILITY_STATES.choose(&mut self.rng).copied().unwrap_or("정상");
            let operator = OPERATORS.choose(&mut self.rng).copied().unwrap_or_default();
            result.rows.push(vec![
                format!("F-{:03}", i + 1),
                format!("제{}정수장", i + 1),
                state.to_string(),
                inspected.format("%Y-%m-%d").to_string(),
                format!("{:.1}%", self.rng.gen_range(60.0..100.0)),
                operator.to_string(),
            ]);
        }
        result
    }
}

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

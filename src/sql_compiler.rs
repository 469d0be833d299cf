//! SQL Compiler - clause-set model of a generated statement
//!
//! Statements are kept as structured clauses so that edit requests ("sort
//! ascending", "only 50 rows") change one clause instead of patching text.
//! Text is produced only by `render`.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const WATER_QUALITY_TABLE: &str = "water_quality";
pub const MEASUREMENT_DATE: &str = "measurement_date";
pub const LOCATION: &str = "location";

/// Default projection: column and Korean display alias
const DEFAULT_COLUMNS: &[(&str, &str)] = &[
    ("id", "번호"),
    ("measurement_date", "측정일시"),
    ("location", "위치"),
    ("ph_level", "pH수치"),
    ("turbidity", "탁도"),
    ("temperature", "온도"),
    ("residual_chlorine", "잔류염소"),
    ("toc", "총유기탄소"),
    ("ammonia_nitrogen", "암모니아성질소"),
    ("conductivity", "전기전도도"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: String,
    pub alias: String,
}

impl SelectItem {
    pub fn new(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: alias.into(),
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} AS '{}'", self.expr, self.alias)
    }
}

/// Water quality indicators that can be averaged or thresholded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Ph,
    Turbidity,
    Temperature,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [Indicator::Ph, Indicator::Turbidity, Indicator::Temperature];

    pub fn column(&self) -> &'static str {
        match self {
            Indicator::Ph => "ph_level",
            Indicator::Turbidity => "turbidity",
            Indicator::Temperature => "temperature",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Indicator::Ph => "pH",
            Indicator::Turbidity => "탁도",
            Indicator::Temperature => "온도",
        }
    }

    pub fn average_item(&self) -> SelectItem {
        SelectItem::new(
            format!("AVG({})", self.column()),
            format!("평균_{}", self.label()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalUnit {
    Day,
    Month,
}

impl IntervalUnit {
    fn keyword(&self) -> &'static str {
        match self {
            IntervalUnit::Day => "DAY",
            IntervalUnit::Month => "MONTH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    LocationEquals { location: String },
    /// measurement_date within the last `amount` units
    WithinLast { amount: u32, unit: IntervalUnit },
    Today,
    AtLeast { indicator: Indicator, value: String },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::LocationEquals { location } => write!(f, "{} = '{}'", LOCATION, location),
            Predicate::WithinLast { amount, unit } => write!(
                f,
                "{} >= DATE_SUB(NOW(), INTERVAL {} {})",
                MEASUREMENT_DATE,
                amount,
                unit.keyword()
            ),
            Predicate::Today => write!(f, "DATE({}) = CURDATE()", MEASUREMENT_DATE),
            Predicate::AtLeast { indicator, value } => {
                write!(f, "{} >= {}", indicator.column(), value)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBySpec {
    pub column: String,
    /// None renders without a keyword (database default)
    pub direction: Option<SortDirection>,
}

impl OrderBySpec {
    pub fn new(column: impl Into<String>, direction: Option<SortDirection>) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

impl fmt::Display for OrderBySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Some(direction) => write!(f, "{} {}", self.column, direction.keyword()),
            None => write!(f, "{}", self.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlStatement {
    pub select: Vec<SelectItem>,
    pub from: String,
    pub filters: Vec<Predicate>,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderBySpec>,
    /// Row count as typed, an ASCII digit run
    pub limit: Option<String>,
}

impl SqlStatement {
    /// Every water_quality column, newest measurements first
    pub fn default_projection() -> Self {
        Self {
            select: DEFAULT_COLUMNS
                .iter()
                .map(|(column, alias)| SelectItem::new(*column, *alias))
                .collect(),
            from: WATER_QUALITY_TABLE.to_string(),
            filters: Vec::new(),
            group_by: Vec::new(),
            order_by: vec![OrderBySpec::new(MEASUREMENT_DATE, Some(SortDirection::Desc))],
            limit: Some(crate::keywords::FRESH_LIMIT.to_string()),
        }
    }

    /// Replace the projection with per-location averages
    pub fn aggregate_by_location(&mut self, indicators: &[Indicator]) {
        let mut select = vec![SelectItem::new(LOCATION, "위치")];
        select.extend(indicators.iter().map(|i| i.average_item()));
        self.select = select;
        self.group_by_location();
    }

    pub fn group_by_location(&mut self) {
        self.group_by = vec![LOCATION.to_string()];
        self.order_by = vec![OrderBySpec::new(LOCATION, None)];
    }

    pub fn set_limit(&mut self, limit: impl Into<String>) {
        self.limit = Some(limit.into());
    }

    /// Flip every sort key currently sorted `from` to `to`
    pub fn redirect_order(&mut self, from: SortDirection, to: SortDirection) {
        for key in self.order_by.iter_mut() {
            if key.direction == Some(from) {
                key.direction = Some(to);
            }
        }
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("SELECT {}", self.select.iter().join(", ")),
            format!("FROM {}", self.from),
        ];

        if !self.filters.is_empty() {
            lines.push(format!("WHERE {}", self.filters.iter().join("\n  AND ")));
        }
        if !self.group_by.is_empty() {
            lines.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.order_by.is_empty() {
            lines.push(format!("ORDER BY {}", self.order_by.iter().join(", ")));
        }
        if let Some(limit) = &self.limit {
            lines.push(format!("LIMIT {}", limit));
        }

        let mut sql = lines.join("\n");
        sql.push(';');
        sql
    }
}

impl Default for SqlStatement {
    fn default() -> Self {
        Self::default_projection()
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_projection() {
        let sql = SqlStatement::default_projection().render();
        let lines: Vec<&str> = sql.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("SELECT id AS '번호', measurement_date AS '측정일시'"));
        assert!(lines[0].ends_with("conductivity AS '전기전도도'"));
        assert_eq!(lines[1], "FROM water_quality");
        assert_eq!(lines[2], "ORDER BY measurement_date DESC");
        assert_eq!(lines[3], "LIMIT 100;");
    }

    #[test]
    fn test_render_filters_and_grouping() {
        let mut statement = SqlStatement::default_projection();
        statement.filters.push(Predicate::LocationEquals {
            location: "수원지A".to_string(),
        });
        statement.filters.push(Predicate::WithinLast {
            amount: 1,
            unit: IntervalUnit::Month,
        });
        statement.aggregate_by_location(&[Indicator::Turbidity]);

        assert_eq!(
            statement.render(),
            "SELECT location AS '위치', AVG(turbidity) AS '평균_탁도'\n\
             FROM water_quality\n\
             WHERE location = '수원지A'\n  AND measurement_date >= DATE_SUB(NOW(), INTERVAL 1 MONTH)\n\
             GROUP BY location\n\
             ORDER BY location\n\
             LIMIT 100;"
        );
    }

    #[test]
    fn test_redirect_order_only_touches_matching_keys() {
        let mut statement = SqlStatement::default_projection();
        statement.order_by.push(OrderBySpec::new(LOCATION, None));

        statement.redirect_order(SortDirection::Desc, SortDirection::Asc);
        assert_eq!(statement.order_by[0].direction, Some(SortDirection::Asc));
        assert_eq!(statement.order_by[1].direction, None);
    }
}

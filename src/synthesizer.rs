//! SQL Synthesizer
//!
//! Turns an analyzed query into a statement, either by editing the previous
//! statement (modification turns) or by assembling a new one clause by clause.

use crate::analyzer::QueryAnalysis;
use crate::context::ConversationContext;
use crate::keywords::{self, Intent};
use crate::sql_compiler::{Indicator, IntervalUnit, Predicate, SortDirection, SqlStatement};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single structured edit applied to the previous statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlEdit {
    /// Digits are kept verbatim, however large
    SetLimit(String),
    Ascending,
    Descending,
    GroupByLocation,
}

impl SqlEdit {
    /// First matching edit rule, if any
    pub fn detect(lower: &str) -> Option<Self> {
        if keywords::contains_any(lower, keywords::LIMIT_EDIT) || keywords::has_count_phrase(lower) {
            let limit = keywords::first_number(lower).unwrap_or(keywords::DEFAULT_EDIT_LIMIT);
            return Some(SqlEdit::SetLimit(limit.to_string()));
        }
        if keywords::contains_any(lower, keywords::ASCENDING_EDIT) {
            return Some(SqlEdit::Ascending);
        }
        if keywords::contains_any(lower, keywords::DESCENDING_EDIT) {
            return Some(SqlEdit::Descending);
        }
        if keywords::contains_any(lower, keywords::GROUP_EDIT) {
            return Some(SqlEdit::GroupByLocation);
        }
        None
    }

    pub fn apply(&self, statement: &mut SqlStatement) {
        match self {
            SqlEdit::SetLimit(limit) => statement.set_limit(limit.as_str()),
            SqlEdit::Ascending => statement.redirect_order(SortDirection::Desc, SortDirection::Asc),
            SqlEdit::Descending => statement.redirect_order(SortDirection::Asc, SortDirection::Desc),
            SqlEdit::GroupByLocation => statement.group_by_location(),
        }
    }
}

const LOCATION_RULES: &[(&str, &str)] = &[("수원지a", "수원지A"), ("수원지b", "수원지B")];

const THRESHOLD_RULES: &[(&str, Indicator, &str)] = &[
    ("ph 8.5 이상", Indicator::Ph, "8.5"),
    ("탁도 0.5", Indicator::Turbidity, "0.5"),
    ("온도 25", Indicator::Temperature, "25"),
];

pub struct SqlSynthesizer;

impl SqlSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Build the statement for a query. Never fails: unmatched input falls
    /// back to the default projection.
    pub fn synthesize(
        &self,
        query: &str,
        analysis: &QueryAnalysis,
        context: &ConversationContext,
    ) -> SqlStatement {
        let lower = query.to_lowercase();

        if analysis.is_modification {
            if let Some(previous) = context.last_sql() {
                if let Some(edit) = SqlEdit::detect(&lower) {
                    debug!("Applying {:?} to previous statement", edit);
                    let mut statement = previous.clone();
                    edit.apply(&mut statement);
                    return statement;
                }
                debug!("No edit rule matched, building a new statement");
            }
        }

        self.build_fresh(&lower, analysis)
    }

    /// Rendered form of `synthesize`
    pub fn synthesize_sql(
        &self,
        query: &str,
        analysis: &QueryAnalysis,
        context: &ConversationContext,
    ) -> String {
        self.synthesize(query, analysis, context).render()
    }

    fn build_fresh(&self, lower: &str, analysis: &QueryAnalysis) -> SqlStatement {
        let mut statement = SqlStatement::default_projection();

        if let Some((_, location)) = LOCATION_RULES.iter().find(|(k, _)| lower.contains(k)) {
            statement.filters.push(Predicate::LocationEquals {
                location: location.to_string(),
            });
        }

        if let Some(period) = Self::period_predicate(lower) {
            statement.filters.push(period);
        }

        if let Some((_, indicator, value)) = THRESHOLD_RULES.iter().find(|(k, _, _)| lower.contains(k)) {
            statement.filters.push(Predicate::AtLeast {
                indicator: *indicator,
                value: value.to_string(),
            });
        }

        if analysis.intent == Intent::Average || lower.contains(keywords::AVERAGE_KEYWORD) {
            statement.aggregate_by_location(&Self::averaged_indicators(lower));
        }

        statement
    }

    /// Date range, first match wins
    fn period_predicate(lower: &str) -> Option<Predicate> {
        if lower.contains("7일") {
            Some(Predicate::WithinLast { amount: 7, unit: IntervalUnit::Day })
        } else if lower.contains("1개월") || lower.contains("한달") {
            Some(Predicate::WithinLast { amount: 1, unit: IntervalUnit::Month })
        } else if lower.contains("오늘") {
            Some(Predicate::Today)
        } else if lower.contains("최근") {
            Some(Predicate::WithinLast { amount: 7, unit: IntervalUnit::Day })
        } else {
            None
        }
    }

    /// The one indicator named in the query, or all of them
    fn averaged_indicators(lower: &str) -> Vec<Indicator> {
        if lower.contains("ph") {
            vec![Indicator::Ph]
        } else if lower.contains("탁도") {
            vec![Indicator::Turbidity]
        } else if lower.contains("온도") {
            vec![Indicator::Temperature]
        } else {
            Indicator::ALL.to_vec()
        }
    }
}

impl Default for SqlSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::QueryAnalyzer;

    fn run(query: &str, context: &ConversationContext) -> String {
        let analysis = QueryAnalyzer::new().analyze(query, context);
        SqlSynthesizer::new().synthesize_sql(query, &analysis, context)
    }

    fn context_with(query: &str) -> ConversationContext {
        let mut context = ConversationContext::new();
        let analysis = QueryAnalyzer::new().analyze(query, &context);
        let statement = SqlSynthesizer::new().synthesize(query, &analysis, &context);
        context.record(query, statement);
        context
    }

    #[test]
    fn test_detect_edit_priority() {
        assert_eq!(SqlEdit::detect("10개만 오름차순"), Some(SqlEdit::SetLimit("10".to_string())));
        assert_eq!(SqlEdit::detect("제한 걸어줘"), Some(SqlEdit::SetLimit("50".to_string())));
        assert_eq!(SqlEdit::detect("오름차순으로"), Some(SqlEdit::Ascending));
        assert_eq!(SqlEdit::detect("sort desc"), Some(SqlEdit::Descending));
        assert_eq!(SqlEdit::detect("그룹으로 묶어"), Some(SqlEdit::GroupByLocation));
        assert_eq!(SqlEdit::detect("다시 해줘"), None);
    }

    #[test]
    fn test_limit_keeps_digits_beyond_u64() {
        assert_eq!(
            SqlEdit::detect("99999999999999999999개로 제한"),
            Some(SqlEdit::SetLimit("99999999999999999999".to_string()))
        );

        let context = context_with("수원지A 오늘 수질");
        let sql = run("99999999999999999999개로 제한 다시", &context);
        assert!(sql.ends_with("LIMIT 99999999999999999999;"));
    }

    #[test]
    fn test_fresh_location_period_threshold() {
        let sql = run("수원지A 최근 7일 ph 8.5 이상", &ConversationContext::new());
        assert!(sql.contains(
            "WHERE location = '수원지A'\n  AND measurement_date >= DATE_SUB(NOW(), INTERVAL 7 DAY)\n  AND ph_level >= 8.5"
        ));
        assert!(sql.ends_with("ORDER BY measurement_date DESC\nLIMIT 100;"));
    }

    #[test]
    fn test_period_priority_is_exclusive() {
        let sql = run("오늘 그리고 1개월", &ConversationContext::new());
        assert!(sql.contains("INTERVAL 1 MONTH"));
        assert!(!sql.contains("CURDATE"));

        let today = run("수원지B 오늘", &ConversationContext::new());
        assert!(today.contains("DATE(measurement_date) = CURDATE()"));
    }

    #[test]
    fn test_average_single_indicator() {
        let sql = run("수원지A 온도 평균", &ConversationContext::new());
        assert!(sql.starts_with("SELECT location AS '위치', AVG(temperature) AS '평균_온도'\n"));
        assert!(sql.contains("GROUP BY location\nORDER BY location\nLIMIT 100;"));
    }

    #[test]
    fn test_average_all_indicators() {
        let sql = run("평균 보여줘", &ConversationContext::new());
        assert!(sql.starts_with(
            "SELECT location AS '위치', AVG(ph_level) AS '평균_pH', AVG(turbidity) AS '평균_탁도', AVG(temperature) AS '평균_온도'"
        ));
        assert!(sql.contains("GROUP BY location"));
    }

    #[test]
    fn test_modification_without_previous_builds_fresh() {
        let sql = run("조건을 변경해서 오름차순", &ConversationContext::new());
        assert_eq!(sql, SqlStatement::default_projection().render());
    }

    #[test]
    fn test_limit_edit() {
        let context = context_with("수원지A 최근 7일 수질");
        let previous = context.last_sql_text().unwrap().to_string();
        let edited = run("50개로 제한해줘 다시", &context);

        assert_eq!(edited, previous.replace("LIMIT 100;", "LIMIT 50;"));
        assert_eq!(edited.matches("LIMIT").count(), 1);
    }

    #[test]
    fn test_sort_toggle_round_trip() {
        let mut context = context_with("수원지B 오늘 수질");
        let original = context.last_sql_text().unwrap().to_string();

        let analysis = QueryAnalyzer::new().analyze("오름차순으로 바꿔줘", &context);
        let ascending = SqlSynthesizer::new().synthesize("오름차순으로 바꿔줘", &analysis, &context);
        assert!(ascending.render().contains("ORDER BY measurement_date ASC"));
        context.record("오름차순으로 바꿔줘", ascending);

        let restored = run("내림차순으로 다시", &context);
        assert_eq!(restored, original);
    }

    #[test]
    fn test_group_edit_keeps_limit() {
        let context = context_with("수원지A 최근 7일 수질");
        let sql = run("위치별 그룹으로 변경", &context);
        assert!(sql.ends_with("GROUP BY location\nORDER BY location\nLIMIT 100;"));
        assert!(!sql.contains("measurement_date DESC"));
    }

    #[test]
    fn test_unmatched_modification_falls_through() {
        let context = context_with("수원지A 최근 7일 수질");
        let sql = run("수원지B 말고", &context);
        assert!(sql.contains("location = '수원지B'"));
        assert!(!sql.contains("INTERVAL 7 DAY"));
    }
}

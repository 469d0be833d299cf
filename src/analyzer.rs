//! Query Analyzer
//!
//! Classifies a chat query, flags what is ambiguous about it and records the
//! defaults that will be assumed if the user does not clarify.

use crate::context::ConversationContext;
use crate::keywords::{self, ClarificationField, Intent, AMBIGUITY_RULES};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A multiple-choice follow-up question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub question: String,
    pub options: Vec<String>,
    pub field: ClarificationField,
}

impl Clarification {
    fn new(question: &str, options: &[&str], field: ClarificationField) -> Self {
        Self {
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            field,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub intent: Intent,
    pub is_modification: bool,
    pub is_follow_up: bool,
    pub is_ambiguous: bool,
    /// Empty means the query can go straight to synthesis
    pub clarification_needed: Vec<Clarification>,
    pub assumptions: Vec<String>,
}

impl QueryAnalysis {
    pub fn needs_clarification(&self) -> bool {
        !self.clarification_needed.is_empty()
    }

    /// The clarification surfaced to the user this turn
    pub fn first_clarification(&self) -> Option<&Clarification> {
        self.clarification_needed.first()
    }

    fn push_clarification(&mut self, clarification: Clarification) {
        self.is_ambiguous = true;
        self.clarification_needed.push(clarification);
    }
}

pub struct QueryAnalyzer;

impl QueryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, query: &str, context: &ConversationContext) -> QueryAnalysis {
        let lower = query.to_lowercase();
        let mut analysis = QueryAnalysis::default();

        // Edit requests against the previous SQL skip every other check
        if keywords::contains_any(&lower, keywords::MODIFICATION) {
            analysis.is_modification = true;
            analysis.intent = Intent::Modify;
            let note = if context.last_sql().is_some() {
                "이전 쿼리를 기반으로 수정하겠습니다."
            } else {
                "이전 쿼리가 없어 새로운 쿼리를 생성하겠습니다."
            };
            analysis.assumptions.push(note.to_string());
            debug!("Modification request: {}", query);
            return analysis;
        }

        if keywords::contains_any(&lower, keywords::FOLLOW_UP) {
            if let Some(last_query) = context.last_query() {
                analysis.is_follow_up = true;
                analysis.assumptions.push(format!(
                    "이전 질문 \"{}\"을 참고하여 진행하겠습니다.",
                    last_query
                ));
            }
        }

        for rule in AMBIGUITY_RULES {
            if rule.applies(&lower) {
                debug!("Ambiguous on {:?}: {}", rule.field, query);
                analysis.push_clarification(Clarification::new(
                    rule.question,
                    rule.options,
                    rule.field,
                ));
                analysis.assumptions.push(rule.assumption.to_string());
            }
        }

        analysis.intent = keywords::classify_intent(&lower);

        if lower.chars().count() < keywords::TRIAGE_MIN_CHARS
            && analysis.clarification_needed.is_empty()
        {
            analysis.push_clarification(Clarification::new(
                keywords::TRIAGE_QUESTION,
                keywords::TRIAGE_OPTIONS,
                ClarificationField::Action,
            ));
        }

        analysis
    }
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql_compiler::SqlStatement;

    fn fields(analysis: &QueryAnalysis) -> Vec<ClarificationField> {
        analysis
            .clarification_needed
            .iter()
            .map(|c| c.field)
            .collect()
    }

    #[test]
    fn test_modification_short_circuits() {
        let analyzer = QueryAnalyzer::new();
        let analysis = analyzer.analyze("최근 데이터 말고 평균으로", &ConversationContext::new());

        assert!(analysis.is_modification);
        assert_eq!(analysis.intent, Intent::Modify);
        assert!(analysis.clarification_needed.is_empty());
        assert!(!analysis.is_ambiguous);
        assert_eq!(
            analysis.assumptions,
            vec!["이전 쿼리가 없어 새로운 쿼리를 생성하겠습니다.".to_string()]
        );
    }

    #[test]
    fn test_modification_with_previous_sql() {
        let mut context = ConversationContext::new();
        context.record("수원지A 최근 7일", SqlStatement::default_projection());

        let analysis = QueryAnalyzer::new().analyze("정렬을 오름차순으로 바꿔줘", &context);
        assert!(analysis.is_modification);
        assert_eq!(analysis.assumptions, vec!["이전 쿼리를 기반으로 수정하겠습니다.".to_string()]);
    }

    #[test]
    fn test_follow_up_needs_previous_query() {
        let analyzer = QueryAnalyzer::new();
        let fresh = analyzer.analyze("그리고 수원지A 7일", &ConversationContext::new());
        assert!(!fresh.is_follow_up);

        let mut context = ConversationContext::new();
        context.record("수원지B 오늘", SqlStatement::default_projection());
        let follow = analyzer.analyze("그리고 수원지A 7일", &context);
        assert!(follow.is_follow_up);
        assert_eq!(
            follow.assumptions[0],
            "이전 질문 \"수원지B 오늘\"을 참고하여 진행하겠습니다."
        );
    }

    #[test]
    fn test_period_clarification_options() {
        let analysis = QueryAnalyzer::new().analyze("최근 수원지A 현황", &ConversationContext::new());
        assert_eq!(fields(&analysis), vec![ClarificationField::Period]);
        assert_eq!(
            analysis.clarification_needed[0].options,
            vec!["최근 7일", "최근 1개월", "오늘 하루"]
        );
        assert_eq!(analysis.intent, Intent::Recent);
    }

    #[test]
    fn test_recent_seven_days_asks_only_location() {
        let analysis =
            QueryAnalyzer::new().analyze("최근 7일간의 수질 데이터를 보여줘", &ConversationContext::new());
        assert_eq!(fields(&analysis), vec![ClarificationField::Location]);
        assert_eq!(analysis.intent, Intent::Recent);
        assert!(analysis.is_ambiguous);
    }

    #[test]
    fn test_average_without_indicator() {
        let analysis = QueryAnalyzer::new().analyze("평균 보여줘", &ConversationContext::new());
        assert!(fields(&analysis).contains(&ClarificationField::Indicator));
        assert_eq!(analysis.intent, Intent::Average);
        assert!(analysis
            .assumptions
            .iter()
            .any(|a| a.contains("pH, 탁도, 온도")));
    }

    #[test]
    fn test_threshold_with_explicit_number() {
        let analysis = QueryAnalyzer::new().analyze("ph 8.5 이상인 데이터", &ConversationContext::new());
        assert!(!fields(&analysis).contains(&ClarificationField::Threshold));
        assert!(!fields(&analysis).contains(&ClarificationField::Period));
    }

    #[test]
    fn test_threshold_without_number() {
        let analysis = QueryAnalyzer::new().analyze("수원지A 비정상 수치", &ConversationContext::new());
        assert_eq!(fields(&analysis), vec![ClarificationField::Threshold]);
        assert_eq!(analysis.clarification_needed[0].options.len(), 3);
    }

    #[test]
    fn test_several_clarifications_accumulate_in_order() {
        let analysis = QueryAnalyzer::new().analyze("최근 평균 문제", &ConversationContext::new());
        assert_eq!(
            fields(&analysis),
            vec![
                ClarificationField::Period,
                ClarificationField::Location,
                ClarificationField::Indicator,
                ClarificationField::Threshold,
            ]
        );
        assert_eq!(analysis.assumptions.len(), 4);
        assert_eq!(
            analysis.first_clarification().map(|c| c.field),
            Some(ClarificationField::Period)
        );
    }

    #[test]
    fn test_short_query_triage() {
        let analysis = QueryAnalyzer::new().analyze("hi", &ConversationContext::new());
        assert_eq!(fields(&analysis), vec![ClarificationField::Action]);
        assert_eq!(analysis.intent, Intent::General);
    }

    #[test]
    fn test_specific_query_passes() {
        let analysis =
            QueryAnalyzer::new().analyze("수원지B 오늘 ph 평균", &ConversationContext::new());
        assert!(!analysis.needs_clarification());
        assert_eq!(analysis.intent, Intent::Average);
    }
}

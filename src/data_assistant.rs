//! Data Assistant - turn orchestration for the chat panel
//!
//! A turn analyzes the query, either stops at a clarification question or
//! walks through paced "thinking" steps, synthesizes SQL and streams it to a
//! `ResponseSink`. Each turn runs as its own task; submitting a new query
//! aborts the one in flight, and the conversation context is only written
//! when a turn finishes.

use crate::analyzer::{QueryAnalysis, QueryAnalyzer};
use crate::config::{AssistantConfig, PacingConfig};
use crate::context::{ConversationContext, SharedContext};
use crate::error::{AssistantError, Result};
use crate::keywords::{ClarificationField, Intent};
use crate::schema::SchemaCatalog;
use crate::sql_compiler::WATER_QUALITY_TABLE;
use crate::synthesizer::SqlSynthesizer;
use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

const CLARIFICATION_PREFACE: &str = "정확한 SQL 생성을 위해 추가 정보가 필요합니다.";
const SQL_READY: &str = "SQL 쿼리를 생성했습니다:";

/// Response from the data assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantResponse {
    pub response_type: ResponseType,

    /// Text shown in the assistant bubble
    pub answer: String,

    /// The query this turn resolved
    pub query: String,

    pub clarification: Option<ClarificationRequest>,

    pub sql: Option<String>,

    pub analysis: QueryAnalysis,

    /// Thinking steps shown while the SQL was built
    pub reasoning_steps: Vec<ThinkingStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    /// SQL was generated
    QueryResult,
    /// Needs clarification
    NeedsClarification,
}

/// The one clarification surfaced for a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub question: String,
    pub options: Vec<String>,
    pub field: ClarificationField,
    /// Further clarifications that were queued but not asked
    pub remaining: usize,
    pub original_query: String,
}

impl ClarificationRequest {
    fn from_analysis(query: &str, analysis: &QueryAnalysis) -> Option<Self> {
        let first = analysis.first_clarification()?;
        Some(Self {
            question: first.question.clone(),
            options: first.options.clone(),
            field: first.field,
            remaining: analysis.clarification_needed.len() - 1,
            original_query: query.to_string(),
        })
    }

    pub fn prompt(&self) -> String {
        let mut prompt = format!("{}\n\n{}", CLARIFICATION_PREFACE, self.question);
        if self.remaining > 0 {
            prompt.push_str(&format!(
                "\n\n(이후에 {}개의 추가 확인 사항이 더 있습니다.)",
                self.remaining
            ));
        }
        prompt
    }

    /// Option chosen by 1-based number, or the answer as typed
    pub fn choice<'a>(&'a self, answer: &'a str) -> &'a str {
        let answer = answer.trim();
        answer
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.options.get(i))
            .map(|o| o.as_str())
            .unwrap_or(answer)
    }

    /// Query resubmitted once the user answers
    pub fn combined_query(&self, answer: &str) -> String {
        format!("{} {}", self.original_query, self.choice(answer))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingStep {
    pub title: String,
    pub detail: String,
}

/// Visible progress of a turn, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Clarification(ClarificationRequest),
    Assumptions(Vec<String>),
    Thinking { index: usize, step: ThinkingStep },
    /// SQL streamed so far, one more line each time
    SqlProgress(String),
    SqlReady(String),
}

/// Where turn events are rendered
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn emit(&self, event: TurnEvent);
}

/// Discards every event
pub struct NullSink;

#[async_trait]
impl ResponseSink for NullSink {
    async fn emit(&self, _event: TurnEvent) {}
}

/// Keeps every event in memory
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TurnEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TurnEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ResponseSink for CollectingSink {
    async fn emit(&self, event: TurnEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// A submitted turn
pub struct TurnHandle {
    handle: JoinHandle<Result<AssistantResponse>>,
}

impl TurnHandle {
    /// Wait for the turn; `Superseded` if a newer submission aborted it
    pub async fn outcome(self) -> Result<AssistantResponse> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(AssistantError::Superseded),
            Err(e) => Err(AssistantError::Turn(e.to_string())),
        }
    }
}

/// Per-session chat engine
pub struct DataAssistant {
    pacing: PacingConfig,
    context: SharedContext,
    sink: Arc<dyn ResponseSink>,
    catalog: Arc<SchemaCatalog>,
    in_flight: Option<AbortHandle>,
}

impl DataAssistant {
    pub fn new(config: &AssistantConfig, context: SharedContext, sink: Arc<dyn ResponseSink>) -> Self {
        Self {
            pacing: config.pacing.clone(),
            context,
            sink,
            catalog: Arc::new(SchemaCatalog::water_utility()),
            in_flight: None,
        }
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Start a turn, superseding any turn still in flight.
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, query: &str) -> TurnHandle {
        self.cancel();

        // Snapshot under the lock that bumps the generation; older turns can
        // no longer record.
        let (generation, snapshot) = {
            let mut context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
            (context.begin_turn(), context.clone())
        };

        let handle = tokio::spawn(run_turn(
            query.trim().to_string(),
            generation,
            snapshot,
            self.pacing.clone(),
            Arc::clone(&self.context),
            Arc::clone(&self.sink),
            Arc::clone(&self.catalog),
        ));
        self.in_flight = Some(handle.abort_handle());
        TurnHandle { handle }
    }

    /// Resubmit the clarified query
    pub fn answer_clarification(&mut self, request: &ClarificationRequest, answer: &str) -> TurnHandle {
        let query = request.combined_query(answer);
        self.submit(&query)
    }

    /// Abort the turn in flight, if any
    pub fn cancel(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            if !previous.is_finished() {
                warn!("Superseding a turn still in flight");
            }
            previous.abort();
        }
    }

    /// Submit and wait
    pub async fn answer(&mut self, query: &str) -> Result<AssistantResponse> {
        self.submit(query).outcome().await
    }
}

impl Drop for DataAssistant {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_turn(
    query: String,
    generation: u64,
    snapshot: ConversationContext,
    pacing: PacingConfig,
    context: SharedContext,
    sink: Arc<dyn ResponseSink>,
    catalog: Arc<SchemaCatalog>,
) -> Result<AssistantResponse> {
    if query.is_empty() {
        return Err(AssistantError::EmptyQuery);
    }
    info!(" Data Assistant: Processing question: {}", query);

    let analysis = QueryAnalyzer::new().analyze(&query, &snapshot);
    debug!("Analysis: {:?}", analysis);

    if let Some(request) = ClarificationRequest::from_analysis(&query, &analysis) {
        info!(" Asking for clarification on {:?}", request.field);
        sink.emit(TurnEvent::Clarification(request.clone())).await;
        return Ok(AssistantResponse {
            response_type: ResponseType::NeedsClarification,
            answer: request.prompt(),
            query,
            clarification: Some(request),
            sql: None,
            analysis,
            reasoning_steps: Vec::new(),
        });
    }

    if !analysis.assumptions.is_empty() {
        sink.emit(TurnEvent::Assumptions(analysis.assumptions.clone())).await;
    }

    let steps = thinking_steps(&query, &analysis, &catalog);
    for (index, (step, delay)) in steps.iter().zip(pacing.step_delays()).enumerate() {
        sink.emit(TurnEvent::Thinking {
            index,
            step: step.clone(),
        })
        .await;
        tokio::time::sleep(delay).await;
    }

    let statement = SqlSynthesizer::new().synthesize(&query, &analysis, &snapshot);
    let sql = statement.render();
    tokio::time::sleep(pacing.before_stream()).await;

    let mut streamed = String::new();
    for (i, line) in sql.lines().enumerate() {
        if i > 0 {
            streamed.push('\n');
        }
        streamed.push_str(line);
        sink.emit(TurnEvent::SqlProgress(streamed.clone())).await;
        tokio::time::sleep(pacing.per_line()).await;
    }
    sink.emit(TurnEvent::SqlReady(sql.clone())).await;

    let recorded = context
        .lock()
        .map_err(|_| AssistantError::Turn("conversation context lock poisoned".to_string()))?
        .record_if_current(generation, query.clone(), statement);
    if !recorded {
        warn!("Discarding SQL for \"{}\": a newer turn has started", query);
        return Err(AssistantError::Superseded);
    }
    info!(" Generated SQL for: {}", query);

    Ok(AssistantResponse {
        response_type: ResponseType::QueryResult,
        answer: SQL_READY.to_string(),
        query,
        clarification: None,
        sql: Some(sql),
        analysis,
        reasoning_steps: steps,
    })
}

fn thinking_steps(query: &str, analysis: &QueryAnalysis, catalog: &SchemaCatalog) -> Vec<ThinkingStep> {
    let keywords = query.split_whitespace().take(3).join(", ");
    let mut analyze_detail = format!(
        "사용자 질문: \"{}\"\n주요 키워드 추출: {}\n의도 파악: {}",
        query, keywords, analysis.intent
    );
    if !analysis.assumptions.is_empty() {
        analyze_detail.push_str(&format!(
            "\n\n💡 {}",
            analysis.assumptions.join("\n💡 ")
        ));
    }

    let schema_detail = match catalog.table(WATER_QUALITY_TABLE) {
        Some(table) => format!(
            "테이블: {}\n컬럼: {}\n인덱스: {}",
            table.table,
            table.column_names().join(", "),
            table.secondary_indexes().join(", ")
        ),
        None => format!("테이블: {}", WATER_QUALITY_TABLE),
    };

    let filter = if analysis.intent == Intent::Recent {
        "날짜 범위"
    } else {
        "없음"
    };
    let plan_detail = format!(
        "JOIN 필요 여부: 없음\n정렬 방식: measurement_date DESC\n필터 조건: {}\n예상 결과 수: ~100 rows",
        filter
    );

    vec![
        ThinkingStep {
            title: "질문을 분석하고 있습니다...".to_string(),
            detail: analyze_detail,
        },
        ThinkingStep {
            title: "데이터베이스 스키마를 확인하고 있습니다...".to_string(),
            detail: schema_detail,
        },
        ThinkingStep {
            title: "최적의 SQL 쿼리를 생성하고 있습니다...".to_string(),
            detail: plan_detail,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant(pacing: PacingConfig) -> (DataAssistant, Arc<CollectingSink>) {
        let config = AssistantConfig {
            pacing,
            ..Default::default()
        };
        let sink = Arc::new(CollectingSink::new());
        let assistant = DataAssistant::new(&config, ConversationContext::shared(5), sink.clone());
        (assistant, sink)
    }

    #[test]
    fn test_clarification_choice() {
        let request = ClarificationRequest {
            question: "q".to_string(),
            options: vec!["최근 7일".to_string(), "최근 1개월".to_string()],
            field: ClarificationField::Period,
            remaining: 1,
            original_query: "최근 현황".to_string(),
        };
        assert_eq!(request.choice("2"), "최근 1개월");
        assert_eq!(request.choice("3"), "3");
        assert_eq!(request.choice("0"), "0");
        assert_eq!(request.combined_query(" 어제 "), "최근 현황 어제");
        assert!(request.prompt().ends_with("(이후에 1개의 추가 확인 사항이 더 있습니다.)"));
    }

    #[tokio::test]
    async fn test_clarification_turn_leaves_context() {
        let (mut assistant, sink) = assistant(PacingConfig::instant());
        let response = assistant.answer("평균 보여줘").await.unwrap();

        assert_eq!(response.response_type, ResponseType::NeedsClarification);
        let request = response.clarification.unwrap();
        assert_eq!(request.field, ClarificationField::Location);
        assert_eq!(request.remaining, 1);
        assert!(response.sql.is_none());
        assert!(assistant.context().lock().unwrap().is_empty());
        let events = sink.events();
        assert!(matches!(events.as_slice(), [TurnEvent::Clarification(_)]));
    }

    #[tokio::test]
    async fn test_full_turn_event_order() {
        let (mut assistant, sink) = assistant(PacingConfig::instant());
        let response = assistant.answer("수원지A 최근 7일 수질").await.unwrap();

        let sql = response.sql.unwrap();
        assert_eq!(response.response_type, ResponseType::QueryResult);
        assert_eq!(response.reasoning_steps.len(), 3);

        let events = sink.events();
        let line_count = sql.lines().count();
        assert_eq!(events.len(), 3 + line_count + 1);
        assert!(matches!(events[0], TurnEvent::Thinking { index: 0, .. }));
        assert!(matches!(events[2], TurnEvent::Thinking { index: 2, .. }));
        assert_eq!(events[3], TurnEvent::SqlProgress(sql.lines().next().unwrap().to_string()));
        assert_eq!(events.last(), Some(&TurnEvent::SqlReady(sql.clone())));

        let context = assistant.context().lock().unwrap();
        assert_eq!(context.last_query(), Some("수원지A 최근 7일 수질"));
        assert_eq!(context.last_sql_text(), Some(sql.as_str()));
    }

    #[tokio::test]
    async fn test_assumptions_emitted_before_thinking() {
        let (mut assistant, sink) = assistant(PacingConfig::instant());
        assistant.answer("수원지A 최근 7일 수질").await.unwrap();
        let response = assistant.answer("10개로 제한 다시").await.unwrap();

        assert!(response.sql.unwrap().ends_with("LIMIT 10;"));
        let events = sink.events();
        let assumption = events
            .iter()
            .position(|e| matches!(e, TurnEvent::Assumptions(_)))
            .unwrap();
        assert!(matches!(events[assumption + 1], TurnEvent::Thinking { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_answering_clarification_resubmits() {
        let (mut assistant, _sink) = assistant(PacingConfig::instant());
        let first = assistant.answer("최근 수원지A 현황").await.unwrap();
        let request = first.clarification.unwrap();
        assert_eq!(request.field, ClarificationField::Period);

        let response = assistant.answer_clarification(&request, "1").outcome().await.unwrap();
        assert_eq!(response.query, "최근 수원지A 현황 최근 7일");
        assert!(response.sql.unwrap().contains("INTERVAL 7 DAY"));
    }

    #[tokio::test]
    async fn test_new_submission_supersedes_turn_in_flight() {
        let slow = PacingConfig {
            analyze_ms: 10_000,
            ..PacingConfig::instant()
        };
        let (mut assistant, _sink) = assistant(slow);

        let first = assistant.submit("수원지A 오늘 수질");
        let second = assistant.submit("최근 데이터");

        assert!(matches!(first.outcome().await, Err(AssistantError::Superseded)));
        let response = second.outcome().await.unwrap();
        assert_eq!(response.response_type, ResponseType::NeedsClarification);
        assert!(assistant.context().lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_turn_started_elsewhere_blocks_stale_record() {
        let (mut assistant, _sink) = assistant(PacingConfig::instant());
        let stale = assistant.submit("수원지A 오늘 수질");

        // Another front end on the same context starts a newer turn
        assistant.context().lock().unwrap().begin_turn();

        assert!(matches!(stale.outcome().await, Err(AssistantError::Superseded)));
        assert!(assistant.context().lock().unwrap().is_empty());

        let response = assistant.answer("수원지A 오늘 수질").await.unwrap();
        assert!(response.sql.is_some());
        assert_eq!(assistant.context().lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (mut assistant, sink) = assistant(PacingConfig::instant());
        assert!(matches!(assistant.answer("   ").await, Err(AssistantError::EmptyQuery)));
        assert!(sink.events().is_empty());
    }
}

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use water_sql_assistant::config::{AssistantConfig, PacingConfig};
use water_sql_assistant::context::ConversationContext;
use water_sql_assistant::data_assistant::{
    AssistantResponse, ClarificationRequest, DataAssistant, ResponseSink, ResponseType, TurnEvent,
};
use water_sql_assistant::error::AssistantError;
use water_sql_assistant::export;
use water_sql_assistant::mock_data::MockDataProvider;
use water_sql_assistant::results::ResultPanel;
use water_sql_assistant::schema::SchemaCatalog;
use water_sql_assistant::session::{
    ChatMessage, FeedbackLedger, MessageRole, Rating, RecentSearches, SessionStore, POPULAR_SEARCHES,
};
use water_sql_assistant::{QueryAnalyzer, SqlSynthesizer};

#[derive(Parser)]
#[command(name = "water-sql")]
#[command(about = "Natural-language to SQL assistant for water quality data (demo)")]
struct Args {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Skip the simulated thinking delays
    #[arg(long, global = true)]
    fast: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Analyze one query and print the SQL it produces
    Ask {
        query: String,

        /// Print analysis and SQL as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the mock schema catalog
    Schema {
        #[arg(long)]
        json: bool,
    },
    /// Generate SQL for a query, run it against mock data and write CSV
    Export {
        query: String,

        /// Output directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(config).await,
        Commands::Ask { query, json } => run_ask(&query, json),
        Commands::Schema { json } => run_schema(json),
        Commands::Export { query, dir } => run_export(&query, dir, &config),
    }
}

fn load_config(args: &Args) -> Result<AssistantConfig> {
    let mut config = match &args.config {
        Some(path) => AssistantConfig::load(path)?,
        None => AssistantConfig::default(),
    }
    .with_env_overrides();

    if args.fast {
        config.pacing = PacingConfig::instant();
    }
    config.validate()?;
    Ok(config)
}

fn run_ask(query: &str, json: bool) -> Result<()> {
    let context = ConversationContext::new();
    let analysis = QueryAnalyzer::new().analyze(query, &context);
    let sql = SqlSynthesizer::new().synthesize_sql(query, &analysis, &context);

    if json {
        let output = serde_json::json!({
            "query": query,
            "analysis": analysis,
            "sql": sql,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("의도: {}", analysis.intent);
    for clarification in &analysis.clarification_needed {
        println!("확인 필요: {} [{}]", clarification.question, clarification.options.join(" / "));
    }
    for assumption in &analysis.assumptions {
        println!("💡 {}", assumption);
    }
    println!("\n{}", sql);
    Ok(())
}

fn run_schema(json: bool) -> Result<()> {
    let catalog = SchemaCatalog::water_utility();
    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }
    print_schema(&catalog);
    Ok(())
}

fn run_export(query: &str, dir: PathBuf, config: &AssistantConfig) -> Result<()> {
    let context = ConversationContext::new();
    let analysis = QueryAnalyzer::new().analyze(query, &context);
    let sql = SqlSynthesizer::new().synthesize_sql(query, &analysis, &context);

    let mut panel = ResultPanel::new(
        MockDataProvider::new(config.mock_seed),
        config.result_history_capacity,
        config.page_size,
    );
    panel.execute(&sql, Some(query));
    let results = panel.current().ok_or_else(|| anyhow!("no result set"))?;

    match export::export_to_dir(results, &dir)? {
        Some(path) => println!("{} rows -> {}", results.len(), path.display()),
        None => println!("결과가 없어 내보내지 않았습니다."),
    }
    Ok(())
}

fn print_schema(catalog: &SchemaCatalog) {
    for table in &catalog.tables {
        println!("{} ({} rows)", table.table, table.row_count);
        for column in &table.columns {
            println!(
                "  {:<20} {:<14} {:<4} {}",
                column.name,
                column.data_type,
                column.key,
                if column.nullable { "NULL" } else { "NOT NULL" }
            );
        }
        println!("  indexes: {}", table.indexes.join(", "));
    }
}

/// Prints turn events as they arrive
struct TerminalSink;

#[async_trait]
impl ResponseSink for TerminalSink {
    async fn emit(&self, event: TurnEvent) {
        match event {
            TurnEvent::Clarification(request) => {
                println!("\n{}", request.prompt());
                for (i, option) in request.options.iter().enumerate() {
                    println!("  {}. {}", i + 1, option);
                }
            }
            TurnEvent::Assumptions(assumptions) => {
                println!("\n질문을 분석했습니다.");
                for assumption in assumptions {
                    println!("💡 {}", assumption);
                }
            }
            TurnEvent::Thinking { index, step } => {
                println!("\n[{}/3] {}", index + 1, step.title);
                for line in step.detail.lines() {
                    println!("      {}", line);
                }
            }
            TurnEvent::SqlProgress(partial) => {
                if partial.lines().count() == 1 {
                    println!("\nSQL 쿼리를 생성했습니다:");
                }
                if let Some(line) = partial.lines().last() {
                    println!("  {}", line);
                }
            }
            TurnEvent::SqlReady(_) => {
                println!("\n(/run 실행, /good /bad 피드백)");
            }
        }
    }
}

type TurnFuture = Pin<Box<dyn Future<Output = water_sql_assistant::Result<AssistantResponse>> + Send>>;

async fn wait_turn(pending: &mut Option<TurnFuture>) -> water_sql_assistant::Result<AssistantResponse> {
    match pending.as_mut() {
        Some(turn) => turn.await,
        None => std::future::pending().await,
    }
}

struct ChatRepl {
    config: AssistantConfig,
    sessions: SessionStore,
    recent: RecentSearches,
    feedback: FeedbackLedger,
    results: ResultPanel,
    assistant: Option<(Uuid, DataAssistant)>,
    clarification: Option<ClarificationRequest>,
    last_sql: Option<(String, String)>,
    pending: Option<TurnFuture>,
    pending_session: Option<Uuid>,
}

impl ChatRepl {
    fn new(config: AssistantConfig) -> Self {
        let results = ResultPanel::new(
            MockDataProvider::new(config.mock_seed),
            config.result_history_capacity,
            config.page_size,
        );
        Self {
            sessions: SessionStore::new(config.history_capacity),
            recent: RecentSearches::seeded(config.recent_search_capacity),
            feedback: FeedbackLedger::new(),
            results,
            assistant: None,
            clarification: None,
            last_sql: None,
            pending: None,
            pending_session: None,
            config,
        }
    }

    /// Assistant bound to the active session's context
    fn assistant_for(&mut self, session_id: Uuid) -> Result<&mut DataAssistant> {
        let stale = !matches!(&self.assistant, Some((id, _)) if *id == session_id);
        if stale {
            let context = self
                .sessions
                .sessions()
                .iter()
                .find(|s| s.id == session_id)
                .map(|s| Arc::clone(&s.context))
                .ok_or_else(|| anyhow!("session {} not found", session_id))?;
            let sink: Arc<dyn ResponseSink> = Arc::new(TerminalSink);
            self.assistant = Some((session_id, DataAssistant::new(&self.config, context, sink)));
        }
        self.assistant
            .as_mut()
            .map(|(_, assistant)| assistant)
            .ok_or_else(|| anyhow!("assistant unavailable"))
    }

    fn submit(&mut self, query: &str, clarification: Option<ClarificationRequest>) -> Result<()> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Ok(());
        }

        if clarification.is_none() {
            self.recent.record(&query);
        }
        let session = self.sessions.ensure_active(&query);
        session.push(ChatMessage::user(&query));
        let session_id = session.id;

        if self.pending.is_some() {
            println!("(이전 요청을 취소하고 새 질문을 처리합니다)");
        }

        let assistant = self.assistant_for(session_id)?;
        let handle = match clarification {
            Some(request) => assistant.answer_clarification(&request, &query),
            None => assistant.submit(&query),
        };
        self.pending = Some(Box::pin(handle.outcome()));
        self.pending_session = Some(session_id);
        Ok(())
    }

    fn finish_turn(&mut self, outcome: water_sql_assistant::Result<AssistantResponse>) {
        let session_id = self.pending_session.take();
        let response = match outcome {
            Ok(response) => response,
            Err(AssistantError::Superseded) => return,
            Err(e) => {
                warn!("Turn failed: {}", e);
                println!("오류: {}", e);
                return;
            }
        };

        let mut message = ChatMessage::new(MessageRole::Assistant, response.answer.clone());
        message.sql = response.sql.clone();
        message.clarification = response.clarification.clone();

        if let Some(session) = session_id.and_then(|id| self.sessions.get_mut(id)) {
            session.push(message);
        }

        match response.response_type {
            ResponseType::NeedsClarification => {
                self.clarification = response.clarification;
            }
            ResponseType::QueryResult => {
                self.clarification = None;
                if let Some(sql) = response.sql {
                    self.last_sql = Some((sql, response.query));
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }

        if let Some(command) = line.strip_prefix('/') {
            return self.handle_command(command);
        }

        // A bare option number answers the open clarification
        let answers_clarification = line.parse::<usize>().is_ok() && self.clarification.is_some();
        if answers_clarification {
            if let Some(request) = self.clarification.take() {
                let answer = request.choice(line).to_string();
                println!("> {}", answer);
                self.submit(&answer, Some(request))?;
            }
        } else {
            self.clarification = None;
            self.submit(line, None)?;
        }
        Ok(true)
    }

    fn handle_command(&mut self, command: &str) -> Result<bool> {
        let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
        let rest = rest.trim();

        match name {
            "quit" | "exit" => return Ok(false),
            "new" => {
                self.sessions.start_new();
                self.clarification = None;
                self.last_sql = None;
                println!("새 채팅을 시작합니다.");
            }
            "sessions" => self.print_sessions(),
            "switch" => {
                let id = self.session_at(rest)?;
                let session = self.sessions.switch(id)?;
                println!("전환: {} ({}개 메시지)", session.title, session.messages.len());
                for message in &session.messages {
                    println!("  [{:?}] {}", message.role, message.content);
                }
                self.clarification = None;
            }
            "delete" => {
                let id = self.session_at(rest)?;
                self.sessions.delete(id)?;
                println!("삭제했습니다.");
            }
            "history" => self.print_history(),
            "run" => self.run_last_sql(),
            "page" => {
                let start = self.results.displayed_rows().len();
                if self.results.load_more() == 0 {
                    println!("더 이상 결과가 없습니다.");
                } else {
                    self.print_rows(start);
                }
            }
            "results" => {
                for (i, record) in self.results.history().enumerate() {
                    println!(
                        "{}. {} rows, {:?} - {}",
                        i + 1,
                        record.row_count,
                        record.elapsed,
                        record.original_query.as_deref().unwrap_or("")
                    );
                }
            }
            "export" => {
                let dir = if rest.is_empty() { "." } else { rest };
                match self.results.current() {
                    Some(results) => match export::export_to_dir(results, dir)? {
                        Some(path) => println!("저장했습니다: {}", path.display()),
                        None => println!("결과가 없습니다."),
                    },
                    None => println!("먼저 /run 으로 SQL을 실행하세요."),
                }
            }
            "schema" => print_schema(&SchemaCatalog::water_utility()),
            "good" | "bad" => {
                let rating = if name == "good" { Rating::Good } else { Rating::Bad };
                match &self.last_sql {
                    Some((sql, _)) => {
                        self.feedback.rate(sql, rating);
                        if !rest.is_empty() {
                            self.feedback.comment(sql, rest);
                        }
                        println!("피드백을 저장했습니다.");
                    }
                    None => println!("평가할 SQL이 없습니다."),
                }
            }
            "recent" => {
                if let Some(index) = rest.strip_prefix("rm") {
                    let query = self.recent_at(index.trim())?;
                    self.recent.remove(&query);
                    println!("삭제했습니다: {}", query);
                    return Ok(true);
                }
                println!("최근 검색:");
                for (i, query) in self.recent.iter().enumerate() {
                    println!("  {}. {}", i + 1, query);
                }
                println!("인기 검색:");
                for query in POPULAR_SEARCHES {
                    println!("  {}", query);
                }
            }
            "cols" => self.handle_columns(rest)?,
            other => println!("알 수 없는 명령: /{}", other),
        }
        Ok(true)
    }

    fn recent_at(&self, index: &str) -> Result<String> {
        let n: usize = index.parse().map_err(|_| anyhow!("search number expected"))?;
        n.checked_sub(1)
            .and_then(|i| self.recent.iter().nth(i))
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no recent search {}", n))
    }

    /// `/cols`, `/cols move <n> up|down`, `/cols toggle <name>`
    fn handle_columns(&mut self, args: &str) -> Result<()> {
        if self.results.current().is_none() {
            println!("먼저 /run 으로 SQL을 실행하세요.");
            return Ok(());
        }

        let parts: Vec<&str> = args.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["move", index, direction] => {
                let n: usize = index.parse().map_err(|_| anyhow!("column number expected"))?;
                let offset = match *direction {
                    "up" | "left" => -1,
                    "down" | "right" => 1,
                    other => return Err(anyhow!("unknown direction {}", other)),
                };
                let moved = n
                    .checked_sub(1)
                    .map(|i| self.results.move_column(i, offset))
                    .unwrap_or(false);
                if !moved {
                    println!("이동할 수 없습니다.");
                }
            }
            ["toggle", column] => {
                let visible = self.results.toggle_column(column);
                println!("{}: {}", column, if visible { "표시" } else { "숨김" });
            }
            _ => return Err(anyhow!("usage: /cols [move <n> up|down | toggle <name>]")),
        }

        for (i, column) in self.results.visible_columns().iter().enumerate() {
            println!("  {}. {}", i + 1, column);
        }
        Ok(())
    }

    fn session_at(&self, index: &str) -> Result<Uuid> {
        let n: usize = index.parse().map_err(|_| anyhow!("session number expected"))?;
        n.checked_sub(1)
            .and_then(|i| self.sessions.sessions().get(i))
            .map(|s| s.id)
            .ok_or_else(|| anyhow!("no session {}", n))
    }

    fn print_sessions(&self) {
        let active = self.sessions.active().map(|s| s.id);
        for (i, session) in self.sessions.sessions().iter().enumerate() {
            let marker = if Some(session.id) == active { "*" } else { " " };
            println!(
                "{}{}. {} ({}) - {}",
                marker,
                i + 1,
                session.title,
                session.created_at.format("%H:%M"),
                session.last_message
            );
        }
    }

    fn print_history(&self) {
        let Some(session) = self.sessions.active() else {
            println!("대화 기록이 없습니다.");
            return;
        };
        let Ok(context) = session.context.lock() else {
            return;
        };
        for (i, turn) in context.history().enumerate() {
            println!("{}. {}\n{}\n", i + 1, turn.query, turn.sql);
        }
    }

    fn run_last_sql(&mut self) {
        let Some((sql, query)) = self.last_sql.clone() else {
            println!("실행할 SQL이 없습니다.");
            return;
        };
        let record = self.results.execute(&sql, Some(&query));
        info!("Executed {}", record.id);
        println!("✓ 실행 완료! {}행 ({})", record.row_count, record.results.table);
        self.print_rows(0);
    }

    fn print_rows(&self, start: usize) {
        let Some(results) = self.results.current() else {
            return;
        };
        let visible = self.results.visible_columns();
        let indexes: Vec<usize> = visible
            .iter()
            .filter_map(|c| results.column_index(c))
            .collect();

        if start == 0 {
            println!("{}", visible.join(" | "));
        }
        for row in &self.results.displayed_rows()[start..] {
            let cells: Vec<&str> = indexes.iter().map(|&i| row[i].as_str()).collect();
            println!("{}", cells.join(" | "));
        }
        if self.results.has_more() {
            println!("(/page 더 보기)");
        }
    }
}

async fn run_chat(config: AssistantConfig) -> Result<()> {
    println!("수질 데이터 SQL 어시스턴트 (/quit 종료, /recent 추천 질문)");

    let (tx, mut lines) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = stdin.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let mut repl = ChatRepl::new(config);
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                match repl.handle_line(&line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("오류: {}", e),
                }
            }
            outcome = wait_turn(&mut repl.pending), if repl.pending.is_some() => {
                repl.pending = None;
                repl.finish_turn(outcome);
            }
        }
    }

    if let Some(mut pending) = repl.pending.take() {
        // Let a turn still running finish before exiting
        let outcome = pending.as_mut().await;
        repl.finish_turn(outcome);
    }
    Ok(())
}

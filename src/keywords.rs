//! Keyword vocabulary and rule tables
//!
//! Every decision the analyzer and synthesizer make is a substring check
//! against one of these tables. Queries are lower-cased before matching, so
//! entries here are lower-case too.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref DIGIT_RUN: Regex = Regex::new(r"[0-9]+").unwrap();
    static ref COUNT_PHRASE: Regex = Regex::new(r"[0-9]+개").unwrap();
}

/// True when `text` contains any of `keywords`
pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// ASCII digits only, as typed in a chat box
pub fn has_digit(text: &str) -> bool {
    DIGIT_RUN.is_match(text)
}

/// First run of ASCII digits, e.g. "50" in "50개로 제한해줘"
pub fn first_number(text: &str) -> Option<&str> {
    DIGIT_RUN.find(text).map(|m| m.as_str())
}

/// "<digits>개" as in "10개만"
pub fn has_count_phrase(text: &str) -> bool {
    COUNT_PHRASE.is_match(text)
}

pub const MODIFICATION: &[&str] = &["수정", "변경", "바꿔", "다시", "대신", "말고"];

pub const FOLLOW_UP: &[&str] = &["거기서", "그거", "그것", "여기에", "추가로", "그리고"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationField {
    Period,
    Location,
    Indicator,
    Threshold,
    Action,
}

/// One row of the ambiguity table: when `triggers` match and nothing in
/// `resolved_by` does, the query is ambiguous on `field`.
#[derive(Debug)]
pub struct AmbiguityRule {
    pub field: ClarificationField,
    pub triggers: &'static [&'static str],
    pub resolved_by: &'static [&'static str],
    /// Any digit in the query counts as an explicit value
    pub digit_resolves: bool,
    pub question: &'static str,
    pub options: &'static [&'static str],
    pub assumption: &'static str,
}

impl AmbiguityRule {
    pub fn applies(&self, lower: &str) -> bool {
        contains_any(lower, self.triggers)
            && !(self.digit_resolves && has_digit(lower))
            && !contains_any(lower, self.resolved_by)
    }
}

/// Evaluated in order; several rows may fire for the same query.
pub const AMBIGUITY_RULES: &[AmbiguityRule] = &[
    AmbiguityRule {
        field: ClarificationField::Period,
        triggers: &["최근", "데이터"],
        resolved_by: &["오늘", "어제", "7일", "1개월", "한달"],
        digit_resolves: true,
        question: "조회하고 싶은 기간을 가르쳐 주시겠습니까?",
        options: &["최근 7일", "최근 1개월", "오늘 하루"],
        assumption: "기간이 명시되지 않아 최근 7일 데이터로 가정합니다.",
    },
    AmbiguityRule {
        field: ClarificationField::Location,
        triggers: &["수질", "데이터", "평균"],
        resolved_by: &["수원지", "모든", "전체", "위치"],
        digit_resolves: false,
        question: "어느 지역(수원지)의 데이터를 확인하시겠습니까?",
        options: &["전체 지역", "수원지A", "수원지B"],
        assumption: "특정 위치가 지정되지 않아 전체 지역을 탐색합니다.",
    },
    AmbiguityRule {
        field: ClarificationField::Indicator,
        triggers: &["평균", "통계"],
        resolved_by: &["ph", "탁도", "온도"],
        digit_resolves: false,
        question: "어떤 항목의 통계를 보시겠습니까?",
        options: &["pH 수치", "탁도", "온도", "전체 항목"],
        assumption: "모든 수질 지표(pH, 탁도, 온도)의 요약 정보를 계산하겠습니다.",
    },
    AmbiguityRule {
        field: ClarificationField::Threshold,
        triggers: &["이상", "위험", "비정상", "문제"],
        resolved_by: &["기준"],
        digit_resolves: true,
        question: "비정상 데이터의 기준을 선택하시거나 직접 입력해 주세요.",
        options: &["pH 8.5 이상", "탁도 0.5 NTU 이상", "온도 25도 이상"],
        assumption: "일반적인 수질 기준치를 넘는 데이터를 검색하겠습니다.",
    },
];

/// Asked when the query is too short to mean anything
pub const TRIAGE_MIN_CHARS: usize = 3;
pub const TRIAGE_QUESTION: &str = "도움이 필요하신 내용을 선택하시겠어요?";
pub const TRIAGE_OPTIONS: &[&str] = &["최근 수질 조회", "위치별 평균 통계", "수질 이상치 확인"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    General,
    Modify,
    Average,
    Recent,
    All,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::General => "general",
            Intent::Modify => "modify",
            Intent::Average => "average",
            Intent::Recent => "recent",
            Intent::All => "all",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First matching row decides the intent; no match leaves `General`.
pub const INTENT_RULES: &[(&[&str], Intent)] = &[
    (&["평균"], Intent::Average),
    (&["최근", "조회"], Intent::Recent),
    (&["모든", "전체"], Intent::All),
];

pub fn classify_intent(lower: &str) -> Intent {
    INTENT_RULES
        .iter()
        .find(|(keywords, _)| contains_any(lower, keywords))
        .map(|(_, intent)| *intent)
        .unwrap_or_default()
}

// Modification edit triggers, tried in this order.
pub const LIMIT_EDIT: &[&str] = &["제한", "limit"];
pub const ASCENDING_EDIT: &[&str] = &["오름차순", "asc"];
pub const DESCENDING_EDIT: &[&str] = &["내림차순", "desc"];
pub const GROUP_EDIT: &[&str] = &["그룹", "group"];

/// Limit used when a limit edit names no number
pub const DEFAULT_EDIT_LIMIT: &str = "50";

/// Limit of every freshly built statement
pub const FRESH_LIMIT: &str = "100";

pub const AVERAGE_KEYWORD: &str = "평균";

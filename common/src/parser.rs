//! APIレスポンスパーサー
//!
//! 補完サービスの応答を MatchVerdict に変換する。
//! - テキスト応答: `Match Found:` / `Low Match Confidence:` / それ以外
//! - JSON応答: 信頼度ゲート（7以上 Semantic、4〜6 LowConfidence、それ未満 NoMatch）
//!
//! 不正な応答でもパニックせず、必ず NoMatch と生テキストを返す。

use crate::error::{Error, Result};
use crate::prompts::{LOW_CONFIDENCE_PREFIX, MATCH_FOUND_PREFIX};
use crate::types::{MatchKind, MatchVerdict};
use regex::Regex;
use serde_json::Value;

pub const SEMANTIC_THRESHOLD: u8 = 7;
pub const LOW_CONFIDENCE_THRESHOLD: u8 = 4;

/// レスポンスからJSONオブジェクト部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. エラー
///
/// # Examples
/// ```
/// use catalog_match_common::extract_json;
///
/// let response = "Result: {\"match_found\": false} done";
/// assert_eq!(extract_json(response).unwrap(), "{\"match_found\": false}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7;
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end > start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// 信頼度ゲート
pub fn gate_confidence(match_found: bool, confidence: u8) -> MatchKind {
    if !match_found {
        return MatchKind::NoMatch;
    }
    match confidence {
        c if c >= SEMANTIC_THRESHOLD => MatchKind::Semantic,
        c if c >= LOW_CONFIDENCE_THRESHOLD => MatchKind::SemanticLowConfidence,
        _ => MatchKind::NoMatch,
    }
}

/// JSON応答の中身
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonVerdict {
    pub match_found: bool,
    /// 1始まりの行番号
    pub target_index: Option<usize>,
    pub reason: String,
    /// 1〜10 に丸めた信頼度
    pub confidence: u8,
}

impl JsonVerdict {
    pub fn kind(&self) -> MatchKind {
        gate_confidence(self.match_found, self.confidence)
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// JSON応答をパース
pub fn parse_json_response(response: &str) -> Result<JsonVerdict> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("JSONパースエラー: {}", e)))?;

    let match_found = value
        .get("match_found")
        .and_then(as_bool)
        .ok_or_else(|| Error::Parse("match_found がありません".into()))?;

    let confidence = value
        .get("confidence")
        .and_then(as_number)
        .ok_or_else(|| Error::Parse("confidence が無いか有限の数値ではありません".into()))?;
    let confidence = confidence.floor().clamp(1.0, 10.0) as u8;

    let target_index = value
        .get("target_index")
        .and_then(as_number)
        .filter(|n| *n >= 1.0)
        .map(|n| n as usize);

    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(JsonVerdict {
        match_found,
        target_index,
        reason,
        confidence,
    })
}

/// JSON応答を MatchVerdict に変換
///
/// `resolve` は1始まりの行番号をターゲット識別子に変換し、カタログに無い行なら None を返す。
/// パース失敗時・行番号がカタログに無い一致は、生テキストを reason に残して NoMatch を返す。
pub fn verdict_from_json_response(
    response: &str,
    resolve: impl Fn(usize) -> Option<String>,
) -> MatchVerdict {
    match parse_json_response(response) {
        Ok(parsed) => {
            let kind = parsed.kind();
            let matched_target_ref = match kind {
                MatchKind::Semantic | MatchKind::SemanticLowConfidence => {
                    match parsed.target_index.and_then(&resolve) {
                        Some(target) => Some(target),
                        None => {
                            let index = parsed
                                .target_index
                                .map_or_else(|| "(none)".to_string(), |i| i.to_string());
                            return MatchVerdict {
                                confidence: Some(parsed.confidence),
                                ..MatchVerdict::no_match(format!(
                                    "target_index {} not found in catalog: {}",
                                    index,
                                    raw_or_placeholder(response)
                                ))
                            };
                        }
                    }
                }
                _ => None,
            };
            let reason = if parsed.reason.is_empty() {
                format!("confidence {}", parsed.confidence)
            } else {
                parsed.reason
            };
            MatchVerdict {
                kind,
                reason,
                matched_target_ref,
                confidence: Some(parsed.confidence),
            }
        }
        Err(e) => MatchVerdict::no_match(format!("{}: {}", e, raw_or_placeholder(response))),
    }
}

/// 一致先が候補に無い識別子なら NoMatch に落とす
///
/// `is_known` はプロンプトに載せた候補の識別子かを判定する。
pub fn verify_target(
    verdict: MatchVerdict,
    response: &str,
    is_known: impl Fn(&str) -> bool,
) -> MatchVerdict {
    match (&verdict.kind, &verdict.matched_target_ref) {
        (MatchKind::Semantic | MatchKind::SemanticLowConfidence, Some(target))
            if !is_known(target) =>
        {
            MatchVerdict::no_match(format!(
                "identifier \"{}\" not found among catalog candidates: {}",
                target,
                raw_or_placeholder(response)
            ))
        }
        _ => verdict,
    }
}

fn raw_or_placeholder(response: &str) -> &str {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        "(empty response)"
    } else {
        trimmed
    }
}

lazy_static::lazy_static! {
    static ref MATCH_LINE: Regex = Regex::new(
        r"(?i)^[\s*#>-]*(match found|low match confidence)\s*:\**\s*(.*)$"
    ).unwrap();
    static ref REASON_LINE: Regex = Regex::new(r"(?i)^[\s*-]*reason\s*:\**\s*(.+)$").unwrap();
}

/// `[identifier] - reason` / `identifier - reason` / `identifier` を分解
fn split_identifier_reason(rest: &str) -> (String, String) {
    let rest = rest.trim();
    if let Some(stripped) = rest.strip_prefix('[') {
        if let Some(close) = stripped.find(']') {
            let identifier = stripped[..close].trim().to_string();
            let reason = stripped[close + 1..]
                .trim()
                .trim_start_matches(&['-', ':'][..])
                .trim()
                .to_string();
            return (identifier, reason);
        }
    }
    match rest.split_once(" - ") {
        Some((identifier, reason)) => (identifier.trim().to_string(), reason.trim().to_string()),
        None => (rest.to_string(), String::new()),
    }
}

/// テキスト応答を MatchVerdict に変換
pub fn parse_text_response(response: &str) -> MatchVerdict {
    let lines: Vec<&str> = response.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = MATCH_LINE.captures(line) else {
            continue;
        };
        let kind = if caps[1].eq_ignore_ascii_case(LOW_CONFIDENCE_PREFIX.trim_end_matches(':')) {
            MatchKind::SemanticLowConfidence
        } else if caps[1].eq_ignore_ascii_case(MATCH_FOUND_PREFIX.trim_end_matches(':')) {
            MatchKind::Semantic
        } else {
            continue;
        };

        let (identifier, mut reason) = split_identifier_reason(&caps[2]);
        if identifier.is_empty() {
            break;
        }
        if reason.is_empty() {
            // 旧形式: 次行以降の "Reason: ..." を採用
            reason = lines[i + 1..]
                .iter()
                .find_map(|l| REASON_LINE.captures(l).map(|c| c[1].trim().to_string()))
                .unwrap_or_else(|| line.trim().to_string());
        }

        return MatchVerdict {
            kind,
            reason,
            matched_target_ref: Some(identifier),
            confidence: None,
        };
    }

    MatchVerdict::no_match(raw_or_placeholder(response))
}

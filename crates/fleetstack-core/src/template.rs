//! テンプレート展開
//!
//! 宣言ファイルはパース前に Tera で展開する。

use crate::error::{Result, StackError};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

/// 展開に使う変数
pub type Variables = HashMap<String, serde_json::Value>;

/// 展開に渡してよい環境変数のプレフィックス
const ALLOWED_PREFIXES: &[&str] = &["STACK_", "CI_", "APP_"];

/// テンプレートプロセッサ
pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), &value);
    }

    pub fn add_variables(&mut self, variables: Variables) {
        for (key, value) in variables {
            self.context.insert(key, &value);
        }
    }

    /// 許可されたプレフィックスの環境変数を追加
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        let mut count = 0;
        for (key, value) in std::env::vars() {
            if ALLOWED_PREFIXES.iter().any(|p| key.starts_with(p)) {
                debug!(key = %key, "Adding environment variable");
                self.context.insert(key, &serde_json::Value::String(value));
                count += 1;
            }
        }
        info!(env_var_count = count, "Added filtered environment variables");
    }

    /// .env ファイルの変数を追加
    ///
    /// 明示的に置かれたファイルなのでプレフィックスの制限はかけない。
    #[tracing::instrument(skip(self))]
    pub fn add_env_file_variables(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| StackError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut count = 0;
        for (key, value) in parse_env_file(&content) {
            self.context.insert(key, &serde_json::Value::String(value));
            count += 1;
        }

        info!(
            env_file = %path.display(),
            variable_count = count,
            "Loaded variables from .env file"
        );
        Ok(())
    }

    pub fn render_str(&mut self, template: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| StackError::TemplateRenderError(tera_error_detail(&e)))
    }

    /// ファイルを読み込んで展開
    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|e| StackError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.render_str(&content).map_err(|e| match e {
            StackError::TemplateRenderError(message) => StackError::TemplateError {
                file: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// `KEY=VALUE` 形式の行を読む
fn parse_env_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), strip_quotes(value.trim()).to_string()))
        .collect()
}

/// トップレベルの `variables { }` ブロックを抽出
///
/// 本文に `{{ ... }}` が含まれていても読めるよう、ブロック部分だけをパースする。
pub fn extract_variables(kdl_content: &str) -> Result<Variables> {
    extract_variables_for_environment(kdl_content, None)
}

/// 環境ブロック内の `variables { }` も含めて抽出
///
/// 環境の変数はトップレベルの変数を上書きする。
pub fn extract_variables_for_environment(
    kdl_content: &str,
    environment: Option<&str>,
) -> Result<Variables> {
    let blocks = environment_blocks(kdl_content, None)?;

    let mut top_level = String::with_capacity(kdl_content.len());
    let mut last = 0;
    for (start, _, end) in &blocks {
        top_level.push_str(&kdl_content[last..*start]);
        last = *end;
    }
    top_level.push_str(&kdl_content[last..]);

    let mut vars = variables_in(&top_level)?;

    if let Some(name) = environment {
        for (_, body_start, end) in environment_blocks(kdl_content, Some(name))? {
            vars.extend(variables_in(&kdl_content[body_start..end - 1])?);
        }
    }

    Ok(vars)
}

/// `environment "name" { ... }` の範囲 (開始, 本文開始, 終端の次) を列挙
fn environment_blocks(
    content: &str,
    name: Option<&str>,
) -> Result<Vec<(usize, usize, usize)>> {
    let name_pattern = name.map_or_else(|| r#"[^"']+"#.to_string(), regex::escape);
    let pattern = format!(r#"(?s)environment\s+["']{name_pattern}["'][^{{\n]*\{{"#);
    let re = Regex::new(&pattern)
        .map_err(|e| StackError::InvalidConfig(format!("正規表現のコンパイルエラー: {}", e)))?;

    Ok(re
        .find_iter(content)
        .filter_map(|m| find_matching_brace(content, m.end() - 1).map(|end| (m.start(), m.end(), end + 1)))
        .collect())
}

fn variables_in(content: &str) -> Result<Variables> {
    let re = Regex::new(r"(?s)variables\s*\{(?P<content>.*?)\}")
        .map_err(|e| StackError::InvalidConfig(format!("正規表現のコンパイルエラー: {}", e)))?;

    let mut vars = HashMap::new();
    for cap in re.captures_iter(content) {
        let Some(body) = cap.name("content") else {
            continue;
        };
        let doc: kdl::KdlDocument = body.as_str().parse().map_err(|e| {
            StackError::InvalidConfig(format!("KDL パースエラー (variables ブロック): {}", e))
        })?;
        for var in doc.nodes() {
            if let Some(entry) = var.entries().first() {
                vars.insert(var.name().value().to_string(), kdl_value_to_json(entry.value()));
            }
        }
    }
    Ok(vars)
}

/// 対応する閉じ波括弧の位置
fn find_matching_brace(content: &str, open: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 1;
    let mut in_string = false;
    let mut escaped = false;
    for (pos, &c) in bytes.iter().enumerate().skip(open + 1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            b'\\' => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_quotes(s: &str) -> &str {
    let quoted = s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')));
    if quoted { &s[1..s.len() - 1] } else { s }
}

/// Tera のエラーチェーンから利用者向けのメッセージを作る
fn tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    let full = details.join(" | ");

    if let Some(start) = full.find("Variable `")
        && let Some(len) = full[start..].find("` not found")
    {
        return format!(
            "未定義の変数: `{}`\nヒント: variables ブロックで定義するか、.env ファイルに追加してください",
            &full[start + 10..start + len]
        );
    }
    full
}

/// KDL の値を JSON の値に変換
pub(crate) fn kdl_value_to_json(value: &kdl::KdlValue) -> serde_json::Value {
    if let Some(s) = value.as_string() {
        serde_json::Value::String(s.to_string())
    } else if let Some(i) = value.as_integer() {
        i64::try_from(i)
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::String(i.to_string()))
    } else if let Some(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    } else if let Some(b) = value.as_bool() {
        serde_json::Value::Bool(b)
    } else {
        serde_json::Value::Null
    }
}

// src/transform/mod.rs
//! Deterministic normalization of fetched bytes into the comparison string.
//!
//! The chain is a fixed-order list of steps built once at validation time:
//! structured query or body extraction, pattern extraction, replace rules,
//! blank-line removal, per-line trimming.

pub mod html;
pub mod jq;

use regex::Regex;

use crate::error::TransformError;

/// Options as configured on a watch, before compilation.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    pub jq: Option<String>,
    pub extract_body: bool,
    pub pattern: Option<String>,
    pub replaces: Vec<(String, String)>,
    pub remove_empty_lines: bool,
    pub trim_whitespace: bool,
}

#[derive(Debug, Clone)]
pub struct ReplaceRule {
    pub pattern: Regex,
    pub replacement: String,
}

#[derive(Debug, Clone)]
pub enum TransformStep {
    Jq(String),
    ExtractBody,
    Pattern(Regex),
    Replace(Vec<ReplaceRule>),
    RemoveEmptyLines,
    TrimWhitespace,
}

impl TransformStep {
    fn apply(&self, input: String) -> Result<String, TransformError> {
        match self {
            TransformStep::Jq(query) => jq::apply(query, &input),
            TransformStep::ExtractBody => Ok(html::extract_body(&input)),
            TransformStep::Pattern(re) => Ok(extract_pattern(re, &input)),
            TransformStep::Replace(rules) => Ok(rules.iter().fold(input, |acc, rule| {
                rule.pattern
                    .replace_all(&acc, rule.replacement.as_str())
                    .into_owned()
            })),
            TransformStep::RemoveEmptyLines => Ok(input
                .lines()
                .filter(|l| !l.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n")),
            TransformStep::TrimWhitespace => Ok(input
                .lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformChain {
    steps: Vec<TransformStep>,
}

impl TransformChain {
    /// Compile options into the ordered step list.
    ///
    /// Fails on invalid regexes or jq queries, and when both a jq query and
    /// body extraction are requested.
    pub fn compile(opts: &TransformOptions) -> Result<Self, Vec<String>> {
        let mut errs = Vec::new();
        let mut steps = Vec::new();

        match (&opts.jq, opts.extract_body) {
            (Some(_), true) => {
                errs.push("jq filter and extract_body cannot be used at the same time".to_string())
            }
            (Some(q), false) => match jq::check(q) {
                Ok(()) => steps.push(TransformStep::Jq(q.clone())),
                Err(e) => errs.push(format!("invalid jq filter `{q}`: {e}")),
            },
            (None, true) => steps.push(TransformStep::ExtractBody),
            (None, false) => {}
        }

        if let Some(p) = &opts.pattern {
            match Regex::new(p) {
                Ok(re) => steps.push(TransformStep::Pattern(re)),
                Err(e) => errs.push(format!("invalid pattern `{p}`: {e}")),
            }
        }

        let mut rules = Vec::with_capacity(opts.replaces.len());
        for (pattern, replacement) in &opts.replaces {
            match Regex::new(pattern) {
                Ok(re) => rules.push(ReplaceRule {
                    pattern: re,
                    replacement: replacement.clone(),
                }),
                Err(e) => errs.push(format!("invalid replace pattern `{pattern}`: {e}")),
            }
        }
        if !rules.is_empty() {
            steps.push(TransformStep::Replace(rules));
        }

        if opts.remove_empty_lines {
            steps.push(TransformStep::RemoveEmptyLines);
        }
        if opts.trim_whitespace {
            steps.push(TransformStep::TrimWhitespace);
        }

        if errs.is_empty() {
            Ok(Self { steps })
        } else {
            Err(errs)
        }
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    /// Raw bytes in, comparison string out. Invalid UTF-8 is replaced lossily.
    pub fn apply(&self, raw: &[u8]) -> Result<String, TransformError> {
        let text = String::from_utf8_lossy(raw).into_owned();
        self.steps.iter().try_fold(text, |acc, step| step.apply(acc))
    }
}

/// First match; capture group 1 when the pattern has one. No match → empty.
fn extract_pattern(re: &Regex, input: &str) -> String {
    match re.captures(input) {
        Some(caps) => caps
            .get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        None => String::new(),
    }
}

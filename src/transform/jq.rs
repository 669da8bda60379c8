// src/transform/jq.rs
use jaq_interpret::{Ctx, FilterT, ParseCtx, RcIter, Val};
use serde_json::Value;

use crate::error::TransformError;

/// Compile a jq query with the core and standard library definitions loaded.
fn compile(query: &str) -> Result<jaq_interpret::Filter, String> {
    let mut defs = ParseCtx::new(Vec::new());
    defs.insert_natives(jaq_core::core());
    defs.insert_defs(jaq_std::std());

    let (parsed, errs) = jaq_parse::parse(query, jaq_parse::main());
    if !errs.is_empty() {
        let msgs: Vec<String> = errs.iter().map(|e| format!("{e:?}")).collect();
        return Err(msgs.join("; "));
    }
    let parsed = parsed.ok_or_else(|| "empty jq query".to_string())?;
    let filter = defs.compile(parsed);
    if !defs.errs.is_empty() {
        return Err(format!("{} undefined symbol(s) in query", defs.errs.len()));
    }
    Ok(filter)
}

/// Check that a query parses and compiles. Used at config validation time.
pub fn check(query: &str) -> Result<(), String> {
    compile(query).map(|_| ())
}

/// Run `query` over the JSON document in `body`.
///
/// Every output value lands on its own line: strings verbatim, everything
/// else as pretty JSON. Object keys are sorted, so output is stable.
pub fn apply(query: &str, body: &str) -> Result<String, TransformError> {
    let input: Value =
        serde_json::from_str(body).map_err(|e| TransformError::InvalidJson(e.to_string()))?;
    let filter = compile(query).map_err(TransformError::Jq)?;

    let inputs = RcIter::new(core::iter::empty());
    let out = filter.run((Ctx::new([], &inputs), Val::from(input)));

    let mut lines = Vec::new();
    for item in out {
        let val = item.map_err(|e| TransformError::Jq(e.to_string()))?;
        let json = Value::from(val);
        let rendered = match json {
            Value::String(s) => s,
            other => serde_json::to_string_pretty(&other)
                .map_err(|e| TransformError::Jq(e.to_string()))?,
        };
        lines.push(rendered);
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_fields_and_unwraps_strings() {
        let body = r#"{"items":[{"name":"a","v":1},{"name":"b","v":2}]}"#;
        assert_eq!(apply(".items[].name", body).unwrap(), "a\nb");
        assert_eq!(apply("[.items[].v] | add", body).unwrap(), "3");
    }

    #[test]
    fn object_keys_are_sorted() {
        let body = r#"{"z":1,"a":{"y":2,"b":3}}"#;
        let out = apply(".", body).unwrap();
        let a = out.find("\"a\"").unwrap();
        let z = out.find("\"z\"").unwrap();
        assert!(a < z);
    }

    #[test]
    fn invalid_json_is_a_transform_error() {
        let err = apply(".", "<html></html>").unwrap_err();
        assert!(matches!(err, TransformError::InvalidJson(_)));
    }

    #[test]
    fn check_rejects_broken_queries() {
        assert!(check(".foo | map(").is_err());
        assert!(check(".foo | map(.bar)").is_ok());
    }
}

//! Rule target resolution.

use super::collection::MatchData;
use super::store::TransactionVariables;
use crate::parser::{RuleTarget, TargetKey};

/// Resolve one rule target into the values the operator will see.
pub fn resolve(target: &RuleTarget, vars: &TransactionVariables) -> Vec<MatchData> {
    let Some(collection) = vars.collection(target.variable) else {
        return Vec::new();
    };

    let mut matches = match (&target.key, collection.as_keyed()) {
        (Some(TargetKey::Literal(key)), Some(keyed)) => keyed.find_string(key),
        (Some(TargetKey::Regex(re)), Some(keyed)) => keyed.find_regex(re),
        _ => collection.as_collection().find_all(),
    };

    if !target.exceptions.is_empty() {
        matches.retain(|m| {
            let key = m.key.to_lowercase();
            !target.exceptions.iter().any(|e| *e == key)
        });
    }

    if target.count {
        let key = match &target.key {
            Some(TargetKey::Literal(key)) => key.clone(),
            _ => String::new(),
        };
        return vec![MatchData::new(
            target.variable,
            key,
            matches.len().to_string(),
        )];
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_targets, VariableName};

    fn vars() -> TransactionVariables {
        let mut vars = TransactionVariables::new();
        vars.set_uri("/login?user=admin&password=secret&Password=again");
        vars.add_request_header("User-Agent", "curl/8.0");
        vars.add_request_header("Accept", "*/*");
        vars
    }

    fn values(targets: &str, vars: &TransactionVariables) -> Vec<String> {
        parse_targets(targets)
            .unwrap()
            .iter()
            .flat_map(|t| resolve(t, vars))
            .map(|m| m.value)
            .collect()
    }

    #[test]
    fn test_resolve_single() {
        let vars = vars();
        assert_eq!(values("REQUEST_FILENAME", &vars), vec!["/login"]);
    }

    #[test]
    fn test_resolve_key_literal_and_regex() {
        let vars = vars();
        assert_eq!(values("ARGS:password", &vars), vec!["secret", "again"]);
        assert_eq!(values("REQUEST_HEADERS:/^user-/", &vars), vec!["curl/8.0"]);
    }

    #[test]
    fn test_resolve_exclusion() {
        let vars = vars();
        assert_eq!(values("ARGS|!ARGS:PASSWORD", &vars), vec!["admin"]);
    }

    #[test]
    fn test_resolve_count() {
        let vars = vars();
        assert_eq!(values("&ARGS", &vars), vec!["3"]);
        assert_eq!(values("&ARGS:password", &vars), vec!["2"]);
        assert_eq!(values("&ARGS:missing", &vars), vec!["0"]);
    }

    #[test]
    fn test_resolve_names() {
        let vars = vars();
        assert_eq!(values("REQUEST_HEADERS_NAMES", &vars), vec!["User-Agent", "Accept"]);
        let matches = resolve(&parse_targets("ARGS_NAMES:user").unwrap()[0], &vars);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].variable, VariableName::ArgsNames);
    }
}

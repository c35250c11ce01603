//! Directive table.
//!
//! Optimized with perfect hash function for O(1) directive name lookup.
//! Keys are lowercase; lookups lowercase the name first.

use phf::phf_map;

use super::operator::OperatorSpec;
use super::Parser;
use crate::engine::{parse_on_off, AuditEngineMode, RuleEngineMode};
use crate::error::{Error, Result};
use crate::parser::variable::parse_targets;

/// Applies one directive to the parser state.
pub(super) type DirectiveHandler = fn(&mut Parser, &[String]) -> Result<()>;

static DIRECTIVES: phf::Map<&'static str, DirectiveHandler> = phf_map! {
    "secrule" => sec_rule as DirectiveHandler,
    "secaction" => sec_action as DirectiveHandler,
    "include" => include as DirectiveHandler,
    "secruleengine" => sec_rule_engine as DirectiveHandler,
    "secrequestbodyaccess" => sec_request_body_access as DirectiveHandler,
    "secresponsebodyaccess" => sec_response_body_access as DirectiveHandler,
    "secrequestbodylimit" => sec_request_body_limit as DirectiveHandler,
    "secresponsebodylimit" => sec_response_body_limit as DirectiveHandler,
    "secruleremovebyid" => sec_rule_remove_by_id as DirectiveHandler,
    "secwebappid" => sec_web_app_id as DirectiveHandler,
    "seccomponentsignature" => sec_component_signature as DirectiveHandler,
    "secauditengine" => sec_audit_engine as DirectiveHandler,
    "secauditlogformat" => sec_audit_log_format as DirectiveHandler,
    "secauditlogtype" => sec_audit_log_type as DirectiveHandler,
};

/// Find the handler for `name`, ignoring case.
pub(super) fn lookup(name: &str) -> Option<DirectiveHandler> {
    DIRECTIVES.get(name.to_ascii_lowercase().as_str()).copied()
}

/// Whether `name` is a known directive.
pub fn is_directive(name: &str) -> bool {
    lookup(name).is_some()
}

fn single_argument(args: &[String]) -> Result<&str> {
    match args {
        [arg] => Ok(arg.as_str()),
        _ => Err(Error::config(format!(
            "expected exactly one argument, got {}",
            args.len()
        ))),
    }
}

fn sec_rule(parser: &mut Parser, args: &[String]) -> Result<()> {
    let (targets, operator, actions) = match args {
        [targets, operator] => (targets, operator, ""),
        [targets, operator, actions] => (targets, operator, actions.as_str()),
        _ => {
            return Err(Error::config(format!(
                "expected 2 or 3 arguments, got {}",
                args.len()
            )))
        }
    };
    let targets = parse_targets(targets)?;
    let operator = parser.compile_operator(&OperatorSpec::parse(operator)?)?;
    parser.add_rule(targets, Some(operator), actions)
}

fn sec_action(parser: &mut Parser, args: &[String]) -> Result<()> {
    let actions = single_argument(args)?;
    parser.add_rule(Vec::new(), None, actions)
}

fn include(parser: &mut Parser, args: &[String]) -> Result<()> {
    let path = single_argument(args)?;
    parser.include(path)
}

fn sec_rule_engine(parser: &mut Parser, args: &[String]) -> Result<()> {
    let value = single_argument(args)?;
    parser.config.rule_engine = RuleEngineMode::parse(value).ok_or_else(|| {
        Error::config(format!(
            "invalid mode '{}' (expected On, Off or DetectionOnly)",
            value
        ))
    })?;
    Ok(())
}

fn on_off(args: &[String]) -> Result<bool> {
    let value = single_argument(args)?;
    parse_on_off(value)
        .ok_or_else(|| Error::config(format!("invalid value '{}' (expected On or Off)", value)))
}

fn sec_request_body_access(parser: &mut Parser, args: &[String]) -> Result<()> {
    parser.config.request_body_access = on_off(args)?;
    Ok(())
}

fn sec_response_body_access(parser: &mut Parser, args: &[String]) -> Result<()> {
    parser.config.response_body_access = on_off(args)?;
    Ok(())
}

fn byte_limit(args: &[String]) -> Result<usize> {
    let value = single_argument(args)?;
    value
        .parse()
        .map_err(|_| Error::config(format!("invalid byte limit '{}'", value)))
}

fn sec_request_body_limit(parser: &mut Parser, args: &[String]) -> Result<()> {
    parser.config.request_body_limit = byte_limit(args)?;
    Ok(())
}

fn sec_response_body_limit(parser: &mut Parser, args: &[String]) -> Result<()> {
    parser.config.response_body_limit = byte_limit(args)?;
    Ok(())
}

/// Accepts ids and `start-end` ranges, space separated.
fn sec_rule_remove_by_id(parser: &mut Parser, args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Err(Error::config("expected at least one rule id"));
    }
    let parse_id = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|_| Error::config(format!("invalid rule id '{}'", s)))
    };

    for item in args.iter().flat_map(|arg| arg.split_whitespace()) {
        let (start, end) = match item.split_once('-') {
            Some((start, end)) => (parse_id(start)?, parse_id(end)?),
            None => {
                let id = parse_id(item)?;
                (id, id)
            }
        };
        if start > end {
            return Err(Error::config(format!("invalid rule id range '{}'", item)));
        }
        let removed = parser.rules.remove_by_range(start, end);
        tracing::debug!(range = item, removed, "rules removed");
    }
    Ok(())
}

fn sec_web_app_id(parser: &mut Parser, args: &[String]) -> Result<()> {
    parser.config.web_app_id = single_argument(args)?.to_string();
    Ok(())
}

fn sec_component_signature(parser: &mut Parser, args: &[String]) -> Result<()> {
    let signature = single_argument(args)?.to_string();
    parser.config.component_signatures.push(signature);
    Ok(())
}

fn sec_audit_engine(parser: &mut Parser, args: &[String]) -> Result<()> {
    let value = single_argument(args)?;
    parser.config.audit_engine = AuditEngineMode::parse(value).ok_or_else(|| {
        Error::config(format!(
            "invalid mode '{}' (expected On, Off or RelevantOnly)",
            value
        ))
    })?;
    Ok(())
}

fn sec_audit_log_format(parser: &mut Parser, args: &[String]) -> Result<()> {
    let name = single_argument(args)?;
    parser.registry.audit_formatters.get(name)?;
    parser.config.audit_log_format = name.to_lowercase();
    Ok(())
}

fn sec_audit_log_type(parser: &mut Parser, args: &[String]) -> Result<()> {
    let name = single_argument(args)?;
    parser.registry.audit_writers.get(name)?;
    parser.config.audit_log_type = name.to_lowercase();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        assert!(is_directive("SecRule"));
        assert!(is_directive("SECRULEENGINE"));
        assert!(is_directive("include"));
        assert!(!is_directive("SecMarker"));
    }

    #[test]
    fn test_single_argument() {
        assert_eq!(single_argument(&["On".to_string()]).unwrap(), "On");
        assert!(single_argument(&[]).is_err());
        assert!(single_argument(&["a".to_string(), "b".to_string()]).is_err());
    }
}

//! Per-request evaluation state.
//!
//! A transaction is fed request and response data by the embedding server
//! and evaluates the rule set one phase at a time. Once an interruption is
//! recorded no further request or response phase runs; the logging phase
//! always does.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::config::{AuditEngineMode, RuleEngineMode};
use super::interruption::Interruption;
use super::phase::Phase;
use super::rule::{Rule, RuleMetadata, Severity};
use super::state::{AllowScope, TransactionState};
use super::Waf;
use crate::auditlog::{AuditLog, AuditProducer, AuditRequest, AuditResponse};
use crate::error::{Error, Result};
use crate::variables::{resolve, text_and_raw, MatchData, TransactionVariables, VariableName};

/// Number of capture slots (`TX:0` to `TX:9`).
const CAPTURE_SLOTS: usize = 10;

/// A rule (or whole chain) that matched.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedRule {
    /// Chain head id.
    pub id: u64,
    /// Phase the rule ran in.
    pub phase: Phase,
    /// Expanded `msg`.
    pub message: String,
    /// Expanded `logdata`.
    pub data: String,
    /// Severity of the chain head.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Tags of the chain head.
    pub tags: Vec<String>,
    /// Values that satisfied each link's operator.
    pub matched: Vec<MatchData>,
    /// Whether any link carried a disruptive action.
    pub disruptive: bool,
    /// Logged through `tracing` on match.
    #[serde(skip)]
    pub log: bool,
    /// Included in the audit log.
    #[serde(skip)]
    pub audit_log: bool,
}

/// A single HTTP transaction.
pub struct Transaction {
    id: String,
    waf: Waf,
    variables: TransactionVariables,
    timestamp: DateTime<Utc>,
    client_port: u16,
    server_port: u16,
    response_status: u16,
    request_body: Vec<u8>,
    response_body: Vec<u8>,
    capturing: bool,
    captures: [Option<String>; CAPTURE_SLOTS],
    interruption: Option<Interruption>,
    allow: Option<AllowScope>,
    current_phase: Option<Phase>,
    last_phase: Option<Phase>,
    matched_rules: Vec<MatchedRule>,
    closed: bool,
}

impl Transaction {
    pub(crate) fn new(waf: Waf, id: String) -> Self {
        let mut variables = TransactionVariables::new();
        variables.set_single(VariableName::UniqueId, id.clone());
        tracing::debug!(tx_id = %id, "transaction created");
        Self {
            id,
            waf,
            variables,
            timestamp: Utc::now(),
            client_port: 0,
            server_port: 0,
            response_status: 0,
            request_body: Vec::new(),
            response_body: Vec::new(),
            capturing: false,
            captures: Default::default(),
            interruption: None,
            allow: None,
            current_phase: None,
            last_phase: None,
            matched_rules: Vec::new(),
            closed: false,
        }
    }

    /// `UNIQUE_ID`
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The recorded interruption, if any.
    pub fn interruption(&self) -> Option<&Interruption> {
        self.interruption.as_ref()
    }

    /// Rules that matched so far, in evaluation order.
    pub fn matched_rules(&self) -> &[MatchedRule] {
        &self.matched_rules
    }

    /// Last capture stored in slot `index`.
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index)?.as_deref()
    }

    /// Collections of this transaction.
    pub fn variables(&self) -> &TransactionVariables {
        &self.variables
    }

    /// Mutable collections, for hosts that populate variables directly.
    pub fn variables_mut(&mut self) -> &mut TransactionVariables {
        &mut self.variables
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::TransactionClosed {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Record client and server addressing.
    pub fn process_connection(&mut self, client: &str, client_port: u16, server: &str, server_port: u16) {
        self.client_port = client_port;
        self.server_port = server_port;
        self.variables.set_single(VariableName::RemoteAddr, client);
        self.variables.set_single(VariableName::RemotePort, client_port.to_string());
        self.variables.set_single(VariableName::ServerAddr, server);
        self.variables.set_single(VariableName::ServerPort, server_port.to_string());
    }

    /// Record the request line. Query arguments become `ARGS_GET`.
    pub fn process_uri(&mut self, uri: &str, method: &str, protocol: &str) {
        self.variables.set_uri(uri);
        self.variables.set_single(VariableName::RequestMethod, method);
        self.variables.set_single(VariableName::RequestProtocol, protocol);
        self.variables
            .set_single(VariableName::RequestLine, format!("{} {} {}", method, uri, protocol));
    }

    /// Add a request header; repeated names keep every value.
    pub fn add_request_header(&mut self, name: &str, value: &str) {
        self.variables.add_request_header(name, value);
    }

    /// Add to `ARGS_GET` and `ARGS`.
    pub fn add_get_argument(&mut self, key: &str, value: &str) {
        self.variables.add_get_argument(key, value);
    }

    /// Add to `ARGS_POST` and `ARGS`.
    pub fn add_post_argument(&mut self, key: &str, value: &str) {
        self.variables.add_post_argument(key, value);
    }

    /// Evaluate phase 1.
    pub fn process_request_headers(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.variables.single(VariableName::ServerName).is_empty() {
            if let Some(host) = self.variables.request_header("host") {
                let name = host.rsplit_once(':').map_or(host, |(name, _)| name).to_string();
                self.variables.set_single(VariableName::ServerName, name);
            }
        }
        self.run_phase(Phase::RequestHeaders)
    }

    /// Buffer request body bytes up to `SecRequestBodyLimit`. Returns how
    /// many bytes were kept; nothing is kept when body access is off.
    pub fn write_request_body(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let config = &self.waf.config;
        if !config.request_body_access {
            return Ok(0);
        }
        Ok(append_limited(&mut self.request_body, data, config.request_body_limit, &self.id))
    }

    /// Run the body processor for the request content type, then evaluate
    /// phase 2.
    pub fn process_request_body(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.waf.config.request_body_access && self.last_phase < Some(Phase::RequestBody) {
            self.variables
                .set_single(VariableName::RequestBodyLength, self.request_body.len().to_string());
            self.variables
                .set_single_bytes(VariableName::RequestBody, &self.request_body);
            self.process_body()?;
        }
        self.run_phase(Phase::RequestBody)
    }

    fn process_body(&mut self) -> Result<()> {
        let Some(content_type) = self.variables.request_header("content-type") else {
            return Ok(());
        };
        let registry = Arc::clone(&self.waf.registry);
        let Some((name, processor)) = registry.body_processors.for_content_type(content_type)
        else {
            tracing::trace!(tx_id = %self.id, content_type, "no body processor");
            return Ok(());
        };
        if let Err(e) = processor.process(&self.request_body, &mut self.variables) {
            tracing::warn!(tx_id = %self.id, processor = name, error = %e, "request body not processed");
        }
        Ok(())
    }

    /// Add a response header.
    pub fn add_response_header(&mut self, name: &str, value: &str) {
        self.variables.add_response_header(name, value);
    }

    /// Record the response status line and evaluate phase 3.
    pub fn process_response_headers(&mut self, status: u16, protocol: &str) -> Result<()> {
        self.ensure_open()?;
        self.response_status = status;
        self.variables
            .set_single(VariableName::ResponseStatus, status.to_string());
        self.variables.set_single(VariableName::ResponseProtocol, protocol);
        self.run_phase(Phase::ResponseHeaders)
    }

    /// Buffer response body bytes up to `SecResponseBodyLimit`.
    pub fn write_response_body(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let config = &self.waf.config;
        if !config.response_body_access {
            return Ok(0);
        }
        Ok(append_limited(&mut self.response_body, data, config.response_body_limit, &self.id))
    }

    /// Evaluate phase 4.
    pub fn process_response_body(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.waf.config.response_body_access && self.last_phase < Some(Phase::ResponseBody) {
            self.variables
                .set_single_bytes(VariableName::ResponseBody, &self.response_body);
        }
        self.run_phase(Phase::ResponseBody)
    }

    /// Evaluate phase 5 and write the audit log when the audit engine asks
    /// for it.
    pub fn process_logging(&mut self) -> Result<()> {
        self.run_phase(Phase::Logging)?;
        self.write_audit_log()
    }

    /// Close the transaction. Later phase calls fail.
    pub fn close(&mut self) {
        if !self.closed {
            tracing::debug!(tx_id = %self.id, matched = self.matched_rules.len(), "transaction closed");
        }
        self.closed = true;
    }

    fn run_phase(&mut self, phase: Phase) -> Result<()> {
        self.ensure_open()?;
        if self.last_phase.map_or(false, |last| phase <= last) {
            tracing::debug!(tx_id = %self.id, phase = %phase, "phase already processed");
            return Ok(());
        }
        self.last_phase = Some(phase);

        if self.waf.config.rule_engine == RuleEngineMode::Off || self.skips_rules(phase) {
            return Ok(());
        }

        tracing::trace!(tx_id = %self.id, phase = %phase, "evaluating phase");
        self.current_phase = Some(phase);
        let rules = Arc::clone(&self.waf.rules);
        for rule in rules.rules_for_phase(phase) {
            if self.skips_rules(phase) {
                break;
            }
            self.evaluate_rule(rule, phase);
        }
        if self.allow == Some(AllowScope::Phase) {
            self.allow = None;
        }
        self.current_phase = None;
        Ok(())
    }

    fn skips_rules(&self, phase: Phase) -> bool {
        if phase == Phase::Logging {
            return self.allow == Some(AllowScope::Phase);
        }
        if self.interruption.is_some() {
            return true;
        }
        match self.allow {
            Some(AllowScope::All | AllowScope::Phase) => true,
            Some(AllowScope::Request) => phase.is_request_phase(),
            None => false,
        }
    }

    /// Evaluate a top-level rule and its chain. Actions run, head first,
    /// only when every link matched.
    fn evaluate_rule(&mut self, head: &Rule, phase: Phase) {
        self.variables.matched_vars_mut().reset();

        let mut matched = Vec::new();
        for link in head.links() {
            let result = self.match_rule(link);
            self.capturing = false;
            match result {
                Some(data) => matched.extend(data),
                None => return,
            }
        }

        for link in head.links() {
            self.set_rule_variables(&link.metadata);
            for action in &link.actions {
                action.action.evaluate(&link.metadata, self);
            }
        }

        self.set_rule_variables(&head.metadata);
        let meta = &head.metadata;
        let message = meta
            .msg
            .as_ref()
            .map(|m| m.expand(&self.variables).into_owned())
            .unwrap_or_default();
        let data = meta
            .log_data
            .as_ref()
            .map(|m| m.expand(&self.variables).into_owned())
            .unwrap_or_default();

        if meta.log {
            tracing::info!(
                tx_id = %self.id,
                rule_id = meta.id,
                phase = %phase,
                msg = %message,
                data = %data,
                "rule matched"
            );
        } else {
            tracing::debug!(tx_id = %self.id, rule_id = meta.id, "rule matched (nolog)");
        }

        self.matched_rules.push(MatchedRule {
            id: meta.id,
            phase,
            message,
            data,
            severity: meta.severity,
            tags: meta.tags.clone(),
            matched,
            disruptive: head.links().any(Rule::is_disruptive),
            log: meta.log,
            audit_log: meta.audit_log,
        });
    }

    /// Test one link. `None` means no match; rules without an operator
    /// always match.
    fn match_rule(&mut self, rule: &Rule) -> Option<Vec<MatchData>> {
        self.capturing = rule.metadata.capture;
        self.set_rule_variables(&rule.metadata);

        let Some(op) = &rule.operator else {
            return Some(Vec::new());
        };

        let mut matched = Vec::new();
        for target in &rule.targets {
            for data in resolve(target, &self.variables) {
                let value = rule.transformations.apply_bytes(data.bytes());
                let hit = op.operator.evaluate_bytes(self, &value) != op.negated;
                tracing::trace!(
                    rule_id = rule.metadata.effective_id(),
                    variable = %data.full_name(),
                    operator = %op,
                    hit,
                    "operator evaluated"
                );
                if hit {
                    let (text, raw) = text_and_raw(&value);
                    let data = MatchData::new(data.variable, data.key.clone(), text).with_raw(raw);
                    self.record_matched_var(&data);
                    matched.push(data);
                }
            }
        }

        if matched.is_empty() {
            None
        } else {
            Some(matched)
        }
    }

    fn record_matched_var(&mut self, data: &MatchData) {
        let name = data.full_name();
        self.variables
            .set_single_bytes(VariableName::MatchedVar, data.bytes());
        self.variables
            .set_single(VariableName::MatchedVarName, name.clone());
        self.variables
            .matched_vars_mut()
            .add_bytes(&name, data.bytes());
    }

    fn set_rule_variables(&mut self, meta: &RuleMetadata) {
        let msg = meta
            .msg
            .as_ref()
            .map(|m| m.expand(&self.variables).into_owned());
        let rule = self.variables.rule_mut();
        rule.reset();
        rule.add("id", meta.effective_id().to_string());
        rule.add("phase", meta.phase.number().to_string());
        if let Some(msg) = msg {
            rule.add("msg", msg);
        }
        if let Some(severity) = meta.severity {
            rule.add("severity", severity.number().to_string());
        }
        if let Some(ref rev) = meta.rev {
            rule.add("rev", rev.clone());
        }
        if let Some(ref ver) = meta.ver {
            rule.add("ver", ver.clone());
        }
        if let Some(maturity) = meta.maturity {
            rule.add("maturity", maturity.to_string());
        }
        if let Some(accuracy) = meta.accuracy {
            rule.add("accuracy", accuracy.to_string());
        }
    }

    fn write_audit_log(&self) -> Result<()> {
        let config = &self.waf.config;
        let relevant = match config.audit_engine {
            AuditEngineMode::Off => false,
            AuditEngineMode::On => true,
            AuditEngineMode::RelevantOnly => {
                self.interruption.is_some() || self.matched_rules.iter().any(|m| m.audit_log)
            }
        };
        if !relevant {
            return Ok(());
        }

        let registry = &self.waf.registry;
        let formatter = registry.audit_formatters.get(&config.audit_log_format)?;
        let writer = registry.audit_writers.get(&config.audit_log_type)?;
        writer.write(&self.audit_log(), formatter.as_ref())
    }

    /// Summary of the transaction for audit logging.
    pub fn audit_log(&self) -> AuditLog {
        let v = &self.variables;
        let config = &self.waf.config;
        AuditLog {
            transaction_id: self.id.clone(),
            timestamp: self.timestamp,
            client_ip: v.single(VariableName::RemoteAddr).to_string(),
            client_port: self.client_port,
            server_ip: v.single(VariableName::ServerAddr).to_string(),
            server_port: self.server_port,
            request: AuditRequest {
                method: v.single(VariableName::RequestMethod).to_string(),
                uri: v.single(VariableName::RequestUri).to_string(),
                protocol: v.single(VariableName::RequestProtocol).to_string(),
                headers: v.request_headers(),
            },
            response: AuditResponse {
                status: self.response_status,
                protocol: v.single(VariableName::ResponseProtocol).to_string(),
                headers: v.response_headers(),
            },
            producer: AuditProducer {
                engine: concat!("zentinel-seclang/", env!("CARGO_PKG_VERSION")).to_string(),
                components: config.component_signatures.clone(),
                web_app_id: config.web_app_id.clone(),
                rule_engine: config.rule_engine,
            },
            messages: self
                .matched_rules
                .iter()
                .filter(|m| m.audit_log)
                .cloned()
                .collect(),
            interruption: self.interruption.clone(),
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("last_phase", &self.last_phase)
            .field("interruption", &self.interruption)
            .field("matched_rules", &self.matched_rules.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl TransactionState for Transaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn variables(&self) -> &TransactionVariables {
        &self.variables
    }

    fn variables_mut(&mut self) -> &mut TransactionVariables {
        &mut self.variables
    }

    fn capturing(&self) -> bool {
        self.capturing
    }

    fn capture_field(&mut self, index: usize, value: &str) {
        if let Some(slot) = self.captures.get_mut(index) {
            *slot = Some(value.to_string());
            self.variables
                .tx_mut()
                .set_index(&index.to_string(), 0, value);
        }
    }

    fn interrupt(&mut self, mut interruption: Interruption) {
        interruption.phase = self.current_phase;
        if self.waf.config.rule_engine == RuleEngineMode::DetectionOnly {
            tracing::info!(
                tx_id = %self.id,
                rule_id = interruption.rule_id,
                action = %interruption.action,
                status = interruption.status,
                "interruption not enforced in detection-only mode"
            );
            return;
        }
        if self.interruption.is_none() {
            tracing::debug!(tx_id = %self.id, "{}", interruption.format_log());
            self.interruption = Some(interruption);
        }
    }

    fn interruption(&self) -> Option<&Interruption> {
        self.interruption.as_ref()
    }

    fn allow(&mut self, scope: AllowScope) {
        self.allow = Some(scope);
    }
}

/// Append at most `limit - buf.len()` bytes of `data`.
fn append_limited(buf: &mut Vec<u8>, data: &[u8], limit: usize, tx_id: &str) -> usize {
    let room = limit.saturating_sub(buf.len());
    let kept = room.min(data.len());
    buf.extend_from_slice(&data[..kept]);
    if kept < data.len() {
        tracing::warn!(tx_id, limit, dropped = data.len() - kept, "body limit reached");
    }
    kept
}

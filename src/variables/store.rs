//! Per-transaction variable storage.

use std::collections::HashMap;

use super::collection::{Collection, Keyed, Single};
use super::named::{NamedCollection, NamedCollectionNames};
use crate::parser::{VariableKind, VariableName};

/// Borrowed view of one variable's collection.
#[derive(Debug, Clone, Copy)]
pub enum CollectionRef<'a> {
    /// Single-valued variable.
    Single(&'a Single),
    /// Keyed variable.
    Keyed(&'a NamedCollection),
    /// Names view of a keyed variable.
    Names(NamedCollectionNames<'a>),
}

impl<'a> CollectionRef<'a> {
    /// The collection as a plain [`Collection`].
    pub fn as_collection(&self) -> &dyn Collection {
        match self {
            CollectionRef::Single(single) => *single,
            CollectionRef::Keyed(keyed) => *keyed,
            CollectionRef::Names(names) => names,
        }
    }

    /// The collection as a [`Keyed`] one, if it supports keys.
    pub fn as_keyed(&self) -> Option<&dyn Keyed> {
        match self {
            CollectionRef::Single(_) => None,
            CollectionRef::Keyed(keyed) => Some(*keyed),
            CollectionRef::Names(names) => Some(names),
        }
    }
}

/// All variables of one transaction.
#[derive(Debug, Clone)]
pub struct TransactionVariables {
    singles: HashMap<VariableName, Single>,
    args: NamedCollection,
    args_get: NamedCollection,
    args_post: NamedCollection,
    request_headers: NamedCollection,
    request_cookies: NamedCollection,
    response_headers: NamedCollection,
    tx: NamedCollection,
    env: NamedCollection,
    rule: NamedCollection,
    matched_vars: NamedCollection,
}

impl Default for TransactionVariables {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionVariables {
    /// Create an empty variable set.
    pub fn new() -> Self {
        let singles = VariableName::ALL
            .iter()
            .filter(|v| v.kind() == VariableKind::Single)
            .map(|&v| (v, Single::new(v)))
            .collect();
        Self {
            singles,
            args: NamedCollection::new(VariableName::Args),
            args_get: NamedCollection::new(VariableName::ArgsGet),
            args_post: NamedCollection::new(VariableName::ArgsPost),
            request_headers: NamedCollection::new(VariableName::RequestHeaders),
            request_cookies: NamedCollection::new(VariableName::RequestCookies),
            response_headers: NamedCollection::new(VariableName::ResponseHeaders),
            tx: NamedCollection::new(VariableName::Tx),
            env: NamedCollection::new(VariableName::Env),
            rule: NamedCollection::new(VariableName::Rule),
            matched_vars: NamedCollection::new(VariableName::MatchedVars),
        }
    }

    /// Collection backing `variable`.
    pub fn collection(&self, variable: VariableName) -> Option<CollectionRef<'_>> {
        match variable.kind() {
            VariableKind::Single => self.singles.get(&variable).map(CollectionRef::Single),
            VariableKind::Keyed => self.keyed(variable).map(CollectionRef::Keyed),
            VariableKind::Names(base) => self
                .keyed(base)
                .map(|collection| CollectionRef::Names(collection.names())),
        }
    }

    /// Keyed collection for `variable`.
    pub fn keyed(&self, variable: VariableName) -> Option<&NamedCollection> {
        use VariableName::*;
        Some(match variable {
            Args => &self.args,
            ArgsGet => &self.args_get,
            ArgsPost => &self.args_post,
            RequestHeaders => &self.request_headers,
            RequestCookies => &self.request_cookies,
            ResponseHeaders => &self.response_headers,
            Tx => &self.tx,
            Env => &self.env,
            Rule => &self.rule,
            MatchedVars => &self.matched_vars,
            _ => return None,
        })
    }

    /// Mutable keyed collection for `variable`.
    pub fn keyed_mut(&mut self, variable: VariableName) -> Option<&mut NamedCollection> {
        use VariableName::*;
        Some(match variable {
            Args => &mut self.args,
            ArgsGet => &mut self.args_get,
            ArgsPost => &mut self.args_post,
            RequestHeaders => &mut self.request_headers,
            RequestCookies => &mut self.request_cookies,
            ResponseHeaders => &mut self.response_headers,
            Tx => &mut self.tx,
            Env => &mut self.env,
            Rule => &mut self.rule,
            MatchedVars => &mut self.matched_vars,
            _ => return None,
        })
    }

    /// Value of a single-valued variable, empty if unset.
    pub fn single(&self, variable: VariableName) -> &str {
        self.singles.get(&variable).map(Single::get).unwrap_or("")
    }

    /// Set a single-valued variable.
    pub fn set_single(&mut self, variable: VariableName, value: impl Into<String>) {
        self.single_mut(variable).set(value);
    }

    /// Set a single-valued variable from bytes that may not be UTF-8.
    pub fn set_single_bytes(&mut self, variable: VariableName, value: &[u8]) {
        self.single_mut(variable).set_bytes(value);
    }

    fn single_mut(&mut self, variable: VariableName) -> &mut Single {
        self.singles
            .entry(variable)
            .or_insert_with(|| Single::new(variable))
    }

    /// The `TX` collection.
    pub fn tx(&self) -> &NamedCollection {
        &self.tx
    }

    /// Mutable `TX` collection.
    pub fn tx_mut(&mut self) -> &mut NamedCollection {
        &mut self.tx
    }

    /// The `RULE` collection.
    pub fn rule_mut(&mut self) -> &mut NamedCollection {
        &mut self.rule
    }

    /// The `MATCHED_VARS` collection.
    pub fn matched_vars_mut(&mut self) -> &mut NamedCollection {
        &mut self.matched_vars
    }

    /// Add a GET argument (also visible through `ARGS`).
    pub fn add_get_argument(&mut self, key: &str, value: &str) {
        self.args_get.add(key, value);
        self.args.add(key, value);
    }

    /// Add a POST argument (also visible through `ARGS`).
    pub fn add_post_argument(&mut self, key: &str, value: &str) {
        self.args_post.add(key, value);
        self.args.add(key, value);
    }

    /// Add a GET argument whose decoded value may not be UTF-8.
    pub fn add_get_argument_bytes(&mut self, key: &str, value: &[u8]) {
        self.args_get.add_bytes(key, value);
        self.args.add_bytes(key, value);
    }

    /// Add a POST argument whose decoded value may not be UTF-8.
    pub fn add_post_argument_bytes(&mut self, key: &str, value: &[u8]) {
        self.args_post.add_bytes(key, value);
        self.args.add_bytes(key, value);
    }

    /// Set the request URI and derive the path, basename and query variables.
    ///
    /// `ARGS_GET` is replaced by the arguments of the new query string, so
    /// calling this again does not duplicate them. `ARGS` keeps the POST
    /// arguments.
    pub fn set_uri(&mut self, uri: &str) {
        self.set_single(VariableName::RequestUri, uri);
        self.set_single(VariableName::RequestUriRaw, uri);

        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        self.set_single(VariableName::RequestFilename, path);
        let basename = path.rsplit('/').next().unwrap_or(path);
        self.set_single(VariableName::RequestBasename, basename);
        self.set_single(VariableName::QueryString, query);

        self.args_get.reset();
        self.args.reset();
        for (key, value) in parse_query(query.as_bytes()) {
            self.add_get_argument_bytes(&key, &value);
        }
        for entry in self.args_post.entries() {
            self.args.push_entry(entry.clone());
        }
    }

    /// Add a request header. `Cookie` headers also fill `REQUEST_COOKIES`.
    pub fn add_request_header(&mut self, name: &str, value: &str) {
        self.request_headers.add(name, value);
        if name.eq_ignore_ascii_case("cookie") {
            for cookie in value.split(';') {
                let cookie = cookie.trim();
                if cookie.is_empty() {
                    continue;
                }
                match cookie.split_once('=') {
                    Some((key, val)) => self.request_cookies.add(key.trim(), val.trim()),
                    None => self.request_cookies.add(cookie, ""),
                }
            }
        }
    }

    /// Add a response header, tracking `Content-Type`.
    pub fn add_response_header(&mut self, name: &str, value: &str) {
        self.response_headers.add(name, value);
        if name.eq_ignore_ascii_case("content-type") {
            self.set_single(VariableName::ResponseContentType, value);
        }
    }

    /// First value of a request header.
    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers.get(name).first().copied()
    }

    /// Request headers as `(name, value)` pairs in arrival order.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        pairs(&self.request_headers)
    }

    /// Response headers as `(name, value)` pairs in arrival order.
    pub fn response_headers(&self) -> Vec<(String, String)> {
        pairs(&self.response_headers)
    }
}

fn pairs(collection: &NamedCollection) -> Vec<(String, String)> {
    collection
        .find_all()
        .into_iter()
        .map(|m| (m.key, m.value))
        .collect()
}

/// Split `application/x-www-form-urlencoded` data into decoded pairs.
///
/// Keys are decoded lossily; values keep the exact decoded bytes.
pub fn parse_query(input: &[u8]) -> Vec<(String, Vec<u8>)> {
    let decode = |s: &[u8]| -> Vec<u8> {
        let plus: Vec<u8> = s
            .iter()
            .map(|&b| if b == b'+' { b' ' } else { b })
            .collect();
        percent_encoding::percent_decode(&plus).collect()
    };

    input
        .split(|&b| b == b'&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = match pair.iter().position(|&b| b == b'=') {
                Some(at) => (&pair[..at], decode(&pair[at + 1..])),
                None => (pair, Vec::new()),
            };
            (String::from_utf8_lossy(&decode(key)).into_owned(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_uri_derives_variables() {
        let mut vars = TransactionVariables::new();
        vars.set_uri("/app/login.php?user=admin&q=a%20b+c&flag");

        assert_eq!(vars.single(VariableName::RequestFilename), "/app/login.php");
        assert_eq!(vars.single(VariableName::RequestBasename), "login.php");
        assert_eq!(vars.single(VariableName::QueryString), "user=admin&q=a%20b+c&flag");
        assert_eq!(vars.keyed(VariableName::ArgsGet).unwrap().get("q"), vec!["a b c"]);
        assert_eq!(vars.keyed(VariableName::Args).unwrap().get("USER"), vec!["admin"]);
        assert_eq!(vars.keyed(VariableName::Args).unwrap().get("flag"), vec![""]);
    }

    #[test]
    fn test_set_uri_twice_replaces_get_arguments() {
        let mut vars = TransactionVariables::new();
        vars.add_post_argument("body", "1");
        vars.set_uri("/a?x=1&y=2");
        vars.set_uri("/b?x=3");

        let args_get = vars.keyed(VariableName::ArgsGet).unwrap();
        assert_eq!(args_get.get("x"), vec!["3"]);
        assert!(args_get.get("y").is_empty());
        let args = vars.keyed(VariableName::Args).unwrap();
        assert_eq!(args.get("x"), vec!["3"]);
        assert_eq!(args.get("body"), vec!["1"]);
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_query_keeps_decoded_bytes() {
        let pairs = parse_query(b"a=%FF%00&b+c=d+e&flag");
        assert_eq!(pairs[0], ("a".to_string(), vec![0xFF, 0x00]));
        assert_eq!(pairs[1], ("b c".to_string(), b"d e".to_vec()));
        assert_eq!(pairs[2], ("flag".to_string(), Vec::new()));

        let mut vars = TransactionVariables::new();
        vars.set_uri("/?a=%FF");
        let found = vars.keyed(VariableName::Args).unwrap().find_string("a");
        assert_eq!(found[0].bytes(), b"\xFF");
    }

    #[test]
    fn test_cookie_header_fills_cookies() {
        let mut vars = TransactionVariables::new();
        vars.add_request_header("Cookie", "session=abc; theme=dark");
        let cookies = vars.keyed(VariableName::RequestCookies).unwrap();
        assert_eq!(cookies.get("session"), vec!["abc"]);
        assert_eq!(cookies.get("theme"), vec!["dark"]);
        assert_eq!(vars.request_header("cookie"), Some("session=abc; theme=dark"));
    }

    #[test]
    fn test_collection_kinds() {
        let mut vars = TransactionVariables::new();
        vars.add_request_header("Host", "example.com");

        let names = vars.collection(VariableName::RequestHeadersNames).unwrap();
        assert!(names.as_keyed().is_some());
        let all = names.as_collection().find_all();
        assert_eq!(all[0].value, "Host");

        let uri = vars.collection(VariableName::RequestUri).unwrap();
        assert!(uri.as_keyed().is_none());
        assert_eq!(uri.as_collection().find_all().len(), 1);
    }

    #[test]
    fn test_response_content_type() {
        let mut vars = TransactionVariables::new();
        vars.add_response_header("Content-Type", "text/html");
        assert_eq!(vars.single(VariableName::ResponseContentType), "text/html");
        assert_eq!(vars.response_headers().len(), 1);
    }
}

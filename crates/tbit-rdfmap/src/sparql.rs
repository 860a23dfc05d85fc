//! SPARQL checks for attribute queries.
//!
//! Attribute queries are plain SPARQL `SELECT` text that the remote endpoint
//! evaluates. We do not build a SPARQL algebra here; the checker works on a
//! token stream and rejects the defects that would otherwise only surface
//! halfway through an import run:
//!
//! - lexical errors (unterminated strings, stray characters),
//! - unbalanced `{}` / `()` / `[]`,
//! - anything but a `SELECT` query form, and `SELECT *`,
//! - undeclared prefixes (a small set of well-known prefixes is implicit),
//! - a body that never mentions the subject variable (`?subject`),
//! - projected variables that the body never binds.
//!
//! The projected variables are the attribute names a query feeds.

use std::collections::BTreeMap;
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, take_until, take_while, take_while1},
    character::complete::{
        alpha1, alphanumeric1, anychar, char as pchar, digit1, multispace1, none_of,
        not_line_ending, one_of,
    },
    combinator::{map, opt, recognize},
    error::ErrorKind,
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use thiserror::Error;

/// Variable bound to the inbound authority URI when a query runs.
pub const SUBJECT_VARIABLE: &str = "subject";

/// Prefixes that may be used without a `PREFIX` declaration.
///
/// They are declared explicitly when a query is bound, so endpoints without
/// predefined prefixes still accept the text.
pub const WELL_KNOWN_PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("schema", "http://schema.org/"),
    ("geo", "http://www.opengis.net/ont/geosparql#"),
    ("gndo", "https://d-nb.info/standards/elementset/gnd#"),
    ("wd", "http://www.wikidata.org/entity/"),
    ("wdt", "http://www.wikidata.org/prop/direct/"),
    ("p", "http://www.wikidata.org/prop/"),
    ("ps", "http://www.wikidata.org/prop/statement/"),
    ("pq", "http://www.wikidata.org/prop/qualifier/"),
    ("wikibase", "http://wikiba.se/ontology#"),
    ("bd", "http://www.bigdata.com/rdf#"),
];

fn well_known_prefix(prefix: &str) -> Option<&'static str> {
    WELL_KNOWN_PREFIXES
        .iter()
        .find(|(name, _)| *name == prefix)
        .map(|(_, iri)| *iri)
}

// ============================================================================
// Errors
// ============================================================================

/// A malformed attribute query, located in the query text (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct QuerySyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl QuerySyntaxError {
    fn at(text: &str, offset: usize, message: impl Into<String>) -> Self {
        let before = &text[..offset.min(text.len())];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count())
            .unwrap_or(0)
            + 1;
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot bind `{uri}` as query subject: {reason}")]
pub struct SubjectBindError {
    pub uri: String,
    pub reason: String,
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Iri(&'a str),
    PrefixedName { prefix: &'a str, local: &'a str },
    /// `_:label`
    BlankNode,
    Var(&'a str),
    Literal,
    LangTag,
    Number,
    Word(&'a str),
    Punct(char),
}

#[derive(Debug, Clone, Copy)]
struct Spanned<'a> {
    token: Token<'a>,
    start: usize,
    end: usize,
}

fn is_iri_char(c: char) -> bool {
    c > ' ' && !matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
}

fn is_var_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn is_local_char(c: char) -> bool {
    is_name_char(c) || matches!(c, ':' | '%')
}

fn trivia(input: &str) -> IResult<&str, ()> {
    map(
        many0(alt((
            multispace1,
            recognize(pair(pchar('#'), not_line_ending)),
        ))),
        |_| (),
    )(input)
}

fn long_string(input: &str) -> IResult<&str, Token<'_>> {
    map(
        alt((
            delimited(tag("\"\"\""), take_until("\"\"\""), tag("\"\"\"")),
            delimited(tag("'''"), take_until("'''"), tag("'''")),
        )),
        |_| Token::Literal,
    )(input)
}

fn short_string(input: &str) -> IResult<&str, Token<'_>> {
    map(
        alt((
            delimited(
                pchar('"'),
                opt(escaped(none_of("\\\"\n\r"), '\\', anychar)),
                pchar('"'),
            ),
            delimited(
                pchar('\''),
                opt(escaped(none_of("\\'\n\r"), '\\', anychar)),
                pchar('\''),
            ),
        )),
        |_| Token::Literal,
    )(input)
}

fn iri(input: &str) -> IResult<&str, Token<'_>> {
    map(
        delimited(pchar('<'), take_while(is_iri_char), pchar('>')),
        Token::Iri,
    )(input)
}

fn var(input: &str) -> IResult<&str, Token<'_>> {
    map(preceded(one_of("?$"), take_while1(is_var_char)), Token::Var)(input)
}

fn lang_tag(input: &str) -> IResult<&str, Token<'_>> {
    map(
        preceded(
            pchar('@'),
            recognize(pair(alpha1, many0(pair(pchar('-'), alphanumeric1)))),
        ),
        |_| Token::LangTag,
    )(input)
}

fn number(input: &str) -> IResult<&str, Token<'_>> {
    map(
        recognize(tuple((
            digit1,
            opt(pair(pchar('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |_| Token::Number,
    )(input)
}

/// Bare words (keywords, function names, `a`), prefixed names and
/// blank-node labels.
///
/// A trailing `.` belongs to the triple terminator, not to the name.
fn name(input: &str) -> IResult<&str, Token<'_>> {
    let raw_len = input.find(|c: char| !is_name_char(c)).unwrap_or(input.len());
    let head = input[..raw_len].trim_end_matches('.');
    let rest = &input[head.len()..];

    if let Some(after_colon) = rest.strip_prefix(':') {
        let local_len = after_colon
            .find(|c: char| !is_local_char(c))
            .unwrap_or(after_colon.len());
        let local = after_colon[..local_len].trim_end_matches('.');
        let rest = &after_colon[local.len()..];
        if head == "_" {
            return Ok((rest, Token::BlankNode));
        }
        return Ok((rest, Token::PrefixedName { prefix: head, local }));
    }

    if head.is_empty() || head.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )));
    }
    Ok((rest, Token::Word(head)))
}

fn punct(input: &str) -> IResult<&str, Token<'_>> {
    map(one_of("{}()[].,;*=!<>&|^/+-?"), Token::Punct)(input)
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        long_string,
        short_string,
        iri,
        var,
        lang_tag,
        number,
        name,
        punct,
    ))(input)
}

fn lex(text: &str) -> Result<Vec<Spanned<'_>>, QuerySyntaxError> {
    let mut tokens = Vec::new();
    let mut rest = text;
    loop {
        if let Ok((after, ())) = trivia(rest) {
            rest = after;
        }
        if rest.is_empty() {
            return Ok(tokens);
        }

        let start = text.len() - rest.len();
        match token(rest) {
            Ok((next, tok)) => {
                tokens.push(Spanned {
                    token: tok,
                    start,
                    end: text.len() - next.len(),
                });
                rest = next;
            }
            Err(_) => {
                let message = match rest.chars().next() {
                    Some('"') | Some('\'') => "unterminated string literal".to_string(),
                    Some(c) => format!("unexpected character `{c}`"),
                    None => "unexpected end of query".to_string(),
                };
                return Err(QuerySyntaxError::at(text, start, message));
            }
        }
    }
}

fn check_brackets(text: &str, tokens: &[Spanned<'_>]) -> Result<(), QuerySyntaxError> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    for t in tokens {
        let Token::Punct(c) = t.token else {
            continue;
        };
        match c {
            '{' | '(' | '[' => stack.push((c, t.start)),
            '}' | ')' | ']' => {
                let expected = match c {
                    '}' => '{',
                    ')' => '(',
                    _ => '[',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, _)) => {
                        return Err(QuerySyntaxError::at(
                            text,
                            t.start,
                            format!("`{c}` does not close `{open}`"),
                        ));
                    }
                    None => {
                        return Err(QuerySyntaxError::at(
                            text,
                            t.start,
                            format!("unbalanced `{c}`"),
                        ));
                    }
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some((open, at)) => Err(QuerySyntaxError::at(text, at, format!("unclosed `{open}`"))),
        None => Ok(()),
    }
}

// ============================================================================
// Query shape
// ============================================================================

fn is_word(token: &Token<'_>, keyword: &str) -> bool {
    matches!(token, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
}

fn matching_paren(tokens: &[Spanned<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        match t.token {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug)]
struct QueryShape {
    variables: Vec<String>,
    prefixes: BTreeMap<String, String>,
    implicit_prefixes: Vec<String>,
    subject_spans: Vec<(usize, usize)>,
}

fn analyse(text: &str) -> Result<QueryShape, QuerySyntaxError> {
    let tokens = lex(text)?;
    check_brackets(text, &tokens)?;

    let err_at = |i: usize, message: String| {
        let offset = tokens.get(i).map(|t| t.start).unwrap_or(text.len());
        QuerySyntaxError::at(text, offset, message)
    };

    // Prologue.
    let mut pos = 0;
    let mut prefixes = BTreeMap::new();
    loop {
        match tokens.get(pos).map(|t| t.token) {
            Some(t) if is_word(&t, "PREFIX") => {
                match (
                    tokens.get(pos + 1).map(|t| t.token),
                    tokens.get(pos + 2).map(|t| t.token),
                ) {
                    (Some(Token::PrefixedName { prefix, local: "" }), Some(Token::Iri(iri))) => {
                        prefixes.insert(prefix.to_string(), iri.to_string());
                        pos += 3;
                    }
                    _ => return Err(err_at(pos, "PREFIX expects `name: <iri>`".to_string())),
                }
            }
            Some(t) if is_word(&t, "BASE") => match tokens.get(pos + 1).map(|t| t.token) {
                Some(Token::Iri(_)) => pos += 2,
                _ => return Err(err_at(pos, "BASE expects an `<iri>`".to_string())),
            },
            _ => break,
        }
    }

    // Query form.
    let body_search_from = pos;
    match tokens.get(pos).map(|t| t.token) {
        Some(t) if is_word(&t, "SELECT") => pos += 1,
        Some(Token::Word(w))
            if ["ASK", "CONSTRUCT", "DESCRIBE"]
                .iter()
                .any(|f| w.eq_ignore_ascii_case(f)) =>
        {
            return Err(err_at(
                pos,
                format!(
                    "{} queries cannot feed attributes; use SELECT",
                    w.to_ascii_uppercase()
                ),
            ));
        }
        _ => return Err(err_at(pos, "expected a SELECT query".to_string())),
    }
    if let Some(t) = tokens.get(pos) {
        if is_word(&t.token, "DISTINCT") || is_word(&t.token, "REDUCED") {
            pos += 1;
        }
    }

    // Projection.
    let projection_start = pos;
    let mut variables: Vec<String> = Vec::new();
    let mut must_be_bound: Vec<(String, usize)> = Vec::new();
    let project = |name: &str, at: usize, variables: &mut Vec<String>| {
        if name == SUBJECT_VARIABLE {
            return Err(err_at(
                at,
                format!("?{SUBJECT_VARIABLE} is bound to the source URI and cannot be projected"),
            ));
        }
        if variables.iter().any(|v| v == name) {
            return Err(err_at(at, format!("variable ?{name} is projected twice")));
        }
        variables.push(name.to_string());
        Ok(())
    };
    loop {
        let Some(t) = tokens.get(pos) else {
            return Err(err_at(pos, "missing WHERE clause".to_string()));
        };
        match t.token {
            Token::Var(name) => {
                project(name, pos, &mut variables)?;
                must_be_bound.push((name.to_string(), pos));
                pos += 1;
            }
            Token::Punct('(') => {
                let close = matching_paren(&tokens, pos)
                    .ok_or_else(|| err_at(pos, "unclosed `(`".to_string()))?;
                let alias = if close >= pos + 4 {
                    match (tokens[close - 2].token, tokens[close - 1].token) {
                        (as_kw, Token::Var(name)) if is_word(&as_kw, "AS") => Some(name),
                        _ => None,
                    }
                } else {
                    None
                };
                let Some(name) = alias else {
                    return Err(err_at(
                        pos,
                        "projection expression must end with `AS ?name`".to_string(),
                    ));
                };
                project(name, close - 1, &mut variables)?;
                pos = close + 1;
            }
            Token::Punct('*') => {
                return Err(err_at(
                    pos,
                    "`SELECT *` is not supported; project attribute variables explicitly"
                        .to_string(),
                ));
            }
            Token::Punct('{') => break,
            ref w if is_word(w, "WHERE") || is_word(w, "FROM") => break,
            _ => return Err(err_at(pos, "unexpected token in SELECT projection".to_string())),
        }
    }
    if variables.is_empty() {
        return Err(err_at(
            projection_start,
            "SELECT projects no variables".to_string(),
        ));
    }

    // Dataset clauses.
    while tokens.get(pos).is_some_and(|t| is_word(&t.token, "FROM")) {
        pos += 1;
        if tokens.get(pos).is_some_and(|t| is_word(&t.token, "NAMED")) {
            pos += 1;
        }
        match tokens.get(pos).map(|t| t.token) {
            Some(Token::Iri(_)) | Some(Token::PrefixedName { .. }) => pos += 1,
            _ => return Err(err_at(pos, "FROM expects a graph IRI".to_string())),
        }
    }
    if tokens.get(pos).is_some_and(|t| is_word(&t.token, "WHERE")) {
        pos += 1;
    }
    if !matches!(tokens.get(pos).map(|t| t.token), Some(Token::Punct('{'))) {
        return Err(err_at(
            pos,
            "expected `{` to open the WHERE clause".to_string(),
        ));
    }
    let body = &tokens[pos..];

    // Prefix usage.
    let mut implicit_prefixes: Vec<String> = Vec::new();
    for (i, t) in tokens.iter().enumerate().skip(body_search_from) {
        if let Token::PrefixedName { prefix, .. } = t.token {
            if prefixes.contains_key(prefix) {
                continue;
            }
            if well_known_prefix(prefix).is_some() {
                if !implicit_prefixes.iter().any(|p| p == prefix) {
                    implicit_prefixes.push(prefix.to_string());
                }
                continue;
            }
            return Err(err_at(i, format!("undeclared prefix `{prefix}:`")));
        }
    }

    let subject_spans: Vec<(usize, usize)> = body
        .iter()
        .filter(|t| matches!(t.token, Token::Var(SUBJECT_VARIABLE)))
        .map(|t| (t.start, t.end))
        .collect();
    if subject_spans.is_empty() {
        return Err(err_at(
            pos,
            format!("WHERE clause never references ?{SUBJECT_VARIABLE}"),
        ));
    }

    for (name, at) in must_be_bound {
        let bound = body
            .iter()
            .any(|t| matches!(t.token, Token::Var(v) if v == name));
        if !bound {
            return Err(err_at(
                at,
                format!("projected variable ?{name} is not used in the WHERE clause"),
            ));
        }
    }

    Ok(QueryShape {
        variables,
        prefixes,
        implicit_prefixes,
        subject_spans,
    })
}

// ============================================================================
// AttributeQuery
// ============================================================================

/// A validated SPARQL `SELECT` feeding one attribute per projected variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeQuery {
    text: String,
    variables: Vec<String>,
    prefixes: BTreeMap<String, String>,
    implicit_prefixes: Vec<String>,
    subject_spans: Vec<(usize, usize)>,
}

impl AttributeQuery {
    pub fn parse(text: impl Into<String>) -> Result<Self, QuerySyntaxError> {
        let text = text.into();
        let shape = analyse(&text)?;
        Ok(Self {
            text,
            variables: shape.variables,
            prefixes: shape.prefixes,
            implicit_prefixes: shape.implicit_prefixes,
            subject_spans: shape.subject_spans,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Projected variables, in projection order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Prefixes declared in the query prologue.
    pub fn prefixes(&self) -> &BTreeMap<String, String> {
        &self.prefixes
    }

    pub fn projects(&self, variable: &str) -> bool {
        self.variables.iter().any(|v| v == variable)
    }

    /// Render the query with the subject variable replaced by `<uri>`.
    ///
    /// Well-known prefixes used without a declaration are declared up front.
    pub fn bind_subject(&self, uri: &str) -> Result<String, SubjectBindError> {
        if uri.is_empty() {
            return Err(SubjectBindError {
                uri: uri.to_string(),
                reason: "empty URI".to_string(),
            });
        }
        if let Some(bad) = uri.chars().find(|c| !is_iri_char(*c)) {
            return Err(SubjectBindError {
                uri: uri.to_string(),
                reason: format!("character {bad:?} is not allowed in an IRI"),
            });
        }

        let mut out = String::with_capacity(
            self.text.len() + self.subject_spans.len() * (uri.len() + 2) + 64,
        );
        for prefix in &self.implicit_prefixes {
            if let Some(iri) = well_known_prefix(prefix) {
                out.push_str(&format!("PREFIX {prefix}: <{iri}>\n"));
            }
        }
        let mut last = 0;
        for &(start, end) in &self.subject_spans {
            out.push_str(&self.text[last..start]);
            out.push('<');
            out.push_str(uri);
            out.push('>');
            last = end;
        }
        out.push_str(&self.text[last..]);
        Ok(out)
    }
}

impl FromStr for AttributeQuery {
    type Err = QuerySyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL_QUERY: &str = r#"
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
SELECT ?name
WHERE {
  ?subject rdfs:label ?name .
}
"#;

    #[test]
    fn parses_label_query() {
        let q = AttributeQuery::parse(LABEL_QUERY).expect("parse");
        assert_eq!(q.variables(), &["name".to_string()]);
        assert_eq!(
            q.prefixes().get("rdfs").map(String::as_str),
            Some("http://www.w3.org/2000/01/rdf-schema#")
        );
    }

    #[test]
    fn parses_projection_expressions_and_distinct() {
        let q = AttributeQuery::parse(
            "SELECT DISTINCT ?name (STR(?born) AS ?date_of_birth) WHERE { \
             ?subject wdt:P569 ?born ; rdfs:label ?name . }",
        )
        .expect("parse");
        assert_eq!(q.variables(), &["name".to_string(), "date_of_birth".to_string()]);
    }

    #[test]
    fn braces_inside_strings_and_comments_are_ignored() {
        let q = AttributeQuery::parse(
            "# a comment with { an open brace\n\
             SELECT ?name WHERE { ?subject rdfs:label ?name . FILTER(?name != \"}\") }",
        );
        assert!(q.is_ok(), "{q:?}");
    }

    #[test]
    fn rejects_select_star() {
        let err = AttributeQuery::parse("SELECT * WHERE { ?subject ?p ?o }").unwrap_err();
        assert!(err.message.contains("SELECT *"), "{err}");
    }

    #[test]
    fn rejects_non_select_forms() {
        let err = AttributeQuery::parse("ASK { ?subject ?p ?o }").unwrap_err();
        assert!(err.message.starts_with("ASK"), "{err}");
    }

    #[test]
    fn reports_unclosed_brace_position() {
        let err = AttributeQuery::parse("SELECT ?name\nWHERE {\n  ?subject rdfs:label ?name .\n")
            .unwrap_err();
        assert_eq!((err.line, err.column), (2, 7));
        assert!(err.message.contains("unclosed"), "{err}");
    }

    #[test]
    fn rejects_mismatched_brackets() {
        let err = AttributeQuery::parse("SELECT ?n WHERE { ?subject rdfs:label ?n ) }")
            .unwrap_err();
        assert!(err.message.contains("does not close"), "{err}");
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = AttributeQuery::parse(
            "SELECT ?n WHERE { ?subject rdfs:label ?n . FILTER(?n = \"open) }",
        )
        .unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn rejects_undeclared_prefix() {
        let err = AttributeQuery::parse("SELECT ?n WHERE { ?subject ex:name ?n }").unwrap_err();
        assert!(err.message.contains("`ex:`"), "{err}");
    }

    #[test]
    fn blank_node_labels_are_not_prefixes() {
        let q = AttributeQuery::parse(
            "SELECT ?name WHERE { ?subject gndo:preferredNameEntityForThePerson _:b0 . _:b0 gndo:surname ?name }",
        )
        .expect("parse");
        assert!(!q.prefixes().contains_key("_"));
        let bound = q.bind_subject("https://d-nb.info/gnd/118509861").expect("bind");
        assert!(bound.contains("_:b0 gndo:surname"));
        assert!(!bound.contains("PREFIX _:"));
    }

    #[test]
    fn requires_subject_reference() {
        let err = AttributeQuery::parse("SELECT ?n WHERE { ?x rdfs:label ?n }").unwrap_err();
        assert!(err.message.contains("?subject"), "{err}");
    }

    #[test]
    fn rejects_projecting_subject() {
        let err =
            AttributeQuery::parse("SELECT ?subject WHERE { ?subject rdfs:label ?n }").unwrap_err();
        assert!(err.message.contains("cannot be projected"), "{err}");
    }

    #[test]
    fn rejects_unbound_projection() {
        let err = AttributeQuery::parse("SELECT ?n ?m WHERE { ?subject rdfs:label ?n }")
            .unwrap_err();
        assert!(err.message.contains("?m"), "{err}");
    }

    #[test]
    fn bind_subject_replaces_variable_tokens_only() {
        let q = AttributeQuery::parse(
            "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\n\
             SELECT ?name WHERE { ?subject rdfs:label ?name . FILTER(?name != \"?subject\") }",
        )
        .expect("parse");
        let bound = q
            .bind_subject("http://www.wikidata.org/entity/Q123")
            .expect("bind");
        assert!(bound.contains("{ <http://www.wikidata.org/entity/Q123> rdfs:label ?name"));
        assert!(bound.contains("\"?subject\""));
    }

    #[test]
    fn bind_subject_declares_well_known_prefixes() {
        let q = AttributeQuery::parse("SELECT ?name WHERE { $subject rdfs:label ?name }")
            .expect("parse");
        let bound = q.bind_subject("https://d-nb.info/gnd/118509861").expect("bind");
        assert!(bound.starts_with("PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\n"));
        assert!(bound.contains("<https://d-nb.info/gnd/118509861> rdfs:label"));
    }

    #[test]
    fn bind_subject_rejects_non_iri_text() {
        let q = AttributeQuery::parse(LABEL_QUERY).expect("parse");
        assert!(q.bind_subject("http://example.org/a b").is_err());
        assert!(q.bind_subject("http://example.org/> } DROP ALL {").is_err());
        assert!(q.bind_subject("").is_err());
    }
}

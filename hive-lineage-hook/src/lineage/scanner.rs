//! Lexical statement scanner
//!
//! Recovers table-level lineage from HiveQL text without building a syntax
//! tree: the statement verb, the table written and the tables named after
//! `FROM`/`JOIN`. Literals, comments and backtick-quoted identifiers are
//! lexed properly so that keywords inside them are never mistaken for
//! structure.

use super::{LineageFacts, LineageParser, ParseError, TableRef};

/// Words that end a table reference instead of aliasing it
const CLAUSE_KEYWORDS: &[&str] = &[
    "ANTI", "AS", "CLUSTER", "CROSS", "DISTRIBUTE", "EXCEPT", "FULL", "GROUP", "HAVING", "INNER",
    "INSERT", "INTERSECT", "JOIN", "LATERAL", "LEFT", "LIMIT", "MINUS", "NATURAL", "ON", "ORDER",
    "OUTER", "RIGHT", "SELECT", "SEMI", "SORT", "TABLESAMPLE", "UNION", "USING", "WHERE",
    "WINDOW",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Identifier or keyword; `quoted` for backtick identifiers
    Word { text: String, quoted: bool },
    Dot,
    Comma,
    LParen,
    RParen,
    Literal,
    Other,
}

impl Token {
    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word { text, quoted: false } if text.eq_ignore_ascii_case(keyword))
    }

    fn word(&self) -> Option<&str> {
        match self {
            Token::Word { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Default [`LineageParser`]: keyword scanning over a lexed statement
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementScanner;

impl LineageParser for StatementScanner {
    fn parse(&self, query: &str) -> Result<LineageFacts, ParseError> {
        let tokens = lex(query)?;
        if !tokens.iter().any(|t| t.word().is_some()) {
            return Err(ParseError::new("query contains no statement"));
        }
        Ok(Statement::new(&tokens).facts())
    }
}

fn lex(query: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = query.chars().collect();
    let mut tokens = Vec::new();
    let mut depth: usize = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return Err(ParseError::new("unterminated block comment"));
                    }
                    if chars[i] == '*' && chars[i + 1] == '/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            '\'' | '"' => {
                i = skip_string(&chars, i)?;
                tokens.push(Token::Literal);
            }
            '`' => {
                let (text, next) = read_quoted_identifier(&chars, i)?;
                tokens.push(Token::Word { text, quoted: true });
                i = next;
            }
            '(' => {
                depth += 1;
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ParseError::new("unbalanced parentheses"))?;
                tokens.push(Token::RParen);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Word {
                    text: chars[start..i].iter().collect(),
                    quoted: false,
                });
            }
            _ => {
                tokens.push(Token::Other);
                i += 1;
            }
        }
    }

    if depth != 0 {
        return Err(ParseError::new("unbalanced parentheses"));
    }
    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Returns the index just past the closing quote
fn skip_string(chars: &[char], start: usize) -> Result<usize, ParseError> {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => {
                // doubled quote is an escaped quote
                if chars.get(i + 1) == Some(&quote) {
                    i += 2;
                } else {
                    return Ok(i + 1);
                }
            }
            _ => i += 1,
        }
    }
    Err(ParseError::new("unterminated string literal"))
}

fn read_quoted_identifier(chars: &[char], start: usize) -> Result<(String, usize), ParseError> {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == '`' {
            if chars.get(i + 1) == Some(&'`') {
                text.push('`');
                i += 2;
                continue;
            }
            return Ok((text, i + 1));
        }
        text.push(chars[i]);
        i += 1;
    }
    Err(ParseError::new("unterminated quoted identifier"))
}

struct Statement<'a> {
    tokens: &'a [Token],
    /// Names bound by a leading WITH clause
    ctes: Vec<String>,
    /// Index of the statement verb
    verb_at: usize,
}

impl<'a> Statement<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        let mut statement = Self {
            tokens,
            ctes: Vec::new(),
            verb_at: tokens.iter().position(|t| t.word().is_some()).unwrap_or(0),
        };
        if tokens[statement.verb_at].is_keyword("WITH") {
            statement.read_ctes();
        }
        statement
    }

    /// Collect `name AS (...)` bindings and move the verb past them
    fn read_ctes(&mut self) {
        let mut i = self.verb_at + 1;
        loop {
            let Some(name) = self.tokens.get(i).and_then(Token::word) else {
                return;
            };
            self.ctes.push(name.to_ascii_lowercase());
            i += 1;
            if self.at_keyword(i, "AS") {
                i += 1;
            }
            if self.tokens.get(i) != Some(&Token::LParen) {
                return;
            }
            i = self.skip_group(i);
            if self.tokens.get(i) == Some(&Token::Comma) {
                i += 1;
                continue;
            }
            if self.tokens.get(i).and_then(Token::word).is_some() {
                self.verb_at = i;
            }
            return;
        }
    }

    /// Given the index of an LParen, returns the index after its RParen
    fn skip_group(&self, open: usize) -> usize {
        let mut depth = 0usize;
        let mut i = open;
        while i < self.tokens.len() {
            match self.tokens[i] {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        i
    }

    fn at_keyword(&self, i: usize, keyword: &str) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_keyword(keyword))
    }

    /// Skip any of `keywords` starting at `i`
    fn skip_keywords(&self, mut i: usize, keywords: &[&str]) -> usize {
        while keywords.iter().any(|k| self.at_keyword(i, k)) {
            i += 1;
        }
        i
    }

    /// Read a possibly dotted name at `i`, returning it and the next index
    fn read_name(&self, i: usize) -> Option<(String, usize)> {
        let first = self.tokens.get(i)?.word()?;
        let mut name = first.to_string();
        let mut next = i + 1;
        while self.tokens.get(next) == Some(&Token::Dot) {
            match self.tokens.get(next + 1).and_then(Token::word) {
                Some(part) => {
                    name.push('.');
                    name.push_str(part);
                    next += 2;
                }
                None => break,
            }
        }
        Some((name, next))
    }

    fn find_keyword(&self, from: usize, keyword: &str) -> Option<usize> {
        (from..self.tokens.len()).find(|&i| self.at_keyword(i, keyword))
    }

    fn facts(&self) -> LineageFacts {
        let verb = self.tokens[self.verb_at]
            .word()
            .unwrap_or_default()
            .to_ascii_uppercase();

        let mut skip_from = None;
        let target = match verb.as_str() {
            "INSERT" | "FROM" => self.insert_target(self.verb_at),
            "CREATE" => {
                let i = self.skip_keywords(
                    self.verb_at + 1,
                    &["OR", "REPLACE", "EXTERNAL", "TEMPORARY", "TRANSACTIONAL", "MATERIALIZED"],
                );
                self.table_after(i, &["TABLE", "VIEW"], &["IF", "NOT", "EXISTS"])
            }
            "DROP" | "ALTER" | "TRUNCATE" => {
                self.table_after(self.verb_at + 1, &["TABLE", "VIEW"], &["IF", "EXISTS"])
            }
            "LOAD" => self
                .find_keyword(self.verb_at, "INTO")
                .and_then(|i| self.table_after(i + 1, &["TABLE"], &[])),
            "UPDATE" => self.read_name(self.verb_at + 1).map(|(n, _)| TableRef::parse(&n)),
            "DELETE" if self.at_keyword(self.verb_at + 1, "FROM") => {
                skip_from = Some(self.verb_at + 1);
                self.read_name(self.verb_at + 2).map(|(n, _)| TableRef::parse(&n))
            }
            _ => None,
        };

        let action = match verb.as_str() {
            // Hive's FROM-first multi-insert is still an INSERT
            "FROM" if target.is_some() => Some("INSERT".to_string()),
            // WITH bindings and no statement using them
            "WITH" => None,
            _ => Some(verb),
        };

        LineageFacts {
            action,
            target,
            sources: self.sources(skip_from),
        }
    }

    fn insert_target(&self, from: usize) -> Option<TableRef> {
        let insert = self.find_keyword(from, "INSERT")?;
        let i = self.skip_keywords(insert + 1, &["INTO", "OVERWRITE", "TABLE"]);
        self.read_name(i).map(|(name, _)| TableRef::parse(&name))
    }

    /// Expect one of `objects` at `i`, skip `filler`, then read the name
    fn table_after(&self, i: usize, objects: &[&str], filler: &[&str]) -> Option<TableRef> {
        if !objects.iter().any(|o| self.at_keyword(i, o)) {
            return None;
        }
        let i = self.skip_keywords(i + 1, filler);
        self.read_name(i).map(|(name, _)| TableRef::parse(&name))
    }

    fn sources(&self, skip_from: Option<usize>) -> Vec<TableRef> {
        let mut sources: Vec<TableRef> = Vec::new();
        for i in 0..self.tokens.len() {
            if Some(i) == skip_from || !(self.at_keyword(i, "FROM") || self.at_keyword(i, "JOIN")) {
                continue;
            }
            let mut at = i + 1;
            while let Some((source, next)) = self.read_source(at) {
                if !sources.contains(&source) {
                    sources.push(source);
                }
                // FROM a, b
                if self.tokens.get(next) == Some(&Token::Comma) {
                    at = next + 1;
                } else {
                    break;
                }
            }
        }
        sources
    }

    fn read_source(&self, i: usize) -> Option<(TableRef, usize)> {
        let (name, mut next) = self.read_name(i)?;
        if !name.contains('.') && self.ctes.contains(&name.to_ascii_lowercase()) {
            return None;
        }
        let mut table = TableRef::parse(&name);

        let explicit_alias = self.at_keyword(next, "AS");
        let alias_at = if explicit_alias { next + 1 } else { next };
        if let Some(Token::Word { text, quoted }) = self.tokens.get(alias_at) {
            let is_clause = !quoted && CLAUSE_KEYWORDS.iter().any(|k| text.eq_ignore_ascii_case(k));
            if explicit_alias || !is_clause {
                table.alias = Some(text.clone());
                next = alias_at + 1;
            }
        }
        Some((table, next))
    }
}

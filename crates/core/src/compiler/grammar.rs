//! Validating parser for compiled rule SQL.
//!
//! The synthesizer's templates are the only intended producers of rule SQL,
//! but nothing stored is trusted on faith: every statement is re-checked
//! against this restricted grammar before it is persisted or executed.
//!
//! The grammar admits a single SELECT statement, optionally prefixed by a
//! WITH clause, reading only the transactions/users/credit_cards tables (or
//! earlier CTEs). Aggregates and scalar functions come from a whitelist, the
//! statement must scope itself to `user_id = :user_id` and reference
//! `occurred_at`, placeholders must be declared, and nothing that smells of
//! DML/DDL, comments, or multiple statements gets through.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Param(String),
    Number(String),
    Str(String),
    Symbol(char),
    Cast, // "::"
}

const ALLOWED_TABLES: &[&str] = &["transactions", "users", "credit_cards"];

const TRANSACTION_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "card_id",
    "amount_cents",
    "currency",
    "merchant_name",
    "merchant_category",
    "merchant_city",
    "merchant_state",
    "merchant_country",
    "merchant_latitude",
    "merchant_longitude",
    "occurred_at",
    "status",
    "created_at",
];

// webhook_secret and webhook_url are deliberately absent: rule SQL must not
// be able to read delivery credentials.
const USER_COLUMNS: &[&str] = &[
    "id",
    "email",
    "home_city",
    "home_state",
    "home_country",
    "home_latitude",
    "home_longitude",
    "timezone",
    "credit_limit_cents",
    "current_balance_cents",
    "location_consent",
    "last_known_latitude",
    "last_known_longitude",
    "last_known_at",
    "created_at",
    "updated_at",
];

const CARD_COLUMNS: &[&str] = &[
    "id", "user_id", "last4", "network", "issuer", "is_active", "created_at",
];

const ALLOWED_FUNCTIONS: &[&str] = &[
    "sum",
    "avg",
    "count",
    "median",
    "percentile_cont",
    "coalesce",
    "abs",
    "lower",
    "upper",
    "round",
    "nullif",
    "greatest",
    "least",
    "extract",
    "date_part",
    "jsonb_build_object",
];

const KEYWORDS: &[&str] = &[
    "select", "with", "as", "from", "where", "and", "or", "not", "in", "is", "null", "true",
    "false", "case", "when", "then", "else", "end", "group", "by", "order", "asc", "desc",
    "limit", "join", "cross", "inner", "left", "on", "between", "like", "ilike", "distinct",
    "having", "within", "filter", "epoch", "float8", "numeric", "int8", "boolean", "text",
    "uuid", "timestamptz", "jsonb", "interval",
];

const FORBIDDEN: &[&str] = &[
    "insert",
    "update",
    "delete",
    "drop",
    "alter",
    "create",
    "grant",
    "revoke",
    "truncate",
    "copy",
    "execute",
    "call",
    "do",
    "vacuum",
    "set",
    "commit",
    "rollback",
    "savepoint",
    "listen",
    "notify",
    "into",
    "union",
    "returning",
    "pg_sleep",
    "pg_read_file",
    "pg_read_binary_file",
    "lo_import",
    "lo_export",
    "dblink",
];

fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '\'' => {
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\'')) => {
                            // doubled quote is an escaped quote
                            if matches!(chars.peek(), Some((_, '\''))) {
                                chars.next();
                                value.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some((_, ch)) => value.push(ch),
                        None => return Err("Unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(value));
            }
            ':' => {
                if matches!(chars.peek(), Some((_, ':'))) {
                    chars.next();
                    tokens.push(Token::Cast);
                    continue;
                }
                let mut name = String::new();
                while let Some((_, nc)) = chars.peek() {
                    if nc.is_ascii_alphanumeric() || *nc == '_' {
                        name.push(*nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err("Bare ':' outside a cast or placeholder".to_string());
                }
                tokens.push(Token::Param(name));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                ident.push(c);
                while let Some((_, nc)) = chars.peek() {
                    if nc.is_ascii_alphanumeric() || *nc == '_' {
                        ident.push(*nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident.to_lowercase()));
            }
            c if c.is_ascii_digit() => {
                let mut number = String::new();
                number.push(c);
                while let Some((_, nc)) = chars.peek() {
                    if nc.is_ascii_digit() || *nc == '.' {
                        number.push(*nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(number));
            }
            '-' => {
                if matches!(chars.peek(), Some((_, '-'))) {
                    return Err("SQL comments are not allowed".to_string());
                }
                tokens.push(Token::Symbol('-'));
            }
            '/' => {
                if matches!(chars.peek(), Some((_, '*'))) {
                    return Err("SQL comments are not allowed".to_string());
                }
                tokens.push(Token::Symbol('/'));
            }
            ';' => return Err("Multiple statements are not allowed".to_string()),
            '(' | ')' | ',' | '*' | '=' | '<' | '>' | '+' | '.' | '%' | '!' => {
                tokens.push(Token::Symbol(c));
            }
            other => return Err(format!("Unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

fn is_keyword(ident: &str) -> bool {
    KEYWORDS.contains(&ident)
}

fn columns_for_table(table: &str) -> Option<&'static [&'static str]> {
    match table {
        "transactions" => Some(TRANSACTION_COLUMNS),
        "users" => Some(USER_COLUMNS),
        "credit_cards" => Some(CARD_COLUMNS),
        _ => None,
    }
}

/// Collects CTE names: `WITH a AS ( ... ), b AS ( ... ) SELECT`.
fn collect_cte_names(tokens: &[Token]) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut i = 0;
    let starts_with_with = matches!(tokens.first(), Some(Token::Ident(w)) if w == "with");
    if !starts_with_with {
        return names;
    }
    i += 1;
    let mut depth = 0usize;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Symbol('(') => depth += 1,
            Token::Symbol(')') => depth = depth.saturating_sub(1),
            Token::Ident(name) if depth == 0 && !is_keyword(name) => {
                // name AS ( ... )
                if matches!(tokens.get(i + 1), Some(Token::Ident(a)) if a == "as")
                    && matches!(tokens.get(i + 2), Some(Token::Symbol('(')))
                {
                    names.insert(name.clone());
                }
            }
            Token::Ident(kw) if depth == 0 && kw == "select" => break,
            _ => {}
        }
        i += 1;
    }
    names
}

/// Walks FROM/JOIN lists collecting (target, alias) pairs. Targets must be
/// whitelisted tables or previously-declared CTEs.
fn collect_from_targets(
    tokens: &[Token],
    cte_names: &HashSet<String>,
) -> Result<HashMap<String, String>, String> {
    // alias (or table name itself) -> underlying table/CTE name
    let mut aliases = HashMap::new();
    let mut i = 0;
    while i < tokens.len() {
        let is_from = matches!(&tokens[i], Token::Ident(w) if w == "from");
        let is_join = matches!(&tokens[i], Token::Ident(w) if w == "join");
        if !(is_from || is_join) {
            i += 1;
            continue;
        }
        // parse a comma-separated target list (FROM a x, b y); JOIN has one
        loop {
            i += 1;
            let Some(Token::Ident(target)) = tokens.get(i) else {
                // e.g. FROM ( subquery ) is not part of the grammar
                return Err("FROM must reference a named table or CTE".to_string());
            };
            let target = target.clone();
            if !ALLOWED_TABLES.contains(&target.as_str()) && !cte_names.contains(&target) {
                return Err(format!("Table '{}' is not allowed in rule SQL", target));
            }
            aliases.insert(target.clone(), target.clone());

            // optional AS, optional alias
            let mut j = i + 1;
            if matches!(tokens.get(j), Some(Token::Ident(a)) if a == "as") {
                j += 1;
            }
            if let Some(Token::Ident(alias)) = tokens.get(j) {
                if !is_keyword(alias) {
                    aliases.insert(alias.clone(), target.clone());
                    i = j;
                }
            }
            if matches!(tokens.get(i + 1), Some(Token::Symbol(','))) && is_from {
                i += 1;
                continue;
            }
            break;
        }
    }
    Ok(aliases)
}

/// Output aliases introduced by `expr AS name` in select lists.
fn collect_output_aliases(tokens: &[Token]) -> HashSet<String> {
    let mut names = HashSet::new();
    for (i, token) in tokens.iter().enumerate() {
        if matches!(token, Token::Ident(a) if a == "as") {
            if let Some(Token::Ident(name)) = tokens.get(i + 1) {
                if !is_keyword(name) {
                    names.insert(name.clone());
                }
            }
        }
    }
    names
}

fn check_user_scope(tokens: &[Token]) -> bool {
    // user_id = :user_id, possibly qualified (t.user_id)
    for (i, token) in tokens.iter().enumerate() {
        if matches!(token, Token::Ident(c) if c == "user_id")
            && matches!(tokens.get(i + 1), Some(Token::Symbol('=')))
            && matches!(tokens.get(i + 2), Some(Token::Param(p)) if p == "user_id")
        {
            return true;
        }
    }
    false
}

/// Validates one rule statement against the restricted grammar. `declared`
/// is the set of placeholder names the rule's params schema announces.
pub fn validate(sql: &str, declared: &[String]) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    let tokens = match tokenize(sql) {
        Ok(tokens) => tokens,
        Err(e) => return Err(vec![e]),
    };

    match tokens.first() {
        Some(Token::Ident(first)) if first == "select" || first == "with" => {}
        _ => problems.push("Statement must start with SELECT or WITH".to_string()),
    }

    for token in &tokens {
        if let Token::Ident(ident) = token {
            if FORBIDDEN.contains(&ident.as_str()) {
                problems.push(format!("Keyword '{}' is not allowed in rule SQL", ident));
            }
        }
    }
    if !problems.is_empty() {
        return Err(problems);
    }

    let cte_names = collect_cte_names(&tokens);
    let aliases = match collect_from_targets(&tokens, &cte_names) {
        Ok(aliases) => aliases,
        Err(e) => {
            problems.push(e);
            return Err(problems);
        }
    };
    let output_aliases = collect_output_aliases(&tokens);

    if !check_user_scope(&tokens) {
        problems.push("WHERE must scope the query with user_id = :user_id".to_string());
    }
    if !tokens
        .iter()
        .any(|t| matches!(t, Token::Ident(c) if c == "occurred_at"))
    {
        problems.push("Rule SQL must constrain or reference occurred_at".to_string());
    }

    let declared_set: HashSet<&str> = declared.iter().map(|s| s.as_str()).collect();
    for token in &tokens {
        if let Token::Param(name) = token {
            if !declared_set.contains(name.as_str()) {
                problems.push(format!("Placeholder :{} is not declared", name));
            }
        }
    }

    // function whitelist and column catalog
    let all_columns: HashSet<&str> = TRANSACTION_COLUMNS
        .iter()
        .chain(USER_COLUMNS.iter())
        .chain(CARD_COLUMNS.iter())
        .copied()
        .collect();

    let mut i = 0;
    while i < tokens.len() {
        if let Token::Ident(ident) = &tokens[i] {
            let called = matches!(tokens.get(i + 1), Some(Token::Symbol('(')));
            let qualifier = i >= 2
                && matches!(tokens.get(i - 1), Some(Token::Symbol('.')));
            let qualifies_next = matches!(tokens.get(i + 1), Some(Token::Symbol('.')));

            if called {
                if !ALLOWED_FUNCTIONS.contains(&ident.as_str()) && !is_keyword(ident) {
                    problems.push(format!("Function '{}' is not allowed", ident));
                }
            } else if qualifier {
                // alias.column: resolve the alias back to its table
                if let Some(Token::Ident(base)) = tokens.get(i - 2) {
                    if let Some(table) = aliases.get(base) {
                        if let Some(columns) = columns_for_table(table) {
                            if !columns.contains(&ident.as_str()) {
                                problems.push(format!(
                                    "Column '{}' does not exist on '{}'",
                                    ident, table
                                ));
                            }
                        }
                        // CTE outputs are checked structurally, not by name
                    }
                }
            } else if !is_keyword(ident)
                && !qualifies_next
                && !aliases.contains_key(ident)
                && !cte_names.contains(ident)
                && !output_aliases.contains(ident)
                && !all_columns.contains(ident.as_str())
            {
                problems.push(format!("Unknown identifier '{}'", ident));
            }
        }
        i += 1;
    }

    if problems.is_empty() {
        Ok(())
    } else {
        problems.sort();
        problems.dedup();
        Err(problems)
    }
}

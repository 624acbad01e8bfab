//! T-SQL text helpers.

use crate::catalog::QualifiedName;

/// Words that must be bracketed when used as identifiers.
const RESERVED: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "BACKUP", "BEGIN", "BETWEEN", "BREAK",
    "BY", "CASCADE", "CASE", "CHECK", "CLOSE", "CLUSTERED", "COLUMN", "COMMIT", "CONSTRAINT",
    "CONTINUE", "CREATE", "CROSS", "CURRENT", "CURSOR", "DATABASE", "DECLARE", "DEFAULT",
    "DELETE", "DENY", "DESC", "DISTINCT", "DROP", "ELSE", "END", "ESCAPE", "EXCEPT", "EXEC",
    "EXECUTE", "EXISTS", "EXIT", "FETCH", "FILE", "FOR", "FOREIGN", "FROM", "FULL", "FUNCTION",
    "GOTO", "GRANT", "GROUP", "HAVING", "IDENTITY", "IF", "IN", "INDEX", "INNER", "INSERT",
    "INTERSECT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "MERGE", "NOT", "NULL", "OF",
    "OFF", "ON", "OPEN", "OPTION", "OR", "ORDER", "OUTER", "OVER", "PERCENT", "PIVOT", "PLAN",
    "PRIMARY", "PRINT", "PROC", "PROCEDURE", "PUBLIC", "RETURN", "REVOKE", "RIGHT", "ROLLBACK",
    "ROWCOUNT", "RULE", "SCHEMA", "SELECT", "SET", "SOME", "TABLE", "THEN", "TO", "TOP", "TRAN",
    "TRANSACTION", "TRIGGER", "TRUNCATE", "UNION", "UNIQUE", "UPDATE", "USE", "USER", "VALUES",
    "VIEW", "WHEN", "WHERE", "WHILE", "WITH",
];

/// Quote an identifier only when it needs it.
pub fn quote_ident(ident: &str) -> String {
    let mut chars = ident.chars();
    let regular = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => chars
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '#' | '$')),
        _ => false,
    };
    if regular && !RESERVED.iter().any(|r| r.eq_ignore_ascii_case(ident)) {
        ident.to_string()
    } else {
        format!("[{}]", ident.replace(']', "]]"))
    }
}

/// `schema.name`, quoted as needed.
pub fn qualified(name: &QualifiedName) -> String {
    format!("{}.{}", quote_ident(&name.schema), quote_ident(&name.name))
}

/// `alias.column`.
pub fn column(alias: &str, name: &str) -> String {
    format!("{}.{}", alias, quote_ident(name))
}

/// `l.a = r.x AND l.b = r.y` over paired column lists.
pub fn join_condition(
    left: &str,
    left_columns: &[String],
    right: &str,
    right_columns: &[String],
) -> String {
    left_columns
        .iter()
        .zip(right_columns)
        .map(|(l, r)| format!("{} = {}", column(left, l), column(right, r)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `N'...'` literal.
pub fn nstring(text: &str) -> String {
    format!("N'{}'", text.replace('\'', "''"))
}

/// Temp table name derived from a table name.
pub fn temp_table(prefix: &str, table: &QualifiedName) -> String {
    let sanitize = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    };
    format!(
        "#{}_{}_{}",
        prefix,
        sanitize(&table.schema),
        sanitize(&table.name)
    )
}

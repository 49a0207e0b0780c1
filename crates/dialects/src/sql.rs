//! SQL text helpers for PostgreSQL sources.

/// Quotes `value` as a SQL string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Appends `CASCADE` to a single DDL statement, keeping one trailing `;`.
///
/// ```
/// assert_eq!(dialects::sql::cascade_sql("drop table t;"), "drop table t CASCADE;");
/// assert_eq!(dialects::sql::cascade_sql("drop table t"), "drop table t CASCADE;");
/// ```
pub fn cascade_sql(sql: &str) -> String {
    let trimmed = sql.trim_end();
    let statement = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
    format!("{statement} CASCADE;")
}

/// Returns `true` if `text` names a zero-argument SQL function call such as
/// `now()`, as used for column defaults.
pub fn is_sql_function(text: &str) -> bool {
    text.lines()
        .any(|line| line.len() > 2 && line.ends_with("()"))
}

/// Builds the planner-estimate row count query for `schema.table`.
///
/// Reads `pg_class.reltuples`, which is cheap but only as fresh as the last
/// `ANALYZE`.
pub fn estimate_count_query(schema: &str, table: &str) -> String {
    let schema = quote_literal(schema);
    let table = quote_literal(table);
    format!(
        "SELECT reltuples::BIGINT FROM pg_class \
         WHERE oid = (quote_ident({schema}) || '.' || quote_ident({table}))::regclass::oid \
         AND relname = {table};"
    )
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::trailing_semicolon("drop table t;", "drop table t CASCADE;")]
    #[case::no_semicolon("drop table t", "drop table t CASCADE;")]
    #[case::semicolon_then_newline("drop table t;\n", "drop table t CASCADE;")]
    #[case::space_before_semicolon("drop table t ;", "drop table t CASCADE;")]
    fn cascade_is_appended_once(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(cascade_sql(input), expected);
    }

    #[rstest]
    #[case::call("now()", true)]
    #[case::qualified("public.gen_random_uuid()", true)]
    #[case::literal("'now()'::text", false)]
    #[case::bare_parens("()", false)]
    #[case::plain_value("42", false)]
    fn detects_zero_argument_functions(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(is_sql_function(text), expected);
    }

    #[test]
    fn literals_escape_single_quotes() {
        assert_eq!(quote_literal("o'neil"), "'o''neil'");
    }

    #[test]
    fn estimate_query_quotes_identifiers() {
        let sql = estimate_count_query("public", "users");
        assert!(sql.contains("quote_ident('public') || '.' || quote_ident('users')"));
        assert!(sql.ends_with("AND relname = 'users';"));
    }
}

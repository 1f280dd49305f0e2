use anyhow::{bail, Context, Result};
use sqlparser::ast::Statement;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

/// Parses `;`-separated MySQL statements. Blank input is an error rather
/// than an empty batch.
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>> {
    let statements = Parser::parse_sql(&MySqlDialect {}, sql)
        .with_context(|| format!("failed to parse sql: {sql}"))?;
    if statements.is_empty() {
        bail!("no statements in sql text");
    }
    Ok(statements)
}

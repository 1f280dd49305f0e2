use cdbpool_core::error::CdbError;
use sqlparser::ast::{
    Assignment, Expr, FromTable, GroupByExpr, Ident, Join, ObjectName, OrderByExpr, Query,
    SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
};
use std::fmt;

#[derive(Debug, Clone)]
pub enum Plan {
    Update(UpdateStmt),
    Insert(InsertStmt),
    Delete(DeleteStmt),
    Select(SelectStmt),
}

/// Logical form of a filter clause. Only `Where` is a plain conjunctive filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Where,
    Having,
}

impl FilterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Where => "where",
            FilterKind::Having => "having",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub kind: FilterKind,
    pub expr: Expr,
}

impl Filter {
    pub fn where_clause(expr: Expr) -> Self {
        Self {
            kind: FilterKind::Where,
            expr,
        }
    }

    pub fn having_clause(expr: Expr) -> Self {
        Self {
            kind: FilterKind::Having,
            expr,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str().to_uppercase(), self.expr)
    }
}

/// Target table, with the database qualifier split off when the statement
/// names one (`billing.users`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub db_name: Option<Ident>,
    pub name: Ident,
}

impl TableName {
    fn lower(name: &ObjectName) -> Result<Self, CdbError> {
        match name.0.as_slice() {
            [table] => Ok(Self {
                db_name: None,
                name: table.clone(),
            }),
            [db, table] => Ok(Self {
                db_name: Some(db.clone()),
                name: table.clone(),
            }),
            _ => Err(unsupported(format!("table name `{name}` not supported"))),
        }
    }

    /// Unquoted database qualifier, if any.
    pub fn db(&self) -> Option<&str> {
        self.db_name.as_ref().map(|db| db.value.as_str())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(db) = &self.db_name {
            write!(f, "{db}.")?;
        }
        write!(f, "{}", self.name)
    }
}

/// `order_by` and `limit` are never filled by lowering: the MySQL dialect
/// fails to parse `UPDATE ... ORDER BY` and `UPDATE ... LIMIT`, so only trees
/// built directly carry them.
#[derive(Debug, Clone)]
pub struct UpdateStmt {
    pub table: TableName,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub table: TableName,
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Query(Box<Query>),
    DefaultValues,
}

#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table: TableName,
    pub columns: Vec<Ident>,
    pub source: InsertSource,
    pub on_duplicate: bool,
}

#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub table: TableName,
    pub joins: Vec<Join>,
    pub projection: Vec<SelectItem>,
    pub distinct: bool,
    pub filter: Option<Filter>,
    pub group_by: Vec<Expr>,
    pub having: Option<Filter>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

fn unsupported(msg: impl Into<String>) -> CdbError {
    CdbError::StatementUnsupported(msg.into())
}

pub fn plan_statement(stmt: &Statement) -> Result<Plan, CdbError> {
    match stmt {
        Statement::Update {
            table,
            assignments,
            from,
            selection,
            returning,
            ..
        } => {
            if from.is_some() {
                return Err(unsupported("`update ... from` not supported"));
            }
            if returning.is_some() {
                return Err(unsupported("`returning` not supported"));
            }
            Ok(Plan::Update(UpdateStmt {
                table: single_table(table)?,
                assignments: assignments.clone(),
                filter: selection.clone().map(Filter::where_clause),
                order_by: Vec::new(),
                limit: None,
            }))
        }
        Statement::Delete {
            tables,
            from,
            using,
            selection,
            order_by,
            limit,
            ..
        } => {
            if !tables.is_empty() || using.is_some() {
                return Err(unsupported("multi-table delete not supported"));
            }
            let relation = first_from_table(from)?;
            Ok(Plan::Delete(DeleteStmt {
                table: single_table(relation)?,
                filter: selection.clone().map(Filter::where_clause),
                order_by: order_by.clone(),
                limit: limit.clone(),
            }))
        }
        Statement::Insert {
            table_name,
            columns,
            source,
            on,
            ..
        } => {
            let source = match source {
                None => InsertSource::DefaultValues,
                Some(query) => match &*query.body {
                    SetExpr::Values(values)
                        if query.order_by.is_empty() && query.limit.is_none() =>
                    {
                        InsertSource::Values(values.rows.clone())
                    }
                    _ => InsertSource::Query(query.clone()),
                },
            };
            Ok(Plan::Insert(InsertStmt {
                table: TableName::lower(table_name)?,
                columns: columns.clone(),
                source,
                on_duplicate: on.is_some(),
            }))
        }
        Statement::Query(query) => plan_query(query).map(Plan::Select),
        other => Err(unsupported(format!(
            "statement kind not supported: {}",
            statement_keyword(other)
        ))),
    }
}

fn plan_query(query: &Query) -> Result<SelectStmt, CdbError> {
    if query.with.is_some() {
        return Err(unsupported("`with` not supported"));
    }
    let select = match &*query.body {
        SetExpr::Select(select) => select,
        _ => return Err(unsupported("only plain `select` queries are supported")),
    };
    if select.from.len() != 1 {
        return Err(unsupported("select must read exactly one table"));
    }
    let relation = &select.from[0];
    let table = match &relation.relation {
        TableFactor::Table { name, .. } => TableName::lower(name)?,
        _ => return Err(unsupported("select source must be a table")),
    };
    let group_by = match &select.group_by {
        GroupByExpr::All => return Err(unsupported("`group by all` not supported")),
        GroupByExpr::Expressions(exprs) => exprs.clone(),
    };
    Ok(SelectStmt {
        table,
        joins: relation.joins.clone(),
        projection: select.projection.clone(),
        distinct: select.distinct.is_some(),
        filter: select.selection.clone().map(Filter::where_clause),
        group_by,
        having: select.having.clone().map(Filter::having_clause),
        order_by: query.order_by.clone(),
        limit: query.limit.clone(),
        offset: query.offset.as_ref().map(|o| o.value.clone()),
    })
}

fn single_table(rel: &TableWithJoins) -> Result<TableName, CdbError> {
    if !rel.joins.is_empty() {
        return Err(unsupported("joins not supported"));
    }
    match &rel.relation {
        TableFactor::Table { name, .. } => TableName::lower(name),
        _ => Err(unsupported("target must be a table")),
    }
}

fn first_from_table(from: &FromTable) -> Result<&TableWithJoins, CdbError> {
    let relations = match from {
        FromTable::WithFromKeyword(relations) => relations,
        FromTable::WithoutKeyword(relations) => relations,
    };
    match relations.as_slice() {
        [only] => Ok(only),
        _ => Err(unsupported("delete must target exactly one table")),
    }
}

fn statement_keyword(stmt: &Statement) -> String {
    stmt.to_string()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

struct Separated<'a, T>(&'a [T], &'static str);

impl<T: fmt::Display> fmt::Display for Separated<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, item) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(self.1)?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

fn write_tail(
    f: &mut fmt::Formatter<'_>,
    filter: Option<&Filter>,
    order_by: &[OrderByExpr],
    limit: Option<&Expr>,
) -> fmt::Result {
    if let Some(filter) = filter {
        write!(f, " {filter}")?;
    }
    if !order_by.is_empty() {
        write!(f, " ORDER BY {}", Separated(order_by, ", "))?;
    }
    if let Some(limit) = limit {
        write!(f, " LIMIT {limit}")?;
    }
    Ok(())
}

impl fmt::Display for UpdateStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UPDATE {} SET {}",
            self.table,
            Separated(&self.assignments, ", ")
        )?;
        write_tail(f, self.filter.as_ref(), &self.order_by, self.limit.as_ref())
    }
}

impl fmt::Display for DeleteStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DELETE FROM {}", self.table)?;
        write_tail(f, self.filter.as_ref(), &self.order_by, self.limit.as_ref())
    }
}

impl fmt::Display for InsertStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INSERT INTO {}", self.table)?;
        if !self.columns.is_empty() {
            write!(f, " ({})", Separated(&self.columns, ", "))?;
        }
        match &self.source {
            InsertSource::Values(rows) => {
                f.write_str(" VALUES ")?;
                for (idx, row) in rows.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "({})", Separated(row, ", "))?;
                }
                Ok(())
            }
            InsertSource::Query(query) => write!(f, " {query}"),
            InsertSource::DefaultValues => f.write_str(" DEFAULT VALUES"),
        }
    }
}

impl fmt::Display for SelectStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write!(f, "{} FROM {}", Separated(&self.projection, ", "), self.table)?;
        for join in &self.joins {
            write!(f, "{join}")?;
        }
        if let Some(filter) = &self.filter {
            write!(f, " {filter}")?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", Separated(&self.group_by, ", "))?;
        }
        if let Some(having) = &self.having {
            write!(f, " {having}")?;
        }
        write_tail(f, None, &self.order_by, self.limit.as_ref())?;
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{plan_statement, FilterKind, InsertSource, Plan};
    use crate::parser::parse_sql;
    use cdbpool_core::error::CdbError;

    fn plan(sql: &str) -> Result<Plan, CdbError> {
        let stmts = parse_sql(sql).expect("parse");
        plan_statement(&stmts[0])
    }

    #[test]
    fn update_lowers_with_where_filter() {
        match plan("UPDATE users SET name = 'bob', age = 3 WHERE id = 1").expect("plan") {
            Plan::Update(stmt) => {
                assert_eq!(stmt.table.to_string(), "users");
                assert_eq!(stmt.assignments.len(), 2);
                let filter = stmt.filter.expect("filter");
                assert_eq!(filter.kind, FilterKind::Where);
                assert_eq!(filter.expr.to_string(), "id = 1");
                assert!(stmt.order_by.is_empty());
                assert!(stmt.limit.is_none());
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn update_renders_back_to_sql() {
        let Plan::Update(stmt) = plan("UPDATE users SET name = 'bob' WHERE id = 1").expect("plan")
        else {
            panic!("expected update");
        };
        assert_eq!(stmt.to_string(), "UPDATE users SET name = 'bob' WHERE id = 1");
    }

    #[test]
    fn delete_keeps_order_and_limit() {
        let Plan::Delete(stmt) =
            plan("DELETE FROM users WHERE id > 1 ORDER BY id LIMIT 10").expect("plan")
        else {
            panic!("expected delete");
        };
        assert_eq!(stmt.order_by.len(), 1);
        assert_eq!(stmt.limit.map(|l| l.to_string()), Some("10".to_string()));
    }

    #[test]
    fn insert_values_and_query_sources() {
        let Plan::Insert(stmt) =
            plan("INSERT INTO users (id, name) VALUES (1, 'a'), (2, 'b')").expect("plan")
        else {
            panic!("expected insert");
        };
        assert_eq!(stmt.columns.len(), 2);
        assert!(matches!(&stmt.source, InsertSource::Values(rows) if rows.len() == 2));
        assert!(!stmt.on_duplicate);

        let Plan::Insert(stmt) =
            plan("INSERT INTO users (id) SELECT id FROM old_users").expect("plan")
        else {
            panic!("expected insert");
        };
        assert!(matches!(stmt.source, InsertSource::Query(_)));
    }

    #[test]
    fn select_lowers_clauses() {
        let Plan::Select(stmt) = plan(
            "SELECT id, name FROM users WHERE age > 3 ORDER BY id DESC LIMIT 5 OFFSET 10",
        )
        .expect("plan") else {
            panic!("expected select");
        };
        assert_eq!(stmt.table.to_string(), "users");
        assert_eq!(stmt.projection.len(), 2);
        assert!(stmt.joins.is_empty());
        assert_eq!(stmt.offset.map(|o| o.to_string()), Some("10".to_string()));
        assert!(stmt.having.is_none());
    }

    #[test]
    fn select_having_is_a_having_filter() {
        let Plan::Select(stmt) =
            plan("SELECT region, COUNT(*) FROM sales GROUP BY region HAVING COUNT(*) > 1")
                .expect("plan")
        else {
            panic!("expected select");
        };
        assert_eq!(stmt.having.map(|h| h.kind), Some(FilterKind::Having));
        assert_eq!(stmt.group_by.len(), 1);
    }

    #[test]
    fn qualified_table_splits_off_database() {
        let Plan::Delete(stmt) = plan("DELETE FROM billing.users WHERE id = 1").expect("plan")
        else {
            panic!("expected delete");
        };
        assert_eq!(stmt.table.db(), Some("billing"));
        assert_eq!(stmt.table.name.value, "users");
        assert_eq!(stmt.to_string(), "DELETE FROM billing.users WHERE id = 1");

        let err = plan("UPDATE a.b.c SET x = 1 WHERE id = 1").expect_err("three parts");
        assert!(matches!(err, CdbError::StatementUnsupported(_)));
    }

    #[test]
    fn ddl_is_unsupported() {
        let err = plan("CREATE TABLE t (id INT)").expect_err("ddl");
        assert!(matches!(err, CdbError::StatementUnsupported(ref msg) if msg.contains("CREATE")));
    }

    #[test]
    fn update_with_join_is_unsupported() {
        let err = plan("UPDATE a JOIN b ON a.id = b.id SET a.x = 1 WHERE a.id = 1")
            .expect_err("join");
        assert!(matches!(err, CdbError::StatementUnsupported(_)));
    }
}

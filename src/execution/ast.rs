//! AST node types produced by the parser and consumed by the planner and
//! executor (§4.7).
//!
//! Grounded on the reference implementation's statement/expression shapes
//! (`ast_nodes.py` is a near-empty base class; the real node set is
//! inferred from how `parser.py`/`executor.py`/`planner.py` construct and
//! match on them).

use crate::catalog::{ColumnDef, Value};

#[derive(Debug, Clone)]
pub enum Stmt {
    Explain(Box<Stmt>),
    CreateTable(CreateTableStmt),
    DropTable(DropTableStmt),
    AlterTable(AlterTableStmt),
    CreateIndex(CreateIndexStmt),
    DropIndex(DropIndexStmt),
    Insert(InsertStmt),
    Select(SelectStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
}

#[derive(Debug, Clone)]
pub struct CreateTableStmt {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone)]
pub struct DropTableStmt {
    pub table_name: String,
}

#[derive(Debug, Clone)]
pub struct AlterTableStmt {
    pub table_name: String,
    pub add_column: ColumnDef,
}

#[derive(Debug, Clone)]
pub struct CreateIndexStmt {
    pub index_name: String,
    pub table_name: String,
    pub column_name: String,
}

#[derive(Debug, Clone)]
pub struct DropIndexStmt {
    pub index_name: String,
}

#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table_name: String,
    pub values: Vec<Value>,
}

/// A single entry of a `SELECT` list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Column(String),
    Aggregate(AggFunc, AggArg),
}

impl std::fmt::Display for SelectItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectItem::Wildcard => write!(f, "*"),
            SelectItem::Column(name) => write!(f, "{name}"),
            SelectItem::Aggregate(func, arg) => write!(f, "{func}({arg})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl std::fmt::Display for AggFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggArg {
    Star,
    Column(String),
}

impl std::fmt::Display for AggArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggArg::Star => write!(f, "*"),
            AggArg::Column(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table_name: String,
    pub alias: Option<String>,
    pub on: Expr,
}

#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub items: Vec<SelectItem>,
    pub table_name: String,
    /// A bare alias on the driving table, e.g. `FROM users u` (§8 scenario 6
    /// uses this form without `AS`, unlike the join side's `[AS name]`).
    pub table_alias: Option<String>,
    pub join: Option<JoinClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<String>,
    pub having: Option<Expr>,
    pub order_by: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct UpdateStmt {
    pub table_name: String,
    pub assignments: Vec<(String, Value)>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub table_name: String,
    pub where_clause: Option<Expr>,
}

/// A scalar expression: a literal, a (possibly qualified) column reference,
/// or a binary operation. Used for `WHERE`, `HAVING` and join `ON` clauses.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Column(String),
    BinaryOp(Box<Expr>, BinOp, Box<Expr>),
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal(Value::Int(v)) => write!(f, "{v}"),
            Expr::Literal(Value::Float(v)) => write!(f, "{v}"),
            Expr::Literal(Value::Text(v)) => write!(f, "'{v}'"),
            Expr::Column(name) => write!(f, "{name}"),
            Expr::BinaryOp(left, op, right) => write!(f, "{left} {op} {right}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Eq => "=",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        };
        write!(f, "{s}")
    }
}

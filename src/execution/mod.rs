//! SQL tokenizer, parser, planner, executor and the `Database` facade
//! (§4.7-§4.10).
//!
//! # Pipeline
//! ```text
//! SQL text --tokenizer--> tokens --parser--> AST --planner--> Plan
//!                                              AST --executor--> QueryResult
//! ```
//! `Database` (facade.rs) ties the pipeline to a [`crate::catalog::Catalog`]
//! and a [`crate::concurrency::TransactionalStore`], mirroring the
//! reference implementation's collapsed `SQLDatabase` surface.

mod ast;
mod executor;
mod facade;
mod planner;
mod parser;
mod tokenizer;

pub use ast::{
    AggArg, AggFunc, AlterTableStmt, BinOp, CreateIndexStmt, CreateTableStmt, DeleteStmt,
    DropIndexStmt, DropTableStmt, Expr, InsertStmt, JoinClause, JoinType, SelectItem, SelectStmt,
    Stmt, UpdateStmt,
};
pub use executor::{Executor, QueryResult};
pub use facade::{Database, DatabaseStats};
pub use parser::parse_sql;
pub use planner::{FilterNode, LimitNode, Plan, QueryPlanner, ScanNode, SortNode};
pub use tokenizer::{tokenize, Token, TokenKind};

//! Cost-based query planner: AST → plan tree (§4.8).
//!
//! Grounded on `planner.py`'s `QueryPlanner`: same cost constants, same
//! selectivity heuristics, same wrapping order (scan, then filter, then
//! sort, then limit, then project).

use std::sync::Arc;

use crate::catalog::{Catalog, Value};
use crate::common::Result;

use super::ast::{BinOp, Expr, SelectStmt};

const COST_TABLE_SCAN_PER_ROW: f64 = 1.0;
const COST_INDEX_SEEK: f64 = 10.0;
const COST_INDEX_SCAN_PER_ROW: f64 = 0.5;
const COST_FILTER_PER_ROW: f64 = 0.1;
const COST_SORT_PER_ROW: f64 = 2.0;

/// Access method chosen for the driving table of a `SELECT`.
#[derive(Debug, Clone)]
pub enum ScanNode {
    TableScan {
        table: String,
        cost: f64,
        estimated_rows: u64,
    },
    IndexScan {
        table: String,
        index: String,
        column: String,
        cost: f64,
        estimated_rows: u64,
    },
}

impl ScanNode {
    pub fn table(&self) -> &str {
        match self {
            ScanNode::TableScan { table, .. } => table,
            ScanNode::IndexScan { table, .. } => table,
        }
    }

    pub fn cost(&self) -> f64 {
        match self {
            ScanNode::TableScan { cost, .. } => *cost,
            ScanNode::IndexScan { cost, .. } => *cost,
        }
    }

    pub fn estimated_rows(&self) -> u64 {
        match self {
            ScanNode::TableScan { estimated_rows, .. } => *estimated_rows,
            ScanNode::IndexScan { estimated_rows, .. } => *estimated_rows,
        }
    }
}

impl std::fmt::Display for ScanNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanNode::TableScan {
                table,
                cost,
                estimated_rows,
            } => write!(
                f,
                "TableScan({table}) cost={cost:.2} rows={estimated_rows}"
            ),
            ScanNode::IndexScan {
                table,
                index,
                column,
                cost,
                estimated_rows,
            } => write!(
                f,
                "IndexScan({table} via {index} on {column}) cost={cost:.2} rows={estimated_rows}"
            ),
        }
    }
}

/// The full plan for a `SELECT`: the driving scan, optionally wrapped in a
/// filter, sort and limit, with projection always applied last.
#[derive(Debug, Clone)]
pub struct Plan {
    pub scan: ScanNode,
    pub filter: Option<FilterNode>,
    pub sort: Option<SortNode>,
    pub limit: Option<LimitNode>,
}

#[derive(Debug, Clone)]
pub struct FilterNode {
    pub cost: f64,
    pub estimated_rows: u64,
    pub selectivity: f64,
}

#[derive(Debug, Clone)]
pub struct SortNode {
    pub cost: f64,
    pub estimated_rows: u64,
}

#[derive(Debug, Clone)]
pub struct LimitNode {
    pub limit: u64,
    pub estimated_rows: u64,
}

impl Plan {
    pub fn total_cost(&self) -> f64 {
        self.scan.cost()
            + self.filter.as_ref().map(|f| f.cost).unwrap_or(0.0)
            + self.sort.as_ref().map(|s| s.cost).unwrap_or(0.0)
    }

    /// Render the plan the way `EXPLAIN` shows it, one node per line
    /// innermost-first, matching `plan_to_string` (§4.8).
    pub fn explain(&self) -> String {
        let mut lines = vec![format!("{}", self.scan)];
        if let Some(filter) = &self.filter {
            lines.push(format!(
                "Filter selectivity={:.2} cost={:.2} rows={}",
                filter.selectivity, filter.cost, filter.estimated_rows
            ));
        }
        if let Some(sort) = &self.sort {
            lines.push(format!("Sort cost={:.2} rows={}", sort.cost, sort.estimated_rows));
        }
        if let Some(limit) = &self.limit {
            lines.push(format!("Limit {} rows={}", limit.limit, limit.estimated_rows));
        }
        lines.push("Project".to_string());
        lines.join("\n")
    }
}

pub struct QueryPlanner {
    catalog: Arc<Catalog>,
}

impl QueryPlanner {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn plan(&self, stmt: &SelectStmt) -> Result<Plan> {
        let stats = self.catalog.get_stats(&stmt.table_name)?;
        let row_count = stats.row_count.max(1);

        let scan = self.choose_access_method(&stmt.table_name, row_count, stmt.where_clause.as_ref())?;

        let filter = stmt.where_clause.as_ref().map(|expr| {
            let selectivity = estimate_selectivity(expr);
            let estimated_rows = ((scan.estimated_rows() as f64) * selectivity).ceil() as u64;
            FilterNode {
                cost: scan.estimated_rows() as f64 * COST_FILTER_PER_ROW,
                estimated_rows,
                selectivity,
            }
        });

        let rows_after_filter = filter.as_ref().map(|f| f.estimated_rows).unwrap_or(scan.estimated_rows());

        let sort = stmt.order_by.as_ref().map(|_| SortNode {
            cost: rows_after_filter as f64 * COST_SORT_PER_ROW,
            estimated_rows: rows_after_filter,
        });

        let limit = stmt.limit.map(|n| LimitNode {
            limit: n,
            estimated_rows: rows_after_filter.min(n),
        });

        Ok(Plan { scan, filter, sort, limit })
    }

    fn choose_access_method(
        &self,
        table: &str,
        row_count: u64,
        where_clause: Option<&Expr>,
    ) -> Result<ScanNode> {
        let table_scan_cost = row_count as f64 * COST_TABLE_SCAN_PER_ROW;

        let Some(expr) = where_clause else {
            return Ok(ScanNode::TableScan {
                table: table.to_string(),
                cost: table_scan_cost,
                estimated_rows: row_count,
            });
        };

        let Some((column, op)) = find_indexable_condition(expr) else {
            return Ok(ScanNode::TableScan {
                table: table.to_string(),
                cost: table_scan_cost,
                estimated_rows: row_count,
            });
        };

        let indexes = self.catalog.get_indexes(Some(table))?;
        let Some(index) = indexes.into_iter().find(|i| i.column == column) else {
            return Ok(ScanNode::TableScan {
                table: table.to_string(),
                cost: table_scan_cost,
                estimated_rows: row_count,
            });
        };

        // Reuse the one selectivity table rather than a second copy, so an
        // IndexScan and a Filter node agree on the same predicate shape.
        let selectivity = estimate_selectivity(&Expr::BinaryOp(
            Box::new(Expr::Column(column.clone())),
            op,
            Box::new(Expr::Literal(Value::Int(0))),
        ));
        let estimated_rows = ((row_count as f64) * selectivity).ceil().max(1.0) as u64;
        let index_cost = COST_INDEX_SEEK + estimated_rows as f64 * COST_INDEX_SCAN_PER_ROW;

        if index_cost < table_scan_cost {
            Ok(ScanNode::IndexScan {
                table: table.to_string(),
                index: index.name,
                column,
                cost: index_cost,
                estimated_rows,
            })
        } else {
            Ok(ScanNode::TableScan {
                table: table.to_string(),
                cost: table_scan_cost,
                estimated_rows: row_count,
            })
        }
    }
}

/// Look for a top-level (or top-level-AND-ed) equality/range comparison
/// against a bare column, the only shape an index seek can serve. Returns
/// the column and the comparison operator, so the caller can price it with
/// the same selectivity table `estimate_selectivity` uses for a Filter node.
fn find_indexable_condition(expr: &Expr) -> Option<(String, BinOp)> {
    match expr {
        Expr::BinaryOp(left, op, right) => match op {
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let column = match (left.as_ref(), right.as_ref()) {
                    (Expr::Column(c), Expr::Literal(_)) => Some(c.clone()),
                    (Expr::Literal(_), Expr::Column(c)) => Some(c.clone()),
                    _ => None,
                }?;
                Some((column, *op))
            }
            BinOp::And => find_indexable_condition(left).or_else(|| find_indexable_condition(right)),
            BinOp::Or => None,
        },
        _ => None,
    }
}

/// Estimate the fraction of rows a predicate passes, matching
/// `_estimate_selectivity` in the reference planner.
fn estimate_selectivity(expr: &Expr) -> f64 {
    match expr {
        Expr::BinaryOp(left, op, right) => match op {
            BinOp::Eq => 0.01,
            BinOp::NotEq => 0.99,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 0.33,
            BinOp::And => estimate_selectivity(left) * estimate_selectivity(right),
            BinOp::Or => (estimate_selectivity(left) + estimate_selectivity(right)).min(1.0),
        },
        _ => 0.1,
    }
}

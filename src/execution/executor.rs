//! Plan execution over materialized rows (§4.9).
//!
//! Grounded on `executor.py`/`aggregates.py`, but rows are a fixed
//! `Vec<Value>` per the redesign flag in §9: a [`Binding`] computed per
//! statement resolves unqualified/qualified/alias-qualified column names to
//! an index in the (possibly join-concatenated) row, instead of the
//! reference's per-row dynamic dict.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::catalog::{self, Catalog, ColumnInfo, ColumnType, Value};
use crate::common::{Error, Result};
use crate::concurrency::TransactionalStore;

use super::ast::{
    AggArg, AggFunc, BinOp, DeleteStmt, Expr, InsertStmt, JoinClause, SelectItem, SelectStmt, Stmt,
    UpdateStmt,
};
use super::planner::QueryPlanner;

/// What `execute` returns: rows for `SELECT`, rendered text for `EXPLAIN`,
/// nothing for DDL/DML (§4.10).
#[derive(Debug, Clone)]
pub enum QueryResult {
    Rows { columns: Vec<String>, rows: Vec<Vec<Value>> },
    ExplainText(String),
    Empty,
}

/// Resolves unqualified, `table.column`, and alias-qualified names to a
/// position in the current row, flagging names that exist on more than one
/// side of a join as ambiguous (§4.9, §8 scenario 6).
#[derive(Default)]
struct Binding {
    unqualified: HashMap<String, usize>,
    qualified: HashMap<String, usize>,
    ambiguous: HashMap<String, bool>,
}

impl Binding {
    fn add_table(&mut self, table: &str, alias: Option<&str>, columns: &[ColumnInfo], offset: usize) {
        for col in columns {
            let index = offset + col.ordinal as usize;
            self.qualified.insert(format!("{table}.{}", col.def.name), index);
            if let Some(alias) = alias {
                self.qualified.insert(format!("{alias}.{}", col.def.name), index);
            }
            self.add_unqualified(&col.def.name, index);
        }
    }

    fn add_unqualified(&mut self, name: &str, index: usize) {
        if self.ambiguous.contains_key(name) {
            return;
        }
        if self.unqualified.contains_key(name) {
            self.unqualified.remove(name);
            self.ambiguous.insert(name.to_string(), true);
        } else {
            self.unqualified.insert(name.to_string(), index);
        }
    }

    fn resolve(&self, name: &str) -> Result<usize> {
        if let Some(&index) = self.qualified.get(name) {
            return Ok(index);
        }
        if self.ambiguous.contains_key(name) {
            return Err(Error::AmbiguousColumn(name.to_string()));
        }
        self.unqualified
            .get(name)
            .copied()
            .ok_or_else(|| Error::SchemaFailure(format!("unknown column '{name}'")))
    }
}

pub struct Executor {
    catalog: Arc<Catalog>,
    store: Arc<TransactionalStore>,
    planner: QueryPlanner,
}

impl Executor {
    pub fn new(catalog: Arc<Catalog>, store: Arc<TransactionalStore>) -> Self {
        let planner = QueryPlanner::new(Arc::clone(&catalog));
        Self { catalog, store, planner }
    }

    pub fn execute(&self, stmt: &Stmt) -> Result<QueryResult> {
        match stmt {
            Stmt::Explain(inner) => self.execute_explain(inner),
            Stmt::CreateTable(ct) => {
                self.catalog.create_table(&ct.table_name, &ct.columns)?;
                Ok(QueryResult::Empty)
            }
            Stmt::DropTable(dt) => {
                self.catalog.drop_table(&dt.table_name)?;
                Ok(QueryResult::Empty)
            }
            Stmt::AlterTable(at) => {
                self.catalog.add_column(&at.table_name, at.add_column.clone())?;
                Ok(QueryResult::Empty)
            }
            Stmt::CreateIndex(ci) => {
                self.catalog
                    .create_index(&ci.index_name, &ci.table_name, &ci.column_name)?;
                Ok(QueryResult::Empty)
            }
            Stmt::DropIndex(di) => {
                self.catalog.drop_index(&di.index_name)?;
                Ok(QueryResult::Empty)
            }
            Stmt::Insert(ins) => self.execute_insert(ins),
            Stmt::Select(sel) => self.execute_select(sel),
            Stmt::Update(upd) => self.execute_update(upd),
            Stmt::Delete(del) => self.execute_delete(del),
        }
    }

    fn execute_explain(&self, inner: &Stmt) -> Result<QueryResult> {
        match inner {
            Stmt::Select(select) => {
                let plan = self.planner.plan(select)?;
                Ok(QueryResult::ExplainText(plan.explain()))
            }
            _ => Err(Error::LogicFailure(
                "EXPLAIN only supports SELECT statements".to_string(),
            )),
        }
    }

    fn execute_insert(&self, ins: &InsertStmt) -> Result<QueryResult> {
        let columns = self.catalog.get_columns(&ins.table_name)?;
        if ins.values.len() != columns.len() {
            return Err(Error::SchemaFailure(format!(
                "table '{}' has {} column(s), but {} value(s) were given",
                ins.table_name,
                columns.len(),
                ins.values.len()
            )));
        }

        let mut row = Vec::with_capacity(columns.len());
        for (col, value) in columns.iter().zip(ins.values.iter()) {
            row.push(coerce_value(value.clone(), col.def.col_type, &col.def.name)?);
        }

        let rowid = self.catalog.next_rowid(&ins.table_name)?;
        let key = catalog::row_key(&ins.table_name, rowid);
        self.store.insert(&key, &catalog::encode_row(&row))?;

        let stats = self.catalog.get_stats(&ins.table_name)?;
        self.catalog.update_stats(&ins.table_name, stats.row_count + 1)?;

        debug!("inserted row {} into '{}'", rowid, ins.table_name);
        Ok(QueryResult::Empty)
    }

    fn scan_table(&self, table: &str) -> Result<(Vec<ColumnInfo>, Vec<(Vec<u8>, Vec<Value>)>)> {
        let columns = self.catalog.get_columns(table)?;
        let prefix = catalog::row_prefix(table);
        let mut rows = Vec::new();
        for (key, bytes) in self.store.scan_prefix(&prefix)? {
            rows.push((key, catalog::decode_row(&bytes)?));
        }
        Ok((columns, rows))
    }

    fn execute_update(&self, upd: &UpdateStmt) -> Result<QueryResult> {
        let (columns, rows) = self.scan_table(&upd.table_name)?;

        let mut binding = Binding::default();
        binding.add_table(&upd.table_name, None, &columns, 0);

        let assignment_indices: Vec<(usize, ColumnType, &Value)> = upd
            .assignments
            .iter()
            .map(|(name, value)| {
                let col = columns
                    .iter()
                    .find(|c| &c.def.name == name)
                    .ok_or_else(|| Error::SchemaFailure(format!("unknown column '{name}'")))?;
                Ok((col.ordinal as usize, col.def.col_type, value))
            })
            .collect::<Result<_>>()?;

        let mut updated = 0u64;
        for (key, mut row) in rows {
            let matches = match &upd.where_clause {
                Some(expr) => eval_predicate(expr, &binding, &row)?,
                None => true,
            };
            if !matches {
                continue;
            }
            for (index, col_type, value) in &assignment_indices {
                row[*index] = coerce_value((*value).clone(), *col_type, "")?;
            }
            self.store.insert(&key, &catalog::encode_row(&row))?;
            updated += 1;
        }

        debug!("updated {} row(s) in '{}'", updated, upd.table_name);
        Ok(QueryResult::Empty)
    }

    fn execute_delete(&self, del: &DeleteStmt) -> Result<QueryResult> {
        let (columns, rows) = self.scan_table(&del.table_name)?;

        let mut binding = Binding::default();
        binding.add_table(&del.table_name, None, &columns, 0);

        let mut deleted = 0u64;
        for (key, row) in rows {
            let matches = match &del.where_clause {
                Some(expr) => eval_predicate(expr, &binding, &row)?,
                None => true,
            };
            if matches {
                self.store.delete(&key)?;
                deleted += 1;
            }
        }

        if deleted > 0 {
            let stats = self.catalog.get_stats(&del.table_name)?;
            self.catalog
                .update_stats(&del.table_name, stats.row_count.saturating_sub(deleted))?;
        }

        debug!("deleted {} row(s) from '{}'", deleted, del.table_name);
        Ok(QueryResult::Empty)
    }

    fn execute_select(&self, sel: &SelectStmt) -> Result<QueryResult> {
        let (base_columns, base_rows) = self.scan_table(&sel.table_name)?;

        let mut binding = Binding::default();
        binding.add_table(&sel.table_name, sel.table_alias.as_deref(), &base_columns, 0);

        let joined_rows: Vec<Vec<Value>> = match &sel.join {
            Some(join) => self.execute_join(join, &base_columns, &mut binding, base_rows)?,
            None => base_rows.into_iter().map(|(_, row)| row).collect(),
        };

        let mut filtered = Vec::with_capacity(joined_rows.len());
        for row in joined_rows {
            let matches = match &sel.where_clause {
                Some(expr) => eval_predicate(expr, &binding, &row)?,
                None => true,
            };
            if matches {
                filtered.push(row);
            }
        }

        let has_aggregates = sel.items.iter().any(|i| matches!(i, SelectItem::Aggregate(..)));

        if has_aggregates || !sel.group_by.is_empty() {
            return self.finish_aggregated(sel, &binding, filtered);
        }

        if let Some(order_col) = &sel.order_by {
            let index = binding.resolve(order_col)?;
            filtered.sort_by(|a, b| value_ordering(&a[index], &b[index]).unwrap_or(Ordering::Equal));
        }

        if let Some(limit) = sel.limit {
            filtered.truncate(limit as usize);
        }

        let (col_names, out_rows) = project(&sel.items, &binding, &base_columns, &filtered)?;
        Ok(QueryResult::Rows {
            columns: col_names,
            rows: out_rows,
        })
    }

    fn execute_join(
        &self,
        join: &JoinClause,
        base_columns: &[ColumnInfo],
        binding: &mut Binding,
        left_rows: Vec<(Vec<u8>, Vec<Value>)>,
    ) -> Result<Vec<Vec<Value>>> {
        let (right_columns, right_rows) = self.scan_table(&join.table_name)?;
        binding.add_table(&join.table_name, join.alias.as_deref(), &right_columns, base_columns.len());

        let mut combined = Vec::new();
        for (_, left) in &left_rows {
            for (_, right) in &right_rows {
                let mut row = left.clone();
                row.extend(right.iter().cloned());
                if eval_predicate(&join.on, binding, &row)? {
                    combined.push(row);
                }
            }
        }
        Ok(combined)
    }

    fn finish_aggregated(
        &self,
        sel: &SelectStmt,
        binding: &Binding,
        rows: Vec<Vec<Value>>,
    ) -> Result<QueryResult> {
        let group_indices: Vec<usize> = sel
            .group_by
            .iter()
            .map(|name| binding.resolve(name))
            .collect::<Result<_>>()?;

        let mut group_order: Vec<Vec<Value>> = Vec::new();
        let mut groups: HashMap<Vec<ValueKey>, Vec<&Vec<Value>>> = HashMap::new();
        for row in &rows {
            let key: Vec<Value> = group_indices.iter().map(|&i| row[i].clone()).collect();
            let hash_key: Vec<ValueKey> = key.iter().map(ValueKey::from).collect();
            if !groups.contains_key(&hash_key) {
                group_order.push(key.clone());
            }
            groups.entry(hash_key).or_default().push(row);
        }

        // With no GROUP BY, an aggregate still runs over the whole (possibly
        // empty) input as a single group, e.g. `SELECT COUNT(*) FROM t WHERE
        // false` reports zero rather than producing no output row at all.
        // `GROUP BY` over zero matching rows partitions into zero groups, so
        // it's left alone.
        if group_order.is_empty() && sel.group_by.is_empty() {
            group_order.push(Vec::new());
            groups.insert(Vec::new(), Vec::new());
        }

        let mut out_rows = Vec::with_capacity(group_order.len());
        for key in &group_order {
            let hash_key: Vec<ValueKey> = key.iter().map(ValueKey::from).collect();
            let group_rows = &groups[&hash_key];

            let mut out_row = Vec::with_capacity(sel.items.len());
            for item in &sel.items {
                out_row.push(select_item_value(item, binding, group_rows)?);
            }

            if let Some(having) = &sel.having {
                let matches = match group_rows.first() {
                    Some(row) => eval_predicate(having, binding, row)?,
                    None => false,
                };
                if !matches {
                    continue;
                }
            }
            out_rows.push(out_row);
        }

        let col_names = sel.items.iter().map(|item| item.to_string()).collect();
        Ok(QueryResult::Rows {
            columns: col_names,
            rows: out_rows,
        })
    }
}

/// A hashable stand-in for [`Value`], which can't derive `Hash`/`Eq` itself
/// because `f64` doesn't implement them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    Int(i64),
    Float(u64),
    Text(String),
}

impl ValueKey {
    fn from(v: &Value) -> Self {
        match v {
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::Text(s) => ValueKey::Text(s.clone()),
        }
    }
}

fn select_item_value(item: &SelectItem, binding: &Binding, rows: &[&Vec<Value>]) -> Result<Value> {
    match item {
        SelectItem::Wildcard => Err(Error::LogicFailure(
            "'*' cannot be combined with GROUP BY or an aggregate".to_string(),
        )),
        SelectItem::Column(name) => {
            let index = binding.resolve(name)?;
            let row = rows.first().ok_or_else(|| {
                Error::LogicFailure(format!(
                    "cannot select plain column '{name}' from an empty group with no GROUP BY"
                ))
            })?;
            Ok(row[index].clone())
        }
        SelectItem::Aggregate(func, arg) => compute_aggregate(*func, arg, binding, rows),
    }
}

fn compute_aggregate(func: AggFunc, arg: &AggArg, binding: &Binding, rows: &[&Vec<Value>]) -> Result<Value> {
    if func == AggFunc::Count && matches!(arg, AggArg::Star) {
        return Ok(Value::Int(rows.len() as i64));
    }

    let AggArg::Column(name) = arg else {
        return Err(Error::LogicFailure(format!("{func}(*) is only valid for COUNT")));
    };
    let index = binding.resolve(name)?;
    let values: Vec<&Value> = rows.iter().map(|r| &r[index]).collect();

    if func == AggFunc::Count {
        // No NULL type exists in this engine (§1 non-goals), so COUNT(col)
        // counts the same rows COUNT(*) would.
        return Ok(Value::Int(values.len() as i64));
    }

    match func {
        AggFunc::Sum => aggregate_sum(&values),
        AggFunc::Avg => aggregate_avg(&values),
        AggFunc::Min => aggregate_minmax(&values, Ordering::Less),
        AggFunc::Max => aggregate_minmax(&values, Ordering::Greater),
        AggFunc::Count => unreachable!("handled above"),
    }
}

fn aggregate_sum(values: &[&Value]) -> Result<Value> {
    let mut all_int = true;
    let mut int_sum: i64 = 0;
    let mut float_sum: f64 = 0.0;
    for v in values {
        match v {
            Value::Int(i) => {
                int_sum += i;
                float_sum += *i as f64;
            }
            Value::Float(f) => {
                all_int = false;
                float_sum += f;
            }
            Value::Text(_) => {
                return Err(Error::LogicFailure("cannot aggregate a TEXT column".to_string()))
            }
        }
    }
    Ok(if all_int { Value::Int(int_sum) } else { Value::Float(float_sum) })
}

fn aggregate_avg(values: &[&Value]) -> Result<Value> {
    if values.is_empty() {
        return Ok(Value::Float(0.0));
    }
    let mut sum = 0.0;
    for v in values {
        sum += as_f64(v)?;
    }
    Ok(Value::Float(sum / values.len() as f64))
}

fn aggregate_minmax(values: &[&Value], want: Ordering) -> Result<Value> {
    let Some((&first, rest)) = values.split_first() else {
        return Err(Error::LogicFailure(
            "MIN/MAX over zero rows has no value (no NULL type exists)".to_string(),
        ));
    };
    let mut best = first;
    for v in rest {
        let cmp = value_ordering(v, best)?;
        if cmp == want {
            best = v;
        }
    }
    Ok(best.clone())
}

fn project(
    items: &[SelectItem],
    binding: &Binding,
    base_columns: &[ColumnInfo],
    rows: &[Vec<Value>],
) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let mut col_names = Vec::new();
    for item in items {
        match item {
            SelectItem::Wildcard => {
                for col in base_columns {
                    col_names.push(col.def.name.clone());
                }
            }
            other => col_names.push(other.to_string()),
        }
    }

    let mut out_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut out = Vec::with_capacity(col_names.len());
        for item in items {
            match item {
                SelectItem::Wildcard => {
                    for col in base_columns {
                        out.push(row[col.ordinal as usize].clone());
                    }
                }
                SelectItem::Column(name) => out.push(row[binding.resolve(name)?].clone()),
                SelectItem::Aggregate(..) => {
                    return Err(Error::LogicFailure(
                        "aggregate function used without GROUP BY".to_string(),
                    ))
                }
            }
        }
        out_rows.push(out);
    }

    Ok((col_names, out_rows))
}

fn coerce_value(value: Value, col_type: ColumnType, col_name: &str) -> Result<Value> {
    match (col_type, &value) {
        (ColumnType::Int, Value::Int(_)) => Ok(value),
        (ColumnType::Float, Value::Float(_)) => Ok(value),
        (ColumnType::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
        (ColumnType::Text, Value::Text(_)) => Ok(value),
        _ => Err(Error::SchemaFailure(format!(
            "column '{col_name}' expects {col_type}, got {}",
            value.type_name()
        ))),
    }
}

fn eval_predicate(expr: &Expr, binding: &Binding, row: &[Value]) -> Result<bool> {
    match expr {
        Expr::BinaryOp(left, BinOp::And, right) => {
            Ok(eval_predicate(left, binding, row)? && eval_predicate(right, binding, row)?)
        }
        Expr::BinaryOp(left, BinOp::Or, right) => {
            Ok(eval_predicate(left, binding, row)? || eval_predicate(right, binding, row)?)
        }
        Expr::BinaryOp(left, op, right) => {
            let lv = eval_value(left, binding, row)?;
            let rv = eval_value(right, binding, row)?;
            compare(&lv, *op, &rv)
        }
        _ => Err(Error::LogicFailure("expected a boolean expression".to_string())),
    }
}

fn eval_value(expr: &Expr, binding: &Binding, row: &[Value]) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Column(name) => Ok(row[binding.resolve(name)?].clone()),
        Expr::BinaryOp(..) => Err(Error::LogicFailure(
            "a boolean expression cannot be used as a value".to_string(),
        )),
    }
}

fn compare(left: &Value, op: BinOp, right: &Value) -> Result<bool> {
    let ordering = value_ordering(left, right)?;
    Ok(match op {
        BinOp::Eq => ordering == Ordering::Equal,
        BinOp::NotEq => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        BinOp::And | BinOp::Or => unreachable!("handled in eval_predicate"),
    })
}

/// Compare two values: numeric-vs-numeric coerces to `f64`; numeric-vs-text
/// compares the numeric value's decimal rendering against the text (§4.9).
fn value_ordering(left: &Value, right: &Value) -> Result<Ordering> {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        (Value::Text(a), other) => Ok(a.as_str().cmp(render_numeric(other)?.as_str())),
        (other, Value::Text(b)) => Ok(render_numeric(other)?.as_str().cmp(b.as_str())),
        (a, b) => as_f64(a)?
            .partial_cmp(&as_f64(b)?)
            .ok_or_else(|| Error::LogicFailure("cannot compare NaN".to_string())),
    }
}

fn as_f64(v: &Value) -> Result<f64> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        Value::Text(_) => Err(Error::LogicFailure("expected a numeric value".to_string())),
    }
}

fn render_numeric(v: &Value) -> Result<String> {
    match v {
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Text(_) => Err(Error::LogicFailure("expected a numeric value".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fresh_executor(dir: &tempfile::TempDir) -> Executor {
        let store = Arc::new(TransactionalStore::open_or_create(dir.path().join("t.db"), 16).unwrap());
        let catalog = Arc::new(Catalog::new(Arc::clone(&store)));
        Executor::new(catalog, store)
    }

    fn run(executor: &Executor, sql: &str) -> QueryResult {
        let stmt = super::super::parser::parse_sql(sql).unwrap();
        executor.execute(&stmt).unwrap()
    }

    #[test]
    fn test_create_insert_select() {
        let dir = tempdir().unwrap();
        let executor = fresh_executor(&dir);

        run(&executor, "CREATE TABLE users (id INT, name TEXT, age INT)");
        run(&executor, "INSERT INTO users VALUES (1, 'Alice', 30)");
        run(&executor, "INSERT INTO users VALUES (2, 'Bob', 25)");

        match run(&executor, "SELECT name FROM users WHERE age > 28") {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows, vec![vec![Value::Text("Alice".to_string())]]);
            }
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn test_order_by_and_limit() {
        let dir = tempdir().unwrap();
        let executor = fresh_executor(&dir);
        run(&executor, "CREATE TABLE users (id INT, name TEXT, age INT)");
        run(&executor, "INSERT INTO users VALUES (1, 'Alice', 30)");
        run(&executor, "INSERT INTO users VALUES (2, 'Bob', 25)");
        run(&executor, "INSERT INTO users VALUES (3, 'Charlie', 35)");
        run(&executor, "INSERT INTO users VALUES (4, 'David', 28)");

        match run(&executor, "SELECT name, age FROM users ORDER BY age LIMIT 3") {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(
                    rows,
                    vec![
                        vec![Value::Text("Bob".to_string()), Value::Int(25)],
                        vec![Value::Text("David".to_string()), Value::Int(28)],
                        vec![Value::Text("Alice".to_string()), Value::Int(30)],
                    ]
                );
            }
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregation_with_group_by() {
        let dir = tempdir().unwrap();
        let executor = fresh_executor(&dir);
        run(
            &executor,
            "CREATE TABLE orders (id INT, customer TEXT, amount INT)",
        );
        for row in [
            "(1, 'Alice', 100)",
            "(2, 'Bob', 200)",
            "(3, 'Alice', 150)",
            "(4, 'Charlie', 300)",
            "(5, 'Bob', 100)",
        ] {
            run(&executor, &format!("INSERT INTO orders VALUES {row}"));
        }

        match run(
            &executor,
            "SELECT customer, SUM(amount) FROM orders GROUP BY customer",
        ) {
            QueryResult::Rows { rows, .. } => {
                let mut totals: HashMap<String, i64> = HashMap::new();
                for row in rows {
                    let Value::Text(customer) = &row[0] else { panic!("expected text") };
                    let Value::Int(total) = &row[1] else { panic!("expected int") };
                    totals.insert(customer.clone(), *total);
                }
                assert_eq!(totals.get("Alice"), Some(&250));
                assert_eq!(totals.get("Bob"), Some(&300));
                assert_eq!(totals.get("Charlie"), Some(&300));
            }
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn test_join_with_qualified_columns_and_ambiguity() {
        let dir = tempdir().unwrap();
        let executor = fresh_executor(&dir);
        run(&executor, "CREATE TABLE users (id INT, name TEXT)");
        run(&executor, "CREATE TABLE orders (id INT, user_id INT, product TEXT)");
        run(&executor, "INSERT INTO users VALUES (1, 'Alice')");
        run(&executor, "INSERT INTO users VALUES (2, 'Bob')");
        run(&executor, "INSERT INTO orders VALUES (1, 1, 'Laptop')");
        run(&executor, "INSERT INTO orders VALUES (2, 1, 'Mouse')");
        run(&executor, "INSERT INTO orders VALUES (3, 2, 'Keyboard')");

        match run(
            &executor,
            "SELECT u.name, o.product FROM users u INNER JOIN orders o ON u.id = o.user_id",
        ) {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(
                    rows,
                    vec![
                        vec![Value::Text("Alice".to_string()), Value::Text("Laptop".to_string())],
                        vec![Value::Text("Alice".to_string()), Value::Text("Mouse".to_string())],
                        vec![Value::Text("Bob".to_string()), Value::Text("Keyboard".to_string())],
                    ]
                );
            }
            other => panic!("expected Rows, got {other:?}"),
        }

        let stmt = super::super::parser::parse_sql(
            "SELECT id FROM users u INNER JOIN orders o ON u.id = o.user_id",
        )
        .unwrap();
        assert!(matches!(executor.execute(&stmt), Err(Error::AmbiguousColumn(_))));
    }

    #[test]
    fn test_update_and_delete() {
        let dir = tempdir().unwrap();
        let executor = fresh_executor(&dir);
        run(&executor, "CREATE TABLE users (id INT, name TEXT, age INT)");
        run(&executor, "INSERT INTO users VALUES (1, 'Alice', 30)");

        run(&executor, "UPDATE users SET age = 31 WHERE id = 1");
        match run(&executor, "SELECT age FROM users WHERE id = 1") {
            QueryResult::Rows { rows, .. } => assert_eq!(rows[0][0], Value::Int(31)),
            other => panic!("expected Rows, got {other:?}"),
        }

        run(&executor, "DELETE FROM users WHERE id = 1");
        match run(&executor, "SELECT * FROM users") {
            QueryResult::Rows { rows, .. } => assert!(rows.is_empty()),
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn test_explain_select() {
        let dir = tempdir().unwrap();
        let executor = fresh_executor(&dir);
        run(&executor, "CREATE TABLE users (id INT, name TEXT)");

        match run(&executor, "EXPLAIN SELECT * FROM users") {
            QueryResult::ExplainText(text) => assert!(text.contains("TableScan")),
            other => panic!("expected ExplainText, got {other:?}"),
        }
    }

    #[test]
    fn test_having_filters_grouped_rows() {
        let dir = tempdir().unwrap();
        let executor = fresh_executor(&dir);
        run(&executor, "CREATE TABLE orders (id INT, customer TEXT, amount INT)");
        run(&executor, "INSERT INTO orders VALUES (1, 'Alice', 100)");
        run(&executor, "INSERT INTO orders VALUES (2, 'Bob', 300)");

        match run(
            &executor,
            "SELECT customer, SUM(amount) FROM orders GROUP BY customer HAVING customer = 'Bob'",
        ) {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0][0], Value::Text("Bob".to_string()));
            }
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_over_empty_result_reports_zero() {
        let dir = tempdir().unwrap();
        let executor = fresh_executor(&dir);
        run(&executor, "CREATE TABLE orders (id INT, amount INT)");
        run(&executor, "INSERT INTO orders VALUES (1, 100)");

        match run(&executor, "SELECT COUNT(*) FROM orders WHERE id = 999") {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows, vec![vec![Value::Int(0)]]);
            }
            other => panic!("expected Rows, got {other:?}"),
        }

        match run(&executor, "SELECT amount FROM orders WHERE id = 999 GROUP BY amount") {
            QueryResult::Rows { rows, .. } => assert!(rows.is_empty()),
            other => panic!("expected Rows, got {other:?}"),
        }
    }
}

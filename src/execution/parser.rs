//! Recursive-descent SQL parser: tokens → AST (§4.7).
//!
//! Grounded on `parser.py`'s `SQLParser`, statement by statement, but
//! driven off typed [`Token`]s instead of bare strings so punctuation and
//! literals don't need re-sniffing at every call site.

use crate::catalog::{ColumnDef, ColumnType, Value};
use crate::common::{Error, Result};

use super::ast::*;
use super::tokenizer::{tokenize, Token, TokenKind};

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

pub fn parse_sql(sql: &str) -> Result<Stmt> {
    let tokens = tokenize(sql)?;
    if tokens.is_empty() {
        return Err(Error::ParseFailure {
            message: "empty SQL statement".to_string(),
            position: 0,
        });
    }
    let mut parser = Parser { tokens, pos: 0 };
    let stmt = parser.parse_statement()?;

    if parser.is_kind(&TokenKind::Semicolon) {
        parser.advance()?;
    }
    if let Some(token) = parser.current() {
        return Err(Error::ParseFailure {
            message: format!("unexpected trailing token '{}'", token.text()),
            position: token.position,
        });
    }

    Ok(stmt)
}

impl Parser {
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn eof_position(&self) -> usize {
        self.tokens.last().map(|t| t.position + 1).unwrap_or(0)
    }

    fn advance(&mut self) -> Result<Token> {
        let token = self
            .current()
            .cloned()
            .ok_or_else(|| Error::ParseFailure {
                message: "unexpected end of input".to_string(),
                position: self.eof_position(),
            })?;
        self.pos += 1;
        Ok(token)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        self.current().is_some_and(|t| t.is_keyword(keyword))
    }

    fn is_any_keyword(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.is_keyword(k))
    }

    fn is_kind(&self, kind: &TokenKind) -> bool {
        self.current().is_some_and(|t| &t.kind == kind)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let token = self.advance()?;
        if !token.is_keyword(keyword) {
            return Err(Error::ParseFailure {
                message: format!("expected '{keyword}', got '{}'", token.text()),
                position: token.position,
            });
        }
        Ok(())
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<()> {
        let token = self.advance()?;
        if token.kind != kind {
            return Err(Error::ParseFailure {
                message: format!("unexpected token '{}'", token.text()),
                position: token.position,
            });
        }
        Ok(())
    }

    fn advance_ident(&mut self) -> Result<String> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Ident(name) => Ok(name),
            _ => Err(Error::ParseFailure {
                message: format!("expected identifier, got '{}'", token.text()),
                position: token.position,
            }),
        }
    }

    fn advance_u64(&mut self) -> Result<u64> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Int(v) if v >= 0 => Ok(v as u64),
            _ => Err(Error::ParseFailure {
                message: format!("expected a non-negative integer, got '{}'", token.text()),
                position: token.position,
            }),
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        if self.is_keyword("EXPLAIN") {
            self.advance()?;
            let inner = self.parse_statement()?;
            return Ok(Stmt::Explain(Box::new(inner)));
        }
        if self.is_keyword("CREATE") {
            return match self.peek(1) {
                Some(t) if t.is_keyword("TABLE") => self.parse_create_table().map(Stmt::CreateTable),
                Some(t) if t.is_keyword("INDEX") => self.parse_create_index().map(Stmt::CreateIndex),
                _ => Err(self.unexpected_after("CREATE")),
            };
        }
        if self.is_keyword("DROP") {
            return match self.peek(1) {
                Some(t) if t.is_keyword("TABLE") => self.parse_drop_table().map(Stmt::DropTable),
                Some(t) if t.is_keyword("INDEX") => self.parse_drop_index().map(Stmt::DropIndex),
                _ => Err(self.unexpected_after("DROP")),
            };
        }
        if self.is_keyword("ALTER") {
            return self.parse_alter_table().map(Stmt::AlterTable);
        }
        if self.is_keyword("INSERT") {
            return self.parse_insert().map(Stmt::Insert);
        }
        if self.is_keyword("SELECT") {
            return self.parse_select().map(Stmt::Select);
        }
        if self.is_keyword("UPDATE") {
            return self.parse_update().map(Stmt::Update);
        }
        if self.is_keyword("DELETE") {
            return self.parse_delete().map(Stmt::Delete);
        }

        let token = self.advance()?;
        Err(Error::ParseFailure {
            message: format!("unsupported statement: '{}'", token.text()),
            position: token.position,
        })
    }

    fn unexpected_after(&self, keyword: &str) -> Error {
        let position = self.current().map(|t| t.position).unwrap_or_else(|| self.eof_position());
        Error::ParseFailure {
            message: format!("expected TABLE or INDEX after {keyword}"),
            position,
        }
    }

    // -- DDL -----------------------------------------------------------

    fn parse_create_table(&mut self) -> Result<CreateTableStmt> {
        self.expect_keyword("CREATE")?;
        self.expect_keyword("TABLE")?;
        let table_name = self.advance_ident()?;

        self.expect_kind(TokenKind::LParen)?;
        let mut columns = Vec::new();
        while !self.is_kind(&TokenKind::RParen) {
            let col_name = self.advance_ident()?;
            let col_type_name = self.advance_ident()?;
            columns.push(ColumnDef::new(col_name, ColumnType::parse(&col_type_name)?));

            if self.is_kind(&TokenKind::Comma) {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect_kind(TokenKind::RParen)?;

        Ok(CreateTableStmt { table_name, columns })
    }

    fn parse_drop_table(&mut self) -> Result<DropTableStmt> {
        self.expect_keyword("DROP")?;
        self.expect_keyword("TABLE")?;
        let table_name = self.advance_ident()?;
        Ok(DropTableStmt { table_name })
    }

    fn parse_alter_table(&mut self) -> Result<AlterTableStmt> {
        self.expect_keyword("ALTER")?;
        self.expect_keyword("TABLE")?;
        let table_name = self.advance_ident()?;
        self.expect_keyword("ADD")?;
        self.expect_keyword("COLUMN")?;
        let col_name = self.advance_ident()?;
        let col_type_name = self.advance_ident()?;
        Ok(AlterTableStmt {
            table_name,
            add_column: ColumnDef::new(col_name, ColumnType::parse(&col_type_name)?),
        })
    }

    fn parse_create_index(&mut self) -> Result<CreateIndexStmt> {
        self.expect_keyword("CREATE")?;
        self.expect_keyword("INDEX")?;
        let index_name = self.advance_ident()?;
        self.expect_keyword("ON")?;
        let table_name = self.advance_ident()?;
        self.expect_kind(TokenKind::LParen)?;
        let column_name = self.advance_ident()?;
        self.expect_kind(TokenKind::RParen)?;
        Ok(CreateIndexStmt {
            index_name,
            table_name,
            column_name,
        })
    }

    fn parse_drop_index(&mut self) -> Result<DropIndexStmt> {
        self.expect_keyword("DROP")?;
        self.expect_keyword("INDEX")?;
        let index_name = self.advance_ident()?;
        Ok(DropIndexStmt { index_name })
    }

    // -- DML -------------------------------------------------------------

    fn parse_insert(&mut self) -> Result<InsertStmt> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table_name = self.advance_ident()?;
        self.expect_keyword("VALUES")?;
        self.expect_kind(TokenKind::LParen)?;

        let mut values = Vec::new();
        while !self.is_kind(&TokenKind::RParen) {
            values.push(self.parse_literal()?);
            if self.is_kind(&TokenKind::Comma) {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect_kind(TokenKind::RParen)?;

        Ok(InsertStmt { table_name, values })
    }

    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.expect_keyword("SELECT")?;

        let mut items = Vec::new();
        if self.is_kind(&TokenKind::Star) {
            self.advance()?;
            items.push(SelectItem::Wildcard);
        } else {
            loop {
                items.push(self.parse_select_item()?);
                if self.is_kind(&TokenKind::Comma) {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }

        self.expect_keyword("FROM")?;
        let table_name = self.advance_ident()?;
        let table_alias = self.try_parse_bare_alias(&["WHERE", "INNER", "LEFT", "RIGHT", "JOIN", "GROUP", "HAVING", "ORDER", "LIMIT"])?;

        let join = if self.is_any_keyword(&["INNER", "LEFT", "RIGHT", "JOIN"]) {
            Some(self.parse_join()?)
        } else {
            None
        };

        let where_clause = if self.is_keyword("WHERE") {
            self.advance()?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        let group_by = if self.is_keyword("GROUP") {
            self.advance()?;
            self.expect_keyword("BY")?;
            let mut cols = vec![self.parse_qualified_name()?];
            while self.is_kind(&TokenKind::Comma) {
                self.advance()?;
                cols.push(self.parse_qualified_name()?);
            }
            cols
        } else {
            Vec::new()
        };

        let having = if self.is_keyword("HAVING") {
            self.advance()?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        let order_by = if self.is_keyword("ORDER") {
            self.advance()?;
            self.expect_keyword("BY")?;
            Some(self.parse_qualified_name()?)
        } else {
            None
        };

        let limit = if self.is_keyword("LIMIT") {
            self.advance()?;
            Some(self.advance_u64()?)
        } else {
            None
        };

        Ok(SelectStmt {
            items,
            table_name,
            table_alias,
            join,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
        })
    }

    fn parse_select_item(&mut self) -> Result<SelectItem> {
        if self.is_any_keyword(&["COUNT", "SUM", "AVG", "MIN", "MAX"]) {
            let func_token = self.advance()?;
            let func = match func_token.text().to_uppercase().as_str() {
                "COUNT" => AggFunc::Count,
                "SUM" => AggFunc::Sum,
                "AVG" => AggFunc::Avg,
                "MIN" => AggFunc::Min,
                "MAX" => AggFunc::Max,
                _ => unreachable!("guarded by is_any_keyword above"),
            };
            self.expect_kind(TokenKind::LParen)?;
            let arg = if self.is_kind(&TokenKind::Star) {
                self.advance()?;
                AggArg::Star
            } else {
                AggArg::Column(self.parse_qualified_name()?)
            };
            self.expect_kind(TokenKind::RParen)?;
            return Ok(SelectItem::Aggregate(func, arg));
        }

        Ok(SelectItem::Column(self.parse_qualified_name()?))
    }

    /// Consumes a bare identifier alias (no `AS`) if the current token is an
    /// identifier that isn't one of `stop_words` (the keywords legitimately
    /// allowed to follow the aliased position).
    fn try_parse_bare_alias(&mut self, stop_words: &[&str]) -> Result<Option<String>> {
        match self.current().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) if !stop_words.iter().any(|k| name.eq_ignore_ascii_case(k)) => {
                Ok(Some(self.advance_ident()?))
            }
            _ => Ok(None),
        }
    }

    fn parse_qualified_name(&mut self) -> Result<String> {
        let mut name = self.advance_ident()?;
        if self.is_kind(&TokenKind::Dot) {
            self.advance()?;
            name.push('.');
            name.push_str(&self.advance_ident()?);
        }
        Ok(name)
    }

    fn parse_join(&mut self) -> Result<JoinClause> {
        let join_type = if self.is_any_keyword(&["INNER", "LEFT", "RIGHT"]) {
            let token = self.advance()?;
            match token.text().to_uppercase().as_str() {
                "INNER" => JoinType::Inner,
                "LEFT" => JoinType::Left,
                "RIGHT" => JoinType::Right,
                _ => unreachable!(),
            }
        } else {
            JoinType::Inner
        };

        self.expect_keyword("JOIN")?;
        let table_name = self.advance_ident()?;

        let alias = if self.is_keyword("AS") {
            self.advance()?;
            Some(self.advance_ident()?)
        } else {
            self.try_parse_bare_alias(&["ON"])?
        };

        self.expect_keyword("ON")?;
        let on = self.parse_expression()?;

        Ok(JoinClause {
            join_type,
            table_name,
            alias,
            on,
        })
    }

    fn parse_update(&mut self) -> Result<UpdateStmt> {
        self.expect_keyword("UPDATE")?;
        let table_name = self.advance_ident()?;
        self.expect_keyword("SET")?;

        let mut assignments = Vec::new();
        loop {
            let col = self.advance_ident()?;
            self.expect_kind(TokenKind::Eq)?;
            let value = self.parse_literal()?;
            assignments.push((col, value));

            if self.is_kind(&TokenKind::Comma) {
                self.advance()?;
            } else {
                break;
            }
        }

        let where_clause = if self.is_keyword("WHERE") {
            self.advance()?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(UpdateStmt {
            table_name,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStmt> {
        self.expect_keyword("DELETE")?;
        self.expect_keyword("FROM")?;
        let table_name = self.advance_ident()?;

        let where_clause = if self.is_keyword("WHERE") {
            self.advance()?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(DeleteStmt { table_name, where_clause })
    }

    // -- Expressions -----------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.is_keyword("OR") {
            self.advance()?;
            let right = self.parse_and_expr()?;
            left = Expr::BinaryOp(Box::new(left), BinOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.is_keyword("AND") {
            self.advance()?;
            let right = self.parse_comparison()?;
            left = Expr::BinaryOp(Box::new(left), BinOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_primary()?;

        let op = match self.current().map(|t| &t.kind) {
            Some(TokenKind::Eq) => Some(BinOp::Eq),
            Some(TokenKind::NotEq) => Some(BinOp::NotEq),
            Some(TokenKind::Lt) => Some(BinOp::Lt),
            Some(TokenKind::Gt) => Some(BinOp::Gt),
            Some(TokenKind::Le) => Some(BinOp::Le),
            Some(TokenKind::Ge) => Some(BinOp::Ge),
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance()?;
                let right = self.parse_primary()?;
                Ok(Expr::BinaryOp(Box::new(left), op, Box::new(right)))
            }
            None => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().cloned().ok_or_else(|| Error::ParseFailure {
            message: "unexpected end of expression".to_string(),
            position: self.eof_position(),
        })?;

        match token.kind {
            TokenKind::Str(_) | TokenKind::Int(_) | TokenKind::Float(_) => {
                Ok(Expr::Literal(self.parse_literal()?))
            }
            TokenKind::Ident(_) => Ok(Expr::Column(self.parse_qualified_name()?)),
            _ => Err(Error::ParseFailure {
                message: format!("unexpected token '{}' in expression", token.text()),
                position: token.position,
            }),
        }
    }

    fn parse_literal(&mut self) -> Result<Value> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Str(s) => Ok(Value::Text(s)),
            TokenKind::Int(v) => Ok(Value::Int(v)),
            TokenKind::Float(v) => Ok(Value::Float(v)),
            _ => Err(Error::ParseFailure {
                message: format!("expected a literal value, got '{}'", token.text()),
                position: token.position,
            }),
        }
    }
}

//! Recursive descent parser for T-SQL DDL scripts.
//!
//! The parser is tolerant by construction: it models the statements tombstone
//! needs (`CREATE TABLE`, `ALTER TABLE ... ADD`, `CREATE INDEX`, and the heads of
//! trigger/view/procedure/function statements) and skips everything else up to
//! the next statement boundary. Errors are only raised for damaged statements of
//! a modelled kind.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::{Span, Spanned};

/// Keywords that begin a new statement when seen at nesting depth 0.
const STATEMENT_STARTS: &[&str] = &[
    "CREATE", "ALTER", "DROP", "INSERT", "UPDATE", "DELETE", "MERGE", "SELECT", "SET", "EXEC",
    "EXECUTE", "IF", "DECLARE", "PRINT", "GRANT", "DENY", "REVOKE", "BEGIN", "USE",
];

/// Keywords that end a column default expression.
const COLUMN_OPTION_STARTS: &[&str] = &[
    "NOT", "NULL", "CONSTRAINT", "PRIMARY", "UNIQUE", "REFERENCES", "FOREIGN", "CHECK",
    "DEFAULT", "IDENTITY", "COLLATE", "WITH", "FOR", "GENERATED", "HIDDEN", "SPARSE", "INDEX",
    "ROWGUIDCOL", "MASKED", "PERSISTED",
];

/// Parser for T-SQL DDL.
pub struct Parser<'source> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Create a new parser for the given source.
    pub fn new(source: &'source str) -> Self {
        Self {
            tokens: tokenize(source),
            pos: 0,
            source,
        }
    }

    /// Parse every statement in the script.
    pub fn parse_script(&mut self) -> Result<Script, ParseError> {
        let mut statements = Vec::new();

        while let Some(tok) = self.peek() {
            if tok.token == Token::Semicolon || tok.token.is_batch_separator() {
                self.advance();
                continue;
            }
            statements.push(self.parse_statement()?);
        }

        Ok(Script { statements })
    }

    /// Parse one statement.
    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        if self.peek_keyword("CREATE") {
            return self.parse_create();
        }
        if self.peek_keyword("ALTER") {
            return self.parse_alter();
        }
        let start = self.current_span();
        Ok(Statement::Other(self.skip_statement(start)))
    }

    /// Parse a `CREATE ...` statement.
    fn parse_create(&mut self) -> Result<Statement, ParseError> {
        let start = self.expect_keyword("CREATE")?;

        let verb = if self.peek_keyword("OR") && self.peek_nth_keyword(1, "ALTER") {
            self.advance();
            self.advance();
            CreateVerb::CreateOrAlter
        } else {
            CreateVerb::Create
        };

        if let Some(kind) = self.peek_object_kind() {
            self.advance();
            return self.parse_object(verb, kind, start);
        }

        if self.eat_keyword("TABLE") {
            return self.parse_create_table(start).map(Statement::CreateTable);
        }

        if self.peek_index_head() {
            return self.parse_create_index(start).map(Statement::CreateIndex);
        }

        Ok(Statement::Other(self.skip_statement(start)))
    }

    /// Parse an `ALTER ...` statement.
    fn parse_alter(&mut self) -> Result<Statement, ParseError> {
        let start = self.expect_keyword("ALTER")?;

        if let Some(kind) = self.peek_object_kind() {
            self.advance();
            return self.parse_object(CreateVerb::Alter, kind, start);
        }

        if self.eat_keyword("TABLE") {
            return self.parse_alter_table(start).map(Statement::AlterTable);
        }

        Ok(Statement::Other(self.skip_statement(start)))
    }

    /// Parse the head of a trigger/view/procedure/function and skip its body.
    fn parse_object(
        &mut self,
        verb: CreateVerb,
        kind: ObjectKind,
        start: Span,
    ) -> Result<Statement, ParseError> {
        let name = self.parse_object_name()?;

        let target = if kind == ObjectKind::Trigger {
            self.expect_keyword("ON")?;
            if self.peek_keyword("DATABASE") || self.peek_keyword("ALL") {
                None
            } else {
                Some(self.parse_object_name()?)
            }
        } else {
            None
        };

        // Programmable objects must be alone in their batch; the body runs to `GO`.
        let end = self.skip_batch(name.span());

        Ok(Statement::Object(ObjectStatement {
            verb,
            kind,
            name,
            target,
            span: start.merge(end),
        }))
    }

    /// Parse `CREATE TABLE` after the `TABLE` keyword.
    fn parse_create_table(&mut self, start: Span) -> Result<CreateTable, ParseError> {
        let name = self.parse_object_name()?;

        let open = self.expect_token(Token::LParen).map_err(|e| {
            e.with_hint("tombstone expects a column list after the table name")
        })?;

        let mut elements = Vec::new();
        let close = loop {
            if self.peek_is(&Token::RParen) {
                break self.next_token()?;
            }

            elements.push(self.parse_table_element()?);
            self.skip_element_rest()?;

            let sep = self.next_token()?;
            match sep.token {
                Token::Comma => continue,
                Token::RParen => break sep,
                other => {
                    return Err(ParseError::new(
                        format!("expected ',' or ')' in table body, found {:?}", other),
                        sep.span,
                    ))
                }
            }
        };

        let mut options = Vec::new();
        let mut end = close.span;
        while !self.at_statement_end() {
            if self.peek_keyword("WITH") && self.peek_nth_is(1, &Token::LParen) {
                self.advance();
                let (opts, span) = self.parse_option_list()?;
                options.extend(opts);
                end = span;
            } else {
                end = self.skip_token_or_group()?;
            }
        }

        Ok(CreateTable {
            name,
            elements,
            options,
            span: start.merge(end),
            body_span: open.span.merge(close.span),
        })
    }

    /// Parse one element of a table body.
    fn parse_table_element(&mut self) -> Result<TableElement, ParseError> {
        if self.peek_any_keyword(&["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK"]) {
            return self.parse_table_constraint().map(TableElement::Constraint);
        }

        if self.peek_keyword("INDEX") {
            return self.parse_inline_index().map(TableElement::Index);
        }

        if self.peek_keyword("PERIOD") && self.peek_nth_keyword(1, "FOR") {
            let start = self.expect_keyword("PERIOD")?;
            self.expect_keyword("FOR")?;
            self.expect_keyword("SYSTEM_TIME")?;
            self.expect_token(Token::LParen)?;
            let period_start = self.expect_identifier()?;
            self.expect_token(Token::Comma)?;
            let period_end = self.expect_identifier()?;
            let close = self.expect_token(Token::RParen)?;
            return Ok(TableElement::Period {
                start: period_start,
                end: period_end,
                span: start.merge(close.span),
            });
        }

        self.parse_column().map(TableElement::Column)
    }

    /// Parse a column definition.
    fn parse_column(&mut self) -> Result<ColumnDef, ParseError> {
        let name = self.expect_identifier()?;
        let mut column = ColumnDef {
            name: name.clone(),
            data_type: String::new(),
            nullable: None,
            identity: false,
            generated: None,
            hidden: false,
            computed: false,
            constraints: Vec::new(),
            span: name.span,
        };

        if self.eat_keyword("AS") {
            let expr_span = self.skip_to_element_end()?;
            column.data_type = format!("AS {}", expr_span.slice(self.source).trim());
            column.computed = true;
            column.span = name.span.merge(expr_span);
            return Ok(column);
        }

        column.data_type = self.parse_data_type()?;

        while !self.at_element_end() {
            let start = self.current_span();

            if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                column.nullable = Some(false);
            } else if self.eat_keyword("NULL") {
                column.nullable = Some(true);
            } else if self.eat_keyword("IDENTITY") {
                column.identity = true;
                if self.peek_is(&Token::LParen) {
                    self.skip_group()?;
                }
                self.skip_not_for_replication();
            } else if self.eat_keyword("GENERATED") {
                self.expect_keyword("ALWAYS")?;
                self.expect_keyword("AS")?;
                let is_row = self.eat_keyword("ROW");
                let which = self.next_token()?;
                if is_row {
                    column.generated = if which.token.is_keyword("START") {
                        Some(GeneratedAlways::RowStart)
                    } else if which.token.is_keyword("END") {
                        Some(GeneratedAlways::RowEnd)
                    } else {
                        return Err(ParseError::new(
                            "expected START or END after GENERATED ALWAYS AS ROW",
                            which.span,
                        ));
                    };
                } else if !self.at_element_end() && self.peek_any_keyword(&["START", "END"]) {
                    // TRANSACTION_ID / SEQUENCE_NUMBER START|END (ledger columns)
                    self.advance();
                }
            } else if self.eat_keyword("HIDDEN") {
                column.hidden = true;
            } else if self.eat_keyword("COLLATE") {
                self.next_token()?;
            } else if self.peek_any_keyword(&[
                "CONSTRAINT",
                "PRIMARY",
                "UNIQUE",
                "FOREIGN",
                "REFERENCES",
                "CHECK",
                "DEFAULT",
            ]) {
                column.constraints.push(self.parse_column_constraint()?);
            } else if self.eat_keyword("INDEX") {
                // Inline column index: name and options only.
                self.next_token()?;
            } else {
                // SPARSE, ROWGUIDCOL, FILESTREAM, MASKED WITH (...), ENCRYPTED WITH (...)
                self.skip_token_or_group()?;
            }

            column.span = column.span.merge(start.merge(self.previous_span()));
        }

        Ok(column)
    }

    /// Parse a column-level constraint.
    fn parse_column_constraint(&mut self) -> Result<ColumnConstraint, ParseError> {
        let start = self.current_span();
        let name = if self.eat_keyword("CONSTRAINT") {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let kind = if self.eat_keyword("PRIMARY") {
            self.expect_keyword("KEY")?;
            let clustered = self.parse_clustered();
            self.skip_index_options()?;
            ColumnConstraintKind::PrimaryKey { clustered }
        } else if self.eat_keyword("UNIQUE") {
            let clustered = self.parse_clustered();
            self.skip_index_options()?;
            ColumnConstraintKind::Unique { clustered }
        } else if self.peek_keyword("FOREIGN") || self.peek_keyword("REFERENCES") {
            if self.eat_keyword("FOREIGN") {
                self.expect_keyword("KEY")?;
            }
            ColumnConstraintKind::References(self.parse_references()?)
        } else if self.eat_keyword("CHECK") {
            self.skip_not_for_replication();
            let inner = self.skip_group()?;
            ColumnConstraintKind::Check {
                expression: inner.slice(self.source).trim().to_string(),
            }
        } else if self.eat_keyword("DEFAULT") {
            let expression = self.parse_default_expression()?;
            if self.peek_keyword("WITH") && self.peek_nth_keyword(1, "VALUES") {
                self.advance();
                self.advance();
            }
            ColumnConstraintKind::Default { expression }
        } else {
            let tok = self.next_token()?;
            return Err(ParseError::new(
                format!("expected constraint definition, found {:?}", tok.token),
                tok.span,
            ));
        };

        Ok(ColumnConstraint {
            name,
            kind,
            span: start.merge(self.previous_span()),
        })
    }

    /// Parse a table-level constraint (body element or `ALTER TABLE ... ADD`).
    fn parse_table_constraint(&mut self) -> Result<TableConstraint, ParseError> {
        let start = self.current_span();
        let name = if self.eat_keyword("CONSTRAINT") {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let kind = if self.eat_keyword("PRIMARY") {
            self.expect_keyword("KEY")?;
            let clustered = self.parse_clustered();
            let columns = self.parse_column_list()?;
            self.skip_index_options()?;
            TableConstraintKind::PrimaryKey { columns, clustered }
        } else if self.eat_keyword("UNIQUE") {
            let clustered = self.parse_clustered();
            let columns = self.parse_column_list()?;
            self.skip_index_options()?;
            TableConstraintKind::Unique { columns, clustered }
        } else if self.eat_keyword("FOREIGN") {
            self.expect_keyword("KEY")?;
            let columns = self.parse_column_list()?;
            let references = self.parse_references()?;
            if !references.columns.is_empty() && references.columns.len() != columns.len() {
                return Err(ParseError::new(
                    format!(
                        "foreign key has {} columns but references {}",
                        columns.len(),
                        references.columns.len()
                    ),
                    start.merge(self.previous_span()),
                ));
            }
            TableConstraintKind::ForeignKey {
                columns,
                references,
            }
        } else if self.eat_keyword("CHECK") {
            self.skip_not_for_replication();
            let inner = self.skip_group()?;
            TableConstraintKind::Check {
                expression: inner.slice(self.source).trim().to_string(),
            }
        } else if self.eat_keyword("DEFAULT") {
            let expression = self.parse_default_expression()?;
            self.expect_keyword("FOR")?;
            let column = self.expect_identifier()?;
            if self.peek_keyword("WITH") && self.peek_nth_keyword(1, "VALUES") {
                self.advance();
                self.advance();
            }
            TableConstraintKind::Default { expression, column }
        } else {
            let tok = self.next_token()?;
            return Err(ParseError::new(
                format!("expected constraint definition, found {:?}", tok.token),
                tok.span,
            ));
        };

        Ok(TableConstraint {
            name,
            kind,
            span: start.merge(self.previous_span()),
        })
    }

    /// Parse `REFERENCES table [(cols)] [ON DELETE ...] [ON UPDATE ...]`.
    fn parse_references(&mut self) -> Result<ForeignKeyRef, ParseError> {
        self.expect_keyword("REFERENCES")?;
        let table = self.parse_object_name()?;
        let columns = if self.peek_is(&Token::LParen) {
            self.parse_column_list()?
        } else {
            Vec::new()
        };

        let mut on_delete = ReferentialAction::NoAction;
        let mut on_update = ReferentialAction::NoAction;
        while self.peek_keyword("ON")
            && (self.peek_nth_keyword(1, "DELETE") || self.peek_nth_keyword(1, "UPDATE"))
        {
            self.advance();
            let is_delete = self.eat_keyword("DELETE");
            if !is_delete {
                self.expect_keyword("UPDATE")?;
            }
            let action = self.parse_referential_action()?;
            if is_delete {
                on_delete = action;
            } else {
                on_update = action;
            }
        }
        self.skip_not_for_replication();

        Ok(ForeignKeyRef {
            table,
            columns,
            on_delete,
            on_update,
        })
    }

    fn parse_referential_action(&mut self) -> Result<ReferentialAction, ParseError> {
        if self.eat_keyword("CASCADE") {
            return Ok(ReferentialAction::Cascade);
        }
        if self.eat_keyword("NO") {
            self.expect_keyword("ACTION")?;
            return Ok(ReferentialAction::NoAction);
        }
        self.expect_keyword("SET")?;
        if self.eat_keyword("NULL") {
            return Ok(ReferentialAction::SetNull);
        }
        self.expect_keyword("DEFAULT")?;
        Ok(ReferentialAction::SetDefault)
    }

    /// Parse an inline `INDEX name [UNIQUE] [CLUSTERED] (cols)` element.
    fn parse_inline_index(&mut self) -> Result<IndexDef, ParseError> {
        let start = self.expect_keyword("INDEX")?;
        let name = self.expect_identifier()?;
        let unique = self.eat_keyword("UNIQUE");
        let clustered = self.parse_clustered();
        self.eat_keyword("COLUMNSTORE");
        let columns = if self.peek_is(&Token::LParen) {
            self.parse_column_list()?
        } else {
            Vec::new()
        };

        Ok(IndexDef {
            name,
            columns,
            unique,
            clustered,
            span: start.merge(self.previous_span()),
        })
    }

    /// Parse `CREATE [UNIQUE] [CLUSTERED] INDEX name ON table (cols) ...`.
    fn parse_create_index(&mut self, start: Span) -> Result<CreateIndex, ParseError> {
        let mut unique = false;
        let mut clustered = None;
        loop {
            if self.eat_keyword("UNIQUE") {
                unique = true;
            } else if self.eat_keyword("CLUSTERED") {
                clustered = Some(true);
            } else if self.eat_keyword("NONCLUSTERED") {
                clustered = Some(false);
            } else if self.eat_keyword("INDEX") {
                break;
            } else {
                // COLUMNSTORE, XML, SPATIAL, PRIMARY (XML)
                self.next_token()?;
            }
        }

        let name = self.expect_identifier()?;
        self.expect_keyword("ON")?;
        let table = self.parse_object_name()?;
        let columns = if self.peek_is(&Token::LParen) {
            self.parse_column_list()?
        } else {
            Vec::new()
        };
        let index_span = start.merge(self.previous_span());
        let end = self.skip_statement_rest(index_span);

        Ok(CreateIndex {
            table,
            index: IndexDef {
                name,
                columns,
                unique,
                clustered,
                span: index_span,
            },
            span: start.merge(end),
        })
    }

    /// Parse `ALTER TABLE` after the `TABLE` keyword.
    fn parse_alter_table(&mut self, start: Span) -> Result<AlterTable, ParseError> {
        let table = self.parse_object_name()?;
        let mut actions = Vec::new();
        let mut end = table.span();

        if self.peek_keyword("WITH") && self.peek_nth_any_keyword(1, &["CHECK", "NOCHECK"]) {
            self.advance();
            self.advance();
        }

        if self.eat_keyword("ADD") {
            loop {
                if self.peek_any_keyword(&[
                    "CONSTRAINT",
                    "PRIMARY",
                    "UNIQUE",
                    "FOREIGN",
                    "CHECK",
                    "DEFAULT",
                ]) {
                    let constraint = self.parse_table_constraint()?;
                    end = constraint.span;
                    actions.push(AlterTableAction::AddConstraint(constraint));
                } else {
                    // Added column or period: not modelled.
                    let item_start = self.current_span();
                    let item = self.skip_alter_item(item_start)?;
                    end = item;
                    actions.push(AlterTableAction::Other(item));
                }

                if self.peek_is(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }

        if !self.at_statement_end() {
            let rest_start = self.current_span();
            let rest = self.skip_statement(rest_start);
            end = rest;
            actions.push(AlterTableAction::Other(rest));
        }

        Ok(AlterTable {
            table,
            actions,
            span: start.merge(end),
        })
    }

    /// Parse `( option [, option]* )` after `WITH`.
    fn parse_option_list(&mut self) -> Result<(Vec<TableOption>, Span), ParseError> {
        self.expect_token(Token::LParen)?;
        let mut options = Vec::new();

        let close = loop {
            if self.peek_is(&Token::RParen) {
                break self.next_token()?;
            }
            options.push(self.parse_option()?);
            let sep = self.next_token()?;
            match sep.token {
                Token::Comma => continue,
                Token::RParen => break sep,
                other => {
                    return Err(ParseError::new(
                        format!("expected ',' or ')' in option list, found {:?}", other),
                        sep.span,
                    ))
                }
            }
        };

        Ok((options, close.span))
    }

    /// Parse `name [= value] [( nested )]`.
    fn parse_option(&mut self) -> Result<TableOption, ParseError> {
        let name_tok = self.next_token()?;
        let name = match name_tok.token {
            Token::Word(w) | Token::QuotedIdent(w) | Token::Number(w) | Token::Str(w) => {
                Spanned::new(w, name_tok.span)
            }
            other => {
                return Err(ParseError::new(
                    format!("expected option name, found {:?}", other),
                    name_tok.span,
                ))
            }
        };

        let mut value = Vec::new();
        let mut nested = Vec::new();
        if self.peek_is(&Token::Eq) {
            self.advance();
        }

        loop {
            let Some(tok) = self.peek() else { break };
            match &tok.token {
                Token::Comma | Token::RParen => break,
                Token::Dot => {
                    self.advance();
                }
                Token::LParen => {
                    let (opts, _) = self.parse_option_list()?;
                    nested.extend(opts);
                }
                Token::Word(w) | Token::QuotedIdent(w) | Token::Number(w) | Token::Str(w) => {
                    value.push(w.clone());
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }

        Ok(TableOption {
            span: name.span.merge(self.previous_span()),
            name,
            value,
            nested,
        })
    }

    /// Parse a data type such as `NVARCHAR(320)`, `DECIMAL(18, 2)` or `dbo.Money`.
    fn parse_data_type(&mut self) -> Result<String, ParseError> {
        let first = self.expect_identifier()?;
        let mut data_type = first.value;

        while self.peek_is(&Token::Dot) {
            self.advance();
            let part = self.expect_identifier()?;
            data_type.push('.');
            data_type.push_str(&part.value);
        }

        // DOUBLE PRECISION, CHAR VARYING, NATIONAL CHARACTER VARYING
        while self.peek_any_keyword(&["PRECISION", "VARYING", "CHARACTER", "CHAR"]) {
            if let Some(tok) = self.advance() {
                if let Some(word) = tok.token.identifier() {
                    data_type.push(' ');
                    data_type.push_str(word);
                }
            }
        }

        if self.peek_is(&Token::LParen) {
            let inner = self.skip_group()?;
            let args: Vec<&str> = inner
                .slice(self.source)
                .split(',')
                .map(str::trim)
                .collect();
            data_type.push('(');
            data_type.push_str(&args.join(", "));
            data_type.push(')');
        }

        Ok(data_type)
    }

    /// Capture a `DEFAULT` expression as written.
    fn parse_default_expression(&mut self) -> Result<String, ParseError> {
        if self.peek_is(&Token::LParen) {
            let inner = self.skip_group()?;
            return Ok(format!("({})", inner.slice(self.source).trim()));
        }

        let start = self.current_span();
        let mut end = start;
        let mut consumed = false;
        while !self.at_element_end() && !(consumed && self.peek_any_keyword(COLUMN_OPTION_STARTS))
        {
            end = self.skip_token_or_group()?;
            consumed = true;
        }

        if !consumed {
            return Err(ParseError::new("expected default expression", start));
        }
        Ok(start.merge(end).slice(self.source).trim().to_string())
    }

    /// Parse `( col [ASC|DESC] [, ...] )`.
    fn parse_column_list(&mut self) -> Result<Vec<Spanned<String>>, ParseError> {
        self.expect_token(Token::LParen)?;
        let mut columns = Vec::new();

        loop {
            columns.push(self.expect_identifier()?);
            self.eat_keyword("ASC");
            self.eat_keyword("DESC");

            let sep = self.next_token()?;
            match sep.token {
                Token::Comma => continue,
                Token::RParen => break,
                other => {
                    return Err(ParseError::new(
                        format!("expected ',' or ')' in column list, found {:?}", other),
                        sep.span,
                    ))
                }
            }
        }

        Ok(columns)
    }

    /// Parse a dotted object name, keeping the last two parts.
    fn parse_object_name(&mut self) -> Result<ObjectName, ParseError> {
        let mut parts = vec![Some(self.expect_identifier()?)];

        while self.peek_is(&Token::Dot) {
            self.advance();
            // `db..table` leaves the schema part empty
            while self.peek_is(&Token::Dot) {
                self.advance();
                parts.push(None);
            }
            parts.push(Some(self.expect_identifier()?));
        }

        let name = parts
            .pop()
            .flatten()
            .ok_or_else(|| ParseError::new("expected object name", self.current_span()))?;
        Ok(ObjectName {
            schema: parts.pop().flatten(),
            name,
        })
    }

    fn parse_clustered(&mut self) -> Option<bool> {
        if self.eat_keyword("CLUSTERED") {
            Some(true)
        } else if self.eat_keyword("NONCLUSTERED") {
            Some(false)
        } else {
            None
        }
    }

    /// Skip `WITH (...)` and `ON filegroup` after a key or index definition.
    fn skip_index_options(&mut self) -> Result<(), ParseError> {
        loop {
            if self.peek_keyword("WITH") && self.peek_nth_is(1, &Token::LParen) {
                self.advance();
                self.skip_group()?;
            } else if self.peek_keyword("ON")
                && !self.peek_nth_any_keyword(1, &["DELETE", "UPDATE"])
            {
                self.advance();
                self.next_token()?;
                if self.peek_is(&Token::LParen) {
                    self.skip_group()?;
                }
            } else {
                return Ok(());
            }
        }
    }

    fn skip_not_for_replication(&mut self) {
        if self.peek_keyword("NOT")
            && self.peek_nth_keyword(1, "FOR")
            && self.peek_nth_keyword(2, "REPLICATION")
        {
            self.advance();
            self.advance();
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Token-level helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&SpannedToken> {
        self.tokens.get(self.pos + n)
    }

    fn peek_is(&self, expected: &Token) -> bool {
        self.peek().is_some_and(|t| &t.token == expected)
    }

    fn peek_nth_is(&self, n: usize, expected: &Token) -> bool {
        self.peek_nth(n).is_some_and(|t| &t.token == expected)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.token.is_keyword(keyword))
    }

    fn peek_any_keyword(&self, keywords: &[&str]) -> bool {
        self.peek().is_some_and(|t| t.token.is_any_keyword(keywords))
    }

    fn peek_nth_keyword(&self, n: usize, keyword: &str) -> bool {
        self.peek_nth(n).is_some_and(|t| t.token.is_keyword(keyword))
    }

    fn peek_nth_any_keyword(&self, n: usize, keywords: &[&str]) -> bool {
        self.peek_nth(n)
            .is_some_and(|t| t.token.is_any_keyword(keywords))
    }

    fn peek_object_kind(&self) -> Option<ObjectKind> {
        let tok = &self.peek()?.token;
        if tok.is_keyword("TRIGGER") {
            Some(ObjectKind::Trigger)
        } else if tok.is_keyword("VIEW") {
            Some(ObjectKind::View)
        } else if tok.is_any_keyword(&["PROC", "PROCEDURE"]) {
            Some(ObjectKind::Procedure)
        } else if tok.is_keyword("FUNCTION") {
            Some(ObjectKind::Function)
        } else {
            None
        }
    }

    /// Check for the modifiers that may precede `INDEX` in `CREATE ... INDEX`.
    fn peek_index_head(&self) -> bool {
        const MODIFIERS: &[&str] = &[
            "UNIQUE",
            "CLUSTERED",
            "NONCLUSTERED",
            "COLUMNSTORE",
            "XML",
            "SPATIAL",
            "PRIMARY",
        ];
        let mut n = 0;
        while self.peek_nth_any_keyword(n, MODIFIERS) {
            n += 1;
        }
        self.peek_nth_keyword(n, "INDEX")
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Get the next token or error if EOF.
    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        self.advance().ok_or_else(|| {
            ParseError::new(
                "unexpected end of input",
                Span::new(self.source.len(), self.source.len()),
            )
        })
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Span, ParseError> {
        let tok = self.next_token()?;
        if tok.token.is_keyword(keyword) {
            Ok(tok.span)
        } else {
            Err(ParseError::new(
                format!("expected {}, found {:?}", keyword, tok.token),
                tok.span,
            ))
        }
    }

    /// Expect and consume a specific token.
    fn expect_token(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {:?}, found {:?}", expected, tok.token),
                tok.span,
            ))
        }
    }

    /// Expect and consume an identifier (bare or delimited).
    fn expect_identifier(&mut self) -> Result<Spanned<String>, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Word(name) | Token::QuotedIdent(name) => Ok(Spanned::new(name, tok.span)),
            other => Err(ParseError::new(
                format!("expected identifier, found {:?}", other),
                tok.span,
            )),
        }
    }

    fn current_span(&self) -> Span {
        self.peek()
            .map(|t| t.span)
            .unwrap_or_else(|| Span::new(self.source.len(), self.source.len()))
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_default()
    }

    /// Consume a balanced parenthesised group; returns the span of its contents.
    fn skip_group(&mut self) -> Result<Span, ParseError> {
        let open = self.expect_token(Token::LParen)?;
        let mut depth = 1usize;
        loop {
            let tok = self.next_token().map_err(|e| {
                ParseError::new("unbalanced parentheses", open.span).with_hint(e.message)
            })?;
            match tok.token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Span::new(open.span.end, tok.span.start));
                    }
                }
                _ => {}
            }
        }
    }

    /// Consume one token, or a whole group if the next token opens one.
    fn skip_token_or_group(&mut self) -> Result<Span, ParseError> {
        if self.peek_is(&Token::LParen) {
            let start = self.current_span();
            self.skip_group()?;
            Ok(start.merge(self.previous_span()))
        } else {
            Ok(self.next_token()?.span)
        }
    }

    /// True at `,` or `)` (the end of a table element) or EOF.
    fn at_element_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(t) => matches!(t.token, Token::Comma | Token::RParen),
        }
    }

    /// Skip whatever remains of a table element.
    fn skip_element_rest(&mut self) -> Result<(), ParseError> {
        while !self.at_element_end() {
            self.skip_token_or_group()?;
        }
        Ok(())
    }

    /// Skip to the end of the current element, returning the skipped span.
    fn skip_to_element_end(&mut self) -> Result<Span, ParseError> {
        let start = self.current_span();
        let mut end = start;
        while !self.at_element_end() {
            end = self.skip_token_or_group()?;
        }
        Ok(start.merge(end))
    }

    /// True at `;`, `GO`, a statement-starting keyword, or EOF.
    fn at_statement_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(t) => {
                t.token == Token::Semicolon
                    || t.token.is_batch_separator()
                    || t.token.is_any_keyword(STATEMENT_STARTS)
            }
        }
    }

    /// Skip one `ALTER TABLE ... ADD` item up to `,` or the statement end.
    fn skip_alter_item(&mut self, start: Span) -> Result<Span, ParseError> {
        let mut end = start;
        while !self.at_statement_end() && !self.peek_is(&Token::Comma) {
            end = self.skip_token_or_group()?;
        }
        Ok(start.merge(end))
    }

    /// Skip an unmodelled statement, always consuming at least one token.
    fn skip_statement(&mut self, start: Span) -> Span {
        let mut end = start;
        let mut depth = 0usize;
        let mut first = true;

        while let Some(tok) = self.peek() {
            if !first && depth == 0 {
                if tok.token.is_batch_separator() || tok.token.is_any_keyword(STATEMENT_STARTS) {
                    break;
                }
                if tok.token == Token::Semicolon {
                    self.advance();
                    break;
                }
            }
            match tok.token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            end = tok.span;
            first = false;
            self.advance();
        }

        start.merge(end)
    }

    /// Skip what remains of a statement whose head was already parsed.
    fn skip_statement_rest(&mut self, head: Span) -> Span {
        if self.at_statement_end() {
            return head;
        }
        let start = self.current_span();
        head.merge(self.skip_statement(start))
    }

    /// Skip to the next `GO` (not consumed) or EOF.
    fn skip_batch(&mut self, start: Span) -> Span {
        let mut end = start;
        while let Some(tok) = self.peek() {
            if tok.token.is_batch_separator() {
                break;
            }
            end = tok.span;
            self.advance();
        }
        start.merge(end)
    }
}

/// Parse a source string into a script.
pub fn parse(source: &str) -> Result<Script, ParseError> {
    Parser::new(source).parse_script()
}

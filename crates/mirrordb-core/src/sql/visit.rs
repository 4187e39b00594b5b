// crates/mirrordb-core/src/sql/visit.rs
// ============================================================================
// Module: AST Traversal
// Description: Breadth-first walk over the SQL syntax tree.
// Purpose: Let classification search descendants without ad hoc recursion.
// Dependencies: crate::sql::ast
// ============================================================================

//! ## Overview
//! [`Node`] is a borrowed view of any interior AST position. [`Node::children`]
//! lists the direct descendants in source order, and [`BreadthFirst`] walks a
//! tree level by level. Classification uses the walk to answer "does this
//! statement embed a query" and "which tables does it reference".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;

use crate::sql::ast::AlterAction;
use crate::sql::ast::Assignment;
use crate::sql::ast::ColumnConstraint;
use crate::sql::ast::ColumnDef;
use crate::sql::ast::CreateTableBody;
use crate::sql::ast::Expr;
use crate::sql::ast::FunctionArgs;
use crate::sql::ast::InsertSource;
use crate::sql::ast::JoinConstraint;
use crate::sql::ast::Limit;
use crate::sql::ast::OrderByExpr;
use crate::sql::ast::OtherStatement;
use crate::sql::ast::Query;
use crate::sql::ast::Select;
use crate::sql::ast::SelectItem;
use crate::sql::ast::SetExpr;
use crate::sql::ast::SqlStatement;
use crate::sql::ast::TableConstraint;
use crate::sql::ast::TableFactor;
use crate::sql::ast::TableWithJoins;
use crate::sql::ast::UpsertAction;
use crate::sql::ast::WindowSpec;
use crate::sql::ast::With;

// ============================================================================
// SECTION: Nodes
// ============================================================================

/// Borrowed reference to one position in the AST.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// A statement (top level or trigger body).
    Statement(&'a SqlStatement),
    /// A query with its CTEs, ordering, and limit.
    Query(&'a Query),
    /// A query body.
    SetExpr(&'a SetExpr),
    /// A select core.
    Select(&'a Select),
    /// A relation with its joins.
    TableWithJoins(&'a TableWithJoins),
    /// A single relation.
    TableFactor(&'a TableFactor),
    /// An expression.
    Expr(&'a Expr),
}

impl<'a> Node<'a> {
    /// Returns the direct children in source order.
    #[must_use]
    pub fn children(self) -> Vec<Self> {
        let mut out = Children::default();
        match self {
            Node::Statement(statement) => out.statement(statement),
            Node::Query(query) => out.query(query),
            Node::SetExpr(body) => match body {
                SetExpr::Select(select) => out.push(Node::Select(select)),
                SetExpr::Values(rows) => rows.iter().flatten().for_each(|e| out.expr(e)),
                SetExpr::Compound {
                    left,
                    right,
                    ..
                } => {
                    out.push(Node::SetExpr(left));
                    out.push(Node::SetExpr(right));
                }
            },
            Node::Select(select) => out.select(select),
            Node::TableWithJoins(table) => {
                out.push(Node::TableFactor(&table.relation));
                for join in &table.joins {
                    out.push(Node::TableFactor(&join.relation));
                    if let JoinConstraint::On(expr) = &join.constraint {
                        out.expr(expr);
                    }
                }
            }
            Node::TableFactor(factor) => match factor {
                TableFactor::Table {
                    ..
                } => {}
                TableFactor::Function {
                    args, ..
                } => args.iter().for_each(|e| out.expr(e)),
                TableFactor::Derived {
                    subquery, ..
                } => out.push(Node::Query(subquery)),
                TableFactor::NestedJoin(nested) => out.push(Node::TableWithJoins(nested)),
            },
            Node::Expr(expr) => out.expr_children(expr),
        }
        out.nodes
    }
}

/// Accumulator used while listing children.
#[derive(Default)]
struct Children<'a> {
    /// Collected nodes.
    nodes: Vec<Node<'a>>,
}

impl<'a> Children<'a> {
    /// Appends one node.
    fn push(&mut self, node: Node<'a>) {
        self.nodes.push(node);
    }

    /// Appends an expression node.
    fn expr(&mut self, expr: &'a Expr) {
        self.nodes.push(Node::Expr(expr));
    }

    /// Appends an optional expression node.
    fn opt_expr(&mut self, expr: Option<&'a Expr>) {
        if let Some(expr) = expr {
            self.expr(expr);
        }
    }

    /// Appends CTE queries.
    fn with(&mut self, with: Option<&'a With>) {
        if let Some(with) = with {
            for cte in &with.ctes {
                self.push(Node::Query(&cte.query));
            }
        }
    }

    /// Appends projected or returned expressions.
    fn items(&mut self, items: &'a [SelectItem]) {
        for item in items {
            if let SelectItem::Expr {
                expr, ..
            } = item
            {
                self.expr(expr);
            }
        }
    }

    /// Appends `ORDER BY` and `LIMIT` expressions.
    fn order_and_limit(&mut self, order_by: &'a [OrderByExpr], limit: Option<&'a Limit>) {
        order_by.iter().for_each(|term| self.expr(&term.expr));
        if let Some(limit) = limit {
            self.expr(&limit.limit);
            self.opt_expr(limit.offset.as_ref());
        }
    }

    /// Appends assignment values.
    fn assignments(&mut self, assignments: &'a [Assignment]) {
        assignments.iter().for_each(|a| self.expr(&a.value));
    }

    /// Appends window expressions.
    fn window(&mut self, spec: &'a WindowSpec) {
        spec.partition_by.iter().for_each(|e| self.expr(e));
        spec.order_by.iter().for_each(|term| self.expr(&term.expr));
    }

    /// Appends expressions embedded in a column definition.
    fn column(&mut self, column: &'a ColumnDef) {
        for constraint in &column.constraints {
            match constraint {
                ColumnConstraint::Check(expr) | ColumnConstraint::Default(expr) => self.expr(expr),
                ColumnConstraint::Generated {
                    expr, ..
                } => self.expr(expr),
                ColumnConstraint::PrimaryKey {
                    ..
                }
                | ColumnConstraint::AutoIncrement
                | ColumnConstraint::NotNull
                | ColumnConstraint::Null
                | ColumnConstraint::Unique
                | ColumnConstraint::Collate(_)
                | ColumnConstraint::References(_) => {}
            }
        }
    }

    /// Appends statement children.
    fn statement(&mut self, statement: &'a SqlStatement) {
        match statement {
            SqlStatement::Begin(_)
            | SqlStatement::Commit
            | SqlStatement::Rollback
            | SqlStatement::DropTable(_) => {}
            SqlStatement::CreateTable(create) => match &create.body {
                CreateTableBody::Columns {
                    columns,
                    constraints,
                    ..
                } => {
                    columns.iter().for_each(|c| self.column(c));
                    for constraint in constraints {
                        if let TableConstraint::Check(expr) = constraint {
                            self.expr(expr);
                        }
                    }
                }
                CreateTableBody::AsSelect(query) => self.push(Node::Query(query)),
            },
            SqlStatement::AlterTable(alter) => {
                if let AlterAction::AddColumn(column) = &alter.action {
                    self.column(column);
                }
            }
            SqlStatement::Insert(insert) => {
                self.with(insert.with.as_ref());
                match &insert.source {
                    InsertSource::Values(rows) => rows.iter().flatten().for_each(|e| self.expr(e)),
                    InsertSource::Query(query) => self.push(Node::Query(query)),
                    InsertSource::DefaultValues => {}
                }
                for upsert in &insert.upsert {
                    upsert.target.iter().for_each(|e| self.expr(e));
                    self.opt_expr(upsert.target_selection.as_ref());
                    if let UpsertAction::Update {
                        assignments,
                        selection,
                    } = &upsert.action
                    {
                        self.assignments(assignments);
                        self.opt_expr(selection.as_ref());
                    }
                }
                self.items(&insert.returning);
            }
            SqlStatement::Update(update) => {
                self.with(update.with.as_ref());
                self.assignments(&update.assignments);
                update.from.iter().for_each(|t| self.push(Node::TableWithJoins(t)));
                self.opt_expr(update.selection.as_ref());
                self.items(&update.returning);
                self.order_and_limit(&update.order_by, update.limit.as_ref());
            }
            SqlStatement::Delete(delete) => {
                self.with(delete.with.as_ref());
                self.opt_expr(delete.selection.as_ref());
                self.items(&delete.returning);
                self.order_and_limit(&delete.order_by, delete.limit.as_ref());
            }
            SqlStatement::Query(query) => self.push(Node::Query(query)),
            SqlStatement::Other(other) => self.other(other),
        }
    }

    /// Appends children of statements outside the classified shapes.
    fn other(&mut self, other: &'a OtherStatement) {
        match other {
            OtherStatement::CreateIndex {
                columns,
                selection,
                ..
            } => {
                columns.iter().for_each(|term| self.expr(&term.expr));
                self.opt_expr(selection.as_ref());
            }
            OtherStatement::CreateView {
                query, ..
            } => self.push(Node::Query(query)),
            OtherStatement::CreateTrigger {
                when,
                body,
                ..
            } => {
                self.opt_expr(when.as_ref());
                body.iter().for_each(|s| self.push(Node::Statement(s)));
            }
            OtherStatement::Pragma {
                value, ..
            } => self.opt_expr(value.as_ref()),
            OtherStatement::CreateVirtualTable {
                ..
            }
            | OtherStatement::Drop {
                ..
            }
            | OtherStatement::Vacuum
            | OtherStatement::Analyze(_)
            | OtherStatement::Reindex(_)
            | OtherStatement::Savepoint(_)
            | OtherStatement::Release(_)
            | OtherStatement::RollbackTo(_) => {}
        }
    }

    /// Appends query children.
    fn query(&mut self, query: &'a Query) {
        self.with(query.with.as_ref());
        self.push(Node::SetExpr(&query.body));
        self.order_and_limit(&query.order_by, query.limit.as_ref());
    }

    /// Appends select-core children.
    fn select(&mut self, select: &'a Select) {
        self.items(&select.projection);
        select.from.iter().for_each(|t| self.push(Node::TableWithJoins(t)));
        self.opt_expr(select.selection.as_ref());
        select.group_by.iter().for_each(|e| self.expr(e));
        self.opt_expr(select.having.as_ref());
        select.windows.iter().for_each(|(_, spec)| self.window(spec));
    }

    /// Appends expression children.
    fn expr_children(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Literal(_)
            | Expr::Placeholder(_)
            | Expr::Column {
                ..
            } => {}
            Expr::Unary {
                expr, ..
            }
            | Expr::NullCheck {
                expr, ..
            }
            | Expr::Cast {
                expr, ..
            }
            | Expr::Collate {
                expr, ..
            }
            | Expr::InTable {
                expr, ..
            } => self.expr(expr),
            Expr::Binary {
                left,
                right,
                ..
            } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Between {
                expr,
                low,
                high,
                ..
            } => {
                self.expr(expr);
                self.expr(low);
                self.expr(high);
            }
            Expr::Pattern {
                expr,
                pattern,
                escape,
                ..
            } => {
                self.expr(expr);
                self.expr(pattern);
                self.opt_expr(escape.as_deref());
            }
            Expr::InList {
                expr,
                list,
                ..
            } => {
                self.expr(expr);
                list.iter().for_each(|e| self.expr(e));
            }
            Expr::InSubquery {
                expr,
                subquery,
                ..
            } => {
                self.expr(expr);
                self.push(Node::Query(subquery));
            }
            Expr::Exists {
                subquery, ..
            }
            | Expr::Subquery(subquery) => self.push(Node::Query(subquery)),
            Expr::Function {
                args,
                filter,
                over,
                ..
            } => {
                if let FunctionArgs::List {
                    args, ..
                } = args
                {
                    args.iter().for_each(|e| self.expr(e));
                }
                self.opt_expr(filter.as_deref());
                if let Some(spec) = over {
                    self.window(spec);
                }
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                self.opt_expr(operand.as_deref());
                for (condition, result) in branches {
                    self.expr(condition);
                    self.expr(result);
                }
                self.opt_expr(else_result.as_deref());
            }
            Expr::Nested(exprs) => exprs.iter().for_each(|e| self.expr(e)),
            Expr::Raise {
                message, ..
            } => self.opt_expr(message.as_deref()),
        }
    }
}

// ============================================================================
// SECTION: Breadth-First Walk
// ============================================================================

/// Level-order iterator over a subtree, starting with the root.
pub struct BreadthFirst<'a> {
    /// Nodes waiting to be visited.
    queue: VecDeque<Node<'a>>,
}

impl<'a> Iterator for BreadthFirst<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        self.queue.extend(node.children());
        Some(node)
    }
}

/// Starts a breadth-first walk at `root`.
#[must_use]
pub fn breadth_first(root: Node<'_>) -> BreadthFirst<'_> {
    BreadthFirst {
        queue: VecDeque::from([root]),
    }
}

/// Returns true when any descendant of `statement` is a query.
#[must_use]
pub fn contains_query(statement: &SqlStatement) -> bool {
    breadth_first(Node::Statement(statement)).skip(1).any(|node| matches!(node, Node::Query(_)))
}

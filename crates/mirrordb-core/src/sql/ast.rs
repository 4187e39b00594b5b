// crates/mirrordb-core/src/sql/ast.rs
// ============================================================================
// Module: SQL Syntax Tree
// Description: Tagged-union AST for the accepted SQLite statement shapes.
// Purpose: Give the classifier a typed tree to match on exhaustively.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Every statement the parser accepts becomes one [`SqlStatement`]. The tree
//! keeps only what classification, table extraction, and diff generation
//! need: names, structure, and declared column types as written. It is not a
//! pretty-printer input; the original text is always executed verbatim.

// ============================================================================
// SECTION: Names
// ============================================================================

/// A possibly schema-qualified object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    /// Schema qualifier (`main`, `temp`, attached name).
    pub schema: Option<String>,
    /// Object name as written, quotes removed.
    pub name: String,
}

impl ObjectName {
    /// Creates an unqualified name.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Returns the lower-cased object name used as a set key.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.name.to_lowercase()
    }
}

// ============================================================================
// SECTION: Statements
// ============================================================================

/// One parsed SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlStatement {
    /// `BEGIN` / `START TRANSACTION`.
    Begin(TransactionMode),
    /// `COMMIT` / `END`.
    Commit,
    /// `ROLLBACK` without a savepoint.
    Rollback,
    /// `CREATE TABLE`.
    CreateTable(CreateTable),
    /// `ALTER TABLE`.
    AlterTable(AlterTable),
    /// `DROP TABLE`.
    DropTable(DropTable),
    /// `INSERT` / `REPLACE`.
    Insert(Box<Insert>),
    /// `UPDATE`.
    Update(Box<Update>),
    /// `DELETE`.
    Delete(Box<Delete>),
    /// A bare query (`SELECT`, `VALUES`, `WITH ... SELECT`).
    Query(Box<Query>),
    /// Statements outside the classified shapes.
    Other(Box<OtherStatement>),
}

/// Locking mode requested by `BEGIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// `DEFERRED` or unspecified.
    #[default]
    Deferred,
    /// `IMMEDIATE`.
    Immediate,
    /// `EXCLUSIVE`.
    Exclusive,
}

/// Conflict resolution clause (`OR REPLACE`, `ON CONFLICT ROLLBACK`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// `ROLLBACK`
    Rollback,
    /// `ABORT`
    Abort,
    /// `FAIL`
    Fail,
    /// `IGNORE`
    Ignore,
    /// `REPLACE`
    Replace,
}

// ============================================================================
// SECTION: Table DDL
// ============================================================================

/// `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    /// Table name.
    pub name: ObjectName,
    /// `TEMP` / `TEMPORARY` was given.
    pub temporary: bool,
    /// `IF NOT EXISTS` was given.
    pub if_not_exists: bool,
    /// Column list or `AS select` source.
    pub body: CreateTableBody,
}

/// Source of a `CREATE TABLE` definition.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateTableBody {
    /// Explicit column and constraint list.
    Columns {
        /// Column definitions in declaration order.
        columns: Vec<ColumnDef>,
        /// Table-level constraints.
        constraints: Vec<TableConstraint>,
        /// `WITHOUT ROWID` was given.
        without_rowid: bool,
        /// `STRICT` was given.
        strict: bool,
    },
    /// `AS select`.
    AsSelect(Box<Query>),
}

/// One column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared type text as written (`VARCHAR(20)`), if any.
    pub data_type: Option<String>,
    /// Column constraints in declaration order.
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDef {
    /// Returns true when the column carries an inline `PRIMARY KEY`.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.constraints.iter().any(|c| matches!(c, ColumnConstraint::PrimaryKey { .. }))
    }

    /// Returns true when the column is explicitly auto-incrementing.
    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        self.constraints.iter().any(|c| {
            matches!(
                c,
                ColumnConstraint::PrimaryKey {
                    autoincrement: true,
                    ..
                } | ColumnConstraint::AutoIncrement
            )
        })
    }
}

/// Column-level constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    /// `PRIMARY KEY [ASC|DESC] [conflict] [AUTOINCREMENT]`.
    PrimaryKey {
        /// `DESC` was given.
        descending: bool,
        /// `AUTOINCREMENT` was given.
        autoincrement: bool,
    },
    /// MySQL-style `AUTO_INCREMENT`.
    AutoIncrement,
    /// `NOT NULL`.
    NotNull,
    /// `NULL`.
    Null,
    /// `UNIQUE`.
    Unique,
    /// `CHECK (expr)`.
    Check(Expr),
    /// `DEFAULT value`.
    Default(Expr),
    /// `COLLATE name`.
    Collate(String),
    /// `REFERENCES table (columns)`.
    References(ForeignKey),
    /// `[GENERATED ALWAYS] AS (expr) [STORED|VIRTUAL]`.
    Generated {
        /// Generating expression.
        expr: Expr,
        /// `STORED` was given.
        stored: bool,
    },
}

/// Table-level constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    /// `PRIMARY KEY (columns)`.
    PrimaryKey {
        /// Key columns in order.
        columns: Vec<String>,
        /// `AUTOINCREMENT` given on an indexed column.
        autoincrement: bool,
    },
    /// `UNIQUE (columns)`.
    Unique {
        /// Unique columns.
        columns: Vec<String>,
    },
    /// `CHECK (expr)`.
    Check(Expr),
    /// `FOREIGN KEY (columns) REFERENCES ...`.
    ForeignKey {
        /// Local columns.
        columns: Vec<String>,
        /// Referenced table and columns.
        references: ForeignKey,
    },
}

/// Foreign key target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: ObjectName,
    /// Referenced columns (may be empty).
    pub columns: Vec<String>,
}

/// `ALTER TABLE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    /// Table being altered.
    pub name: ObjectName,
    /// Requested change.
    pub action: AlterAction,
}

/// `ALTER TABLE` action.
#[derive(Debug, Clone, PartialEq)]
pub enum AlterAction {
    /// `RENAME TO new`.
    RenameTable(String),
    /// `RENAME [COLUMN] old TO new`.
    RenameColumn {
        /// Current column name.
        from: String,
        /// New column name.
        to: String,
    },
    /// `ADD [COLUMN] def`.
    AddColumn(ColumnDef),
    /// `DROP [COLUMN] name`.
    DropColumn(String),
}

/// `DROP TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTable {
    /// Table name.
    pub name: ObjectName,
    /// `IF EXISTS` was given.
    pub if_exists: bool,
}

// ============================================================================
// SECTION: Data Modification
// ============================================================================

/// `INSERT` / `REPLACE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    /// Leading `WITH` clause.
    pub with: Option<With>,
    /// `OR action`, or `Replace` for a bare `REPLACE INTO`.
    pub or_action: Option<ConflictAction>,
    /// Target table.
    pub table: ObjectName,
    /// `AS alias`.
    pub alias: Option<String>,
    /// Explicit column list.
    pub columns: Vec<String>,
    /// Row source.
    pub source: InsertSource,
    /// `ON CONFLICT` clauses.
    pub upsert: Vec<Upsert>,
    /// `RETURNING` items.
    pub returning: Vec<SelectItem>,
}

/// Rows supplied to an `INSERT`.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    /// `VALUES (..), (..)`.
    Values(Vec<Vec<Expr>>),
    /// `SELECT ...` or any query.
    Query(Box<Query>),
    /// `DEFAULT VALUES`.
    DefaultValues,
}

/// `ON CONFLICT [(target)] DO ...` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    /// Conflict target columns/expressions.
    pub target: Vec<Expr>,
    /// `WHERE` on the conflict target.
    pub target_selection: Option<Expr>,
    /// Action taken on conflict.
    pub action: UpsertAction,
}

/// Upsert action.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertAction {
    /// `DO NOTHING`.
    Nothing,
    /// `DO UPDATE SET ... [WHERE ...]`.
    Update {
        /// Assignments.
        assignments: Vec<Assignment>,
        /// Optional filter.
        selection: Option<Expr>,
    },
}

/// `col = expr` or `(a, b) = expr` assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Assigned columns.
    pub columns: Vec<String>,
    /// Assigned value.
    pub value: Expr,
}

/// `UPDATE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Leading `WITH` clause.
    pub with: Option<With>,
    /// `OR action`.
    pub or_action: Option<ConflictAction>,
    /// Target table.
    pub table: ObjectName,
    /// `AS alias`.
    pub alias: Option<String>,
    /// `SET` assignments.
    pub assignments: Vec<Assignment>,
    /// `FROM` clause.
    pub from: Vec<TableWithJoins>,
    /// `WHERE` clause.
    pub selection: Option<Expr>,
    /// `RETURNING` items.
    pub returning: Vec<SelectItem>,
    /// `ORDER BY` (when compiled with update-limit support).
    pub order_by: Vec<OrderByExpr>,
    /// `LIMIT` clause.
    pub limit: Option<Limit>,
}

/// `DELETE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// Leading `WITH` clause.
    pub with: Option<With>,
    /// Target table.
    pub table: ObjectName,
    /// `AS alias`.
    pub alias: Option<String>,
    /// `WHERE` clause.
    pub selection: Option<Expr>,
    /// `RETURNING` items.
    pub returning: Vec<SelectItem>,
    /// `ORDER BY` clause.
    pub order_by: Vec<OrderByExpr>,
    /// `LIMIT` clause.
    pub limit: Option<Limit>,
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// A complete query with optional CTEs, ordering, and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// `WITH` clause.
    pub with: Option<With>,
    /// Query body.
    pub body: SetExpr,
    /// `ORDER BY` clause.
    pub order_by: Vec<OrderByExpr>,
    /// `LIMIT` clause.
    pub limit: Option<Limit>,
}

/// `WITH [RECURSIVE]` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct With {
    /// `RECURSIVE` was given.
    pub recursive: bool,
    /// Common table expressions.
    pub ctes: Vec<Cte>,
}

/// One common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    /// Bound name.
    pub name: String,
    /// Optional column names.
    pub columns: Vec<String>,
    /// Defining query.
    pub query: Box<Query>,
}

/// Query body: a select, a values list, or a compound of two bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    /// `SELECT ...`.
    Select(Box<Select>),
    /// `VALUES (...), (...)`.
    Values(Vec<Vec<Expr>>),
    /// `left op right`.
    Compound {
        /// Left operand.
        left: Box<SetExpr>,
        /// Set operator.
        op: SetOperator,
        /// Right operand.
        right: Box<SetExpr>,
    },
}

/// Compound select operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    /// `UNION`
    Union,
    /// `UNION ALL`
    UnionAll,
    /// `INTERSECT`
    Intersect,
    /// `EXCEPT`
    Except,
}

/// One `SELECT` core.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// `DISTINCT` was given.
    pub distinct: bool,
    /// Result columns.
    pub projection: Vec<SelectItem>,
    /// `FROM` clause.
    pub from: Vec<TableWithJoins>,
    /// `WHERE` clause.
    pub selection: Option<Expr>,
    /// `GROUP BY` expressions.
    pub group_by: Vec<Expr>,
    /// `HAVING` clause.
    pub having: Option<Expr>,
    /// `WINDOW name AS (...)` definitions.
    pub windows: Vec<(String, WindowSpec)>,
}

/// One result column.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    /// `table.*`
    QualifiedWildcard(String),
    /// `expr [AS alias]`
    Expr {
        /// Projected expression.
        expr: Expr,
        /// Output alias.
        alias: Option<String>,
    },
}

/// A table factor followed by its joins.
#[derive(Debug, Clone, PartialEq)]
pub struct TableWithJoins {
    /// Leading relation.
    pub relation: TableFactor,
    /// Joined relations.
    pub joins: Vec<Join>,
}

/// One relation in a `FROM` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum TableFactor {
    /// Named table or view.
    Table {
        /// Table name.
        name: ObjectName,
        /// Alias.
        alias: Option<String>,
    },
    /// Table-valued function such as `json_each(x)`.
    Function {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
        /// Alias.
        alias: Option<String>,
    },
    /// Parenthesized subquery.
    Derived {
        /// Subquery.
        subquery: Box<Query>,
        /// Alias.
        alias: Option<String>,
    },
    /// Parenthesized join tree.
    NestedJoin(Box<TableWithJoins>),
}

/// One join step.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join flavor.
    pub kind: JoinKind,
    /// Joined relation.
    pub relation: TableFactor,
    /// Join condition.
    pub constraint: JoinConstraint,
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Comma or `[INNER] JOIN`.
    Inner,
    /// `LEFT [OUTER] JOIN`.
    Left,
    /// `RIGHT [OUTER] JOIN`.
    Right,
    /// `FULL [OUTER] JOIN`.
    Full,
    /// `CROSS JOIN`.
    Cross,
}

/// Join condition.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    /// `ON expr`.
    On(Expr),
    /// `USING (columns)`.
    Using(Vec<String>),
    /// `NATURAL` join.
    Natural,
    /// No condition.
    None,
}

/// `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    /// Sort expression.
    pub expr: Expr,
    /// `DESC` was given.
    pub descending: bool,
}

/// `LIMIT n [OFFSET m]` or `LIMIT m, n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    /// Row limit.
    pub limit: Expr,
    /// Row offset.
    pub offset: Option<Expr>,
}

/// Window definition for `OVER (...)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    /// Base window name.
    pub base: Option<String>,
    /// `PARTITION BY` expressions.
    pub partition_by: Vec<Expr>,
    /// `ORDER BY` terms.
    pub order_by: Vec<OrderByExpr>,
    /// Frame clause text as written.
    pub frame: Option<String>,
}

// ============================================================================
// SECTION: Expressions
// ============================================================================

/// Literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// `NULL`
    Null,
    /// Numeric literal as written.
    Number(String),
    /// String literal.
    String(String),
    /// Blob literal hex digits.
    Blob(String),
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `NOT`
    Not,
    /// `~`
    BitNot,
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `OR`
    Or,
    /// `AND`
    And,
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `||`
    Concat,
    /// `->`
    JsonExtract,
    /// `->>`
    JsonExtractText,
}

/// Pattern-matching operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternOperator {
    /// `LIKE`
    Like,
    /// `GLOB`
    Glob,
    /// `REGEXP`
    Regexp,
    /// `MATCH`
    Match,
}

/// Function call arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArgs {
    /// `f(*)`
    Star,
    /// `f([DISTINCT] a, b)`
    List {
        /// `DISTINCT` was given.
        distinct: bool,
        /// Arguments.
        args: Vec<Expr>,
    },
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Literal),
    /// `?` placeholder with its zero-based ordinal in the statement.
    Placeholder(usize),
    /// Column reference.
    Column {
        /// Qualifying table or alias.
        table: Option<String>,
        /// Column name.
        name: String,
    },
    /// Prefix operator.
    Unary {
        /// Operator.
        op: UnaryOperator,
        /// Operand.
        expr: Box<Expr>,
    },
    /// Infix operator.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOperator,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `expr ISNULL` / `expr NOTNULL` / `expr NOT NULL`.
    NullCheck {
        /// Tested expression.
        expr: Box<Expr>,
        /// True for the not-null forms.
        negated: bool,
    },
    /// `expr [NOT] BETWEEN low AND high`.
    Between {
        /// Tested expression.
        expr: Box<Expr>,
        /// `NOT` was given.
        negated: bool,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
    },
    /// `expr [NOT] LIKE pattern [ESCAPE e]` and friends.
    Pattern {
        /// Tested expression.
        expr: Box<Expr>,
        /// `NOT` was given.
        negated: bool,
        /// Operator.
        op: PatternOperator,
        /// Pattern.
        pattern: Box<Expr>,
        /// Escape character.
        escape: Option<Box<Expr>>,
    },
    /// `expr [NOT] IN (list)`.
    InList {
        /// Tested expression.
        expr: Box<Expr>,
        /// `NOT` was given.
        negated: bool,
        /// Candidates.
        list: Vec<Expr>,
    },
    /// `expr [NOT] IN (subquery)`.
    InSubquery {
        /// Tested expression.
        expr: Box<Expr>,
        /// `NOT` was given.
        negated: bool,
        /// Subquery.
        subquery: Box<Query>,
    },
    /// `expr [NOT] IN table`.
    InTable {
        /// Tested expression.
        expr: Box<Expr>,
        /// `NOT` was given.
        negated: bool,
        /// Table name.
        table: ObjectName,
    },
    /// `[NOT] EXISTS (subquery)`.
    Exists {
        /// `NOT` was given.
        negated: bool,
        /// Subquery.
        subquery: Box<Query>,
    },
    /// Scalar subquery.
    Subquery(Box<Query>),
    /// Function call, aggregate, or window function.
    Function {
        /// Function name.
        name: String,
        /// Arguments.
        args: FunctionArgs,
        /// `FILTER (WHERE ...)`.
        filter: Option<Box<Expr>>,
        /// `OVER` window.
        over: Option<WindowSpec>,
    },
    /// `CAST(expr AS type)`.
    Cast {
        /// Cast operand.
        expr: Box<Expr>,
        /// Target type text.
        data_type: String,
    },
    /// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`.
    Case {
        /// Optional operand.
        operand: Option<Box<Expr>>,
        /// `WHEN`/`THEN` pairs.
        branches: Vec<(Expr, Expr)>,
        /// `ELSE` result.
        else_result: Option<Box<Expr>>,
    },
    /// `expr COLLATE name`.
    Collate {
        /// Operand.
        expr: Box<Expr>,
        /// Collation name.
        collation: String,
    },
    /// Parenthesized expression or row value.
    Nested(Vec<Expr>),
    /// `RAISE(action[, message])` inside trigger bodies.
    Raise {
        /// Raise action word.
        action: String,
        /// Error message.
        message: Option<Box<Expr>>,
    },
}

// ============================================================================
// SECTION: Other Statements
// ============================================================================

/// Kind of schema object dropped by `DROP INDEX|VIEW|TRIGGER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Index.
    Index,
    /// View.
    View,
    /// Trigger.
    Trigger,
}

/// Statements outside the classified shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum OtherStatement {
    /// `CREATE [UNIQUE] INDEX`.
    CreateIndex {
        /// Index name.
        name: ObjectName,
        /// Indexed table.
        table: ObjectName,
        /// `UNIQUE` was given.
        unique: bool,
        /// Indexed terms.
        columns: Vec<OrderByExpr>,
        /// Partial index filter.
        selection: Option<Expr>,
    },
    /// `CREATE [TEMP] VIEW`.
    CreateView {
        /// View name.
        name: ObjectName,
        /// Column names.
        columns: Vec<String>,
        /// Defining query.
        query: Box<Query>,
    },
    /// `CREATE [TEMP] TRIGGER`.
    CreateTrigger {
        /// Trigger name.
        name: ObjectName,
        /// Table the trigger is attached to.
        table: ObjectName,
        /// `WHEN` condition.
        when: Option<Expr>,
        /// Body statements.
        body: Vec<SqlStatement>,
    },
    /// `CREATE VIRTUAL TABLE name USING module(args)`.
    CreateVirtualTable {
        /// Table name.
        name: ObjectName,
        /// Module name.
        module: String,
    },
    /// `DROP INDEX|VIEW|TRIGGER`.
    Drop {
        /// Object kind.
        kind: ObjectKind,
        /// Object name.
        name: ObjectName,
        /// `IF EXISTS` was given.
        if_exists: bool,
    },
    /// `PRAGMA name [= value | (value)]`.
    Pragma {
        /// Pragma name.
        name: ObjectName,
        /// Assigned or argument value.
        value: Option<Expr>,
    },
    /// `VACUUM [schema]`.
    Vacuum,
    /// `ANALYZE [target]`.
    Analyze(Option<ObjectName>),
    /// `REINDEX [target]`.
    Reindex(Option<ObjectName>),
    /// `SAVEPOINT name`.
    Savepoint(String),
    /// `RELEASE [SAVEPOINT] name`.
    Release(String),
    /// `ROLLBACK [TRANSACTION] TO [SAVEPOINT] name`.
    RollbackTo(String),
}

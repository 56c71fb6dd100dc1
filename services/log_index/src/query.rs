//! Parameterized SQL assembly.
//!
//! Statements are built as plain text plus an ordered argument list so that
//! filter composition can be inspected and tested without opening a log file.
//! Only [`crate::store::LogStore`] turns a [`LoweredQuery`] into a driver query.

use crate::token::Token;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use std::collections::BTreeSet;

/// A single bound parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Int(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlArg {
    fn from(value: i64) -> Self {
        SqlArg::Int(value)
    }
}

impl From<&str> for SqlArg {
    fn from(value: &str) -> Self {
        SqlArg::Text(value.to_string())
    }
}

impl From<String> for SqlArg {
    fn from(value: String) -> Self {
        SqlArg::Text(value)
    }
}

impl From<&Token> for SqlArg {
    fn from(value: &Token) -> Self {
        SqlArg::Blob(value.as_bytes().to_vec())
    }
}

impl From<Token> for SqlArg {
    fn from(value: Token) -> Self {
        SqlArg::from(&value)
    }
}

/// SQL text with its positional (`?`) arguments, ready to execute
#[derive(Debug, Clone)]
pub struct LoweredQuery {
    operation: &'static str,
    sql: String,
    args: Vec<SqlArg>,
}

impl LoweredQuery {
    pub fn new(operation: &'static str, sql: impl Into<String>) -> Self {
        Self {
            operation,
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn bind(mut self, arg: impl Into<SqlArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Name used for tracing spans and metric labels
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[SqlArg] {
        &self.args
    }

    pub(crate) fn to_sqlx(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for arg in &self.args {
            query = match arg {
                SqlArg::Int(v) => query.bind(*v),
                SqlArg::Text(v) => query.bind(v.as_str()),
                SqlArg::Blob(v) => query.bind(v.as_slice()),
            };
        }
        query
    }
}

/// Incremental builder for statements whose shape depends on the call
#[derive(Debug)]
pub struct SqlBuilder {
    operation: &'static str,
    sql: String,
    args: Vec<SqlArg>,
}

impl SqlBuilder {
    pub fn new(operation: &'static str, head: &str) -> Self {
        Self {
            operation,
            sql: head.to_string(),
            args: Vec::new(),
        }
    }

    pub fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    pub fn push_bind(&mut self, arg: impl Into<SqlArg>) -> &mut Self {
        self.sql.push('?');
        self.args.push(arg.into());
        self
    }

    /// `expr IN (?, ?, ...)`; an empty list lowers to a condition that never holds
    pub fn push_in_list<I>(&mut self, expr: &str, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<SqlArg>,
    {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            self.sql.push_str("1 = 0");
            return self;
        }

        self.sql.push_str(expr);
        self.sql.push_str(" IN (");
        let mut first = true;
        for value in values {
            if !first {
                self.sql.push_str(", ");
            }
            first = false;
            self.push_bind(value);
        }
        self.sql.push(')');
        self
    }

    pub fn finish(self) -> LoweredQuery {
        LoweredQuery {
            operation: self.operation,
            sql: self.sql,
            args: self.args,
        }
    }
}

/// One independent restriction on scenario seeds.
///
/// Filters compose with AND semantics. Set-valued filters are unordered: the
/// sets are kept sorted so the lowered statement does not depend on the order
/// the caller supplied values in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioFilter {
    /// Seed frame token must be one of these
    Tokens(BTreeSet<Token>),
    /// At least one tag of the seed frame must be one of these; the reported
    /// scenario type is then picked among the matching tags only
    Types(BTreeSet<String>),
    /// Map version of the log must be one of these
    MapNames(BTreeSet<String>),
    /// The owning scene must reference an existing mission-goal pose
    RequireMissionGoal,
}

impl ScenarioFilter {
    /// Lower into a boolean SQL expression over the seed query aliases
    /// `f` (lidar_pc), `st` (scenario_tag) and `l` (log)
    fn lower_into(&self, builder: &mut SqlBuilder) {
        match self {
            ScenarioFilter::Tokens(tokens) => {
                builder.push_in_list("f.token", tokens.iter());
            }
            ScenarioFilter::Types(types) => {
                builder.push_in_list("st.type", types.iter().map(String::as_str));
            }
            ScenarioFilter::MapNames(names) => {
                builder.push_in_list("l.map_version", names.iter().map(String::as_str));
            }
            ScenarioFilter::RequireMissionGoal => {
                builder.push(
                    "EXISTS (SELECT 1 FROM scene AS gs \
                     INNER JOIN ego_pose AS gp ON gp.token = gs.goal_ego_pose_token \
                     WHERE gs.token = f.scene_token)",
                );
            }
        }
    }
}

const SCENARIO_SEEDS_HEAD: &str = r#"
    WITH ordered_scenes AS
    (
        SELECT  token,
                ROW_NUMBER() OVER (ORDER BY name ASC, rowid ASC) - 1 AS scene_rank
        FROM scene
    ),
    scene_count AS
    (
        SELECT COUNT(*) AS n FROM scene
    ),
    valid_scenes AS
    (
        SELECT  o.token
        FROM ordered_scenes AS o
        CROSS JOIN scene_count AS c
        WHERE o.scene_rank >= 2 AND o.scene_rank < c.n - 2
    )
    SELECT  f.token AS token,
            f.timestamp AS timestamp,
            l.map_version AS map_name,
            MAX(st.type) AS scenario_type
    FROM lidar_pc AS f
    LEFT OUTER JOIN scenario_tag AS st
        ON st.lidar_pc_token = f.token
    INNER JOIN lidar AS ld
        ON ld.token = f.lidar_token
    INNER JOIN log AS l
        ON l.token = ld.log_token
    INNER JOIN valid_scenes AS vs
        ON vs.token = f.scene_token
"#;

const SCENARIO_SEEDS_TAIL: &str = r#"
    GROUP BY f.rowid, f.token, f.timestamp, l.map_version
    ORDER BY f.timestamp ASC, f.rowid ASC
"#;

/// Lower a conjunction of filters into the scenario seed statement
pub fn lower_scenario_seeds(filters: &[ScenarioFilter]) -> LoweredQuery {
    let mut builder = SqlBuilder::new("scenario_seeds", SCENARIO_SEEDS_HEAD);

    for (i, filter) in filters.iter().enumerate() {
        builder.push(if i == 0 { "    WHERE " } else { "\n      AND " });
        filter.lower_into(&mut builder);
    }

    builder.push(SCENARIO_SEEDS_TAIL);
    builder.finish()
}

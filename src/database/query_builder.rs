use sqlx::{postgres::PgArguments, postgres::PgRow, FromRow, Row};

use crate::database::manager::{Database, DatabaseError};
use crate::filter::{FilterError, FilterOrder, Filters, SortOrder, SqlParam, SqlResult};

/// Builds one paginated SELECT that also carries the total match count.
///
/// Conditions use the "match everything on empty input" form
/// (`... OR $n = ''`) so an empty filter is the same query shape, not a
/// separate code path.
pub struct QueryBuilder {
    table_name: String,
    columns: Vec<String>,
    conditions: Vec<String>,
    params: Vec<SqlParam>,
    order: Option<SortOrder>,
    page: Option<(i64, i64)>,
}

impl QueryBuilder {
    pub fn new(table_name: impl Into<String>, columns: &[&str]) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        validate_identifier(&table_name).map_err(|_| FilterError::InvalidTableName(table_name.clone()))?;
        for column in columns {
            validate_identifier(column)?;
        }
        Ok(Self {
            table_name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            conditions: vec![],
            params: vec![],
            order: None,
            page: None,
        })
    }

    /// Case- and accent-insensitive full-text match; empty `text` matches all rows.
    /// The expression is the one `movies_title_idx` is built on.
    pub fn text_search(mut self, column: &str, text: &str) -> Result<Self, FilterError> {
        validate_identifier(column)?;
        let n = self.push_param(SqlParam::Text(text.to_string()));
        self.conditions.push(format!(
            "(to_tsvector('simple', immutable_unaccent(\"{column}\")) @@ plainto_tsquery('simple', immutable_unaccent(${n})) OR ${n} = '')"
        ));
        Ok(self)
    }

    /// Array column must contain every value (case-insensitive); empty `values` matches all rows.
    /// The expression is the one `movies_genres_idx` is built on.
    pub fn contains_all(mut self, column: &str, values: &[String]) -> Result<Self, FilterError> {
        validate_identifier(column)?;
        let lowered = values.iter().map(|v| v.to_lowercase()).collect();
        let n = self.push_param(SqlParam::TextArray(lowered));
        self.conditions.push(format!(
            "(lower_array(\"{column}\") @> ${n}::text[] OR ${n}::text[] = '{{}}')"
        ));
        Ok(self)
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn paginate(mut self, filters: &Filters) -> Self {
        self.page = Some((filters.limit(), filters.offset()));
        self
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut params = self.params.clone();

        let select_clause = std::iter::once("count(*) OVER() AS total_records".to_string())
            .chain(self.columns.iter().map(|c| format!("\"{}\"", c)))
            .collect::<Vec<_>>()
            .join(", ");

        let where_clause = if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        };

        let order_clause = self
            .order
            .as_ref()
            .map(FilterOrder::generate)
            .unwrap_or_default();

        let limit_clause = match self.page {
            Some((limit, offset)) => {
                params.push(SqlParam::Int(limit));
                let limit_n = params.len();
                params.push(SqlParam::Int(offset));
                let offset_n = params.len();
                format!("LIMIT ${} OFFSET ${}", limit_n, offset_n)
            }
            None => String::new(),
        };

        let query = [
            format!("SELECT {}", select_clause),
            format!("FROM \"{}\"", self.table_name),
            where_clause,
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    /// Runs the query, returning the page of rows and the total match count.
    pub async fn fetch_page<T>(self, db: &Database) -> Result<(Vec<T>, i64), DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql_result = self.to_sql();
        tracing::debug!(query = %sql_result.query, "list query");

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let rows = db.run(q.fetch_all(db.pool())).await?;

        let mut total = 0;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            total = row.try_get::<i64, _>("total_records")?;
            items.push(T::from_row(row)?);
        }
        Ok((items, total))
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    p: &'q SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match p {
        SqlParam::Text(s) => q.bind(s.as_str()),
        SqlParam::TextArray(values) => q.bind(values.as_slice()),
        SqlParam::Int(i) => q.bind(*i),
    }
}

fn validate_identifier(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidColumn(name.to_string()))
    }
}

impl QueryBuilder {
    fn push_param(&mut self, param: SqlParam) -> usize {
        self.params.push(param);
        self.params.len()
    }
}

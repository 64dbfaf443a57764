//! # Query Shaping
//!
//! Turns query-string parameters into a single parameterized `SELECT` over one of
//! the static collection schemas declared in [`crate::models`].
//!
//! A [`QueryFeatures`] value is immutable: every stage consumes it and returns a new
//! value, so stages can be chained with `?`:
//!
//! ```ignore
//! let docs = QueryFeatures::new(&TOURS)
//!     .filter(&params)?
//!     .sort(&params)?
//!     .limit_fields(&params)?
//!     .paginate(&params)
//!     .fetch_all(&state.db_pool)
//!     .await?;
//! ```
//!
//! Field and column names only ever come from the schema. Every caller-supplied
//! value is sent as a bind parameter.

use serde_json::Value;
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::utils::constant::{DEFAULT_PAGE, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, RESERVED_QUERY_KEYS};

/// How a field value is parsed from the query string and compared in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Text,
    /// Postgres enum, compared through its text representation.
    Enum,
    Bool,
    Uuid,
    Timestamp,
    /// Arrays, JSON documents and joined sub-documents. Projection only.
    Opaque,
}

/// One API-visible field of a collection.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// camelCase name used in query strings and JSON output.
    pub name: &'static str,
    /// SQL expression producing the value.
    pub expr: &'static str,
    pub kind: FieldKind,
    /// Whether the field may appear in filters and sort keys.
    pub queryable: bool,
    /// Repeated equality filters on this field form an `IN` set.
    pub multi_value: bool,
    /// Excluded from the default projection.
    pub hidden: bool,
}

impl Field {
    pub const fn new(name: &'static str, expr: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            expr,
            kind,
            queryable: !matches!(kind, FieldKind::Opaque),
            multi_value: false,
            hidden: false,
        }
    }

    /// Derived value: projected, never filtered or sorted on.
    pub const fn computed(self) -> Self {
        Self {
            queryable: false,
            ..self
        }
    }

    pub const fn multi(self) -> Self {
        Self {
            multi_value: true,
            ..self
        }
    }

    pub const fn hidden(self) -> Self {
        Self {
            hidden: true,
            ..self
        }
    }
}

/// Static description of a queryable collection.
#[derive(Debug)]
pub struct Collection {
    pub name: &'static str,
    /// `FROM` clause, including the table alias used by field expressions.
    pub source: &'static str,
    /// Condition every read applies, e.g. hiding secret tours.
    pub base_condition: &'static str,
    pub id_expr: &'static str,
    pub default_sort: &'static str,
    pub fields: &'static [Field],
}

impl Collection {
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Raw query-string pairs in arrival order. Repeated keys are preserved.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(pub Vec<(String, String)>);

impl QueryParams {
    /// Last value supplied for `key`.
    pub fn last(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets `key` to `value`, dropping earlier occurrences.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.retain(|(k, _)| k != key);
        self.0.push((key.to_string(), value.to_string()));
        self
    }
}

impl From<Vec<(String, String)>> for QueryParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl Operator {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gte" => Some(Operator::Gte),
            "gt" => Some(Operator::Gt),
            "lte" => Some(Operator::Lte),
            "lt" => Some(Operator::Lt),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gte => ">=",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Lt => "<",
        }
    }
}

/// A typed filter value, ready to be bound.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(OffsetDateTime),
}

impl FilterValue {
    fn parse(field: &Field, raw: &str) -> AppResult<Self> {
        let parsed = match field.kind {
            FieldKind::Int => raw.parse().ok().map(FilterValue::Int),
            FieldKind::Float => raw.parse().ok().map(FilterValue::Float),
            FieldKind::Text | FieldKind::Enum => Some(FilterValue::Text(raw.to_string())),
            FieldKind::Bool => raw.parse().ok().map(FilterValue::Bool),
            FieldKind::Uuid => Uuid::try_parse(raw).ok().map(FilterValue::Uuid),
            FieldKind::Timestamp => OffsetDateTime::parse(raw, &Rfc3339)
                .ok()
                .map(FilterValue::Timestamp),
            FieldKind::Opaque => None,
        };
        parsed.ok_or_else(|| AppError::bad_request(format!("Invalid {}: {raw}", field.name)))
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        match self {
            FilterValue::Int(v) => qb.push_bind(*v),
            FilterValue::Float(v) => qb.push_bind(*v),
            FilterValue::Text(v) => qb.push_bind(v.clone()),
            FilterValue::Bool(v) => qb.push_bind(*v),
            FilterValue::Uuid(v) => qb.push_bind(*v),
            FilterValue::Timestamp(v) => qb.push_bind(*v),
        };
    }
}

/// One `WHERE` predicate derived from the query string.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub field: &'static Field,
    pub op: Operator,
    /// More than one value renders as `IN (...)`.
    pub values: Vec<FilterValue>,
}

impl Constraint {
    fn push_sql(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(self.field.expr);
        if self.field.kind == FieldKind::Enum {
            qb.push("::text");
        }

        if let [value] = self.values.as_slice() {
            qb.push(" ").push(self.op.as_sql()).push(" ");
            value.push_bind(qb);
            return;
        }

        qb.push(" IN (");
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            value.push_bind(qb);
        }
        qb.push(")");
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SortKey {
    pub field: &'static Field,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_LIMIT,
            offset: (DEFAULT_PAGE - 1) * DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Scope conditions set by handlers rather than by the caller's query string.
#[derive(Debug, Clone)]
enum Scope {
    Equals { expr: &'static str, id: Uuid },
    WithinRadius {
        lat_expr: &'static str,
        lng_expr: &'static str,
        lat: f64,
        lng: f64,
        distance: f64,
        radius: f64,
    },
}

impl Scope {
    fn push_sql(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        match self {
            Scope::Equals { expr, id } => {
                qb.push(*expr).push(" = ").push_bind(*id);
            }
            Scope::WithinRadius {
                lat_expr,
                lng_expr,
                lat,
                lng,
                distance,
                radius,
            } => {
                qb.push("haversine_distance(")
                    .push_bind(*lat)
                    .push(", ")
                    .push_bind(*lng)
                    .push(", ")
                    .push(*lat_expr)
                    .push(", ")
                    .push(*lng_expr)
                    .push(", ")
                    .push_bind(*radius)
                    .push(") <= ")
                    .push_bind(*distance);
            }
        }
    }
}

/// Immutable description of a shaped read over a [`Collection`].
#[derive(Debug, Clone)]
pub struct QueryFeatures {
    collection: &'static Collection,
    scopes: Vec<Scope>,
    constraints: Vec<Constraint>,
    sort: Vec<SortKey>,
    projection: Vec<&'static Field>,
    pagination: Pagination,
}

impl QueryFeatures {
    /// Unfiltered read with the collection's default sort, projection and pagination.
    pub fn new(collection: &'static Collection) -> Self {
        let sort = collection
            .field(collection.default_sort)
            .map(|field| SortKey {
                field,
                descending: true,
            })
            .into_iter()
            .collect();

        Self {
            collection,
            scopes: Vec::new(),
            constraints: Vec::new(),
            sort,
            projection: default_projection(collection),
            pagination: Pagination::default(),
        }
        .with_id_tiebreak()
    }

    /// Restricts the read to rows where `expr` equals `id`.
    pub fn scoped(mut self, expr: &'static str, id: Uuid) -> Self {
        self.scopes.push(Scope::Equals { expr, id });
        self
    }

    /// Restricts the read to rows whose point lies within `distance` of
    /// (`lat`, `lng`), measured on a sphere of the given `radius`.
    pub fn within_radius(
        mut self,
        (lat_expr, lng_expr): (&'static str, &'static str),
        (lat, lng): (f64, f64),
        distance: f64,
        radius: f64,
    ) -> Self {
        self.scopes.push(Scope::WithinRadius {
            lat_expr,
            lng_expr,
            lat,
            lng,
            distance,
            radius,
        });
        self
    }

    /// Builds `WHERE` predicates from every non-reserved parameter.
    ///
    /// Keys are `field` for equality or `field[op]` with `op` one of
    /// `gte`, `gt`, `lte`, `lt`.
    pub fn filter(mut self, params: &QueryParams) -> AppResult<Self> {
        let mut constraints: Vec<Constraint> = Vec::new();

        for (key, raw) in &params.0 {
            if RESERVED_QUERY_KEYS.contains(&key.as_str()) {
                continue;
            }

            let (name, op) = match key.split_once('[') {
                Some((name, rest)) => {
                    let op = rest
                        .strip_suffix(']')
                        .and_then(Operator::parse)
                        .ok_or_else(|| AppError::bad_request(format!("Unknown operator in {key}")))?;
                    (name, op)
                }
                None => (key.as_str(), Operator::Eq),
            };

            let field = self.queryable_field(name, "filter by")?;
            let value = FilterValue::parse(field, raw)?;

            match constraints
                .iter_mut()
                .find(|c| c.field.name == field.name && c.op == op)
            {
                Some(existing) if op == Operator::Eq && field.multi_value => {
                    if !existing.values.contains(&value) {
                        existing.values.push(value);
                    }
                }
                Some(existing) => existing.values = vec![value],
                None => constraints.push(Constraint {
                    field,
                    op,
                    values: vec![value],
                }),
            }
        }

        self.constraints = constraints;
        Ok(self)
    }

    /// Applies `sort=a,-b`. Without it the collection's default sort stays.
    pub fn sort(mut self, params: &QueryParams) -> AppResult<Self> {
        let Some(raw) = params.last("sort") else {
            return Ok(self);
        };

        let mut keys: Vec<SortKey> = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (name, descending) = match token.strip_prefix('-') {
                Some(name) => (name, true),
                None => (token, false),
            };
            let field = self.queryable_field(name, "sort by")?;
            if !keys.iter().any(|k| k.field.name == field.name) {
                keys.push(SortKey { field, descending });
            }
        }

        if !keys.is_empty() {
            self.sort = keys;
        }
        Ok(self.with_id_tiebreak())
    }

    /// Applies `fields=a,b` (inclusion) or `fields=-a,-b` (exclusion).
    pub fn limit_fields(mut self, params: &QueryParams) -> AppResult<Self> {
        let Some(raw) = params.last("fields") else {
            return Ok(self);
        };

        let tokens: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Ok(self);
        }

        let excluding = tokens.iter().filter(|t| t.starts_with('-')).count();
        if excluding != 0 && excluding != tokens.len() {
            return Err(AppError::bad_request(
                "Cannot mix included and excluded fields",
            ));
        }

        let mut named = Vec::with_capacity(tokens.len());
        for token in &tokens {
            let name = token.trim_start_matches('-');
            let field = self
                .collection
                .field(name)
                .ok_or_else(|| AppError::bad_request(format!("Unknown field: {name}")))?;
            named.push(field.name);
        }

        self.projection = if excluding == 0 {
            self.collection
                .fields
                .iter()
                .filter(|f| f.name == "id" || named.contains(&f.name))
                .collect()
        } else {
            default_projection(self.collection)
                .into_iter()
                .filter(|f| !named.contains(&f.name))
                .collect()
        };
        Ok(self)
    }

    /// Applies `page` and `limit`. Invalid values fall back to the defaults and
    /// `limit` is clamped to [`MAX_PAGE_LIMIT`].
    pub fn paginate(mut self, params: &QueryParams) -> Self {
        let positive = |key: &str| {
            params
                .last(key)
                .and_then(|raw| raw.trim().parse::<i64>().ok())
                .filter(|n| *n > 0)
        };

        let page = positive("page").unwrap_or(DEFAULT_PAGE);
        let limit = positive("limit")
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT);

        self.pagination = Pagination {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        };
        self
    }

    pub fn collection_name(&self) -> &'static str {
        self.collection.name
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    /// Names of the projected fields, in output order.
    pub fn projection(&self) -> Vec<&'static str> {
        self.projection.iter().map(|f| f.name).collect()
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Runs the shaped read. An empty result is not an error.
    pub async fn fetch_all<'e, E>(&self, executor: E) -> Result<Vec<Value>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut qb = self.build(true);
        qb.build_query_scalar::<Value>().fetch_all(executor).await
    }

    /// Runs the read without `LIMIT`/`OFFSET`, for handlers that must return
    /// every matching row.
    pub async fn fetch_unpaged<'e, E>(&self, executor: E) -> Result<Vec<Value>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut qb = self.build(false);
        qb.build_query_scalar::<Value>().fetch_all(executor).await
    }

    /// Fetches the single document with the given id, ignoring pagination.
    pub async fn fetch_by_id<'e, E>(self, executor: E, id: Uuid) -> Result<Option<Value>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let expr = self.collection.id_expr;
        let mut qb = self.scoped(expr, id).build(false);
        qb.build_query_scalar::<Value>()
            .fetch_optional(executor)
            .await
    }

    /// Renders the statement. Exposed for inspection in tests.
    pub fn build(&self, paginated: bool) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT jsonb_build_object(");
        for (i, field) in self.projection.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push("'").push(field.name).push("', ").push(field.expr);
        }
        qb.push(") AS doc FROM ")
            .push(self.collection.source)
            .push(" WHERE ")
            .push(self.collection.base_condition);

        for scope in &self.scopes {
            qb.push(" AND ");
            scope.push_sql(&mut qb);
        }
        for constraint in &self.constraints {
            qb.push(" AND ");
            constraint.push_sql(&mut qb);
        }

        qb.push(" ORDER BY ");
        for (i, key) in self.sort.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(key.field.expr)
                .push(if key.descending { " DESC" } else { " ASC" });
        }

        if paginated {
            qb.push(" LIMIT ")
                .push_bind(self.pagination.limit)
                .push(" OFFSET ")
                .push_bind(self.pagination.offset);
        }
        qb
    }

    fn queryable_field(&self, name: &str, action: &str) -> AppResult<&'static Field> {
        let field = self
            .collection
            .field(name)
            .ok_or_else(|| AppError::bad_request(format!("Unknown field: {name}")))?;
        if !field.queryable {
            return Err(AppError::bad_request(format!("Cannot {action} {name}")));
        }
        Ok(field)
    }

    fn with_id_tiebreak(mut self) -> Self {
        if self.sort.iter().any(|k| k.field.name == "id") {
            return self;
        }
        if let Some(field) = self.collection.field("id") {
            self.sort.push(SortKey {
                field,
                descending: false,
            });
        }
        self
    }
}

fn default_projection(collection: &'static Collection) -> Vec<&'static Field> {
    collection.fields.iter().filter(|f| !f.hidden).collect()
}

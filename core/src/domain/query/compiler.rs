//! Compiles a [`Query`] into a backend predicate and ordering clause.
//!
//! The compiler never fails. Fields outside the allow-list, unknown
//! operators and operands that cannot be coerced are dropped one by one, so
//! a hostile query can only ever narrow the result set.

use tracing::{debug, warn};

use crate::domain::query::{
    policies::AllowListConfig,
    ports::{AccessorResolver, ColumnAccessor, ConditionBuilder, TypedValue},
    value_objects::{FieldFilter, FilterOperator, FilterValue, Filters, Query, SortDirection, SortSpec},
};

/// One entry of the ordering clause, in precedence order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm<H> {
    pub handle: H,
    pub direction: SortDirection,
}

/// Compiler output handed to the storage layer. A missing predicate
/// matches every row.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery<C, H> {
    pub predicate: Option<C>,
    pub ordering: Vec<OrderTerm<H>>,
}

#[derive(Debug, Clone, Copy)]
enum PatternKind {
    Contains,
    StartsWith,
    EndsWith,
}

pub struct QueryCompiler<'a, R, B> {
    policy: &'a AllowListConfig,
    resolver: &'a R,
    builder: &'a B,
}

impl<'a, R, B> QueryCompiler<'a, R, B>
where
    R: AccessorResolver,
    B: ConditionBuilder<Handle = R::Handle>,
{
    pub fn new(policy: &'a AllowListConfig, resolver: &'a R, builder: &'a B) -> Self {
        Self {
            policy,
            resolver,
            builder,
        }
    }

    pub fn compile(&self, query: &Query) -> CompiledQuery<B::Condition, R::Handle> {
        CompiledQuery {
            predicate: self.compile_predicate(query.filters.as_ref()),
            ordering: self.compile_ordering(query.sort.as_deref()),
        }
    }

    /// AND of every condition that survives authorization; `None` when
    /// nothing applies.
    pub fn compile_predicate(&self, filters: Option<&Filters>) -> Option<B::Condition> {
        let mut conditions = Vec::new();

        for (field, filter) in filters.into_iter().flatten() {
            if !self.policy.can_filter(field) {
                debug!(field = %field, "dropping filter on field outside the allow-list");
                continue;
            }

            let Some(accessor) = self.resolver.resolve(field) else {
                debug!(field = %field, "dropping filter on field without column metadata");
                continue;
            };

            self.compile_field(field, filter, &accessor, &mut conditions);
        }

        (!conditions.is_empty()).then(|| self.builder.all(conditions))
    }

    /// Allow-listed client sort in the order given, or the endpoint default
    /// when nothing survives. The two are never mixed.
    pub fn compile_ordering(&self, sort: Option<&[SortSpec]>) -> Vec<OrderTerm<R::Handle>> {
        let ordering: Vec<_> = sort
            .unwrap_or_default()
            .iter()
            .filter(|spec| {
                let allowed = self.policy.can_sort(&spec.field);
                if !allowed {
                    debug!(field = %spec.field, "dropping sort on field outside the allow-list");
                }
                allowed
            })
            .filter_map(|spec| self.order_term(spec))
            .collect();

        if !ordering.is_empty() {
            return ordering;
        }

        self.policy
            .default_sort
            .iter()
            .filter_map(|spec| {
                let term = self.order_term(spec);
                if term.is_none() {
                    warn!(field = %spec.field, "default sort field has no column metadata");
                }
                term
            })
            .collect()
    }

    fn order_term(&self, spec: &SortSpec) -> Option<OrderTerm<R::Handle>> {
        self.resolver.resolve(&spec.field).map(|accessor| OrderTerm {
            handle: accessor.handle,
            direction: spec.order,
        })
    }

    fn compile_field(
        &self,
        field: &str,
        filter: &FieldFilter,
        accessor: &ColumnAccessor<R::Handle>,
        conditions: &mut Vec<B::Condition>,
    ) {
        for (token, value) in filter.entries() {
            let Ok(operator) = token.parse::<FilterOperator>() else {
                debug!(field, operator = token, "skipping unknown filter operator");
                continue;
            };

            match self.compile_operator(accessor, operator, value) {
                Some(condition) => conditions.push(condition),
                None => debug!(field, %operator, "skipping filter that does not compile"),
            }
        }
    }

    fn compile_operator(
        &self,
        accessor: &ColumnAccessor<R::Handle>,
        operator: FilterOperator,
        value: &FilterValue,
    ) -> Option<B::Condition> {
        let b = self.builder;
        let column = &accessor.handle;

        match operator {
            FilterOperator::Eq => self.operand(accessor, value).map(|v| b.eq(column, v)),
            FilterOperator::Ne => self.operand(accessor, value).map(|v| b.ne(column, v)),
            FilterOperator::Lt => self.operand(accessor, value).map(|v| b.lt(column, v)),
            FilterOperator::Lte => self.operand(accessor, value).map(|v| b.lte(column, v)),
            FilterOperator::Gt => self.operand(accessor, value).map(|v| b.gt(column, v)),
            FilterOperator::Gte => self.operand(accessor, value).map(|v| b.gte(column, v)),
            FilterOperator::In => self.members(accessor, value).map(|v| b.in_set(column, v)),
            FilterOperator::NotIn => self
                .members(accessor, value)
                .map(|v| b.not_in_set(column, v)),
            FilterOperator::Contains => {
                pattern(value, PatternKind::Contains).map(|p| b.like(column, p))
            }
            FilterOperator::NotContains => {
                pattern(value, PatternKind::Contains).map(|p| b.not_like(column, p))
            }
            FilterOperator::ContainsInsensitive => {
                pattern(value, PatternKind::Contains).map(|p| b.ilike(column, p))
            }
            FilterOperator::NotContainsInsensitive => {
                pattern(value, PatternKind::Contains).map(|p| b.not_ilike(column, p))
            }
            FilterOperator::StartsWith => {
                pattern(value, PatternKind::StartsWith).map(|p| b.like(column, p))
            }
            FilterOperator::EndsWith => {
                pattern(value, PatternKind::EndsWith).map(|p| b.like(column, p))
            }
            FilterOperator::IsNull => Some(if is_truthy(value) {
                b.is_null(column)
            } else {
                b.is_not_null(column)
            }),
            FilterOperator::IsNotNull => Some(if is_truthy(value) {
                b.is_not_null(column)
            } else {
                b.is_null(column)
            }),
            FilterOperator::Between
            | FilterOperator::And
            | FilterOperator::Or
            | FilterOperator::Not => None,
        }
    }

    /// Scalar operand coerced to the column type.
    fn operand(
        &self,
        accessor: &ColumnAccessor<R::Handle>,
        value: &FilterValue,
    ) -> Option<TypedValue> {
        accessor.declared_type.coerce(value.as_single()?)
    }

    /// List operand for `$in`/`$notIn`, coerced element by element. Empty
    /// lists and lists with any bad element yield nothing.
    fn members(
        &self,
        accessor: &ColumnAccessor<R::Handle>,
        value: &FilterValue,
    ) -> Option<Vec<TypedValue>> {
        let FilterValue::List(items) = value else {
            return None;
        };
        if items.is_empty() {
            return None;
        }

        items
            .iter()
            .map(|item| accessor.declared_type.coerce(item))
            .collect()
    }
}

fn pattern(value: &FilterValue, kind: PatternKind) -> Option<String> {
    let escaped = escape_like(value.as_single()?);
    Some(match kind {
        PatternKind::Contains => format!("%{escaped}%"),
        PatternKind::StartsWith => format!("{escaped}%"),
        PatternKind::EndsWith => format!("%{escaped}"),
    })
}

/// Escapes LIKE wildcards so client text only ever matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Reads a null-check toggle. Lists count as truthy.
fn is_truthy(value: &FilterValue) -> bool {
    match value {
        FilterValue::Single(raw) => !matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "false" | "0" | "no" | "off" | ""
        ),
        FilterValue::List(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;

    use super::*;
    use crate::domain::query::ports::{ColumnMap, ColumnType, MockAccessorResolver};

    /// Builds a readable condition tree instead of SQL.
    #[derive(Debug, Clone, PartialEq)]
    enum Cond {
        Cmp(&'static str, String, TypedValue),
        Set(&'static str, String, Vec<TypedValue>),
        Like(&'static str, String, String),
        Null(&'static str, String),
        All(Vec<Cond>),
    }

    struct Recorder;

    impl ConditionBuilder for Recorder {
        type Handle = String;
        type Condition = Cond;

        fn eq(&self, column: &String, value: TypedValue) -> Cond {
            Cond::Cmp("=", column.clone(), value)
        }
        fn ne(&self, column: &String, value: TypedValue) -> Cond {
            Cond::Cmp("<>", column.clone(), value)
        }
        fn lt(&self, column: &String, value: TypedValue) -> Cond {
            Cond::Cmp("<", column.clone(), value)
        }
        fn lte(&self, column: &String, value: TypedValue) -> Cond {
            Cond::Cmp("<=", column.clone(), value)
        }
        fn gt(&self, column: &String, value: TypedValue) -> Cond {
            Cond::Cmp(">", column.clone(), value)
        }
        fn gte(&self, column: &String, value: TypedValue) -> Cond {
            Cond::Cmp(">=", column.clone(), value)
        }
        fn in_set(&self, column: &String, values: Vec<TypedValue>) -> Cond {
            Cond::Set("IN", column.clone(), values)
        }
        fn not_in_set(&self, column: &String, values: Vec<TypedValue>) -> Cond {
            Cond::Set("NOT IN", column.clone(), values)
        }
        fn like(&self, column: &String, pattern: String) -> Cond {
            Cond::Like("LIKE", column.clone(), pattern)
        }
        fn not_like(&self, column: &String, pattern: String) -> Cond {
            Cond::Like("NOT LIKE", column.clone(), pattern)
        }
        fn ilike(&self, column: &String, pattern: String) -> Cond {
            Cond::Like("ILIKE", column.clone(), pattern)
        }
        fn not_ilike(&self, column: &String, pattern: String) -> Cond {
            Cond::Like("NOT ILIKE", column.clone(), pattern)
        }
        fn is_null(&self, column: &String) -> Cond {
            Cond::Null("IS NULL", column.clone())
        }
        fn is_not_null(&self, column: &String) -> Cond {
            Cond::Null("IS NOT NULL", column.clone())
        }
        fn all(&self, conditions: Vec<Cond>) -> Cond {
            Cond::All(conditions)
        }
    }

    fn text(s: &str) -> TypedValue {
        TypedValue::Text(s.to_string())
    }

    fn columns() -> ColumnMap<String> {
        ColumnMap::new()
            .insert("status", "status".to_string(), ColumnType::Text)
            .insert("title", "title".to_string(), ColumnType::Text)
            .insert("tag", "tag".to_string(), ColumnType::Text)
            .insert("amount", "amount".to_string(), ColumnType::Integer)
            .insert("createdAt", "created_at".to_string(), ColumnType::Date)
            .insert("closedAt", "closed_at".to_string(), ColumnType::Date)
            .insert("secret", "secret".to_string(), ColumnType::Text)
    }

    fn policy() -> AllowListConfig {
        AllowListConfig::new()
            .with_filter_fields(["status", "title", "tag", "amount", "createdAt", "closedAt", "ghost"])
            .with_sort_fields(["createdAt", "amount", "ghost"])
            .with_default_sort(vec![SortSpec::desc("createdAt")])
    }

    fn predicate(filters: Filters) -> Option<Cond> {
        let (policy, columns) = (policy(), columns());
        QueryCompiler::new(&policy, &columns, &Recorder).compile_predicate(Some(&filters))
    }

    fn ordering(sort: Vec<SortSpec>) -> Vec<OrderTerm<String>> {
        let (policy, columns) = (policy(), columns());
        QueryCompiler::new(&policy, &columns, &Recorder).compile_ordering(Some(&sort))
    }

    fn filters(entries: Vec<(&str, FieldFilter)>) -> Filters {
        entries
            .into_iter()
            .map(|(field, filter)| (field.to_string(), filter))
            .collect()
    }

    fn term(handle: &str, direction: SortDirection) -> OrderTerm<String> {
        OrderTerm {
            handle: handle.to_string(),
            direction,
        }
    }

    #[test]
    fn test_shorthand_and_eq_compile_identically() {
        let shorthand = predicate(filters(vec![("status", FieldFilter::value("OPEN"))]));
        let explicit = predicate(filters(vec![(
            "status",
            FieldFilter::operators([("$eq", "OPEN")]),
        )]));

        assert_eq!(shorthand, explicit);
        assert_eq!(
            shorthand,
            Some(Cond::All(vec![Cond::Cmp("=", "status".into(), text("OPEN"))]))
        );
    }

    #[test]
    fn test_fields_outside_allow_list_are_dropped() {
        let compiled = predicate(filters(vec![
            ("secret", FieldFilter::value("x")),
            ("status", FieldFilter::value("OPEN")),
        ]));

        assert_eq!(
            compiled,
            Some(Cond::All(vec![Cond::Cmp("=", "status".into(), text("OPEN"))]))
        );
    }

    #[test]
    fn test_allowed_field_without_metadata_is_dropped() {
        assert_eq!(predicate(filters(vec![("ghost", FieldFilter::value("x"))])), None);
    }

    #[test]
    fn test_unknown_operator_is_skipped_individually() {
        let compiled = predicate(filters(vec![(
            "status",
            FieldFilter::operators([("$foo", "x"), ("$eq", "y")]),
        )]));

        assert_eq!(
            compiled,
            Some(Cond::All(vec![Cond::Cmp("=", "status".into(), text("y"))]))
        );
    }

    #[test]
    fn test_in_requires_a_list() {
        let compiled = predicate(filters(vec![(
            "tag",
            FieldFilter::operators([("$in", "not-an-array")]),
        )]));
        assert_eq!(compiled, None);
    }

    #[test]
    fn test_in_and_not_in() {
        let compiled = predicate(filters(vec![(
            "tag",
            FieldFilter::operators([
                ("$in", FilterValue::from(vec!["a", "b"])),
                ("$notIn", FilterValue::from(vec!["c"])),
            ]),
        )]));

        assert_eq!(
            compiled,
            Some(Cond::All(vec![
                Cond::Set("IN", "tag".into(), vec![text("a"), text("b")]),
                Cond::Set("NOT IN", "tag".into(), vec![text("c")]),
            ]))
        );
    }

    #[test]
    fn test_empty_in_list_is_dropped() {
        let compiled = predicate(filters(vec![(
            "tag",
            FieldFilter::operators([("$in", FilterValue::List(Vec::new()))]),
        )]));
        assert_eq!(compiled, None);
    }

    #[test]
    fn test_date_values_are_coerced() {
        let compiled = predicate(filters(vec![(
            "createdAt",
            FieldFilter::operators([
                ("$gte", "2024-01-01"),
                ("$in", "2024-01-02"),
            ]),
        )]));

        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            compiled,
            Some(Cond::All(vec![Cond::Cmp(
                ">=",
                "created_at".into(),
                TypedValue::Date(expected)
            )]))
        );
    }

    #[test]
    fn test_date_list_is_coerced_element_wise() {
        let compiled = predicate(filters(vec![(
            "createdAt",
            FieldFilter::operators([("$in", vec!["2024-01-01", "2024-01-02T12:00:00Z"])]),
        )]));

        assert_eq!(
            compiled,
            Some(Cond::All(vec![Cond::Set(
                "IN",
                "created_at".into(),
                vec![
                    TypedValue::Date(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                    TypedValue::Date(Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap()),
                ]
            )]))
        );
    }

    #[test]
    fn test_uncoercible_value_drops_only_its_condition() {
        let compiled = predicate(filters(vec![(
            "amount",
            FieldFilter::operators([("$gt", "lots"), ("$lt", "10")]),
        )]));

        assert_eq!(
            compiled,
            Some(Cond::All(vec![Cond::Cmp(
                "<",
                "amount".into(),
                TypedValue::Integer(10)
            )]))
        );
    }

    #[test]
    fn test_desugared_between_compiles_like_explicit_bounds() {
        let desugared = predicate(filters(vec![(
            "amount",
            FieldFilter::operators([("$gte", "1"), ("$lte", "10")]),
        )]));

        assert_eq!(
            desugared,
            Some(Cond::All(vec![
                Cond::Cmp(">=", "amount".into(), TypedValue::Integer(1)),
                Cond::Cmp("<=", "amount".into(), TypedValue::Integer(10)),
            ]))
        );

        let raw_between = predicate(filters(vec![(
            "amount",
            FieldFilter::operators([("$between", "1,10")]),
        )]));
        assert_eq!(raw_between, None);
    }

    #[test]
    fn test_pattern_operators() {
        let compiled = predicate(filters(vec![(
            "title",
            FieldFilter::operators([
                ("$contains", "a"),
                ("$notContains", "b"),
                ("$containsInsensitive", "c"),
                ("$notContainsInsensitive", "d"),
                ("$startsWith", "e"),
                ("$endsWith", "f"),
            ]),
        )]));

        let Some(Cond::All(conditions)) = compiled else {
            panic!("expected a conjunction");
        };
        assert_eq!(conditions.len(), 6);
        assert!(conditions.contains(&Cond::Like("LIKE", "title".into(), "%a%".into())));
        assert!(conditions.contains(&Cond::Like("NOT LIKE", "title".into(), "%b%".into())));
        assert!(conditions.contains(&Cond::Like("ILIKE", "title".into(), "%c%".into())));
        assert!(conditions.contains(&Cond::Like("NOT ILIKE", "title".into(), "%d%".into())));
        assert!(conditions.contains(&Cond::Like("LIKE", "title".into(), "e%".into())));
        assert!(conditions.contains(&Cond::Like("LIKE", "title".into(), "%f".into())));
    }

    #[test]
    fn test_pattern_escapes_wildcards() {
        let compiled = predicate(filters(vec![(
            "title",
            FieldFilter::operators([("$contains", "100%_off\\")]),
        )]));

        assert_eq!(
            compiled,
            Some(Cond::All(vec![Cond::Like(
                "LIKE",
                "title".into(),
                "%100\\%\\_off\\\\%".into()
            )]))
        );
    }

    #[test]
    fn test_null_toggles() {
        let compiled = predicate(filters(vec![
            ("closedAt", FieldFilter::operators([("$isNull", "true")])),
            ("title", FieldFilter::operators([("$isNull", "false")])),
            ("tag", FieldFilter::operators([("$isNotNull", "0")])),
        ]));

        assert_eq!(
            compiled,
            Some(Cond::All(vec![
                Cond::Null("IS NULL", "closed_at".into()),
                Cond::Null("IS NULL", "tag".into()),
                Cond::Null("IS NOT NULL", "title".into()),
            ]))
        );
    }

    #[test]
    fn test_reserved_operators_are_not_compiled() {
        let compiled = predicate(filters(vec![(
            "status",
            FieldFilter::operators([("$and", "x"), ("$or", "y"), ("$not", "z")]),
        )]));
        assert_eq!(compiled, None);
    }

    #[test]
    fn test_no_filters_means_no_predicate() {
        let (policy, columns) = (policy(), columns());
        let compiler = QueryCompiler::new(&policy, &columns, &Recorder);
        assert_eq!(compiler.compile_predicate(None), None);
        assert_eq!(compiler.compile_predicate(Some(&Filters::new())), None);
    }

    #[test]
    fn test_ordering_keeps_client_precedence() {
        assert_eq!(
            ordering(vec![SortSpec::asc("amount"), SortSpec::desc("createdAt")]),
            vec![
                term("amount", SortDirection::Asc),
                term("created_at", SortDirection::Desc)
            ]
        );
    }

    #[test]
    fn test_ordering_drops_unauthorized_without_blending_default() {
        assert_eq!(
            ordering(vec![SortSpec::asc("unauthorized"), SortSpec::asc("amount")]),
            vec![term("amount", SortDirection::Asc)]
        );
    }

    #[test]
    fn test_ordering_falls_back_to_default() {
        let expected = vec![term("created_at", SortDirection::Desc)];
        assert_eq!(ordering(Vec::new()), expected);
        assert_eq!(ordering(vec![SortSpec::asc("secret")]), expected);
        assert_eq!(ordering(vec![SortSpec::asc("ghost")]), expected);
    }

    #[test]
    fn test_default_sort_ignores_allow_list() {
        let columns = columns();
        let policy = AllowListConfig::new().with_default_sort(vec![SortSpec::desc("createdAt")]);
        let compiled = QueryCompiler::new(&policy, &columns, &Recorder).compile(&Query::default());

        assert_eq!(compiled.predicate, None);
        assert_eq!(compiled.ordering, vec![term("created_at", SortDirection::Desc)]);
    }

    #[test]
    fn test_resolver_is_not_consulted_for_unauthorized_fields() {
        let mut resolver = MockAccessorResolver::new();
        resolver
            .expect_resolve()
            .with(eq("status"))
            .times(1)
            .returning(|_| {
                Some(ColumnAccessor {
                    handle: "status".to_string(),
                    declared_type: ColumnType::Text,
                })
            });

        let policy = AllowListConfig::new().with_filter_fields(["status"]);
        let query = Query {
            filters: Some(filters(vec![
                ("password", FieldFilter::value("hunter2")),
                ("status", FieldFilter::value("OPEN")),
            ])),
            ..Default::default()
        };

        let compiled = QueryCompiler::new(&policy, &resolver, &Recorder).compile(&query);
        assert_eq!(
            compiled.predicate,
            Some(Cond::All(vec![Cond::Cmp("=", "status".into(), text("OPEN"))]))
        );
        assert!(compiled.ordering.is_empty());
    }
}

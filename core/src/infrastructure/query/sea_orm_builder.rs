use std::marker::PhantomData;

use sea_orm::{
    ColumnTrait, Condition, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Select,
    Value,
    sea_query::{Expr, Func, LikeExpr},
};

use crate::domain::query::{
    compiler::CompiledQuery,
    ports::{ConditionBuilder, TypedValue},
    value_objects::{Pagination, SortDirection},
};

impl From<TypedValue> for Value {
    fn from(value: TypedValue) -> Self {
        match value {
            TypedValue::Text(v) => v.into(),
            TypedValue::Integer(v) => v.into(),
            TypedValue::Float(v) => v.into(),
            TypedValue::Boolean(v) => v.into(),
            TypedValue::Date(v) => v.into(),
            TypedValue::Uuid(v) => v.into(),
        }
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// [`ConditionBuilder`] over the columns of a sea-orm entity.
///
/// Case-insensitive matching is `LOWER(col) LIKE lower(pattern)` so it works
/// on every backend, not only PostgreSQL. Every pattern carries an explicit
/// `ESCAPE '\'`, since SQLite has no default escape character.
#[derive(Debug, Clone, Copy)]
pub struct SeaOrmConditionBuilder<C> {
    _column: PhantomData<C>,
}

impl<C> Default for SeaOrmConditionBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> SeaOrmConditionBuilder<C> {
    pub fn new() -> Self {
        Self {
            _column: PhantomData,
        }
    }
}

fn escaped(pattern: String) -> LikeExpr {
    LikeExpr::new(pattern).escape('\\')
}

fn lowered<C: ColumnTrait>(column: &C) -> Expr {
    Expr::expr(Func::lower(Expr::col((column.entity_name(), *column))))
}

impl<C> ConditionBuilder for SeaOrmConditionBuilder<C>
where
    C: ColumnTrait,
{
    type Handle = C;
    type Condition = Condition;

    fn eq(&self, column: &C, value: TypedValue) -> Condition {
        Condition::all().add(column.eq(value))
    }

    fn ne(&self, column: &C, value: TypedValue) -> Condition {
        Condition::all().add(column.ne(value))
    }

    fn lt(&self, column: &C, value: TypedValue) -> Condition {
        Condition::all().add(column.lt(value))
    }

    fn lte(&self, column: &C, value: TypedValue) -> Condition {
        Condition::all().add(column.lte(value))
    }

    fn gt(&self, column: &C, value: TypedValue) -> Condition {
        Condition::all().add(column.gt(value))
    }

    fn gte(&self, column: &C, value: TypedValue) -> Condition {
        Condition::all().add(column.gte(value))
    }

    fn in_set(&self, column: &C, values: Vec<TypedValue>) -> Condition {
        Condition::all().add(column.is_in(values))
    }

    fn not_in_set(&self, column: &C, values: Vec<TypedValue>) -> Condition {
        Condition::all().add(column.is_not_in(values))
    }

    fn like(&self, column: &C, pattern: String) -> Condition {
        Condition::all().add(column.like(escaped(pattern)))
    }

    fn not_like(&self, column: &C, pattern: String) -> Condition {
        Condition::all().add(column.not_like(escaped(pattern)))
    }

    fn ilike(&self, column: &C, pattern: String) -> Condition {
        Condition::all().add(lowered(column).like(escaped(pattern.to_lowercase())))
    }

    fn not_ilike(&self, column: &C, pattern: String) -> Condition {
        Condition::all().add(lowered(column).not_like(escaped(pattern.to_lowercase())))
    }

    fn is_null(&self, column: &C) -> Condition {
        Condition::all().add(column.is_null())
    }

    fn is_not_null(&self, column: &C) -> Condition {
        Condition::all().add(column.is_not_null())
    }

    fn all(&self, conditions: Vec<Condition>) -> Condition {
        conditions
            .into_iter()
            .fold(Condition::all(), |acc, condition| acc.add(condition))
    }
}

/// Applies a compiled list query to a plain sea-orm `Select<E>`.
pub trait ListQueryExt<E: EntityTrait>: Sized {
    fn apply_list_query(
        self,
        compiled: CompiledQuery<Condition, E::Column>,
        pagination: Option<Pagination>,
    ) -> Self;
}

impl<E> ListQueryExt<E> for Select<E>
where
    E: EntityTrait,
{
    fn apply_list_query(
        self,
        compiled: CompiledQuery<Condition, E::Column>,
        pagination: Option<Pagination>,
    ) -> Self {
        let mut query = self;

        if let Some(predicate) = compiled.predicate {
            query = query.filter(predicate);
        }

        for term in compiled.ordering {
            query = query.order_by(term.handle, term.direction.into());
        }

        if let Some(pagination) = pagination {
            query = query.offset(pagination.offset()).limit(pagination.limit());
        }

        query
    }
}

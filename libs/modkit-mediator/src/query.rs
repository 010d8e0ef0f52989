//! Query handles: unexecuted, chainable queries scoped to one resource type.

use std::fmt;
use std::sync::Arc;

use futures::stream::BoxStream;
use sea_orm::sea_query::{Alias, Expr, Keyword, SimpleExpr};
use sea_orm::{Condition, Order};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::binding::EntityBinding;
use crate::catalog::{ColumnInfo, TableCatalog};
use crate::error::{MediatorError, Result};
use crate::filter::{FilterOp, native_operator};
use crate::kind::{FieldKind, coerce};
use crate::record::Resource;

/// Lazy, single-pass sequence of hydrated resources.
///
/// Rows are pulled from the database cursor as the stream is polled; the
/// stream borrows the mediator's connection until it is dropped.
pub type ResourceStream<'a> = BoxStream<'a, Result<Resource>>;

/// Builder accumulating filter, ordering and pagination state.
///
/// Nothing is fetched until the handle is passed to
/// [`Mediator::collection_to_iterable`](crate::Mediator::collection_to_iterable).
#[derive(Clone)]
pub struct QueryHandle {
    resource_type: String,
    pub(crate) binding: Arc<dyn EntityBinding>,
    pub(crate) condition: Condition,
    pub(crate) order: Vec<(String, Order)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl QueryHandle {
    pub(crate) fn new(resource_type: impl Into<String>, binding: Arc<dyn EntityBinding>) -> Self {
        Self {
            resource_type: resource_type.into(),
            binding,
            condition: Condition::all(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    #[must_use]
    pub fn catalog(&self) -> &TableCatalog {
        self.binding.catalog()
    }

    #[must_use]
    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    fn resolve(&self, attribute: &str) -> Result<&ColumnInfo> {
        self.binding
            .catalog()
            .column(attribute)
            .ok_or_else(|| MediatorError::unknown_attribute(&self.resource_type, attribute))
    }

    /// Appends `attribute <op> value` to the conditions (all conditions must hold).
    ///
    /// Null checks ignore `value`. A missing or `null` value turns `eq` and
    /// `ne` into `IS NULL` and `IS NOT NULL`.
    ///
    /// # Errors
    /// - [`MediatorError::UnknownAttribute`] if `attribute` is not a column of the type
    /// - [`MediatorError::InvalidValue`] if `value` does not fit the column, or is
    ///   missing for an ordering or pattern operator
    pub fn filter(
        mut self,
        attribute: &str,
        op: FilterOp,
        value: Option<JsonValue>,
    ) -> Result<Self> {
        let column = self.resolve(attribute)?;
        // patterns are text whatever the column type
        let kind = if op == FilterOp::Like {
            FieldKind::Text
        } else {
            column.kind
        };
        let (oper, right) = match value.filter(|v| !v.is_null()) {
            Some(v) if !op.is_null_check() => (
                native_operator(op),
                SimpleExpr::Value(coerce(&column.name, kind, &v)?),
            ),
            _ => {
                let oper = op.null_operator().ok_or_else(|| {
                    MediatorError::invalid_value(&column.name, kind, &JsonValue::Null)
                })?;
                (oper, SimpleExpr::Keyword(Keyword::Null))
            }
        };
        let expr = Expr::col(Alias::new(column.name.as_str())).binary(oper, right);

        debug!(
            resource_type = %self.resource_type,
            attribute,
            op = %op,
            "Added filter condition"
        );
        self.condition = self.condition.add(expr);
        Ok(self)
    }

    /// Caps the number of rows; values below 1 are raised to 1.
    #[must_use]
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n.max(1).unsigned_abs());
        self
    }

    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Appends an ordering; the first added ordering is the primary sort key.
    ///
    /// # Errors
    /// [`MediatorError::UnknownAttribute`] if `attribute` is not a column of the type.
    pub fn order_by(mut self, attribute: &str, direction: Order) -> Result<Self> {
        let column = self.resolve(attribute)?.name.clone();
        self.order.push((column, direction));
        Ok(self)
    }
}

impl fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle")
            .field("resource_type", &self.resource_type)
            .field("condition", &self.condition)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

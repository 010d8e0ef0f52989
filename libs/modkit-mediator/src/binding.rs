//! Entity bindings and the registry the mediator resolves classes through.
//!
//! A binding bundles everything the mediator needs to know about one entity
//! class: how to construct a fresh record, how to run queries against the
//! entity, and its metadata catalog. Bindings are registered once at startup
//! under the entity's class (table) name.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use sea_orm::sea_query::{Alias, Expr, SimpleExpr};
use sea_orm::{
    DatabaseConnection, DbErr, EntityTrait, Iterable, PaginatorTrait, PrimaryKeyToColumn,
    QueryFilter, QueryOrder, QuerySelect, Select,
};
use tracing::debug;

use crate::catalog::TableCatalog;
use crate::error::MediatorError;
use crate::query::{QueryHandle, ResourceStream};
use crate::record::{MediatedModel, Record, Resource, model_fields};
use crate::validate::{Capability, Validate};

/// Constructor, query factory and metadata provider of one entity class.
#[async_trait]
pub(crate) trait EntityBinding: Send + Sync {
    fn catalog(&self) -> &Arc<TableCatalog>;

    fn construct(&self) -> Resource;

    async fn find_one(
        &self,
        conn: &DatabaseConnection,
        column: &str,
        key: sea_orm::Value,
    ) -> Result<Option<Resource>, DbErr>;

    async fn stream<'c>(
        &self,
        conn: &'c DatabaseConnection,
        query: QueryHandle,
    ) -> Result<ResourceStream<'c>, DbErr>;

    async fn count(&self, conn: &DatabaseConnection, query: &QueryHandle) -> Result<u64, DbErr>;

    async fn delete_matching(
        &self,
        conn: &DatabaseConnection,
        query: QueryHandle,
    ) -> Result<u64, DbErr>;
}

struct SeaOrmBinding<E: EntityTrait> {
    catalog: Arc<TableCatalog>,
    capability: Capability<E::Model>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> SeaOrmBinding<E>
where
    E: EntityTrait,
    E::Model: MediatedModel<E::ActiveModel>,
    E::ActiveModel: Send,
{
    fn new(capability: Capability<E::Model>) -> Self {
        Self {
            catalog: Arc::new(
                TableCatalog::of::<E>().with_model_fields(model_fields::<E::Model>()),
            ),
            capability,
            _entity: PhantomData,
        }
    }

    fn hydrate(&self, model: E::Model) -> Resource {
        Resource::new(Record::<E>::persisted(
            model,
            Arc::clone(&self.catalog),
            self.capability,
        ))
    }

    /// Applies the handle's conditions and ordering; rows fall back to
    /// primary-key order so pagination is stable.
    fn select(query: &QueryHandle) -> Select<E> {
        let mut select = E::find().filter(query.condition.clone());
        if query.order.is_empty() {
            for pk in E::PrimaryKey::iter() {
                select = select.order_by_asc(pk.into_column());
            }
        } else {
            for (column, direction) in &query.order {
                let expr: SimpleExpr = Expr::col(Alias::new(column.as_str())).into();
                select = select.order_by(expr, direction.clone());
            }
        }
        select
    }
}

#[async_trait]
impl<E> EntityBinding for SeaOrmBinding<E>
where
    E: EntityTrait,
    E::Model: MediatedModel<E::ActiveModel>,
    E::ActiveModel: Send,
{
    fn catalog(&self) -> &Arc<TableCatalog> {
        &self.catalog
    }

    fn construct(&self) -> Resource {
        Resource::new(Record::<E>::fresh(
            Arc::clone(&self.catalog),
            self.capability,
        ))
    }

    async fn find_one(
        &self,
        conn: &DatabaseConnection,
        column: &str,
        key: sea_orm::Value,
    ) -> Result<Option<Resource>, DbErr> {
        let found = E::find()
            .filter(Expr::col(Alias::new(column)).eq(key))
            .one(conn)
            .await?;
        Ok(found.map(|model| self.hydrate(model)))
    }

    async fn stream<'c>(
        &self,
        conn: &'c DatabaseConnection,
        query: QueryHandle,
    ) -> Result<ResourceStream<'c>, DbErr> {
        let mut select = Self::select(&query);
        if let Some(offset) = query.offset {
            select = select.offset(offset);
        }
        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }
        debug!(
            class = self.catalog.class_name(),
            limit = ?query.limit,
            offset = ?query.offset,
            "Executing resource query"
        );

        let catalog = Arc::clone(&self.catalog);
        let capability = self.capability;
        let rows = select.stream(conn).await?;
        Ok(Box::pin(rows.map(move |row| {
            row.map(|model| {
                Resource::new(Record::<E>::persisted(
                    model,
                    Arc::clone(&catalog),
                    capability,
                ))
            })
            .map_err(MediatorError::from)
        })))
    }

    async fn count(&self, conn: &DatabaseConnection, query: &QueryHandle) -> Result<u64, DbErr> {
        E::find()
            .filter(query.condition.clone())
            .count(conn)
            .await
    }

    async fn delete_matching(
        &self,
        conn: &DatabaseConnection,
        query: QueryHandle,
    ) -> Result<u64, DbErr> {
        let res = E::delete_many()
            .filter(query.condition)
            .exec(conn)
            .await?;
        Ok(res.rows_affected)
    }
}

/// Entity classes known to the mediator, keyed by class (table) name.
///
/// ```ignore
/// let registry = EntityRegistry::new()
///     .register::<user::Entity>()
///     .register_validated::<note::Entity>();
/// ```
#[derive(Clone, Default)]
pub struct EntityRegistry {
    bindings: HashMap<String, Arc<dyn EntityBinding>>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers entity `E`; its records are saved without validation.
    #[must_use]
    pub fn register<E>(self) -> Self
    where
        E: EntityTrait,
        E::Model: MediatedModel<E::ActiveModel>,
        E::ActiveModel: Send,
    {
        self.insert(SeaOrmBinding::<E>::new(Capability::Plain))
    }

    /// Registers entity `E` whose model validates itself before every save.
    #[must_use]
    pub fn register_validated<E>(self) -> Self
    where
        E: EntityTrait,
        E::Model: MediatedModel<E::ActiveModel> + Validate,
        E::ActiveModel: Send,
    {
        self.insert(SeaOrmBinding::<E>::new(Capability::<E::Model>::Validatable(
            <E::Model as Validate>::validate,
        )))
    }

    fn insert<E>(mut self, binding: SeaOrmBinding<E>) -> Self
    where
        E: EntityTrait,
        E::Model: MediatedModel<E::ActiveModel>,
        E::ActiveModel: Send,
    {
        let class = binding.catalog.class_name().to_owned();
        debug!(class = %class, "Registered entity binding");
        self.bindings.insert(class, Arc::new(binding));
        self
    }

    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.bindings.contains_key(class)
    }

    /// Registered class names, in no particular order.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Metadata catalog of a registered class.
    #[must_use]
    pub fn catalog(&self, class: &str) -> Option<&TableCatalog> {
        self.bindings.get(class).map(|b| b.catalog().as_ref())
    }

    pub(crate) fn binding(&self, class: &str) -> Option<Arc<dyn EntityBinding>> {
        self.bindings.get(class).cloned()
    }
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<_> = self.classes().collect();
        classes.sort_unstable();
        f.debug_struct("EntityRegistry")
            .field("classes", &classes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::validate::ValidationFailure;

    mod item {
        use sea_orm::entity::prelude::*;
        use serde::{Deserialize, Serialize};

        #[derive(Clone, Debug, Default, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
        #[sea_orm(table_name = "items")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub title: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    impl Validate for item::Model {
        fn validate(&self) -> Result<(), Vec<ValidationFailure>> {
            if self.title.is_empty() {
                Err(vec![ValidationFailure::new("title", "required")])
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn registry_is_keyed_by_table_name() {
        let registry = EntityRegistry::new().register::<item::Entity>();
        assert!(registry.contains("items"));
        assert!(!registry.contains("Item"));
        assert_eq!(registry.classes().collect::<Vec<_>>(), vec!["items"]);
        assert_eq!(registry.catalog("items").unwrap().class_name(), "items");
    }

    #[test]
    fn binding_constructs_fresh_resources() {
        let registry = EntityRegistry::new().register::<item::Entity>();
        let resource = registry.binding("items").unwrap().construct();
        assert!(resource.is_new());
        assert!(!resource.is_validatable());
        assert_eq!(resource.resource_class(), "items");
    }

    #[test]
    fn validated_registration_carries_the_capability() {
        let registry = EntityRegistry::new().register_validated::<item::Entity>();
        let resource = registry.binding("items").unwrap().construct();
        assert!(resource.is_validatable());
        assert_eq!(
            resource.inner.validate().unwrap_err(),
            vec![ValidationFailure::new("title", "required")]
        );
    }

    #[test]
    fn debug_lists_registered_classes() {
        let registry = EntityRegistry::new().register::<item::Entity>();
        assert_eq!(
            format!("{registry:?}"),
            r#"EntityRegistry { classes: ["items"], .. }"#
        );
    }
}

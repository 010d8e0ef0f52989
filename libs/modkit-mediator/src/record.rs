//! Entity records and the type-erased [`Resource`] handed to callers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, Iterable,
    PrimaryKeyToColumn, PrimaryKeyTrait,
};
use serde::Serialize;
use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value as JsonValue;

use crate::catalog::TableCatalog;
use crate::error::{MediatorError, Result};
use crate::kind::epoch_to_timestamp;
use crate::validate::{Capability, ValidationFailure};

/// Flat wire representation of a resource: field name → scalar value,
/// in column order.
pub type AttributeMap = serde_json::Map<String, JsonValue>;

/// Requirements on a `SeaORM` model for it to be mediated.
///
/// `Default` provides the zero-valued fresh entity; serde provides the
/// attribute flattening and assignment. Implemented for every model that
/// satisfies the bounds.
pub trait MediatedModel<A: ActiveModelTrait>:
    Default + Serialize + DeserializeOwned + IntoActiveModel<A> + Sync + 'static
{
}

impl<M, A: ActiveModelTrait> MediatedModel<A> for M where
    M: Default + Serialize + DeserializeOwned + IntoActiveModel<A> + Sync + 'static
{
}

/// Serde keys of a fresh `M`, in field order.
pub(crate) fn model_fields<M: Default + Serialize>() -> Vec<String> {
    match serde_json::to_value(M::default()) {
        Ok(JsonValue::Object(map)) => map.into_iter().map(|(key, _)| key).collect(),
        _ => Vec::new(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RecordState {
    New,
    Persisted,
    Deleted,
}

/// A model of entity `E` together with its lifecycle state and metadata.
pub(crate) struct Record<E: EntityTrait> {
    model: E::Model,
    state: RecordState,
    catalog: Arc<TableCatalog>,
    capability: Capability<E::Model>,
}

impl<E> Record<E>
where
    E: EntityTrait,
    E::Model: MediatedModel<E::ActiveModel>,
    E::ActiveModel: Send,
{
    pub(crate) fn fresh(catalog: Arc<TableCatalog>, capability: Capability<E::Model>) -> Self {
        Self {
            model: E::Model::default(),
            state: RecordState::New,
            catalog,
            capability,
        }
    }

    pub(crate) fn persisted(
        model: E::Model,
        catalog: Arc<TableCatalog>,
        capability: Capability<E::Model>,
    ) -> Self {
        Self {
            model,
            state: RecordState::Persisted,
            catalog,
            capability,
        }
    }

    /// The primary key is considered unset when it still holds the
    /// zero value of a fresh model.
    fn primary_key_unset(&self) -> bool {
        match self.primary_key() {
            JsonValue::Null => true,
            JsonValue::Number(n) => n.as_i64() == Some(0),
            _ => false,
        }
    }

    /// The model's serde form, keyed by field.
    fn model_map(&self) -> Result<AttributeMap> {
        match serde_json::to_value(&self.model)? {
            JsonValue::Object(map) => Ok(map),
            other => Err(MediatorError::Attributes(serde_json::Error::custom(
                format_args!(
                    "{} model serialized to {other}, expected an object",
                    self.catalog.class_name()
                ),
            ))),
        }
    }

    fn insertable(&self) -> E::ActiveModel {
        let mut active: E::ActiveModel = self.model.clone().into_active_model();
        active = active.reset_all();
        if <E::PrimaryKey as PrimaryKeyTrait>::auto_increment() && self.primary_key_unset() {
            for pk in E::PrimaryKey::iter() {
                active.not_set(pk.into_column());
            }
        }
        active
    }
}

/// Object-safe view of a [`Record`], used behind [`Resource`].
#[async_trait]
pub(crate) trait ErasedRecord: Send + Sync {
    fn catalog(&self) -> &Arc<TableCatalog>;
    fn state(&self) -> RecordState;
    fn is_validatable(&self) -> bool;
    fn primary_key(&self) -> JsonValue;

    fn flatten(&self) -> Result<AttributeMap>;
    fn assign(&mut self, attrs: &AttributeMap) -> Result<()>;
    fn validate(&self) -> std::result::Result<(), Vec<ValidationFailure>>;

    async fn persist(&mut self, conn: &DatabaseConnection) -> std::result::Result<(), DbErr>;
    async fn remove(&mut self, conn: &DatabaseConnection) -> std::result::Result<bool, DbErr>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[async_trait]
impl<E> ErasedRecord for Record<E>
where
    E: EntityTrait,
    E::Model: MediatedModel<E::ActiveModel>,
    E::ActiveModel: Send,
{
    fn catalog(&self) -> &Arc<TableCatalog> {
        &self.catalog
    }

    fn state(&self) -> RecordState {
        self.state
    }

    fn is_validatable(&self) -> bool {
        self.capability.is_validatable()
    }

    fn primary_key(&self) -> JsonValue {
        let Some(pk) = self.catalog.primary_key() else {
            return JsonValue::Null;
        };
        self.flatten()
            .ok()
            .and_then(|mut attrs| attrs.remove(&pk.name))
            .unwrap_or(JsonValue::Null)
    }

    fn flatten(&self) -> Result<AttributeMap> {
        let mut fields = self.model_map()?;
        Ok(self
            .catalog
            .columns()
            .iter()
            .map(|column| {
                let value = fields.remove(&column.field).unwrap_or(JsonValue::Null);
                (column.name.clone(), value)
            })
            .collect())
    }

    fn assign(&mut self, attrs: &AttributeMap) -> Result<()> {
        let mut current = self.model_map()?;
        for (key, value) in attrs {
            // keys that are not columns of the model are ignored
            let Some(column) = self.catalog.column(key) else {
                continue;
            };
            let Some(slot) = current.get_mut(&column.field) else {
                continue;
            };
            *slot = if column.kind.is_timestamp() {
                epoch_to_timestamp(column.kind, value)
            } else {
                value.clone()
            };
        }
        self.model = serde_json::from_value(JsonValue::Object(current))?;
        Ok(())
    }

    fn validate(&self) -> std::result::Result<(), Vec<ValidationFailure>> {
        self.capability.check(&self.model)
    }

    async fn persist(&mut self, conn: &DatabaseConnection) -> std::result::Result<(), DbErr> {
        let stored = match self.state {
            RecordState::Deleted => {
                return Err(DbErr::Custom(format!(
                    "{} record has been deleted and cannot be saved",
                    self.catalog.class_name()
                )));
            }
            RecordState::New => self.insertable().insert(conn).await?,
            RecordState::Persisted => {
                let active: E::ActiveModel = self.model.clone().into_active_model();
                active.reset_all().update(conn).await?
            }
        };
        self.model = stored;
        self.state = RecordState::Persisted;
        Ok(())
    }

    async fn remove(&mut self, conn: &DatabaseConnection) -> std::result::Result<bool, DbErr> {
        match self.state {
            RecordState::New => {
                return Err(DbErr::Custom(format!(
                    "{} record has not been saved and cannot be deleted",
                    self.catalog.class_name()
                )));
            }
            RecordState::Deleted => return Ok(true),
            RecordState::Persisted => {}
        }
        let active: E::ActiveModel = self.model.clone().into_active_model();
        active.delete(conn).await?;
        self.state = RecordState::Deleted;
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One entity instance as seen by the mediator's callers.
///
/// The concrete `SeaORM` model stays reachable through [`Resource::model`].
pub struct Resource {
    pub(crate) inner: Box<dyn ErasedRecord>,
}

impl Resource {
    pub(crate) fn new<E>(record: Record<E>) -> Self
    where
        E: EntityTrait,
        E::Model: MediatedModel<E::ActiveModel>,
        E::ActiveModel: Send,
    {
        Self {
            inner: Box::new(record),
        }
    }

    /// Entity class (table) name.
    #[must_use]
    pub fn resource_class(&self) -> &str {
        self.inner.catalog().class_name()
    }

    #[must_use]
    pub fn catalog(&self) -> &TableCatalog {
        self.inner.catalog()
    }

    /// `true` until the resource has been saved once.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.inner.state() == RecordState::New
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.inner.state() == RecordState::Deleted
    }

    /// Whether saving runs the model's own validation first.
    #[must_use]
    pub fn is_validatable(&self) -> bool {
        self.inner.is_validatable()
    }

    /// Primary-key value in wire form, `null` if the entity has none.
    #[must_use]
    pub fn primary_key(&self) -> JsonValue {
        self.inner.primary_key()
    }

    /// Typed access to the underlying model; `None` if the resource is not an `E`.
    #[must_use]
    pub fn model<E>(&self) -> Option<&E::Model>
    where
        E: EntityTrait,
        E::Model: 'static,
    {
        self.inner
            .as_any()
            .downcast_ref::<Record<E>>()
            .map(|record| &record.model)
    }

    pub fn model_mut<E>(&mut self) -> Option<&mut E::Model>
    where
        E: EntityTrait,
        E::Model: 'static,
    {
        self.inner
            .as_any_mut()
            .downcast_mut::<Record<E>>()
            .map(|record| &mut record.model)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("class", &self.resource_class())
            .field("state", &self.inner.state())
            .field("primary_key", &self.primary_key())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    mod tag {
        use sea_orm::entity::prelude::*;
        use serde::{Deserialize, Serialize};

        #[derive(Clone, Debug, Default, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
        #[sea_orm(table_name = "tags")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub label: String,
            pub seen_at: Option<DateTime>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    fn fresh_tag() -> Resource {
        let catalog = Arc::new(TableCatalog::of::<tag::Entity>());
        Resource::new(Record::<tag::Entity>::fresh(catalog, Capability::Plain))
    }

    #[test]
    fn fresh_record_is_new_and_zero_valued() {
        let resource = fresh_tag();
        assert!(resource.is_new());
        assert!(!resource.is_deleted());
        assert!(!resource.is_validatable());
        assert_eq!(resource.resource_class(), "tags");
        assert_eq!(resource.primary_key(), json!(0));
        assert_eq!(
            resource.model::<tag::Entity>().unwrap(),
            &tag::Model::default()
        );
    }

    #[test]
    fn assign_ignores_unknown_keys_and_accepts_epoch_timestamps() {
        let mut resource = fresh_tag();
        let attrs = json!({
            "label": "urgent",
            "seen_at": 1_704_164_645,
            "href": "ignored",
            "nonsense": true,
        });
        resource
            .inner
            .assign(attrs.as_object().unwrap())
            .unwrap();

        let model = resource.model::<tag::Entity>().unwrap();
        assert_eq!(model.label, "urgent");
        assert_eq!(
            model.seen_at.unwrap().to_string(),
            "2024-01-02 03:04:05"
        );
    }

    #[test]
    fn assign_with_wrong_type_leaves_model_untouched() {
        let mut resource = fresh_tag();
        let attrs = json!({ "label": 42 });
        let err = resource.inner.assign(attrs.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, MediatorError::Attributes(_)));
        assert_eq!(resource.model::<tag::Entity>().unwrap().label, "");
    }

    #[test]
    fn flatten_uses_column_names_in_order() {
        let resource = fresh_tag();
        let attrs = resource.inner.flatten().unwrap();
        let keys: Vec<_> = attrs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "label", "seen_at"]);
        assert_eq!(attrs["seen_at"], JsonValue::Null);
    }

    mod badge {
        use sea_orm::entity::prelude::*;
        use serde::{Deserialize, Serialize};

        #[derive(Clone, Debug, Default, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
        #[sea_orm(table_name = "badges")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            #[sea_orm(column_name = "holderId")]
            pub holder_id: Option<i32>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    #[test]
    fn renamed_columns_use_the_column_name_on_the_wire() {
        let catalog = TableCatalog::of::<badge::Entity>()
            .with_model_fields(model_fields::<badge::Model>());
        let mut resource = Resource::new(Record::<badge::Entity>::fresh(
            Arc::new(catalog),
            Capability::Plain,
        ));

        let attrs = json!({ "holderId": 3, "holder_id": 9 });
        resource.inner.assign(attrs.as_object().unwrap()).unwrap();
        assert_eq!(resource.model::<badge::Entity>().unwrap().holder_id, Some(3));

        let flat = resource.inner.flatten().unwrap();
        let keys: Vec<_> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "holderId"]);
        assert_eq!(flat["holderId"], 3);
    }

    #[test]
    fn typed_access_rejects_other_entities() {
        mod other {
            use sea_orm::entity::prelude::*;

            #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
            #[sea_orm(table_name = "others")]
            pub struct Model {
                #[sea_orm(primary_key)]
                pub id: i32,
            }

            #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
            pub enum Relation {}

            impl ActiveModelBehavior for ActiveModel {}
        }

        let mut resource = fresh_tag();
        assert!(resource.model::<other::Entity>().is_none());
        resource.model_mut::<tag::Entity>().unwrap().label = "edited".to_owned();
        assert_eq!(resource.model::<tag::Entity>().unwrap().label, "edited");
    }
}

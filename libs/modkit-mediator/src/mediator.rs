//! The resource mediator: uniform create / read / filter / save / delete
//! access to registered `SeaORM` entities, addressed by resource type.
//!
//! Lookup errors (unknown resource types, attributes, operators, malformed
//! values) are returned as `Err` immediately. Validation and persistence
//! failures of [`Mediator::save`] are appended to the mediator's error log
//! and reported as `None`; the log is never cleared, so use one mediator per
//! logical request. [`Mediator::delete`] propagates data-access failures as
//! `Err` instead of logging them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use sea_orm::{DatabaseConnection, Order};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::binding::{EntityBinding, EntityRegistry};
use crate::config::MediatorConfig;
use crate::error::{MediatorError, Result};
use crate::filter::FilterOp;
use crate::kind::{coerce, timestamp_to_epoch};
use crate::query::{QueryHandle, ResourceStream};
use crate::record::{AttributeMap, Resource};

/// First of the two error-log entries recorded for a failed write.
pub const PERSISTENCE_FAILURE: &str = "Our database encountered an error fulfilling your request.";

/// Per-type hook run last by [`Mediator::get_attributes`].
pub type AttributeProvider = Box<dyn Fn(AttributeMap) -> AttributeMap + Send + Sync>;

/// Builder for [`Mediator`].
pub struct MediatorBuilder {
    conn: DatabaseConnection,
    href: String,
    resources: Vec<(String, String)>,
    providers: HashMap<String, AttributeProvider>,
    registry: EntityRegistry,
}

impl MediatorBuilder {
    /// Seeds a builder with the base href and class map from configuration.
    #[must_use]
    pub fn from_config(conn: DatabaseConnection, config: &MediatorConfig) -> Self {
        config.resources.iter().fold(
            Mediator::builder(conn, config.href.clone()),
            |builder, (resource_type, class)| builder.resource(resource_type, class),
        )
    }

    /// Exposes entity class `class` as `resource_type`.
    #[must_use]
    pub fn resource(mut self, resource_type: impl Into<String>, class: impl Into<String>) -> Self {
        self.resources.push((resource_type.into(), class.into()));
        self
    }

    /// Sets the extra-attribute provider of `resource_type`, replacing any previous one.
    #[must_use]
    pub fn provider<F>(mut self, resource_type: impl Into<String>, provider: F) -> Self
    where
        F: Fn(AttributeMap) -> AttributeMap + Send + Sync + 'static,
    {
        self.providers.insert(resource_type.into(), Box::new(provider));
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: EntityRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Resolves every exposed class against the registry.
    ///
    /// When several resource types expose the same class, resources of that
    /// class are reported under the first one declared.
    ///
    /// # Errors
    /// - [`MediatorError::UnknownEntityClass`] if a class has no registered binding
    /// - [`MediatorError::UnknownResourceType`] if a provider names an unexposed type
    pub fn build(self) -> Result<Mediator> {
        let mut classes = BTreeMap::new();
        let mut types_by_class = HashMap::new();
        let mut bindings = HashMap::new();

        for (resource_type, class) in self.resources {
            let binding = self
                .registry
                .binding(&class)
                .ok_or_else(|| MediatorError::UnknownEntityClass(class.clone()))?;
            types_by_class
                .entry(class.clone())
                .or_insert_with(|| resource_type.clone());
            bindings.insert(resource_type.clone(), binding);
            classes.insert(resource_type, class);
        }

        if let Some(orphan) = self.providers.keys().find(|t| !classes.contains_key(*t)) {
            return Err(MediatorError::UnknownResourceType(orphan.clone()));
        }

        debug!(
            href = %self.href,
            resource_types = classes.len(),
            "Resource mediator ready"
        );

        Ok(Mediator {
            conn: self.conn,
            href: self.href,
            classes,
            types_by_class,
            bindings,
            providers: self.providers,
            errors: Vec::new(),
        })
    }
}

/// Uniform access to registered entities through resource-type names.
///
/// Operations are awaited one at a time; `save` takes `&mut self` because it
/// appends to the error log.
pub struct Mediator {
    conn: DatabaseConnection,
    href: String,
    /// resource type → entity class
    classes: BTreeMap<String, String>,
    /// entity class → resource type
    types_by_class: HashMap<String, String>,
    bindings: HashMap<String, Arc<dyn EntityBinding>>,
    providers: HashMap<String, AttributeProvider>,
    errors: Vec<String>,
}

impl Mediator {
    #[must_use]
    pub fn builder(conn: DatabaseConnection, href: impl Into<String>) -> MediatorBuilder {
        MediatorBuilder {
            conn,
            href: href.into(),
            resources: Vec::new(),
            providers: HashMap::new(),
            registry: EntityRegistry::default(),
        }
    }

    #[must_use]
    pub fn href(&self) -> &str {
        &self.href
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Exposed resource types with their entity classes, sorted by type.
    pub fn resource_types(&self) -> impl Iterator<Item = (&str, &str)> {
        self.classes.iter().map(|(t, c)| (t.as_str(), c.as_str()))
    }

    #[must_use]
    pub fn resource_type_exists(&self, resource_type: &str) -> bool {
        self.classes.contains_key(resource_type)
    }

    fn binding(&self, resource_type: &str) -> Result<&Arc<dyn EntityBinding>> {
        self.bindings
            .get(resource_type)
            .ok_or_else(|| MediatorError::UnknownResourceType(resource_type.to_owned()))
    }

    /// Instantiates a new, zero-valued entity of `resource_type`.
    ///
    /// # Errors
    /// [`MediatorError::UnknownResourceType`] if the type is not exposed.
    pub fn create(&self, resource_type: &str) -> Result<Resource> {
        Ok(self.binding(resource_type)?.construct())
    }

    /// Assigns every entry of `attributes` that names a field of the entity.
    ///
    /// Other keys (derived links, `href`) are ignored. Timestamp fields accept
    /// Unix-epoch seconds as well as their string form.
    ///
    /// # Errors
    /// [`MediatorError::Attributes`] if a value does not fit its field; the
    /// entity is left unchanged in that case.
    #[allow(clippy::unused_self)] // Keep the fluent &Mediator API when a method only delegates
    pub fn set_attributes<'r>(
        &self,
        resource: &'r mut Resource,
        attributes: &AttributeMap,
    ) -> Result<&'r mut Resource> {
        resource.inner.assign(attributes)?;
        Ok(resource)
    }

    /// Flattens `resource` into its wire representation.
    ///
    /// Foreign keys gain a derived link field, timestamps become Unix-epoch
    /// seconds, `href` addresses the resource itself, and the type's
    /// provider, if any, gets the last word.
    ///
    /// # Errors
    /// - [`MediatorError::UnknownEntityClass`] if no exposed type maps to the entity's class
    /// - [`MediatorError::Attributes`] if the model cannot be serialized
    pub fn get_attributes(&self, resource: &Resource) -> Result<AttributeMap> {
        let class = resource.resource_class();
        let resource_type = self
            .types_by_class
            .get(class)
            .ok_or_else(|| MediatorError::UnknownEntityClass(class.to_owned()))?;

        let mut attrs = resource.inner.flatten()?;

        for column in resource.catalog().columns() {
            if let Some(target_class) = &column.related_class {
                let raw = attrs.get(&column.name).unwrap_or(&JsonValue::Null);
                let link = self.link(target_class, &column.name, raw);
                attrs.insert(column.link_name().to_owned(), link);
            }
            if column.kind.is_timestamp()
                && let Some(value) = attrs.get_mut(&column.name)
            {
                *value = timestamp_to_epoch(value);
            }
        }

        let href = format!(
            "{}/{}/{}/",
            self.href,
            resource_type,
            wire_text(&resource.primary_key())
        );
        attrs.insert("href".to_owned(), JsonValue::String(href));

        Ok(match self.providers.get(resource_type) {
            Some(provider) => provider(attrs),
            None => attrs,
        })
    }

    fn link(&self, target_class: &str, column: &str, raw: &JsonValue) -> JsonValue {
        if raw.is_null() {
            return JsonValue::Null;
        }
        if let Some(target_type) = self.types_by_class.get(target_class) {
            JsonValue::String(format!("{}/{}/{}", self.href, target_type, wire_text(raw)))
        } else {
            warn!(
                column,
                target_class,
                "Foreign key targets a class no resource type exposes"
            );
            JsonValue::Null
        }
    }

    /// Looks up one entity by primary key; `Ok(None)` when no row matches.
    ///
    /// # Errors
    /// - [`MediatorError::UnknownResourceType`] if the type is not exposed
    /// - [`MediatorError::InvalidValue`] if `key` does not fit the primary-key column
    /// - [`MediatorError::Db`] if the lookup fails
    pub async fn retrieve(
        &self,
        resource_type: &str,
        key: impl Into<JsonValue>,
    ) -> Result<Option<Resource>> {
        let binding = self.binding(resource_type)?;
        let Some(pk) = binding.catalog().primary_key() else {
            return Ok(None);
        };
        let key = key.into();
        let value = coerce(&pk.name, pk.kind, &key)?;
        let found = binding.find_one(&self.conn, &pk.name, value).await?;
        debug!(
            resource_type,
            key = %key,
            found = found.is_some(),
            "Retrieved resource"
        );
        Ok(found)
    }

    /// Unexecuted query over every entity of `resource_type`.
    ///
    /// # Errors
    /// [`MediatorError::UnknownResourceType`] if the type is not exposed.
    pub fn retrieve_list(&self, resource_type: &str) -> Result<QueryHandle> {
        let binding = self.binding(resource_type)?;
        Ok(QueryHandle::new(resource_type, Arc::clone(binding)))
    }

    /// See [`QueryHandle::filter`].
    ///
    /// # Errors
    /// Unknown attributes and ill-typed values are reported immediately.
    #[allow(clippy::unused_self)] // Keep the fluent &Mediator API when a method only delegates
    pub fn filter(
        &self,
        handle: QueryHandle,
        attribute: &str,
        op: FilterOp,
        value: Option<JsonValue>,
    ) -> Result<QueryHandle> {
        handle.filter(attribute, op, value)
    }

    /// Caps the row count at `max(1, n)`.
    #[must_use]
    #[allow(clippy::unused_self)] // Keep the fluent &Mediator API when a method only delegates
    pub fn limit(&self, handle: QueryHandle, n: i64) -> QueryHandle {
        handle.limit(n)
    }

    #[must_use]
    #[allow(clippy::unused_self)] // Keep the fluent &Mediator API when a method only delegates
    pub fn offset(&self, handle: QueryHandle, n: u64) -> QueryHandle {
        handle.offset(n)
    }

    /// See [`QueryHandle::order_by`].
    ///
    /// # Errors
    /// [`MediatorError::UnknownAttribute`] if `attribute` is not a column of the type.
    #[allow(clippy::unused_self)] // Keep the fluent &Mediator API when a method only delegates
    pub fn order_by(
        &self,
        handle: QueryHandle,
        attribute: &str,
        direction: Order,
    ) -> Result<QueryHandle> {
        handle.order_by(attribute, direction)
    }

    /// Executes `handle`, yielding hydrated resources lazily.
    ///
    /// # Errors
    /// [`MediatorError::Db`] if the query cannot be started; row failures
    /// surface as `Err` items of the stream.
    pub async fn collection_to_iterable(&self, handle: QueryHandle) -> Result<ResourceStream<'_>> {
        let binding = Arc::clone(&handle.binding);
        Ok(binding.stream(&self.conn, handle).await?)
    }

    /// Number of rows matching the handle's conditions, ignoring limit and offset.
    ///
    /// # Errors
    /// [`MediatorError::Db`] if the count query fails.
    pub async fn count(&self, handle: &QueryHandle) -> Result<u64> {
        Ok(handle.binding.count(&self.conn, handle).await?)
    }

    /// Persists `resource`; `None` means the attempt was rejected or failed
    /// and the reasons were appended to [`Mediator::error`].
    pub async fn save<'r>(&mut self, resource: &'r mut Resource) -> Option<&'r mut Resource> {
        if let Err(failures) = resource.inner.validate() {
            warn!(
                class = resource.resource_class(),
                failures = failures.len(),
                "Validation failed, resource not saved"
            );
            self.errors.extend(failures.iter().map(ToString::to_string));
            return None;
        }

        match resource.inner.persist(&self.conn).await {
            Ok(()) => {
                debug!(
                    class = resource.resource_class(),
                    key = %resource.primary_key(),
                    "Saved resource"
                );
                Some(resource)
            }
            Err(e) => {
                warn!(
                    class = resource.resource_class(),
                    error = %e,
                    "Failed to persist resource"
                );
                self.errors.push(PERSISTENCE_FAILURE.to_owned());
                self.errors.push(e.to_string());
                None
            }
        }
    }

    /// Deletes `resource`, returning whether it is now in the deleted state.
    ///
    /// Unlike `save`, failures are not recorded in the error log.
    ///
    /// # Errors
    /// [`MediatorError::Db`] if the entity was never saved or the delete fails.
    pub async fn delete(&self, resource: &mut Resource) -> Result<bool> {
        let deleted = resource.inner.remove(&self.conn).await?;
        debug!(
            class = resource.resource_class(),
            key = %resource.primary_key(),
            "Deleted resource"
        );
        Ok(deleted)
    }

    /// Deletes every row matching the handle's conditions; returns rows affected.
    ///
    /// # Errors
    /// [`MediatorError::Db`] if the delete fails.
    pub async fn delete_list(&self, handle: QueryHandle) -> Result<u64> {
        let binding = Arc::clone(&handle.binding);
        let resource_type = handle.resource_type().to_owned();
        let affected = binding.delete_matching(&self.conn, handle).await?;
        debug!(%resource_type, affected, "Deleted matching resources");
        Ok(affected)
    }

    /// Accumulated error log, in append order.
    #[must_use]
    pub fn error(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("href", &self.href)
            .field("classes", &self.classes)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// Strings are used raw in links; other scalars by their JSON text.
fn wire_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `ModKit` resource mediator.
//!
//! Exposes `SeaORM` entities through one small, uniform interface addressed by
//! resource-type names, the shape an HTTP-facing resource controller needs:
//! create, read and write flat attribute maps, filter and paginate lists,
//! save and delete.
//!
//! # Overview
//! - [`EntityRegistry`] binds entity classes (table names) to their `SeaORM`
//!   entity, once at startup.
//! - [`Mediator`] maps resource types to those classes and runs every
//!   operation. Foreign keys are expanded into hypermedia links, timestamps
//!   are exposed as Unix-epoch seconds, and every resource carries its own
//!   `href`.
//! - [`FilterOp`] is the closed set of comparison operators;
//!   [`native_operator`] translates them to sea-query operators.
//! - Validation and persistence failures of `save` are collected in
//!   [`Mediator::error`], an append-only log; lookup errors are returned as
//!   [`MediatorError`].
//!
//! # Example
//! ```rust,no_run
//! use futures::TryStreamExt;
//! use modkit_mediator::{EntityRegistry, FilterOp, Mediator};
//! use serde_json::json;
//!
//! mod widget {
//!     use sea_orm::entity::prelude::*;
//!     use serde::{Deserialize, Serialize};
//!
//!     #[derive(Clone, Debug, Default, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
//!     #[sea_orm(table_name = "widgets")]
//!     pub struct Model {
//!         #[sea_orm(primary_key)]
//!         pub id: i32,
//!         pub status: String,
//!     }
//!
//!     #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
//!     pub enum Relation {}
//!
//!     impl ActiveModelBehavior for ActiveModel {}
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let conn = sea_orm::Database::connect("sqlite::memory:").await?;
//! let mut mediator = Mediator::builder(conn, "https://api.example.com/v1")
//!     .registry(EntityRegistry::new().register::<widget::Entity>())
//!     .resource("widgets", "widgets")
//!     .build()?;
//!
//! let mut widget = mediator.create("widgets")?;
//! let attrs = json!({ "status": "open" });
//! mediator.set_attributes(&mut widget, attrs.as_object().unwrap())?;
//! if mediator.save(&mut widget).await.is_none() {
//!     eprintln!("{:?}", mediator.error());
//! }
//!
//! let open = mediator.retrieve_list("widgets")?;
//! let open = mediator.filter(open, "status", FilterOp::Eq, Some(json!("open")))?;
//! let open = mediator.limit(open, 20);
//! let widgets: Vec<_> = mediator.collection_to_iterable(open).await?.try_collect().await?;
//! for w in &widgets {
//!     println!("{}", serde_json::Value::Object(mediator.get_attributes(w)?));
//! }
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod kind;
pub mod mediator;
pub mod query;
pub mod record;
pub mod validate;

pub use binding::EntityRegistry;
pub use catalog::{ColumnInfo, TableCatalog};
pub use config::MediatorConfig;
pub use error::{MediatorError, Result};
pub use filter::{FilterOp, native_operator};
pub use kind::FieldKind;
pub use mediator::{AttributeProvider, Mediator, MediatorBuilder, PERSISTENCE_FAILURE};
pub use query::{QueryHandle, ResourceStream};
pub use record::{AttributeMap, MediatedModel, Resource};
pub use validate::{Validate, ValidationFailure};

pub use sea_orm::Order;

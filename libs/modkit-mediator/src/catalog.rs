//! Metadata catalog: per-entity column descriptors read from `SeaORM` definitions.
//!
//! A [`TableCatalog`] is built once per registered entity by walking the
//! entity's `Column` and `Relation` enums. Foreign keys are the `from` columns
//! of `belongs_to` relations; their target is the related entity's table name,
//! which is also the class name the entity is registered under.

use sea_orm::sea_query::TableRef;
use sea_orm::{
    ColumnTrait, EntityTrait, Iden, IdenStatic, Identity, Iterable, PrimaryKeyToColumn,
    RelationTrait,
};

use crate::kind::FieldKind;

/// Descriptor of one column of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name; also the wire field name.
    pub name: String,
    /// Key of the column's field in the model's serde form.
    pub(crate) field: String,
    pub kind: FieldKind,
    pub nullable: bool,
    pub primary_key: bool,
    /// Class (table) name the column refers to, when it is a foreign key.
    pub related_class: Option<String>,
}

impl ColumnInfo {
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        self.related_class.is_some()
    }

    /// Name of the hypermedia link field derived from a foreign-key column:
    /// the column name without its last three characters (`owner_id` → `owner`,
    /// `ownerId` → `owne`).
    #[must_use]
    pub fn link_name(&self) -> &str {
        strip_key_suffix(&self.name)
    }
}

pub(crate) fn strip_key_suffix(name: &str) -> &str {
    match name.char_indices().rev().nth(2) {
        Some((idx, _)) => &name[..idx],
        None => "",
    }
}

/// Ordered column descriptors of one entity class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCatalog {
    class_name: String,
    columns: Vec<ColumnInfo>,
}

impl TableCatalog {
    /// Introspects the `SeaORM` entity `E`.
    #[must_use]
    pub fn of<E: EntityTrait>() -> Self {
        let class_name = E::default().table_name().to_owned();

        let pk_names: Vec<String> = E::PrimaryKey::iter()
            .map(|pk| pk.into_column().as_str().to_owned())
            .collect();

        let foreign_keys: Vec<(String, String)> = E::Relation::iter()
            .filter_map(|rel| {
                let def = rel.def();
                // has_one / has_many are declared on the referenced side
                if def.is_owner {
                    return None;
                }
                let Identity::Unary(from_col) = &def.from_col else {
                    return None;
                };
                let target = match &def.to_tbl {
                    TableRef::Table(tbl) | TableRef::SchemaTable(_, tbl) => {
                        Iden::to_string(&**tbl)
                    }
                    _ => return None,
                };
                Some((Iden::to_string(&**from_col), target))
            })
            .collect();

        let columns = E::Column::iter()
            .map(|col| {
                let name = col.as_str().to_owned();
                let def = col.def();
                ColumnInfo {
                    kind: FieldKind::from(def.get_column_type()),
                    nullable: def.is_null(),
                    primary_key: pk_names.contains(&name),
                    related_class: foreign_keys
                        .iter()
                        .find(|(from, _)| *from == name)
                        .map(|(_, target)| target.clone()),
                    field: name.clone(),
                    name,
                }
            })
            .collect();

        Self {
            class_name,
            columns,
        }
    }

    /// Pairs columns with the model's serde field keys, given in field order.
    ///
    /// Columns renamed with `column_name` keep their column name on the wire
    /// while reading and writing the model through its field key. A key list
    /// that does not line up with the columns leaves the identity mapping.
    #[must_use]
    pub(crate) fn with_model_fields(mut self, fields: Vec<String>) -> Self {
        if fields.len() == self.columns.len() {
            for (column, field) in self.columns.iter_mut().zip(fields) {
                column.field = field;
            }
        }
        self
    }

    /// Class (table) name of the entity.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// First primary-key column; composite keys are not addressable by href.
    #[must_use]
    pub fn primary_key(&self) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.primary_key)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.is_foreign_key())
    }
}

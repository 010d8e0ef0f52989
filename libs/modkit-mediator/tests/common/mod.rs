#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]
#![allow(dead_code)]

use chrono::NaiveDateTime;
use modkit_mediator::{EntityRegistry, Mediator, Validate, ValidationFailure};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};

pub const HREF: &str = "https://api.x/v1";

pub mod user {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        #[sea_orm(unique)]
        pub email: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::widget::Entity")]
        Widgets,
    }

    impl Related<super::widget::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Widgets.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod widget {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "widgets")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub owner_id: Option<i32>,
        pub status: String,
        pub created_at: DateTime,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::user::Entity",
            from = "Column::OwnerId",
            to = "super::user::Column::Id"
        )]
        Owner,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Owner.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod note {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "notes")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub body: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

impl Validate for note::Model {
    fn validate(&self) -> Result<(), Vec<ValidationFailure>> {
        let mut failures = Vec::new();
        if self.name.trim().is_empty() {
            failures.push(ValidationFailure::new("name", "required"));
        }
        if self.body.len() > 140 {
            failures.push(ValidationFailure::new("body", "too long"));
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

pub async fn setup_db() -> DatabaseConnection {
    let conn = Database::connect("sqlite::memory:").await.unwrap();
    for ddl in [
        "CREATE TABLE users (
id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
name TEXT NOT NULL,
email TEXT NOT NULL UNIQUE
)",
        "CREATE TABLE widgets (
id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
owner_id INTEGER NULL,
status TEXT NOT NULL,
created_at TEXT NOT NULL
)",
        "CREATE TABLE notes (
id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
name TEXT NOT NULL,
body TEXT NOT NULL
)",
    ] {
        conn.execute_unprepared(ddl).await.unwrap();
    }
    conn
}

#[must_use]
pub fn registry() -> EntityRegistry {
    EntityRegistry::new()
        .register::<user::Entity>()
        .register::<widget::Entity>()
        .register_validated::<note::Entity>()
}

/// Mediator over a fresh database exposing `users`, `widgets` and `notes`.
pub async fn mediator() -> Mediator {
    Mediator::builder(setup_db().await, HREF)
        .registry(registry())
        .resource("users", "users")
        .resource("widgets", "widgets")
        .resource("notes", "notes")
        .build()
        .unwrap()
}

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub async fn seed_user(conn: &DatabaseConnection, id: i32, name: &str) {
    user::ActiveModel {
        id: Set(id),
        name: Set(name.to_owned()),
        email: Set(format!("{name}@example.com")),
    }
    .insert(conn)
    .await
    .unwrap();
}

pub async fn seed_widget(
    conn: &DatabaseConnection,
    id: i32,
    owner_id: Option<i32>,
    status: &str,
    created_at: &str,
) {
    widget::ActiveModel {
        id: Set(id),
        owner_id: Set(owner_id),
        status: Set(status.to_owned()),
        created_at: Set(ts(created_at)),
    }
    .insert(conn)
    .await
    .unwrap();
}

/// Users 1..=3 and widgets 1..=7 with mixed statuses; widget 7 is owned by user 3.
pub async fn seed_fixture(conn: &DatabaseConnection) {
    for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
        seed_user(conn, id, name).await;
    }
    for (id, owner, status, created) in [
        (1, Some(1), "open", "2024-01-01 00:00:00"),
        (2, Some(1), "closed", "2024-01-01 01:00:00"),
        (3, None, "open", "2024-01-01 02:00:00"),
        (4, Some(2), "pending", "2024-01-01 03:00:00"),
        (5, Some(2), "open", "2024-01-01 04:00:00"),
        (6, None, "closed", "2024-01-01 05:00:00"),
        (7, Some(3), "open", "2024-01-02 03:04:05"),
    ] {
        seed_widget(conn, id, owner, status, created).await;
    }
}

use sea_orm::{DbBackend, Schema};
use sea_query::{ColumnDef, Table};

use super::entity::{Column, Entity};

/// `CREATE TABLE IF NOT EXISTS` for the credential table, rendered for the
/// given backend from the entity definition.
pub fn create_table_sql(backend: DbBackend) -> String {
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(Entity);
    statement.if_not_exists();
    backend.build(&statement).sql
}

/// Columns added after the first release of the table. A fresh table already
/// has them, so each migration is expected to fail with "duplicate column"
/// there and that failure counts as applied.
pub fn additive_migrations(backend: DbBackend) -> Vec<String> {
    let columns = [
        ColumnDef::new(Column::Username).text().to_owned(),
        ColumnDef::new(Column::Email).text().to_owned(),
        ColumnDef::new(Column::PasswordHash).text().to_owned(),
        ColumnDef::new(Column::NeverExpire).boolean().not_null().default(false).to_owned(),
        ColumnDef::new(Column::IsActive).boolean().not_null().default(true).to_owned(),
    ];

    columns
        .into_iter()
        .map(|column| {
            let mut statement = Table::alter().table(Entity).to_owned();
            match backend {
                DbBackend::Postgres => statement.add_column_if_not_exists(column),
                _ => statement.add_column(column),
            };
            backend.build(&statement).sql
        })
        .collect()
}

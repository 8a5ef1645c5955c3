pub use sea_orm_migration::prelude::*;

mod m20250901_093012_create_read_progress_table;
mod m20250901_094540_index_read_progress_status;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_093012_create_read_progress_table::Migration),
            Box::new(m20250901_094540_index_read_progress_status::Migration),
        ]
    }
}

pub mod read_progress;

pub mod prelude {
    pub use super::read_progress::Entity as ReadProgress;
}

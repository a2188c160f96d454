pub mod eager_loading;
pub mod generic_repository;

pub mod api;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub mod backend;
pub mod commerce;
pub mod improvement;

pub use backend::BackendClient;

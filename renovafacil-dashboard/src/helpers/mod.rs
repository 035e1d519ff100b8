pub mod notifier;
pub mod store_path;
pub mod text;

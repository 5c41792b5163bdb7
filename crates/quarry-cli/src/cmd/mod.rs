pub mod delete;
pub mod list;
pub mod rebuild;
pub mod search;
pub mod show;
pub mod upload;

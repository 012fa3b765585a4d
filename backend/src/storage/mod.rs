pub mod db;

pub use db::{DbConnection, RecordMutation};

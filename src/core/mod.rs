pub mod error;
pub mod value;

pub use error::{ConsysError, Result};
pub use value::{
    Document, ValueKind, compare_values, get_path, remove_path, set_path, values_equal,
};

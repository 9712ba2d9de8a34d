pub mod form;
pub mod table;

pub use form::{generate_form_schema, FormField, FormSchema};
pub use table::{display_value, generate_table_schema, resolve_relation_label, Column, TableSchema};

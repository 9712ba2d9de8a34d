pub mod form;
pub mod table;

pub use form::{FormController, FormError, FormState, SubmitRequest};
pub use table::{PendingAction, RelatedRecords, StatusFilter, TableController};

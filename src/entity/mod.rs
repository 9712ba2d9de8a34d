pub mod definition;
pub mod record;
pub mod registry;

pub use definition::{
    DefaultValue, DerivationRule, EntityDefinition, EntityDisplay, EntityType, FieldDefinition,
    FieldType, Relation, ValidationRules,
};
pub use record::DataItem;

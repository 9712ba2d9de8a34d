use super::definition::{
    DefaultValue, DerivationRule, EntityDefinition, EntityDisplay, EntityType, FieldDefinition,
    FieldType, Relation, ValidationRules,
};

const STATUS_OPTIONS: &[&str] = &["draft", "completed", "cancelled"];
const ACTIVE_OPTIONS: &[&str] = &["Yes", "No"];

const STATUS_FIELD: FieldDefinition = FieldDefinition {
    name: "status",
    field_type: FieldType::Enum,
    label: "Status",
    options: STATUS_OPTIONS,
    filterable: true,
    hide_in_form: true,
    hide_in_table: true,
    default_value: Some(DefaultValue::Text("draft")),
    ..FieldDefinition::BLANK
};

const ACTIVE_FIELD: FieldDefinition = FieldDefinition {
    name: "active",
    field_type: FieldType::Enum,
    label: "Active",
    options: ACTIVE_OPTIONS,
    filterable: true,
    hide_in_form: true,
    default_value: Some(DefaultValue::Text("Yes")),
    ..FieldDefinition::BLANK
};

pub static PRODUCT: EntityDefinition = EntityDefinition {
    entity: EntityType::Product,
    name: "product",
    route: "product",
    display: EntityDisplay {
        list: "Products List",
        create: "Create Product",
        edit: "Edit Product",
    },
    fields: &[
        FieldDefinition {
            name: "name",
            field_type: FieldType::Text,
            label: "Name",
            placeholder: Some("Product name"),
            validation: Some(ValidationRules {
                required: true,
                min_length: Some(2),
                ..ValidationRules::NONE
            }),
            filterable: true,
            ..FieldDefinition::BLANK
        },
        FieldDefinition {
            name: "quantity",
            field_type: FieldType::Number,
            label: "Quantity",
            placeholder: Some("Enter quantity"),
            validation: Some(ValidationRules {
                required: true,
                min: Some(0.0),
                ..ValidationRules::NONE
            }),
            filterable: true,
            ..FieldDefinition::BLANK
        },
        FieldDefinition {
            name: "prix",
            field_type: FieldType::Number,
            label: "Price",
            placeholder: Some("Enter price"),
            validation: Some(ValidationRules {
                required: true,
                min: Some(0.0),
                ..ValidationRules::NONE
            }),
            filterable: true,
            ..FieldDefinition::BLANK
        },
        STATUS_FIELD,
        ACTIVE_FIELD,
    ],
    derivations: &[],
};

pub static SALES: EntityDefinition = EntityDefinition {
    entity: EntityType::Sales,
    name: "sales",
    route: "sales",
    display: EntityDisplay {
        list: "Sales List",
        create: "Create Sale",
        edit: "Edit Sale",
    },
    fields: &[
        FieldDefinition {
            name: "product",
            field_type: FieldType::Enum,
            label: "Product",
            validation: Some(ValidationRules {
                required: true,
                ..ValidationRules::NONE
            }),
            filterable: true,
            relation: Some(Relation {
                entity: EntityType::Product,
                label_field: "name",
                value_field: "id",
            }),
            ..FieldDefinition::BLANK
        },
        FieldDefinition {
            name: "prix_total",
            field_type: FieldType::Number,
            label: "Total Price",
            placeholder: Some("Auto-calculated from product"),
            validation: Some(ValidationRules {
                required: true,
                min: Some(0.0),
                ..ValidationRules::NONE
            }),
            filterable: true,
            read_only: true,
            ..FieldDefinition::BLANK
        },
        STATUS_FIELD,
        ACTIVE_FIELD,
    ],
    derivations: &[DerivationRule {
        source: "product",
        target: "prix_total",
        entity: EntityType::Product,
        key: "id",
        field: "prix",
    }],
};

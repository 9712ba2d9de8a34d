use crate::entity::{
    DefaultValue, EntityType, FieldDefinition, FieldType, Relation, ValidationRules,
};

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: &'static str,
    /// 归一化后的类型：enum/boolean 在没有 relation 或 options 时当作 text
    pub field_type: FieldType,
    pub label: &'static str,
    pub placeholder: &'static str,
    pub options: &'static [&'static str],
    pub validation: Option<ValidationRules>,
    pub relation: Option<Relation>,
    pub default_value: Option<DefaultValue>,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTitles {
    pub page_create: &'static str,
    pub page_edit: &'static str,
    pub button_create: &'static str,
    pub button_edit: &'static str,
}

impl FormTitles {
    pub fn page(&self, editing: bool) -> &'static str {
        if editing {
            self.page_edit
        } else {
            self.page_create
        }
    }

    pub fn button(&self, editing: bool) -> &'static str {
        if editing {
            self.button_edit
        } else {
            self.button_create
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormSchema {
    pub entity: EntityType,
    pub titles: FormTitles,
    pub fields: Vec<FormField>,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn normalize_type(field: &FieldDefinition) -> FieldType {
    match field.field_type {
        FieldType::Enum | FieldType::Boolean
            if field.relation.is_some() || !field.options.is_empty() =>
        {
            FieldType::Enum
        }
        FieldType::Enum | FieldType::Boolean => FieldType::Text,
        other => other,
    }
}

pub fn generate_form_schema(entity: EntityType) -> FormSchema {
    let def = entity.definition();
    FormSchema {
        entity,
        titles: FormTitles {
            page_create: def.display.create,
            page_edit: def.display.edit,
            button_create: "Create",
            button_edit: "Update",
        },
        fields: def
            .fields
            .iter()
            .filter(|f| !f.hide_in_form)
            .map(|f| FormField {
                name: f.name,
                field_type: normalize_type(f),
                label: f.label,
                placeholder: f.placeholder.unwrap_or(""),
                options: f.options,
                validation: f.validation,
                relation: f.relation,
                default_value: f.default_value,
                read_only: f.read_only,
            })
            .collect(),
    }
}

use crate::entity::{DataItem, EntityType, FieldDefinition, FieldType, Relation};
use serde_json::Value;

/// 单元格格式化方式，由字段类型决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRender {
    /// 价格类数字：两位小数 + " €"
    Currency,
    Number,
    /// 外键原样输出，由调用方解析成显示名
    RelationKey,
    Capitalized,
    Plain,
}

impl ColumnRender {
    fn for_field(field: &FieldDefinition) -> Self {
        match field.field_type {
            FieldType::Number => {
                if field.name.contains("price") || field.name.contains("prix") {
                    ColumnRender::Currency
                } else {
                    ColumnRender::Number
                }
            }
            FieldType::Enum => {
                let to_product = field
                    .relation
                    .map(|r| r.entity == EntityType::Product)
                    .unwrap_or(false);
                if field.name == "product" || to_product {
                    ColumnRender::RelationKey
                } else {
                    ColumnRender::Capitalized
                }
            }
            _ => ColumnRender::Plain,
        }
    }

    pub fn render(&self, value: Option<&Value>) -> String {
        let value = match value {
            None | Some(Value::Null) => return String::new(),
            Some(v) => v,
        };
        match self {
            ColumnRender::Currency => match as_number(value) {
                Some(n) => format!("{:.2} €", n),
                None => display_value(value),
            },
            ColumnRender::Number | ColumnRender::Plain => display_value(value),
            ColumnRender::RelationKey => {
                if crate::validation::is_falsy(value) {
                    String::new()
                } else {
                    display_value(value)
                }
            }
            ColumnRender::Capitalized => {
                if crate::validation::is_falsy(value) {
                    return String::new();
                }
                let s = display_value(value);
                let mut chars = s.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// 与浏览器 `String(value)` 一致的文本：整数不带 ".0"
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", f as i64)
                } else {
                    f.to_string()
                }
            } else {
                n.to_string()
            }
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
    pub filterable: bool,
    pub render: ColumnRender,
    pub relation: Option<Relation>,
}

impl Column {
    pub fn render_value(&self, value: Option<&Value>) -> String {
        self.render.render(value)
    }

    /// 表格显示用：关联字段解析成目标记录的 label 字段，解析不到时保留原值
    pub fn display(&self, item: &DataItem, related: &[DataItem]) -> String {
        let value = item.get(self.key);
        if let (Some(relation), Some(v)) = (self.relation, value) {
            if let Some(label) = resolve_relation_label(&relation, v, related) {
                return label;
            }
        }
        self.render_value(value)
    }
}

pub fn resolve_relation_label(
    relation: &Relation,
    value: &Value,
    related: &[DataItem],
) -> Option<String> {
    related
        .iter()
        .find(|r| r.matches_key(relation.value_field, value))
        .and_then(|r| r.get(relation.label_field))
        .map(display_value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFilters {
    pub searchable: bool,
    pub status_filter: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub entity: EntityType,
    pub title: &'static str,
    pub page_title: &'static str,
    pub columns: Vec<Column>,
    pub filters: TableFilters,
}

pub fn generate_table_schema(entity: EntityType) -> TableSchema {
    let def = entity.definition();
    TableSchema {
        entity,
        title: def.display.list,
        page_title: def.display.list,
        columns: def
            .fields
            .iter()
            .filter(|f| !f.hide_in_table)
            .map(|f| Column {
                key: f.name,
                label: f.label,
                filterable: f.filterable,
                render: ColumnRender::for_field(f),
                relation: f.relation,
            })
            .collect(),
        filters: TableFilters {
            searchable: true,
            status_filter: true,
        },
    }
}

use crate::entity::record::DataItem;
use serde_json::Value;
use std::fmt;

/// 已配置的实体类型
///
/// 实体集合是封闭的：未知名称只会出现在用户输入解析阶段，`definition()` 永远有结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Product,
    Sales,
}

impl EntityType {
    pub const ALL: [EntityType; 2] = [EntityType::Product, EntityType::Sales];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Product => "product",
            EntityType::Sales => "sales",
        }
    }

    /// 解析用户输入的实体名（也接受 route 与常见复数写法）
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "product" | "products" => Some(EntityType::Product),
            "sales" | "sale" => Some(EntityType::Sales),
            _ => None,
        }
    }

    pub fn definition(&self) -> &'static EntityDefinition {
        match self {
            EntityType::Product => &super::registry::PRODUCT,
            EntityType::Sales => &super::registry::SALES,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Number,
    #[allow(dead_code)] // 当前注册表没有布尔字段，表单生成时归一为 text
    Boolean,
    Enum,
}

/// 字段校验规则，未设置的约束为 `None`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationRules {
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<&'static str>,
}

impl ValidationRules {
    pub const NONE: ValidationRules = ValidationRules {
        required: false,
        min: None,
        max: None,
        min_length: None,
        max_length: None,
        pattern: None,
    };
}

/// 外键关系：字段值是目标实体中 `value_field` 的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub entity: EntityType,
    pub label_field: &'static str,
    pub value_field: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Text(&'static str),
    #[allow(dead_code)]
    Number(f64),
    #[allow(dead_code)]
    Bool(bool),
}

impl DefaultValue {
    pub fn to_value(&self) -> Value {
        match self {
            DefaultValue::Text(s) => Value::String((*s).to_string()),
            DefaultValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            DefaultValue::Bool(b) => Value::Bool(*b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub field_type: FieldType,
    pub label: &'static str,
    pub placeholder: Option<&'static str>,
    pub options: &'static [&'static str],
    pub validation: Option<ValidationRules>,
    pub relation: Option<Relation>,
    pub filterable: bool,
    pub hide_in_form: bool,
    pub hide_in_table: bool,
    pub default_value: Option<DefaultValue>,
    pub read_only: bool,
}

impl FieldDefinition {
    /// 所有可选属性都为空的模板，注册表里用结构体更新语法展开
    pub const BLANK: FieldDefinition = FieldDefinition {
        name: "",
        field_type: FieldType::Text,
        label: "",
        placeholder: None,
        options: &[],
        validation: None,
        relation: None,
        filterable: false,
        hide_in_form: false,
        hide_in_table: false,
        default_value: None,
        read_only: false,
    };
}

/// 派生字段规则：`source` 变化时，在 `entity` 的记录里找 `key == 新值` 的那条，
/// 把它的 `field` 复制到草稿的 `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationRule {
    pub source: &'static str,
    pub target: &'static str,
    pub entity: EntityType,
    pub key: &'static str,
    pub field: &'static str,
}

impl DerivationRule {
    /// 找不到记录或记录缺少该字段时返回 `None`
    pub fn resolve(&self, source_value: &Value, related: &[DataItem]) -> Option<Value> {
        related
            .iter()
            .find(|item| item.matches_key(self.key, source_value))
            .and_then(|item| item.get(self.field).cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDisplay {
    pub list: &'static str,
    pub create: &'static str,
    pub edit: &'static str,
}

#[derive(Debug, PartialEq)]
pub struct EntityDefinition {
    pub entity: EntityType,
    pub name: &'static str,
    pub route: &'static str,
    pub display: EntityDisplay,
    pub fields: &'static [FieldDefinition],
    pub derivations: &'static [DerivationRule],
}

impl EntityDefinition {
    /// 表单中隐藏、但提交时必须带上的字段默认值（状态/工作流字段）
    pub fn hidden_defaults(&self) -> serde_json::Map<String, Value> {
        self.fields
            .iter()
            .filter(|f| f.hide_in_form)
            .filter_map(|f| f.default_value.map(|d| (f.name.to_string(), d.to_value())))
            .collect()
    }
}

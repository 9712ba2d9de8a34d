use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 后端返回的一条记录：服务端分配的 `id` 加上任意字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// 有的后端用数字主键，统一成字符串
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid record id: {}",
            other
        ))),
    }
}

impl DataItem {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    /// `key_field` 为 "id" 时比较主键，否则比较字段值
    pub fn matches_key(&self, key_field: &str, key: &Value) -> bool {
        if key_field == "id" {
            match key {
                Value::String(s) => s == &self.id,
                Value::Number(n) => n.to_string() == self.id,
                _ => false,
            }
        } else {
            self.fields.get(key_field) == Some(key)
        }
    }

    /// 提交用的完整载荷（包含 id）
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_become_strings() {
        let item: DataItem = serde_json::from_value(json!({"id": 7, "name": "Widget"})).unwrap();
        assert_eq!(item.id, "7");
        assert_eq!(item.get_str("name"), Some("Widget"));
        assert!(!item.has("id"));
    }

    #[test]
    fn matches_key_compares_ids_and_fields() {
        let item: DataItem =
            serde_json::from_value(json!({"id": "p1", "sku": "W-1"})).unwrap();
        assert!(item.matches_key("id", &json!("p1")));
        assert!(!item.matches_key("id", &json!("p2")));
        assert!(item.matches_key("sku", &json!("W-1")));
    }

    #[test]
    fn missing_id_is_rejected() {
        let res: Result<DataItem, _> = serde_json::from_value(json!({"name": "x"}));
        assert!(res.is_err());
    }
}

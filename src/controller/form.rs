use crate::entity::{DataItem, EntityType, FieldType};
use crate::schema::{display_value, generate_form_schema, FormField, FormSchema};
use crate::store::{EntityStore, StoreError};
use crate::validation::{has_errors, is_falsy, validate_field, validate_form, FormErrors};
use log::{debug, info, warn};
use serde_json::{Map, Number, Value};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_FORM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Pristine,
    Dirty,
    Submitting,
    Done,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("Please fix the form errors")]
    Invalid(FormErrors),
    #[error("form is already submitting")]
    Busy,
    #[error("form is closed")]
    Closed,
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("{0} is read-only")]
    ReadOnly(String),
    #[error("{0}")]
    Store(#[from] StoreError),
}

/// 交给后台执行的提交请求，`form_id` 用来识别结果属于哪个表单
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub form_id: u64,
    pub entity: EntityType,
    pub record_id: Option<String>,
    pub payload: Map<String, Value>,
}

impl SubmitRequest {
    pub async fn execute(&self, store: &EntityStore) -> Result<DataItem, StoreError> {
        match &self.record_id {
            Some(id) => store.update(self.entity, id, &self.payload).await,
            None => store.create(self.entity, &self.payload).await,
        }
    }
}

/// 一个新建/编辑表单的草稿与状态
#[derive(Debug, Clone)]
pub struct FormController {
    id: u64,
    schema: FormSchema,
    record_id: Option<String>,
    draft: Map<String, Value>,
    errors: FormErrors,
    state: FormState,
    submit_error: Option<String>,
}

impl FormController {
    fn with_draft(entity: EntityType, record_id: Option<String>, draft: Map<String, Value>) -> Self {
        let id = NEXT_FORM_ID.fetch_add(1, Ordering::Relaxed);
        debug!("form #{} opened for {} ({:?})", id, entity, record_id);
        Self {
            id,
            schema: generate_form_schema(entity),
            record_id,
            draft,
            errors: FormErrors::new(),
            state: FormState::Pristine,
            submit_error: None,
        }
    }

    /// 新建：草稿以隐藏字段默认值开始
    pub fn new_create(entity: EntityType) -> Self {
        Self::with_draft(entity, None, entity.definition().hidden_defaults())
    }

    /// 编辑：草稿以现有记录开始；带着来源字段却缺少目标字段的记录补算一次
    pub fn new_edit(entity: EntityType, record: &DataItem, store: &EntityStore) -> Self {
        let mut form = Self::with_draft(entity, Some(record.id.clone()), record.fields.clone());
        for rule in entity.definition().derivations {
            let has_source = form.draft.get(rule.source).map_or(false, |v| !is_falsy(v));
            if has_source && !form.draft.contains_key(rule.target) {
                form.derive(rule.source, store);
            }
        }
        form
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entity(&self) -> EntityType {
        self.schema.entity
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn fields(&self) -> &[FormField] {
        &self.schema.fields
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    pub fn is_editing(&self) -> bool {
        self.record_id.is_some()
    }

    pub fn title(&self) -> &'static str {
        self.schema.titles.page(self.is_editing())
    }

    pub fn button_label(&self) -> &'static str {
        self.schema.titles.button(self.is_editing())
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn draft(&self) -> &Map<String, Value> {
        &self.draft
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.draft.get(name)
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(|s| s.as_str())
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    fn editable_field(&self, name: &str) -> Result<FormField, FormError> {
        match self.state {
            FormState::Submitting => return Err(FormError::Busy),
            FormState::Done => return Err(FormError::Closed),
            _ => {}
        }
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        if field.read_only {
            return Err(FormError::ReadOnly(field.label.to_string()));
        }
        Ok(field.clone())
    }

    /// 写入字段值：标记为已修改、执行派生规则、实时校验
    pub fn set_field(&mut self, name: &str, value: Value, store: &EntityStore) -> Result<(), FormError> {
        let field = self.editable_field(name)?;
        self.draft.insert(name.to_string(), value);
        self.state = FormState::Dirty;
        self.submit_error = None;
        self.derive(name, store);
        self.revalidate(&field);
        Ok(())
    }

    /// 键盘输入的原始文本，按字段类型解析
    pub fn set_input(&mut self, name: &str, raw: &str, store: &EntityStore) -> Result<(), FormError> {
        let field = self.editable_field(name)?;
        let value = match field.field_type {
            FieldType::Number => parse_number(raw),
            _ => Value::String(raw.to_string()),
        };
        self.set_field(name, value, store)
    }

    /// 下拉字段的候选项：(值, 显示文字)
    pub fn options(&self, field: &FormField, store: &EntityStore) -> Vec<(Value, String)> {
        match field.relation {
            Some(relation) => store
                .records(relation.entity)
                .iter()
                .map(|r| {
                    let value = if relation.value_field == "id" {
                        Value::String(r.id.clone())
                    } else {
                        r.get(relation.value_field).cloned().unwrap_or(Value::Null)
                    };
                    let label = r
                        .get(relation.label_field)
                        .map(display_value)
                        .unwrap_or_else(|| r.id.clone());
                    (value, label)
                })
                .collect(),
            None => field
                .options
                .iter()
                .map(|o| (Value::String(o.to_string()), o.to_string()))
                .collect(),
        }
    }

    /// 在候选项中前后切换
    pub fn cycle_option(&mut self, name: &str, forward: bool, store: &EntityStore) -> Result<(), FormError> {
        let field = self.editable_field(name)?;
        let options = self.options(&field, store);
        if options.is_empty() {
            return Ok(());
        }
        let current = self
            .draft
            .get(name)
            .and_then(|v| options.iter().position(|(o, _)| o == v));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => options.len() - 1,
            (Some(i), true) => (i + 1) % options.len(),
            (Some(i), false) => (i + options.len() - 1) % options.len(),
        };
        let value = options[next].0.clone();
        self.set_field(name, value, store)
    }

    fn derive(&mut self, source: &str, store: &EntityStore) {
        let rules = self.schema.entity.definition().derivations;
        for rule in rules.iter().filter(|r| r.source == source) {
            let Some(source_value) = self.draft.get(source).filter(|v| !is_falsy(v)).cloned() else {
                continue;
            };
            match rule.resolve(&source_value, &store.records(rule.entity)) {
                Some(value) => {
                    debug!("form #{} {} -> {} = {}", self.id, rule.source, rule.target, value);
                    self.draft.insert(rule.target.to_string(), value);
                    if let Some(target) = self.schema.field(rule.target).cloned() {
                        self.revalidate(&target);
                    }
                }
                None => warn!("{} 中找不到 {}={}", rule.entity, rule.key, source_value),
            }
        }
    }

    fn revalidate(&mut self, field: &FormField) {
        match validate_field(self.draft.get(field.name), field.validation.as_ref(), field.label) {
            Some(e) => {
                self.errors.insert(field.name.to_string(), e.to_string());
            }
            None => {
                self.errors.remove(field.name);
            }
        }
    }

    /// 校验并生成提交请求；之后到 `finish_submit` 之前拒绝一切输入
    pub fn begin_submit(&mut self) -> Result<SubmitRequest, FormError> {
        match self.state {
            FormState::Submitting => return Err(FormError::Busy),
            FormState::Done => return Err(FormError::Closed),
            _ => {}
        }
        self.errors = validate_form(&self.draft, &self.schema.fields);
        if has_errors(&self.errors) {
            let err = FormError::Invalid(self.errors.clone());
            self.submit_error = Some(err.to_string());
            return Err(err);
        }

        let mut payload = self.schema.entity.definition().hidden_defaults();
        for (k, v) in &self.draft {
            payload.insert(k.clone(), v.clone());
        }
        self.state = FormState::Submitting;
        self.submit_error = None;
        info!("form #{} submitting {}", self.id, self.schema.entity);
        Ok(SubmitRequest {
            form_id: self.id,
            entity: self.schema.entity,
            record_id: self.record_id.clone(),
            payload,
        })
    }

    /// 应用提交结果；不属于本表单或表单已关闭时返回 false
    pub fn finish_submit(&mut self, form_id: u64, result: Result<DataItem, StoreError>) -> bool {
        if form_id != self.id || self.state != FormState::Submitting {
            debug!("form #{} 丢弃过期的提交结果 (#{})", self.id, form_id);
            return false;
        }
        match result {
            Ok(item) => {
                info!("form #{} saved {} {}", self.id, self.schema.entity, item.id);
                self.draft.clear();
                self.errors.clear();
                self.state = FormState::Done;
            }
            Err(e) => {
                warn!("form #{} submit failed: {}", self.id, e);
                self.submit_error = Some(e.to_string());
                self.state = FormState::Dirty;
            }
        }
        true
    }

    pub async fn submit(&mut self, store: &EntityStore) -> Result<DataItem, FormError> {
        let request = self.begin_submit()?;
        let result = request.execute(store).await;
        self.finish_submit(request.form_id, result.clone());
        result.map_err(FormError::from)
    }

    /// 丢弃草稿；调用方负责返回上一个视图
    pub fn cancel(&mut self) {
        debug!("form #{} cancelled", self.id);
        self.draft.clear();
        self.errors.clear();
        self.submit_error = None;
        self.state = FormState::Done;
    }
}

/// 数字输入：无法解析、空串、NaN 都记为 0
pub fn parse_number(raw: &str) -> Value {
    let n = raw.trim().parse::<f64>().unwrap_or(0.0);
    number_value(if n.is_finite() { n } else { 0.0 })
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or_else(|| Value::from(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{signed_in, FakeBackend};
    use serde_json::json;
    use std::sync::Arc;

    async fn store() -> (tempfile::TempDir, Arc<FakeBackend>, EntityStore) {
        let backend = Arc::new(
            FakeBackend::new()
                .with_records(
                    EntityType::Product,
                    vec![
                        json!({"id": "p1", "name": "Widget", "quantity": 3, "prix": 19.99, "active": "Yes"}),
                        json!({"id": "p3", "name": "Doohickey", "quantity": 8, "prix": 42, "active": "Yes"}),
                    ],
                )
                .with_records(
                    EntityType::Sales,
                    vec![json!({"id": "s1", "product": "p1", "prix_total": 19.99, "active": "Yes"})],
                ),
        );
        let (dir, auth) = signed_in(backend.clone()).await;
        let store = EntityStore::new(backend.clone(), auth);
        store.fetch(EntityType::Product).await.unwrap();
        store.fetch(EntityType::Sales).await.unwrap();
        (dir, backend, store)
    }

    #[tokio::test]
    async fn new_form_starts_from_hidden_defaults() {
        let form = FormController::new_create(EntityType::Product);
        assert_eq!(form.state(), FormState::Pristine);
        assert_eq!(form.value("status"), Some(&json!("draft")));
        assert_eq!(form.value("active"), Some(&json!("Yes")));
        assert_eq!(form.title(), "Create Product");
        assert_eq!(form.button_label(), "Create");
    }

    #[tokio::test]
    async fn selecting_a_product_fills_total_price() {
        let (_dir, _backend, store) = store().await;
        let mut form = FormController::new_create(EntityType::Sales);
        form.set_field("product", json!("p3"), &store).unwrap();
        assert_eq!(form.state(), FormState::Dirty);
        assert_eq!(form.value("prix_total"), Some(&json!(42)));
        assert!(form.error("prix_total").is_none());
    }

    #[tokio::test]
    async fn derived_field_is_read_only() {
        let (_dir, _backend, store) = store().await;
        let mut form = FormController::new_create(EntityType::Sales);
        let err = form.set_input("prix_total", "7", &store).unwrap_err();
        assert_eq!(err, FormError::ReadOnly("Total Price".into()));
    }

    #[tokio::test]
    async fn relation_options_cycle_through_products() {
        let (_dir, _backend, store) = store().await;
        let mut form = FormController::new_create(EntityType::Sales);
        form.cycle_option("product", true, &store).unwrap();
        assert_eq!(form.value("product"), Some(&json!("p1")));
        form.cycle_option("product", true, &store).unwrap();
        assert_eq!(form.value("product"), Some(&json!("p3")));
        form.cycle_option("product", true, &store).unwrap();
        assert_eq!(form.value("product"), Some(&json!("p1")));
        assert_eq!(form.value("prix_total"), Some(&json!(19.99)));
    }

    #[tokio::test]
    async fn number_inputs_fall_back_to_zero() {
        let (_dir, _backend, store) = store().await;
        let mut form = FormController::new_create(EntityType::Product);
        form.set_input("quantity", "12", &store).unwrap();
        assert_eq!(form.value("quantity"), Some(&json!(12)));
        form.set_input("quantity", "abc", &store).unwrap();
        assert_eq!(form.value("quantity"), Some(&json!(0)));
        form.set_input("prix", "3.5", &store).unwrap();
        assert_eq!(form.value("prix"), Some(&json!(3.5)));
    }

    #[tokio::test]
    async fn live_errors_follow_edits() {
        let (_dir, _backend, store) = store().await;
        let mut form = FormController::new_create(EntityType::Product);
        form.set_input("name", "W", &store).unwrap();
        assert_eq!(form.error("name"), Some("Name must be at least 2 characters"));
        form.set_input("name", "Widget", &store).unwrap();
        assert!(form.error("name").is_none());
    }

    #[tokio::test]
    async fn empty_required_name_blocks_submission() {
        let (_dir, backend, store) = store().await;
        let mut form = FormController::new_create(EntityType::Product);
        form.set_input("name", "", &store).unwrap();
        form.set_input("quantity", "1", &store).unwrap();
        form.set_input("prix", "2", &store).unwrap();

        let err = form.submit(&store).await.unwrap_err();
        match err {
            FormError::Invalid(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors.contains_key("name"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(form.state(), FormState::Dirty);
        assert_eq!(backend.count_calls("create").await, 0);
    }

    #[tokio::test]
    async fn create_submission_merges_hidden_defaults() {
        let (_dir, backend, store) = store().await;
        let mut form = FormController::new_create(EntityType::Product);
        form.set_input("name", "Sprocket", &store).unwrap();
        form.set_input("quantity", "4", &store).unwrap();
        form.set_input("prix", "9.5", &store).unwrap();

        let item = form.submit(&store).await.unwrap();
        assert_eq!(form.state(), FormState::Done);
        assert!(form.draft().is_empty());
        assert_eq!(item.get_str("status"), Some("draft"));
        assert_eq!(item.get_str("active"), Some("Yes"));
        assert!(store.find(EntityType::Product, &item.id).is_some());
        assert_eq!(backend.count_calls("create:product").await, 1);
    }

    #[tokio::test]
    async fn edit_reresolves_missing_derived_value() {
        let (_dir, _backend, store) = store().await;
        let record: DataItem = serde_json::from_value(json!({"id": "s9", "product": "p3"})).unwrap();
        let form = FormController::new_edit(EntityType::Sales, &record, &store);
        assert_eq!(form.value("prix_total"), Some(&json!(42)));
        assert_eq!(form.state(), FormState::Pristine);

        // 已有目标值时不重算
        let existing = store.find(EntityType::Sales, "s1").unwrap();
        let form = FormController::new_edit(EntityType::Sales, &existing, &store);
        assert_eq!(form.value("prix_total"), Some(&json!(19.99)));
        assert_eq!(form.title(), "Edit Sale");
        assert_eq!(form.button_label(), "Update");
    }

    #[tokio::test]
    async fn edit_submission_updates_in_place() {
        let (_dir, backend, store) = store().await;
        let record = store.find(EntityType::Product, "p1").unwrap();
        let mut form = FormController::new_edit(EntityType::Product, &record, &store);
        form.set_input("quantity", "10", &store).unwrap();
        form.submit(&store).await.unwrap();
        assert_eq!(
            store.find(EntityType::Product, "p1").unwrap().get("quantity"),
            Some(&json!(10))
        );
        assert_eq!(backend.count_calls("update:product:p1").await, 1);
    }

    #[tokio::test]
    async fn inputs_rejected_while_submitting_and_stale_results_dropped() {
        let (_dir, _backend, store) = store().await;
        let mut form = FormController::new_create(EntityType::Product);
        form.set_input("name", "Sprocket", &store).unwrap();
        form.set_input("quantity", "1", &store).unwrap();
        form.set_input("prix", "1", &store).unwrap();

        let request = form.begin_submit().unwrap();
        assert_eq!(form.state(), FormState::Submitting);
        assert_eq!(form.set_input("name", "x", &store), Err(FormError::Busy));

        let other = DataItem::new("zz", Map::new());
        assert!(!form.finish_submit(request.form_id + 1000, Ok(other)));
        assert_eq!(form.state(), FormState::Submitting);

        let failure = Err(StoreError::Api(crate::session::ApiError::Http {
            status: 500,
            message: "Failed to create item".into(),
        }));
        assert!(form.finish_submit(request.form_id, failure));
        assert_eq!(form.state(), FormState::Dirty);
        assert_eq!(form.submit_error(), Some("Failed to create item"));
    }

    #[test]
    fn cancel_discards_the_draft() {
        let mut form = FormController::new_create(EntityType::Product);
        form.cancel();
        assert!(form.draft().is_empty());
        assert_eq!(form.state(), FormState::Done);
        assert_eq!(form.begin_submit(), Err(FormError::Closed));
    }
}

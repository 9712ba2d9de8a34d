use crate::entity::{DataItem, EntityType};
use crate::schema::{display_value, generate_table_schema, resolve_relation_label, TableSchema};
use crate::store::{BulkReport, EntityStore, StoreError};
use crate::validation::is_falsy;
use log::info;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

pub const PAGE_SIZE: usize = 10;

/// 关联实体的记录，用于把外键解析成显示名
pub type RelatedRecords = HashMap<EntityType, Vec<DataItem>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Inactive => "inactive",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "all" => Some(StatusFilter::All),
            "active" => Some(StatusFilter::Active),
            "inactive" => Some(StatusFilter::Inactive),
            _ => None,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Active,
            StatusFilter::Active => StatusFilter::Inactive,
            StatusFilter::Inactive => StatusFilter::All,
        }
    }

    /// 没有 `active` 字段的记录总是通过
    pub fn matches(&self, item: &DataItem) -> bool {
        let Some(active) = item.get("active") else {
            return true;
        };
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => active.as_str() == Some("Yes"),
            StatusFilter::Inactive => active.as_str() == Some("No"),
        }
    }
}

/// 需要用户确认后才执行的操作
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Delete(String),
    BulkDelete(Vec<String>),
    BulkDeactivate(Vec<String>),
}

impl PendingAction {
    pub fn prompt(&self) -> String {
        match self {
            PendingAction::Delete(id) => format!("确认删除记录 {} ?", id),
            PendingAction::BulkDelete(ids) => format!("确认删除选中的 {} 条记录?", ids.len()),
            PendingAction::BulkDeactivate(ids) => format!("确认停用选中的 {} 条记录?", ids.len()),
        }
    }

    /// 单条删除后刷新；批量操作由 store 统一刷新
    pub async fn execute(
        &self,
        entity: EntityType,
        store: &EntityStore,
    ) -> Result<Option<BulkReport>, StoreError> {
        match self {
            PendingAction::Delete(id) => {
                store.delete(entity, id).await?;
                store.fetch(entity).await?;
                Ok(None)
            }
            PendingAction::BulkDelete(ids) => store.bulk_delete(entity, ids).await.map(Some),
            PendingAction::BulkDeactivate(ids) => {
                let mut items: Vec<(String, Map<String, Value>)> = Vec::new();
                let mut missing = Vec::new();
                for id in ids {
                    match store.find(entity, id) {
                        Some(item) => items.push((item.id.clone(), deactivate_payload(&item))),
                        None => missing.push((id.clone(), StoreError::NotFound(id.clone()).to_string())),
                    }
                }
                let mut report = store.bulk_update(entity, &items).await?;
                // 已不存在的记录也计入失败
                report.failed.extend(missing);
                Ok(Some(report))
            }
        }
    }
}

/// 切换启用状态：`active` Yes/No 互换，否则对 `status` 取反；两者都没有时返回 None
pub fn toggle_payload(item: &DataItem) -> Option<Map<String, Value>> {
    let mut payload = item.to_payload();
    if let Some(active) = item.get("active") {
        let next = if active.as_str() == Some("Yes") { "No" } else { "Yes" };
        payload.insert("active".to_string(), Value::from(next));
    } else if let Some(status) = item.get("status") {
        payload.insert("status".to_string(), Value::Bool(is_falsy(status)));
    } else {
        return None;
    }
    Some(payload)
}

pub fn deactivate_payload(item: &DataItem) -> Map<String, Value> {
    let mut payload = item.to_payload();
    if item.has("active") {
        payload.insert("active".to_string(), Value::from("No"));
    } else {
        payload.insert("status".to_string(), Value::Bool(false));
    }
    payload
}

/// 切换后刷新列表
pub async fn toggle(
    entity: EntityType,
    id: &str,
    store: &EntityStore,
) -> Result<Option<DataItem>, StoreError> {
    let item = store
        .find(entity, id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    let Some(payload) = toggle_payload(&item) else {
        return Ok(None);
    };
    let updated = store.update(entity, id, &payload).await?;
    store.fetch(entity).await?;
    Ok(Some(updated))
}

/// 列表页状态：搜索、状态过滤、分页、选择、待确认操作
#[derive(Debug, Clone)]
pub struct TableController {
    schema: TableSchema,
    search: String,
    status_filter: StatusFilter,
    page: usize,
    cursor: usize,
    selected: BTreeSet<String>,
    pending: Option<PendingAction>,
}

impl TableController {
    pub fn new(entity: EntityType) -> Self {
        Self {
            schema: generate_table_schema(entity),
            search: String::new(),
            status_filter: StatusFilter::All,
            page: 1,
            cursor: 0,
            selected: BTreeSet::new(),
            pending: None,
        }
    }

    pub fn entity(&self) -> EntityType {
        self.schema.entity
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn status_filter(&self) -> StatusFilter {
        self.status_filter
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_search(&mut self, term: &str) {
        if self.search != term {
            self.search = term.to_string();
            self.page = 1;
            self.cursor = 0;
        }
    }

    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        if self.status_filter != filter {
            self.status_filter = filter;
            self.page = 1;
            self.cursor = 0;
        }
    }

    pub fn cycle_status_filter(&mut self) {
        self.set_status_filter(self.status_filter.next());
    }

    /// 表格中关联字段需要的记录
    pub fn related_records(&self, store: &EntityStore) -> RelatedRecords {
        self.schema
            .columns
            .iter()
            .filter_map(|c| c.relation.map(|r| r.entity))
            .map(|entity| (entity, store.records(entity)))
            .collect()
    }

    /// 先搜索再按状态过滤
    pub fn filtered(&self, records: &[DataItem], related: &RelatedRecords) -> Vec<DataItem> {
        let term = self.search.trim().to_lowercase();
        records
            .iter()
            .filter(|item| term.is_empty() || self.matches_search(item, &term, related))
            .filter(|item| self.status_filter.matches(item))
            .cloned()
            .collect()
    }

    fn matches_search(&self, item: &DataItem, term: &str, related: &RelatedRecords) -> bool {
        self.schema
            .columns
            .iter()
            .filter(|c| c.filterable)
            .any(|column| {
                let Some(value) = item.get(column.key).filter(|v| !v.is_null()) else {
                    return false;
                };
                // 关联字段按解析后的显示名搜索
                if let Some(relation) = column.relation {
                    let rows = related.get(&relation.entity).map(|v| v.as_slice()).unwrap_or(&[]);
                    return resolve_relation_label(&relation, value, rows)
                        .map_or(false, |label| label.to_lowercase().contains(term));
                }
                display_value(value).to_lowercase().contains(term)
            })
    }

    pub fn page_count(total: usize) -> usize {
        total.div_ceil(PAGE_SIZE).max(1)
    }

    pub fn page_rows<'a>(&self, filtered: &'a [DataItem]) -> &'a [DataItem] {
        let start = (self.page - 1) * PAGE_SIZE;
        if start >= filtered.len() {
            return &[];
        }
        let end = (start + PAGE_SIZE).min(filtered.len());
        &filtered[start..end]
    }

    pub fn set_page(&mut self, page: usize, total: usize) {
        self.page = page.clamp(1, Self::page_count(total));
        self.cursor = 0;
    }

    pub fn next_page(&mut self, total: usize) {
        self.set_page(self.page + 1, total);
    }

    pub fn prev_page(&mut self, total: usize) {
        self.set_page(self.page.saturating_sub(1), total);
    }

    /// 数据变化后把页码收回到最后一个非空页，光标收回到页内
    pub fn clamp(&mut self, total: usize) {
        self.page = self.page.clamp(1, Self::page_count(total));
        let rows_on_page = total.saturating_sub((self.page - 1) * PAGE_SIZE).min(PAGE_SIZE);
        self.cursor = self.cursor.min(rows_on_page.saturating_sub(1));
    }

    pub fn move_cursor(&mut self, delta: isize, rows_on_page: usize) {
        if rows_on_page == 0 {
            self.cursor = 0;
            return;
        }
        let max = rows_on_page as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, max) as usize;
    }

    pub fn current<'a>(&self, page_rows: &'a [DataItem]) -> Option<&'a DataItem> {
        page_rows.get(self.cursor)
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn toggle_select(&mut self, id: &str) {
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
        }
    }

    /// 已全选当前页时清空，否则选中当前页全部
    pub fn select_all(&mut self, page_rows: &[DataItem]) {
        let page_ids: BTreeSet<String> = page_rows.iter().map(|r| r.id.clone()).collect();
        if !page_ids.is_empty() && self.selected == page_ids {
            self.selected.clear();
        } else {
            self.selected = page_ids;
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// 丢弃已不在记录中的选中 id
    pub fn retain_existing(&mut self, records: &[DataItem]) {
        let ids: BTreeSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        self.selected.retain(|id| ids.contains(id.as_str()));
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn request_delete(&mut self, id: &str) -> Option<&PendingAction> {
        self.pending = Some(PendingAction::Delete(id.to_string()));
        self.pending.as_ref()
    }

    /// 没有选中任何记录时不会进入确认
    pub fn request_bulk_delete(&mut self) -> Option<&PendingAction> {
        if self.selected.is_empty() {
            return None;
        }
        self.pending = Some(PendingAction::BulkDelete(self.selected_ids()));
        self.pending.as_ref()
    }

    pub fn request_bulk_deactivate(&mut self) -> Option<&PendingAction> {
        if self.selected.is_empty() {
            return None;
        }
        self.pending = Some(PendingAction::BulkDeactivate(self.selected_ids()));
        self.pending.as_ref()
    }

    /// 用户确认：取出待执行操作；单条删除移除该 id，批量操作清空选择
    pub fn confirm(&mut self) -> Option<PendingAction> {
        let action = self.pending.take()?;
        match &action {
            PendingAction::Delete(id) => {
                self.selected.remove(id);
            }
            _ => self.selected.clear(),
        }
        info!("{} 确认操作: {:?}", self.schema.entity, action);
        Some(action)
    }

    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }
}

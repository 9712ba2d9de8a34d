use crate::auth::AuthSession;
use crate::commands::{AppCommand, BackgroundTask, BulkKind, HELP_TEXT};
use crate::controller::{FormController, FormError, FormState, RelatedRecords, TableController};
use crate::entity::{DataItem, EntityType, FieldType};
use crate::schema::display_value;
use crate::session::User;
use crate::store::{BulkReport, EntityStore, StoreError};
use crossterm::event::KeyCode;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ViewMode {
    Login,
    Table(EntityType),
    Form,
    Profile,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum EditTarget {
    LoginEmail,
    LoginPassword,
    Search,
    FormField(usize),
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum InputMode {
    Normal,
    Command,
    Editing(EditTarget),
}

#[derive(PartialEq, Debug, Clone)]
pub enum FocusArea {
    Menu,     // 焦点在左侧菜单
    MainView, // 焦点在主视图
}

pub const MENU_ITEMS: [&str; 4] = ["Products", "Sales", "Profile", "Logout"];

#[derive(Debug)]
pub enum AppEvent {
    Log(String),
    Message(String),
    Error(String),
    LoggedIn(User),
    LoginFailed(String),
    LoggedOut,
    /// 认证失效，回到登录页
    AuthExpired(String),
    Loaded(EntityType),
    FormSubmitted {
        form_id: u64,
        result: Result<DataItem, StoreError>,
    },
    ActionDone {
        entity: EntityType,
        report: Option<BulkReport>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// 0 邮箱，1 密码，2 登录按钮
    pub selected: usize,
    pub error: Option<String>,
    pub pending: bool,
}

pub struct App {
    pub view_mode: ViewMode,
    pub view_history: Vec<ViewMode>,
    pub input_mode: InputMode,
    pub focus_area: FocusArea,
    pub menu_selected_index: usize,
    pub login: LoginForm,
    pub user: Option<User>,
    pub tables: HashMap<EntityType, TableController>,
    pub form: Option<FormController>,
    pub form_cursor: usize,
    pub edit_buffer: String,
    pub command_input: String,
    pub command_cursor: usize,
    pub command_history: Vec<String>,
    pub command_history_index: Option<usize>,
    pub log_messages: Vec<String>,
    pub auth: Arc<AuthSession>,
    pub store: Arc<EntityStore>,
    pub cmd_tx: mpsc::UnboundedSender<BackgroundTask>,
    pub evt_rx: Option<mpsc::UnboundedReceiver<AppEvent>>,
}

impl App {
    pub fn new(
        session_info: Vec<String>,
        login_email: Option<String>,
        auth: Arc<AuthSession>,
        store: Arc<EntityStore>,
        cmd_tx: mpsc::UnboundedSender<BackgroundTask>,
        evt_rx: mpsc::UnboundedReceiver<AppEvent>,
    ) -> App {
        let mut log_messages = vec!["应用已启动".to_string()];
        log_messages.extend(session_info);

        let mut app = App {
            view_mode: ViewMode::Login,
            view_history: Vec::new(),
            input_mode: InputMode::Normal,
            focus_area: FocusArea::MainView,
            menu_selected_index: 0,
            login: LoginForm {
                email: login_email.unwrap_or_default(),
                ..LoginForm::default()
            },
            user: None,
            tables: EntityType::ALL
                .iter()
                .map(|e| (*e, TableController::new(*e)))
                .collect(),
            form: None,
            form_cursor: 0,
            edit_buffer: String::new(),
            command_input: String::new(),
            command_cursor: 0,
            command_history: Vec::new(),
            command_history_index: None,
            log_messages,
            auth,
            store,
            cmd_tx,
            evt_rx: Some(evt_rx),
        };

        // 本地已有 token：直接进入列表，同时后台确认用户身份
        if app.auth.is_authenticated() {
            app.log_messages.push("✓ 已读取本地 token".to_string());
            app.send(BackgroundTask::Restore);
            app.open_table(EntityType::Product);
        }
        app
    }

    pub fn add_log(&mut self, msg: String) {
        self.log_messages.push(msg);
    }

    fn send(&self, task: BackgroundTask) {
        let _ = self.cmd_tx.send(task);
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub fn table_mut(&mut self, entity: EntityType) -> &mut TableController {
        self.tables
            .entry(entity)
            .or_insert_with(|| TableController::new(entity))
    }

    /// 当前列表经过搜索/过滤后的记录，以及解析外键用的关联记录
    pub fn visible_rows(&mut self, entity: EntityType) -> (Vec<DataItem>, RelatedRecords) {
        let store = self.store.clone();
        let records = store.records(entity);
        let table = self.table_mut(entity);
        let related = table.related_records(&store);
        (table.filtered(&records, &related), related)
    }

    fn current_page_rows(&mut self, entity: EntityType) -> Vec<DataItem> {
        let (rows, _) = self.visible_rows(entity);
        self.table_mut(entity).page_rows(&rows).to_vec()
    }

    fn current_row(&mut self, entity: EntityType) -> Option<DataItem> {
        let rows = self.current_page_rows(entity);
        self.table_mut(entity).current(&rows).cloned()
    }

    /// 当前操作的实体：列表页或表单所属实体
    pub fn active_entity(&self) -> Option<EntityType> {
        match self.view_mode {
            ViewMode::Table(e) => Some(e),
            ViewMode::Form => self.form.as_ref().map(|f| f.entity()),
            _ => None,
        }
    }

    fn navigate(&mut self, view: ViewMode) {
        if self.view_mode != view {
            if self.view_mode != ViewMode::Login {
                self.view_history.push(self.view_mode);
            }
            self.view_mode = view;
        }
        self.menu_selected_index = match view {
            ViewMode::Table(EntityType::Product) => 0,
            ViewMode::Table(EntityType::Sales) => 1,
            ViewMode::Profile => 2,
            _ => self.menu_selected_index,
        };
    }

    /// 返回上一个视图
    pub fn back(&mut self) {
        let previous = self
            .view_history
            .pop()
            .unwrap_or(ViewMode::Table(EntityType::Product));
        self.view_mode = previous;
        if let ViewMode::Table(e) = previous {
            self.clamp_table(e);
        }
    }

    fn require_auth(&mut self) -> bool {
        if self.is_authenticated() {
            true
        } else {
            self.add_log("⚠ 请先登录".to_string());
            false
        }
    }

    pub fn open_table(&mut self, entity: EntityType) {
        if !self.require_auth() {
            return;
        }
        self.navigate(ViewMode::Table(entity));
        self.focus_area = FocusArea::MainView;
        self.send(BackgroundTask::Load(entity));
    }

    pub fn open_form(&mut self, entity: EntityType, record: Option<&DataItem>) {
        if !self.require_auth() {
            return;
        }
        let form = match record {
            Some(item) => FormController::new_edit(entity, item, &self.store),
            None => FormController::new_create(entity),
        };
        self.add_log(form.title().to_string());
        self.form = Some(form);
        self.form_cursor = 0;
        self.navigate(ViewMode::Form);
        self.focus_area = FocusArea::MainView;
        self.send(BackgroundTask::Load(entity));
    }

    pub fn open_profile(&mut self) {
        if self.require_auth() {
            self.navigate(ViewMode::Profile);
            self.focus_area = FocusArea::MainView;
        }
    }

    /// 数据变化后：页码收敛到最后一个非空页，选择只保留仍存在的记录
    fn clamp_table(&mut self, entity: EntityType) {
        let (rows, _) = self.visible_rows(entity);
        let records = self.store.records(entity);
        let table = self.table_mut(entity);
        table.clamp(rows.len());
        table.retain_existing(&records);
    }

    /// 登出或认证失效：清空会话相关的界面状态
    fn reset_to_login(&mut self, error: Option<String>) {
        self.user = None;
        self.form = None;
        self.tables = EntityType::ALL
            .iter()
            .map(|e| (*e, TableController::new(*e)))
            .collect();
        self.view_history.clear();
        self.view_mode = ViewMode::Login;
        self.input_mode = InputMode::Normal;
        self.focus_area = FocusArea::MainView;
        self.login.pending = false;
        self.login.password.clear();
        self.login.error = error;
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Log(msg) | AppEvent::Message(msg) | AppEvent::Error(msg) => {
                self.log_messages.push(msg)
            }
            AppEvent::LoggedIn(user) => {
                self.user = Some(user);
                self.login.pending = false;
                self.login.error = None;
                self.login.password.clear();
                if self.view_mode == ViewMode::Login {
                    self.open_table(EntityType::Product);
                }
            }
            AppEvent::LoginFailed(msg) => {
                self.login.pending = false;
                self.login.error = Some(msg);
            }
            AppEvent::LoggedOut => {
                self.add_log("✓ 已登出".to_string());
                self.reset_to_login(None);
            }
            AppEvent::AuthExpired(msg) => {
                self.add_log(format!("✗ 认证失效，请重新登录: {}", msg));
                self.reset_to_login(Some(msg));
            }
            AppEvent::Loaded(entity) => self.clamp_table(entity),
            AppEvent::FormSubmitted { form_id, result } => {
                let Some(form) = self.form.as_mut() else {
                    return;
                };
                if !form.finish_submit(form_id, result) {
                    return;
                }
                match form.state() {
                    FormState::Done => {
                        self.add_log("✓ 保存成功".to_string());
                        self.form = None;
                        self.back();
                    }
                    _ => {
                        let msg = form.submit_error().unwrap_or("Failed to save data").to_string();
                        self.add_log(format!("✗ 保存失败: {}", msg));
                    }
                }
            }
            AppEvent::ActionDone { entity, report } => {
                let msg = match report {
                    None => "✓ 已删除".to_string(),
                    Some(r) if r.is_complete() => format!("✓ 批量操作完成: {}", r.summary()),
                    Some(r) => format!("⚠ 批量操作部分失败: {}", r.summary()),
                };
                self.add_log(msg);
                self.clamp_table(entity);
            }
        }
    }

    fn submit_login(&mut self) {
        let email = self.login.email.trim().to_string();
        if email.is_empty() || self.login.password.is_empty() {
            self.login.error = Some("请输入邮箱和密码".to_string());
            return;
        }
        self.login.pending = true;
        self.login.error = None;
        self.send(BackgroundTask::Login {
            email,
            password: self.login.password.clone(),
        });
    }

    fn submit_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        match form.begin_submit() {
            Ok(request) => {
                self.add_log("正在提交...".to_string());
                self.send(BackgroundTask::Submit(request));
            }
            Err(FormError::Invalid(errors)) => {
                let fields: Vec<String> = errors.keys().cloned().collect();
                self.add_log(format!("✗ Please fix the form errors: {}", fields.join(", ")));
            }
            Err(e) => self.add_log(format!("⚠ {}", e)),
        }
    }

    fn cancel_form(&mut self) {
        if let Some(form) = self.form.as_mut() {
            form.cancel();
        }
        self.form = None;
        self.back();
    }

    /// 执行命令行命令，返回 true 表示退出
    pub fn dispatch(&mut self, cmd: AppCommand) -> bool {
        match cmd {
            AppCommand::Login { email, password } => {
                self.login.email = email;
                self.login.password = password;
                self.submit_login();
            }
            AppCommand::Logout => self.send(BackgroundTask::Logout),
            AppCommand::Open(entity) => self.open_table(entity),
            AppCommand::Profile => self.open_profile(),
            AppCommand::Help => self.add_log(HELP_TEXT.to_string()),
            AppCommand::Quit => return true,
            AppCommand::Unknown(msg) => self.add_log(format!("✗ {}", msg)),
            other => {
                let Some(entity) = self.active_entity() else {
                    self.add_log("⚠ 请先打开一个列表 (open product|sales)".to_string());
                    return false;
                };
                self.dispatch_table(entity, other);
            }
        }
        false
    }

    fn dispatch_table(&mut self, entity: EntityType, cmd: AppCommand) {
        match cmd {
            AppCommand::New => self.open_form(entity, None),
            AppCommand::Edit(id) => match self.store.find(entity, &id) {
                Some(item) => self.open_form(entity, Some(&item)),
                None => self.add_log(format!("✗ 未找到记录: {}", id)),
            },
            AppCommand::Delete(id) => {
                self.table_mut(entity).request_delete(&id);
            }
            AppCommand::Toggle(id) => self.send(BackgroundTask::Toggle { entity, id }),
            AppCommand::Search(term) => self.table_mut(entity).set_search(&term),
            AppCommand::Filter(filter) => self.table_mut(entity).set_status_filter(filter),
            AppCommand::Page(n) => {
                let (rows, _) = self.visible_rows(entity);
                self.table_mut(entity).set_page(n, rows.len());
            }
            AppCommand::Refresh => self.send(BackgroundTask::Refresh(entity)),
            AppCommand::Bulk(kind) => {
                let table = self.table_mut(entity);
                let requested = match kind {
                    BulkKind::Delete => table.request_bulk_delete().is_some(),
                    BulkKind::Deactivate => table.request_bulk_deactivate().is_some(),
                };
                if !requested {
                    self.add_log("⚠ 未选择任何记录".to_string());
                }
            }
            _ => {}
        }
    }

    /// 获取当前的预测建议
    pub fn get_completion_hint(&self) -> Option<String> {
        let commands = [
            "login", "logout", "open", "profile", "new", "edit", "delete", "toggle", "search",
            "filter", "page", "refresh", "bulk", "help", "quit",
        ];
        let input = self.command_input.trim_start();
        if input.is_empty() {
            return None;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let complete = |subs: &[&str], cur: &str| {
            subs.iter()
                .find(|s| s.starts_with(cur) && **s != cur)
                .map(|s| s[cur.len()..].to_string())
        };
        let typing_second = parts.len() == 2 || (parts.len() == 1 && input.ends_with(' '));
        if parts.len() == 1 && !typing_second {
            return complete(&commands[..], parts[0]);
        }
        if typing_second {
            let cur = parts.get(1).copied().unwrap_or("");
            return match parts[0] {
                "open" => complete(&["product", "sales"], cur),
                "filter" => complete(&["all", "active", "inactive"], cur),
                "bulk" => complete(&["delete", "deactivate"], cur),
                _ => None,
            };
        }
        None
    }

    pub fn handle_key_event(&mut self, key: KeyCode) -> bool {
        match self.input_mode {
            InputMode::Command => return self.handle_command_key(key),
            InputMode::Editing(target) => {
                self.handle_edit_key(target, key);
                return false;
            }
            InputMode::Normal => {}
        }

        // 待确认操作优先
        if let Some(entity) = self.active_entity() {
            if self.table_mut(entity).pending().is_some() {
                match key {
                    KeyCode::Char('y') | KeyCode::Char('Y') => {
                        if let Some(action) = self.table_mut(entity).confirm() {
                            self.send(BackgroundTask::Execute { entity, action });
                        }
                    }
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                        self.table_mut(entity).cancel_pending();
                        self.add_log("已取消".to_string());
                    }
                    _ => {}
                }
                return false;
            }
        }

        match key {
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Command;
                self.command_input.clear();
                self.command_cursor = 0;
                return false;
            }
            KeyCode::Char('q') if self.view_mode != ViewMode::Login => return true,
            KeyCode::Tab if self.is_authenticated() => {
                self.focus_area = match self.focus_area {
                    FocusArea::Menu => FocusArea::MainView,
                    FocusArea::MainView => FocusArea::Menu,
                };
                return false;
            }
            _ => {}
        }

        if self.focus_area == FocusArea::Menu && self.is_authenticated() {
            self.handle_menu_key(key);
            return false;
        }

        match self.view_mode {
            ViewMode::Login => self.handle_login_key(key),
            ViewMode::Table(entity) => self.handle_table_key(entity, key),
            ViewMode::Form => self.handle_form_key(key),
            ViewMode::Profile => match key {
                KeyCode::Left => self.focus_area = FocusArea::Menu,
                KeyCode::Esc => self.back(),
                _ => {}
            },
        }
        false
    }

    fn handle_menu_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Up => {
                self.menu_selected_index = self.menu_selected_index.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.menu_selected_index < MENU_ITEMS.len() - 1 {
                    self.menu_selected_index += 1;
                }
            }
            KeyCode::Right => self.focus_area = FocusArea::MainView,
            KeyCode::Enter | KeyCode::Char('c') => match self.menu_selected_index {
                0 => self.open_table(EntityType::Product),
                1 => self.open_table(EntityType::Sales),
                2 => self.open_profile(),
                3 => self.send(BackgroundTask::Logout),
                _ => {}
            },
            _ => {}
        }
    }

    fn handle_login_key(&mut self, key: KeyCode) {
        if self.login.pending {
            return;
        }
        match key {
            KeyCode::Up => self.login.selected = self.login.selected.saturating_sub(1),
            KeyCode::Down => self.login.selected = (self.login.selected + 1).min(2),
            KeyCode::Enter => match self.login.selected {
                0 => {
                    self.edit_buffer = self.login.email.clone();
                    self.input_mode = InputMode::Editing(EditTarget::LoginEmail);
                }
                1 => {
                    self.edit_buffer = self.login.password.clone();
                    self.input_mode = InputMode::Editing(EditTarget::LoginPassword);
                }
                _ => self.submit_login(),
            },
            _ => {}
        }
    }

    fn handle_table_key(&mut self, entity: EntityType, key: KeyCode) {
        match key {
            KeyCode::Left => self.focus_area = FocusArea::Menu,
            KeyCode::Up | KeyCode::Down => {
                let rows = self.current_page_rows(entity).len();
                let delta = if key == KeyCode::Up { -1 } else { 1 };
                self.table_mut(entity).move_cursor(delta, rows);
            }
            KeyCode::Char(' ') => {
                if let Some(item) = self.current_row(entity) {
                    self.table_mut(entity).toggle_select(&item.id);
                }
            }
            KeyCode::Char('a') => {
                let rows = self.current_page_rows(entity);
                self.table_mut(entity).select_all(&rows);
            }
            KeyCode::Char('t') => {
                if let Some(item) = self.current_row(entity) {
                    self.send(BackgroundTask::Toggle { entity, id: item.id });
                }
            }
            KeyCode::Char('d') => {
                if let Some(item) = self.current_row(entity) {
                    self.table_mut(entity).request_delete(&item.id);
                }
            }
            KeyCode::Char('D') => self.dispatch_table(entity, AppCommand::Bulk(BulkKind::Delete)),
            KeyCode::Char('x') => {
                self.dispatch_table(entity, AppCommand::Bulk(BulkKind::Deactivate))
            }
            KeyCode::Char('n') => self.open_form(entity, None),
            KeyCode::Enter | KeyCode::Char('e') => {
                if let Some(item) = self.current_row(entity) {
                    self.open_form(entity, Some(&item));
                }
            }
            KeyCode::Char('f') => self.table_mut(entity).cycle_status_filter(),
            KeyCode::Char('s') => {
                self.edit_buffer = self.table_mut(entity).search().to_string();
                self.input_mode = InputMode::Editing(EditTarget::Search);
            }
            KeyCode::PageDown | KeyCode::PageUp => {
                let (rows, _) = self.visible_rows(entity);
                let table = self.table_mut(entity);
                if key == KeyCode::PageDown {
                    table.next_page(rows.len());
                } else {
                    table.prev_page(rows.len());
                }
            }
            KeyCode::Char('r') => self.send(BackgroundTask::Refresh(entity)),
            KeyCode::Esc => self.table_mut(entity).clear_selection(),
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyCode) {
        if key == KeyCode::Esc {
            self.cancel_form();
            return;
        }
        let store = self.store.clone();
        let Some(form) = self.form.as_mut() else {
            return;
        };
        if form.state() == FormState::Submitting {
            return;
        }
        let field_count = form.fields().len();
        let field = form.fields().get(self.form_cursor).cloned();
        let result = match key {
            KeyCode::Up => {
                self.form_cursor = self.form_cursor.saturating_sub(1);
                Ok(())
            }
            KeyCode::Down => {
                self.form_cursor = (self.form_cursor + 1).min(field_count);
                Ok(())
            }
            KeyCode::Left | KeyCode::Right => match field {
                Some(f) if f.field_type == FieldType::Enum => {
                    form.cycle_option(f.name, key == KeyCode::Right, &store)
                }
                _ => Ok(()),
            },
            KeyCode::Enter => match field {
                None => {
                    self.submit_form();
                    Ok(())
                }
                Some(f) if f.field_type == FieldType::Enum => form.cycle_option(f.name, true, &store),
                Some(f) if f.read_only => Err(FormError::ReadOnly(f.label.to_string())),
                Some(f) => {
                    self.edit_buffer = form.value(f.name).map(display_value).unwrap_or_default();
                    self.input_mode = InputMode::Editing(EditTarget::FormField(self.form_cursor));
                    Ok(())
                }
            },
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.add_log(format!("⚠ {}", e));
        }
    }

    fn handle_edit_key(&mut self, target: EditTarget, key: KeyCode) {
        match key {
            KeyCode::Char(c) => self.edit_buffer.push(c),
            KeyCode::Backspace => {
                self.edit_buffer.pop();
            }
            KeyCode::Esc => {
                self.edit_buffer.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                let value = std::mem::take(&mut self.edit_buffer);
                self.input_mode = InputMode::Normal;
                self.commit_edit(target, value);
            }
            _ => {}
        }
    }

    fn commit_edit(&mut self, target: EditTarget, value: String) {
        match target {
            EditTarget::LoginEmail => {
                self.login.email = value;
                self.login.selected = 1;
            }
            EditTarget::LoginPassword => {
                self.login.password = value;
                self.login.selected = 2;
            }
            EditTarget::Search => {
                if let ViewMode::Table(entity) = self.view_mode {
                    self.table_mut(entity).set_search(value.trim());
                }
            }
            EditTarget::FormField(index) => {
                let store = self.store.clone();
                let Some(form) = self.form.as_mut() else {
                    return;
                };
                let Some(name) = form.fields().get(index).map(|f| f.name) else {
                    return;
                };
                if let Err(e) = form.set_input(name, &value, &store) {
                    self.add_log(format!("⚠ {}", e));
                }
            }
        }
    }

    fn handle_command_key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Enter => {
                let cmd_owned = self.command_input.trim().to_string();
                self.command_input.clear();
                self.command_cursor = 0;
                self.input_mode = InputMode::Normal;
                if cmd_owned.is_empty() {
                    return false;
                }
                let app_cmd = AppCommand::from_str(&cmd_owned)
                    .unwrap_or_else(|_| AppCommand::Unknown(cmd_owned.clone()));
                // 历史里不保存密码
                let recorded = if cmd_owned.starts_with("login ") {
                    "login ***".to_string()
                } else {
                    cmd_owned
                };
                self.command_history.push(recorded);
                self.command_history_index = None;
                self.dispatch(app_cmd)
            }
            KeyCode::Esc => {
                self.command_input.clear();
                self.command_cursor = 0;
                self.input_mode = InputMode::Normal;
                false
            }
            KeyCode::Tab => {
                if let Some(hint) = self.get_completion_hint() {
                    let insert = format!("{} ", hint);
                    self.command_input.insert_str(self.command_cursor, &insert);
                    self.command_cursor += insert.len();
                }
                false
            }
            KeyCode::Up => {
                if self.command_history.is_empty() {
                    return false;
                }
                let next = match self.command_history_index {
                    None => self.command_history.len().saturating_sub(1),
                    Some(i) => i.saturating_sub(1),
                };
                self.command_history_index = Some(next);
                if let Some(cmd) = self.command_history.get(next) {
                    self.command_input = cmd.clone();
                    self.command_cursor = self.command_input.len();
                }
                false
            }
            KeyCode::Down => {
                let Some(i) = self.command_history_index else {
                    return false;
                };
                let n = i + 1;
                if n >= self.command_history.len() {
                    self.command_history_index = None;
                    self.command_input.clear();
                    self.command_cursor = 0;
                    return false;
                }
                self.command_history_index = Some(n);
                if let Some(cmd) = self.command_history.get(n) {
                    self.command_input = cmd.clone();
                    self.command_cursor = self.command_input.len();
                }
                false
            }
            KeyCode::Backspace => {
                if self.command_cursor > 0 {
                    let idx = self.prev_boundary(self.command_cursor);
                    self.command_input.remove(idx);
                    self.command_cursor = idx;
                }
                false
            }
            KeyCode::Delete => {
                if self.command_cursor < self.command_input.len() {
                    self.command_input.remove(self.command_cursor);
                }
                false
            }
            KeyCode::Left => {
                if self.command_cursor > 0 {
                    self.command_cursor = self.prev_boundary(self.command_cursor);
                }
                false
            }
            KeyCode::Right => {
                if let Some(c) = self.command_input[self.command_cursor..].chars().next() {
                    self.command_cursor += c.len_utf8();
                }
                false
            }
            KeyCode::Home => {
                self.command_cursor = 0;
                false
            }
            KeyCode::End => {
                self.command_cursor = self.command_input.len();
                false
            }
            KeyCode::Char(c) => {
                self.command_input.insert(self.command_cursor, c);
                self.command_cursor += c.len_utf8();
                false
            }
            _ => false,
        }
    }

    fn prev_boundary(&self, idx: usize) -> usize {
        self.command_input[..idx]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

use crate::app_state::{App, EditTarget, FocusArea, InputMode, ViewMode, MENU_ITEMS};
use crate::controller::{FormState, TableController};
use crate::entity::{EntityType, FieldType};
use crate::schema::display_value;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};

pub fn draw(f: &mut Frame, app: &mut App) {
    // 创建布局
    let chunks = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Length(3), // 顶部标题栏
            Constraint::Min(0),    // 中间内容区域
            Constraint::Min(8),    // 底部命令/日志区域
        ])
        .split(f.size());

    render_top_bar(f, chunks[0], app);

    // 中间内容区域（左侧菜单 + 主视图）
    let middle_chunks = Layout::default()
        .direction(ratatui::layout::Direction::Horizontal)
        .constraints([Constraint::Length(20), Constraint::Min(0)])
        .split(chunks[1]);

    render_left_menu(f, middle_chunks[0], app);
    render_main_view(f, middle_chunks[1], app);
    render_bottom_bar(f, chunks[2], app);
}

fn main_block(title: String, app: &App) -> Block<'static> {
    Block::default().borders(Borders::ALL).title(title).style(
        if app.focus_area == FocusArea::MainView {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        },
    )
}

fn render_top_bar(f: &mut Frame, area: Rect, app: &App) {
    let title = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Cyan));

    let who = match app.user.clone().or_else(|| app.auth.user()) {
        Some(user) => format!(" - {}", user.display_name()),
        None if app.is_authenticated() => " - 已登录".to_string(),
        None => " - 未登录".to_string(),
    };
    let title_text = Line::from(vec![
        Span::styled(
            " Admin 管理后台 ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(who),
    ]);

    let paragraph = Paragraph::new(title_text)
        .block(title)
        .alignment(ratatui::layout::Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_left_menu(f: &mut Frame, area: Rect, app: &App) {
    let authenticated = app.is_authenticated();
    let menu_items: Vec<ListItem> = MENU_ITEMS
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let is_selected = i == app.menu_selected_index;
            let is_active = match (i, &app.view_mode) {
                (0, ViewMode::Table(EntityType::Product)) => true,
                (1, ViewMode::Table(EntityType::Sales)) => true,
                (2, ViewMode::Profile) => true,
                _ => false,
            };

            let style = if !authenticated {
                Style::default().fg(Color::DarkGray)
            } else if is_selected {
                if app.focus_area == FocusArea::Menu {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Magenta)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD)
                }
            } else if is_active {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };

            let prefix = if is_active { "● " } else { "○ " };
            ListItem::new(format!("{}{}", prefix, text)).style(style)
        })
        .collect();

    let title = if app.focus_area == FocusArea::Menu {
        "菜单 (Enter 确认)"
    } else {
        "菜单 (Tab 切换)"
    };

    let menu =
        List::new(menu_items).block(Block::default().borders(Borders::ALL).title(title).style(
            if app.focus_area == FocusArea::Menu {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            },
        ));

    f.render_widget(menu, area);
}

fn render_main_view(f: &mut Frame, area: Rect, app: &mut App) {
    match app.view_mode {
        ViewMode::Login => render_login(f, area, app),
        ViewMode::Table(entity) => render_table(f, area, app, entity),
        ViewMode::Form => render_form(f, area, app),
        ViewMode::Profile => render_profile(f, area, app),
    }
}

/// 正在编辑的输入框显示编辑缓冲区
fn field_text(app: &App, target: EditTarget, value: String) -> Span<'static> {
    if app.input_mode == InputMode::Editing(target) {
        Span::styled(
            format!("{}_", app.edit_buffer),
            Style::default().fg(Color::Yellow),
        )
    } else {
        Span::raw(value)
    }
}

fn selected_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    }
}

fn render_login(f: &mut Frame, area: Rect, app: &App) {
    let login = &app.login;
    let masked = "*".repeat(login.password.chars().count());
    let password = if app.input_mode == InputMode::Editing(EditTarget::LoginPassword) {
        Span::styled(
            format!("{}_", "*".repeat(app.edit_buffer.chars().count())),
            Style::default().fg(Color::Yellow),
        )
    } else {
        Span::raw(masked)
    };

    let mut lines = vec![
        Line::from(vec![Span::styled(
            "--- 登录 ---",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from(vec![
            Span::styled("邮箱: ", selected_style(login.selected == 0)),
            field_text(app, EditTarget::LoginEmail, login.email.clone()),
        ]),
        Line::from(vec![
            Span::styled("密码: ", selected_style(login.selected == 1)),
            password,
        ]),
        Line::from(""),
        Line::from(vec![Span::styled(
            if login.pending { "[ 登录中... ]" } else { "[ 登录 ]" },
            selected_style(login.selected == 2),
        )]),
    ];
    if let Some(ref error) = login.error {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![Span::styled(
            format!("✗ {}", error),
            Style::default().fg(Color::Red),
        )]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![Span::styled(
        "提示: ↑↓ 选择, Enter 编辑/登录, 或 /login <email> <password>",
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::ITALIC),
    )]));

    let paragraph = Paragraph::new(lines).block(main_block("登录".to_string(), app));
    f.render_widget(paragraph, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App, entity: EntityType) {
    let (filtered, related) = app.visible_rows(entity);
    let state = app.store.snapshot(entity);
    let editing_search = app.input_mode == InputMode::Editing(EditTarget::Search);
    let edit_buffer = app.edit_buffer.clone();
    let table = app.table_mut(entity).clone();
    let page_rows = table.page_rows(&filtered);
    let schema = table.schema();

    let title = if app.focus_area == FocusArea::MainView {
        format!(
            "{} (n 新建, Enter 编辑, t 切换, d 删除, Space 选择, D/x 批量, f 筛选, r 刷新)",
            schema.title
        )
    } else {
        schema.title.to_string()
    };
    f.render_widget(main_block(title, app), area);

    let chunks = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(area.inner(ratatui::layout::Margin {
            horizontal: 1,
            vertical: 1,
        }));

    let search = if editing_search {
        Span::styled(format!("{}_", edit_buffer), Style::default().fg(Color::Yellow))
    } else if table.search().is_empty() {
        Span::styled("(s 搜索)", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(format!("\"{}\"", table.search()))
    };
    let mut info = vec![
        Span::styled("搜索: ", Style::default().add_modifier(Modifier::BOLD)),
        search,
        Span::raw("  "),
        Span::styled("状态: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(table.status_filter().as_str()),
    ];
    let selected = table.selected_ids().len();
    if selected > 0 {
        info.push(Span::styled(
            format!("  已选 {} 条", selected),
            Style::default().fg(Color::Magenta),
        ));
    }
    if state.loading {
        info.push(Span::styled("  加载中...", Style::default().fg(Color::Cyan)));
    }
    f.render_widget(Paragraph::new(Line::from(info)), chunks[0]);

    let header = Row::new(
        std::iter::once(Cell::from(" "))
            .chain(schema.columns.iter().map(|c| Cell::from(c.label)))
            .collect::<Vec<_>>(),
    )
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = page_rows
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let marker = if table.is_selected(&item.id) { "[x]" } else { "[ ]" };
            let cells = std::iter::once(Cell::from(marker)).chain(schema.columns.iter().map(|c| {
                let targets = c
                    .relation
                    .and_then(|r| related.get(&r.entity))
                    .map(|v| v.as_slice())
                    .unwrap_or(&[]);
                let text = c.display(item, targets);
                let style = match text.as_str() {
                    "Yes" if c.key == "active" => Style::default().fg(Color::Green),
                    "No" if c.key == "active" => Style::default().fg(Color::Red),
                    _ => Style::default(),
                };
                Cell::from(text).style(style)
            }));
            Row::new(cells.collect::<Vec<_>>()).style(selected_style(
                i == table.cursor() && app.focus_area == FocusArea::MainView,
            ))
        })
        .collect();

    let mut widths = vec![Constraint::Length(4)];
    widths.extend(schema.columns.iter().map(|_| Constraint::Min(8)));

    if rows.is_empty() {
        let empty = match state.error {
            Some(ref e) if !state.initialized || state.records.is_empty() => {
                Line::from(Span::styled(format!("✗ {}", e), Style::default().fg(Color::Red)))
            }
            _ if !state.initialized => Line::from("正在加载..."),
            _ => Line::from("暂无数据"),
        };
        f.render_widget(Paragraph::new(vec![Line::from(""), empty]), chunks[1]);
    } else {
        f.render_widget(Table::new(rows, widths).header(header), chunks[1]);
    }

    let total = filtered.len();
    let footer = format!(
        "第 {}/{} 页  共 {} 条  (PgUp/PgDn 翻页)",
        table.page(),
        TableController::page_count(total),
        total
    );
    f.render_widget(
        Paragraph::new(footer).style(Style::default().fg(Color::Gray)),
        chunks[2],
    );


    if let Some(action) = table.pending() {
        render_confirm(f, area, &action.prompt());
    }
}

fn render_confirm(f: &mut Frame, area: Rect, prompt: &str) {
    let width = area.width.min(60);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + area.height / 3,
        width,
        height: 5.min(area.height),
    };
    let lines = vec![
        Line::from(prompt.to_string()),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" 确认   "),
            Span::styled("n/Esc", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw(" 取消"),
        ]),
    ];
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .title("确认")
                .style(Style::default().fg(Color::Yellow)),
        ),
        popup,
    );
}

fn render_form(f: &mut Frame, area: Rect, app: &App) {
    let Some(form) = app.form.as_ref() else {
        f.render_widget(
            Paragraph::new("没有打开的表单").block(main_block("表单".to_string(), app)),
            area,
        );
        return;
    };

    let mut lines = Vec::new();
    for (i, field) in form.fields().iter().enumerate() {
        let is_cursor = i == app.form_cursor;
        let value = match (field.field_type, form.value(field.name)) {
            (FieldType::Enum, Some(v)) => form
                .options(field, &app.store)
                .into_iter()
                .find(|(o, _)| o == v)
                .map(|(_, label)| label)
                .unwrap_or_else(|| display_value(v)),
            (_, Some(v)) => display_value(v),
            (_, None) => String::new(),
        };
        let value = if value.is_empty() && app.input_mode != InputMode::Editing(EditTarget::FormField(i)) {
            Span::styled(field.placeholder.to_string(), Style::default().fg(Color::DarkGray))
        } else {
            field_text(app, EditTarget::FormField(i), value)
        };

        let mut spans = vec![
            Span::styled(format!("{:<16}", field.label), selected_style(is_cursor)),
            Span::raw(" "),
        ];
        if field.field_type == FieldType::Enum {
            spans.push(Span::styled("◀ ", Style::default().fg(Color::DarkGray)));
            spans.push(value);
            spans.push(Span::styled(" ▶", Style::default().fg(Color::DarkGray)));
        } else {
            spans.push(value);
        }
        if field.read_only {
            spans.push(Span::styled("  (只读)", Style::default().fg(Color::DarkGray)));
        }
        lines.push(Line::from(spans));

        if let Some(error) = form.error(field.name) {
            lines.push(Line::from(vec![Span::styled(
                format!("    ✗ {}", error),
                Style::default().fg(Color::Red),
            )]));
        }
    }

    lines.push(Line::from(""));
    let button = if form.state() == FormState::Submitting {
        "[ 提交中... ]".to_string()
    } else {
        format!("[ {} ]", form.button_label())
    };
    lines.push(Line::from(vec![Span::styled(
        button,
        selected_style(app.form_cursor == form.fields().len()),
    )]));
    if let Some(error) = form.submit_error() {
        lines.push(Line::from(vec![Span::styled(
            format!("✗ {}", error),
            Style::default().fg(Color::Red),
        )]));
    }

    let title = if app.focus_area == FocusArea::MainView {
        format!("{} (↑↓ 选择, Enter 编辑, ←→ 切换选项, Esc 取消)", form.title())
    } else {
        form.title().to_string()
    };
    let paragraph = Paragraph::new(lines).block(main_block(title, app));
    f.render_widget(paragraph, area);
}

fn render_profile(f: &mut Frame, area: Rect, app: &App) {
    let state = app.auth.snapshot();
    let tokens = match (&state.token, &state.refresh_token) {
        (Some(_), Some(_)) => "access + refresh",
        (Some(_), None) => "access",
        _ => "-",
    };
    let lines = match app.user.clone().or(state.user) {
        Some(user) => {
            let row = |label: &str, value: String| {
                Line::from(vec![
                    Span::styled(
                        format!("{:<8}", label),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(value, Style::default().fg(Color::Cyan)),
                ])
            };
            vec![
                Line::from(vec![Span::styled(
                    "--- 当前用户 ---",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )]),
                Line::from(""),
                row("姓名:", user.display_name()),
                row("邮箱:", user.email.clone()),
                row("ID:", user.id.clone()),
                row("头像:", user.avatar.clone().unwrap_or_else(|| "-".to_string())),
                row("Token:", tokens.to_string()),
            ]
        }
        None => vec![Line::from("正在加载用户信息...")],
    };
    let title = if app.focus_area == FocusArea::MainView {
        "个人信息 (Esc 返回)".to_string()
    } else {
        "个人信息".to_string()
    };
    f.render_widget(Paragraph::new(lines).block(main_block(title, app)), area);
}

fn render_bottom_bar(f: &mut Frame, area: Rect, app: &App) {
    let bottom_chunks = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    // 命令输入区域
    let command_prompt = if app.input_mode == InputMode::Command {
        let mut spans = vec![Span::styled(
            "命令: ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )];
        let cur = app.command_cursor.min(app.command_input.len());
        let (left, right) = app.command_input.split_at(cur);
        spans.push(Span::raw(left));
        spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(right));

        // 如果有建议，添加浅灰色幽灵文本
        if let Some(hint) = app.get_completion_hint() {
            spans.push(Span::styled(hint, Style::default().fg(Color::DarkGray)));
        }

        vec![
            Line::from(spans),
            Line::from("Enter执行 Esc取消 Tab补全 ←→光标 Home/End ↑历史 ↓下一条"),
        ]
    } else {
        vec![
            Line::from(vec![
                Span::styled("命令: ", Style::default().fg(Color::Yellow)),
                Span::raw("(按 / 进入命令模式, help 查看命令)"),
            ]),
            Line::from("/命令 Tab切换焦点 ↑↓导航 Enter确认 Esc返回 q退出"),
        ]
    };
    let command_paragraph = Paragraph::new(command_prompt).block(
        Block::default()
            .borders(Borders::ALL)
            .title(if app.input_mode == InputMode::Command {
                "命令输入模式"
            } else {
                "命令输入"
            })
            .style(if app.input_mode == InputMode::Command {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::White)
            }),
    );
    f.render_widget(command_paragraph, bottom_chunks[0]);

    // 日志区域：最新的在顶部，最多 20 条
    let log_items: Vec<ListItem> = app
        .log_messages
        .iter()
        .rev()
        .take(20)
        .map(|msg| {
            let style = if msg.starts_with("✓") {
                Style::default().fg(Color::Green)
            } else if msg.starts_with("✗") {
                Style::default().fg(Color::Red)
            } else if msg.starts_with("⚠") {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(msg.as_str()).style(style)
        })
        .collect();

    let log = List::new(log_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("日志 (共 {} 条)", app.log_messages.len()))
            .style(Style::default().fg(Color::White)),
    );
    f.render_widget(log, bottom_chunks[1]);
}

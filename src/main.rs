mod app_service;
mod app_state;
mod auth;
mod commands;
mod config;
mod controller;
mod entity;
mod schema;
mod session;
mod store;
mod ui;
mod validation;

#[cfg(test)]
mod testing;

use anyhow::Context;
use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::app_service::AppServices;
use crate::app_state::{App, AppEvent};
use crate::auth::TokenStore;
use crate::commands::BackgroundTask;
use crate::config::AppConfig;
use crate::session::{ApiUrls, HttpBackend};
use crate::ui::draw;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let ts = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let log_dir = std::path::PathBuf::from("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(format!("app-{}.log", ts));
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("无法创建日志文件 {}", log_path.display()))?;
    env_logger::Builder::from_default_env()
        // TUI 占用终端，日志只写文件
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Warn)
        .filter_module("rustadmin", log::LevelFilter::Info)
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper", log::LevelFilter::Warn)
        .init();

    let mut session_info = Vec::new();
    let current_dir = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    session_info.push(format!("当前工作目录: {}", current_dir.display()));

    let (config, notes) = AppConfig::from_env();
    session_info.extend(notes);

    let backend = HttpBackend::new(ApiUrls::new(config.api_base_url.clone()), config.proxy.as_deref())
        .context("无法创建 HTTP 客户端")?;
    let services = AppServices::new(Arc::new(backend), TokenStore::new(config.token_file.clone()));
    log::info!("启动，后端地址 {}", config.api_base_url);

    // 创建核心 Channel
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<BackgroundTask>();
    let (evt_tx, evt_rx) = mpsc::unbounded_channel::<AppEvent>();

    // 后台 actor：按顺序处理 UI 发来的任务
    let services_bg = services.clone();
    tokio::spawn(async move {
        while let Some(task) = cmd_rx.recv().await {
            services_bg.handle(task, &evt_tx).await;
        }
    });

    if !services.auth.is_authenticated() {
        if let Some((email, password)) = config.auto_login() {
            session_info.push(format!("✓ 已读取账号信息: {}，自动登录", email));
            let _ = cmd_tx.send(BackgroundTask::Login { email, password });
        }
    }

    // TUI 初始化
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(
        session_info,
        config.admin_email.clone(),
        services.auth.clone(),
        services.store.clone(),
        cmd_tx,
        evt_rx,
    );

    let res = match app.evt_rx.take() {
        Some(rx) => run_app_loop(&mut terminal, &mut app, rx).await,
        None => Ok(()),
    };

    // 恢复终端
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

async fn run_app_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut evt_rx: mpsc::UnboundedReceiver<AppEvent>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        while let Ok(event) = evt_rx.try_recv() {
            app.handle_event(event);
        }

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key_event(key.code) {
                    return Ok(());
                }
            }
        }
    }
}

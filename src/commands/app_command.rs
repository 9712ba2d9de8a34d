use crate::controller::StatusFilter;
use crate::entity::EntityType;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkKind {
    Delete,
    Deactivate,
}

/// 命令行（`/`）输入解析出的命令
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Login { email: String, password: String },
    Logout,
    Open(EntityType),
    Profile,
    New,
    Edit(String),
    Delete(String),
    Toggle(String),
    Search(String),
    Filter(StatusFilter),
    Page(usize),
    Refresh,
    Bulk(BulkKind),
    Help,
    Quit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "可用命令: login <email> <password> | logout | open <product|sales> | profile | new | edit <id> | delete <id> | toggle <id> | search <term> | filter all|active|inactive | page <n> | refresh | bulk delete|deactivate | help | quit";

impl FromStr for AppCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(AppCommand::Unknown("".to_string()));
        }

        match parts[0] {
            "login" => match (parts.get(1), parts.get(2)) {
                (Some(email), Some(_)) => Ok(AppCommand::Login {
                    email: email.to_string(),
                    // 密码允许包含空格
                    password: parts[2..].join(" "),
                }),
                _ => Ok(AppCommand::Unknown("用法: login <email> <password>".to_string())),
            },
            "logout" => Ok(AppCommand::Logout),
            "open" => match parts.get(1).and_then(|s| EntityType::from_name(s)) {
                Some(entity) => Ok(AppCommand::Open(entity)),
                None => Ok(AppCommand::Unknown("用法: open <product|sales>".to_string())),
            },
            "products" | "product" => Ok(AppCommand::Open(EntityType::Product)),
            "sales" => Ok(AppCommand::Open(EntityType::Sales)),
            "profile" | "me" => Ok(AppCommand::Profile),
            "new" => Ok(AppCommand::New),
            "edit" | "delete" | "toggle" => {
                let Some(id) = parts.get(1) else {
                    return Ok(AppCommand::Unknown(format!("用法: {} <id>", parts[0])));
                };
                let id = id.to_string();
                Ok(match parts[0] {
                    "edit" => AppCommand::Edit(id),
                    "delete" => AppCommand::Delete(id),
                    _ => AppCommand::Toggle(id),
                })
            }
            // 不带参数即清空搜索
            "search" => Ok(AppCommand::Search(parts[1..].join(" "))),
            "filter" => match parts.get(1).and_then(|s| StatusFilter::from_name(s)) {
                Some(filter) => Ok(AppCommand::Filter(filter)),
                None => Ok(AppCommand::Unknown("用法: filter all|active|inactive".to_string())),
            },
            "page" => match parts.get(1).and_then(|s| s.parse::<usize>().ok()) {
                Some(n) if n > 0 => Ok(AppCommand::Page(n)),
                _ => Ok(AppCommand::Unknown("用法: page <n>".to_string())),
            },
            "refresh" | "r" => Ok(AppCommand::Refresh),
            "bulk" => match parts.get(1).copied() {
                Some("delete") => Ok(AppCommand::Bulk(BulkKind::Delete)),
                Some("deactivate") => Ok(AppCommand::Bulk(BulkKind::Deactivate)),
                _ => Ok(AppCommand::Unknown("用法: bulk delete|deactivate".to_string())),
            },
            "help" | "h" => Ok(AppCommand::Help),
            "quit" | "q" | "exit" => Ok(AppCommand::Quit),
            _ => Ok(AppCommand::Unknown(format!("未知命令: {}", parts[0]))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> AppCommand {
        AppCommand::from_str(s).unwrap()
    }

    #[test]
    fn parses_navigation_and_record_commands() {
        assert_eq!(parse("open sales"), AppCommand::Open(EntityType::Sales));
        assert_eq!(parse("products"), AppCommand::Open(EntityType::Product));
        assert_eq!(parse("edit p1"), AppCommand::Edit("p1".into()));
        assert_eq!(parse("toggle 7"), AppCommand::Toggle("7".into()));
        assert_eq!(parse("bulk deactivate"), AppCommand::Bulk(BulkKind::Deactivate));
        assert_eq!(parse("filter inactive"), AppCommand::Filter(StatusFilter::Inactive));
        assert_eq!(parse("page 2"), AppCommand::Page(2));
        assert_eq!(parse("search big widget"), AppCommand::Search("big widget".into()));
        assert_eq!(parse("search"), AppCommand::Search(String::new()));
    }

    #[test]
    fn login_keeps_spaces_in_password() {
        assert_eq!(
            parse("login admin@example.com my secret"),
            AppCommand::Login {
                email: "admin@example.com".into(),
                password: "my secret".into()
            }
        );
    }

    #[test]
    fn bad_arguments_yield_usage() {
        assert_eq!(parse("open orders"), AppCommand::Unknown("用法: open <product|sales>".into()));
        assert_eq!(parse("page 0"), AppCommand::Unknown("用法: page <n>".into()));
        assert_eq!(parse("delete"), AppCommand::Unknown("用法: delete <id>".into()));
        assert_eq!(parse("frobnicate"), AppCommand::Unknown("未知命令: frobnicate".into()));
    }
}

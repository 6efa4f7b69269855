//! Relay Role - 进程角色

use std::fmt;
use std::str::FromStr;

/// 进程角色
///
/// - `ai`: worker 侧，直连生成后端，一次处理一个中继任务
/// - `frontend`: origin 侧，接收用户请求并把任务派发给 worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRole {
    Worker,
    Origin,
}

impl RelayRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayRole::Worker => "ai",
            RelayRole::Origin => "frontend",
        }
    }

    /// 解析命令行给出的角色，未给出也是错误
    pub fn from_arg(arg: Option<&str>) -> Result<Self, String> {
        match arg {
            Some(value) => value.parse(),
            None => Err("missing --relaySide".to_string()),
        }
    }
}

impl FromStr for RelayRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(RelayRole::Worker),
            "frontend" => Ok(RelayRole::Origin),
            other => Err(format!(
                "unknown relay side '{}', expected 'ai' or 'frontend'",
                other
            )),
        }
    }
}

impl fmt::Display for RelayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        assert_eq!("ai".parse::<RelayRole>(), Ok(RelayRole::Worker));
        assert_eq!("frontend".parse::<RelayRole>(), Ok(RelayRole::Origin));
        assert!("backend".parse::<RelayRole>().is_err());
        assert!("AI".parse::<RelayRole>().is_err());
    }

    #[test]
    fn test_from_arg_requires_a_known_role() {
        assert_eq!(RelayRole::from_arg(Some("ai")), Ok(RelayRole::Worker));
        assert_eq!(
            RelayRole::from_arg(None),
            Err("missing --relaySide".to_string())
        );
        let err = RelayRole::from_arg(Some("foo")).unwrap_err();
        assert!(err.contains("'foo'"));
    }
}

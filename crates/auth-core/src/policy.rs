//! 역할 기반 접근 제어 (RBAC).
//!
//! 정책은 역할 집합에 대한 이름 붙은 술어입니다. 평가는 순수하고 결정적이며
//! 역할 이름은 대소문자를 구분합니다. 등록되지 않은 정책 이름은 항상 거부합니다.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::{ROLE_ADMIN, ROLE_USER};

/// 관리자 전용 정책.
pub const ADMIN_ONLY: &str = "AdminOnly";

/// 일반 사용자 또는 관리자 정책.
pub const USER_OR_ADMIN: &str = "UserOrAdmin";

/// 역할 집합에 대한 술어.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolePredicate {
    /// 나열된 역할 중 하나 이상 보유
    AnyOf(Vec<String>),
    /// 나열된 역할 모두 보유
    AllOf(Vec<String>),
}

impl RolePredicate {
    /// 술어 평가.
    ///
    /// 빈 목록은 항상 거부합니다 (`AllOf([])`가 전원 허용이 되지 않도록).
    pub fn evaluate<'a>(&self, roles: impl IntoIterator<Item = &'a str> + Clone) -> bool {
        match self {
            RolePredicate::AnyOf(required) => {
                !required.is_empty()
                    && roles
                        .into_iter()
                        .any(|role| required.iter().any(|r| r == role))
            }
            RolePredicate::AllOf(required) => {
                !required.is_empty()
                    && required
                        .iter()
                        .all(|r| roles.clone().into_iter().any(|role| role == r))
            }
        }
    }
}

/// 설정 파일에서 선언하는 정책.
///
/// ```toml
/// [[policies]]
/// name = "Auditors"
/// any_of = ["Auditor", "Admin"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDefinition {
    pub name: String,
    #[serde(default)]
    pub any_of: Vec<String>,
    #[serde(default)]
    pub all_of: Vec<String>,
}

impl PolicyDefinition {
    /// `any_of`와 `all_of` 중 정확히 하나만 지정되어야 합니다.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("정책 이름이 비어 있습니다".to_string());
        }
        match (self.any_of.is_empty(), self.all_of.is_empty()) {
            (false, true) | (true, false) => Ok(()),
            _ => Err(format!(
                "정책 '{}'은 any_of 또는 all_of 중 하나만 지정해야 합니다",
                self.name
            )),
        }
    }

    fn to_predicate(&self) -> RolePredicate {
        if self.any_of.is_empty() {
            RolePredicate::AllOf(self.all_of.clone())
        } else {
            RolePredicate::AnyOf(self.any_of.clone())
        }
    }
}

/// 정책 평가기.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    policies: HashMap<String, RolePredicate>,
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        let mut evaluator = Self {
            policies: HashMap::new(),
        };
        evaluator.register(ADMIN_ONLY, RolePredicate::AnyOf(vec![ROLE_ADMIN.to_string()]));
        evaluator.register(
            USER_OR_ADMIN,
            RolePredicate::AnyOf(vec![ROLE_USER.to_string(), ROLE_ADMIN.to_string()]),
        );
        evaluator
    }
}

impl PolicyEvaluator {
    /// 기본 정책에 설정된 정책을 더한 평가기.
    ///
    /// 같은 이름이면 설정 쪽이 기본 정책을 덮어씁니다.
    pub fn with_definitions(definitions: &[PolicyDefinition]) -> Self {
        let mut evaluator = Self::default();
        for definition in definitions {
            evaluator.register(definition.name.clone(), definition.to_predicate());
        }
        evaluator
    }

    /// 정책 등록.
    pub fn register(&mut self, name: impl Into<String>, predicate: RolePredicate) {
        self.policies.insert(name.into(), predicate);
    }

    /// 정책 존재 여부.
    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// 역할 목록이 정책을 만족하는지 확인. 알 수 없는 정책은 거부합니다.
    pub fn permits<S: AsRef<str>>(&self, roles: &[S], policy: &str) -> bool {
        match self.policies.get(policy) {
            Some(predicate) => predicate.evaluate(roles.iter().map(AsRef::<str>::as_ref)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_policies() {
        let evaluator = PolicyEvaluator::default();

        assert!(evaluator.permits(&["Admin"], ADMIN_ONLY));
        assert!(evaluator.permits(&["User", "Admin"], ADMIN_ONLY));
        assert!(!evaluator.permits(&["User"], ADMIN_ONLY));

        assert!(evaluator.permits(&["User"], USER_OR_ADMIN));
        assert!(evaluator.permits(&["Admin"], USER_OR_ADMIN));
        assert!(!evaluator.permits(&["Guest"], USER_OR_ADMIN));
    }

    #[test]
    fn test_case_sensitive() {
        let evaluator = PolicyEvaluator::default();
        assert!(!evaluator.permits(&["admin"], ADMIN_ONLY));
        assert!(!evaluator.permits(&["ADMIN"], ADMIN_ONLY));
    }

    #[test]
    fn test_unknown_policy_denies() {
        let evaluator = PolicyEvaluator::default();
        assert!(!evaluator.permits(&["Admin"], "SuperUserOnly"));
        assert!(!evaluator.permits(&["Admin"], "adminonly"));
    }

    #[test]
    fn test_empty_roles_deny() {
        let evaluator = PolicyEvaluator::default();
        let none: [&str; 0] = [];
        assert!(!evaluator.permits(&none, ADMIN_ONLY));
        assert!(!evaluator.permits(&none, USER_OR_ADMIN));
    }

    #[test]
    fn test_all_of_predicate() {
        let predicate = RolePredicate::AllOf(vec!["Admin".to_string(), "Auditor".to_string()]);
        assert!(predicate.evaluate(["Admin", "Auditor", "User"]));
        assert!(!predicate.evaluate(["Admin"]));

        assert!(!RolePredicate::AllOf(vec![]).evaluate(["Admin"]));
        assert!(!RolePredicate::AnyOf(vec![]).evaluate(["Admin"]));
    }

    #[test]
    fn test_configured_policies() {
        let definitions = vec![PolicyDefinition {
            name: "Auditors".to_string(),
            any_of: vec!["Auditor".to_string()],
            all_of: vec![],
        }];
        let evaluator = PolicyEvaluator::with_definitions(&definitions);

        assert!(evaluator.contains("Auditors"));
        assert!(evaluator.contains(ADMIN_ONLY));
        assert!(evaluator.permits(&["Auditor".to_string()], "Auditors"));
        assert!(!evaluator.permits(&["Admin".to_string()], "Auditors"));
    }

    #[test]
    fn test_policy_definition_validation() {
        let both = PolicyDefinition {
            name: "X".to_string(),
            any_of: vec!["A".to_string()],
            all_of: vec!["B".to_string()],
        };
        assert!(both.validate().is_err());

        let neither = PolicyDefinition {
            name: "X".to_string(),
            any_of: vec![],
            all_of: vec![],
        };
        assert!(neither.validate().is_err());
    }
}

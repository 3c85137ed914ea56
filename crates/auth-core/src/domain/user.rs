//! 사용자 및 역할.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 일반 사용자 역할.
pub const ROLE_USER: &str = "User";

/// 관리자 역할.
pub const ROLE_ADMIN: &str = "Admin";

/// 사용자에게 부여된 역할 집합.
///
/// 중복 없이 정렬된 상태로 유지되며, 역할 이름은 대소문자를 구분합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// 빈 역할 집합.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// 신규 가입자의 기본 역할 집합 (`User`).
    pub fn default_for_new_user() -> Self {
        Self::from_iter([ROLE_USER])
    }

    /// 역할 포함 여부.
    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// 역할을 추가합니다. 새로 추가되었으면 `true`.
    pub fn insert(&mut self, role: impl Into<String>) -> bool {
        self.0.insert(role.into())
    }

    /// 역할을 제거합니다. 실제로 제거되었으면 `true`.
    pub fn remove(&mut self, role: &str) -> bool {
        self.0.remove(role)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// 토큰 클레임에 넣을 역할 목록.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// 사용자 레코드.
///
/// 등록 시 생성되며, 역할 추가/제거와 비밀번호 해시 교체 외에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// 사용자 ID
    pub id: Uuid,
    /// 사용자 이름 (유일)
    pub username: String,
    /// 이메일
    pub email: String,
    /// PHC 형식 비밀번호 해시
    pub password_hash: String,
    /// 부여된 역할
    pub roles: RoleSet,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 마지막 변경 시각
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// 기본 역할(`User`)을 가진 신규 사용자 생성.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            roles: RoleSet::default_for_new_user(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_set_is_unique_and_ordered() {
        let mut roles = RoleSet::from_iter(["User", "Admin", "User"]);
        assert_eq!(roles.len(), 2);
        assert_eq!(roles.to_vec(), vec!["Admin".to_string(), "User".to_string()]);

        assert!(!roles.insert("Admin"));
        assert!(roles.insert("Auditor"));
        assert!(roles.remove("Auditor"));
        assert!(!roles.remove("Auditor"));
    }

    #[test]
    fn test_role_names_are_case_sensitive() {
        let roles = RoleSet::from_iter(["Admin"]);
        assert!(roles.contains("Admin"));
        assert!(!roles.contains("admin"));
    }

    #[test]
    fn test_new_user_has_default_role() {
        let user = User::new("alice", "a@x", "$argon2id$...", Utc::now());
        assert!(user.roles.contains(ROLE_USER));
        assert_eq!(user.roles.len(), 1);
    }

    #[test]
    fn test_role_set_serializes_as_array() {
        let roles = RoleSet::from_iter(["User", "Admin"]);
        let json = serde_json::to_string(&roles).unwrap();
        assert_eq!(json, r#"["Admin","User"]"#);
    }
}

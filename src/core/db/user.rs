use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => anyhow::bail!("Invalid role value: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: OffsetDateTime,
    pub(super) _guard: (),
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Admin listing row
#[derive(Debug, Clone)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: OffsetDateTime,
    pub scan_count: i64,
    pub(super) _guard: (),
}

pub trait UserRepository {
    fn add_user(&self, user: &NewUser) -> impl Future<Output = anyhow::Result<User>>;
    fn get_user(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<User>>>;
    /// Look a user up by username or email
    fn find_user_by_login(&self, login: &str) -> impl Future<Output = anyhow::Result<Option<User>>>;
    fn list_users_with_scan_counts(&self) -> impl Future<Output = anyhow::Result<Vec<UserSummary>>>;
}

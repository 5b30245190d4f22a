/// The authenticated caller. Produced by the host's session layer and
/// injected into a manager context; managers never read ambient user
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
}

/// Capability check collaborator, implemented by the host. Called only
/// when a session is present; no session means no capability.
pub trait Authorizer: Send + Sync {
    fn has_capability(&self, user_id: i64, capability: &str, object_id: Option<i64>) -> bool;
}

/// Grants everything. For tests and single-user deployments where the
/// host has already gated access.
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn has_capability(&self, _user_id: i64, _capability: &str, _object_id: Option<i64>) -> bool {
        true
    }
}

/// Grants nothing. Useful as a safe placeholder while wiring a host.
pub struct DenyAll;

impl Authorizer for DenyAll {
    fn has_capability(&self, _user_id: i64, _capability: &str, _object_id: Option<i64>) -> bool {
        false
    }
}

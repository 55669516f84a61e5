use async_trait::async_trait;

/// Resolves whatever the transport hands us (a header value, a session
/// token) into an opaque actor id. No credential logic lives behind this
/// trait in the core; a real deployment plugs a verifying implementation in
/// at the edge.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, presented: &str) -> Result<String, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Missing actor identity")]
    Missing,

    #[error("Unresolvable actor identity: {0}")]
    Unresolvable(String),
}

/// Pass-through resolver: trusts the presented id as-is.
pub struct OpaqueIdentity;

#[async_trait]
impl IdentityResolver for OpaqueIdentity {
    async fn resolve(&self, presented: &str) -> Result<String, IdentityError> {
        let id = presented.trim();
        if id.is_empty() {
            return Err(IdentityError::Missing);
        }
        Ok(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_opaque_identity_passthrough() {
        let resolver = OpaqueIdentity;
        assert_eq!(resolver.resolve(" pax-42 ").await.unwrap(), "pax-42");
        assert!(matches!(
            resolver.resolve("").await,
            Err(IdentityError::Missing)
        ));
    }
}

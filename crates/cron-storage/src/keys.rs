//! Key encoding for storage layer.
//!
//! Key formats:
//! - task configurations: `task:{id}`
//! - script bodies: `body:{id}`
//! - script file names: `name:{id}`
//!
//! Ids are opaque non-empty strings. The id always sits after a fixed
//! prefix, so any character (`:` included) is allowed in it.

use crate::error::StorageError;

fn check_id(id: &str) -> Result<(), StorageError> {
    if id.is_empty() {
        return Err(StorageError::Key("Empty configuration id".to_string()));
    }
    Ok(())
}

/// Key for a task configuration record
/// Format: task:{id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskKey {
    pub id: String,
}

impl TaskKey {
    pub const PREFIX: &'static str = "task:";

    pub fn new(id: &str) -> Result<Self, StorageError> {
        check_id(id)?;
        Ok(Self { id: id.to_string() })
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}{}", Self::PREFIX, self.id).into_bytes()
    }
}

/// Keys for an uploaded script attached to a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptKey {
    pub id: String,
}

impl ScriptKey {
    pub const BODY_PREFIX: &'static str = "body:";
    pub const NAME_PREFIX: &'static str = "name:";

    pub fn new(id: &str) -> Result<Self, StorageError> {
        check_id(id)?;
        Ok(Self { id: id.to_string() })
    }

    /// Format: body:{id}
    pub fn body_bytes(&self) -> Vec<u8> {
        format!("{}{}", Self::BODY_PREFIX, self.id).into_bytes()
    }

    /// Format: name:{id}
    pub fn name_bytes(&self) -> Vec<u8> {
        format!("{}{}", Self::NAME_PREFIX, self.id).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_key_bytes() {
        let key = TaskKey::new("CRJ001").unwrap();
        assert_eq!(key.to_bytes(), b"task:CRJ001");
    }

    #[test]
    fn test_keys_accept_colons() {
        let key = TaskKey::new("urn:task:1").unwrap();
        assert_eq!(key.to_bytes(), b"task:urn:task:1");

        let script = ScriptKey::new("urn:task:1").unwrap();
        assert_eq!(script.body_bytes(), b"body:urn:task:1");
        assert_eq!(script.name_bytes(), b"name:urn:task:1");
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(TaskKey::new("").is_err());
        assert!(ScriptKey::new("").is_err());
    }

    #[test]
    fn test_script_keys() {
        let key = ScriptKey::new("01HX").unwrap();
        assert_eq!(key.body_bytes(), b"body:01HX");
        assert_eq!(key.name_bytes(), b"name:01HX");
    }
}

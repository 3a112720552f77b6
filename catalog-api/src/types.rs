//! Request and response bodies for the item endpoints.

use catalog_core::{ItemId, NullableText, ProjectId};
use serde::{Deserialize, Serialize};

/// Body of `POST /item/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
}

/// Body of `PATCH /item/update`.
///
/// A missing `description` is treated as null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: NullableText,
}

/// Body of `PATCH /item/reprioritize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprioritizeRequest {
    pub new_priority: i32,
}

/// Response of `DELETE /item/remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItemResponse {
    pub id: ItemId,
    pub project_id: ProjectId,
    pub removed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_without_description_is_null() -> Result<(), serde_json::Error> {
        let req: UpdateItemRequest = serde_json::from_str(r#"{"name":"n"}"#)?;
        assert!(!req.description.is_present());
        Ok(())
    }

    #[test]
    fn test_reprioritize_requires_priority() {
        assert!(serde_json::from_str::<ReprioritizeRequest>("{}").is_err());
        assert!(serde_json::from_str::<ReprioritizeRequest>(r#"{"new_priority":3}"#).is_ok());
    }

    #[test]
    fn test_remove_response_shape() -> Result<(), serde_json::Error> {
        let body = serde_json::to_value(RemoveItemResponse {
            id: 1,
            project_id: 2,
            removed: true,
        })?;
        assert_eq!(body, serde_json::json!({ "id": 1, "project_id": 2, "removed": true }));
        Ok(())
    }
}

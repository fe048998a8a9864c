use uuid::Uuid;

use crate::error::ApiError;

/// Authorize a caller against a resource's owner. File resources resolve
/// ownership through their parent project, so callers pass the project
/// owner's id here, never the uploader's.
pub fn ensure_owner(owner_id: Uuid, caller_id: Uuid) -> Result<(), ApiError> {
    if owner_id == caller_id {
        Ok(())
    } else {
        Err(ApiError::AccessDenied)
    }
}

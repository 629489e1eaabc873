use crate::api::errors::ApiError;
use crate::services::submission_pipeline::PipelineError;

pub(crate) fn map_pipeline_error(err: PipelineError) -> ApiError {
    match err {
        PipelineError::InvalidPayload(message) => {
            ApiError::BadRequest(format!("Invalid document payload: {message}"))
        }
        PipelineError::RenderFailed(source) => {
            ApiError::internal(source, "Failed to render submission document")
        }
        PipelineError::StorageWriteFailed(source) => {
            ApiError::internal(source, "Failed to store submission file")
        }
        PipelineError::DatabaseFailed(source) => {
            ApiError::internal(source, "Failed to record submission")
        }
    }
}

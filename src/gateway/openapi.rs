//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::gateway::types::{DebugStateResponse, HealthResponse, TransferResponse};
use crate::models::{Account, EntryType, LedgerEntry};
use crate::transfer::TransferRequest;

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Transfer Ledger API",
        version = "1.0.0",
        description = "Atomic, idempotent money transfers between ledger accounts."
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::transfer::create_transfer,
        crate::gateway::handlers::debug::debug_state,
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::health::metrics,
    ),
    components(
        schemas(
            TransferRequest,
            TransferResponse,
            DebugStateResponse,
            HealthResponse,
            Account,
            LedgerEntry,
            EntryType,
        )
    ),
    tags(
        (name = "Transfer", description = "Fund transfers between accounts"),
        (name = "Debug", description = "Read-only ledger state"),
        (name = "System", description = "Health checks and metrics")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Transfer Ledger API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_json_serializable() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("Transfer Ledger API"));
        assert!(json.contains("fromAccountId"));
    }

    #[test]
    fn test_endpoints_registered() {
        let paths = ApiDoc::openapi().paths;
        for path in ["/transfer", "/debug/state", "/health", "/metrics"] {
            assert!(paths.paths.contains_key(path), "missing {}", path);
        }
    }
}

use serde::Serialize;
use utoipa::ToSchema;

use crate::integrity::ReconcileReport;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub msg: String,
    pub report: ReconcileReport,
}

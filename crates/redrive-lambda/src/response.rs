//! JSON result bodies returned by each handler invocation.

use serde::Serialize;

/// `{"result":"ok", …summary fields}` — the per-batch summary flattened
/// alongside a status marker, mirroring what callers and log scrapers see.
#[derive(Debug, Serialize)]
pub(crate) struct HandlerResponse<T: Serialize> {
    pub result: &'static str,
    #[serde(flatten)]
    pub summary: T,
}

impl<T: Serialize> HandlerResponse<T> {
    pub fn ok(summary: T) -> Self {
        Self {
            result: "ok",
            summary,
        }
    }
}

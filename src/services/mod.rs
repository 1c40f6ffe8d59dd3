// Master data services
pub mod materials;
pub mod orders;
pub mod products;

// Production flow
pub mod production;

use tracing::warn;

use crate::store::Document;

/// Decodes a listed document, skipping ones that do not match the model.
/// Hand-edited or legacy documents must not take a whole screen down.
pub(crate) fn decode_or_skip<T>(
    collection: &str,
    doc: &Document,
    decode: fn(&Document) -> Result<T, serde_json::Error>,
) -> Option<T> {
    match decode(doc) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%collection, id = %doc.id, error = %err, "Skipping document that failed to decode");
            None
        }
    }
}

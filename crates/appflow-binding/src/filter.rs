//! Payload filtering before data is sent to the backend.

use crate::codec::FormData;
use crate::schema::DataModelSchema;

/// Keep only fields the backend data model can accept.
///
/// Drops fields with no schema node and fields that map to XML attributes.
pub fn filter_for_submit(form_data: &FormData, schema: &DataModelSchema) -> FormData {
    form_data
        .iter()
        .filter(|(key, _)| match schema.field(key) {
            Some(node) if crate::schema::is_attribute(node) => {
                tracing::debug!(field = %key, "dropping attribute field from payload");
                false
            }
            Some(_) => true,
            None => {
                tracing::debug!(field = %key, "dropping field unknown to data model");
                false
            }
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

//! Resource emission
//!
//! Converts typed resources into `DynamicObject`s, the representation a kube
//! applier consumes. Only structural completeness is checked here.

use kube::core::DynamicObject;
use serde::Serialize;
use tracing::debug;
use wsd_common::kube_utils::HasApiResource;

use crate::daemonset::DaemonSet;
use crate::error::CompilationError;

/// Emit the rendered DaemonSet as the list of objects handed to the applier
pub fn emit(daemonset: &DaemonSet) -> Result<Vec<DynamicObject>, CompilationError> {
    Ok(vec![to_dynamic_object(daemonset)?])
}

/// Convert one typed resource into a `DynamicObject`
pub fn to_dynamic_object<R>(resource: &R) -> Result<DynamicObject, CompilationError>
where
    R: HasApiResource + Serialize,
{
    let value = serde_json::to_value(resource)?;

    for (field, path) in [
        ("apiVersion", "/apiVersion"),
        ("kind", "/kind"),
        ("metadata.name", "/metadata/name"),
    ] {
        let present = value
            .pointer(path)
            .and_then(serde_json::Value::as_str)
            .is_some_and(|s| !s.is_empty());
        if !present {
            return Err(CompilationError::incomplete(
                R::KIND,
                format!("missing {}", field),
            ));
        }
    }

    let object: DynamicObject = serde_json::from_value(value)?;
    debug!(kind = R::KIND, name = ?object.metadata.name, "emitted resource");
    Ok(object)
}

//! Expansion of role-based protocol templates into concrete plate events.

use crate::{error::LabtraceError, replay::ordering::parse_timestamp};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use labtrace_schemas::{
    event::{EventType, PlateEvent},
    labware::LabwareRef,
    protocol::{AbstractEvent, ProtocolBinding, ProtocolTemplate},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// A named, timestamped grouping of the events one template run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolSegmentActivity {
    pub id: String,
    pub activity_type: String,
    pub label: String,
    pub run: String,
    pub started_at: String,
    pub ended_at: String,
    pub template_id: Option<String>,
    pub template_version: Option<String>,
    pub event_ids: Vec<String>,
}

/// Replaces every `${name}` with the bound parameter, or nothing when unbound.
pub fn resolve_expression(text: &str, binding: &ProtocolBinding) -> String {
    let mut resolved = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let Some(length) = rest[start + 2..].find('}') else {
            break;
        };
        resolved.push_str(&rest[..start]);
        let name = rest[start + 2..start + 2 + length].trim();
        if let Some(value) = binding.parameters.get(name) {
            resolved.push_str(&parameter_text(value));
        }
        rest = &rest[start + 2 + length + 1..];
    }
    resolved.push_str(rest);
    resolved
}

fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn resolve_value(value: &Value, binding: &ProtocolBinding) -> Value {
    match value {
        Value::String(text) => Value::String(resolve_expression(text, binding)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_value(v, binding)).collect())
        }
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, binding)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Binding first, then the template's default, then `labware/{role}`.
pub fn resolve_role(
    template: &ProtocolTemplate,
    binding: &ProtocolBinding,
    role: &str,
) -> LabwareRef {
    let declared = template.data.labware_roles.get(role);
    let id = binding
        .labware
        .get(role)
        .cloned()
        .or_else(|| declared.and_then(|r| r.default_labware_id.clone()))
        .unwrap_or_else(|| format!("labware/{}", role));
    LabwareRef {
        id,
        kind: declared.and_then(|r| r.kind.clone()),
        label: declared.and_then(|r| r.label.clone()),
    }
}

fn labware_value(labware: &LabwareRef) -> Value {
    serde_json::to_value(labware).unwrap_or_else(|_| json!({ "@id": labware.id }))
}

fn role_name(details: &Map<String, Value>, key: &str, binding: &ProtocolBinding) -> Option<String> {
    details
        .get(key)
        .and_then(Value::as_str)
        .map(|role| resolve_expression(role, binding))
        .filter(|role| !role.is_empty())
}

/// Swaps every nested `labware_role` key for a concrete `labware` reference.
fn bind_nested_roles(
    value: Value,
    template: &ProtocolTemplate,
    binding: &ProtocolBinding,
    touched: &mut Vec<LabwareRef>,
) -> Value {
    match value {
        Value::Object(mut fields) => {
            if let Some(Value::String(role)) = fields.remove("labware_role") {
                let labware = resolve_role(template, binding, &role);
                fields.insert("labware".to_string(), labware_value(&labware));
                touched.push(labware);
            }
            Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, bind_nested_roles(v, template, binding, touched)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| bind_nested_roles(v, template, binding, touched))
                .collect(),
        ),
        other => other,
    }
}

fn transfer_details(
    details: &Map<String, Value>,
    template: &ProtocolTemplate,
    binding: &ProtocolBinding,
    touched: &mut Vec<LabwareRef>,
) -> Map<String, Value> {
    let mut concrete = Map::new();
    let mut source_wells = Map::new();
    let mut target_wells = Map::new();
    let mut mapping = Vec::new();

    if let Some(Value::Array(pairs)) = details.get("mapping") {
        for pair in pairs {
            let resolved = resolve_value(pair, binding);
            let well = |key: &str| resolved.get(key).and_then(Value::as_str).unwrap_or_default();
            let (source_well, target_well) = (well("source_well"), well("target_well"));
            if source_well.is_empty() || target_well.is_empty() {
                continue;
            }
            source_wells.insert(source_well.to_string(), json!({}));
            let mut target_spec = Map::new();
            target_spec.insert("source_well".to_string(), json!(source_well));
            if let Some(volume) = resolved.get("volume") {
                target_spec.insert("volume".to_string(), volume.clone());
            }
            target_wells.insert(target_well.to_string(), Value::Object(target_spec));
            mapping.push(resolved);
        }
    }

    let mut endpoint = |role_key: &str, wells: Map<String, Value>| {
        let mut side = Map::new();
        if let Some(role) = role_name(details, role_key, binding) {
            let labware = resolve_role(template, binding, &role);
            side.insert("labware".to_string(), labware_value(&labware));
            touched.push(labware);
        }
        side.insert("wells".to_string(), Value::Object(wells));
        Value::Object(side)
    };
    let source = endpoint("source_role", source_wells);
    let target = endpoint("target_role", target_wells);

    concrete.insert("source".to_string(), source);
    concrete.insert("target".to_string(), target);
    concrete.insert("mapping".to_string(), Value::Array(mapping));
    for (key, value) in details {
        if matches!(key.as_str(), "source_role" | "target_role" | "mapping" | "source" | "target") {
            continue;
        }
        concrete.insert(key.clone(), resolve_value(value, binding));
    }
    concrete
}

fn dedup_labware(labware: Vec<LabwareRef>) -> Vec<LabwareRef> {
    let mut unique: Vec<LabwareRef> = Vec::new();
    for item in labware {
        if !unique.iter().any(|u| u.id == item.id) {
            unique.push(item);
        }
    }
    unique
}

fn instantiate_event(
    index: usize,
    abstract_event: &AbstractEvent,
    template: &ProtocolTemplate,
    binding: &ProtocolBinding,
    base: DateTime<Utc>,
) -> PlateEvent {
    let kind = EventType::parse(&resolve_expression(&abstract_event.event_type, binding));
    let declared = abstract_event.details.as_object().cloned().unwrap_or_default();
    let mut touched = Vec::new();

    let mut details = match kind {
        EventType::Transfer => transfer_details(&declared, template, binding, &mut touched),
        _ => {
            let mut resolved = Map::new();
            for (key, value) in &declared {
                if key == "labware_role" {
                    continue;
                }
                resolved.insert(key.clone(), resolve_value(value, binding));
            }
            if let Some(role) = role_name(&declared, "labware_role", binding) {
                let labware = resolve_role(template, binding, &role);
                resolved.insert("labware".to_string(), labware_value(&labware));
                touched.push(labware);
            }
            match bind_nested_roles(Value::Object(resolved), template, binding, &mut touched) {
                Value::Object(fields) => fields,
                _ => Map::new(),
            }
        }
    };
    details.insert("type".to_string(), json!(kind.as_str()));

    let id = match &abstract_event.event_id {
        Some(event_id) => format!("{}:{}", binding.run_id, resolve_expression(event_id, binding)),
        None => format!("{}:event-{}", binding.run_id, index + 1),
    };
    let timestamp = base + Duration::seconds(index as i64);

    PlateEvent {
        id,
        event_type: Some(kind.as_str().to_string()),
        timestamp: Some(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        run: Some(binding.run_id.clone()),
        labware: dedup_labware(touched),
        details: Value::Object(details),
    }
}

fn base_timestamp(binding: &ProtocolBinding) -> Result<DateTime<Utc>, LabtraceError> {
    parse_timestamp(&binding.base_timestamp).ok_or_else(|| {
        LabtraceError::InvalidInput(format!(
            "base_timestamp '{}' is not an ISO-8601 instant",
            binding.base_timestamp
        ))
    })
}

/// Produces one concrete plate event per template event, one second apart.
///
/// # Errors
///
/// `InvalidInput` when the template has no `events` array or the binding's base
/// timestamp cannot be read. Unbound roles and parameters never fail.
pub fn instantiate_protocol(
    template: &ProtocolTemplate,
    binding: &ProtocolBinding,
) -> Result<Vec<PlateEvent>, LabtraceError> {
    let events = template.data.events.as_ref().ok_or_else(|| {
        LabtraceError::InvalidInput("protocol template has no events array".to_string())
    })?;
    let base = base_timestamp(binding)?;

    Ok(events
        .iter()
        .enumerate()
        .map(|(index, abstract_event)| {
            instantiate_event(index, abstract_event, template, binding, base)
        })
        .collect())
}

pub fn build_protocol_segment_activity(
    template: &ProtocolTemplate,
    binding: &ProtocolBinding,
) -> Result<ProtocolSegmentActivity, LabtraceError> {
    let events = instantiate_protocol(template, binding)?;
    let base = base_timestamp(binding)?.to_rfc3339_opts(SecondsFormat::Millis, true);
    let started_at = events
        .first()
        .and_then(|e| e.timestamp.clone())
        .unwrap_or_else(|| base.clone());
    let ended_at = events
        .last()
        .and_then(|e| e.timestamp.clone())
        .unwrap_or(base);

    Ok(ProtocolSegmentActivity {
        id: format!("{}:segment", binding.run_id),
        activity_type: "protocol_segment".to_string(),
        label: template
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| "Protocol segment".to_string()),
        run: binding.run_id.clone(),
        started_at,
        ended_at,
        template_id: template.metadata.id.clone(),
        template_version: template.metadata.version.clone(),
        event_ids: events.into_iter().map(|e| e.id).collect(),
    })
}

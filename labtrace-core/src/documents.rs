//! Reading event logs, templates and bindings from disk.
//!
//! Files may be JSON or YAML; both go through `serde_yaml`, which reads JSON as a
//! subset of YAML.

use crate::error::LabtraceError;
use labtrace_schemas::{
    event::PlateEvent,
    file_formats::{BindingFile, EventLogFile, ProtocolFile},
    protocol::{ProtocolBinding, ProtocolTemplate},
};
use serde::Deserialize;
use std::{fs, path::Path};

pub fn read_document<T, P>(path: P) -> Result<T, LabtraceError>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let display = path.as_ref().display().to_string();
    let content =
        fs::read_to_string(path.as_ref()).map_err(|e| LabtraceError::FileIO(display.clone(), e))?;
    serde_yaml::from_str(&content).map_err(|e| LabtraceError::YamlParsing(display, e))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventLogDocument {
    Wrapped(EventLogFile),
    Bare(Vec<PlateEvent>),
}

/// Accepts either a bare list of events or an `{ events: [...] }` wrapper.
pub fn read_event_log<P: AsRef<Path>>(path: P) -> Result<Vec<PlateEvent>, LabtraceError> {
    Ok(match read_document::<EventLogDocument, _>(path)? {
        EventLogDocument::Wrapped(file) => file.events,
        EventLogDocument::Bare(events) => events,
    })
}

pub fn read_protocol_template<P: AsRef<Path>>(path: P) -> Result<ProtocolTemplate, LabtraceError> {
    read_document::<ProtocolFile, _>(path)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BindingDocument {
    Wrapped(BindingFile),
    Bare(ProtocolBinding),
}

pub fn read_protocol_binding<P: AsRef<Path>>(path: P) -> Result<ProtocolBinding, LabtraceError> {
    Ok(match read_document::<BindingDocument, _>(path)? {
        BindingDocument::Wrapped(file) => file.binding,
        BindingDocument::Bare(binding) => binding,
    })
}

use super::options::Options;
use crate::ack::ready::ReadyReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length, in characters, of any free-text field (`msg`, `stack`).
pub const MAX_STRING: usize = 1000;

/// Error type assigned when the caller does not provide one.
pub const SYSTEM_ERROR_TYPE: &str = "sys";

/// Category tag of a record. The wire code is what the collector sees in `_ack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckKind {
    #[serde(rename = "rdy")]
    Ready,
    /// Reserved; nothing in the facade emits it yet.
    #[serde(rename = "spd")]
    Speed,
    #[serde(rename = "err")]
    Error,
    #[serde(rename = "api")]
    Api,
    #[serde(rename = "cnt")]
    Count,
    #[serde(rename = "sta")]
    Statistic,
    #[serde(rename = "log")]
    Log,
}

impl AckKind {
    pub fn code(self) -> &'static str {
        match self {
            AckKind::Ready => "rdy",
            AckKind::Speed => "spd",
            AckKind::Error => "err",
            AckKind::Api => "api",
            AckKind::Count => "cnt",
            AckKind::Statistic => "sta",
            AckKind::Log => "log",
        }
    }
}

impl fmt::Display for AckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Scalar value carried by a record field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write_number(f, *v),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Formats a float the way the collector's clients spell numbers.
fn write_number(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        f.write_str("NaN")
    } else if value.is_infinite() {
        f.write_str(if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else if value == 0.0 {
        // Negative zero included.
        f.write_str("0")
    } else {
        write!(f, "{value}")
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Source location and stack attached to an error report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorParams {
    pub file: String,
    pub line: i64,
    pub column: i64,
    pub stack: String,
}

impl ErrorParams {
    pub fn new(file: impl Into<String>, line: i64, column: i64) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            stack: String::new(),
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub msg: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(flatten)]
    pub params: Option<ErrorParams>,
}

/// Outcome of a remote call. Optional fields are only sent when set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiCall {
    pub api: String,
    pub succeed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiCall {
    pub fn new(api: impl Into<String>, succeed: bool) -> Self {
        Self {
            api: api.into(),
            succeed,
            cost: None,
            code: None,
            detail: None,
        }
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Kind-specific body of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Ready(ReadyReport),
    Error(ErrorReport),
    Api(ApiCall),
    Count { name: String },
    Statistic { name: String, value: f64 },
    Log { msg: String },
}

/// Values stamped onto a record when it is submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stamp {
    #[serde(rename = "_app")]
    pub app: String,
    #[serde(rename = "_time")]
    pub time_ms: i64,
    #[serde(rename = "_nick", skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl Stamp {
    pub fn now(options: &Options) -> Self {
        Self {
            app: options.app.clone(),
            time_ms: chrono::Utc::now().timestamp_millis(),
            nickname: (!options.nickname.is_empty()).then(|| options.nickname.clone()),
        }
    }
}

/// One telemetry event. Free-text fields are already within [`MAX_STRING`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "_ack")]
    kind: AckKind,
    #[serde(flatten)]
    payload: Payload,
    #[serde(flatten)]
    stamp: Option<Stamp>,
}

impl Record {
    pub fn new(payload: Payload) -> Self {
        let payload = match payload {
            Payload::Error(mut report) => {
                truncate_in_place(&mut report.msg);
                if let Some(params) = report.params.as_mut() {
                    truncate_in_place(&mut params.stack);
                }
                Payload::Error(report)
            }
            Payload::Log { mut msg } => {
                truncate_in_place(&mut msg);
                Payload::Log { msg }
            }
            other => other,
        };

        let kind = match &payload {
            Payload::Ready(_) => AckKind::Ready,
            Payload::Error(_) => AckKind::Error,
            Payload::Api(_) => AckKind::Api,
            Payload::Count { .. } => AckKind::Count,
            Payload::Statistic { .. } => AckKind::Statistic,
            Payload::Log { .. } => AckKind::Log,
        };

        Self {
            kind,
            payload,
            stamp: None,
        }
    }

    pub fn error(message: &str, error_type: Option<&str>, params: Option<ErrorParams>) -> Self {
        let error_type = error_type
            .filter(|t| !t.is_empty())
            .unwrap_or(SYSTEM_ERROR_TYPE);
        Self::new(Payload::Error(ErrorReport {
            msg: message.to_string(),
            error_type: error_type.to_string(),
            params,
        }))
    }

    pub fn api(call: ApiCall) -> Self {
        Self::new(Payload::Api(call))
    }

    pub fn count(name: impl Into<String>) -> Self {
        Self::new(Payload::Count { name: name.into() })
    }

    pub fn statistic(name: impl Into<String>, value: f64) -> Self {
        Self::new(Payload::Statistic {
            name: name.into(),
            value,
        })
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::new(Payload::Log { msg: message.into() })
    }

    pub fn ready(report: ReadyReport) -> Self {
        Self::new(Payload::Ready(report))
    }

    pub fn kind(&self) -> AckKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn stamp(&self) -> Option<&Stamp> {
        self.stamp.as_ref()
    }

    pub fn app(&self) -> Option<&str> {
        self.stamp.as_ref().map(|s| s.app.as_str())
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.stamp.as_ref().map(|s| s.time_ms)
    }

    pub fn nickname(&self) -> Option<&str> {
        self.stamp.as_ref().and_then(|s| s.nickname.as_deref())
    }

    pub(crate) fn set_stamp(&mut self, stamp: Stamp) {
        self.stamp = Some(stamp);
    }

    /// The `msg` of an ERROR or LOG record.
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            Payload::Error(report) => Some(&report.msg),
            Payload::Log { msg } => Some(msg),
            _ => None,
        }
    }

    pub fn is_system_error(&self) -> bool {
        matches!(&self.payload, Payload::Error(report) if report.error_type == SYSTEM_ERROR_TYPE)
    }

    /// Payload fields in wire order, excluding `_ack` and the stamp.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        let mut fields: Vec<(&'static str, FieldValue)> = Vec::new();
        match &self.payload {
            Payload::Ready(report) => {
                for (span, millis) in report.spans() {
                    fields.push((span.key(), FieldValue::from(millis)));
                }
                if let Some(network) = report.network() {
                    fields.push(("NT", network.into()));
                }
            }
            Payload::Error(report) => {
                fields.push(("msg", report.msg.as_str().into()));
                fields.push(("type", report.error_type.as_str().into()));
                if let Some(params) = &report.params {
                    fields.push(("file", params.file.as_str().into()));
                    fields.push(("line", params.line.into()));
                    fields.push(("column", params.column.into()));
                    fields.push(("stack", params.stack.as_str().into()));
                }
            }
            Payload::Api(call) => {
                fields.push(("api", call.api.as_str().into()));
                fields.push(("succeed", call.succeed.into()));
                if let Some(cost) = call.cost {
                    fields.push(("cost", cost.into()));
                }
                if let Some(code) = &call.code {
                    fields.push(("code", code.as_str().into()));
                }
                if let Some(detail) = &call.detail {
                    fields.push(("detail", detail.as_str().into()));
                }
            }
            Payload::Count { name } => fields.push(("name", name.as_str().into())),
            Payload::Statistic { name, value } => {
                fields.push(("name", name.as_str().into()));
                fields.push(("value", (*value).into()));
            }
            Payload::Log { msg } => fields.push(("msg", msg.as_str().into())),
        }
        fields
    }

    /// Looks up a single payload field by its wire key.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.fields()
            .into_iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }
}

/// Cuts `value` to at most `max` characters without splitting a character.
pub fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

fn truncate_in_place(value: &mut String) {
    let cut = truncate_chars(value, MAX_STRING).len();
    value.truncate(cut);
}

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::trace;

use crate::commands::params::CommandParameters;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to serialize parameters of {name}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("parameters of {0} do not serialize to a JSON object")]
    ParametersNotObject(String),
    #[error("response is not valid json: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("response does not match any command result shape: {0}")]
    UnexpectedShape(String),
}

fn shape(reason: impl Into<String>) -> CodecError {
    CodecError::UnexpectedShape(reason.into())
}

/// One command to send. The name comes from the parameter variant and cannot
/// be changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    parameters: CommandParameters,
    session_id: Option<String>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    name: &'a str,
    parameters: Value,
}

impl CommandRequest {
    pub fn new(parameters: CommandParameters) -> Self {
        Self {
            parameters,
            session_id: None,
        }
    }

    /// Attach an OSC 1.0 session; sent as `parameters.sessionId`.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn name(&self) -> &str {
        self.parameters.name()
    }

    pub fn parameters(&self) -> &CommandParameters {
        &self.parameters
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let name = self.name();
        let mut parameters = self
            .parameters
            .to_value()
            .map_err(|source| CodecError::Serialize {
                name: name.to_string(),
                source,
            })?;

        let Value::Object(map) = &mut parameters else {
            return Err(CodecError::ParametersNotObject(name.to_string()));
        };
        if let Some(session_id) = &self.session_id {
            map.insert("sessionId".to_string(), Value::String(session_id.clone()));
        }

        let body = serde_json::to_vec(&Envelope { name, parameters }).map_err(|source| {
            CodecError::Serialize {
                name: name.to_string(),
                source,
            }
        })?;
        trace!(command = %name, body_len = body.len(), "encoded command envelope");
        Ok(body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// State-specific part of a result; each variant carries only what that state
/// has on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandState {
    Done { results: Map<String, Value> },
    InProgress { progress: Option<f64> },
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    name: String,
    id: Option<String>,
    state: CommandState,
}

impl CommandResult {
    pub fn done(name: impl Into<String>, results: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            id: None,
            state: CommandState::Done { results },
        }
    }

    pub fn in_progress(name: impl Into<String>, id: Option<String>, progress: Option<f64>) -> Self {
        Self {
            name: name.into(),
            id,
            state: CommandState::InProgress { progress },
        }
    }

    pub fn error(name: impl Into<String>, payload: ErrorPayload) -> Self {
        Self {
            name: name.into(),
            id: None,
            state: CommandState::Error(payload),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command id reported by the camera, used to check long-running commands.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn state(&self) -> &CommandState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, CommandState::Done { .. })
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.state, CommandState::InProgress { .. })
    }

    pub fn results(&self) -> Option<&Map<String, Value>> {
        match &self.state {
            CommandState::Done { results } => Some(results),
            _ => None,
        }
    }

    pub fn into_results(self) -> Option<Map<String, Value>> {
        match self.state {
            CommandState::Done { results } => Some(results),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<f64> {
        match self.state {
            CommandState::InProgress { progress } => progress,
            _ => None,
        }
    }

    pub fn error_payload(&self) -> Option<&ErrorPayload> {
        match &self.state {
            CommandState::Error(payload) => Some(payload),
            _ => None,
        }
    }

    /// The result in the shape the camera sends it.
    pub fn to_wire(&self) -> Value {
        let mut wire = json!({ "name": self.name });
        if let Some(id) = &self.id {
            wire["id"] = json!(id);
        }
        match &self.state {
            CommandState::Done { results } => {
                wire["state"] = json!("done");
                wire["results"] = Value::Object(results.clone());
            }
            CommandState::InProgress { progress } => {
                wire["state"] = json!("inProgress");
                if let Some(progress) = progress {
                    wire["progress"] = json!({ "completion": progress });
                }
            }
            CommandState::Error(payload) => {
                wire["state"] = json!("error");
                wire["error"] = json!(payload);
            }
        }
        wire
    }
}

fn decode_progress(raw: Option<&Value>) -> Result<Option<f64>, CodecError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::Object(obj)) => match obj.get("completion") {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(_) => Err(shape("progress.completion is not a number")),
        },
        Some(_) => Err(shape("progress is neither a number nor an object")),
    }
}

/// Decode a response body into a result. Keys this client does not know
/// about are ignored.
pub fn decode(body: &[u8]) -> Result<CommandResult, CodecError> {
    let value: Value = serde_json::from_slice(body).map_err(CodecError::InvalidJson)?;
    let Value::Object(obj) = value else {
        return Err(shape("top-level value is not an object"));
    };

    let name = match obj.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(_) => return Err(shape("name is not a string")),
        None => return Err(shape("missing name")),
    };
    let id = match obj.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => return Err(shape("id is not a string")),
    };
    let state_tag = match obj.get("state") {
        None => None,
        Some(Value::String(tag)) => Some(tag.as_str()),
        Some(_) => return Err(shape("state is not a string")),
    };

    if let Some(raw_error) = obj.get("error") {
        let payload = ErrorPayload::deserialize(raw_error)
            .map_err(|_| shape("error must be an object with string code and message"))?;
        return Ok(CommandResult {
            name,
            id,
            state: CommandState::Error(payload),
        });
    }

    let state = match state_tag {
        Some("inProgress") => CommandState::InProgress {
            progress: decode_progress(obj.get("progress"))?,
        },
        Some("error") => return Err(shape("error state without an error payload")),
        Some("done") | None => match obj.get("results") {
            Some(Value::Object(results)) => CommandState::Done {
                results: results.clone(),
            },
            Some(_) => return Err(shape("results is not an object")),
            None if state_tag == Some("done") => CommandState::Done {
                results: Map::new(),
            },
            None => return Err(shape("no results, progress or error present")),
        },
        Some(other) => return Err(shape(format!("unknown state {other:?}"))),
    };

    Ok(CommandResult { name, id, state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::params::{AccessPoint, AuthenticationMode, Nullable, Proxy};

    fn access_point_request() -> CommandRequest {
        let mut ap = AccessPoint::dynamic("ssid_test", AuthenticationMode::Wep);
        ap.ssid_stealth = true;
        ap.password = Some("password_test".into());
        ap.connection_priority = 2;
        CommandRequest::new(CommandParameters::SetAccessPoint(ap))
    }

    #[test]
    fn test_envelope_has_exactly_name_and_parameters() {
        let body = access_point_request().encode().unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 2);
        assert_eq!(obj["name"], "camera._setAccessPoint");
        assert_eq!(
            obj["parameters"],
            json!({
                "ssid": "ssid_test",
                "ssidStealth": true,
                "security": "WEP",
                "password": "password_test",
                "connectionPriority": 2,
                "ipAddressAllocation": "dynamic"
            })
        );
    }

    #[test]
    fn test_request_body_decodes_back_to_the_same_parameters() {
        let mut ap = AccessPoint::dynamic("ssid_test", AuthenticationMode::Wpa)
            .with_static_address("192.168.1.2", "255.255.255.0", "192.168.1.3");
        ap.proxy = Nullable::Value(Proxy {
            enabled: true,
            url: Some("https://xxx".into()),
            port: Some(8081),
            userid: Some("abc".into()),
            password: Some("pwpwpw111".into()),
        });
        let request = CommandRequest::new(CommandParameters::SetAccessPoint(ap.clone()));

        let value: Value = serde_json::from_slice(&request.encode().unwrap()).unwrap();
        let sent: AccessPoint = serde_json::from_value(value["parameters"].clone()).unwrap();
        assert_eq!(sent, ap);
    }

    #[test]
    fn test_session_id_is_injected_into_parameters() {
        let request = CommandRequest::new(CommandParameters::TakePicture).with_session_id("SID_0001");
        let value: Value = serde_json::from_slice(&request.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"name": "camera.takePicture", "parameters": {"sessionId": "SID_0001"}}));
    }

    #[test]
    fn test_decodes_done_with_results() {
        let result = decode(br#"{"name":"camera._setAccessPoint","results":{}}"#).unwrap();
        assert!(result.is_done());
        assert_eq!(result.name(), "camera._setAccessPoint");
        assert!(result.results().unwrap().is_empty());
    }

    #[test]
    fn test_decodes_done_state_without_results_as_empty() {
        let result = decode(br#"{"name":"camera.reset","state":"done"}"#).unwrap();
        assert_eq!(result.results(), Some(&Map::new()));
    }

    #[test]
    fn test_decodes_in_progress_with_plain_or_nested_progress() {
        let plain = decode(br#"{"name":"camera.takePicture","state":"inProgress","progress":40}"#).unwrap();
        assert!(plain.is_in_progress());
        assert_eq!(plain.progress(), Some(40.0));
        assert_eq!(plain.id(), None);

        let nested = decode(
            br#"{"name":"camera.takePicture","state":"inProgress","id":"7","progress":{"completion":0.5}}"#,
        )
        .unwrap();
        assert_eq!(nested.progress(), Some(0.5));
        assert_eq!(nested.id(), Some("7"));
    }

    #[test]
    fn test_decodes_error_payload_and_ignores_unknown_keys() {
        let result = decode(
            br#"{"name":"camera._setAccessPoint","state":"error","extra":1,"error":{"code":"UnitTest","message":"ErrorMessageTest","hint":"x"}}"#,
        )
        .unwrap();
        let payload = result.error_payload().unwrap();
        assert_eq!(payload.code, "UnitTest");
        assert_eq!(payload.message, "ErrorMessageTest");
    }

    #[test]
    fn test_rejects_non_json_and_shapeless_bodies() {
        assert!(matches!(decode(b"Not json"), Err(CodecError::InvalidJson(_))));
        for body in [
            &br#"[1,2]"#[..],
            br#"{"results":{}}"#,
            br#"{"name":"camera.reset"}"#,
            br#"{"name":"camera.reset","results":[]}"#,
            br#"{"name":"camera.reset","state":"error"}"#,
            br#"{"name":"camera.reset","state":"paused"}"#,
            br#"{"name":"camera.reset","error":{"code":1,"message":"m"}}"#,
            br#"{"name":"camera.reset","state":"inProgress","progress":"half"}"#,
        ] {
            assert!(
                matches!(decode(body), Err(CodecError::UnexpectedShape(_))),
                "{}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_done_results_round_trip_through_the_wire_shape() {
        let mut results = Map::new();
        results.insert("fileUrl".into(), json!("http://192.168.1.1/files/100RICOH/R0010015.JPG"));
        results.insert("nested".into(), json!({"a": [1, 2, null], "b": false}));
        let original = CommandResult::done("camera.takePicture", results);

        let wire = serde_json::to_vec(&original.to_wire()).unwrap();
        assert_eq!(decode(&wire).unwrap(), original);
    }
}

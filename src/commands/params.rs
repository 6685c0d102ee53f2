//! Typed parameter shapes for every command the client knows about.
//!
//! Each command gets one variant of [`CommandParameters`]; the variant decides
//! the wire name. Optional fields are `Option<T>` and disappear from the
//! envelope when `None`. Fields where the camera distinguishes "leave as is"
//! from "clear" use [`Nullable`], which can additionally carry an explicit
//! JSON `null`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Wire names of the commands in the schema table.
pub struct CommandName;

impl CommandName {
    pub const SET_ACCESS_POINT: &'static str = "camera._setAccessPoint";
    pub const DELETE_ACCESS_POINT: &'static str = "camera._deleteAccessPoint";
    pub const LIST_ACCESS_POINTS: &'static str = "camera._listAccessPoints";
    pub const TAKE_PICTURE: &'static str = "camera.takePicture";
    pub const START_CAPTURE: &'static str = "camera.startCapture";
    pub const STOP_CAPTURE: &'static str = "camera.stopCapture";
    pub const LIST_FILES: &'static str = "camera.listFiles";
    pub const DELETE: &'static str = "camera.delete";
    pub const GET_OPTIONS: &'static str = "camera.getOptions";
    pub const SET_OPTIONS: &'static str = "camera.setOptions";
    pub const RESET: &'static str = "camera.reset";
    pub const FINISH_WLAN: &'static str = "camera._finishWlan";
    pub const GET_METADATA: &'static str = "camera.getMetadata";
}

/// Tri-state field: omitted, explicit `null`, or a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nullable<T> {
    Unset,
    Null,
    Value(T),
}

impl<T> Default for Nullable<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Nullable<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unset | Self::Null => None,
        }
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Unset | Self::Null => serializer.serialize_none(),
        }
    }
}

// Only called when the key is present; a missing key falls back to `Default`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Null, Self::Value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationMode {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "WEP")]
    Wep,
    #[serde(rename = "WPA/WPA2 PSK")]
    Wpa,
    #[serde(rename = "WPA3-SAE")]
    Wpa3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpAddressAllocation {
    Dynamic,
    Static,
}

/// HTTP proxy the camera uses when joining an access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    #[serde(rename = "use")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_connection_priority() -> u8 {
    1
}

/// Access point settings, used both as `_setAccessPoint` parameters and as
/// the entries returned by `_listAccessPoints`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPoint {
    pub ssid: String,
    #[serde(default)]
    pub ssid_stealth: bool,
    pub security: AuthenticationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_connection_priority")]
    pub connection_priority: u8,
    pub ip_address_allocation: IpAddressAllocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_gateway: Option<String>,
    /// `null` clears a previously stored proxy.
    #[serde(rename = "_proxy", default, skip_serializing_if = "Nullable::is_unset")]
    pub proxy: Nullable<Proxy>,
}

impl AccessPoint {
    pub fn dynamic(ssid: impl Into<String>, security: AuthenticationMode) -> Self {
        Self {
            ssid: ssid.into(),
            ssid_stealth: false,
            security,
            password: None,
            connection_priority: default_connection_priority(),
            ip_address_allocation: IpAddressAllocation::Dynamic,
            ip_address: None,
            subnet_mask: None,
            default_gateway: None,
            proxy: Nullable::Unset,
        }
    }

    pub fn with_static_address(
        mut self,
        ip_address: impl Into<String>,
        subnet_mask: impl Into<String>,
        default_gateway: impl Into<String>,
    ) -> Self {
        self.ip_address_allocation = IpAddressAllocation::Static;
        self.ip_address = Some(ip_address.into());
        self.subnet_mask = Some(subnet_mask.into());
        self.default_gateway = Some(default_gateway.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAccessPointParams {
    pub ssid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoParameters {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "interval")]
    Interval,
    #[serde(rename = "composite")]
    Composite,
    #[serde(rename = "_burst")]
    Burst,
    #[serde(rename = "_timeShift")]
    TimeShift,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCaptureParams {
    #[serde(rename = "_mode", default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<CaptureMode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    All,
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesParams {
    pub file_type: FileType,
    pub entry_count: u32,
    #[serde(default)]
    pub start_position: u32,
    /// 0 asks the camera to leave thumbnails out of the listing.
    #[serde(default)]
    pub max_thumb_size: u32,
    #[serde(rename = "_detail", default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<bool>,
}

impl ListFilesParams {
    pub fn new(file_type: FileType, start_position: u32, entry_count: u32) -> Self {
        Self {
            file_type,
            entry_count,
            start_position,
            max_thumb_size: 0,
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    pub file_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOptionsParams {
    pub option_names: Vec<String>,
}

/// Option values are free-form; a `Value::Null` entry is sent as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOptionsParams {
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMetadataParams {
    pub file_url: String,
}

/// A command outside the schema table, sent with caller-built parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomCommand {
    pub name: String,
    pub parameters: Map<String, Value>,
}

/// Parameters of one command, tagged by the command they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandParameters {
    SetAccessPoint(AccessPoint),
    DeleteAccessPoint(DeleteAccessPointParams),
    ListAccessPoints,
    TakePicture,
    StartCapture(StartCaptureParams),
    StopCapture,
    ListFiles(ListFilesParams),
    Delete(DeleteParams),
    GetOptions(GetOptionsParams),
    SetOptions(SetOptionsParams),
    Reset,
    FinishWlan,
    GetMetadata(GetMetadataParams),
    Custom(CustomCommand),
}

impl CommandParameters {
    pub fn name(&self) -> &str {
        match self {
            Self::SetAccessPoint(_) => CommandName::SET_ACCESS_POINT,
            Self::DeleteAccessPoint(_) => CommandName::DELETE_ACCESS_POINT,
            Self::ListAccessPoints => CommandName::LIST_ACCESS_POINTS,
            Self::TakePicture => CommandName::TAKE_PICTURE,
            Self::StartCapture(_) => CommandName::START_CAPTURE,
            Self::StopCapture => CommandName::STOP_CAPTURE,
            Self::ListFiles(_) => CommandName::LIST_FILES,
            Self::Delete(_) => CommandName::DELETE,
            Self::GetOptions(_) => CommandName::GET_OPTIONS,
            Self::SetOptions(_) => CommandName::SET_OPTIONS,
            Self::Reset => CommandName::RESET,
            Self::FinishWlan => CommandName::FINISH_WLAN,
            Self::GetMetadata(_) => CommandName::GET_METADATA,
            Self::Custom(custom) => &custom.name,
        }
    }

    /// Serialize the parameter object for the envelope.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            Self::SetAccessPoint(p) => serde_json::to_value(p),
            Self::DeleteAccessPoint(p) => serde_json::to_value(p),
            Self::StartCapture(p) => serde_json::to_value(p),
            Self::ListFiles(p) => serde_json::to_value(p),
            Self::Delete(p) => serde_json::to_value(p),
            Self::GetOptions(p) => serde_json::to_value(p),
            Self::SetOptions(p) => serde_json::to_value(p),
            Self::GetMetadata(p) => serde_json::to_value(p),
            Self::Custom(custom) => Ok(Value::Object(custom.parameters.clone())),
            Self::ListAccessPoints
            | Self::TakePicture
            | Self::StopCapture
            | Self::Reset
            | Self::FinishWlan => serde_json::to_value(NoParameters::default()),
        }
    }
}

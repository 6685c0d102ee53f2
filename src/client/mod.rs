//! Per-capability camera operations built on the command dispatcher.

pub mod config;

use anyhow::Result as AnyResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::commands::params::{
    AccessPoint, AuthenticationMode, CaptureMode, CustomCommand, DeleteAccessPointParams, DeleteParams, FileType,
    GetMetadataParams, GetOptionsParams, ListFilesParams, Nullable, Proxy, SetOptionsParams, StartCaptureParams,
};
use crate::commands::{CommandDispatcher, CommandParameters, CommandRequest, CommandResult, PollPolicy};
use crate::error::{ClassifiedError, Result};
use crate::transport::{HttpTransport, Transport};

pub use config::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub file_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub date_time_zone: Option<String>,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    pub entries: Vec<FileInfo>,
    pub total_entries: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessPointList {
    access_points: Vec<AccessPoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PictureResult {
    file_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureResult {
    #[serde(default)]
    file_urls: Vec<String>,
}

#[derive(Deserialize)]
struct OptionsResult {
    options: Map<String, Value>,
}

/// Static network settings for `set_access_point_statically`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAddress {
    pub ip_address: String,
    pub subnet_mask: String,
    pub default_gateway: String,
}

/// Map a DONE result's `results` into a typed value; a mismatch is a
/// malformed response.
fn results_as<T: DeserializeOwned>(result: CommandResult) -> Result<T> {
    let name = result.name().to_string();
    let results = result.into_results().unwrap_or_default();
    serde_json::from_value(Value::Object(results)).map_err(|err| ClassifiedError::MalformedResponse {
        reason: format!("unexpected results for {name}: {err}"),
        status: None,
    })
}

pub struct ThetaClient {
    dispatcher: CommandDispatcher,
}

impl ThetaClient {
    pub fn new(config: &ClientConfig) -> AnyResult<Self> {
        let transport = HttpTransport::new(&config.endpoint, config.connect_timeout(), config.request_timeout())?;
        Ok(Self::with_transport(Arc::new(transport), config.poll.clone()))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, policy: PollPolicy) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(transport, policy),
        }
    }

    /// Lower-level access, e.g. to submit a command and keep its poll handle.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    async fn run(&self, parameters: CommandParameters) -> Result<CommandResult> {
        self.dispatcher.execute(CommandRequest::new(parameters)).await
    }

    pub async fn set_access_point(&self, access_point: AccessPoint) -> Result<()> {
        debug!(ssid = %access_point.ssid, allocation = ?access_point.ip_address_allocation, "setting access point");
        self.run(CommandParameters::SetAccessPoint(access_point)).await?;
        Ok(())
    }

    pub async fn set_access_point_dynamically(
        &self,
        ssid: &str,
        ssid_stealth: bool,
        security: AuthenticationMode,
        password: Option<&str>,
        connection_priority: u8,
        proxy: Option<Proxy>,
    ) -> Result<()> {
        let mut access_point = AccessPoint::dynamic(ssid, security);
        access_point.ssid_stealth = ssid_stealth;
        access_point.password = password.map(str::to_owned);
        access_point.connection_priority = connection_priority;
        access_point.proxy = proxy.map_or(Nullable::Unset, Nullable::Value);
        self.set_access_point(access_point).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn set_access_point_statically(
        &self,
        ssid: &str,
        ssid_stealth: bool,
        security: AuthenticationMode,
        password: Option<&str>,
        connection_priority: u8,
        address: StaticAddress,
        proxy: Option<Proxy>,
    ) -> Result<()> {
        let mut access_point = AccessPoint::dynamic(ssid, security).with_static_address(
            address.ip_address,
            address.subnet_mask,
            address.default_gateway,
        );
        access_point.ssid_stealth = ssid_stealth;
        access_point.password = password.map(str::to_owned);
        access_point.connection_priority = connection_priority;
        access_point.proxy = proxy.map_or(Nullable::Unset, Nullable::Value);
        self.set_access_point(access_point).await
    }

    pub async fn delete_access_point(&self, ssid: &str) -> Result<()> {
        self.run(CommandParameters::DeleteAccessPoint(DeleteAccessPointParams { ssid: ssid.to_string() }))
            .await?;
        Ok(())
    }

    pub async fn list_access_points(&self) -> Result<Vec<AccessPoint>> {
        let result = self.run(CommandParameters::ListAccessPoints).await?;
        Ok(results_as::<AccessPointList>(result)?.access_points)
    }

    /// Take a still picture and return the URL of the stored file.
    pub async fn take_picture(&self) -> Result<String> {
        let result = self.run(CommandParameters::TakePicture).await?;
        Ok(results_as::<PictureResult>(result)?.file_url)
    }

    pub async fn start_capture(&self, mode: Option<CaptureMode>) -> Result<CommandResult> {
        self.run(CommandParameters::StartCapture(StartCaptureParams { mode })).await
    }

    /// Stop a running capture; returns the URLs of files it produced, if any.
    pub async fn stop_capture(&self) -> Result<Vec<String>> {
        let result = self.run(CommandParameters::StopCapture).await?;
        Ok(results_as::<CaptureResult>(result)?.file_urls)
    }

    pub async fn list_files(&self, file_type: FileType, start_position: u32, entry_count: u32) -> Result<FileList> {
        let params = ListFilesParams::new(file_type, start_position, entry_count);
        let result = self.run(CommandParameters::ListFiles(params)).await?;
        results_as(result)
    }

    pub async fn delete_files(&self, file_urls: Vec<String>) -> Result<()> {
        self.run(CommandParameters::Delete(DeleteParams { file_urls })).await?;
        Ok(())
    }

    pub async fn get_options(&self, option_names: Vec<String>) -> Result<Map<String, Value>> {
        let result = self.run(CommandParameters::GetOptions(GetOptionsParams { option_names })).await?;
        Ok(results_as::<OptionsResult>(result)?.options)
    }

    pub async fn set_options(&self, options: Map<String, Value>) -> Result<()> {
        self.run(CommandParameters::SetOptions(SetOptionsParams { options })).await?;
        Ok(())
    }

    pub async fn get_metadata(&self, file_url: &str) -> Result<Map<String, Value>> {
        let result = self
            .run(CommandParameters::GetMetadata(GetMetadataParams {
                file_url: file_url.to_string(),
            }))
            .await?;
        Ok(result.into_results().unwrap_or_default())
    }

    pub async fn reset(&self) -> Result<()> {
        self.run(CommandParameters::Reset).await?;
        Ok(())
    }

    pub async fn finish_wlan(&self) -> Result<()> {
        self.run(CommandParameters::FinishWlan).await?;
        Ok(())
    }

    /// Run a command outside the built-in table.
    pub async fn execute_raw(&self, name: &str, parameters: Map<String, Value>) -> Result<CommandResult> {
        self.run(CommandParameters::Custom(CustomCommand {
            name: name.to_string(),
            parameters,
        }))
        .await
    }

    pub async fn command_status(&self, id: &str) -> Result<CommandResult> {
        self.dispatcher.command_status(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::EXECUTE_PATH;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(server: &Server) -> ThetaClient {
        let config = ClientConfig {
            endpoint: server.url(),
            ..ClientConfig::default()
        };
        ThetaClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_list_files_decodes_entries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", EXECUTE_PATH)
            .match_body(Matcher::PartialJson(json!({
                "name": "camera.listFiles",
                "parameters": {"fileType": "image", "startPosition": 0, "entryCount": 1000, "maxThumbSize": 0}
            })))
            .with_status(200)
            .with_body(
                r#"{"name":"camera.listFiles","state":"done","results":{"entries":[
                    {"name":"R0010015.JPG","fileUrl":"http://192.168.1.1/files/100RICOH/R0010015.JPG","size":4051440,"dateTimeZone":"2015:07:10 11:05:18+09:00","_projectionType":"Equirectangular"}
                ],"totalEntries":1}}"#,
            )
            .create_async()
            .await;

        let files = client(&server).list_files(FileType::Image, 0, 1000).await.unwrap();
        assert_eq!(files.total_entries, 1);
        assert_eq!(files.entries[0].name, "R0010015.JPG");
        assert_eq!(files.entries[0].size, 4051440);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_access_points_reads_entries() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", EXECUTE_PATH)
            .with_status(200)
            .with_body(
                r#"{"name":"camera._listAccessPoints","state":"done","results":{"accessPoints":[
                    {"ssid":"home","ssidStealth":false,"security":"WPA/WPA2 PSK","connectionPriority":1,"ipAddressAllocation":"dynamic"}
                ]}}"#,
            )
            .create_async()
            .await;

        let aps = client(&server).list_access_points().await.unwrap();
        assert_eq!(aps.len(), 1);
        assert_eq!(aps[0].ssid, "home");
        assert_eq!(aps[0].security, AuthenticationMode::Wpa);
    }

    #[tokio::test]
    async fn test_unexpected_results_are_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", EXECUTE_PATH)
            .with_status(200)
            .with_body(r#"{"name":"camera.takePicture","results":{"fileUri":"nope"}}"#)
            .create_async()
            .await;

        let err = client(&server).take_picture().await.unwrap_err();
        assert!(matches!(err, ClassifiedError::MalformedResponse { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_device_error_surfaces_from_facade() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", EXECUTE_PATH)
            .with_status(400)
            .with_body(r#"{"name":"camera._deleteAccessPoint","state":"error","error":{"code":"invalidParameterValue","message":"ssid not found"}}"#)
            .create_async()
            .await;

        let err = client(&server).delete_access_point("missing").await.unwrap_err();
        assert_eq!(err.device_code(), Some("invalidParameterValue"));
    }
}

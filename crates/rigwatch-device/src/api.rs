//! Device REST surface consumed by the gateway.

use std::time::Duration;

use async_trait::async_trait;
use rigwatch_core::{CameraKind, DeviceHealth, MotorState, MoveCommand};
use tracing::debug;

use crate::error::DeviceResult;
use crate::http;

/// Remote calls the gateway makes against a device at `ip`.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn health(&self, ip: &str) -> DeviceResult<DeviceHealth>;

    /// Send a radio outlet code through this device's transmitter.
    async fn switch_outlet(&self, ip: &str, code: i64) -> DeviceResult<()>;

    async fn motor_position(&self, ip: &str) -> DeviceResult<MotorState>;

    async fn move_motor(&self, ip: &str, command: MoveCommand) -> DeviceResult<()>;

    async fn toggle_engage(&self, ip: &str, engage: bool) -> DeviceResult<()>;

    /// Clear the device's position history, seeding it with the current position.
    async fn reset_history(&self, ip: &str) -> DeviceResult<()>;

    /// Capture one live frame to prove the camera works.
    async fn preview_image(&self, ip: &str, camera: CameraKind) -> DeviceResult<()>;

    async fn kill_camera(&self, ip: &str, camera: CameraKind) -> DeviceResult<()>;

    /// Trigger thermal flat-field calibration.
    async fn run_ffc(&self, ip: &str) -> DeviceResult<()>;
}

/// [`DeviceApi`] over plain HTTP/1.1 on the device's API port.
#[derive(Debug, Clone)]
pub struct HttpDeviceApi {
    port: u16,
    timeout: Duration,
}

impl HttpDeviceApi {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    fn address(&self, ip: &str) -> String {
        format!("{ip}:{}", self.port)
    }
}

#[async_trait]
impl DeviceApi for HttpDeviceApi {
    async fn health(&self, ip: &str) -> DeviceResult<DeviceHealth> {
        http::get_json(&self.address(ip), "/api/health/lastdevicehealth", self.timeout).await
    }

    async fn switch_outlet(&self, ip: &str, code: i64) -> DeviceResult<()> {
        let path = format!("/api/switchoutlets/switchoutlet?code={code}");
        http::post(&self.address(ip), &path, self.timeout).await
    }

    async fn motor_position(&self, ip: &str) -> DeviceResult<MotorState> {
        http::get_json(
            &self.address(ip),
            "/api/motormovement/currentposition",
            self.timeout,
        )
        .await
    }

    async fn move_motor(&self, ip: &str, command: MoveCommand) -> DeviceResult<()> {
        let path = format!(
            "/api/motormovement/movemotor?steps={}&minTime={}&maxTime={}&rampLength={}&maxAllowedPosition={}&minAllowedPosition={}",
            command.steps,
            command.min_time,
            command.max_time,
            command.ramp_length,
            command.max_allowed_position,
            command.min_allowed_position,
        );
        debug!(%ip, steps = command.steps, "commanding motor move");
        // A move blocks until the last pulse; allow for the full sweep time.
        let budget = self.timeout + move_duration(&command);
        http::post(&self.address(ip), &path, budget).await
    }

    async fn toggle_engage(&self, ip: &str, engage: bool) -> DeviceResult<()> {
        let path = format!("/api/motormovement/togglemotorengage?shouldEngage={engage}");
        http::post(&self.address(ip), &path, self.timeout).await
    }

    async fn reset_history(&self, ip: &str) -> DeviceResult<()> {
        http::post(&self.address(ip), "/api/motormovement/resethistory", self.timeout).await
    }

    async fn preview_image(&self, ip: &str, camera: CameraKind) -> DeviceResult<()> {
        let path = format!("/api/{}/previewimage", camera.api_segment());
        http::call(::http::Method::GET, &self.address(ip), &path, self.timeout)
            .await
            .map(|_| ())
    }

    async fn kill_camera(&self, ip: &str, camera: CameraKind) -> DeviceResult<()> {
        let path = format!("/api/{}/killcamera", camera.api_segment());
        http::post(&self.address(ip), &path, self.timeout).await
    }

    async fn run_ffc(&self, ip: &str) -> DeviceResult<()> {
        http::post(&self.address(ip), "/api/irimagetaking/runffc", self.timeout).await
    }
}

/// Upper bound on how long the device needs to execute a move.
fn move_duration(command: &MoveCommand) -> Duration {
    Duration::from_micros(u64::from(command.steps.unsigned_abs()) * u64::from(command.max_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server;
    use rigwatch_core::Capability;

    fn api_for(address: &str) -> (HttpDeviceApi, String) {
        let (ip, port) = address.rsplit_once(':').unwrap();
        (
            HttpDeviceApi::new(port.parse().unwrap(), Duration::from_secs(2)),
            ip.to_string(),
        )
    }

    #[tokio::test]
    async fn health_decodes_capabilities() {
        let (address, _rx) =
            test_server::serve(vec![(200, r#"{"deviceId":"rig-7","deviceName":"north","state":45}"#)])
                .await;
        let (api, ip) = api_for(&address);
        let health = api.health(&ip).await.unwrap();
        assert_eq!(health.device_id, "rig-7");
        assert!(health.has(Capability::VisibleCameraFound));
        assert!(health.has(Capability::ThermalCameraFunctional));
        assert!(health.has(Capability::CanSwitchOutlets));
        assert!(!health.has(Capability::HasTemperatureSensor));
    }

    #[tokio::test]
    async fn move_motor_encodes_query() {
        let (address, mut rx) = test_server::serve(vec![(200, "")]).await;
        let (api, ip) = api_for(&address);
        api.move_motor(
            &ip,
            MoveCommand {
                steps: -300,
                min_time: 1000,
                max_time: 4000,
                ramp_length: 400,
                max_allowed_position: 500,
                min_allowed_position: -800,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            "POST /api/motormovement/movemotor?steps=-300&minTime=1000&maxTime=4000&rampLength=400&maxAllowedPosition=500&minAllowedPosition=-800 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn camera_paths_follow_camera_kind() {
        let (address, mut rx) = test_server::serve(vec![(200, ""), (200, ""), (200, "")]).await;
        let (api, ip) = api_for(&address);
        api.preview_image(&ip, CameraKind::Thermal).await.unwrap();
        api.kill_camera(&ip, CameraKind::Visible).await.unwrap();
        api.switch_outlet(&ip, 4436).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            "GET /api/irimagetaking/previewimage HTTP/1.1"
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            "POST /api/visimagetaking/killcamera HTTP/1.1"
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            "POST /api/switchoutlets/switchoutlet?code=4436 HTTP/1.1"
        );
    }

    #[test]
    fn move_budget_scales_with_steps() {
        let command = MoveCommand {
            steps: -1000,
            min_time: 1000,
            max_time: 4000,
            ramp_length: 400,
            max_allowed_position: 0,
            min_allowed_position: 0,
        };
        assert_eq!(move_duration(&command), Duration::from_secs(4));
    }
}

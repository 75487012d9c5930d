//! Alert stream request construction.

use base64::Engine;

use crate::types::CameraConfig;

/// Resource path of the camera's alarm event stream
pub const ALERT_STREAM_PATH: &str = "/Event/notification/alertStream";

/// Build the HTTP request that opens the alert stream.
///
/// The camera keeps the response open indefinitely and pushes one XML
/// document per event, so only the request line and three headers are sent.
pub fn build_stream_request(camera: &CameraConfig) -> String {
    format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Authorization: Basic {}\r\n\
         Connection: keep-alive\r\n\
         \r\n",
        ALERT_STREAM_PATH,
        camera.address,
        basic_credentials(&camera.username, &camera.password)
    )
}

/// Base64 of `username:password` as used by the Basic scheme
pub fn basic_credentials(username: &str, password: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_credentials() {
        assert_eq!(basic_credentials("admin", "12345"), "YWRtaW46MTIzNDU=");
        assert_eq!(basic_credentials("", ""), "Og==");
    }

    #[test]
    fn test_stream_request_shape() {
        let camera = CameraConfig::new("192.168.1.64", "admin", "12345");
        let request = build_stream_request(&camera);

        assert_eq!(
            request,
            "GET /Event/notification/alertStream HTTP/1.1\r\n\
             Host: 192.168.1.64\r\n\
             Authorization: Basic YWRtaW46MTIzNDU=\r\n\
             Connection: keep-alive\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_stream_request_ends_with_blank_line() {
        let camera = CameraConfig::new("cam.local", "user", "pa:ss");
        let request = build_stream_request(&camera);
        assert!(request.ends_with("\r\n\r\n"));
        assert_eq!(request.matches("\r\n\r\n").count(), 1);
    }
}
